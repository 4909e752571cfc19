//! MODBUS RTU Constants

// MODBUS Functions
pub const MODBUS_GET_COILS: u8 = 0x01;
pub const MODBUS_GET_DISCRETES: u8 = 0x02;
pub const MODBUS_GET_HOLDINGS: u8 = 0x03;
pub const MODBUS_GET_INPUTS: u8 = 0x04;
pub const MODBUS_SET_COIL: u8 = 0x05;
pub const MODBUS_SET_HOLDING: u8 = 0x06;
pub const MODBUS_READ_EXCEPTION_STATUS: u8 = 0x07;
pub const MODBUS_DIAGNOSTIC: u8 = 0x08;
pub const MODBUS_GET_COM_EVENT_COUNTER: u8 = 0x0B;
pub const MODBUS_GET_COM_EVENT_LOG: u8 = 0x0C;
pub const MODBUS_SET_COILS_BULK: u8 = 0x0F;
pub const MODBUS_SET_HOLDINGS_BULK: u8 = 0x10;
pub const MODBUS_REPORT_SLAVE_ID: u8 = 0x11;
pub const MODBUS_READ_FILE_RECORD: u8 = 0x14;
pub const MODBUS_WRITE_FILE_RECORD: u8 = 0x15;
pub const MODBUS_MASK_WRITE_HOLDING: u8 = 0x16;
pub const MODBUS_READ_WRITE_HOLDINGS: u8 = 0x17;
pub const MODBUS_READ_FIFO_QUEUE: u8 = 0x18;
pub const MODBUS_ENCAPSULATED_INTERFACE: u8 = 0x2B;

/// Set on the function byte of exception responses
pub const MODBUS_ERROR_FLAG: u8 = 0x80;
/// Function byte value used as the "no function" sentinel
pub const MODBUS_FUNCTION_NONE: u8 = 0xFF;

// MODBUS Errors
pub const MODBUS_ERROR_ILLEGAL_FUNCTION: u8 = 0x01;
pub const MODBUS_ERROR_ILLEGAL_DATA_ADDRESS: u8 = 0x02;
pub const MODBUS_ERROR_ILLEGAL_DATA_VALUE: u8 = 0x03;
pub const MODBUS_ERROR_SLAVE_DEVICE_FAILURE: u8 = 0x04;
pub const MODBUS_ERROR_ACKNOWLEDGE: u8 = 0x05;
pub const MODBUS_ERROR_SLAVE_DEVICE_BUSY: u8 = 0x06;
pub const MODBUS_ERROR_NEGATIVE_ACKNOWLEDGE: u8 = 0x07;
pub const MODBUS_ERROR_MEMORY_PARITY: u8 = 0x08;
pub const MODBUS_ERROR_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;
pub const MODBUS_ERROR_GATEWAY_TARGET_NO_RESPONSE: u8 = 0x0B;

// Encapsulated interface (0x2B)
pub const MODBUS_MEI_READ_DEVICE_ID: u8 = 0x0E;
pub const MODBUS_DEVICE_ID_BASIC: u8 = 0x01;
pub const MODBUS_DEVICE_ID_REGULAR: u8 = 0x02;
pub const MODBUS_DEVICE_ID_EXTENDED: u8 = 0x03;
pub const MODBUS_DEVICE_ID_SPECIFIC: u8 = 0x04;
/// Basic identification, stream and individual access
pub const MODBUS_DEVICE_ID_CONFORMITY: u8 = 0x81;

// Quantity limits
pub const MODBUS_MAX_READ_BITS: u16 = 2000;
pub const MODBUS_MAX_WRITE_BITS: u16 = 1968;
pub const MODBUS_MAX_READ_REGISTERS: u16 = 125;
pub const MODBUS_MAX_WRITE_REGISTERS: u16 = 123;

// RTU framing
pub const MODBUS_BROADCAST_ADDRESS: u8 = 0;
pub const MODBUS_MAX_ADU_LEN: usize = 256;
/// Slave address + function
pub const MODBUS_HEADER_LEN: usize = 2;
/// CRC16
pub const MODBUS_FOOTER_LEN: usize = 2;

/// Single coil "on" value
pub const MODBUS_COIL_ON: u16 = 0xFF00;
/// Single coil "off" value
pub const MODBUS_COIL_OFF: u16 = 0x0000;
