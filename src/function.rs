use crate::consts::{
    MODBUS_DIAGNOSTIC, MODBUS_ENCAPSULATED_INTERFACE, MODBUS_ERROR_ACKNOWLEDGE, MODBUS_ERROR_FLAG,
    MODBUS_ERROR_GATEWAY_PATH_UNAVAILABLE, MODBUS_ERROR_GATEWAY_TARGET_NO_RESPONSE,
    MODBUS_ERROR_ILLEGAL_DATA_ADDRESS, MODBUS_ERROR_ILLEGAL_DATA_VALUE,
    MODBUS_ERROR_ILLEGAL_FUNCTION, MODBUS_ERROR_MEMORY_PARITY, MODBUS_ERROR_NEGATIVE_ACKNOWLEDGE,
    MODBUS_ERROR_SLAVE_DEVICE_BUSY, MODBUS_ERROR_SLAVE_DEVICE_FAILURE, MODBUS_FUNCTION_NONE,
    MODBUS_GET_COILS, MODBUS_GET_COM_EVENT_COUNTER, MODBUS_GET_COM_EVENT_LOG,
    MODBUS_GET_DISCRETES, MODBUS_GET_HOLDINGS, MODBUS_GET_INPUTS, MODBUS_MASK_WRITE_HOLDING,
    MODBUS_READ_EXCEPTION_STATUS, MODBUS_READ_FIFO_QUEUE, MODBUS_READ_FILE_RECORD,
    MODBUS_READ_WRITE_HOLDINGS, MODBUS_REPORT_SLAVE_ID, MODBUS_SET_COIL, MODBUS_SET_COILS_BULK,
    MODBUS_SET_HOLDING, MODBUS_SET_HOLDINGS_BULK, MODBUS_WRITE_FILE_RECORD,
};
use crate::ErrorKind;

/// Valid Modbus request functions
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Function {
    ReadCoils = MODBUS_GET_COILS,
    ReadDiscreteInputs = MODBUS_GET_DISCRETES,
    ReadHoldingRegisters = MODBUS_GET_HOLDINGS,
    ReadInputRegisters = MODBUS_GET_INPUTS,
    WriteSingleCoil = MODBUS_SET_COIL,
    WriteSingleRegister = MODBUS_SET_HOLDING,
    ReadExceptionStatus = MODBUS_READ_EXCEPTION_STATUS,
    Diagnostic = MODBUS_DIAGNOSTIC,
    GetComEventCounter = MODBUS_GET_COM_EVENT_COUNTER,
    GetComEventLog = MODBUS_GET_COM_EVENT_LOG,
    WriteMultipleCoils = MODBUS_SET_COILS_BULK,
    WriteMultipleRegisters = MODBUS_SET_HOLDINGS_BULK,
    ReportSlaveId = MODBUS_REPORT_SLAVE_ID,
    ReadFileRecord = MODBUS_READ_FILE_RECORD,
    WriteFileRecord = MODBUS_WRITE_FILE_RECORD,
    MaskWriteRegister = MODBUS_MASK_WRITE_HOLDING,
    ReadWriteMultipleRegisters = MODBUS_READ_WRITE_HOLDINGS,
    ReadFifoQueue = MODBUS_READ_FIFO_QUEUE,
    ReadDeviceIdentification = MODBUS_ENCAPSULATED_INTERFACE,
}

impl Function {
    pub const ALL: [Function; 19] = [
        Function::ReadCoils,
        Function::ReadDiscreteInputs,
        Function::ReadHoldingRegisters,
        Function::ReadInputRegisters,
        Function::WriteSingleCoil,
        Function::WriteSingleRegister,
        Function::ReadExceptionStatus,
        Function::Diagnostic,
        Function::GetComEventCounter,
        Function::GetComEventLog,
        Function::WriteMultipleCoils,
        Function::WriteMultipleRegisters,
        Function::ReportSlaveId,
        Function::ReadFileRecord,
        Function::WriteFileRecord,
        Function::MaskWriteRegister,
        Function::ReadWriteMultipleRegisters,
        Function::ReadFifoQueue,
        Function::ReadDeviceIdentification,
    ];

    /// Returns None for bytes which are not a valid request function
    pub const fn new(code: u8) -> Option<Self> {
        Some(match code {
            MODBUS_GET_COILS => Function::ReadCoils,
            MODBUS_GET_DISCRETES => Function::ReadDiscreteInputs,
            MODBUS_GET_HOLDINGS => Function::ReadHoldingRegisters,
            MODBUS_GET_INPUTS => Function::ReadInputRegisters,
            MODBUS_SET_COIL => Function::WriteSingleCoil,
            MODBUS_SET_HOLDING => Function::WriteSingleRegister,
            MODBUS_READ_EXCEPTION_STATUS => Function::ReadExceptionStatus,
            MODBUS_DIAGNOSTIC => Function::Diagnostic,
            MODBUS_GET_COM_EVENT_COUNTER => Function::GetComEventCounter,
            MODBUS_GET_COM_EVENT_LOG => Function::GetComEventLog,
            MODBUS_SET_COILS_BULK => Function::WriteMultipleCoils,
            MODBUS_SET_HOLDINGS_BULK => Function::WriteMultipleRegisters,
            MODBUS_REPORT_SLAVE_ID => Function::ReportSlaveId,
            MODBUS_READ_FILE_RECORD => Function::ReadFileRecord,
            MODBUS_WRITE_FILE_RECORD => Function::WriteFileRecord,
            MODBUS_MASK_WRITE_HOLDING => Function::MaskWriteRegister,
            MODBUS_READ_WRITE_HOLDINGS => Function::ReadWriteMultipleRegisters,
            MODBUS_READ_FIFO_QUEUE => Function::ReadFifoQueue,
            MODBUS_ENCAPSULATED_INTERFACE => Function::ReadDeviceIdentification,
            _ => return None,
        })
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Wire value of the exception response function byte
    #[inline]
    pub const fn error_value(self) -> u8 {
        self as u8 | MODBUS_ERROR_FLAG
    }

    /// The function modifies slave data
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Function::WriteSingleCoil
                | Function::WriteSingleRegister
                | Function::WriteMultipleCoils
                | Function::WriteMultipleRegisters
                | Function::WriteFileRecord
                | Function::MaskWriteRegister
                | Function::ReadWriteMultipleRegisters
        )
    }

    pub const fn address_space(self) -> AddressSpace {
        match self {
            Function::ReadCoils | Function::WriteSingleCoil | Function::WriteMultipleCoils => {
                AddressSpace::Coil
            }
            Function::ReadDiscreteInputs => AddressSpace::DiscreteInput,
            Function::ReadInputRegisters => AddressSpace::InputRegister,
            Function::ReadHoldingRegisters
            | Function::WriteSingleRegister
            | Function::WriteMultipleRegisters
            | Function::MaskWriteRegister
            | Function::ReadWriteMultipleRegisters => AddressSpace::HoldingRegister,
            Function::ReadExceptionStatus
            | Function::Diagnostic
            | Function::GetComEventCounter
            | Function::GetComEventLog => AddressSpace::SystemStatus,
            Function::ReportSlaveId | Function::ReadDeviceIdentification => {
                AddressSpace::DeviceIdentifier
            }
            Function::ReadFileRecord | Function::WriteFileRecord | Function::ReadFifoQueue => {
                AddressSpace::Unmapped
            }
        }
    }
}

impl TryFrom<u8> for Function {
    type Error = ErrorKind;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Function::new(code).ok_or(ErrorKind::IllegalFunction)
    }
}

/// Function byte of a frame: a request, its exception counterpart or nothing
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionCode {
    Request(Function),
    Error(Function),
    #[default]
    None,
}

impl FunctionCode {
    /// Decodes a wire byte, unknown values become [`FunctionCode::None`]
    pub const fn new(code: u8) -> Self {
        if code & MODBUS_ERROR_FLAG == 0 {
            match Function::new(code) {
                Some(f) => FunctionCode::Request(f),
                None => FunctionCode::None,
            }
        } else {
            match Function::new(code & !MODBUS_ERROR_FLAG) {
                Some(f) => FunctionCode::Error(f),
                None => FunctionCode::None,
            }
        }
    }

    pub const fn value(self) -> u8 {
        match self {
            FunctionCode::Request(f) => f.value(),
            FunctionCode::Error(f) => f.error_value(),
            FunctionCode::None => MODBUS_FUNCTION_NONE,
        }
    }

    /// Exception counterpart of the code
    ///
    /// Error codes and the sentinel are returned unchanged, so the operation is idempotent.
    pub const fn error_function(self) -> Self {
        match self {
            FunctionCode::Request(f) | FunctionCode::Error(f) => FunctionCode::Error(f),
            FunctionCode::None => FunctionCode::None,
        }
    }

    pub const fn function(self) -> Option<Function> {
        match self {
            FunctionCode::Request(f) | FunctionCode::Error(f) => Some(f),
            FunctionCode::None => None,
        }
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        matches!(self, FunctionCode::Error(_))
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        matches!(self, FunctionCode::None)
    }

    pub const fn address_space(self) -> AddressSpace {
        match self {
            FunctionCode::Request(f) | FunctionCode::Error(f) => f.address_space(),
            FunctionCode::None => AddressSpace::Unmapped,
        }
    }
}

impl From<Function> for FunctionCode {
    fn from(f: Function) -> Self {
        FunctionCode::Request(f)
    }
}

impl From<u8> for FunctionCode {
    fn from(code: u8) -> Self {
        FunctionCode::new(code)
    }
}

/// Data area addressed by a function
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressSpace {
    Coil,
    DiscreteInput,
    HoldingRegister,
    InputRegister,
    DeviceIdentifier,
    SystemStatus,
    Unmapped,
}

/// Exception codes carried by exception responses
///
/// Only the first three are raised by the slave. [`Exception::Acknowledge`] shares its wire
/// value with the protocol table but never leaves the device, success is `Ok(())`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Exception {
    IllegalFunction = MODBUS_ERROR_ILLEGAL_FUNCTION,
    IllegalDataAddress = MODBUS_ERROR_ILLEGAL_DATA_ADDRESS,
    IllegalDataValue = MODBUS_ERROR_ILLEGAL_DATA_VALUE,
    SlaveDeviceFailure = MODBUS_ERROR_SLAVE_DEVICE_FAILURE,
    Acknowledge = MODBUS_ERROR_ACKNOWLEDGE,
    SlaveDeviceBusy = MODBUS_ERROR_SLAVE_DEVICE_BUSY,
    NegativeAcknowledge = MODBUS_ERROR_NEGATIVE_ACKNOWLEDGE,
    MemoryParityError = MODBUS_ERROR_MEMORY_PARITY,
    GatewayPathUnavailable = MODBUS_ERROR_GATEWAY_PATH_UNAVAILABLE,
    GatewayTargetNoResponse = MODBUS_ERROR_GATEWAY_TARGET_NO_RESPONSE,
}

impl Exception {
    #[inline]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

impl From<Exception> for ErrorKind {
    fn from(e: Exception) -> Self {
        ErrorKind::from_modbus_error(e.value())
    }
}
