//! Wire layouts of Modbus request and response data sections
//!
//! All offsets are relative to the data section, i.e. the first byte after the slave address and
//! the function byte. Multi-byte fields are big-endian.

use crate::consts::{
    MODBUS_COIL_OFF, MODBUS_COIL_ON, MODBUS_DEVICE_ID_BASIC, MODBUS_MEI_READ_DEVICE_ID,
};
use crate::{ErrorKind, Frame, Function, FunctionCode, VectorTrait};

/// Request field offsets
pub mod request {
    /// First element address, all data-area functions
    pub const ADDRESS: usize = 0;
    /// Element count of reads and bulk writes
    pub const COUNT: usize = 2;
    /// Value of single writes
    pub const VALUE: usize = 2;
    /// Byte count of bulk writes
    pub const BYTE_COUNT: usize = 4;
    /// Packed values of bulk writes
    pub const VALUES: usize = 5;
    pub const MEI_TYPE: usize = 0;
    pub const READ_DEVICE_ID_CODE: usize = 1;
    pub const OBJECT_ID: usize = 2;

    pub const READ_LEN: usize = 4;
    pub const WRITE_SINGLE_LEN: usize = 4;
    pub const WRITE_MULTIPLE_HEADER_LEN: usize = 5;
    pub const READ_DEVICE_ID_LEN: usize = 3;
}

/// Response field offsets
pub mod response {
    /// Byte count of read replies
    pub const BYTE_COUNT: usize = 0;
    /// Packed values of read replies
    pub const VALUES: usize = 1;
    /// Echoed address of write replies
    pub const ADDRESS: usize = 0;
    /// Echoed value (single writes) or count (bulk writes)
    pub const VALUE: usize = 2;
    pub const WRITE_LEN: usize = 4;
    /// Exception code of exception replies
    pub const EXCEPTION: usize = 0;

    pub const MEI_TYPE: usize = 0;
    pub const READ_DEVICE_ID_CODE: usize = 1;
    pub const CONFORMITY: usize = 2;
    pub const MORE_FOLLOWS: usize = 3;
    pub const NEXT_OBJECT_ID: usize = 4;
    pub const OBJECT_COUNT: usize = 5;
    pub const OBJECTS: usize = 6;
}

/// Shape of a request data section, used to predict where a frame ends
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestLayout {
    /// Bytes which are always present, the byte count field included
    pub fixed_len: usize,
    /// Offset of a one-byte count of the variable part following the fixed part
    pub byte_count: Option<usize>,
}

impl RequestLayout {
    const fn fixed(fixed_len: usize) -> Self {
        Self {
            fixed_len,
            byte_count: None,
        }
    }

    const fn counted(fixed_len: usize, byte_count: usize) -> Self {
        Self {
            fixed_len,
            byte_count: Some(byte_count),
        }
    }
}

pub const fn request_layout(function: Function) -> RequestLayout {
    match function {
        Function::ReadCoils
        | Function::ReadDiscreteInputs
        | Function::ReadHoldingRegisters
        | Function::ReadInputRegisters
        | Function::WriteSingleCoil
        | Function::WriteSingleRegister
        | Function::Diagnostic => RequestLayout::fixed(4),
        Function::ReadExceptionStatus
        | Function::GetComEventCounter
        | Function::GetComEventLog
        | Function::ReportSlaveId => RequestLayout::fixed(0),
        Function::WriteMultipleCoils | Function::WriteMultipleRegisters => {
            RequestLayout::counted(request::WRITE_MULTIPLE_HEADER_LEN, request::BYTE_COUNT)
        }
        Function::ReadFileRecord | Function::WriteFileRecord => RequestLayout::counted(1, 0),
        Function::MaskWriteRegister => RequestLayout::fixed(6),
        Function::ReadWriteMultipleRegisters => RequestLayout::counted(9, 8),
        Function::ReadFifoQueue => RequestLayout::fixed(2),
        Function::ReadDeviceIdentification => RequestLayout::fixed(request::READ_DEVICE_ID_LEN),
    }
}

/// Decoded request of one of the supported functions
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command<'a> {
    ReadCoils { address: u16, count: u16 },
    ReadDiscreteInputs { address: u16, count: u16 },
    ReadHoldingRegisters { address: u16, count: u16 },
    ReadInputRegisters { address: u16, count: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    /// `values` holds `ceil(count / 8)` bytes, LSB first
    WriteMultipleCoils { address: u16, count: u16, values: &'a [u8] },
    /// `values` holds `count` big-endian words
    WriteMultipleRegisters { address: u16, count: u16, values: &'a [u8] },
    ReadDeviceIdentification { read_code: u8, object_id: u8 },
}

impl<'a> Command<'a> {
    pub fn function(&self) -> Function {
        match self {
            Command::ReadCoils { .. } => Function::ReadCoils,
            Command::ReadDiscreteInputs { .. } => Function::ReadDiscreteInputs,
            Command::ReadHoldingRegisters { .. } => Function::ReadHoldingRegisters,
            Command::ReadInputRegisters { .. } => Function::ReadInputRegisters,
            Command::WriteSingleCoil { .. } => Function::WriteSingleCoil,
            Command::WriteSingleRegister { .. } => Function::WriteSingleRegister,
            Command::WriteMultipleCoils { .. } => Function::WriteMultipleCoils,
            Command::WriteMultipleRegisters { .. } => Function::WriteMultipleRegisters,
            Command::ReadDeviceIdentification { .. } => Function::ReadDeviceIdentification,
        }
    }

    /// Reads the request fields of a frame
    ///
    /// Errors:
    ///
    /// * **IllegalFunction** the frame is not a request of a supported function
    /// * **FrameBroken** the data section is shorter than the layout requires
    /// * **IllegalDataValue** a single coil value other than 0xFF00 / 0x0000
    /// * **IllegalDataAddress** an encapsulated interface request other than device id
    pub fn decode(frame: &'a Frame) -> Result<Self, ErrorKind> {
        let FunctionCode::Request(function) = frame.function else {
            return Err(ErrorKind::IllegalFunction);
        };
        let word = |offset| frame.word(offset).ok_or(ErrorKind::FrameBroken);
        let command = match function {
            Function::ReadCoils => Command::ReadCoils {
                address: word(request::ADDRESS)?,
                count: word(request::COUNT)?,
            },
            Function::ReadDiscreteInputs => Command::ReadDiscreteInputs {
                address: word(request::ADDRESS)?,
                count: word(request::COUNT)?,
            },
            Function::ReadHoldingRegisters => Command::ReadHoldingRegisters {
                address: word(request::ADDRESS)?,
                count: word(request::COUNT)?,
            },
            Function::ReadInputRegisters => Command::ReadInputRegisters {
                address: word(request::ADDRESS)?,
                count: word(request::COUNT)?,
            },
            Function::WriteSingleCoil => Command::WriteSingleCoil {
                address: word(request::ADDRESS)?,
                value: match word(request::VALUE)? {
                    MODBUS_COIL_ON => true,
                    MODBUS_COIL_OFF => false,
                    _ => return Err(ErrorKind::IllegalDataValue),
                },
            },
            Function::WriteSingleRegister => Command::WriteSingleRegister {
                address: word(request::ADDRESS)?,
                value: word(request::VALUE)?,
            },
            Function::WriteMultipleCoils => Command::WriteMultipleCoils {
                address: word(request::ADDRESS)?,
                count: word(request::COUNT)?,
                values: counted_values(frame)?,
            },
            Function::WriteMultipleRegisters => Command::WriteMultipleRegisters {
                address: word(request::ADDRESS)?,
                count: word(request::COUNT)?,
                values: counted_values(frame)?,
            },
            Function::ReadDeviceIdentification => {
                let mei = frame
                    .byte(request::MEI_TYPE)
                    .ok_or(ErrorKind::FrameBroken)?;
                if mei != MODBUS_MEI_READ_DEVICE_ID {
                    return Err(ErrorKind::IllegalDataAddress);
                }
                Command::ReadDeviceIdentification {
                    read_code: frame
                        .byte(request::READ_DEVICE_ID_CODE)
                        .ok_or(ErrorKind::FrameBroken)?,
                    object_id: frame
                        .byte(request::OBJECT_ID)
                        .ok_or(ErrorKind::FrameBroken)?,
                }
            }
            _ => return Err(ErrorKind::IllegalFunction),
        };
        Ok(command)
    }

    /// Writes function and data section of the request into a frame
    ///
    /// The frame address is left untouched.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, frame: &mut Frame) -> Result<(), ErrorKind> {
        let address = frame.address;
        frame.reset();
        frame.address = address;
        frame.function = FunctionCode::Request(self.function());
        match *self {
            Command::ReadCoils { address, count }
            | Command::ReadDiscreteInputs { address, count }
            | Command::ReadHoldingRegisters { address, count }
            | Command::ReadInputRegisters { address, count } => {
                frame.extend(&address.to_be_bytes())?;
                frame.extend(&count.to_be_bytes())?;
            }
            Command::WriteSingleCoil { address, value } => {
                frame.extend(&address.to_be_bytes())?;
                let value = if value { MODBUS_COIL_ON } else { MODBUS_COIL_OFF };
                frame.extend(&value.to_be_bytes())?;
            }
            Command::WriteSingleRegister { address, value } => {
                frame.extend(&address.to_be_bytes())?;
                frame.extend(&value.to_be_bytes())?;
            }
            Command::WriteMultipleCoils {
                address,
                count,
                values,
            }
            | Command::WriteMultipleRegisters {
                address,
                count,
                values,
            } => {
                if values.len() > usize::from(u8::MAX) {
                    return Err(ErrorKind::OOB);
                }
                frame.extend(&address.to_be_bytes())?;
                frame.extend(&count.to_be_bytes())?;
                frame.push(values.len() as u8)?;
                frame.extend(values)?;
            }
            Command::ReadDeviceIdentification {
                read_code,
                object_id,
            } => {
                frame.extend(&[MODBUS_MEI_READ_DEVICE_ID, read_code, object_id])?;
            }
        }
        Ok(())
    }
}

fn counted_values(frame: &Frame) -> Result<&[u8], ErrorKind> {
    let byte_count = frame
        .byte(request::BYTE_COUNT)
        .ok_or(ErrorKind::FrameBroken)?;
    frame
        .data()
        .get(request::VALUES..request::VALUES + usize::from(byte_count))
        .ok_or(ErrorKind::FrameBroken)
}

/// Starts a response with the slave address and function byte
pub fn fill_response_header<V: VectorTrait<u8>>(
    response: &mut V,
    address: u8,
    function: FunctionCode,
) -> Result<(), ErrorKind> {
    response.clear();
    response.extend(&[address, function.value()])
}

/// Header of read replies: slave address, function and byte count of the values to follow
pub fn fill_read_response_header<V: VectorTrait<u8>>(
    response: &mut V,
    address: u8,
    function: Function,
    byte_count: u8,
) -> Result<(), ErrorKind> {
    fill_response_header(response, address, function.into())?;
    response.push(byte_count)
}

/// Complete reply of write functions, echoing the element address and value (or count)
pub fn fill_write_response<V: VectorTrait<u8>>(
    response: &mut V,
    address: u8,
    function: Function,
    element: u16,
    value: u16,
) -> Result<(), ErrorKind> {
    fill_response_header(response, address, function.into())?;
    response.extend(&element.to_be_bytes())?;
    response.extend(&value.to_be_bytes())
}

/// Complete exception reply without CRC
pub fn fill_exception_response<V: VectorTrait<u8>>(
    response: &mut V,
    address: u8,
    function: FunctionCode,
    exception: u8,
) -> Result<(), ErrorKind> {
    fill_response_header(response, address, function.error_function())?;
    response.push(exception)
}

/// Decoded reply data section
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Reply<'a> {
    /// Packed bits or big-endian words of read replies
    Values(&'a [u8]),
    /// Write echo: element address plus value (single writes) or count (bulk writes)
    Echo { address: u16, value: u16 },
    DeviceIdentification {
        read_code: u8,
        conformity: u8,
        more_follows: bool,
        next_object_id: u8,
        object_count: u8,
        /// `[id][len][bytes]` records
        objects: &'a [u8],
    },
    /// Exception code of an exception reply
    Exception(u8),
}

impl<'a> Reply<'a> {
    pub fn decode(frame: &'a Frame) -> Result<Self, ErrorKind> {
        let byte = |offset| frame.byte(offset).ok_or(ErrorKind::FrameBroken);
        let function = match frame.function {
            FunctionCode::Error(_) => return Ok(Reply::Exception(byte(response::EXCEPTION)?)),
            FunctionCode::Request(f) => f,
            FunctionCode::None => return Err(ErrorKind::FrameBroken),
        };
        match function {
            Function::ReadCoils
            | Function::ReadDiscreteInputs
            | Function::ReadHoldingRegisters
            | Function::ReadInputRegisters => {
                let byte_count = usize::from(byte(response::BYTE_COUNT)?);
                frame
                    .data()
                    .get(response::VALUES..response::VALUES + byte_count)
                    .map(Reply::Values)
                    .ok_or(ErrorKind::FrameBroken)
            }
            Function::WriteSingleCoil
            | Function::WriteSingleRegister
            | Function::WriteMultipleCoils
            | Function::WriteMultipleRegisters => Ok(Reply::Echo {
                address: frame
                    .word(response::ADDRESS)
                    .ok_or(ErrorKind::FrameBroken)?,
                value: frame.word(response::VALUE).ok_or(ErrorKind::FrameBroken)?,
            }),
            Function::ReadDeviceIdentification => {
                if byte(response::MEI_TYPE)? != MODBUS_MEI_READ_DEVICE_ID {
                    return Err(ErrorKind::FrameBroken);
                }
                Ok(Reply::DeviceIdentification {
                    read_code: byte(response::READ_DEVICE_ID_CODE)?,
                    conformity: byte(response::CONFORMITY)?,
                    more_follows: byte(response::MORE_FOLLOWS)? != 0,
                    next_object_id: byte(response::NEXT_OBJECT_ID)?,
                    object_count: byte(response::OBJECT_COUNT)?,
                    objects: frame
                        .data()
                        .get(response::OBJECTS..)
                        .ok_or(ErrorKind::FrameBroken)?,
                })
            }
            _ => Err(ErrorKind::IllegalFunction),
        }
    }
}

/// Request for the basic device identification stream
pub const fn basic_device_identification<'a>() -> Command<'a> {
    Command::ReadDeviceIdentification {
        read_code: MODBUS_DEVICE_ID_BASIC,
        object_id: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(command: Command) {
        let mut frame = Frame::new();
        frame.address = 0x11;
        command.encode(&mut frame).unwrap();
        assert_eq!(frame.address, 0x11);
        assert_eq!(frame.function, FunctionCode::Request(command.function()));
        let decoded = Command::decode(&frame).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_command_layouts() {
        let mut frame = Frame::new();
        Command::ReadHoldingRegisters {
            address: 0x006B,
            count: 3,
        }
        .encode(&mut frame)
        .unwrap();
        assert_eq!(frame.data(), &[0x00, 0x6B, 0x00, 0x03]);
        Command::WriteSingleCoil {
            address: 0x00AC,
            value: true,
        }
        .encode(&mut frame)
        .unwrap();
        assert_eq!(frame.data(), &[0x00, 0xAC, 0xFF, 0x00]);
        Command::WriteMultipleCoils {
            address: 0x0013,
            count: 10,
            values: &[0xCD, 0x01],
        }
        .encode(&mut frame)
        .unwrap();
        assert_eq!(frame.data(), &[0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]);
        Command::WriteMultipleRegisters {
            address: 0x0001,
            count: 2,
            values: &[0x00, 0x0A, 0x01, 0x02],
        }
        .encode(&mut frame)
        .unwrap();
        assert_eq!(
            frame.data(),
            &[0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
        basic_device_identification().encode(&mut frame).unwrap();
        assert_eq!(frame.data(), &[0x0E, 0x01, 0x00]);
    }

    #[test]
    fn test_command_round_trip() {
        round_trip(Command::ReadCoils {
            address: 19,
            count: 37,
        });
        round_trip(Command::ReadDiscreteInputs {
            address: 196,
            count: 22,
        });
        round_trip(Command::ReadInputRegisters {
            address: 8,
            count: 1,
        });
        round_trip(Command::WriteSingleCoil {
            address: 3,
            value: false,
        });
        round_trip(Command::WriteSingleRegister {
            address: 1,
            value: 0xBEEF,
        });
        round_trip(Command::ReadDeviceIdentification {
            read_code: 4,
            object_id: 2,
        });
    }

    #[test]
    fn test_command_decode_errors() {
        let frame = Frame::with_data(1, Function::WriteSingleCoil, &[0, 1, 0x12, 0x34]).unwrap();
        assert_eq!(Command::decode(&frame), Err(ErrorKind::IllegalDataValue));
        let frame = Frame::with_data(1, Function::ReadCoils, &[0, 1, 0]).unwrap();
        assert_eq!(Command::decode(&frame), Err(ErrorKind::FrameBroken));
        let frame =
            Frame::with_data(1, Function::WriteMultipleRegisters, &[0, 1, 0, 2, 4, 0, 1]).unwrap();
        assert_eq!(Command::decode(&frame), Err(ErrorKind::FrameBroken));
        let frame = Frame::with_data(1, Function::Diagnostic, &[0, 0, 0x12, 0x34]).unwrap();
        assert_eq!(Command::decode(&frame), Err(ErrorKind::IllegalFunction));
        let frame = Frame::with_data(1, Function::ReadDeviceIdentification, &[0x0D, 1, 0]).unwrap();
        assert_eq!(Command::decode(&frame), Err(ErrorKind::IllegalDataAddress));
        let frame = Frame::with_data(1, FunctionCode::Error(Function::ReadCoils), &[2]).unwrap();
        assert_eq!(Command::decode(&frame), Err(ErrorKind::IllegalFunction));
    }

    #[test]
    fn test_request_layout_table() {
        assert_eq!(request_layout(Function::ReadCoils).fixed_len, 4);
        assert_eq!(request_layout(Function::WriteSingleRegister).byte_count, None);
        assert_eq!(
            request_layout(Function::WriteMultipleRegisters),
            RequestLayout {
                fixed_len: 5,
                byte_count: Some(4)
            }
        );
        assert_eq!(
            request_layout(Function::ReadWriteMultipleRegisters).byte_count,
            Some(8)
        );
        assert_eq!(request_layout(Function::ReportSlaveId).fixed_len, 0);
        assert_eq!(request_layout(Function::ReadDeviceIdentification).fixed_len, 3);
    }

    #[test]
    fn test_reply_decode() {
        let frame = Frame::with_data(1, Function::ReadHoldingRegisters, &[4, 0xDE, 0xAD, 0xBE, 0xEF])
            .unwrap();
        assert_eq!(
            Reply::decode(&frame),
            Ok(Reply::Values(&[0xDE, 0xAD, 0xBE, 0xEF]))
        );
        let frame = Frame::with_data(1, Function::ReadCoils, &[2, 0x01]).unwrap();
        assert_eq!(Reply::decode(&frame), Err(ErrorKind::FrameBroken));
        let frame = Frame::with_data(1, Function::WriteMultipleCoils, &[0, 0x13, 0, 0x0A]).unwrap();
        assert_eq!(
            Reply::decode(&frame),
            Ok(Reply::Echo {
                address: 0x13,
                value: 10
            })
        );
        let frame = Frame::with_data(1, FunctionCode::new(0x86), &[2]).unwrap();
        assert_eq!(Reply::decode(&frame), Ok(Reply::Exception(2)));
    }

    #[test]
    fn test_fill_responses() {
        let mut response = crate::Response::new();
        fill_read_response_header(&mut response, 3, Function::ReadInputRegisters, 2).unwrap();
        assert_eq!(response.as_slice(), &[3, 4, 2]);
        fill_write_response(&mut response, 3, Function::WriteSingleRegister, 1, 0x0003).unwrap();
        assert_eq!(response.as_slice(), &[3, 6, 0, 1, 0, 3]);
        fill_exception_response(
            &mut response,
            3,
            Function::WriteSingleRegister.into(),
            crate::Exception::IllegalDataAddress.value(),
        )
        .unwrap();
        assert_eq!(response.as_slice(), &[3, 0x86, 2]);
    }
}
