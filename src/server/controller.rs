//! Field controllers
//!
//! Each controller owns the store of one data area and serves the functions addressing it.
//! Serving a request is a two-phase contract: [`validate_frame`](CoilController::validate_frame)
//! decides whether the request is acceptable and which exception to answer otherwise,
//! `read_frame` executes an accepted request and fills the response (without CRC). `read_frame`
//! must not be called for a frame that did not validate.

use super::context::{BitStore, DataStore, RegisterStore};
use crate::codec::{fill_read_response_header, fill_write_response, Command};
use crate::consts::{
    MODBUS_COIL_OFF, MODBUS_COIL_ON, MODBUS_MAX_READ_BITS, MODBUS_MAX_READ_REGISTERS,
    MODBUS_MAX_WRITE_BITS, MODBUS_MAX_WRITE_REGISTERS,
};
use crate::{calc_bytes_for_bits, ErrorKind, Exception, Frame, Function, Response};
use log::error;

/// Decodes a request, mapping decoding failures to the exception to answer
pub(crate) fn decode_request(frame: &Frame) -> Result<Command<'_>, Exception> {
    Command::decode(frame).map_err(|e| match e {
        ErrorKind::IllegalFunction => Exception::IllegalFunction,
        ErrorKind::IllegalDataAddress => Exception::IllegalDataAddress,
        _ => Exception::IllegalDataValue,
    })
}

fn check_quantity(count: u16, limit: u16) -> Result<(), Exception> {
    if count == 0 || count > limit {
        Err(Exception::IllegalDataValue)
    } else {
        Ok(())
    }
}

fn check_span<S: DataStore>(store: &S, address: u16, count: u16) -> Result<(), Exception> {
    if store.is_span_valid(address, count) {
        Ok(())
    } else {
        Err(Exception::IllegalDataAddress)
    }
}

fn unsupported(controller: &str, function: Function) -> ErrorKind {
    error!(
        "{:?} is not served by the {} controller, validate the frame first",
        function, controller
    );
    ErrorKind::UnsupportedFunction
}

fn byte_count(len: usize) -> Result<u8, ErrorKind> {
    u8::try_from(len).map_err(|_| ErrorKind::OOB)
}

macro_rules! store_accessors {
    ($controller:ident, $bound:ident) => {
        impl<S: $bound> $controller<S> {
            pub const fn new(store: S) -> Self {
                Self { store }
            }

            #[inline]
            pub fn store(&self) -> &S {
                &self.store
            }

            #[inline]
            pub fn store_mut(&mut self) -> &mut S {
                &mut self.store
            }

            pub fn into_inner(self) -> S {
                self.store
            }
        }
    };
}

/// Serves ReadCoils, WriteSingleCoil and WriteMultipleCoils
#[derive(Debug, Clone, Default)]
pub struct CoilController<S: BitStore> {
    store: S,
}

store_accessors!(CoilController, BitStore);

impl<S: BitStore> CoilController<S> {
    pub fn validate_frame(&self, frame: &Frame) -> Result<(), Exception> {
        match decode_request(frame)? {
            Command::ReadCoils { address, count } => {
                check_quantity(count, MODBUS_MAX_READ_BITS)?;
                check_span(&self.store, address, count)
            }
            Command::WriteSingleCoil { address, .. } => check_span(&self.store, address, 1),
            Command::WriteMultipleCoils {
                address,
                count,
                values,
            } => {
                check_quantity(count, MODBUS_MAX_WRITE_BITS)?;
                if values.len() != calc_bytes_for_bits(usize::from(count)) {
                    return Err(Exception::IllegalDataValue);
                }
                check_span(&self.store, address, count)
            }
            _ => Err(Exception::IllegalFunction),
        }
    }

    pub fn read_frame(&mut self, frame: &Frame, response: &mut Response) -> Result<(), ErrorKind> {
        match Command::decode(frame)? {
            Command::ReadCoils { address, count } => {
                let len = byte_count(calc_bytes_for_bits(usize::from(count)))?;
                fill_read_response_header(response, frame.address, Function::ReadCoils, len)?;
                self.store.read_elements_to_bytes(address, count, response)
            }
            Command::WriteSingleCoil { address, value } => {
                self.store.write_element(address, value)?;
                let echo = if value { MODBUS_COIL_ON } else { MODBUS_COIL_OFF };
                fill_write_response(
                    response,
                    frame.address,
                    Function::WriteSingleCoil,
                    address,
                    echo,
                )
            }
            Command::WriteMultipleCoils {
                address,
                count,
                values,
            } => {
                self.store.write_elements_from_bytes(address, count, values)?;
                fill_write_response(
                    response,
                    frame.address,
                    Function::WriteMultipleCoils,
                    address,
                    count,
                )
            }
            other => Err(unsupported("coil", other.function())),
        }
    }
}

/// Serves ReadDiscreteInputs
#[derive(Debug, Clone, Default)]
pub struct DiscreteInputController<S: BitStore> {
    store: S,
}

store_accessors!(DiscreteInputController, BitStore);

impl<S: BitStore> DiscreteInputController<S> {
    pub fn validate_frame(&self, frame: &Frame) -> Result<(), Exception> {
        match decode_request(frame)? {
            Command::ReadDiscreteInputs { address, count } => {
                check_quantity(count, MODBUS_MAX_READ_BITS)?;
                check_span(&self.store, address, count)
            }
            _ => Err(Exception::IllegalFunction),
        }
    }

    pub fn read_frame(&mut self, frame: &Frame, response: &mut Response) -> Result<(), ErrorKind> {
        match Command::decode(frame)? {
            Command::ReadDiscreteInputs { address, count } => {
                let len = byte_count(calc_bytes_for_bits(usize::from(count)))?;
                fill_read_response_header(
                    response,
                    frame.address,
                    Function::ReadDiscreteInputs,
                    len,
                )?;
                self.store.read_elements_to_bytes(address, count, response)
            }
            other => Err(unsupported("discrete input", other.function())),
        }
    }
}

/// Serves ReadHoldingRegisters, WriteSingleRegister and WriteMultipleRegisters
///
/// Successful writes are reported to the store with [`RegisterStore::registers_written`].
#[derive(Debug, Clone, Default)]
pub struct HoldingRegisterController<S: RegisterStore> {
    store: S,
}

store_accessors!(HoldingRegisterController, RegisterStore);

impl<S: RegisterStore> HoldingRegisterController<S> {
    pub fn validate_frame(&self, frame: &Frame) -> Result<(), Exception> {
        match decode_request(frame)? {
            Command::ReadHoldingRegisters { address, count } => {
                check_quantity(count, MODBUS_MAX_READ_REGISTERS)?;
                if self.store.is_read_valid(address, count) {
                    Ok(())
                } else {
                    Err(Exception::IllegalDataAddress)
                }
            }
            Command::WriteSingleRegister { address, .. } => {
                if self.store.is_write_valid(address, 1) {
                    Ok(())
                } else {
                    Err(Exception::IllegalDataAddress)
                }
            }
            Command::WriteMultipleRegisters {
                address,
                count,
                values,
            } => {
                check_quantity(count, MODBUS_MAX_WRITE_REGISTERS)?;
                if values.len() != usize::from(count) * 2 {
                    return Err(Exception::IllegalDataValue);
                }
                if self.store.is_write_valid(address, count) {
                    Ok(())
                } else {
                    Err(Exception::IllegalDataAddress)
                }
            }
            _ => Err(Exception::IllegalFunction),
        }
    }

    pub fn read_frame(&mut self, frame: &Frame, response: &mut Response) -> Result<(), ErrorKind> {
        match Command::decode(frame)? {
            Command::ReadHoldingRegisters { address, count } => {
                let len = byte_count(usize::from(count) * 2)?;
                fill_read_response_header(
                    response,
                    frame.address,
                    Function::ReadHoldingRegisters,
                    len,
                )?;
                self.store.get_registers_as_bytes(address, count, response)
            }
            Command::WriteSingleRegister { address, value } => {
                self.store.set_registers_from_bytes(address, 1, &value.to_be_bytes())?;
                self.store.registers_written(address, 1);
                fill_write_response(
                    response,
                    frame.address,
                    Function::WriteSingleRegister,
                    address,
                    value,
                )
            }
            Command::WriteMultipleRegisters {
                address,
                count,
                values,
            } => {
                self.store.set_registers_from_bytes(address, count, values)?;
                self.store.registers_written(address, count);
                fill_write_response(
                    response,
                    frame.address,
                    Function::WriteMultipleRegisters,
                    address,
                    count,
                )
            }
            other => Err(unsupported("holding register", other.function())),
        }
    }
}

/// Serves ReadInputRegisters
#[derive(Debug, Clone, Default)]
pub struct InputRegisterController<S: RegisterStore> {
    store: S,
}

store_accessors!(InputRegisterController, RegisterStore);

impl<S: RegisterStore> InputRegisterController<S> {
    pub fn validate_frame(&self, frame: &Frame) -> Result<(), Exception> {
        match decode_request(frame)? {
            Command::ReadInputRegisters { address, count } => {
                check_quantity(count, MODBUS_MAX_READ_REGISTERS)?;
                if self.store.is_read_valid(address, count) {
                    Ok(())
                } else {
                    Err(Exception::IllegalDataAddress)
                }
            }
            _ => Err(Exception::IllegalFunction),
        }
    }

    pub fn read_frame(&mut self, frame: &Frame, response: &mut Response) -> Result<(), ErrorKind> {
        match Command::decode(frame)? {
            Command::ReadInputRegisters { address, count } => {
                let len = byte_count(usize::from(count) * 2)?;
                fill_read_response_header(
                    response,
                    frame.address,
                    Function::ReadInputRegisters,
                    len,
                )?;
                self.store.get_registers_as_bytes(address, count, response)
            }
            other => Err(unsupported("input register", other.function())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::mapped::tests::device_store;
    use crate::server::storage::{BitStorage, RegisterStorage, UpdatingRegisterStorage};
    use crate::VectorTrait;

    fn frame(function: Function, data: &[u8]) -> Frame {
        Frame::with_data(1, function, data).unwrap()
    }

    #[test]
    fn test_coil_validation() {
        let ctrl = CoilController::new(BitStorage::<20>::new());
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadCoils, &[0, 0, 0, 20])),
            Ok(())
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadCoils, &[0, 1, 0, 20])),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadCoils, &[0, 0, 0, 0])),
            Err(Exception::IllegalDataValue)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadCoils, &[0, 0, 0x07, 0xD1])),
            Err(Exception::IllegalDataValue)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::WriteSingleCoil, &[0, 19, 0xFF, 0])),
            Ok(())
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::WriteSingleCoil, &[0, 20, 0xFF, 0])),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::WriteSingleCoil, &[0, 1, 0x12, 0x34])),
            Err(Exception::IllegalDataValue)
        );
        // 10 coils need two bytes
        assert_eq!(
            ctrl.validate_frame(&frame(
                Function::WriteMultipleCoils,
                &[0, 0, 0, 10, 2, 0xCD, 0x01]
            )),
            Ok(())
        );
        assert_eq!(
            ctrl.validate_frame(&frame(
                Function::WriteMultipleCoils,
                &[0, 0, 0, 10, 3, 0xCD, 0x01, 0]
            )),
            Err(Exception::IllegalDataValue)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadHoldingRegisters, &[0, 0, 0, 1])),
            Err(Exception::IllegalFunction)
        );
    }

    #[test]
    fn test_coil_commands() {
        let mut ctrl = CoilController::new(BitStorage::<32>::new());
        let mut response = Response::new();
        let request = frame(Function::WriteMultipleCoils, &[0, 3, 0, 10, 2, 0xCD, 0x01]);
        ctrl.read_frame(&request, &mut response).unwrap();
        assert_eq!(response.as_slice(), &[1, 0x0F, 0, 3, 0, 10]);
        assert!(ctrl.store().read_element(3).unwrap());
        assert!(!ctrl.store().read_element(4).unwrap());
        assert!(ctrl.store().read_element(11).unwrap());
        assert!(!ctrl.store().read_element(12).unwrap());
        ctrl.read_frame(&frame(Function::WriteSingleCoil, &[0, 4, 0xFF, 0]), &mut response)
            .unwrap();
        assert_eq!(response.as_slice(), &[1, 0x05, 0, 4, 0xFF, 0]);
        ctrl.read_frame(&frame(Function::ReadCoils, &[0, 3, 0, 10]), &mut response)
            .unwrap();
        assert_eq!(response.as_slice(), &[1, 0x01, 2, 0xCF, 0x01]);
        assert_eq!(
            ctrl.read_frame(
                &frame(Function::ReadDiscreteInputs, &[0, 0, 0, 1]),
                &mut response
            ),
            Err(ErrorKind::UnsupportedFunction)
        );
    }

    #[test]
    fn test_discrete_inputs() {
        let mut store = BitStorage::<8>::new();
        store.write_element(0, true).unwrap();
        store.write_element(7, true).unwrap();
        let mut ctrl = DiscreteInputController::new(store);
        let request = frame(Function::ReadDiscreteInputs, &[0, 0, 0, 8]);
        assert_eq!(ctrl.validate_frame(&request), Ok(()));
        let mut response = Response::new();
        ctrl.read_frame(&request, &mut response).unwrap();
        assert_eq!(response.as_slice(), &[1, 0x02, 1, 0x81]);
        assert_eq!(
            ctrl.validate_frame(&frame(Function::WriteSingleCoil, &[0, 0, 0xFF, 0])),
            Err(Exception::IllegalFunction)
        );
    }

    #[test]
    fn test_holding_registers() {
        let mut ctrl = HoldingRegisterController::new(UpdatingRegisterStorage::<8>::new());
        let mut response = Response::new();
        assert_eq!(
            ctrl.validate_frame(&frame(Function::WriteSingleRegister, &[0, 8, 0, 1])),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(
                Function::WriteMultipleRegisters,
                &[0, 1, 0, 2, 3, 0, 0x0A, 0x01]
            )),
            Err(Exception::IllegalDataValue)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadHoldingRegisters, &[0, 0, 0, 126])),
            Err(Exception::IllegalDataValue)
        );
        let request = frame(
            Function::WriteMultipleRegisters,
            &[0, 1, 0, 2, 4, 0, 0x0A, 0x01, 0x02],
        );
        assert_eq!(ctrl.validate_frame(&request), Ok(()));
        assert!(!ctrl.store().new_data_available());
        ctrl.read_frame(&request, &mut response).unwrap();
        assert_eq!(response.as_slice(), &[1, 0x10, 0, 1, 0, 2]);
        assert!(ctrl.store().new_data_available());
        assert!(ctrl.store().is_new_data(2));
        assert!(!ctrl.store().is_new_data(3));
        ctrl.store_mut().clear_new_data();
        ctrl.read_frame(&frame(Function::WriteSingleRegister, &[0, 7, 0xBE, 0xEF]), &mut response)
            .unwrap();
        assert_eq!(response.as_slice(), &[1, 0x06, 0, 7, 0xBE, 0xEF]);
        assert!(ctrl.store().is_new_data(7));
        ctrl.read_frame(&frame(Function::ReadHoldingRegisters, &[0, 1, 0, 2]), &mut response)
            .unwrap();
        assert_eq!(response.as_slice(), &[1, 0x03, 4, 0, 0x0A, 0x01, 0x02]);
    }

    #[test]
    fn test_mapped_holding_registers() {
        let mut ctrl = HoldingRegisterController::new(device_store());
        let mut response = Response::new();
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadHoldingRegisters, &[0, 2, 0, 2])),
            Ok(())
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadHoldingRegisters, &[0, 2, 0, 1])),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(
            ctrl.validate_frame(&frame(Function::WriteSingleRegister, &[0, 2, 0, 1])),
            Err(Exception::IllegalDataAddress)
        );
        let request = frame(
            Function::WriteMultipleRegisters,
            &[0, 2, 0, 2, 4, 0, 0, 0x30, 0x39],
        );
        assert_eq!(ctrl.validate_frame(&request), Ok(()));
        ctrl.read_frame(&request, &mut response).unwrap();
        assert_eq!(ctrl.store().map().counter, 12345);
        assert!(ctrl.store().new_data_available());
        ctrl.read_frame(&frame(Function::ReadHoldingRegisters, &[0, 0, 0, 2]), &mut response)
            .unwrap();
        assert_eq!(response.as_slice(), &[1, 0x03, 4, b'P', b'U', b'M', b'P']);
    }

    #[test]
    fn test_input_registers() {
        let mut store = RegisterStorage::<4>::new();
        store.set_registers(0, &[0x1234, 0x5678]).unwrap();
        let mut ctrl = InputRegisterController::new(store);
        let request = frame(Function::ReadInputRegisters, &[0, 0, 0, 2]);
        assert_eq!(ctrl.validate_frame(&request), Ok(()));
        assert_eq!(
            ctrl.validate_frame(&frame(Function::ReadInputRegisters, &[0, 3, 0, 2])),
            Err(Exception::IllegalDataAddress)
        );
        let mut response = Response::new();
        ctrl.read_frame(&request, &mut response).unwrap();
        assert_eq!(response.as_slice(), &[1, 0x04, 4, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(
            ctrl.read_frame(
                &frame(Function::WriteSingleRegister, &[0, 0, 0, 1]),
                &mut response
            ),
            Err(ErrorKind::UnsupportedFunction)
        );
    }
}
