//! Read Device Identification (function 0x2B, MEI type 0x0E)

use super::controller::decode_request;
use crate::codec::{fill_response_header, Command};
use crate::consts::{
    MODBUS_DEVICE_ID_BASIC, MODBUS_DEVICE_ID_CONFORMITY, MODBUS_DEVICE_ID_EXTENDED,
    MODBUS_DEVICE_ID_REGULAR, MODBUS_DEVICE_ID_SPECIFIC, MODBUS_MEI_READ_DEVICE_ID,
};
use crate::{ErrorKind, Exception, Frame, Function, Response, VectorTrait, MAX_DATA_LEN};

/// Last object of the basic category
const LAST_BASIC_OBJECT: u8 = 0x02;
/// Last object of the regular category
const LAST_OBJECT: u8 = 0x06;
/// MEI type, read code, conformity, more follows, next object id, number of objects
const OBJECTS_HEADER_LEN: usize = 6;
const MAX_OBJECTS_LEN: usize = MAX_DATA_LEN - OBJECTS_HEADER_LEN;

/// Identification objects of the device, served verbatim
///
/// Objects 0-2 form the basic category, 3-6 the regular one.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct DeviceIdentifier<'a> {
    pub vendor_name: &'a str,
    pub product_code: &'a str,
    pub major_minor_revision: &'a str,
    pub vendor_url: &'a str,
    pub product_name: &'a str,
    pub model_name: &'a str,
    pub user_application_name: &'a str,
}

impl<'a> DeviceIdentifier<'a> {
    pub fn object(&self, id: u8) -> Option<&'a str> {
        Some(match id {
            0x00 => self.vendor_name,
            0x01 => self.product_code,
            0x02 => self.major_minor_revision,
            0x03 => self.vendor_url,
            0x04 => self.product_name,
            0x05 => self.model_name,
            0x06 => self.user_application_name,
            _ => return None,
        })
    }
}

/// Serves basic stream access and individual access to the identification objects
#[derive(Debug, Clone)]
pub struct DeviceIdentifierController<'a> {
    identifier: DeviceIdentifier<'a>,
}

impl<'a> DeviceIdentifierController<'a> {
    pub const fn new(identifier: DeviceIdentifier<'a>) -> Self {
        Self { identifier }
    }

    #[inline]
    pub fn identifier(&self) -> &DeviceIdentifier<'a> {
        &self.identifier
    }

    pub fn validate_frame(&self, frame: &Frame) -> Result<(), Exception> {
        match decode_request(frame)? {
            Command::ReadDeviceIdentification {
                read_code,
                object_id,
            } => match read_code {
                MODBUS_DEVICE_ID_BASIC => Ok(()),
                MODBUS_DEVICE_ID_SPECIFIC if object_id <= LAST_OBJECT => Ok(()),
                MODBUS_DEVICE_ID_SPECIFIC => Err(Exception::IllegalDataAddress),
                // only the basic category is provided
                MODBUS_DEVICE_ID_REGULAR | MODBUS_DEVICE_ID_EXTENDED => {
                    Err(Exception::IllegalDataValue)
                }
                _ => Err(Exception::IllegalDataValue),
            },
            _ => Err(Exception::IllegalFunction),
        }
    }

    /// Fills the identification response
    ///
    /// Basic stream access restarts at object 0 when the requested object is outside the
    /// category. Objects which do not fit into one response are announced with the "more
    /// follows" flag and the id to continue with.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_frame(&self, frame: &Frame, response: &mut Response) -> Result<(), ErrorKind> {
        let Command::ReadDeviceIdentification {
            read_code,
            object_id,
        } = Command::decode(frame)?
        else {
            return Err(ErrorKind::UnsupportedFunction);
        };
        let (first, last) = match read_code {
            MODBUS_DEVICE_ID_BASIC if object_id <= LAST_BASIC_OBJECT => {
                (object_id, LAST_BASIC_OBJECT)
            }
            MODBUS_DEVICE_ID_BASIC => (0, LAST_BASIC_OBJECT),
            MODBUS_DEVICE_ID_SPECIFIC if object_id <= LAST_OBJECT => (object_id, object_id),
            _ => return Err(ErrorKind::IllegalDataValue),
        };
        fill_response_header(response, frame.address, Function::ReadDeviceIdentification.into())?;
        response.extend(&[
            MODBUS_MEI_READ_DEVICE_ID,
            read_code,
            MODBUS_DEVICE_ID_CONFORMITY,
            0,
            0,
            0,
        ])?;
        let header = response.len() - OBJECTS_HEADER_LEN;
        let mut used = 0;
        let mut count = 0u8;
        let mut next = None;
        for id in first..=last {
            let value = self.identifier.object(id).unwrap_or_default().as_bytes();
            // a single object never exceeds one response
            let value = &value[..value.len().min(MAX_OBJECTS_LEN - 2)];
            if used + 2 + value.len() > MAX_OBJECTS_LEN {
                next = Some(id);
                break;
            }
            response.extend(&[id, value.len() as u8])?;
            response.extend(value)?;
            used += 2 + value.len();
            count += 1;
        }
        if let Some(id) = next {
            response.replace(header + 3, 0xFF)?;
            response.replace(header + 4, id)?;
        }
        response.replace(header + 5, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    const IDENTIFIER: DeviceIdentifier<'static> = DeviceIdentifier {
        vendor_name: "Acme",
        product_code: "RTU-1",
        major_minor_revision: "1.2",
        vendor_url: "https://example.com",
        product_name: "Pump controller",
        model_name: "PC-8",
        user_application_name: "station",
    };

    fn request(read_code: u8, object_id: u8) -> Frame {
        Frame::with_data(
            3,
            Function::ReadDeviceIdentification,
            &[MODBUS_MEI_READ_DEVICE_ID, read_code, object_id],
        )
        .unwrap()
    }

    #[test]
    fn test_device_id_validation() {
        let ctrl = DeviceIdentifierController::new(IDENTIFIER);
        assert_eq!(ctrl.validate_frame(&request(1, 0)), Ok(()));
        assert_eq!(ctrl.validate_frame(&request(1, 9)), Ok(()));
        assert_eq!(ctrl.validate_frame(&request(4, 6)), Ok(()));
        assert_eq!(
            ctrl.validate_frame(&request(4, 7)),
            Err(Exception::IllegalDataAddress)
        );
        assert_eq!(
            ctrl.validate_frame(&request(MODBUS_DEVICE_ID_REGULAR, 0)),
            Err(Exception::IllegalDataValue)
        );
        assert_eq!(
            ctrl.validate_frame(&request(MODBUS_DEVICE_ID_EXTENDED, 3)),
            Err(Exception::IllegalDataValue)
        );
        assert_eq!(
            ctrl.validate_frame(&request(0x05, 0)),
            Err(Exception::IllegalDataValue)
        );
        let wrong_mei =
            Frame::with_data(3, Function::ReadDeviceIdentification, &[0x0D, 1, 0]).unwrap();
        assert_eq!(
            ctrl.validate_frame(&wrong_mei),
            Err(Exception::IllegalDataAddress)
        );
    }

    #[test]
    fn test_basic_stream() {
        let ctrl = DeviceIdentifierController::new(IDENTIFIER);
        let mut response = Response::new();
        ctrl.read_frame(&request(1, 0), &mut response).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&[3, 0x2B, 0x0E, 0x01, 0x81, 0, 0, 3]);
        expected.extend_from_slice(&[0, 4]);
        expected.extend_from_slice(b"Acme");
        expected.extend_from_slice(&[1, 5]);
        expected.extend_from_slice(b"RTU-1");
        expected.extend_from_slice(&[2, 3]);
        expected.extend_from_slice(b"1.2");
        assert_eq!(response.as_slice(), expected.as_slice());
        // unknown start object restarts the stream
        let mut restarted = Response::new();
        ctrl.read_frame(&request(1, 0x20), &mut restarted).unwrap();
        assert_eq!(restarted.as_slice(), response.as_slice());
    }

    #[test]
    fn test_specific_object() {
        let ctrl = DeviceIdentifierController::new(IDENTIFIER);
        let mut response = Response::new();
        ctrl.read_frame(&request(4, 5), &mut response).unwrap();
        assert_eq!(
            response.as_slice(),
            &[3, 0x2B, 0x0E, 0x04, 0x81, 0, 0, 1, 5, 4, b'P', b'C', b'-', b'8']
        );
        assert_eq!(
            ctrl.read_frame(&request(4, 7), &mut response),
            Err(ErrorKind::IllegalDataValue)
        );
    }

    #[test]
    fn test_more_follows() {
        let long = "x".repeat(120);
        let ctrl = DeviceIdentifierController::new(DeviceIdentifier {
            vendor_name: &long,
            product_code: &long,
            major_minor_revision: "1.0",
            ..IDENTIFIER
        });
        let mut response = Response::new();
        ctrl.read_frame(&request(1, 0), &mut response).unwrap();
        let data = &response.as_slice()[2..];
        assert_eq!(&data[..6], &[0x0E, 0x01, 0x81, 0xFF, 2, 2]);
        assert_eq!(data.len(), 6 + 2 * 122);
        ctrl.read_frame(&request(1, 2), &mut response).unwrap();
        assert_eq!(&response.as_slice()[2..8], &[0x0E, 0x01, 0x81, 0, 0, 1]);
    }
}
