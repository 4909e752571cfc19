//! Request generator for RTU masters
//!
//! Builds request ADUs for the functions the slave serves and checks and decodes the replies.
//! Transport, timeouts and retries are up to the caller.

use crate::codec::{Command, Reply};
use crate::consts::{MODBUS_MAX_WRITE_BITS, MODBUS_MAX_WRITE_REGISTERS};
use crate::rtu::{crc_is_valid, frame_adu, read_adu};
use crate::{calc_bytes_for_bits, ErrorKind, Frame, Function, FunctionCode, VectorTrait};

/// Modbus RTU request generator/processor
///
/// One object can be used for multiple calls, the reply is always checked against the last
/// generated request.
pub struct ModbusRequest {
    pub unit_id: u8,
    pub function: Function,
    pub reg: u16,
    pub count: u16,
}

impl ModbusRequest {
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            function: Function::ReadHoldingRegisters,
            reg: 0,
            count: 0,
        }
    }

    pub fn generate_get_coils<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        count: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::ReadCoils {
                address: reg,
                count,
            },
            reg,
            count,
            request,
        )
    }

    pub fn generate_get_discretes<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        count: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::ReadDiscreteInputs {
                address: reg,
                count,
            },
            reg,
            count,
            request,
        )
    }

    pub fn generate_get_holdings<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        count: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::ReadHoldingRegisters {
                address: reg,
                count,
            },
            reg,
            count,
            request,
        )
    }

    pub fn generate_get_inputs<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        count: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::ReadInputRegisters {
                address: reg,
                count,
            },
            reg,
            count,
            request,
        )
    }

    pub fn generate_set_coil<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        value: bool,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::WriteSingleCoil {
                address: reg,
                value,
            },
            reg,
            1,
            request,
        )
    }

    pub fn generate_set_holding<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        value: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::WriteSingleRegister {
                address: reg,
                value,
            },
            reg,
            1,
            request,
        )
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn generate_set_holdings_bulk<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        values: &[u16],
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        if values.is_empty() || values.len() > usize::from(MODBUS_MAX_WRITE_REGISTERS) {
            return Err(ErrorKind::OOB);
        }
        let mut data = [0u8; 2 * MODBUS_MAX_WRITE_REGISTERS as usize];
        for (chunk, v) in data.chunks_exact_mut(2).zip(values) {
            chunk.copy_from_slice(&v.to_be_bytes());
        }
        let count = values.len() as u16;
        self.generate(
            Command::WriteMultipleRegisters {
                address: reg,
                count,
                values: &data[..values.len() * 2],
            },
            reg,
            count,
            request,
        )
    }

    /// Writes a string into consecutive registers, two characters per register
    ///
    /// Odd-length strings are padded with a zero byte.
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate_set_holdings_string<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        values: &str,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        let values = values.as_bytes();
        let length = values.len() + values.len() % 2;
        if length == 0 || length > 2 * usize::from(MODBUS_MAX_WRITE_REGISTERS) {
            return Err(ErrorKind::OOB);
        }
        let mut data = [0u8; 2 * MODBUS_MAX_WRITE_REGISTERS as usize];
        data[..values.len()].copy_from_slice(values);
        let count = (length / 2) as u16;
        self.generate(
            Command::WriteMultipleRegisters {
                address: reg,
                count,
                values: &data[..length],
            },
            reg,
            count,
            request,
        )
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn generate_set_coils_bulk<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        values: &[bool],
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        let l = values.len();
        if l == 0 || l > usize::from(MODBUS_MAX_WRITE_BITS) {
            return Err(ErrorKind::OOB);
        }
        let mut data = [0u8; (MODBUS_MAX_WRITE_BITS / 8) as usize];
        for (i, v) in values.iter().enumerate() {
            if *v {
                data[i / 8] |= 1 << (i % 8);
            }
        }
        let count = l as u16;
        self.generate(
            Command::WriteMultipleCoils {
                address: reg,
                count,
                values: &data[..calc_bytes_for_bits(l)],
            },
            reg,
            count,
            request,
        )
    }

    /// Requests identification objects, see [`crate::consts::MODBUS_DEVICE_ID_BASIC`] and
    /// [`crate::consts::MODBUS_DEVICE_ID_SPECIFIC`] for the read codes
    pub fn generate_read_device_id<V: VectorTrait<u8>>(
        &mut self,
        read_code: u8,
        object_id: u8,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.generate(
            Command::ReadDeviceIdentification {
                read_code,
                object_id,
            },
            0,
            0,
            request,
        )
    }

    fn generate<V: VectorTrait<u8>>(
        &mut self,
        command: Command,
        reg: u16,
        count: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        self.function = command.function();
        self.reg = reg;
        self.count = count;
        let mut frame = Frame::new();
        frame.address = self.unit_id;
        command.encode(&mut frame)?;
        frame_adu(&frame, request)?;
        Ok(())
    }

    /// Checks the reply ADU and reads it into `frame`
    ///
    /// Exception replies are returned as the matching error kind.
    fn parse_response(&self, buf: &[u8], frame: &mut Frame) -> Result<(), ErrorKind> {
        if !crc_is_valid(buf) {
            return Err(if buf.len() < 4 {
                ErrorKind::FrameBroken
            } else {
                ErrorKind::FrameCRCError
            });
        }
        read_adu(buf, frame)?;
        if frame.address != self.unit_id {
            return Err(ErrorKind::FrameBroken);
        }
        match frame.function {
            FunctionCode::Request(f) if f == self.function => Ok(()),
            FunctionCode::Error(f) if f == self.function => {
                let code = frame.byte(0).ok_or(ErrorKind::FrameBroken)?;
                Err(ErrorKind::from_modbus_error(code))
            }
            _ => Err(ErrorKind::FrameBroken),
        }
    }

    fn parse_values<'b>(&self, buf: &'b [u8]) -> Result<&'b [u8], ErrorKind> {
        let mut frame = Frame::new();
        self.parse_response(buf, &mut frame)?;
        let Reply::Values(values) = Reply::decode(&frame)? else {
            return Err(ErrorKind::FrameBroken);
        };
        // values live at the same place in the ADU: unit, function, byte count
        buf.get(3..3 + values.len()).ok_or(ErrorKind::FrameBroken)
    }

    /// Parse response and make sure there's no Modbus error inside
    ///
    /// The input buffer SHOULD be cut to actual response length
    pub fn parse_ok(&self, buf: &[u8]) -> Result<(), ErrorKind> {
        let mut frame = Frame::new();
        self.parse_response(buf, &mut frame)?;
        Reply::decode(&frame).map(|_| ())
    }

    /// Parse response, make sure there's no Modbus error inside, plus parse response data as u16
    /// (getting holdings, inputs)
    ///
    /// The input buffer SHOULD be cut to actual response length
    pub fn parse_u16<V: VectorTrait<u16>>(
        &self,
        buf: &[u8],
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        let values = self.parse_values(buf)?;
        if values.len() < usize::from(self.count) * 2 {
            return Err(ErrorKind::FrameBroken);
        }
        for pair in values.chunks_exact(2).take(usize::from(self.count)) {
            result.push(u16::from_be_bytes([pair[0], pair[1]]))?;
        }
        Ok(())
    }

    /// Parse response, make sure there's no Modbus error inside, plus parse response data as bools
    /// (getting coils, discretes)
    ///
    /// The input buffer SHOULD be cut to actual response length
    pub fn parse_bool<V: VectorTrait<bool>>(
        &self,
        buf: &[u8],
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        let values = self.parse_values(buf)?;
        if values.len() < calc_bytes_for_bits(usize::from(self.count)) {
            return Err(ErrorKind::FrameBroken);
        }
        for i in 0..usize::from(self.count) {
            result.push(values[i / 8] >> (i % 8) & 1 == 1)?;
        }
        Ok(())
    }

    /// Parse response, make sure there's no Modbus error inside
    /// Returns the raw values of a read reply
    ///
    /// The input buffer SHOULD be cut to actual response length
    pub fn try_to_slice<'b>(&self, buf: &'b [u8]) -> Result<&'b [u8], ErrorKind> {
        self.parse_values(buf)
    }

    /// Parse a device identification reply
    ///
    /// The input buffer SHOULD be cut to actual response length
    pub fn parse_device_id<'b>(&self, buf: &'b [u8]) -> Result<DeviceIdReply<'b>, ErrorKind> {
        let mut frame = Frame::new();
        self.parse_response(buf, &mut frame)?;
        let Reply::DeviceIdentification {
            read_code,
            conformity,
            more_follows,
            next_object_id,
            object_count,
            objects,
        } = Reply::decode(&frame)?
        else {
            return Err(ErrorKind::FrameBroken);
        };
        let start = 2 + crate::codec::response::OBJECTS;
        let objects = buf
            .get(start..start + objects.len())
            .ok_or(ErrorKind::FrameBroken)?;
        Ok(DeviceIdReply {
            read_code,
            conformity,
            more_follows,
            next_object_id,
            object_count,
            objects,
        })
    }
}

/// Decoded Read Device Identification reply
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DeviceIdReply<'b> {
    pub read_code: u8,
    pub conformity: u8,
    pub more_follows: bool,
    pub next_object_id: u8,
    pub object_count: u8,
    objects: &'b [u8],
}

impl<'b> DeviceIdReply<'b> {
    /// Iterates over `(object id, value)` pairs, stops at the first truncated record
    pub fn objects(&self) -> impl Iterator<Item = (u8, &'b [u8])> {
        let mut rest = self.objects;
        core::iter::from_fn(move || {
            let (&id, tail) = rest.split_first()?;
            let (&len, tail) = tail.split_first()?;
            let value = tail.get(..usize::from(len))?;
            rest = &tail[usize::from(len)..];
            Some((id, value))
        })
    }
}
