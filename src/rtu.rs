//! RTU framing
//!
//! RTU frames carry no delimiters. [`ReadContext`] predicts the frame length from the function
//! byte and the byte count fields, everything else on the line is resolved by the inter-character
//! timeout of the surrounding I/O loop.

use crate::codec::request_layout;
use crate::consts::{MODBUS_FOOTER_LEN, MODBUS_HEADER_LEN};
use crate::frame::MAX_DATA_LEN;
use crate::{crc16, crc16_update, ErrorKind, Frame, Function, FunctionCode, Response, VectorTrait};
use log::{trace, warn};

/// Parser position inside the frame being received
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketState {
    #[default]
    Address,
    Function,
    /// Fixed part of the data section
    Meta,
    /// Variable part of the data section plus CRC
    Data,
    Done,
}

/// Incremental frame reader
///
/// Fed one byte at a time, the context fills a [`Frame`] and switches to
/// [`PacketState::Done`] once the declared length and the CRC have been received. Invalid
/// function bytes and frames overflowing the ADU size silently restart the reader.
#[derive(Debug, Clone, Default)]
pub struct ReadContext {
    state: PacketState,
    bytes_remaining: usize,
    byte_count_at: Option<usize>,
}

impl ReadContext {
    pub const fn new() -> Self {
        Self {
            state: PacketState::Address,
            bytes_remaining: 0,
            byte_count_at: None,
        }
    }

    #[inline]
    pub fn state(&self) -> PacketState {
        self.state
    }

    #[inline]
    pub fn packet_received(&self) -> bool {
        self.state == PacketState::Done
    }

    /// No partial frame is pending
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == PacketState::Address
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn process_character(&mut self, frame: &mut Frame, byte: u8) {
        match self.state {
            PacketState::Address => {
                frame.reset();
                frame.address = byte;
                self.state = PacketState::Function;
            }
            PacketState::Function => {
                let Some(function) = Function::new(byte) else {
                    trace!("invalid function byte 0x{:02X}, frame dropped", byte);
                    self.restart(frame);
                    return;
                };
                frame.function = FunctionCode::Request(function);
                let layout = request_layout(function);
                self.byte_count_at = layout.byte_count;
                self.bytes_remaining = layout.fixed_len;
                self.state = PacketState::Meta;
                if self.bytes_remaining == 0 {
                    self.meta_complete(frame);
                }
            }
            PacketState::Meta => {
                if self.accumulate(frame, byte) {
                    self.meta_complete(frame);
                }
            }
            PacketState::Data => {
                if self.accumulate(frame, byte) {
                    self.data_complete(frame);
                }
            }
            PacketState::Done => {
                warn!("byte 0x{:02X} received after a complete frame, reader reset", byte);
                self.restart(frame);
            }
        }
    }

    /// Returns true when the current section is complete
    fn accumulate(&mut self, frame: &mut Frame, byte: u8) -> bool {
        if frame.push(byte).is_err() {
            warn!("frame exceeds the ADU size, dropped");
            self.restart(frame);
            return false;
        }
        self.bytes_remaining -= 1;
        self.bytes_remaining == 0
    }

    fn meta_complete(&mut self, frame: &mut Frame) {
        let variable = self
            .byte_count_at
            .and_then(|offset| frame.byte(offset))
            .map_or(0, usize::from);
        if frame.data_length() + variable > MAX_DATA_LEN {
            warn!(
                "declared byte count {} exceeds the ADU size, frame dropped",
                variable
            );
            self.restart(frame);
            return;
        }
        self.bytes_remaining = variable + MODBUS_FOOTER_LEN;
        if self.bytes_remaining == 0 {
            self.data_complete(frame);
        } else {
            self.state = PacketState::Data;
        }
    }

    fn data_complete(&mut self, frame: &mut Frame) {
        let crc = frame.take_tail::<MODBUS_FOOTER_LEN>().map(u16::from_be_bytes);
        frame.set_crc(crc);
        self.state = PacketState::Done;
        trace!(
            "frame received: slave {}, function 0x{:02X}, {} data bytes",
            frame.address,
            frame.function.value(),
            frame.data_length()
        );
    }

    fn restart(&mut self, frame: &mut Frame) {
        self.reset();
        frame.reset();
    }
}

/// CRC of the frame header and data section, as returned by [`crc16`]
pub fn frame_crc(frame: &Frame) -> u16 {
    let crc = crc16_update(0xFFFF, &[frame.address, frame.function.value()]);
    crc16_update(crc, frame.data()).swap_bytes()
}

/// The CRC received with the frame matches its contents
pub fn frame_crc_is_valid(frame: &Frame) -> bool {
    frame.crc() == Some(frame_crc(frame))
}

/// The trailing two bytes of a complete ADU match the CRC of the preceding bytes
pub fn crc_is_valid(adu: &[u8]) -> bool {
    if adu.len() < MODBUS_HEADER_LEN + MODBUS_FOOTER_LEN {
        return false;
    }
    let (body, crc) = adu.split_at(adu.len() - MODBUS_FOOTER_LEN);
    crc16(body).to_be_bytes() == crc
}

/// Serializes a frame into a complete ADU (header, data, CRC)
///
/// The output buffer is cleared first. Returns the ADU length.
pub fn frame_adu<V: VectorTrait<u8>>(frame: &Frame, out: &mut V) -> Result<usize, ErrorKind> {
    out.clear();
    out.extend(&[frame.address, frame.function.value()])?;
    out.extend(frame.data())?;
    out.extend(&frame_crc(frame).to_be_bytes())?;
    Ok(out.len())
}

/// Parses a complete ADU into a frame
///
/// The CRC is stored, not checked, use [`frame_crc_is_valid`] afterwards.
///
/// Errors:
///
/// * **FrameBroken** the ADU is shorter than header plus CRC or the function byte is unknown
/// * **OOB** the ADU is longer than 256 bytes
pub fn read_adu(adu: &[u8], frame: &mut Frame) -> Result<(), ErrorKind> {
    if adu.len() < MODBUS_HEADER_LEN + MODBUS_FOOTER_LEN {
        return Err(ErrorKind::FrameBroken);
    }
    frame.reset();
    let function = FunctionCode::new(adu[1]);
    if function.is_none() {
        return Err(ErrorKind::FrameBroken);
    }
    let (body, crc) = adu.split_at(adu.len() - MODBUS_FOOTER_LEN);
    if body.len() - MODBUS_HEADER_LEN > MAX_DATA_LEN {
        return Err(ErrorKind::OOB);
    }
    frame.address = adu[0];
    frame.function = function;
    frame.extend(&body[MODBUS_HEADER_LEN..])?;
    frame.set_crc(Some(u16::from_be_bytes([crc[0], crc[1]])));
    Ok(())
}

/// Appends the CRC to a filled response and marks it ready for transmission
pub fn finalize_response(response: &mut Response) -> Result<(), ErrorKind> {
    let crc = crc16(response.as_slice());
    response.extend(&crc.to_be_bytes())?;
    response.set_ready(true);
    Ok(())
}

/// Guesses the total length of a request ADU from its first bytes
///
/// Two bytes are enough for fixed-size requests, requests with a byte count field need the
/// prefix to reach that field.
///
/// Errors:
///
/// * **OOB** the prefix is too short to decide
/// * **IllegalFunction** the second byte is not a valid function
pub fn expected_request_len(prefix: &[u8]) -> Result<usize, ErrorKind> {
    let code = *prefix.get(1).ok_or(ErrorKind::OOB)?;
    let function = Function::new(code).ok_or(ErrorKind::IllegalFunction)?;
    let layout = request_layout(function);
    let variable = match layout.byte_count {
        Some(offset) => usize::from(
            *prefix
                .get(MODBUS_HEADER_LEN + offset)
                .ok_or(ErrorKind::OOB)?,
        ),
        None => 0,
    };
    Ok(MODBUS_HEADER_LEN + layout.fixed_len + variable + MODBUS_FOOTER_LEN)
}
