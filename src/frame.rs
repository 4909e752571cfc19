use crate::consts::{MODBUS_FOOTER_LEN, MODBUS_HEADER_LEN, MODBUS_MAX_ADU_LEN};
use crate::{ErrorKind, FunctionCode, ModbusFrameBuf, VectorTrait};

/// Largest data section a frame can carry
pub const MAX_DATA_LEN: usize = MODBUS_MAX_ADU_LEN - MODBUS_HEADER_LEN - MODBUS_FOOTER_LEN;

// the reader accumulates the CRC behind the data before splitting it off
const DATA_CAPACITY: usize = MAX_DATA_LEN + MODBUS_FOOTER_LEN;

/// Parsed request or reply: slave address, function and the function-specific data section
///
/// The data section never contains the slave address, the function byte or the CRC. The CRC
/// received with the frame, if any, is kept separately.
#[derive(Clone)]
pub struct Frame {
    pub address: u8,
    pub function: FunctionCode,
    data: [u8; DATA_CAPACITY],
    data_length: usize,
    crc: Option<u16>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("address", &self.address)
            .field("function", &self.function)
            .field("data", &self.data())
            .field("crc", &self.crc)
            .finish()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.function == other.function
            && self.data() == other.data()
    }
}

impl Eq for Frame {}

impl Frame {
    pub const fn new() -> Self {
        Self {
            address: 0,
            function: FunctionCode::None,
            data: [0; DATA_CAPACITY],
            data_length: 0,
            crc: None,
        }
    }

    pub fn with_data(
        address: u8,
        function: impl Into<FunctionCode>,
        data: &[u8],
    ) -> Result<Self, ErrorKind> {
        let mut frame = Self::new();
        frame.address = address;
        frame.function = function.into();
        frame.extend(data)?;
        Ok(frame)
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_length]
    }

    #[inline]
    pub fn data_length(&self) -> usize {
        self.data_length
    }

    /// CRC received with the frame (stored as returned by [`crate::crc16`])
    #[inline]
    pub fn crc(&self) -> Option<u16> {
        self.crc
    }

    #[inline]
    pub fn set_crc(&mut self, crc: Option<u16>) {
        self.crc = crc;
    }

    pub fn push(&mut self, byte: u8) -> Result<(), ErrorKind> {
        let slot = self.data.get_mut(self.data_length).ok_or(ErrorKind::OOB)?;
        *slot = byte;
        self.data_length += 1;
        Ok(())
    }

    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let end = self.data_length + bytes.len();
        if end > DATA_CAPACITY {
            return Err(ErrorKind::OOB);
        }
        self.data[self.data_length..end].copy_from_slice(bytes);
        self.data_length = end;
        Ok(())
    }

    /// Removes the last `N` data bytes and returns them
    pub(crate) fn take_tail<const N: usize>(&mut self) -> Option<[u8; N]> {
        let start = self.data_length.checked_sub(N)?;
        let mut tail = [0u8; N];
        tail.copy_from_slice(&self.data[start..self.data_length]);
        self.data_length = start;
        Some(tail)
    }

    /// Size of the complete ADU: header, data and CRC
    #[inline]
    pub fn adu_len(&self) -> usize {
        MODBUS_HEADER_LEN + self.data_length + MODBUS_FOOTER_LEN
    }

    #[inline]
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.data().get(offset).copied()
    }

    /// Big-endian word at a data-section offset
    pub fn word(&self, offset: usize) -> Option<u16> {
        let bytes = self.data().get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn reset(&mut self) {
        self.address = 0;
        self.function = FunctionCode::None;
        self.data_length = 0;
        self.crc = None;
    }
}

/// Outgoing reply buffer
///
/// Controllers write header and payload, the slave appends the CRC and marks the reply ready.
/// The I/O side only reads a ready response.
#[derive(Clone)]
pub struct Response {
    buf: ModbusFrameBuf,
    len: usize,
    ready: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Response {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Response")
            .field("data", &self.as_slice())
            .field("ready", &self.ready)
            .finish()
    }
}

impl Response {
    pub const fn new() -> Self {
        Self {
            buf: [0; MODBUS_MAX_ADU_LEN],
            len: 0,
            ready: false,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[inline]
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Clears contents and the ready flag
    pub fn reset(&mut self) {
        self.len = 0;
        self.ready = false;
    }
}

impl VectorTrait<u8> for Response {
    fn push(&mut self, value: u8) -> Result<(), ErrorKind> {
        let slot = self.buf.get_mut(self.len).ok_or(ErrorKind::OOB)?;
        *slot = value;
        self.len += 1;
        Ok(())
    }
    fn extend(&mut self, values: &[u8]) -> Result<(), ErrorKind> {
        let end = self.len + values.len();
        if end > MODBUS_MAX_ADU_LEN {
            return Err(ErrorKind::OOB);
        }
        self.buf[self.len..end].copy_from_slice(values);
        self.len = end;
        Ok(())
    }
    #[inline]
    fn len(&self) -> usize {
        self.len
    }
    #[inline]
    fn is_empty(&self) -> bool {
        self.len == 0
    }
    #[inline]
    fn clear(&mut self) {
        self.len = 0;
    }
    fn cut_end(&mut self, len_to_cut: usize) {
        self.len = self.len.saturating_sub(len_to_cut);
    }
    #[inline]
    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
    fn replace(&mut self, index: usize, value: u8) -> Result<(), ErrorKind> {
        if index >= self.len {
            return Err(ErrorKind::OOB);
        }
        self.buf[index] = value;
        Ok(())
    }
}
