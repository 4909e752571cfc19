use crate::{calc_bytes_for_bits, ErrorKind, VectorTrait};
use ieee754::Ieee754;

/// Zero-based, fixed-size address space of a data store
pub trait DataStore {
    /// Number of addressable elements
    fn size(&self) -> usize;

    fn address_start(&self) -> usize {
        0
    }

    fn is_address_valid(&self, address: usize) -> bool {
        address >= self.address_start() && address < self.address_start() + self.size()
    }

    /// All of `count` elements starting at `address` are addressable
    fn is_span_valid(&self, address: u16, count: u16) -> bool {
        let first = usize::from(address);
        let end = first + usize::from(count);
        count > 0
            && end <= usize::from(u16::MAX) + 1
            && self.is_address_valid(first)
            && self.is_address_valid(end - 1)
    }
}

/// Coils and discrete inputs
pub trait BitStore: DataStore {
    fn read_element(&self, address: u16) -> Result<bool, ErrorKind>;

    fn write_element(&mut self, address: u16, value: bool) -> Result<(), ErrorKind>;

    /// Get elements packed as bits, LSB of the first byte is the first element
    ///
    /// Note: the output is always appended
    fn read_elements_to_bytes<V: VectorTrait<u8>>(
        &self,
        address: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        if !self.is_span_valid(address, count) {
            return Err(ErrorKind::OOBContext);
        }
        let mut cbyte = 0;
        for i in 0..count {
            if self.read_element(address + i)? {
                cbyte |= 1 << (i % 8);
            }
            if i % 8 == 7 {
                result.push(cbyte)?;
                cbyte = 0;
            }
        }
        if count % 8 != 0 {
            result.push(cbyte)?;
        }
        Ok(())
    }

    /// Set elements from bits packed the same way [`BitStore::read_elements_to_bytes`] packs them
    fn write_elements_from_bytes(
        &mut self,
        address: u16,
        count: u16,
        values: &[u8],
    ) -> Result<(), ErrorKind> {
        if !self.is_span_valid(address, count) {
            return Err(ErrorKind::OOBContext);
        }
        if values.len() < calc_bytes_for_bits(usize::from(count)) {
            return Err(ErrorKind::OOB);
        }
        for i in 0..count {
            let bit = values[usize::from(i / 8)] >> (i % 8) & 1 == 1;
            self.write_element(address + i, bit)?;
        }
        Ok(())
    }

    /// Get elements as bools
    ///
    /// Note: the output is always appended
    fn read_elements<V: VectorTrait<bool>>(
        &self,
        address: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        if !self.is_span_valid(address, count) {
            return Err(ErrorKind::OOBContext);
        }
        for i in 0..count {
            result.push(self.read_element(address + i)?)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_elements(&mut self, address: u16, values: &[bool]) -> Result<(), ErrorKind> {
        if values.len() > usize::from(u16::MAX) || !self.is_span_valid(address, values.len() as u16)
        {
            return Err(ErrorKind::OOBContext);
        }
        for (i, value) in values.iter().enumerate() {
            self.write_element(address + i as u16, *value)?;
        }
        Ok(())
    }
}

/// Holding and input registers
///
/// Batch operations move registers as big-endian bytes, the way they travel on the wire.
pub trait RegisterStore: DataStore {
    fn get_register(&self, address: u16) -> Result<u16, ErrorKind>;

    fn set_register(&mut self, address: u16, value: u16) -> Result<(), ErrorKind>;

    /// A batch read of `count` registers at `address` is permitted
    fn is_read_valid(&self, address: u16, count: u16) -> bool {
        self.is_span_valid(address, count)
    }

    /// A batch write of `count` registers at `address` is permitted
    fn is_write_valid(&self, address: u16, count: u16) -> bool {
        self.is_read_valid(address, count)
    }

    /// Get registers as big-endian bytes
    ///
    /// Note: the output is always appended
    fn get_registers_as_bytes<V: VectorTrait<u8>>(
        &self,
        address: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        if !self.is_read_valid(address, count) {
            return Err(ErrorKind::OOBContext);
        }
        for i in 0..count {
            result.extend(&self.get_register(address + i)?.to_be_bytes())?;
        }
        Ok(())
    }

    /// Set registers from big-endian bytes
    fn set_registers_from_bytes(
        &mut self,
        address: u16,
        count: u16,
        values: &[u8],
    ) -> Result<(), ErrorKind> {
        if !self.is_write_valid(address, count) {
            return Err(ErrorKind::OOBContext);
        }
        if values.len() < usize::from(count) * 2 {
            return Err(ErrorKind::OOB);
        }
        for (i, pair) in (0..count).zip(values.chunks_exact(2)) {
            self.set_register(address + i, u16::from_be_bytes([pair[0], pair[1]]))?;
        }
        Ok(())
    }

    /// Called by the register controllers after every successful write
    fn registers_written(&mut self, _address: u16, _count: u16) {}

    /// Data was written since the last [`RegisterStore::clear_new_data`]
    ///
    /// Stores which do not track writes always return false.
    fn new_data_available(&self) -> bool {
        false
    }

    fn clear_new_data(&mut self) {}

    /// Get registers as u16 values
    ///
    /// Note: the output is always appended
    fn get_registers<V: VectorTrait<u16>>(
        &self,
        address: u16,
        count: u16,
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        if !self.is_read_valid(address, count) {
            return Err(ErrorKind::OOBContext);
        }
        for i in 0..count {
            result.push(self.get_register(address + i)?)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_registers(&mut self, address: u16, values: &[u16]) -> Result<(), ErrorKind> {
        if values.len() > usize::from(u16::MAX) || !self.is_write_valid(address, values.len() as u16)
        {
            return Err(ErrorKind::OOBContext);
        }
        for (i, value) in values.iter().enumerate() {
            self.set_register(address + i as u16, *value)?;
        }
        Ok(())
    }

    /// Get two registers as u32
    ///
    /// Returns 32-bit value (big-endian)
    fn get_registers_as_u32(&self, address: u16) -> Result<u32, ErrorKind> {
        let next = address.checked_add(1).ok_or(ErrorKind::OOBContext)?;
        Ok((u32::from(self.get_register(address)?) << 16) | u32::from(self.get_register(next)?))
    }

    /// Set two registers from u32
    ///
    /// Uses 32-bit value to set two registers (big-endian)
    #[allow(clippy::cast_possible_truncation)]
    fn set_registers_from_u32(&mut self, address: u16, value: u32) -> Result<(), ErrorKind> {
        self.set_registers(address, &[(value >> 16) as u16, value as u16])
    }

    /// Get four registers as u64
    ///
    /// Returns 64-bit value (big-endian)
    fn get_registers_as_u64(&self, address: u16) -> Result<u64, ErrorKind> {
        if !self.is_span_valid(address, 4) {
            return Err(ErrorKind::OOBContext);
        }
        let mut value = 0u64;
        for i in 0..4 {
            value = (value << 16) | u64::from(self.get_register(address + i)?);
        }
        Ok(value)
    }

    /// Set four registers from u64
    ///
    /// Uses 64-bit value to set four registers (big-endian)
    #[allow(clippy::cast_possible_truncation)]
    fn set_registers_from_u64(&mut self, address: u16, value: u64) -> Result<(), ErrorKind> {
        self.set_registers(
            address,
            &[
                (value >> 48) as u16,
                (value >> 32) as u16,
                (value >> 16) as u16,
                value as u16,
            ],
        )
    }

    /// Get two registers as IEEE754 32-bit float
    fn get_registers_as_f32(&self, address: u16) -> Result<f32, ErrorKind> {
        Ok(Ieee754::from_bits(self.get_registers_as_u32(address)?))
    }

    /// Set IEEE 754 f32 to two registers
    fn set_registers_from_f32(&mut self, address: u16, value: f32) -> Result<(), ErrorKind> {
        self.set_registers_from_u32(address, value.bits())
    }
}
