//! Flat, fixed-size data stores
//!
//! Sizes are const generics, so stores live in static memory or on the stack without an
//! allocator.
//!
//! ```
//! use rtuslave::server::context::{BitStore, RegisterStore};
//! use rtuslave::server::storage::{BitStorage, RegisterStorage};
//!
//! let mut coils = BitStorage::<100>::new();
//! coils.write_element(9, true).unwrap();
//! assert!(coils.read_element(9).unwrap());
//!
//! let mut holdings = RegisterStorage::<100>::new();
//! holdings.set_registers_from_f32(10, 1.5).unwrap();
//! assert_eq!(holdings.get_registers_as_f32(10).unwrap(), 1.5);
//! ```

use super::context::{BitStore, DataStore, RegisterStore};
use crate::ErrorKind;

#[cfg(feature = "with_bincode")]
use bincode::{Decode, Encode};
#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

/// Coils or discrete inputs
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "with_bincode", derive(Decode, Encode))]
pub struct BitStorage<const N: usize> {
    #[cfg_attr(feature = "with_serde", serde(with = "serde_arrays"))]
    bits: [bool; N],
}

impl<const N: usize> Default for BitStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BitStorage<N> {
    pub const fn new() -> Self {
        Self { bits: [false; N] }
    }

    pub fn clear(&mut self) {
        self.bits = [false; N];
    }

    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }
}

impl<const N: usize> DataStore for BitStorage<N> {
    #[inline]
    fn size(&self) -> usize {
        N
    }
}

impl<const N: usize> BitStore for BitStorage<N> {
    #[inline]
    fn read_element(&self, address: u16) -> Result<bool, ErrorKind> {
        self.bits
            .get(usize::from(address))
            .copied()
            .ok_or(ErrorKind::OOBContext)
    }

    #[inline]
    fn write_element(&mut self, address: u16, value: bool) -> Result<(), ErrorKind> {
        let bit = self
            .bits
            .get_mut(usize::from(address))
            .ok_or(ErrorKind::OOBContext)?;
        *bit = value;
        Ok(())
    }
}

/// Holding or input registers
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "with_bincode", derive(Decode, Encode))]
pub struct RegisterStorage<const N: usize> {
    #[cfg_attr(feature = "with_serde", serde(with = "serde_arrays"))]
    registers: [u16; N],
}

impl<const N: usize> Default for RegisterStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RegisterStorage<N> {
    pub const fn new() -> Self {
        Self { registers: [0; N] }
    }

    pub fn clear(&mut self) {
        self.registers = [0; N];
    }

    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.registers
    }
}

impl<const N: usize> DataStore for RegisterStorage<N> {
    #[inline]
    fn size(&self) -> usize {
        N
    }
}

impl<const N: usize> RegisterStore for RegisterStorage<N> {
    #[inline]
    fn get_register(&self, address: u16) -> Result<u16, ErrorKind> {
        self.registers
            .get(usize::from(address))
            .copied()
            .ok_or(ErrorKind::OOBContext)
    }

    #[inline]
    fn set_register(&mut self, address: u16, value: u16) -> Result<(), ErrorKind> {
        let reg = self
            .registers
            .get_mut(usize::from(address))
            .ok_or(ErrorKind::OOBContext)?;
        *reg = value;
        Ok(())
    }
}

/// Register array which remembers which registers were written by a master
///
/// Flags are raised through the controller write hook only, so local updates made by the
/// application with [`RegisterStore::set_register`] do not mark data as new.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "with_bincode", derive(Decode, Encode))]
pub struct UpdatingRegisterStorage<const N: usize> {
    #[cfg_attr(feature = "with_serde", serde(with = "serde_arrays"))]
    registers: [u16; N],
    #[cfg_attr(feature = "with_serde", serde(with = "serde_arrays"))]
    new_data: [bool; N],
}

impl<const N: usize> Default for UpdatingRegisterStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> UpdatingRegisterStorage<N> {
    pub const fn new() -> Self {
        Self {
            registers: [0; N],
            new_data: [false; N],
        }
    }

    /// The register was written since the last clear
    pub fn is_new_data(&self, address: u16) -> bool {
        self.new_data
            .get(usize::from(address))
            .copied()
            .unwrap_or_default()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.registers
    }
}

impl<const N: usize> DataStore for UpdatingRegisterStorage<N> {
    #[inline]
    fn size(&self) -> usize {
        N
    }
}

impl<const N: usize> RegisterStore for UpdatingRegisterStorage<N> {
    #[inline]
    fn get_register(&self, address: u16) -> Result<u16, ErrorKind> {
        self.registers
            .get(usize::from(address))
            .copied()
            .ok_or(ErrorKind::OOBContext)
    }

    #[inline]
    fn set_register(&mut self, address: u16, value: u16) -> Result<(), ErrorKind> {
        let reg = self
            .registers
            .get_mut(usize::from(address))
            .ok_or(ErrorKind::OOBContext)?;
        *reg = value;
        Ok(())
    }

    fn registers_written(&mut self, address: u16, count: u16) {
        let start = usize::from(address).min(N);
        let end = (start + usize::from(count)).min(N);
        self.new_data[start..end].fill(true);
    }

    fn new_data_available(&self) -> bool {
        self.new_data.iter().any(|flag| *flag)
    }

    fn clear_new_data(&mut self) {
        self.new_data = [false; N];
    }
}
