//! Modbus RTU slave stack
//!
//! The crate turns a serial byte stream into Modbus requests, validates them against typed coil
//! and register stores and produces protocol-conformant replies. It has no allocator or OS
//! requirements: all buffers are fixed 256-byte arrays and the I/O side is abstracted by the
//! [`server::device::Transport`] and [`server::device::Clock`] traits.
//!
//! Components, bottom-up:
//!
//! * [`crc16`] / [`lrc`] checksums
//! * [`server::storage`] and [`server::mapped`] data stores
//! * [`codec`] request/response layouts of the supported functions
//! * [`rtu`] byte-by-byte frame reader and ADU serialization
//! * [`server::controller`] address validation and command execution per data area
//! * [`server::RtuSlave`] the protocol instance gluing it all together
//!
//! ```
//! use rtuslave::server::controller::{
//!     CoilController, DiscreteInputController, HoldingRegisterController,
//!     InputRegisterController,
//! };
//! use rtuslave::server::storage::{BitStorage, RegisterStorage};
//! use rtuslave::server::RtuSlave;
//! use rtuslave::VectorTrait;
//!
//! let mut slave = RtuSlave::new(
//!     1,
//!     CoilController::new(BitStorage::<16>::new()),
//!     DiscreteInputController::new(BitStorage::<16>::new()),
//!     HoldingRegisterController::new(RegisterStorage::<16>::new()),
//!     InputRegisterController::new(RegisterStorage::<16>::new()),
//! );
//! // read holding register 0
//! for b in [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A] {
//!     slave.process_character(b);
//! }
//! assert!(slave.packet_received());
//! slave.process_message(true);
//! assert_eq!(slave.response().as_slice(), &[0x01, 0x03, 0x02, 0x00, 0x00, 0xB8, 0x44]);
//! ```
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(test, not(feature = "std")))]
extern crate std;

pub mod client;
pub mod codec;
pub mod consts;
pub mod rtu;
pub mod server;

mod vector;
pub use vector::VectorTrait;

mod error;
pub use error::ErrorKind;

mod function;
pub use function::{AddressSpace, Exception, Function, FunctionCode};

mod frame;
pub use frame::{Frame, Response, MAX_DATA_LEN};


/// Standard Modbus frame buffer
///
/// As max length of Modbus RTU ADU is 256 bytes, the frame buffer is a fixed [u8; 256] array.
pub type ModbusFrameBuf = [u8; 256];

/// Modbus CRC-16 (polynomial 0xA001, initial value 0xFFFF)
///
/// The result is byte-swapped, so `crc16(data).to_be_bytes()` gives the two CRC bytes in wire
/// order (low byte of the raw CRC first).
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(0xFFFF, data).swap_bytes()
}

/// Feeds more bytes into a raw (not swapped) CRC-16 state
pub(crate) fn crc16_update(mut crc: u16, data: &[u8]) -> u16 {
    for i in data {
        crc ^= u16::from(*i);
        for _ in 0..8 {
            if (crc & 0x0001) == 0 {
                crc >>= 1;
            } else {
                crc >>= 1;
                crc ^= 0xA001;
            }
        }
    }
    crc
}

/// Longitudinal redundancy check of Modbus ASCII frames
///
/// Two's complement of the 8-bit sum of all bytes.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn lrc(data: &[u8]) -> u8 {
    let mut lrc: i32 = 0;
    for i in data {
        lrc -= i32::from(*i);
    }
    lrc as u8
}

/// Bytes required to pack the given number of bits
#[inline]
pub const fn calc_bytes_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

#[cfg(test)]
mod checksum_tests {
    use super::*;
    use crc16::{State, MODBUS};

    #[test]
    fn test_crc16_reference() {
        assert_eq!(crc16(&[]), 0xFFFF);
        assert_eq!(crc16(&[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02]), 0xB663);
        let data = [0x11, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02];
        assert_eq!(
            crc16(&data).to_be_bytes(),
            State::<MODBUS>::calculate(&data).to_le_bytes()
        );
        let split = crc16_update(crc16_update(0xFFFF, &data[..3]), &data[3..]);
        assert_eq!(split.swap_bytes(), crc16(&data));
    }

    #[test]
    fn test_crc16_random() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut buf = [0u8; 64];
        for _ in 0..100 {
            let len = rng.gen_range(0, buf.len());
            rng.fill(&mut buf[..len]);
            assert_eq!(
                crc16(&buf[..len]).to_be_bytes(),
                State::<MODBUS>::calculate(&buf[..len]).to_le_bytes()
            );
        }
    }

    #[test]
    fn test_lrc() {
        assert_eq!(lrc(&[]), 0);
        assert_eq!(lrc(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]), 0x7E);
        let data = [0x01, 0x05, 0x00, 0x2A, 0xFF, 0x00];
        let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum.wrapping_add(lrc(&data)), 0);
    }

    #[test]
    fn test_bytes_for_bits() {
        assert_eq!(calc_bytes_for_bits(0), 0);
        assert_eq!(calc_bytes_for_bits(1), 1);
        assert_eq!(calc_bytes_for_bits(8), 1);
        assert_eq!(calc_bytes_for_bits(9), 2);
        assert_eq!(calc_bytes_for_bits(2000), 250);
    }
}
