//! Slave device run loop
//!
//! [`SlaveDevice`] binds an [`RtuSlave`] to a byte [`Transport`] and a [`Clock`]. The loop is
//! cooperative: [`SlaveDevice::poll`] never blocks, it moves whatever the transport has ready
//! and returns. A partial frame is abandoned once the line stays silent for longer than the
//! character timeout.

use super::context::{BitStore, RegisterStore};
use super::RtuSlave;
use crate::consts::MODBUS_MAX_ADU_LEN;
use crate::{ModbusFrameBuf, VectorTrait};
#[cfg(feature = "with_bincode")]
use bincode::{Decode, Encode};
use log::{debug, trace};
#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

/// Bit times per character: start, 8 data bits, parity (or second stop) bit, stop
pub const BITS_PER_CHARACTER: u32 = 11;
/// Fixed inter-frame delay above 19200 baud
pub const MIN_FRAME_DELAY_US: u64 = 1750;
const FALLBACK_FRAME_DELAY_US: u64 = 4000;

/// Non-blocking serial line
pub trait Transport {
    /// Queues bytes for transmission, returns the number of bytes accepted
    fn send(&mut self, data: &[u8]) -> usize;

    fn try_receive_one(&mut self) -> Option<u8>;

    fn has_pending_input(&self) -> bool;
}

/// Monotonic time source
pub trait Clock {
    type Instant: Copy;

    fn now(&self) -> Self::Instant;

    /// Microseconds elapsed from `earlier` to `now`, zero if `now` is not later
    fn micros_since(&self, earlier: Self::Instant, now: Self::Instant) -> u64;
}

#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

#[cfg(feature = "std")]
impl Clock for StdClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn micros_since(&self, earlier: Self::Instant, now: Self::Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(earlier).as_micros()).unwrap_or(u64::MAX)
    }
}

/// Slave configuration
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "with_bincode", derive(Decode, Encode))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveConfig {
    pub address: u8,
    pub baud_rate: u32,
    /// Character timeout in inter-frame delays
    pub timeout_multiplier: u32,
    /// Ignore frames for other slaves
    pub filter_by_address: bool,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            address: 1,
            baud_rate: 9600,
            timeout_multiplier: 2,
            filter_by_address: true,
        }
    }
}

impl SlaveConfig {
    /// Silent interval separating frames: 3.5 character times
    pub fn frame_delay_us(&self) -> u64 {
        if self.baud_rate == 0 {
            return FALLBACK_FRAME_DELAY_US;
        }
        if self.baud_rate > 19200 {
            return MIN_FRAME_DELAY_US;
        }
        let char_time_us = u64::from(BITS_PER_CHARACTER) * 1_000_000 / u64::from(self.baud_rate);
        char_time_us * 35 / 10
    }

    /// Silence after which a partial frame is abandoned
    pub fn character_timeout_us(&self) -> u64 {
        self.frame_delay_us() * u64::from(self.timeout_multiplier.max(1))
    }
}

pub struct SlaveDevice<'a, T, K, C, D, H, I>
where
    T: Transport,
    K: Clock,
    C: BitStore,
    D: BitStore,
    H: RegisterStore,
    I: RegisterStore,
{
    config: SlaveConfig,
    transport: T,
    clock: K,
    slave: RtuSlave<'a, C, D, H, I>,
    tx: ModbusFrameBuf,
    tx_len: usize,
    tx_pos: usize,
    last_rx: Option<K::Instant>,
}

impl<'a, T, K, C, D, H, I> SlaveDevice<'a, T, K, C, D, H, I>
where
    T: Transport,
    K: Clock,
    C: BitStore,
    D: BitStore,
    H: RegisterStore,
    I: RegisterStore,
{
    /// The slave address is taken from the configuration
    pub fn new(
        config: SlaveConfig,
        transport: T,
        clock: K,
        mut slave: RtuSlave<'a, C, D, H, I>,
    ) -> Self {
        slave.set_address(config.address);
        slave.reset();
        Self {
            config,
            transport,
            clock,
            slave,
            tx: [0; MODBUS_MAX_ADU_LEN],
            tx_len: 0,
            tx_pos: 0,
            last_rx: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    #[inline]
    pub fn slave(&self) -> &RtuSlave<'a, C, D, H, I> {
        &self.slave
    }

    #[inline]
    pub fn slave_mut(&mut self) -> &mut RtuSlave<'a, C, D, H, I> {
        &mut self.slave
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Bytes of the last response not yet accepted by the transport
    #[inline]
    pub fn tx_pending(&self) -> usize {
        self.tx_len - self.tx_pos
    }

    /// One run loop step
    ///
    /// Flushes pending output, feeds available input to the slave and answers complete
    /// frames. Input stays queued in the transport while a response is still being sent.
    /// Returns the number of frames processed.
    pub fn poll(&mut self) -> usize {
        self.flush();
        let now = self.clock.now();
        let mut processed = 0;
        let mut received = false;
        while self.tx_pending() == 0 && self.transport.has_pending_input() {
            let Some(byte) = self.transport.try_receive_one() else {
                break;
            };
            received = true;
            self.slave.process_character(byte);
            if self.slave.packet_received() {
                self.process_packet();
                processed += 1;
            }
        }
        if received {
            self.last_rx = Some(now);
        } else if let Some(last_rx) = self.last_rx {
            if !self.slave.context().is_idle()
                && self.clock.micros_since(last_rx, now) >= self.config.character_timeout_us()
            {
                debug!(
                    "character timeout in {:?}, partial frame dropped",
                    self.slave.context().state()
                );
                self.slave.reset();
            }
        }
        processed
    }

    fn process_packet(&mut self) {
        self.slave.process_message(self.config.filter_by_address);
        if self.slave.response_valid() {
            let response = self.slave.response().as_slice();
            self.tx[..response.len()].copy_from_slice(response);
            self.tx_len = response.len();
            self.tx_pos = 0;
            trace!("response queued, {} bytes", self.tx_len);
            self.flush();
        }
        self.slave.reset();
    }

    fn flush(&mut self) {
        if self.tx_pos < self.tx_len {
            let sent = self.transport.send(&self.tx[self.tx_pos..self.tx_len]);
            self.tx_pos = (self.tx_pos + sent).min(self.tx_len);
        }
    }
}
