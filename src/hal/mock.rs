//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the two hardware traits, enabling
//! development and testing on desktop without a board attached.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockBackend`] | [`PeripheralBackend`] | Scripted inputs, recorded outputs, failure injection |
//! | [`MockLink`] | [`ByteLink`] | Queued receive bytes, captured transmit bytes |
//!
//! # Example
//!
//! ```rust
//! use pinlink::hal::mock::MockBackend;
//! use pinlink::peripheral::PinMode;
//! use pinlink::registry::PeripheralRegistry;
//!
//! let mut registry = PeripheralRegistry::new(MockBackend::new());
//! registry.add_gpio(1, 2, PinMode::DigitalOutput);
//! registry.write_digital(1, true);
//!
//! // Verify through the backend's recorded state
//! assert_eq!(registry.backend().level(2), Some(true));
//! ```
//!
//! [`PeripheralBackend`]: crate::traits::PeripheralBackend
//! [`ByteLink`]: crate::traits::ByteLink

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::vec::Vec;

use crate::packet::PACKET_LEN;
use crate::peripheral::{Dac, PinMode};
use crate::traits::{ByteLink, PeripheralBackend};

// ============================================================================
// Backend Mock
// ============================================================================

/// One recorded backend operation, in call order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendOp {
    /// `init_pin` call.
    InitPin {
        /// Pin number.
        pin: u8,
        /// Requested mode.
        mode: PinMode,
    },
    /// `reset_pin` call.
    ResetPin {
        /// Pin number.
        pin: u8,
        /// Mode whose resources were released.
        mode: PinMode,
    },
    /// `digital_write` call.
    DigitalWrite {
        /// Pin number.
        pin: u8,
        /// Driven level.
        level: bool,
    },
    /// `pwm_write` call.
    PwmWrite {
        /// Pin number.
        pin: u8,
        /// Applied duty.
        duty: u16,
    },
    /// `init_dac` call.
    InitDac {
        /// I²C port.
        port: u8,
    },
    /// `release_dac` call.
    ReleaseDac {
        /// I²C port.
        port: u8,
    },
    /// `dac_write` call.
    DacWrite {
        /// I²C port.
        port: u8,
        /// Written code.
        raw: u16,
    },
}

/// Mock peripheral backend.
///
/// Inputs are scripted with [`set_level`](Self::set_level) /
/// [`set_analog`](Self::set_analog); outputs are recorded and inspected with
/// [`level`](Self::level), [`duty`](Self::duty) and
/// [`dac_value`](Self::dac_value). Every mutating call is also appended to
/// [`ops`](Self::ops) for order-sensitive assertions.
#[derive(Debug, Default)]
pub struct MockBackend {
    /// Every mutating backend call, in order.
    pub ops: Vec<BackendOp>,

    pin_modes: BTreeMap<u8, PinMode>,
    input_levels: BTreeMap<u8, bool>,
    analog_values: BTreeMap<u8, i32>,
    driven_levels: BTreeMap<u8, bool>,
    duties: BTreeMap<u8, u16>,
    dac_ports: BTreeSet<u8>,
    dac_values: BTreeMap<u8, u16>,

    fail_next_init: bool,
    fail_next_analog: bool,
}

impl MockBackend {
    /// Creates a mock backend with no scripted state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `init_pin` or `init_dac` call fail.
    pub fn fail_next_init(&mut self) {
        self.fail_next_init = true;
    }

    /// Makes the next `analog_read` call fail.
    pub fn fail_next_analog_read(&mut self) {
        self.fail_next_analog = true;
    }

    /// Scripts the level a digital input pin will read.
    pub fn set_level(&mut self, pin: u8, level: bool) {
        self.input_levels.insert(pin, level);
    }

    /// Scripts the value an analog conversion on `pin` will return.
    pub fn set_analog(&mut self, pin: u8, value: i32) {
        self.analog_values.insert(pin, value);
    }

    /// The mode `pin` is currently initialised for, if any.
    pub fn pin_mode(&self, pin: u8) -> Option<PinMode> {
        self.pin_modes.get(&pin).copied()
    }

    /// The last level driven on `pin`, if it was ever driven.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.driven_levels.get(&pin).copied()
    }

    /// The last PWM duty applied to `pin`, if any.
    pub fn duty(&self, pin: u8) -> Option<u16> {
        self.duties.get(&pin).copied()
    }

    /// The last code written to the DAC on `port`, if any.
    pub fn dac_value(&self, port: u8) -> Option<u16> {
        self.dac_values.get(&port).copied()
    }
}

impl PeripheralBackend for MockBackend {
    type Error = ();

    fn init_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), ()> {
        if core::mem::take(&mut self.fail_next_init) {
            return Err(());
        }
        self.pin_modes.insert(pin, mode);
        self.ops.push(BackendOp::InitPin { pin, mode });
        Ok(())
    }

    fn reset_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), ()> {
        self.pin_modes.remove(&pin);
        self.ops.push(BackendOp::ResetPin { pin, mode });
        Ok(())
    }

    fn digital_read(&mut self, pin: u8) -> Result<bool, ()> {
        Ok(self.input_levels.get(&pin).copied().unwrap_or(false))
    }

    fn digital_write(&mut self, pin: u8, level: bool) -> Result<(), ()> {
        self.driven_levels.insert(pin, level);
        self.ops.push(BackendOp::DigitalWrite { pin, level });
        Ok(())
    }

    fn pwm_write(&mut self, pin: u8, duty: u16) -> Result<(), ()> {
        self.duties.insert(pin, duty);
        self.ops.push(BackendOp::PwmWrite { pin, duty });
        Ok(())
    }

    fn analog_read(&mut self, pin: u8) -> Result<i32, ()> {
        if core::mem::take(&mut self.fail_next_analog) {
            return Err(());
        }
        Ok(self.analog_values.get(&pin).copied().unwrap_or(0))
    }

    fn init_dac(&mut self, dac: &Dac) -> Result<(), ()> {
        if core::mem::take(&mut self.fail_next_init) {
            return Err(());
        }
        self.dac_ports.insert(dac.port);
        self.ops.push(BackendOp::InitDac { port: dac.port });
        Ok(())
    }

    fn release_dac(&mut self, dac: &Dac) -> Result<(), ()> {
        self.dac_ports.remove(&dac.port);
        self.ops.push(BackendOp::ReleaseDac { port: dac.port });
        Ok(())
    }

    fn dac_write(&mut self, dac: &Dac, raw: u16) -> Result<(), ()> {
        if !self.dac_ports.contains(&dac.port) {
            return Err(());
        }
        self.dac_values.insert(dac.port, raw);
        self.ops.push(BackendOp::DacWrite { port: dac.port, raw });
        Ok(())
    }
}

// ============================================================================
// Link Mock
// ============================================================================

/// Mock byte link.
///
/// Receive bytes are queued ahead of time; a read drains as many queued
/// bytes as it can and reports a short count when the queue runs dry, which
/// is how the real transport reports a timeout.
///
/// # Example
///
/// ```rust
/// use pinlink::hal::mock::MockLink;
/// use pinlink::traits::ByteLink;
///
/// let mut link = MockLink::new();
/// link.push_bytes(&[1, 2, 3]);
///
/// let mut buf = [0u8; 8];
/// assert_eq!(link.read(&mut buf, 1000), Ok(3)); // short read
/// link.write_all(&[9, 9]).unwrap();
/// assert_eq!(link.sent, vec![9, 9]);
/// ```
#[derive(Debug, Default)]
pub struct MockLink {
    /// Bytes waiting to be read.
    pub rx: VecDeque<u8>,
    /// Every byte written to the link, in order.
    pub sent: Vec<u8>,
}

impl MockLink {
    /// Creates a link with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw bytes for reading.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Queues one encoded packet for reading.
    pub fn push_packet(&mut self, packet: &crate::packet::CommandPacket) {
        self.push_bytes(&packet.to_bytes());
    }

    /// The transmitted bytes grouped into complete frames; a trailing partial
    /// frame is dropped.
    pub fn sent_frames(&self) -> Vec<[u8; PACKET_LEN]> {
        self.sent
            .chunks_exact(PACKET_LEN)
            .map(|chunk| {
                let mut frame = [0u8; PACKET_LEN];
                frame.copy_from_slice(chunk);
                frame
            })
            .collect()
    }
}

impl ByteLink for MockLink {
    type Error = ();

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, ()> {
        let n = buf.len().min(self.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.rx.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), ()> {
        self.sent.extend_from_slice(buf);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
