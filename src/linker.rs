//! Register ↔ hardware linker.
//!
//! A link binds one hardware id to one register address with a direction
//! derived from the peripheral's mode at link time: input peripherals are
//! sampled into their register on every tick, output peripherals are driven
//! from their register on every tick. One register may feed any number of
//! peripherals; each hardware id holds at most one link.
//!
//! The maps are ordered, so a tick walks links in ascending hardware-id
//! order, which is the stable order the protocol documentation promises.
//!
//! # Example
//!
//! ```rust
//! use pinlink::hal::mock::MockBackend;
//! use pinlink::linker::Linker;
//! use pinlink::peripheral::PinMode;
//! use pinlink::registers::RegisterFile;
//! use pinlink::registry::PeripheralRegistry;
//!
//! let mut registry = PeripheralRegistry::new(MockBackend::new());
//! let mut registers = RegisterFile::new();
//! let mut linker = Linker::new();
//!
//! registry.add_gpio(1, 2, PinMode::DigitalOutput);
//! assert!(linker.create_link(&registry, 1, 10, false));
//!
//! registers.write(10, 1);
//! linker.tick(&mut registry, &mut registers);
//! assert_eq!(registry.backend().level(2), Some(true));
//! ```

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use log::debug;

use crate::peripheral::{PeripheralKind, PinMode};
use crate::registers::{RegisterFile, REGISTER_COUNT};
use crate::registry::PeripheralRegistry;
use crate::traits::PeripheralBackend;

/// A snapshot of one link, as reported by [`Linker::all_links`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkInfo {
    /// Linked hardware id.
    pub hw_id: u32,
    /// Linked register address.
    pub register: u16,
    /// Kind of the peripheral, when it still exists in the registry.
    pub kind: Option<PeripheralKind>,
    /// Direction recorded at link time (true = sampled into the register).
    pub is_input: bool,
}

/// Bidirectional hardware ↔ register binding table plus the tick that
/// propagates values across it.
#[derive(Clone, Debug, Default)]
pub struct Linker {
    hw_to_reg: BTreeMap<u32, u16>,
    reg_to_hws: BTreeMap<u16, BTreeSet<u32>>,
    input_flags: BTreeMap<u32, bool>,
}

impl Linker {
    /// Creates an empty linker.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Link management
    // ========================================================================

    /// Creates (or replaces) the link for `hw_id`.
    ///
    /// Fails when the hardware id is not registered or the register address
    /// is out of range. An existing link for the same hardware id is removed
    /// first; linking is otherwise always accepted.
    pub fn create_link<B: PeripheralBackend>(
        &mut self,
        registry: &PeripheralRegistry<B>,
        hw_id: u32,
        register: u16,
        is_input: bool,
    ) -> bool {
        if !registry.exists(hw_id) || register as usize >= REGISTER_COUNT {
            return false;
        }

        if self.link_exists(hw_id) {
            self.remove_link(hw_id);
        }

        self.hw_to_reg.insert(hw_id, register);
        self.reg_to_hws.entry(register).or_default().insert(hw_id);
        self.input_flags.insert(hw_id, is_input);
        debug!(
            "linked hw {} -> reg {} ({})",
            hw_id,
            register,
            if is_input { "input" } else { "output" }
        );
        true
    }

    /// Removes the link for `hw_id`. Returns `true` iff a link existed.
    ///
    /// The command-level handler deliberately reports success even when this
    /// returns `false` (idempotent remove).
    pub fn remove_link(&mut self, hw_id: u32) -> bool {
        let Some(register) = self.hw_to_reg.remove(&hw_id) else {
            return false;
        };

        if let Some(set) = self.reg_to_hws.get_mut(&register) {
            set.remove(&hw_id);
            if set.is_empty() {
                self.reg_to_hws.remove(&register);
            }
        }
        self.input_flags.remove(&hw_id);
        true
    }

    /// Drops every link.
    pub fn clear_all(&mut self) {
        self.hw_to_reg.clear();
        self.reg_to_hws.clear();
        self.input_flags.clear();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// True when `hw_id` currently has a link.
    #[inline]
    pub fn link_exists(&self, hw_id: u32) -> bool {
        self.hw_to_reg.contains_key(&hw_id)
    }

    /// The register `hw_id` is linked to, if any.
    #[inline]
    pub fn linked_register(&self, hw_id: u32) -> Option<u16> {
        self.hw_to_reg.get(&hw_id).copied()
    }

    /// All hardware ids linked to `register`, ascending.
    pub fn linked_hardware(&self, register: u16) -> Vec<u32> {
        self.reg_to_hws
            .get(&register)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The direction recorded for `hw_id`; unlinked ids read as output.
    #[inline]
    pub fn is_input(&self, hw_id: u32) -> bool {
        self.input_flags.get(&hw_id).copied().unwrap_or(false)
    }

    /// Number of links.
    #[inline]
    pub fn count(&self) -> usize {
        self.hw_to_reg.len()
    }

    /// Every register address with at least one link, ascending.
    pub fn linked_registers(&self) -> Vec<u16> {
        self.reg_to_hws.keys().copied().collect()
    }

    /// A snapshot of every link, ascending by hardware id.
    pub fn all_links<B: PeripheralBackend>(
        &self,
        registry: &PeripheralRegistry<B>,
    ) -> Vec<LinkInfo> {
        self.hw_to_reg
            .iter()
            .map(|(&hw_id, &register)| LinkInfo {
                hw_id,
                register,
                kind: registry.kind(hw_id),
                is_input: self.is_input(hw_id),
            })
            .collect()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// One dataflow step: inputs phase, then outputs phase.
    ///
    /// With no intervening register or peripheral changes, running the tick
    /// twice leaves registers and peripheral outputs unchanged.
    pub fn tick<B: PeripheralBackend>(
        &self,
        registry: &mut PeripheralRegistry<B>,
        registers: &mut RegisterFile,
    ) {
        self.process_inputs(registry, registers);
        self.process_outputs(registry, registers);
    }

    /// Inputs phase: sample every input-linked peripheral into its register.
    ///
    /// Digital inputs store 0/1. Analog inputs store the sample clamped to
    /// 0..=65535; the −1 conversion-failure sentinel therefore collapses to
    /// 0. DACs have no input semantics and are skipped. A peripheral whose
    /// mode no longer matches its recorded direction is skipped silently.
    pub fn process_inputs<B: PeripheralBackend>(
        &self,
        registry: &mut PeripheralRegistry<B>,
        registers: &mut RegisterFile,
    ) {
        for (&hw_id, &register) in &self.hw_to_reg {
            if !self.is_input(hw_id) {
                continue;
            }
            match registry.kind(hw_id) {
                Some(PeripheralKind::Gpio) => {
                    if let Some(level) = registry.read_digital(hw_id) {
                        registers.write(register, level as u16);
                    } else if let Some(sample) = registry.read_analog(hw_id) {
                        registers.write(register, sample.clamp(0, u16::MAX as i32) as u16);
                    }
                }
                // DACs are output-only; stale ids are skipped.
                Some(PeripheralKind::Dac) | None => {}
            }
        }
    }

    /// Outputs phase: drive every output-linked peripheral from its register.
    ///
    /// Digital outputs receive `value != 0`, PWM pins the duty clamped to
    /// 0..=1023, DACs the raw code (codes above 4095 are rejected by the
    /// writer and dropped). Hardware failures skip the peripheral and the
    /// phase continues.
    pub fn process_outputs<B: PeripheralBackend>(
        &self,
        registry: &mut PeripheralRegistry<B>,
        registers: &mut RegisterFile,
    ) {
        for (&hw_id, &register) in &self.hw_to_reg {
            if self.is_input(hw_id) {
                continue;
            }
            let value = registers.read(register);
            match registry.kind(hw_id) {
                Some(PeripheralKind::Gpio) => {
                    let Some(gpio) = registry.get_gpio(hw_id) else {
                        continue;
                    };
                    match gpio.mode {
                        PinMode::DigitalOutput => {
                            registry.write_digital(hw_id, value != 0);
                        }
                        PinMode::Pwm => {
                            registry.write_pwm(hw_id, value);
                        }
                        _ => {}
                    }
                }
                Some(PeripheralKind::Dac) => {
                    registry.write_dac_raw(hw_id, value);
                }
                None => {}
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
