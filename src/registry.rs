//! Peripheral registry: lifecycle, reconfiguration, and direct I/O.
//!
//! The registry is the exclusive owner of every peripheral. All policy
//! (existence checks, mode validation, range clamping) lives here, while the
//! raw hardware work is delegated to a [`PeripheralBackend`]. Other components
//! refer to peripherals only by hardware id and re-validate on every call, so
//! no handle can outlive a registry mutation.
//!
//! Lifecycle rules:
//!
//! - Hardware ids are unique. Adding a duplicate id removes the prior
//!   peripheral (releasing its hardware resources) before inserting.
//! - A peripheral whose initialisation fails is never inserted.
//! - Removal releases resources deterministically (PWM stop, ADC unit and
//!   calibration delete, I²C driver delete) before the record disappears.
//!
//! # Example
//!
//! ```rust
//! use pinlink::hal::mock::MockBackend;
//! use pinlink::peripheral::{PeripheralKind, PinMode};
//! use pinlink::registry::PeripheralRegistry;
//!
//! let mut registry = PeripheralRegistry::new(MockBackend::new());
//! assert!(registry.add_gpio(1, 2, PinMode::DigitalOutput));
//! assert_eq!(registry.kind(1), Some(PeripheralKind::Gpio));
//! assert!(registry.write_digital(1, true));
//! ```

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::peripheral::{Dac, GpioPin, Peripheral, PeripheralKind, PinMode, DAC_MAX_RAW};
use crate::traits::PeripheralBackend;

/// Largest PWM duty accepted by the 10-bit LEDC configuration.
pub const PWM_MAX_DUTY: u16 = 1023;

/// Sentinel carried by [`PeripheralRegistry::read_analog`] when the
/// conversion itself failed. Indistinguishable from a real reading of −1 mV;
/// the linker collapses it to 0.
pub const ANALOG_READ_ERROR: i32 = -1;

/// Owns all peripherals and mediates every hardware access.
pub struct PeripheralRegistry<B: PeripheralBackend> {
    peripherals: BTreeMap<u32, Peripheral>,
    /// Parallel kind index; type queries never dispatch on the stored variant.
    kinds: BTreeMap<u32, PeripheralKind>,
    backend: B,
}

impl<B: PeripheralBackend> PeripheralRegistry<B> {
    /// Creates an empty registry over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            peripherals: BTreeMap::new(),
            kinds: BTreeMap::new(),
            backend,
        }
    }

    /// Shared access to the backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Exclusive access to the backend.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Registers a GPIO pin under `hw_id`, replacing any prior peripheral
    /// with that id.
    ///
    /// Returns `false` (registry unchanged beyond the removal of a prior
    /// entry) when pin initialisation fails.
    pub fn add_gpio(&mut self, hw_id: u32, pin: u8, mode: PinMode) -> bool {
        if self.exists(hw_id) {
            self.remove(hw_id);
        }

        if let Err(err) = self.backend.init_pin(pin, mode) {
            warn!("gpio init failed: hw {} pin {} {:?}: {:?}", hw_id, pin, mode, err);
            return false;
        }

        let mut gpio = GpioPin::new(pin, mode);
        gpio.initialized = true;
        self.peripherals.insert(hw_id, Peripheral::Gpio(gpio));
        self.kinds.insert(hw_id, PeripheralKind::Gpio);
        info!("registered gpio: hw {} pin {} {:?}", hw_id, pin, mode);
        true
    }

    /// Registers an external I²C DAC under `hw_id`, replacing any prior
    /// peripheral with that id.
    pub fn add_dac(
        &mut self,
        hw_id: u32,
        sda: u8,
        scl: u8,
        address: u8,
        port: u8,
        max_voltage: f32,
    ) -> bool {
        if self.exists(hw_id) {
            self.remove(hw_id);
        }

        let dac = Dac::new(sda, scl, address, port, max_voltage);
        if let Err(err) = self.backend.init_dac(&dac) {
            warn!("dac init failed: hw {} port {}: {:?}", hw_id, port, err);
            return false;
        }

        self.peripherals.insert(hw_id, Peripheral::Dac(dac));
        self.kinds.insert(hw_id, PeripheralKind::Dac);
        info!("registered dac: hw {} addr {:#04x} port {}", hw_id, address, port);
        true
    }

    /// Removes the peripheral registered under `hw_id`, releasing its
    /// hardware resources first.
    ///
    /// Returns `false` when no such peripheral exists.
    pub fn remove(&mut self, hw_id: u32) -> bool {
        let Some(peripheral) = self.peripherals.remove(&hw_id) else {
            return false;
        };
        self.kinds.remove(&hw_id);

        match peripheral {
            Peripheral::Gpio(gpio) => {
                if gpio.initialized {
                    if let Err(err) = self.backend.reset_pin(gpio.pin, gpio.mode) {
                        warn!("pin release failed: pin {}: {:?}", gpio.pin, err);
                    }
                }
            }
            Peripheral::Dac(dac) => {
                if let Err(err) = self.backend.release_dac(&dac) {
                    warn!("i2c release failed: port {}: {:?}", dac.port, err);
                }
            }
        }

        debug!("removed hw {}", hw_id);
        true
    }

    /// Removes every peripheral, releasing all hardware resources.
    pub fn clear_all(&mut self) {
        let ids: Vec<u32> = self.peripherals.keys().copied().collect();
        for hw_id in ids {
            self.remove(hw_id);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// True when a peripheral is registered under `hw_id`.
    #[inline]
    pub fn exists(&self, hw_id: u32) -> bool {
        self.kinds.contains_key(&hw_id)
    }

    /// The kind of the peripheral under `hw_id`, via the parallel index.
    #[inline]
    pub fn kind(&self, hw_id: u32) -> Option<PeripheralKind> {
        self.kinds.get(&hw_id).copied()
    }

    /// The GPIO record under `hw_id`, if that id holds a GPIO pin.
    pub fn get_gpio(&self, hw_id: u32) -> Option<&GpioPin> {
        match self.peripherals.get(&hw_id) {
            Some(Peripheral::Gpio(gpio)) => Some(gpio),
            _ => None,
        }
    }

    /// The DAC record under `hw_id`, if that id holds a DAC.
    pub fn get_dac(&self, hw_id: u32) -> Option<&Dac> {
        match self.peripherals.get(&hw_id) {
            Some(Peripheral::Dac(dac)) => Some(dac),
            _ => None,
        }
    }

    /// Number of registered peripherals.
    #[inline]
    pub fn count(&self) -> usize {
        self.kinds.len()
    }

    /// All registered hardware ids, ascending.
    pub fn ids(&self) -> Vec<u32> {
        self.kinds.keys().copied().collect()
    }

    /// Hardware ids of the given kind, ascending.
    pub fn ids_by_kind(&self, kind: PeripheralKind) -> Vec<u32> {
        self.kinds
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    // ========================================================================
    // Reconfiguration
    // ========================================================================

    /// Switches the GPIO pin under `hw_id` to `new_mode`.
    ///
    /// Requires an initialised pin. A request for the current mode is a
    /// no-op success. Otherwise the pin's PWM/ADC resources are released, the
    /// pin is reset to its default state, and it is re-initialised for the
    /// new mode. On re-init failure the pin is left uninitialised, refusing
    /// all I/O and further reconfiguration, and `false` is returned.
    pub fn change_config(&mut self, hw_id: u32, new_mode: PinMode) -> bool {
        let (pin, old_mode) = match self.peripherals.get(&hw_id) {
            Some(Peripheral::Gpio(gpio)) if gpio.initialized => (gpio.pin, gpio.mode),
            _ => return false,
        };
        if old_mode == new_mode {
            return true;
        }

        if let Err(err) = self.backend.reset_pin(pin, old_mode) {
            warn!("pin reset failed: pin {}: {:?}", pin, err);
        }

        let ok = match self.backend.init_pin(pin, new_mode) {
            Ok(()) => true,
            Err(err) => {
                warn!("reconfigure failed: pin {} -> {:?}: {:?}", pin, new_mode, err);
                false
            }
        };

        if let Some(Peripheral::Gpio(gpio)) = self.peripherals.get_mut(&hw_id) {
            gpio.mode = new_mode;
            gpio.initialized = ok;
        }
        ok
    }

    // ========================================================================
    // Direct I/O
    // ========================================================================

    /// Samples a digital input pin. `None` when `hw_id` is not an initialised
    /// GPIO in a digital input mode; a hardware fault degrades to `false`.
    pub fn read_digital(&mut self, hw_id: u32) -> Option<bool> {
        let gpio = match self.get_gpio(hw_id) {
            Some(g) if g.initialized && g.mode.is_digital_input() => *g,
            _ => return None,
        };
        Some(self.backend.digital_read(gpio.pin).unwrap_or(false))
    }

    /// Performs an analog conversion. `None` when `hw_id` is not an
    /// initialised GPIO in [`PinMode::AnalogRead`].
    ///
    /// The value is calibrated millivolts when a calibration scheme was
    /// available at init, raw 12-bit counts otherwise; a failed conversion
    /// yields [`ANALOG_READ_ERROR`].
    pub fn read_analog(&mut self, hw_id: u32) -> Option<i32> {
        let gpio = match self.get_gpio(hw_id) {
            Some(g) if g.initialized && g.mode == PinMode::AnalogRead => *g,
            _ => return None,
        };
        Some(self.backend.analog_read(gpio.pin).unwrap_or(ANALOG_READ_ERROR))
    }

    /// Drives a digital output pin. `false` unless `hw_id` is an initialised
    /// GPIO in [`PinMode::DigitalOutput`] and the write succeeded.
    pub fn write_digital(&mut self, hw_id: u32, value: bool) -> bool {
        let gpio = match self.get_gpio(hw_id) {
            Some(g) if g.initialized && g.mode == PinMode::DigitalOutput => *g,
            _ => return false,
        };
        self.backend.digital_write(gpio.pin, value).is_ok()
    }

    /// Updates the PWM duty, clamping to 0..=[`PWM_MAX_DUTY`]. `false` unless
    /// `hw_id` is an initialised GPIO in [`PinMode::Pwm`].
    pub fn write_pwm(&mut self, hw_id: u32, duty: u16) -> bool {
        let gpio = match self.get_gpio(hw_id) {
            Some(g) if g.initialized && g.mode == PinMode::Pwm => *g,
            _ => return false,
        };
        self.backend
            .pwm_write(gpio.pin, duty.min(PWM_MAX_DUTY))
            .is_ok()
    }

    /// Writes a raw code to a DAC. Codes above [`DAC_MAX_RAW`] are rejected
    /// without touching the hardware.
    pub fn write_dac_raw(&mut self, hw_id: u32, raw: u16) -> bool {
        if raw > DAC_MAX_RAW {
            return false;
        }
        let dac = match self.get_dac(hw_id) {
            Some(d) => *d,
            None => return false,
        };
        self.backend.dac_write(&dac, raw).is_ok()
    }

    /// Writes a voltage to a DAC, rejecting values outside its output range.
    pub fn write_dac_voltage(&mut self, hw_id: u32, voltage: f32) -> bool {
        let dac = match self.get_dac(hw_id) {
            Some(d) => *d,
            None => return false,
        };
        if !dac.voltage_in_range(voltage) {
            return false;
        }
        self.backend.dac_write(&dac, dac.voltage_to_raw(voltage)).is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{BackendOp, MockBackend};

    fn registry() -> PeripheralRegistry<MockBackend> {
        PeripheralRegistry::new(MockBackend::new())
    }

    // =========================================================================
    // Lifecycle Tests
    // =========================================================================

    #[test]
    fn add_gpio_registers_and_initialises() {
        let mut reg = registry();
        assert!(reg.add_gpio(1, 2, PinMode::Pwm));

        assert!(reg.exists(1));
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.kind(1), Some(PeripheralKind::Gpio));

        let gpio = reg.get_gpio(1).unwrap();
        assert_eq!(gpio.pin, 2);
        assert_eq!(gpio.mode, PinMode::Pwm);
        assert!(gpio.initialized);
        assert_eq!(reg.backend().pin_mode(2), Some(PinMode::Pwm));
    }

    #[test]
    fn add_dac_registers() {
        let mut reg = registry();
        assert!(reg.add_dac(7, 8, 9, 0x48, 0, 3.3));

        assert_eq!(reg.kind(7), Some(PeripheralKind::Dac));
        let dac = reg.get_dac(7).unwrap();
        assert_eq!(dac.address, 0x48);
        assert!(reg.get_gpio(7).is_none());
    }

    #[test]
    fn failed_init_is_not_inserted() {
        let mut reg = registry();
        reg.backend_mut().fail_next_init();

        assert!(!reg.add_gpio(1, 2, PinMode::DigitalOutput));
        assert!(!reg.exists(1));
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn duplicate_id_replaces_and_releases_prior() {
        let mut reg = registry();
        assert!(reg.add_gpio(1, 2, PinMode::Pwm));
        assert!(reg.add_gpio(1, 4, PinMode::DigitalInput));

        assert_eq!(reg.count(), 1);
        let gpio = reg.get_gpio(1).unwrap();
        assert_eq!(gpio.pin, 4);
        assert_eq!(gpio.mode, PinMode::DigitalInput);

        // The prior pin's resources were torn down before the new insert.
        assert!(reg
            .backend()
            .ops
            .contains(&BackendOp::ResetPin { pin: 2, mode: PinMode::Pwm }));
        assert_eq!(reg.backend().pin_mode(2), None);
    }

    #[test]
    fn duplicate_id_with_failed_init_still_drops_prior() {
        let mut reg = registry();
        assert!(reg.add_gpio(1, 2, PinMode::Pwm));
        reg.backend_mut().fail_next_init();

        assert!(!reg.add_gpio(1, 4, PinMode::DigitalInput));
        // Prior entry was removed first; the failed replacement is absent.
        assert!(!reg.exists(1));
    }

    #[test]
    fn remove_releases_resources() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::AnalogRead);
        reg.add_dac(2, 8, 9, 0x48, 0, 3.3);

        assert!(reg.remove(1));
        assert!(reg.remove(2));
        assert!(!reg.remove(2));
        assert_eq!(reg.count(), 0);

        let ops = &reg.backend().ops;
        assert!(ops.contains(&BackendOp::ResetPin { pin: 2, mode: PinMode::AnalogRead }));
        assert!(ops.contains(&BackendOp::ReleaseDac { port: 0 }));
    }

    #[test]
    fn clear_all_releases_everything() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::Pwm);
        reg.add_gpio(2, 4, PinMode::DigitalInput);
        reg.add_dac(3, 8, 9, 0x48, 0, 3.3);

        reg.clear_all();
        assert_eq!(reg.count(), 0);
        assert_eq!(reg.backend().pin_mode(2), None);
        assert_eq!(reg.backend().pin_mode(4), None);
    }

    #[test]
    fn ids_and_kind_filters() {
        let mut reg = registry();
        reg.add_gpio(3, 2, PinMode::Pwm);
        reg.add_dac(1, 8, 9, 0x48, 0, 3.3);
        reg.add_gpio(2, 4, PinMode::DigitalInput);

        assert_eq!(reg.ids(), alloc::vec![1, 2, 3]);
        assert_eq!(reg.ids_by_kind(PeripheralKind::Gpio), alloc::vec![2, 3]);
        assert_eq!(reg.ids_by_kind(PeripheralKind::Dac), alloc::vec![1]);
    }

    // =========================================================================
    // Reconfiguration Tests
    // =========================================================================

    #[test]
    fn change_config_switches_mode() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::Pwm);

        assert!(reg.change_config(1, PinMode::DigitalOutput));
        let gpio = reg.get_gpio(1).unwrap();
        assert_eq!(gpio.mode, PinMode::DigitalOutput);
        assert!(gpio.initialized);
        assert_eq!(reg.backend().pin_mode(2), Some(PinMode::DigitalOutput));
    }

    #[test]
    fn change_config_same_mode_is_noop() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::Pwm);
        let ops_before = reg.backend().ops.len();

        assert!(reg.change_config(1, PinMode::Pwm));
        assert_eq!(reg.backend().ops.len(), ops_before);
    }

    #[test]
    fn change_config_failure_leaves_pin_uninitialised() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::Pwm);
        reg.backend_mut().fail_next_init();

        assert!(!reg.change_config(1, PinMode::AnalogRead));
        let gpio = reg.get_gpio(1).unwrap();
        assert_eq!(gpio.mode, PinMode::AnalogRead);
        assert!(!gpio.initialized);

        // Uninitialised pins refuse all I/O, and reconfigure itself requires
        // an initialised pin; only re-adding the peripheral revives it.
        assert_eq!(reg.read_analog(1), None);
        assert!(!reg.change_config(1, PinMode::DigitalOutput));
        assert!(reg.add_gpio(1, 2, PinMode::DigitalOutput));
        assert!(reg.write_digital(1, true));
    }

    #[test]
    fn change_config_rejects_dac_and_unknown() {
        let mut reg = registry();
        reg.add_dac(1, 8, 9, 0x48, 0, 3.3);

        assert!(!reg.change_config(1, PinMode::Pwm));
        assert!(!reg.change_config(99, PinMode::Pwm));
    }

    // =========================================================================
    // Direct I/O Tests
    // =========================================================================

    #[test]
    fn read_digital_requires_digital_input_mode() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::InputPullup);
        reg.add_gpio(2, 4, PinMode::Pwm);

        reg.backend_mut().set_level(2, true);
        assert_eq!(reg.read_digital(1), Some(true));
        reg.backend_mut().set_level(2, false);
        assert_eq!(reg.read_digital(1), Some(false));

        assert_eq!(reg.read_digital(2), None); // wrong mode
        assert_eq!(reg.read_digital(3), None); // unknown id
    }

    #[test]
    fn read_analog_requires_analog_mode_and_degrades_on_error() {
        let mut reg = registry();
        reg.add_gpio(1, 4, PinMode::AnalogRead);
        reg.add_gpio(2, 2, PinMode::DigitalInput);

        reg.backend_mut().set_analog(4, 2048);
        assert_eq!(reg.read_analog(1), Some(2048));
        assert_eq!(reg.read_analog(2), None);

        reg.backend_mut().fail_next_analog_read();
        assert_eq!(reg.read_analog(1), Some(ANALOG_READ_ERROR));
    }

    #[test]
    fn write_digital_requires_output_mode() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::DigitalOutput);
        reg.add_gpio(2, 4, PinMode::DigitalInput);

        assert!(reg.write_digital(1, true));
        assert_eq!(reg.backend().level(2), Some(true));

        assert!(!reg.write_digital(2, true));
        assert!(!reg.write_digital(9, true));
    }

    #[test]
    fn write_pwm_clamps_duty() {
        let mut reg = registry();
        reg.add_gpio(1, 2, PinMode::Pwm);

        assert!(reg.write_pwm(1, 512));
        assert_eq!(reg.backend().duty(2), Some(512));

        assert!(reg.write_pwm(1, 0xFFFF));
        assert_eq!(reg.backend().duty(2), Some(PWM_MAX_DUTY));

        assert!(!reg.write_pwm(9, 1));
    }

    #[test]
    fn write_dac_raw_validates_range() {
        let mut reg = registry();
        reg.add_dac(1, 8, 9, 0x48, 0, 3.3);

        assert!(reg.write_dac_raw(1, DAC_MAX_RAW));
        assert_eq!(reg.backend().dac_value(0), Some(DAC_MAX_RAW));

        assert!(!reg.write_dac_raw(1, DAC_MAX_RAW + 1));
        assert_eq!(reg.backend().dac_value(0), Some(DAC_MAX_RAW));

        assert!(!reg.write_dac_raw(9, 0));
    }

    #[test]
    fn write_dac_voltage_converts_and_range_checks() {
        let mut reg = registry();
        reg.add_dac(1, 8, 9, 0x48, 0, 3.3);

        assert!(reg.write_dac_voltage(1, 3.3));
        assert_eq!(reg.backend().dac_value(0), Some(DAC_MAX_RAW));

        assert!(!reg.write_dac_voltage(1, 3.4));
        assert!(!reg.write_dac_voltage(1, -0.1));
    }
}
