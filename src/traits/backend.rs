//! Peripheral backend abstraction.

use crate::peripheral::{Dac, PinMode};

/// Raw hardware operations behind the peripheral registry.
///
/// The registry performs all policy checks (mode validation, clamping,
/// existence); a backend only touches hardware. Implementations own whatever
/// per-pin driver state the platform needs (LEDC channels, ADC units,
/// calibration schemes, I²C drivers) keyed by pin or port, and must release
/// that state deterministically in [`reset_pin`](Self::reset_pin) /
/// [`release_dac`](Self::release_dac) so a later init can reacquire it.
///
/// # Implementation Notes
///
/// - `init_pin` for [`PinMode::Pwm`] configures a 10-bit, 5 kHz PWM channel.
/// - `init_pin` for [`PinMode::AnalogRead`] configures a oneshot ADC channel
///   at 12-bit width with the 0–3.3 V attenuation, attempting line-fitting
///   calibration first, then curve-fitting, else raw counts.
/// - `analog_read` returns calibrated millivolts when calibration is active,
///   raw counts otherwise.
/// - All operations are expected to complete in microseconds; nothing here
///   may block on the transport.
pub trait PeripheralBackend {
    /// Error type for hardware operations.
    type Error: core::fmt::Debug;

    /// Configures `pin` for `mode`, acquiring any PWM/ADC resources it needs.
    fn init_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), Self::Error>;

    /// Releases the resources `mode` holds on `pin` and returns the pin to
    /// its default state.
    fn reset_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), Self::Error>;

    /// Samples the level of a digital input pin.
    fn digital_read(&mut self, pin: u8) -> Result<bool, Self::Error>;

    /// Drives a digital output pin.
    fn digital_write(&mut self, pin: u8, level: bool) -> Result<(), Self::Error>;

    /// Updates the PWM duty on `pin`. `duty` is already clamped to 0..=1023.
    fn pwm_write(&mut self, pin: u8, duty: u16) -> Result<(), Self::Error>;

    /// Performs a oneshot ADC conversion on `pin`.
    ///
    /// Returns calibrated millivolts when a calibration scheme initialised,
    /// raw 12-bit counts otherwise.
    fn analog_read(&mut self, pin: u8) -> Result<i32, Self::Error>;

    /// Installs the I²C driver for `dac`'s bus.
    fn init_dac(&mut self, dac: &Dac) -> Result<(), Self::Error>;

    /// Deletes the I²C driver owned by `dac`'s bus.
    fn release_dac(&mut self, dac: &Dac) -> Result<(), Self::Error>;

    /// Writes a raw code to `dac`. `raw` is already validated to fit 12 bits.
    fn dac_write(&mut self, dac: &Dac, raw: u16) -> Result<(), Self::Error>;
}
