//! Peripheral model: GPIO pins with runtime-switchable modes and external
//! I²C DACs.
//!
//! A peripheral is one of two variants:
//!
//! | Variant | Identity | Direction |
//! |---------|----------|-----------|
//! | [`GpioPin`] | board pin number + [`PinMode`] | mode-dependent |
//! | [`Dac`] | I²C bus pins + 7-bit address | always output |
//!
//! The mode of a GPIO pin decides which direct-I/O operations are valid and
//! whether a link drives the pin from a register (output) or samples the pin
//! into a register (input). DACs are not reconfigurable; only their write
//! operations vary.

/// Operating mode of a GPIO pin.
///
/// The wire protocol encodes modes as single config bytes 0x01..=0x06; see
/// [`PinMode::from_config_byte`] and [`PinMode::config_byte`].
///
/// # Example
///
/// ```rust
/// use pinlink::peripheral::PinMode;
///
/// assert_eq!(PinMode::from_config_byte(0x04), Some(PinMode::DigitalOutput));
/// assert_eq!(PinMode::Pwm.config_byte(), 0x05);
/// assert!(PinMode::AnalogRead.is_input());
/// assert!(!PinMode::DigitalOutput.is_input());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PinMode {
    /// Floating digital input.
    DigitalInput,
    /// Digital input with the internal pull-up enabled.
    InputPullup,
    /// Digital input with the internal pull-down enabled.
    InputPulldown,
    /// Push-pull digital output.
    DigitalOutput,
    /// PWM output (10-bit duty, 5 kHz).
    Pwm,
    /// Oneshot ADC sampling, calibrated when a scheme is available.
    AnalogRead,
}

impl PinMode {
    /// Decodes a wire config byte; bytes outside 0x01..=0x06 are invalid.
    pub fn from_config_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(PinMode::DigitalInput),
            0x02 => Some(PinMode::InputPullup),
            0x03 => Some(PinMode::InputPulldown),
            0x04 => Some(PinMode::DigitalOutput),
            0x05 => Some(PinMode::Pwm),
            0x06 => Some(PinMode::AnalogRead),
            _ => None,
        }
    }

    /// The wire config byte for this mode.
    #[inline]
    pub const fn config_byte(&self) -> u8 {
        match self {
            PinMode::DigitalInput => 0x01,
            PinMode::InputPullup => 0x02,
            PinMode::InputPulldown => 0x03,
            PinMode::DigitalOutput => 0x04,
            PinMode::Pwm => 0x05,
            PinMode::AnalogRead => 0x06,
        }
    }

    /// True for the modes that sample hardware into a register.
    ///
    /// Links derive their direction from this; the host never chooses it.
    #[inline]
    pub const fn is_input(&self) -> bool {
        matches!(
            self,
            PinMode::DigitalInput
                | PinMode::InputPullup
                | PinMode::InputPulldown
                | PinMode::AnalogRead
        )
    }

    /// True for the digital input modes (excludes [`PinMode::AnalogRead`]).
    #[inline]
    pub const fn is_digital_input(&self) -> bool {
        matches!(
            self,
            PinMode::DigitalInput | PinMode::InputPullup | PinMode::InputPulldown
        )
    }
}

/// Coarse peripheral type, kept in a parallel registry index so type queries
/// never dispatch on the stored variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PeripheralKind {
    /// A GPIO pin in one of the six [`PinMode`]s.
    Gpio,
    /// An external I²C DAC.
    Dac,
}

impl PeripheralKind {
    /// Wire encoding used in READ_HW_CONFIG responses (GPIO 0x01, DAC 0x02).
    #[inline]
    pub const fn type_byte(&self) -> u8 {
        match self {
            PeripheralKind::Gpio => 0x01,
            PeripheralKind::Dac => 0x02,
        }
    }
}

// ============================================================================
// GPIO
// ============================================================================

/// A GPIO pin record owned by the registry.
///
/// The hardware-facing state for PWM (LEDC channel/timer) and ADC (unit,
/// channel, calibration scheme) lives in the backend, keyed by the pin
/// number; this record tracks the identity, the current mode, and whether the
/// pin survived its last (re)initialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpioPin {
    /// Board pin number.
    pub pin: u8,
    /// Current operating mode.
    pub mode: PinMode,
    /// False after a failed reconfigure; all I/O is refused until a later
    /// mode change succeeds.
    pub initialized: bool,
}

impl GpioPin {
    /// Creates a record for a pin in `mode`, not yet initialised.
    pub fn new(pin: u8, mode: PinMode) -> Self {
        Self {
            pin,
            mode,
            initialized: false,
        }
    }
}

// ============================================================================
// DAC
// ============================================================================

/// Full-scale code of the 12-bit DAC.
pub const DAC_MAX_RAW: u16 = 4095;

/// An external I²C DAC (MCP4725-style write protocol).
///
/// # Example
///
/// ```rust
/// use pinlink::peripheral::{Dac, DAC_MAX_RAW};
///
/// let dac = Dac::new(8, 9, 0x48, 0, 3.3);
/// assert_eq!(dac.voltage_to_raw(0.0), 0);
/// assert_eq!(dac.voltage_to_raw(3.3), DAC_MAX_RAW);
/// assert!((dac.raw_to_voltage(DAC_MAX_RAW) - 3.3).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dac {
    /// I²C data pin.
    pub sda: u8,
    /// I²C clock pin.
    pub scl: u8,
    /// 7-bit I²C address.
    pub address: u8,
    /// I²C controller index.
    pub port: u8,
    /// Output voltage at full-scale code.
    pub max_voltage: f32,
}

impl Dac {
    /// Default 7-bit I²C address.
    pub const DEFAULT_ADDRESS: u8 = 0x48;

    /// Output voltage at code 0.
    pub const MIN_VOLTAGE: f32 = 0.0;

    /// Creates a DAC record. The I²C driver is installed by the registry.
    pub fn new(sda: u8, scl: u8, address: u8, port: u8, max_voltage: f32) -> Self {
        Self {
            sda,
            scl,
            address,
            port,
            max_voltage,
        }
    }

    /// Converts a voltage to the nearest raw code, clamping to the DAC range.
    pub fn voltage_to_raw(&self, voltage: f32) -> u16 {
        let clamped = voltage.clamp(Self::MIN_VOLTAGE, self.max_voltage);
        let ratio = (clamped - Self::MIN_VOLTAGE) / (self.max_voltage - Self::MIN_VOLTAGE);
        (ratio * DAC_MAX_RAW as f32) as u16
    }

    /// Converts a raw code to the output voltage it produces.
    pub fn raw_to_voltage(&self, raw: u16) -> f32 {
        let raw = raw.min(DAC_MAX_RAW);
        let ratio = raw as f32 / DAC_MAX_RAW as f32;
        Self::MIN_VOLTAGE + ratio * (self.max_voltage - Self::MIN_VOLTAGE)
    }

    /// True when `voltage` lies inside the DAC's output range.
    #[inline]
    pub fn voltage_in_range(&self, voltage: f32) -> bool {
        (Self::MIN_VOLTAGE..=self.max_voltage).contains(&voltage)
    }
}

// ============================================================================
// Sum type
// ============================================================================

/// A registered peripheral.
#[derive(Clone, Debug, PartialEq)]
pub enum Peripheral {
    /// GPIO pin variant.
    Gpio(GpioPin),
    /// External DAC variant.
    Dac(Dac),
}

impl Peripheral {
    /// The coarse kind of this peripheral.
    #[inline]
    pub const fn kind(&self) -> PeripheralKind {
        match self {
            Peripheral::Gpio(_) => PeripheralKind::Gpio,
            Peripheral::Dac(_) => PeripheralKind::Dac,
        }
    }

    /// True when a link to this peripheral would be an input link.
    pub fn is_input(&self) -> bool {
        match self {
            Peripheral::Gpio(gpio) => gpio.mode.is_input(),
            Peripheral::Dac(_) => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_byte_round_trip() {
        for byte in 0x01..=0x06u8 {
            let mode = PinMode::from_config_byte(byte).unwrap();
            assert_eq!(mode.config_byte(), byte);
        }
    }

    #[test]
    fn invalid_config_bytes_rejected() {
        assert_eq!(PinMode::from_config_byte(0x00), None);
        assert_eq!(PinMode::from_config_byte(0x07), None);
        assert_eq!(PinMode::from_config_byte(0xFF), None);
    }

    #[test]
    fn input_direction_per_mode() {
        assert!(PinMode::DigitalInput.is_input());
        assert!(PinMode::InputPullup.is_input());
        assert!(PinMode::InputPulldown.is_input());
        assert!(PinMode::AnalogRead.is_input());
        assert!(!PinMode::DigitalOutput.is_input());
        assert!(!PinMode::Pwm.is_input());
    }

    #[test]
    fn digital_input_excludes_analog() {
        assert!(PinMode::InputPulldown.is_digital_input());
        assert!(!PinMode::AnalogRead.is_digital_input());
        assert!(!PinMode::Pwm.is_digital_input());
    }

    #[test]
    fn kind_type_bytes() {
        assert_eq!(PeripheralKind::Gpio.type_byte(), 0x01);
        assert_eq!(PeripheralKind::Dac.type_byte(), 0x02);
    }

    #[test]
    fn dac_voltage_conversion() {
        let dac = Dac::new(8, 9, Dac::DEFAULT_ADDRESS, 0, 3.3);

        assert_eq!(dac.voltage_to_raw(0.0), 0);
        assert_eq!(dac.voltage_to_raw(3.3), DAC_MAX_RAW);
        assert_eq!(dac.voltage_to_raw(-1.0), 0);
        assert_eq!(dac.voltage_to_raw(5.0), DAC_MAX_RAW);

        let half = dac.voltage_to_raw(1.65);
        assert!((half as i32 - 2047).abs() <= 1, "half-scale was {}", half);

        assert!((dac.raw_to_voltage(0) - 0.0).abs() < 1e-6);
        assert!((dac.raw_to_voltage(DAC_MAX_RAW) - 3.3).abs() < 1e-6);
        // Over-range codes saturate at full scale.
        assert!((dac.raw_to_voltage(u16::MAX) - 3.3).abs() < 1e-6);
    }

    #[test]
    fn dac_voltage_range_check() {
        let dac = Dac::new(8, 9, 0x60, 1, 5.0);
        assert!(dac.voltage_in_range(0.0));
        assert!(dac.voltage_in_range(5.0));
        assert!(!dac.voltage_in_range(-0.1));
        assert!(!dac.voltage_in_range(5.1));
    }

    #[test]
    fn peripheral_direction() {
        let input = Peripheral::Gpio(GpioPin::new(4, PinMode::AnalogRead));
        let output = Peripheral::Gpio(GpioPin::new(2, PinMode::Pwm));
        let dac = Peripheral::Dac(Dac::new(8, 9, 0x48, 0, 3.3));

        assert!(input.is_input());
        assert!(!output.is_input());
        assert!(!dac.is_input());

        assert_eq!(input.kind(), PeripheralKind::Gpio);
        assert_eq!(dac.kind(), PeripheralKind::Dac);
    }
}
