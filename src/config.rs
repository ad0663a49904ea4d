//! Shared configuration for desktop and ESP32 builds.
//!
//! Nothing here is persisted; the struct exists so the binary and the tests
//! agree on the serial and tick parameters without magic numbers.
//!
//! # Example
//!
//! ```rust
//! use pinlink::config::{Config, LinkerConfig, SerialConfig};
//!
//! // Use defaults (115200 8-N-1, 1s read timeout, 100 Hz tick)
//! let config = Config::default();
//! assert_eq!(config.serial.baud_rate, 115_200);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_serial(SerialConfig::default().with_read_timeout_ms(250))
//!     .with_linker(LinkerConfig::default().with_tick_hz(50));
//! assert_eq!(config.linker.tick_period_ms(), 20);
//! ```

use heapless::String as HString;

/// Maximum length of the device name string.
pub const MAX_NAME_LEN: usize = 32;

/// Device name storage.
pub type NameString = HString<MAX_NAME_LEN>;

// ============================================================================
// Main Config
// ============================================================================

/// Complete firmware configuration.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Serial link parameters.
    pub serial: SerialConfig,
    /// Linker tick parameters.
    pub linker: LinkerConfig,
    /// Device identification.
    pub device: DeviceConfig,
}

impl Config {
    /// Set serial configuration.
    pub fn with_serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    /// Set linker configuration.
    pub fn with_linker(mut self, linker: LinkerConfig) -> Self {
        self.linker = linker;
        self
    }

    /// Set device configuration.
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }
}

// ============================================================================
// Serial Config
// ============================================================================

/// Serial link configuration (8-N-1 framing is fixed).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// Baud rate.
    pub baud_rate: u32,
    /// Packet read timeout in milliseconds.
    pub read_timeout_ms: u32,
    /// Scheduling yield between request/response iterations, milliseconds.
    pub yield_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout_ms: 1_000,
            yield_ms: 5,
        }
    }
}

impl SerialConfig {
    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the packet read timeout.
    pub fn with_read_timeout_ms(mut self, read_timeout_ms: u32) -> Self {
        self.read_timeout_ms = read_timeout_ms;
        self
    }

    /// Set the post-response yield.
    pub fn with_yield_ms(mut self, yield_ms: u32) -> Self {
        self.yield_ms = yield_ms;
        self
    }
}

// ============================================================================
// Linker Config
// ============================================================================

/// Linker tick configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkerConfig {
    /// Tick frequency in Hz.
    pub tick_hz: u32,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self { tick_hz: 100 }
    }
}

impl LinkerConfig {
    /// Set the tick frequency (clamped to at least 1 Hz).
    pub fn with_tick_hz(mut self, tick_hz: u32) -> Self {
        self.tick_hz = tick_hz.max(1);
        self
    }

    /// The tick period in milliseconds.
    #[inline]
    pub fn tick_period_ms(&self) -> u64 {
        1_000 / u64::from(self.tick_hz.max(1))
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification, used in log output only.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Human-readable device name.
    pub name: NameString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut name = NameString::new();
        let _ = name.push_str("pinlink");
        Self { name }
    }
}

impl DeviceConfig {
    /// Set the device name, truncating to [`MAX_NAME_LEN`] bytes.
    pub fn with_name(mut self, name: &str) -> Self {
        let mut stored = NameString::new();
        let take = name
            .char_indices()
            .take_while(|(i, _)| *i < MAX_NAME_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let _ = stored.push_str(&name[..take.min(name.len())]);
        self.name = stored;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_defaults() {
        let serial = SerialConfig::default();
        assert_eq!(serial.baud_rate, 115_200);
        assert_eq!(serial.read_timeout_ms, 1_000);
        assert_eq!(serial.yield_ms, 5);
    }

    #[test]
    fn linker_tick_period() {
        assert_eq!(LinkerConfig::default().tick_period_ms(), 10);
        assert_eq!(LinkerConfig::default().with_tick_hz(50).tick_period_ms(), 20);
        // 0 Hz is clamped rather than dividing by zero.
        assert_eq!(LinkerConfig::default().with_tick_hz(0).tick_hz, 1);
    }

    #[test]
    fn builder_chains() {
        let config = Config::default()
            .with_serial(SerialConfig::default().with_baud_rate(9_600))
            .with_linker(LinkerConfig::default().with_tick_hz(10))
            .with_device(DeviceConfig::default().with_name("bench-rig"));

        assert_eq!(config.serial.baud_rate, 9_600);
        assert_eq!(config.linker.tick_hz, 10);
        assert_eq!(config.device.name.as_str(), "bench-rig");
    }

    #[test]
    fn device_name_truncates() {
        let long = "x".repeat(MAX_NAME_LEN + 10);
        let device = DeviceConfig::default().with_name(&long);
        assert_eq!(device.name.len(), MAX_NAME_LEN);
    }
}
