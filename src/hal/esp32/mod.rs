//! ESP32 implementations of the hardware traits.
//!
//! - [`Esp32Backend`]: runtime-configurable GPIO / LEDC PWM / oneshot ADC /
//!   I²C DAC access through the ESP-IDF drivers
//! - [`Esp32Link`]: UART byte transport
//!
//! Requires the `esp32` feature and the ESP-IDF toolchain.

pub mod backend;
pub mod link;

pub use backend::Esp32Backend;
pub use link::Esp32Link;
