//! Core abstractions: the peripheral backend and the byte transport.
//!
//! These are the two seams that keep the bridge logic testable on desktop:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`PeripheralBackend`] | Raw GPIO / PWM / ADC / I²C-DAC operations |
//! | [`ByteLink`] | Full-duplex byte transport with read timeout |
//!
//! Mock implementations live in [`crate::hal::mock`]; ESP32 implementations
//! in `hal::esp32` (requires the `esp32` feature).

mod backend;
mod link;

pub use backend::PeripheralBackend;
pub use link::ByteLink;
