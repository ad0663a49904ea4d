//! # pinlink
//!
//! An educational ESP32 firmware that exposes the board's peripherals
//! (digital/analog GPIO, PWM, external I²C DACs) to a host over a serial
//! link. The host speaks fixed 8-byte binary command packets; a background
//! linker continuously mirrors peripheral values into a small register file
//! and drives output peripherals from the same file, so the host can work
//! either by direct command or through registers bound to hardware.
//!
//! ## Features
//!
//! - **Command protocol**: 8-byte little-endian frames with CRC-8/0x07,
//!   six commands covering registers, peripheral config, and links
//! - **Register file**: 100 × 16-bit cells shared between host and hardware
//! - **Linker**: bidirectional register ↔ peripheral bindings, ticked at
//!   100 Hz with direction derived from each peripheral's mode
//! - **Runtime reconfiguration**: GPIO pins switch between six modes with
//!   deterministic PWM/ADC resource handover
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `packet` - Wire frame codec and CRC
//! - `registers` - The register file
//! - `peripheral` - Pin modes and peripheral records
//! - `registry` - Peripheral lifecycle and direct I/O
//! - `linker` - Register ↔ hardware bindings and the dataflow tick
//! - `processor` - Command dispatch
//! - `supervisor` - Transport framing and the two firmware tasks
//! - `traits` - Hardware and transport abstractions
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use pinlink::config::Config;
//! use pinlink::hal::mock::{MockBackend, MockLink};
//! use pinlink::packet::CommandPacket;
//! use pinlink::peripheral::PinMode;
//! use pinlink::registry::PeripheralRegistry;
//! use pinlink::supervisor::Supervisor;
//!
//! // Boot: register a pin, start the supervisor.
//! let mut registry = PeripheralRegistry::new(MockBackend::new());
//! registry.add_gpio(1, 2, PinMode::DigitalOutput);
//! let supervisor = Supervisor::new(registry, Config::default());
//!
//! // Host links hw 1 to register 10, writes the register...
//! let mut link = MockLink::new();
//! link.push_packet(&CommandPacket::new(0x05, 0x0001, 0x000A, 0));
//! link.push_packet(&CommandPacket::new(0x02, 0x000A, 0x0001, 0));
//! supervisor.poll_once(&mut link);
//! supervisor.poll_once(&mut link);
//!
//! // ...and the next tick drives the pin high.
//! supervisor.tick_once();
//! let shared = supervisor.shared();
//! assert_eq!(shared.lock().unwrap().registry.backend().level(2), Some(true));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Register ↔ hardware linker and the dataflow tick.
pub mod linker;
/// Command packet codec and CRC.
pub mod packet;
/// Peripheral model: pin modes, GPIO and DAC records.
pub mod peripheral;
/// Command dispatch over the register file, registry, and linker.
pub mod processor;
/// The fixed register file.
pub mod registers;
/// Peripheral registry: lifecycle, reconfiguration, direct I/O.
pub mod registry;
/// Core traits for hardware and transport abstraction.
pub mod traits;

/// Transport framing and the two firmware tasks (requires `std`).
#[cfg(feature = "std")]
pub mod supervisor;

// Re-exports for convenience
pub use config::{Config, DeviceConfig, LinkerConfig, SerialConfig};
pub use linker::{LinkInfo, Linker};
pub use packet::{CommandPacket, PacketError, PACKET_LEN};
pub use peripheral::{Dac, GpioPin, Peripheral, PeripheralKind, PinMode, DAC_MAX_RAW};
pub use processor::{process_command, Command, RESPONSE_FAILURE, RESPONSE_SUCCESS};
pub use registers::{RegisterFile, REGISTER_COUNT};
pub use registry::{PeripheralRegistry, ANALOG_READ_ERROR, PWM_MAX_DUTY};
pub use traits::{ByteLink, PeripheralBackend};

#[cfg(feature = "std")]
pub use supervisor::{SharedState, Supervisor};
