//! ESP32 peripheral-to-register bridge firmware.
//!
//! This is the main entry point for the physical hardware build. It wires
//! UART0 to the command protocol, registers the power-on peripheral set, and
//! runs the two firmware tasks:
//! - The linker task ticks the register ↔ hardware dataflow at 100Hz
//! - The request/response task answers 8-byte command packets on the UART
//!
//! On power-on only the fixed example peripherals below exist; the host
//! reconfigures and links hardware entirely through commands 0x04-0x06.
//!
//! # Build
//!
//! ```bash
//! cargo build --features esp32 --target riscv32imc-esp-espidf
//! ```

use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{config as uart_config, UartDriver};
use esp_idf_hal::units::Hertz;
use pinlink::hal::esp32::{Esp32Backend, Esp32Link};
use pinlink::peripheral::PinMode;
use pinlink::registry::PeripheralRegistry;
use pinlink::supervisor::Supervisor;
use pinlink::Config;

/// Power-on peripheral set: (hardware id, pin, mode).
const DEFAULT_PINS: [(u32, u8, PinMode); 2] =
    [(1, 2, PinMode::Pwm), (2, 4, PinMode::DigitalInput)];

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = Config::default();

    println!();
    println!("================================");
    println!("  {} register bridge", config.device.name.as_str());
    println!("================================");
    println!();

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Initialize UART0 (host link, 8-N-1)
    // =========================================================================
    let uart = UartDriver::new(
        peripherals.uart0,
        peripherals.pins.gpio21, // TX
        peripherals.pins.gpio20, // RX
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config::Config::default().baudrate(Hertz(config.serial.baud_rate)),
    )?;
    let link = Esp32Link::new(uart);
    println!("[OK] UART0 initialized ({} baud)", config.serial.baud_rate);

    // =========================================================================
    // Register the power-on peripheral set
    // =========================================================================
    let mut registry = PeripheralRegistry::new(Esp32Backend::new());
    for (hw_id, pin, mode) in DEFAULT_PINS {
        if registry.add_gpio(hw_id, pin, mode) {
            println!("[OK] hw {} -> GPIO{} ({:?})", hw_id, pin, mode);
        } else {
            println!("[WARN] hw {} -> GPIO{} init failed", hw_id, pin);
        }
    }

    // =========================================================================
    // Start the linker task, then serve the host link forever
    // =========================================================================
    let supervisor = Supervisor::new(registry, config);
    let _linker_task = supervisor.spawn_linker();
    println!();
    println!("Serving host commands...");
    println!();

    supervisor.run_transport(link)
}
