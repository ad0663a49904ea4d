//! UART byte transport for the host link.

use std::time::Duration;

use esp_idf_hal::delay::TickType;
use esp_idf_hal::sys::EspError;
use esp_idf_hal::uart::UartDriver;

use crate::traits::ByteLink;

/// [`ByteLink`] over an ESP32 UART (8-N-1).
///
/// # Example
///
/// ```ignore
/// use esp_idf_hal::peripherals::Peripherals;
/// use esp_idf_hal::gpio::AnyIOPin;
/// use esp_idf_hal::uart::{config, UartDriver};
/// use esp_idf_hal::units::Hertz;
/// use pinlink::hal::esp32::Esp32Link;
///
/// let peripherals = Peripherals::take()?;
/// let uart = UartDriver::new(
///     peripherals.uart0,
///     peripherals.pins.gpio21,
///     peripherals.pins.gpio20,
///     Option::<AnyIOPin>::None,
///     Option::<AnyIOPin>::None,
///     &config::Config::default().baudrate(Hertz(115_200)),
/// )?;
/// let link = Esp32Link::new(uart);
/// ```
pub struct Esp32Link<'d> {
    uart: UartDriver<'d>,
}

impl<'d> Esp32Link<'d> {
    /// Wraps an already-configured UART driver.
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl ByteLink for Esp32Link<'_> {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, EspError> {
        let ticks = TickType::from(Duration::from_millis(u64::from(timeout_ms)));
        self.uart.read(buf, ticks.ticks())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), EspError> {
        let mut written = 0;
        while written < buf.len() {
            written += self.uart.write(&buf[written..])?;
        }
        Ok(())
    }
}
