//! ESP-IDF peripheral backend.
//!
//! Pins are chosen by the host at runtime, so this backend drives the IDF C
//! API directly (`gpio_config`, `ledc_*`, `adc_oneshot_*`, `i2c_*`) instead
//! of the compile-time-typed `esp-idf-hal` drivers, which want to own a
//! concrete pin type. Per-pin driver state (LEDC channel, ADC unit and
//! calibration scheme) lives in maps keyed by pin number and is released in
//! `reset_pin` so a mode change can reacquire cleanly.
//!
//! PWM runs the LEDC low-speed group at 5 kHz with 10-bit duty. ADC channels
//! use 12-bit width at the 0–3.3 V attenuation and keep whichever calibration
//! scheme the chip supports (line fitting, else curve fitting, else raw
//! counts).

use std::collections::BTreeMap;

use esp_idf_hal::sys;
use esp_idf_hal::sys::{esp, EspError};
use log::{debug, warn};

use crate::peripheral::{Dac, PinMode};
use crate::traits::PeripheralBackend;

/// LEDC channels available in the low-speed group.
const LEDC_CHANNEL_COUNT: u8 = 8;

/// LEDC timers available in the low-speed group.
const LEDC_TIMER_COUNT: u8 = 4;

/// PWM frequency in Hz.
const PWM_FREQ_HZ: u32 = 5_000;

/// I²C bus clock in Hz.
const I2C_FREQ_HZ: u32 = 100_000;

/// I²C transaction timeout: one second of FreeRTOS ticks.
const I2C_TIMEOUT_TICKS: u32 = sys::configTICK_RATE_HZ;

struct AdcState {
    unit: sys::adc_oneshot_unit_handle_t,
    channel: sys::adc_channel_t,
    cali: sys::adc_cali_handle_t,
}

/// [`PeripheralBackend`] over the ESP-IDF drivers.
pub struct Esp32Backend {
    /// pin -> LEDC channel (timer is `channel % LEDC_TIMER_COUNT`).
    pwm: BTreeMap<u8, u8>,
    adc: BTreeMap<u8, AdcState>,
    free_channels: Vec<u8>,
}

// Raw IDF handles are only ever touched from whichever task holds the shared
// state lock.
unsafe impl Send for Esp32Backend {}

impl Esp32Backend {
    /// Creates a backend with every LEDC channel free.
    pub fn new() -> Self {
        Self {
            pwm: BTreeMap::new(),
            adc: BTreeMap::new(),
            free_channels: (0..LEDC_CHANNEL_COUNT).rev().collect(),
        }
    }

    fn configure_gpio(pin: u8, mode: PinMode) -> Result<(), EspError> {
        let (dir, pullup, pulldown) = match mode {
            PinMode::DigitalInput => (sys::gpio_mode_t_GPIO_MODE_INPUT, false, false),
            PinMode::InputPullup => (sys::gpio_mode_t_GPIO_MODE_INPUT, true, false),
            PinMode::InputPulldown => (sys::gpio_mode_t_GPIO_MODE_INPUT, false, true),
            PinMode::DigitalOutput => (sys::gpio_mode_t_GPIO_MODE_OUTPUT, false, false),
            // PWM and ADC pins are configured by their own drivers.
            PinMode::Pwm | PinMode::AnalogRead => return Ok(()),
        };

        let config = sys::gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: dir,
            pull_up_en: if pullup {
                sys::gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                sys::gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: if pulldown {
                sys::gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
            } else {
                sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
            },
            intr_type: sys::gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        esp!(unsafe { sys::gpio_config(&config) })
    }

    fn init_pwm(&mut self, pin: u8) -> Result<(), EspError> {
        let channel = self
            .free_channels
            .pop()
            .ok_or_else(|| EspError::from_infallible::<{ sys::ESP_ERR_NOT_FOUND }>())?;
        let timer = channel % LEDC_TIMER_COUNT;

        let mut timer_config = sys::ledc_timer_config_t {
            speed_mode: sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
            timer_num: timer as sys::ledc_timer_t,
            freq_hz: PWM_FREQ_HZ,
            clk_cfg: sys::soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
            ..Default::default()
        };
        // duty_resolution aliases bit_num through a bindgen union on some
        // IDF versions, so it cannot go in the struct literal.
        timer_config.duty_resolution = sys::ledc_timer_bit_t_LEDC_TIMER_10_BIT;

        if let Err(err) = esp!(unsafe { sys::ledc_timer_config(&timer_config) }) {
            self.free_channels.push(channel);
            return Err(err);
        }

        let channel_config = sys::ledc_channel_config_t {
            gpio_num: i32::from(pin),
            speed_mode: sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: channel as sys::ledc_channel_t,
            intr_type: sys::ledc_intr_type_t_LEDC_INTR_DISABLE,
            timer_sel: timer as sys::ledc_timer_t,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        if let Err(err) = esp!(unsafe { sys::ledc_channel_config(&channel_config) }) {
            self.free_channels.push(channel);
            return Err(err);
        }

        self.pwm.insert(pin, channel);
        debug!("pwm on pin {}: channel {} timer {}", pin, channel, timer);
        Ok(())
    }

    fn release_pwm(&mut self, pin: u8) {
        if let Some(channel) = self.pwm.remove(&pin) {
            if let Err(err) = esp!(unsafe {
                sys::ledc_stop(
                    sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                    channel as sys::ledc_channel_t,
                    0,
                )
            }) {
                warn!("ledc_stop failed on pin {}: {}", pin, err);
            }
            self.free_channels.push(channel);
        }
    }

    /// Board pin → oneshot ADC unit and channel. Pins outside the table have
    /// no ADC function.
    fn adc_route(pin: u8) -> Option<(sys::adc_unit_t, sys::adc_channel_t)> {
        match pin {
            1..=10 => Some((
                sys::adc_unit_t_ADC_UNIT_1,
                sys::adc_channel_t::from(pin - 1),
            )),
            11..=20 => Some((
                sys::adc_unit_t_ADC_UNIT_2,
                sys::adc_channel_t::from(pin - 11),
            )),
            _ => None,
        }
    }

    fn init_adc(&mut self, pin: u8) -> Result<(), EspError> {
        let (unit_id, channel) = Self::adc_route(pin)
            .ok_or_else(|| EspError::from_infallible::<{ sys::ESP_ERR_INVALID_ARG }>())?;

        let init_config = sys::adc_oneshot_unit_init_cfg_t {
            unit_id,
            ulp_mode: sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        let mut unit: sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        esp!(unsafe { sys::adc_oneshot_new_unit(&init_config, &mut unit) })?;

        let channel_config = sys::adc_oneshot_chan_cfg_t {
            atten: sys::adc_atten_t_ADC_ATTEN_DB_11,
            bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        if let Err(err) = esp!(unsafe { sys::adc_oneshot_config_channel(unit, channel, &channel_config) }) {
            unsafe { sys::adc_oneshot_del_unit(unit) };
            return Err(err);
        }

        let cali = Self::init_calibration(unit_id);
        if cali.is_null() {
            debug!("adc on pin {}: raw counts (no calibration scheme)", pin);
        } else {
            debug!("adc on pin {}: calibrated", pin);
        }

        self.adc.insert(pin, AdcState { unit, channel, cali });
        Ok(())
    }

    /// Tries the calibration schemes in preference order. Which schemes exist
    /// is a chip property, so unavailability is a compile-time branch.
    fn init_calibration(unit_id: sys::adc_unit_t) -> sys::adc_cali_handle_t {
        let mut handle: sys::adc_cali_handle_t = core::ptr::null_mut();

        #[cfg(any(esp32, esp32s2))]
        {
            let config = sys::adc_cali_line_fitting_config_t {
                unit_id,
                atten: sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_12,
                ..Default::default()
            };
            if unsafe { sys::adc_cali_create_scheme_line_fitting(&config, &mut handle) }
                == sys::ESP_OK
            {
                return handle;
            }
            handle = core::ptr::null_mut();
        }

        #[cfg(not(any(esp32, esp32s2)))]
        {
            let config = sys::adc_cali_curve_fitting_config_t {
                unit_id,
                atten: sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_12,
                ..Default::default()
            };
            if unsafe { sys::adc_cali_create_scheme_curve_fitting(&config, &mut handle) }
                == sys::ESP_OK
            {
                return handle;
            }
            handle = core::ptr::null_mut();
        }

        handle
    }

    fn release_adc(&mut self, pin: u8) {
        if let Some(state) = self.adc.remove(&pin) {
            if !state.cali.is_null() {
                #[cfg(any(esp32, esp32s2))]
                unsafe {
                    sys::adc_cali_delete_scheme_line_fitting(state.cali);
                }
                #[cfg(not(any(esp32, esp32s2)))]
                unsafe {
                    sys::adc_cali_delete_scheme_curve_fitting(state.cali);
                }
            }
            unsafe { sys::adc_oneshot_del_unit(state.unit) };
        }
    }
}

impl Default for Esp32Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralBackend for Esp32Backend {
    type Error = EspError;

    fn init_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), EspError> {
        Self::configure_gpio(pin, mode)?;
        match mode {
            PinMode::Pwm => self.init_pwm(pin),
            PinMode::AnalogRead => self.init_adc(pin),
            _ => Ok(()),
        }
    }

    fn reset_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), EspError> {
        match mode {
            PinMode::Pwm => self.release_pwm(pin),
            PinMode::AnalogRead => self.release_adc(pin),
            _ => {}
        }
        esp!(unsafe { sys::gpio_reset_pin(i32::from(pin)) })
    }

    fn digital_read(&mut self, pin: u8) -> Result<bool, EspError> {
        Ok(unsafe { sys::gpio_get_level(i32::from(pin)) } == 1)
    }

    fn digital_write(&mut self, pin: u8, level: bool) -> Result<(), EspError> {
        esp!(unsafe { sys::gpio_set_level(i32::from(pin), u32::from(level)) })
    }

    fn pwm_write(&mut self, pin: u8, duty: u16) -> Result<(), EspError> {
        let channel = *self
            .pwm
            .get(&pin)
            .ok_or_else(|| EspError::from_infallible::<{ sys::ESP_ERR_INVALID_STATE }>())?;
        let channel = channel as sys::ledc_channel_t;

        esp!(unsafe {
            sys::ledc_set_duty(
                sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel,
                u32::from(duty),
            )
        })?;
        esp!(unsafe { sys::ledc_update_duty(sys::ledc_mode_t_LEDC_LOW_SPEED_MODE, channel) })
    }

    fn analog_read(&mut self, pin: u8) -> Result<i32, EspError> {
        let state = self
            .adc
            .get(&pin)
            .ok_or_else(|| EspError::from_infallible::<{ sys::ESP_ERR_INVALID_STATE }>())?;

        let mut raw: i32 = 0;
        esp!(unsafe { sys::adc_oneshot_read(state.unit, state.channel, &mut raw) })?;

        if !state.cali.is_null() {
            let mut millivolts: i32 = 0;
            if unsafe { sys::adc_cali_raw_to_voltage(state.cali, raw, &mut millivolts) }
                == sys::ESP_OK
            {
                return Ok(millivolts);
            }
        }
        Ok(raw)
    }

    fn init_dac(&mut self, dac: &Dac) -> Result<(), EspError> {
        let mut config = sys::i2c_config_t {
            mode: sys::i2c_mode_t_I2C_MODE_MASTER,
            sda_io_num: i32::from(dac.sda),
            scl_io_num: i32::from(dac.scl),
            sda_pullup_en: true,
            scl_pullup_en: true,
            ..Default::default()
        };
        config.__bindgen_anon_1.master.clk_speed = I2C_FREQ_HZ;

        let port = i32::from(dac.port);
        esp!(unsafe { sys::i2c_param_config(port, &config) })?;
        esp!(unsafe { sys::i2c_driver_install(port, sys::i2c_mode_t_I2C_MODE_MASTER, 0, 0, 0) })
    }

    fn release_dac(&mut self, dac: &Dac) -> Result<(), EspError> {
        esp!(unsafe { sys::i2c_driver_delete(i32::from(dac.port)) })
    }

    fn dac_write(&mut self, dac: &Dac, raw: u16) -> Result<(), EspError> {
        // MCP4725 fast write: upper 4 bits then lower 8.
        let data = [((raw >> 8) & 0x0F) as u8, (raw & 0xFF) as u8];
        esp!(unsafe {
            sys::i2c_master_write_to_device(
                i32::from(dac.port),
                dac.address,
                data.as_ptr(),
                data.len(),
                I2C_TIMEOUT_TICKS,
            )
        })
    }
}
