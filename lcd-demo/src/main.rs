mod config;

use std::fmt::Write;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use eyre::eyre;
use log::{debug, info, warn};
use liquidcrystal_gpio::{GpioActiveLevel, GpioDriver, GpioOutput};
use liquidcrystal_gpio::expander::Pcf8574;
use liquidcrystal_gpio::gpiod::GpiodDriver;
use liquidcrystal_gpio::i2c::LinuxI2cDevice;
use liquidcrystal_gpio::lcd::hd44780::LiquidCrystal;
use liquidcrystal_gpio::lcd::hd44780::driver::{
    ExpanderHD44780Transport, Font, GpioHD44780Transport, HD44780Transport,
};
use sysinfo::System;
use time::{OffsetDateTime, UtcOffset};
use time::macros::format_description;
use crate::config::{active_level, Config, TransportConfig};

/// A small clock face, shown in front of the time.
const CLOCK_GLYPH: [u8; 8] = [
    0b00000,
    0b01110,
    0b10101,
    0b10111,
    0b10001,
    0b01110,
    0b00000,
    0b00000,
];

fn main() -> eyre::Result<()> {
    // Initialize environment and logger, the .env file is optional
    dotenv().ok();
    pretty_env_logger::init();

    info!("LCD demo starting...");

    debug!("Trying to load config...");
    let config = match Config::try_load()? {
        Some(config) => {
            info!("Config loaded.");
            config
        }
        None => {
            info!("Config not found. Using default");
            let config = Config::default();
            config.save()?;
            info!("Default config saved to {:?}.", Config::path());
            config
        }
    };

    let geometry = config.geometry()?;
    let font = Font::from(config.font);

    match &config.transport {
        TransportConfig::I2c { bus, address, pin_map, backlight_active_low } => {
            info!("LCD @ i2c-{}, address {:#04x}, {:?}", bus, address, pin_map);
            let device = LinuxI2cDevice::open(*bus, *address)?;
            let transport = ExpanderHD44780Transport::new(
                Pcf8574::new(device),
                pin_map.resolve(*backlight_active_low),
            )?;
            run(LiquidCrystal::new(transport, geometry, font))
        }
        TransportConfig::Gpio { chip, rs, rw, e, data, backlight, backlight_active_low } => {
            info!("LCD @ {} E: {}, RW: {:?}, RS: {}, Data: {:?}", chip, e, rw, rs, data);
            let gpio = GpiodDriver::open(chip)?;

            let mut e_pin = gpio.get_pin(*e)?;
            let e_out = e_pin.as_output()?;
            let mut rs_pin = gpio.get_pin(*rs)?;
            let rs_out = rs_pin.as_output()?;
            let mut rw_pin = match rw {
                Some(rw) => Some(gpio.get_pin(*rw)?),
                None => None,
            };
            let rw_out = match rw_pin.as_mut() {
                Some(pin) => Some(pin.as_output()?),
                None => None,
            };
            let mut backlight_pin = match backlight {
                Some(backlight) => Some(gpio.get_pin(*backlight)?),
                None => None,
            };
            let backlight_out = match backlight_pin.as_mut() {
                Some(pin) => Some(pin.as_output()?),
                None => None,
            };
            let backlight = backlight_out
                .as_deref()
                .map(|pin| (pin, active_level(*backlight_active_low)));

            match data.len() {
                4 => {
                    let mut data_bus = gpio.get_pin_bus::<4>(data.as_slice().try_into()?)?;
                    let data_out = data_bus.as_output()?;
                    let transport = with_backlight(
                        GpioHD44780Transport::new_4bit(&*e_out, rw_out.as_deref(), &*rs_out, &*data_out),
                        backlight,
                    );
                    run(LiquidCrystal::new(transport, geometry, font))
                }
                8 => {
                    let mut data_bus = gpio.get_pin_bus::<8>(data.as_slice().try_into()?)?;
                    let data_out = data_bus.as_output()?;
                    let transport = with_backlight(
                        GpioHD44780Transport::new_8bit(&*e_out, rw_out.as_deref(), &*rs_out, &*data_out),
                        backlight,
                    );
                    run(LiquidCrystal::new(transport, geometry, font))
                }
                n => Err(eyre!("Expected 4 or 8 data pins, got {}", n)),
            }
        }
    }
}

fn with_backlight<'a>(
    transport: GpioHD44780Transport<'a>,
    backlight: Option<(&'a dyn GpioOutput, GpioActiveLevel)>,
) -> GpioHD44780Transport<'a> {
    match backlight {
        Some((pin, level)) => transport.with_backlight(pin, level),
        None => transport,
    }
}

/// Shows the host name on the first row and a clock on the second one, forever.
fn run<T: HD44780Transport>(mut lcd: LiquidCrystal<T>) -> eyre::Result<()> {
    debug!("Initializing LCD driver...");
    lcd.begin()?;
    lcd.create_char(0, &CLOCK_GLYPH)?;
    debug!("{:?} initialized.", lcd);

    let cols = lcd.geometry().cols() as usize;
    // Single-line displays share the row with the host name
    let clock_row = lcd.geometry().rows().min(2) - 1;

    let host_name = System::host_name().unwrap_or_else(|| "unknown host".to_string());
    lcd.set_cursor(0, 0)?;
    lcd.print(&host_name.chars().take(cols).collect::<String>())?;

    let offset = UtcOffset::current_local_offset().unwrap_or_else(|err| {
        warn!("Can't determine the local offset ({}), showing UTC", err);
        UtcOffset::UTC
    });
    let format = format_description!("[hour]:[minute]:[second]");

    info!("Starting main loop...");
    loop {
        let now = OffsetDateTime::now_utc().to_offset(offset);
        let clock = now.format(format)?;

        lcd.set_cursor(0, clock_row)?;
        lcd.write_byte(0)?;
        write!(lcd, " {}", clock)?;

        thread::sleep(Duration::from_secs(1));
    }
}
