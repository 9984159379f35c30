use crate::expander::Pcf8574;
use crate::i2c::I2cDevice;
use crate::lcd::hd44780::driver::{BusWidth, HD44780Transport, RegisterSelect};
use crate::{GpioActiveLevel, GpioError, GpioResult};
use log::{debug, trace};
use std::thread::sleep;
use std::time::Duration;

/// Which expander lines (P0..P7) the LCD signals are connected to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExpanderPinMap {
    pub en: u8,
    pub rw: u8,
    pub rs: u8,
    /// D4, D5, D6, D7.
    pub data: [u8; 4],
    pub backlight: Option<u8>,
    pub backlight_level: GpioActiveLevel,
}

impl ExpanderPinMap {
    /// The wiring found on most "LCD1602 I2C" backpacks.
    pub const COMMON: ExpanderPinMap = ExpanderPinMap {
        rs: 0,
        rw: 1,
        en: 2,
        backlight: Some(3),
        data: [4, 5, 6, 7],
        backlight_level: GpioActiveLevel::High,
    };

    /// Data on the low nibble, control lines above it, no backlight control.
    pub const LOW_NIBBLE_DATA: ExpanderPinMap = ExpanderPinMap {
        data: [0, 1, 2, 3],
        rs: 4,
        rw: 5,
        en: 6,
        backlight: None,
        backlight_level: GpioActiveLevel::High,
    };

    /// Checks that every line is on the expander and no line is used twice.
    pub fn validate(&self) -> GpioResult<()> {
        let mut used = 0u8;
        let lines = [self.en, self.rw, self.rs]
            .into_iter()
            .chain(self.data)
            .chain(self.backlight);
        for pin in lines {
            if pin > 7 || used & (1 << pin) != 0 {
                return Err(GpioError::InvalidArgument);
            }
            used |= 1 << pin;
        }
        Ok(())
    }

    fn data_bits(&self, nibble: u8) -> u8 {
        self.data
            .iter()
            .enumerate()
            .filter(|(i, _)| nibble & (1 << i) != 0)
            .fold(0, |bits, (_, &pin)| bits | (1 << pin))
    }

    fn backlight_bits(&self, on: bool) -> u8 {
        match self.backlight {
            Some(pin) if self.backlight_level.get_state(on) => 1 << pin,
            _ => 0,
        }
    }
}

impl Default for ExpanderPinMap {
    fn default() -> Self {
        Self::COMMON
    }
}

/// HD44780 behind a PCF8574 I2C backpack, always in 4-bit mode.
///
/// Every nibble takes two port writes: one with E high and one with E low. RW is kept low and the
/// backlight line keeps its state across writes.
#[derive(Debug)]
pub struct ExpanderHD44780Transport<D: I2cDevice> {
    expander: Pcf8574<D>,
    pins: ExpanderPinMap,
    backlight: bool,
}

impl<D: I2cDevice> ExpanderHD44780Transport<D> {
    /// # Errors
    /// - `GpioError::InvalidArgument` if the pin map uses a line twice or a line above P7.
    pub fn new(expander: Pcf8574<D>, pins: ExpanderPinMap) -> GpioResult<Self> {
        pins.validate()?;
        Ok(ExpanderHD44780Transport {
            expander,
            pins,
            backlight: false,
        })
    }

    pub fn expander(&self) -> &Pcf8574<D> {
        &self.expander
    }

    pub fn pin_map(&self) -> &ExpanderPinMap {
        &self.pins
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }
}

impl<D: I2cDevice> HD44780Transport for ExpanderHD44780Transport<D> {
    fn bus_width(&self) -> BusWidth {
        BusWidth::Four
    }

    fn begin(&mut self) -> GpioResult<()> {
        self.expander.begin()?;
        debug!("LCD backpack ready on {:?}", self.expander);
        self.backlight = false;
        self.expander.write(self.pins.backlight_bits(false))
    }

    fn transmit(&mut self, value: u8, rs: RegisterSelect) -> GpioResult<()> {
        let mut bits = self.pins.data_bits(value & 0x0F) | self.pins.backlight_bits(self.backlight);
        if rs.is_data() {
            bits |= 1 << self.pins.rs;
        }
        trace!("Transmitting: {:04b}, RS: {:?}, port {:08b}", value & 0x0F, rs, bits);

        self.expander.write(bits | (1 << self.pins.en))?;
        sleep(Duration::from_micros(1));
        self.expander.write(bits)?;
        // The I2C round trip is slower than a GPIO line, give the controller a bit more
        sleep(Duration::from_micros(50));
        Ok(())
    }

    fn has_backlight(&self) -> bool {
        self.pins.backlight.is_some()
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        if self.pins.backlight.is_none() {
            return Ok(());
        }
        self.backlight = on;
        self.expander.write(self.pins.backlight_bits(on))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedI2c;

    fn begun(device: &ScriptedI2c, pins: ExpanderPinMap) -> ExpanderHD44780Transport<ScriptedI2c> {
        let mut transport = ExpanderHD44780Transport::new(Pcf8574::new(device.clone()), pins).unwrap();
        transport.begin().unwrap();
        device.clear_writes();
        transport
    }

    #[test]
    fn common_backpack_frames() {
        let device = ScriptedI2c::new(0x27);
        let mut transport = begun(&device, ExpanderPinMap::COMMON);
        transport.set_backlight(true).unwrap();
        device.clear_writes();

        transport.transmit(0x5, RegisterSelect::Data).unwrap();
        transport.transmit(0x2, RegisterSelect::Command).unwrap();

        assert_eq!(device.writes(), vec![0x5D, 0x59, 0x2C, 0x28]);
    }

    #[test]
    fn low_nibble_backpack_frames() {
        let device = ScriptedI2c::new(0x20);
        let mut transport = begun(&device, ExpanderPinMap::LOW_NIBBLE_DATA);

        transport.transmit(0x5, RegisterSelect::Data).unwrap();

        assert_eq!(device.writes(), vec![0x55, 0x15]);
    }

    #[test]
    fn begin_checks_device_and_turns_backlight_off() {
        let device = ScriptedI2c::new(0x27);
        let mut transport =
            ExpanderHD44780Transport::new(Pcf8574::new(device.clone()), ExpanderPinMap::COMMON).unwrap();

        transport.begin().unwrap();

        assert!(transport.expander().is_initialised());
        assert!(!transport.backlight());
        assert_eq!(device.writes(), vec![0x00, 0x00]);
    }

    #[test]
    fn begin_fails_without_device() {
        let device = ScriptedI2c::new(0x27).absent();
        let mut transport =
            ExpanderHD44780Transport::new(Pcf8574::new(device.clone()), ExpanderPinMap::COMMON).unwrap();

        assert_eq!(transport.begin(), Err(GpioError::NoAcknowledge(0x27)));
        assert_eq!(
            transport.transmit(0x3, RegisterSelect::Command),
            Err(GpioError::NotInitialized)
        );
    }

    #[test]
    fn backlight_polarity_and_absence() {
        let device = ScriptedI2c::new(0x27);
        let inverted = ExpanderPinMap {
            backlight_level: GpioActiveLevel::Low,
            ..ExpanderPinMap::COMMON
        };
        let mut transport = begun(&device, inverted);
        transport.set_backlight(true).unwrap();
        transport.set_backlight(false).unwrap();
        assert_eq!(device.writes(), vec![0x00, 0x08]);

        let device = ScriptedI2c::new(0x20);
        let mut transport = begun(&device, ExpanderPinMap::LOW_NIBBLE_DATA);
        assert!(!transport.has_backlight());
        transport.set_backlight(true).unwrap();
        assert!(device.writes().is_empty());
        assert!(!transport.backlight());
    }

    #[test]
    fn pin_map_validation() {
        assert!(ExpanderPinMap::COMMON.validate().is_ok());
        assert!(ExpanderPinMap::LOW_NIBBLE_DATA.validate().is_ok());

        let clash = ExpanderPinMap {
            rs: 4,
            ..ExpanderPinMap::COMMON
        };
        assert_eq!(clash.validate(), Err(GpioError::InvalidArgument));

        let out_of_range = ExpanderPinMap {
            backlight: Some(8),
            ..ExpanderPinMap::COMMON
        };
        assert!(
            ExpanderHD44780Transport::new(Pcf8574::new(ScriptedI2c::new(0x27)), out_of_range).is_err()
        );
    }
}
