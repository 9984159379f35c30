//! Host-side drivers for HD44780-compatible character LCDs.
//!
//! The display can be wired either straight to GPIO lines ([gpiod] backend) or through a PCF8574
//! I2C expander backpack ([expander]). Both end up in the same [lcd::hd44780] driver, which only
//! needs a way to put one nibble or byte on the bus.
pub mod delay;
pub mod expander;
pub mod gpiod;
pub mod i2c;
pub mod lcd;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("device not initialized")]
    NotInitialized,
    #[error("no acknowledge from I2C device at {0:#04x}")]
    NoAcknowledge(u16),
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("I2C error: {0}")]
    I2c(String),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Gets the GPIO pin at the given index.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;

    /// Gets the GPIO pin bus at the specific indices.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high. The LCD backlight uses it as its polarity: a backpack
/// whose backlight transistor switches on with a low line is [GpioActiveLevel::Low].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the GPIO pin based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

pub trait GpioPin: Debug {
    /// Sets the GPIO pin function to input, allowing reading its state.
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>>;
    /// Sets the GPIO pin function to output, allowing writing its state.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Gets whether the GPIO pin supports active level.
    fn supports_active_level(&self) -> bool {
        false
    }
    /// Gets the active level of the GPIO pin.
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioInput: Debug {
    /// Reads the state of the GPIO pin.
    fn read(&self) -> GpioResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBus<const N: usize>: Debug {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>>;
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn supports_active_level(&self) -> bool {
        false
    }
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioBusInput<const N: usize>: Debug {
    fn read(&self) -> GpioResult<[bool; N]>;
}

impl dyn GpioBusInput<8> + '_ {
    /// Reads the values of the GPIO pins in the bus.
    /// Returns them as a byte, LSb first.
    pub fn read_byte(&self) -> GpioResult<u8> {
        let values = self.read()?;
        Ok(bits_to_value(&values))
    }
}

impl dyn GpioBusInput<4> + '_ {
    /// Reads the values of the GPIO pins in the bus.
    /// Returns them as a nibble, LSb first.
    pub fn read_nibble(&self) -> GpioResult<u8> {
        let values = self.read()?;
        Ok(bits_to_value(&values))
    }
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        self.write(&value_to_bits(value))
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }
        self.write(&value_to_bits(value))
    }
}

/// Spreads the lowest `N` bits of `value` over an array, LSb first.
pub(crate) fn value_to_bits<const N: usize>(value: u8) -> [bool; N] {
    let mut values = [false; N];
    for (i, bit) in values.iter_mut().enumerate() {
        *bit = (value >> i) & 1 != 0;
    }
    values
}

/// Packs an array of line states back into a value, LSb first.
pub(crate) fn bits_to_value<const N: usize>(values: &[bool; N]) -> u8 {
    values
        .iter()
        .enumerate()
        .filter(|(_, bit)| **bit)
        .fold(0u8, |acc, (i, _)| acc | (1 << i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PinLog, RecordingBusOutput};

    #[test]
    fn bits_are_lsb_first() {
        assert_eq!(value_to_bits::<4>(0b0110), [false, true, true, false]);
        assert_eq!(bits_to_value(&[true, false, false, true]), 0b1001);
        assert_eq!(bits_to_value(&value_to_bits::<8>(0xA5)), 0xA5);
    }

    #[test]
    fn write_nibble_rejects_wide_values() {
        let log = PinLog::default();
        let bus = RecordingBusOutput::<4>::new("D", &log);
        let bus: &dyn GpioBusOutput<4> = &bus;

        assert_eq!(bus.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert!(log.events().is_empty());

        bus.write_nibble(0b1010).unwrap();
        assert_eq!(log.bus_values("D"), vec![0b1010]);
    }

    #[test]
    fn active_level_inverts_low() {
        assert!(GpioActiveLevel::High.get_state(true));
        assert!(!GpioActiveLevel::Low.get_state(true));
        assert!(GpioActiveLevel::Low.get_state(false));
    }
}
