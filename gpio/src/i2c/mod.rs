//! Byte-wide access to a single I2C device.
//!
//! PCF8574-class expanders have no registers: every transfer is a single data byte, read or
//! written as a whole. [I2cDevice] models exactly that, so the expander driver does not care
//! whether it talks to the Linux `i2c-dev` interface ([LinuxI2cDevice]) or anything else.

mod linux;

use crate::GpioResult;
use std::fmt::Debug;
pub use linux::*;

pub trait I2cDevice: Debug {
    /// Gets the 7-bit address of the device on its bus.
    fn address(&self) -> u16;

    /// Writes a single byte to the device.
    ///
    /// # Errors
    /// - `GpioError::I2c` with the bus error if the transfer failed, e.g. when the device did not
    ///   acknowledge it.
    fn write_byte(&mut self, value: u8) -> GpioResult<()>;

    /// Reads a single byte from the device.
    fn read_byte(&mut self) -> GpioResult<u8>;
}

impl<D: I2cDevice + ?Sized> I2cDevice for Box<D> {
    fn address(&self) -> u16 {
        (**self).address()
    }

    fn write_byte(&mut self, value: u8) -> GpioResult<()> {
        (**self).write_byte(value)
    }

    fn read_byte(&mut self) -> GpioResult<u8> {
        (**self).read_byte()
    }
}
