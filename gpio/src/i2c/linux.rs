use crate::i2c::I2cDevice;
use crate::{GpioError, GpioResult};
use i2cdev::core::I2CDevice as _;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use log::trace;
use std::fmt::{Debug, Formatter};

impl From<LinuxI2CError> for GpioError {
    fn from(err: LinuxI2CError) -> Self {
        GpioError::I2c(err.to_string())
    }
}

/// [I2cDevice] on top of the Linux `/dev/i2c-<bus>` character device, using SMBus
/// "send byte" and "receive byte" transfers.
pub struct LinuxI2cDevice {
    dev: LinuxI2CDevice,
    bus: u8,
    address: u16,
}

impl LinuxI2cDevice {
    /// Opens `/dev/i2c-<bus>` and binds it to the device at `address`.
    pub fn open(bus: u8, address: u16) -> GpioResult<Self> {
        let dev = LinuxI2CDevice::new(format!("/dev/i2c-{}", bus), address)?;
        Ok(Self { dev, bus, address })
    }
}

impl Debug for LinuxI2cDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cDevice(i2c-{}@{:#04x})", self.bus, self.address)
    }
}

impl I2cDevice for LinuxI2cDevice {
    fn address(&self) -> u16 {
        self.address
    }

    fn write_byte(&mut self, value: u8) -> GpioResult<()> {
        trace!("{:?} <- {:08b}", self, value);
        self.dev.smbus_write_byte(value)?;
        Ok(())
    }

    fn read_byte(&mut self) -> GpioResult<u8> {
        let value = self.dev.smbus_read_byte()?;
        trace!("{:?} -> {:08b}", self, value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn linux_errors_keep_their_message() {
        let err = LinuxI2CError::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        match GpioError::from(err) {
            GpioError::I2c(message) => assert!(message.contains("denied")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn open_missing_bus_fails() {
        assert!(LinuxI2cDevice::open(250, 0x27).is_err());
    }
}
