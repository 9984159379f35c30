//! PCF8574 I2C GPIO expander driver.
//!
//! The PCF8574 has a single 8-bit quasi-bidirectional port and no configuration registers. Reading
//! returns the level of all eight lines, writing sets all eight latches. A line can only be used
//! as an input while its latch is high, so the driver keeps its own direction mask and an output
//! shadow, and always releases input lines when writing.
//!
//! [Pcf8574] also implements [GpioDriver], which lets single expander lines stand in wherever a
//! [GpioOutput] or [GpioInput] is expected.

use crate::i2c::I2cDevice;
use crate::{
    bits_to_value, GpioBus, GpioBusInput, GpioBusOutput, GpioDriver, GpioError, GpioInput,
    GpioOutput, GpioPin, GpioResult,
};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};

/// Direction of an expander line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Driver for a PCF8574 (or PCF8574A) expander.
///
/// All methods take `&self`, the port state lives in cells so that pins handed out through
/// [GpioDriver] can share the device.
pub struct Pcf8574<D: I2cDevice> {
    device: RefCell<D>,
    /// Bit set means the line is an input.
    dir_mask: Cell<u8>,
    /// Last value latched on the output lines.
    shadow: Cell<u8>,
    initialised: Cell<bool>,
    used_pins: Cell<u8>,
}

impl<D: I2cDevice> Pcf8574<D> {
    pub const PIN_COUNT: usize = 8;

    /// Creates a driver with every line configured as an input and an empty output shadow.
    ///
    /// Nothing is sent to the device until [Self::begin] is called.
    pub fn new(device: D) -> Self {
        Self::with_state(device, 0xFF, 0x00)
    }

    /// Creates a driver with an explicit direction mask (bit set = input) and output shadow.
    pub fn with_state(device: D, dir_mask: u8, shadow: u8) -> Self {
        Pcf8574 {
            device: RefCell::new(device),
            dir_mask: Cell::new(dir_mask),
            shadow: Cell::new(shadow),
            initialised: Cell::new(false),
            used_pins: Cell::new(0),
        }
    }

    pub fn address(&self) -> u16 {
        self.device.borrow().address()
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised.get()
    }

    /// Gets the direction mask, bit set means input.
    pub fn direction_mask(&self) -> u8 {
        self.dir_mask.get()
    }

    /// Gets the output shadow, the value last written to the output lines.
    pub fn shadow(&self) -> u8 {
        self.shadow.get()
    }

    /// Checks that the device answers and brings the port into a known state.
    ///
    /// The check reads the port. When the device answers, the whole port is switched to
    /// output and driven low.
    ///
    /// # Errors
    /// - `GpioError::NoAcknowledge` if the device does not answer.
    pub fn begin(&self) -> GpioResult<()> {
        let address = self.address();
        let answer = self.device.borrow_mut().read_byte();
        let current = answer.map_err(|err| {
            debug!("{:?} did not answer: {}", self, err);
            GpioError::NoAcknowledge(address)
        })?;
        debug!("{:?} present, port reads {:08b}", self, current);
        self.shadow.set(current);
        self.initialised.set(true);

        self.port_mode(PinDirection::Output)?;
        self.write(0x00)
    }

    /// Sets the direction of a single line.
    pub fn pin_mode(&self, pin: u8, direction: PinDirection) -> GpioResult<()> {
        self.ensure_initialised()?;
        let bit = Self::pin_bit(pin)?;
        let mask = self.dir_mask.get();
        self.dir_mask.set(match direction {
            PinDirection::Output => mask & !bit,
            PinDirection::Input => mask | bit,
        });
        Ok(())
    }

    /// Sets the direction of all eight lines.
    pub fn port_mode(&self, direction: PinDirection) -> GpioResult<()> {
        self.ensure_initialised()?;
        self.dir_mask.set(match direction {
            PinDirection::Output => 0x00,
            PinDirection::Input => 0xFF,
        });
        Ok(())
    }

    /// Reads the port. Only the lines configured as inputs are reported, output lines read as 0.
    pub fn read(&self) -> GpioResult<u8> {
        self.ensure_initialised()?;
        let value = self.device.borrow_mut().read_byte()?;
        Ok(value & self.dir_mask.get())
    }

    /// Reads the level of a single input line.
    pub fn digital_read(&self, pin: u8) -> GpioResult<bool> {
        let bit = Self::pin_bit(pin)?;
        Ok(self.read()? & bit != 0)
    }

    /// Writes the whole port.
    ///
    /// Only the bits of output lines are taken from `value` and kept in the shadow. Input lines are
    /// written high so that they keep working as inputs.
    pub fn write(&self, value: u8) -> GpioResult<()> {
        self.ensure_initialised()?;
        let dir_mask = self.dir_mask.get();
        let shadow = value & !dir_mask;
        self.shadow.set(shadow);
        trace!("{:?} write {:08b} (dir {:08b})", self, shadow, dir_mask);
        self.device.borrow_mut().write_byte(shadow | dir_mask)
    }

    /// Sets a single output line. Lines configured as inputs are left untouched.
    pub fn digital_write(&self, pin: u8, level: bool) -> GpioResult<()> {
        self.ensure_initialised()?;
        let bit = Self::pin_bit(pin)? & !self.dir_mask.get();
        let shadow = self.shadow.get();
        self.write(if level { shadow | bit } else { shadow & !bit })
    }

    fn ensure_initialised(&self) -> GpioResult<()> {
        if self.initialised.get() {
            Ok(())
        } else {
            Err(GpioError::NotInitialized)
        }
    }

    fn pin_bit(pin: u8) -> GpioResult<u8> {
        if pin as usize >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(1 << pin)
    }

    fn claim(&self, mask: u8) -> GpioResult<()> {
        let used = self.used_pins.get();
        if used & mask != 0 {
            return Err(GpioError::AlreadyInUse);
        }
        self.used_pins.set(used | mask);
        Ok(())
    }

    fn release(&self, mask: u8) {
        self.used_pins.set(self.used_pins.get() & !mask);
    }
}

impl<D: I2cDevice> Debug for Pcf8574<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.device.try_borrow() {
            Ok(device) => write!(f, "Pcf8574({:?})", device),
            Err(_) => write!(f, "Pcf8574(<busy>)"),
        }
    }
}

impl<D: I2cDevice> GpioDriver for Pcf8574<D> {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        self.claim(1 << index)?;

        Ok(Box::new(ExpanderPin {
            expander: self,
            pin: index as u8,
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        if indices.iter().any(|&index| index >= Self::PIN_COUNT) {
            return Err(GpioError::InvalidArgument);
        }
        let mask = indices.iter().fold(0u8, |mask, &index| mask | (1 << index));
        if mask.count_ones() as usize != N {
            return Err(GpioError::InvalidArgument);
        }
        self.claim(mask)?;

        Ok(Box::new(ExpanderBus {
            expander: self,
            pins: indices.map(|index| index as u8),
        }))
    }
}

struct ExpanderPin<'a, D: I2cDevice> {
    expander: &'a Pcf8574<D>,
    pin: u8,
}

impl<D: I2cDevice> Debug for ExpanderPin<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[P{}]", self.expander, self.pin)
    }
}

impl<D: I2cDevice> GpioPin for ExpanderPin<'_, D> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        self.expander.pin_mode(self.pin, PinDirection::Input)?;
        Ok(Box::new(ExpanderInput {
            expander: self.expander,
            pin: self.pin,
        }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.expander.pin_mode(self.pin, PinDirection::Output)?;
        Ok(Box::new(ExpanderOutput {
            expander: self.expander,
            pin: self.pin,
        }))
    }
}

impl<D: I2cDevice> Drop for ExpanderPin<'_, D> {
    fn drop(&mut self) {
        self.expander.release(1 << self.pin);
    }
}

struct ExpanderInput<'a, D: I2cDevice> {
    expander: &'a Pcf8574<D>,
    pin: u8,
}

impl<D: I2cDevice> Debug for ExpanderInput<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[P{}][input]", self.expander, self.pin)
    }
}

impl<D: I2cDevice> GpioInput for ExpanderInput<'_, D> {
    fn read(&self) -> GpioResult<bool> {
        self.expander.digital_read(self.pin)
    }
}

struct ExpanderOutput<'a, D: I2cDevice> {
    expander: &'a Pcf8574<D>,
    pin: u8,
}

impl<D: I2cDevice> Debug for ExpanderOutput<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[P{}][output]", self.expander, self.pin)
    }
}

impl<D: I2cDevice> GpioOutput for ExpanderOutput<'_, D> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.expander.digital_write(self.pin, value)
    }
}

struct ExpanderBus<'a, D: I2cDevice, const N: usize> {
    expander: &'a Pcf8574<D>,
    pins: [u8; N],
}

impl<D: I2cDevice, const N: usize> ExpanderBus<'_, D, N> {
    fn set_direction(&self, direction: PinDirection) -> GpioResult<()> {
        for &pin in &self.pins {
            self.expander.pin_mode(pin, direction)?;
        }
        Ok(())
    }
}

impl<D: I2cDevice, const N: usize> Debug for ExpanderBus<'_, D, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.expander, self.pins)
    }
}

impl<D: I2cDevice, const N: usize> GpioBus<N> for ExpanderBus<'_, D, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        self.set_direction(PinDirection::Input)?;
        Ok(Box::new(ExpanderBusIo {
            expander: self.expander,
            pins: self.pins,
        }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        self.set_direction(PinDirection::Output)?;
        Ok(Box::new(ExpanderBusIo {
            expander: self.expander,
            pins: self.pins,
        }))
    }
}

impl<D: I2cDevice, const N: usize> Drop for ExpanderBus<'_, D, N> {
    fn drop(&mut self) {
        let mask = self.pins.iter().fold(0u8, |mask, &pin| mask | (1 << pin));
        self.expander.release(mask);
    }
}

/// Bus view that reads or writes all of its lines in a single I2C transfer.
struct ExpanderBusIo<'a, D: I2cDevice, const N: usize> {
    expander: &'a Pcf8574<D>,
    pins: [u8; N],
}

impl<D: I2cDevice, const N: usize> Debug for ExpanderBusIo<'_, D, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}[io]", self.expander, self.pins)
    }
}

impl<D: I2cDevice, const N: usize> GpioBusInput<N> for ExpanderBusIo<'_, D, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let port = self.expander.read()?;
        Ok(self.pins.map(|pin| port & (1 << pin) != 0))
    }
}

impl<D: I2cDevice, const N: usize> GpioBusOutput<N> for ExpanderBusIo<'_, D, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        let mut shadow = self.expander.shadow();
        for (&pin, &value) in self.pins.iter().zip(values.iter()) {
            if value {
                shadow |= 1 << pin;
            } else {
                shadow &= !(1 << pin);
            }
        }
        trace!("{:?} <- {:0w$b}", self, bits_to_value(values), w = N);
        self.expander.write(shadow)
    }
}
