//! Recording fakes shared by the unit tests.

use crate::delay::Delay;
use crate::i2c::I2cDevice;
use crate::lcd::hd44780::driver::{BusWidth, HD44780Transport, RegisterSelect};
use crate::{bits_to_value, GpioBusOutput, GpioError, GpioOutput, GpioResult};
use std::cell::RefCell;
use std::io::ErrorKind;
use std::rc::Rc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinEvent {
    Pin(&'static str, bool),
    Bus(&'static str, u8),
}

/// Ordered log of every line change, shared between the fake outputs of one test.
#[derive(Clone, Debug, Default)]
pub struct PinLog(Rc<RefCell<Vec<PinEvent>>>);

impl PinLog {
    pub fn events(&self) -> Vec<PinEvent> {
        self.0.borrow().clone()
    }

    pub fn bus_values(&self, name: &str) -> Vec<u8> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                PinEvent::Bus(bus, value) if *bus == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn pin_values(&self, name: &str) -> Vec<bool> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                PinEvent::Pin(pin, value) if *pin == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: PinEvent) {
        self.0.borrow_mut().push(event);
    }
}

#[derive(Debug)]
pub struct RecordingOutput {
    name: &'static str,
    log: PinLog,
}

impl RecordingOutput {
    pub fn new(name: &'static str, log: &PinLog) -> Self {
        RecordingOutput {
            name,
            log: log.clone(),
        }
    }
}

impl GpioOutput for RecordingOutput {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.log.push(PinEvent::Pin(self.name, value));
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingBusOutput<const N: usize> {
    name: &'static str,
    log: PinLog,
}

impl<const N: usize> RecordingBusOutput<N> {
    pub fn new(name: &'static str, log: &PinLog) -> Self {
        RecordingBusOutput {
            name,
            log: log.clone(),
        }
    }
}

impl<const N: usize> GpioBusOutput<N> for RecordingBusOutput<N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.log.push(PinEvent::Bus(self.name, bits_to_value(values)));
        Ok(())
    }
}

/// [Delay] that only remembers what it was asked to wait.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub waits: Vec<Duration>,
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: Duration) {
        self.waits.push(duration);
    }
}

/// Transport that records every transfer instead of driving lines.
#[derive(Debug)]
pub struct RecordingTransport {
    pub width: BusWidth,
    pub frames: Vec<(u8, RegisterSelect)>,
    pub backlight: Vec<bool>,
    /// Number of frames already sent at each backlight switch.
    pub backlight_at: Vec<usize>,
    pub has_backlight: bool,
    /// Makes every transfer and backlight switch fail.
    pub failing: bool,
    pub begun: bool,
}

impl RecordingTransport {
    pub fn new(width: BusWidth) -> Self {
        RecordingTransport {
            width,
            frames: Vec::new(),
            backlight: Vec::new(),
            backlight_at: Vec::new(),
            has_backlight: true,
            failing: false,
            begun: false,
        }
    }

    /// Frame values only, without the register select.
    pub fn values(&self) -> Vec<u8> {
        self.frames.iter().map(|(value, _)| *value).collect()
    }

    /// Reassembles 4-bit frames into whole bytes, high nibble first.
    pub fn bytes(&self) -> Vec<(u8, RegisterSelect)> {
        match self.width {
            BusWidth::Eight => self.frames.clone(),
            BusWidth::Four => self
                .frames
                .chunks(2)
                .map(|pair| match pair {
                    [(high, rs), (low, _)] => ((high << 4) | low, *rs),
                    [(high, rs)] => (high << 4, *rs),
                    _ => unreachable!(),
                })
                .collect(),
        }
    }
}

impl HD44780Transport for RecordingTransport {
    fn bus_width(&self) -> BusWidth {
        self.width
    }

    fn begin(&mut self) -> GpioResult<()> {
        self.begun = true;
        Ok(())
    }

    fn transmit(&mut self, value: u8, rs: RegisterSelect) -> GpioResult<()> {
        if self.failing {
            return Err(GpioError::Io(ErrorKind::BrokenPipe));
        }
        self.frames.push((value, rs));
        Ok(())
    }

    fn has_backlight(&self) -> bool {
        self.has_backlight
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        if self.failing {
            return Err(GpioError::Io(ErrorKind::BrokenPipe));
        }
        self.backlight.push(on);
        self.backlight_at.push(self.frames.len());
        Ok(())
    }
}

#[derive(Debug)]
struct I2cState {
    port: u8,
    present: bool,
    writes: Vec<u8>,
}

/// Fake PCF8574 on the bus. Clones share the same state, so a test can keep one handle while the
/// driver owns another.
#[derive(Clone, Debug)]
pub struct ScriptedI2c {
    address: u16,
    state: Rc<RefCell<I2cState>>,
}

impl ScriptedI2c {
    pub fn new(address: u16) -> Self {
        ScriptedI2c {
            address,
            state: Rc::new(RefCell::new(I2cState {
                port: 0xFF,
                present: true,
                writes: Vec::new(),
            })),
        }
    }

    pub fn with_port(self, port: u8) -> Self {
        self.set_port(port);
        self
    }

    pub fn absent(self) -> Self {
        self.state.borrow_mut().present = false;
        self
    }

    pub fn writes(&self) -> Vec<u8> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    pub fn set_port(&self, port: u8) {
        self.state.borrow_mut().port = port;
    }
}

impl I2cDevice for ScriptedI2c {
    fn address(&self) -> u16 {
        self.address
    }

    fn write_byte(&mut self, value: u8) -> GpioResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.present {
            return Err(GpioError::I2c("remote I/O error".to_string()));
        }
        state.writes.push(value);
        Ok(())
    }

    fn read_byte(&mut self) -> GpioResult<u8> {
        let state = self.state.borrow();
        if !state.present {
            return Err(GpioError::I2c("remote I/O error".to_string()));
        }
        Ok(state.port)
    }
}
