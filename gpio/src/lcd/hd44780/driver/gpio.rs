use crate::lcd::hd44780::driver::{BusWidth, HD44780Transport, RegisterSelect};
use crate::{GpioActiveLevel, GpioBusOutput, GpioOutput, GpioResult};
use log::trace;
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug)]
pub enum GpioHD44780Bus<'a> {
    Bus8Bit(&'a dyn GpioBusOutput<8>),
    Bus4Bit(&'a dyn GpioBusOutput<4>),
}

/// HD44780 wired straight to GPIO lines.
///
/// RW is optional; when it's wired, it's held low since the busy flag is never read. The backlight
/// line is optional too, together with its polarity.
#[derive(Debug)]
pub struct GpioHD44780Transport<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: GpioHD44780Bus<'a>,
    backlight: Option<(&'a dyn GpioOutput, GpioActiveLevel)>,
}

impl<'a> GpioHD44780Transport<'a> {
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
    ) -> Self {
        GpioHD44780Transport {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus4Bit(data_bus),
            backlight: None,
        }
    }

    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<8>,
    ) -> Self {
        GpioHD44780Transport {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus8Bit(data_bus),
            backlight: None,
        }
    }

    /// Adds a backlight control line. With [GpioActiveLevel::Low] the line is driven low to turn
    /// the backlight on.
    pub fn with_backlight(mut self, pin: &'a dyn GpioOutput, level: GpioActiveLevel) -> Self {
        self.backlight = Some((pin, level));
        self
    }

    fn pulse_e(pin: &dyn GpioOutput) -> GpioResult<()> {
        // Set E pin to high
        pin.write(true)?;
        sleep(Duration::from_micros(1));
        // Set E pin to low
        pin.write(false)?;
        // Commands need > 37us to settle
        sleep(Duration::from_micros(37));
        Ok(())
    }
}

impl HD44780Transport for GpioHD44780Transport<'_> {
    fn bus_width(&self) -> BusWidth {
        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(_) => BusWidth::Eight,
            GpioHD44780Bus::Bus4Bit(_) => BusWidth::Four,
        }
    }

    fn begin(&mut self) -> GpioResult<()> {
        // Pull everything low so the first rising edge on E is a real one
        self.pin_rs.write(false)?;
        self.pin_e.write(false)?;
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }
        Ok(())
    }

    fn transmit(&mut self, value: u8, rs: RegisterSelect) -> GpioResult<()> {
        trace!("Transmitting: {:08b}, RS: {:?}", value, rs);

        self.pin_rs.write(rs.is_data())?;

        // Set RW pin to write
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }

        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => bus.write_byte(value)?,
            GpioHD44780Bus::Bus4Bit(bus) => bus.write_nibble(value & 0x0F)?,
        }

        Self::pulse_e(self.pin_e)
    }

    fn has_backlight(&self) -> bool {
        self.backlight.is_some()
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        if let Some((pin, level)) = self.backlight {
            trace!("Backlight: {}", on);
            pin.write(level.get_state(on))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PinEvent, PinLog, RecordingBusOutput, RecordingOutput};

    #[test]
    fn transmit_sets_lines_before_enable() {
        let log = PinLog::default();
        let rs = RecordingOutput::new("RS", &log);
        let rw = RecordingOutput::new("RW", &log);
        let e = RecordingOutput::new("E", &log);
        let data = RecordingBusOutput::<4>::new("D", &log);

        let mut transport = GpioHD44780Transport::new_4bit(&e, Some(&rw), &rs, &data);
        assert_eq!(transport.bus_width(), BusWidth::Four);
        transport.transmit(0xA5, RegisterSelect::Data).unwrap();

        assert_eq!(
            log.events(),
            vec![
                PinEvent::Pin("RS", true),
                PinEvent::Pin("RW", false),
                PinEvent::Bus("D", 0x5),
                PinEvent::Pin("E", true),
                PinEvent::Pin("E", false),
            ]
        );
    }

    #[test]
    fn eight_bit_bus_gets_whole_byte() {
        let log = PinLog::default();
        let rs = RecordingOutput::new("RS", &log);
        let e = RecordingOutput::new("E", &log);
        let data = RecordingBusOutput::<8>::new("D", &log);

        let mut transport = GpioHD44780Transport::new_8bit(&e, None, &rs, &data);
        assert_eq!(transport.bus_width(), BusWidth::Eight);
        transport.transmit(0x38, RegisterSelect::Command).unwrap();

        assert_eq!(log.bus_values("D"), vec![0x38]);
        assert_eq!(log.pin_values("RS"), vec![false]);
        assert_eq!(log.pin_values("E"), vec![true, false]);
    }

    #[test]
    fn begin_idles_control_lines() {
        let log = PinLog::default();
        let rs = RecordingOutput::new("RS", &log);
        let rw = RecordingOutput::new("RW", &log);
        let e = RecordingOutput::new("E", &log);
        let data = RecordingBusOutput::<4>::new("D", &log);

        let mut transport = GpioHD44780Transport::new_4bit(&e, Some(&rw), &rs, &data);
        transport.begin().unwrap();

        assert_eq!(
            log.events(),
            vec![
                PinEvent::Pin("RS", false),
                PinEvent::Pin("E", false),
                PinEvent::Pin("RW", false),
            ]
        );
    }

    #[test]
    fn backlight_follows_polarity() {
        let log = PinLog::default();
        let rs = RecordingOutput::new("RS", &log);
        let e = RecordingOutput::new("E", &log);
        let bl = RecordingOutput::new("BL", &log);
        let data = RecordingBusOutput::<4>::new("D", &log);

        let mut without = GpioHD44780Transport::new_4bit(&e, None, &rs, &data);
        assert!(!without.has_backlight());
        without.set_backlight(true).unwrap();
        assert!(log.events().is_empty());

        let mut transport = GpioHD44780Transport::new_4bit(&e, None, &rs, &data)
            .with_backlight(&bl, GpioActiveLevel::Low);
        assert!(transport.has_backlight());
        transport.set_backlight(true).unwrap();
        transport.set_backlight(false).unwrap();
        assert_eq!(log.pin_values("BL"), vec![false, true]);
    }
}
