//! [GpioDriver] on top of the Linux GPIO character device, using the `gpiod` crate.
//!
//! This is the backend used to wire the LCD's RS, E, RW and data lines straight to the host. A
//! single pin is just a set of one line, so pins and buses share [GpiodLines].
use crate::{
    GpioActiveLevel, GpioBus, GpioBusInput, GpioBusOutput, GpioDriver, GpioError, GpioInput,
    GpioOutput, GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver hands out lines of a single GPIO chip and remembers which ones are taken.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            used_pins: BitVec::repeat(false, n),
        }
    }

    /// Opens the chip at `path`, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path.as_ref())?;
        debug!("Opened GPIO chip {} with {} lines", chip.name(), chip.num_lines());
        Ok(Self::new(chip))
    }

    /// Marks the lines as taken. Nothing is requested from the kernel until the lines get a
    /// direction.
    fn claim<const N: usize>(&self, offsets: [usize; N]) -> GpioResult<GpiodLines<'_, N>> {
        let n = self.count()?;

        if offsets.iter().any(|&offset| offset >= n) {
            return Err(GpioError::InvalidArgument);
        }

        if offsets.iter().any(|&offset| self.used_pins[offset]) {
            return Err(GpioError::AlreadyInUse);
        }

        for offset in offsets {
            self.used_pins.set_aliased(offset, true);
        }

        Ok(GpiodLines {
            driver: self,
            offsets,
            active_level: GpioActiveLevel::High,
        })
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        Ok(Box::new(self.claim([index])?))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        Ok(Box::new(self.claim(indices)?))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

/// Claimed lines of the chip, not yet requested in any direction.
struct GpiodLines<'a, const N: usize> {
    driver: &'a GpiodDriver,
    offsets: [usize; N],
    active_level: GpioActiveLevel,
}

impl<const N: usize> GpiodLines<'_, N> {
    fn line_offsets(&self) -> Vec<u32> {
        self.offsets.iter().map(|&offset| offset as u32).collect()
    }

    fn request_input(&self) -> GpioResult<GpiodInput<'_, N>> {
        trace!("{:?} requested as input", self);
        let lines = self.driver.chip.request_lines(
            gpiod::Options::input(self.line_offsets())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into()),
        )?;
        Ok(GpiodInput { owner: self, lines })
    }

    fn request_output(&self) -> GpioResult<GpiodOutput<'_, N>> {
        trace!("{:?} requested as output", self);
        let lines = self.driver.chip.request_lines(
            gpiod::Options::output(self.line_offsets())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into()),
        )?;
        Ok(GpiodOutput { owner: self, lines })
    }
}

impl<const N: usize> Debug for GpiodLines<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.offsets)
    }
}

impl GpioPin for GpiodLines<'_, 1> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        Ok(Box::new(self.request_input()?))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(self.request_output()?))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl<const N: usize> GpioBus<N> for GpiodLines<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        Ok(Box::new(self.request_input()?))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(self.request_output()?))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl<const N: usize> Drop for GpiodLines<'_, N> {
    fn drop(&mut self) {
        for &offset in &self.offsets {
            self.driver.used_pins.set_aliased(offset, false);
        }
    }
}

struct GpiodInput<'a, const N: usize> {
    owner: &'a GpiodLines<'a, N>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Debug for GpiodInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.owner)
    }
}

impl GpioInput for GpiodInput<'_, 1> {
    fn read(&self) -> GpioResult<bool> {
        let [value] = self.lines.get_values([false])?;
        Ok(value)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        Ok(self.lines.get_values([false; N])?)
    }
}

struct GpiodOutput<'a, const N: usize> {
    owner: &'a GpiodLines<'a, N>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.owner)
    }
}

impl GpioOutput for GpiodOutput<'_, 1> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_chip_fails() {
        let result = GpiodDriver::open(Path::new("/dev/gpiochip-does-not-exist"));
        assert!(result.is_err());
    }

    #[test]
    fn active_level_maps_to_gpiod() {
        assert!(matches!(gpiod::Active::from(GpioActiveLevel::High), gpiod::Active::High));
        assert!(matches!(gpiod::Active::from(GpioActiveLevel::Low), gpiod::Active::Low));
    }
}
