use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// Blocking wait used between LCD commands.
///
/// The HD44780 has no handshake when R/W is tied low, so the driver has to give the controller
/// the execution time listed in the datasheet before sending the next instruction.
pub trait Delay: Debug {
    fn delay(&mut self, duration: Duration);

    fn delay_us(&mut self, micros: u64) {
        self.delay(Duration::from_micros(micros));
    }

    fn delay_ms(&mut self, millis: u64) {
        self.delay(Duration::from_millis(millis));
    }
}

/// [Delay] backed by [std::thread::sleep].
#[derive(Copy, Clone, Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        sleep(duration);
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }
}
