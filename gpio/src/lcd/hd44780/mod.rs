//! HD44780 character LCD module.
//!
//! [LiquidCrystal] is the user-facing driver: it keeps the mode registers, runs the power-on
//! initialization and offers the usual text display operations. It talks to the hardware through
//! any [driver::HD44780Transport], see the [driver] module for the direct GPIO and the PCF8574
//! backpack wirings.

pub mod driver;
mod display;

pub use display::*;
