//! HD44780 instruction set and the transports that carry it.
//!
//! [HD44780Driver] is the raw instruction layer: every method maps to one instruction of the
//! controller. The mode registers are kept as small structs ([DisplayControl], [EntryMode],
//! [FunctionSet]) and only turned into the instruction byte when sent.
//!
//! [HD44780Transport] is what a wiring has to provide: a way to put one 4-bit or 8-bit transfer on
//! the data lines with the right register select, latched by the enable line. It is implemented
//! by [GpioHD44780Transport] for displays wired straight to GPIO lines, and by
//! [ExpanderHD44780Transport] for PCF8574 I2C backpacks.

mod expander;
mod gpio;

use crate::{GpioError, GpioResult};
pub use expander::*;
pub use gpio::*;
use std::fmt::Debug;

/// Value of the RS line during a transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSelect {
    /// RS low, the transfer is an instruction.
    Command,
    /// RS high, the transfer goes to DDRAM or CGRAM.
    Data,
}

impl RegisterSelect {
    pub fn is_data(&self) -> bool {
        matches!(self, RegisterSelect::Data)
    }
}

/// Width of the data bus between the host and the controller.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BusWidth {
    /// D4..D7 only, every byte is sent as two nibbles, high nibble first.
    #[default]
    Four,
    /// D0..D7.
    Eight,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// What a cursor/display shift instruction moves.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShiftTarget {
    /// Moves the cursor, DDRAM contents stay where they are.
    Cursor,
    /// Shifts the whole display (and the cursor with it).
    Display,
}

/// Number of display lines as seen by the controller.
///
/// 4-line modules are driven as two long lines, so they use [LineCount::Two] as well.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum LineCount {
    One,
    #[default]
    Two,
}

/// Character font.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Font {
    #[default]
    Dots5x8,
    /// Only available on single-line displays.
    Dots5x10,
}

/// Display on/off control register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisplayControl {
    pub display_on: bool,
    pub cursor_visible: bool,
    pub blink: bool,
}

impl DisplayControl {
    pub fn to_command(&self) -> u8 {
        let mut command = 0b00001000;
        if self.display_on {
            command |= 0b00000100;
        }
        if self.cursor_visible {
            command |= 0b00000010;
        }
        if self.blink {
            command |= 0b00000001;
        }
        command
    }
}

impl Default for DisplayControl {
    /// Display on, no cursor, no blinking.
    fn default() -> Self {
        DisplayControl {
            display_on: true,
            cursor_visible: false,
            blink: false,
        }
    }
}

/// Entry mode register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryMode {
    /// Where the cursor moves after a character is written. [CursorDirection::Right] is
    /// left-to-right text.
    pub direction: CursorDirection,
    /// Shift the display instead of the cursor, so that new characters appear at the same spot.
    pub autoscroll: bool,
}

impl EntryMode {
    pub fn to_command(&self) -> u8 {
        let mut command = 0b00000100;
        if self.direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if self.autoscroll {
            command |= 0b00000001;
        }
        command
    }
}

impl Default for EntryMode {
    /// Left-to-right, no autoscroll.
    fn default() -> Self {
        EntryMode {
            direction: CursorDirection::Right,
            autoscroll: false,
        }
    }
}

/// Function set register: interface width, line count and font.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FunctionSet {
    pub bus_width: BusWidth,
    pub lines: LineCount,
    pub font: Font,
}

impl FunctionSet {
    /// Builds the function set for a display with `rows` rows.
    ///
    /// Displays with more than one row run in two-line mode. The 5x10 font is only kept for
    /// single-line displays, the controller cannot show it on two lines.
    pub fn for_rows(bus_width: BusWidth, rows: u8, font: Font) -> Self {
        let lines = if rows > 1 { LineCount::Two } else { LineCount::One };
        let font = match lines {
            LineCount::One => font,
            LineCount::Two => Font::Dots5x8,
        };
        FunctionSet {
            bus_width,
            lines,
            font,
        }
    }

    pub fn to_command(&self) -> u8 {
        let mut command = 0b00100000;
        if self.bus_width == BusWidth::Eight {
            command |= 0b00010000;
        }
        if self.lines == LineCount::Two {
            command |= 0b00001000;
        }
        if self.font == Font::Dots5x10 {
            command |= 0b00000100;
        }
        command
    }
}

pub const CLEAR_DISPLAY: u8 = 0b00000001;
pub const RETURN_HOME: u8 = 0b00000010;

/// The HD44780 instruction set.
///
/// Only `send_command` and `send_data` have to be implemented; they are also responsible for
/// giving the controller time to execute the instruction.
pub trait HD44780Driver: Debug {
    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(RETURN_HOME)
    }

    /// Sets the direction the cursor moves in and whether the display shifts.
    fn set_entry_mode(&mut self, mode: EntryMode) -> GpioResult<()> {
        self.send_command(mode.to_command())
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(&mut self, control: DisplayControl) -> GpioResult<()> {
        self.send_command(control.to_command())
    }

    /// Moves the cursor or shifts the display, without touching DDRAM.
    fn cursor_shift(&mut self, target: ShiftTarget, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if target == ShiftTarget::Display {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface width, number of lines and font.
    fn function_set(&mut self, function: FunctionSet) -> GpioResult<()> {
        self.send_command(function.to_command())
    }

    /// Sets the CGRAM address.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b01000000 | address)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b10000000 | address)
    }

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

/// A wiring between the host and an HD44780 controller.
pub trait HD44780Transport: Debug {
    /// Width of the data bus. Decides whether bytes are split into nibbles.
    fn bus_width(&self) -> BusWidth;

    /// Puts the lines into their idle state. Called once at the start of the initialization.
    fn begin(&mut self) -> GpioResult<()> {
        Ok(())
    }

    /// Puts a single transfer on the bus and pulses the enable line.
    ///
    /// On a 4-bit bus only the low nibble of `value` is sent.
    fn transmit(&mut self, value: u8, rs: RegisterSelect) -> GpioResult<()>;

    /// Whether the wiring can switch the backlight at all.
    fn has_backlight(&self) -> bool {
        false
    }

    /// Switches the backlight. Wirings without a backlight control ignore it.
    fn set_backlight(&mut self, _on: bool) -> GpioResult<()> {
        Ok(())
    }
}

impl<T: HD44780Transport + ?Sized> HD44780Transport for &mut T {
    fn bus_width(&self) -> BusWidth {
        (**self).bus_width()
    }

    fn begin(&mut self) -> GpioResult<()> {
        (**self).begin()
    }

    fn transmit(&mut self, value: u8, rs: RegisterSelect) -> GpioResult<()> {
        (**self).transmit(value, rs)
    }

    fn has_backlight(&self) -> bool {
        (**self).has_backlight()
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        (**self).set_backlight(on)
    }
}
