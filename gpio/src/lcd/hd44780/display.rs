use crate::delay::{Delay, StdDelay};
use crate::lcd::hd44780::driver::{
    BusWidth, CursorDirection, DisplayControl, EntryMode, Font, FunctionSet, HD44780Driver,
    HD44780Transport, RegisterSelect, ShiftTarget, CLEAR_DISPLAY, RETURN_HOME,
};
use crate::{GpioError, GpioResult};
use log::{debug, trace, warn};
use std::fmt;
use std::time::Duration;

/// Size of the display in characters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    cols: u8,
    rows: u8,
}

pub const LCD_16X2: Geometry = Geometry { cols: 16, rows: 2 };
pub const LCD_20X4: Geometry = Geometry { cols: 20, rows: 4 };
pub const LCD_16X4: Geometry = Geometry { cols: 16, rows: 4 };

impl Geometry {
    /// # Errors
    /// - `GpioError::InvalidArgument` if the display has no rows or columns, more than 4 rows,
    ///   more than 40 columns, or more characters than the 80 bytes of DDRAM.
    pub fn new(cols: u8, rows: u8) -> GpioResult<Self> {
        if !(1..=4).contains(&rows) || !(1..=40).contains(&cols) || cols as u16 * rows as u16 > 80
        {
            return Err(GpioError::InvalidArgument);
        }
        Ok(Geometry { cols, rows })
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// DDRAM address of the first character of each row.
    ///
    /// Rows 2 and 3 continue the first and second line of the controller, right after the
    /// visible part of rows 0 and 1.
    pub fn row_offsets(&self) -> [u8; 4] {
        [0x00, 0x40, self.cols, 0x40 + self.cols]
    }
}

/// One step of the power-on initialization.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InitStep {
    /// Nothing is sent, the controller is still coming up.
    PowerUp,
    /// A single raw transfer, used to force the controller into 4-bit mode.
    Nibble(u8),
    /// A full instruction.
    Command(u8),
}

/// Builds the initialization sequence for the given function set.
///
/// Each step comes with the minimum time to wait after it. The controller can't be trusted to be
/// in any particular interface mode after power-up, so it's first put into 8-bit mode with three
/// function set instructions, and only then switched to 4 bits if needed.
pub fn init_sequence(function: FunctionSet) -> Vec<(InitStep, Duration)> {
    let mut steps = vec![(InitStep::PowerUp, Duration::from_millis(50))];

    match function.bus_width {
        BusWidth::Four => steps.extend([
            (InitStep::Nibble(0x3), Duration::from_micros(4500)),
            (InitStep::Nibble(0x3), Duration::from_micros(150)),
            (InitStep::Nibble(0x3), Duration::from_micros(150)),
            (InitStep::Nibble(0x2), Duration::from_micros(150)),
        ]),
        BusWidth::Eight => steps.extend([
            (InitStep::Command(function.to_command()), Duration::from_micros(4500)),
            (InitStep::Command(function.to_command()), Duration::from_micros(150)),
            (InitStep::Command(function.to_command()), Duration::from_micros(150)),
        ]),
    }

    steps.extend([
        (InitStep::Command(function.to_command()), Duration::from_micros(60)),
        (InitStep::Command(DisplayControl::default().to_command()), Duration::ZERO),
        (InitStep::Command(CLEAR_DISPLAY), Duration::from_millis(2)),
        (InitStep::Command(EntryMode::default().to_command()), Duration::ZERO),
    ]);
    steps
}

/// Every mode [LiquidCrystal::apply] can switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LcdMode {
    DisplayOn,
    DisplayOff,
    CursorOn,
    CursorOff,
    BlinkOn,
    BlinkOff,
    ScrollLeft,
    ScrollRight,
    LeftToRight,
    RightToLeft,
    AutoscrollOn,
    AutoscrollOff,
    BacklightOn,
    BacklightOff,
}

/// HD44780 character display.
///
/// Owns the mode registers of the controller and sends them over any [HD44780Transport]. The
/// controller state can't be read back (R/W is held low), so the copy kept here is the only
/// source of truth after [Self::begin].
///
/// Text can be written with [Self::print] or through [fmt::Write]:
///
/// ```no_run
/// use liquidcrystal_gpio::expander::Pcf8574;
/// use liquidcrystal_gpio::i2c::LinuxI2cDevice;
/// use liquidcrystal_gpio::lcd::hd44780::driver::{ExpanderHD44780Transport, ExpanderPinMap, Font};
/// use liquidcrystal_gpio::lcd::hd44780::{LiquidCrystal, LCD_16X2};
/// use std::fmt::Write;
///
/// let expander = Pcf8574::new(LinuxI2cDevice::open(1, 0x27)?);
/// let transport = ExpanderHD44780Transport::new(expander, ExpanderPinMap::COMMON)?;
/// let mut lcd = LiquidCrystal::new(transport, LCD_16X2, Font::Dots5x8);
/// lcd.begin()?;
/// lcd.set_cursor(0, 1)?;
/// write!(lcd, "{} C", 21.5)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct LiquidCrystal<T: HD44780Transport, D: Delay = StdDelay> {
    transport: T,
    delay: D,
    geometry: Geometry,
    function: FunctionSet,
    control: DisplayControl,
    entry: EntryMode,
    backlight: bool,
}

impl<T: HD44780Transport> LiquidCrystal<T> {
    pub fn new(transport: T, geometry: Geometry, font: Font) -> Self {
        Self::with_delay(transport, geometry, font, StdDelay)
    }
}

impl<T: HD44780Transport, D: Delay> LiquidCrystal<T, D> {
    pub fn with_delay(transport: T, geometry: Geometry, font: Font, delay: D) -> Self {
        let function = FunctionSet::for_rows(transport.bus_width(), geometry.rows, font);
        LiquidCrystal {
            transport,
            delay,
            geometry,
            function,
            control: DisplayControl::default(),
            entry: EntryMode::default(),
            backlight: false,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn function(&self) -> FunctionSet {
        self.function
    }

    pub fn display_control(&self) -> DisplayControl {
        self.control
    }

    pub fn entry_mode(&self) -> EntryMode {
        self.entry
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Runs the power-on initialization and switches the backlight on.
    ///
    /// Afterwards the display is on, without cursor or blinking, cleared, and writes text left to
    /// right.
    pub fn begin(&mut self) -> GpioResult<()> {
        debug!(
            "Initializing {}x{} display over {:?}",
            self.geometry.cols, self.geometry.rows, self.transport
        );
        self.transport.begin()?;

        for (step, wait) in init_sequence(self.function) {
            match step {
                InitStep::PowerUp => {}
                InitStep::Nibble(nibble) => self.transport.transmit(nibble, RegisterSelect::Command)?,
                InitStep::Command(command) => self.send(command, RegisterSelect::Command)?,
            }
            if !wait.is_zero() {
                self.delay.delay(wait);
            }
        }

        self.control = DisplayControl::default();
        self.entry = EntryMode::default();
        self.set_backlight(true)
    }

    /// Clears the display and moves the cursor to (0, 0).
    pub fn clear(&mut self) -> GpioResult<()> {
        self.clear_display()
    }

    /// Moves the cursor to (0, 0) and undoes any scrolling.
    pub fn home(&mut self) -> GpioResult<()> {
        self.return_home()
    }

    pub fn set_display_on(&mut self, on: bool) -> GpioResult<()> {
        self.update_control(DisplayControl {
            display_on: on,
            ..self.control
        })
    }

    pub fn set_cursor_visible(&mut self, visible: bool) -> GpioResult<()> {
        self.update_control(DisplayControl {
            cursor_visible: visible,
            ..self.control
        })
    }

    pub fn set_blink(&mut self, blink: bool) -> GpioResult<()> {
        self.update_control(DisplayControl {
            blink: blink,
            ..self.control
        })
    }

    // The cached registers only change once the controller has them.
    fn update_control(&mut self, control: DisplayControl) -> GpioResult<()> {
        self.set_display_control(control)?;
        self.control = control;
        Ok(())
    }

    fn update_entry(&mut self, entry: EntryMode) -> GpioResult<()> {
        self.set_entry_mode(entry)?;
        self.entry = entry;
        Ok(())
    }

    pub fn scroll_display_left(&mut self) -> GpioResult<()> {
        self.cursor_shift(ShiftTarget::Display, CursorDirection::Left)
    }

    pub fn scroll_display_right(&mut self) -> GpioResult<()> {
        self.cursor_shift(ShiftTarget::Display, CursorDirection::Right)
    }

    pub fn move_cursor_left(&mut self) -> GpioResult<()> {
        self.cursor_shift(ShiftTarget::Cursor, CursorDirection::Left)
    }

    pub fn move_cursor_right(&mut self) -> GpioResult<()> {
        self.cursor_shift(ShiftTarget::Cursor, CursorDirection::Right)
    }

    pub fn left_to_right(&mut self) -> GpioResult<()> {
        self.set_text_direction(CursorDirection::Right)
    }

    pub fn right_to_left(&mut self) -> GpioResult<()> {
        self.set_text_direction(CursorDirection::Left)
    }

    /// Sets the direction the cursor moves after each character.
    pub fn set_text_direction(&mut self, direction: CursorDirection) -> GpioResult<()> {
        self.update_entry(EntryMode {
            direction,
            ..self.entry
        })
    }

    /// With autoscroll on, the display shifts on every character instead of the cursor, so text
    /// is "pushed" out from the cursor position.
    pub fn set_autoscroll(&mut self, autoscroll: bool) -> GpioResult<()> {
        self.update_entry(EntryMode {
            autoscroll,
            ..self.entry
        })
    }

    /// Uploads a custom 5x8 glyph into one of the 8 CGRAM slots.
    ///
    /// `location` is taken modulo 8; the glyph is then printed with the character code
    /// `location`. Only the low 5 bits of each row are shown. The address counter is left in
    /// CGRAM, so call [Self::set_cursor] or [Self::home] before printing again.
    pub fn create_char(&mut self, location: u8, charmap: &[u8; 8]) -> GpioResult<()> {
        let location = location & 0x7;
        trace!("Uploading glyph {}: {:02x?}", location, charmap);
        self.set_cgram_address(location << 3)?;
        self.delay.delay_us(30);
        for &row in charmap {
            self.send_data(row)?;
            self.delay.delay_us(40);
        }
        Ok(())
    }

    /// Moves the cursor to the given column and row, both counted from 0.
    ///
    /// Rows past the last one are clamped to the last row.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the resulting address is outside DDRAM.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> GpioResult<()> {
        let last_row = self.geometry.rows - 1;
        let row = if row > last_row {
            warn!("Row {} is past the last row, using row {}", row, last_row);
            last_row
        } else {
            row
        };
        let address = self.geometry.row_offsets()[row as usize]
            .checked_add(col)
            .ok_or(GpioError::InvalidArgument)?;
        self.set_ddram_address(address)
    }

    /// Switches the backlight. [Self::backlight] stays `false` on wirings without a backlight
    /// line.
    pub fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        self.transport.set_backlight(on)?;
        self.backlight = on && self.transport.has_backlight();
        Ok(())
    }

    /// Switches both the display and the backlight on.
    pub fn on(&mut self) -> GpioResult<()> {
        self.set_display_on(true)?;
        self.set_backlight(true)
    }

    /// Switches both the backlight and the display off, in that order. DDRAM is kept.
    pub fn off(&mut self) -> GpioResult<()> {
        self.set_backlight(false)?;
        self.set_display_on(false)
    }

    pub fn apply(&mut self, mode: LcdMode) -> GpioResult<()> {
        match mode {
            LcdMode::DisplayOn => self.set_display_on(true),
            LcdMode::DisplayOff => self.set_display_on(false),
            LcdMode::CursorOn => self.set_cursor_visible(true),
            LcdMode::CursorOff => self.set_cursor_visible(false),
            LcdMode::BlinkOn => self.set_blink(true),
            LcdMode::BlinkOff => self.set_blink(false),
            LcdMode::ScrollLeft => self.scroll_display_left(),
            LcdMode::ScrollRight => self.scroll_display_right(),
            LcdMode::LeftToRight => self.left_to_right(),
            LcdMode::RightToLeft => self.right_to_left(),
            LcdMode::AutoscrollOn => self.set_autoscroll(true),
            LcdMode::AutoscrollOff => self.set_autoscroll(false),
            LcdMode::BacklightOn => self.set_backlight(true),
            LcdMode::BacklightOff => self.set_backlight(false),
        }
    }

    /// Sends a raw instruction.
    pub fn command(&mut self, command: u8) -> GpioResult<()> {
        self.send_command(command)
    }

    /// Writes a raw character code at the cursor.
    pub fn write_byte(&mut self, value: u8) -> GpioResult<()> {
        self.send_data(value)
    }

    /// Prints a string at the cursor and returns the number of characters written.
    ///
    /// The character ROM only matches ASCII, anything else is printed as `?`. Codes 0 to 7 show
    /// the custom glyphs.
    pub fn print(&mut self, text: &str) -> GpioResult<usize> {
        let mut count = 0;
        for c in text.chars() {
            let code = if c.is_ascii() {
                c as u8
            } else {
                warn!("Character {:?} can't be displayed, printing '?'", c);
                b'?'
            };
            self.send_data(code)?;
            count += 1;
        }
        Ok(count)
    }

    fn send(&mut self, value: u8, rs: RegisterSelect) -> GpioResult<()> {
        trace!("Sending: {:08b}, RS: {:?}", value, rs);
        match self.function.bus_width {
            BusWidth::Eight => self.transport.transmit(value, rs),
            BusWidth::Four => {
                self.transport.transmit(value >> 4, rs)?;
                self.transport.transmit(value & 0x0F, rs)
            }
        }
    }
}

impl<T: HD44780Transport, D: Delay> HD44780Driver for LiquidCrystal<T, D> {
    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, RegisterSelect::Command)?;
        if command == CLEAR_DISPLAY || command == RETURN_HOME {
            self.delay.delay_ms(2);
        }
        Ok(())
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, RegisterSelect::Data)
    }
}

impl<T: HD44780Transport, D: Delay> fmt::Write for LiquidCrystal<T, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s).map(|_| ()).map_err(|err| {
            warn!("Writing to the display failed: {}", err);
            fmt::Error
        })
    }
}
