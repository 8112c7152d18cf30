//! This Rust `embedded-hal`-based library drives an [HD44780](https://en.wikipedia.org/wiki/Hitachi_HD44780_LCD_controller)
//! compatible 16x2 character LCD through a PCF8574-style I2C GPIO expander in an embedded,
//! `no_std` environment. These "I2C backpack" boards are ubiquitous on eBay and AliExpress;
//! the common wiring puts the display's 4-bit data pins on P4-P7 of the PCF8574, with RS,
//! R/W and enable on P0-P2 and the backlight on P3. This library supports that configuration
//! as a write-only driver (R/W held low).
//!
//! Text is addressed with a single linear position in `[0, 31]` that runs across both
//! display lines: position 0 is the top-left cell, position 16 the first cell of the second
//! line. Strings written across the end of the first line wrap onto the second line, and
//! anything that would run past the last cell is silently dropped.
//!
//! Key features include:
//! - Convenient high-level API: connect, write text or numbers, clear, backlight control
//! - Linear 0-31 position addressing with automatic line wrap
//! - Safe to call before the hardware is attached: operations are no-ops until `connect`
//! - Compatible with the `embedded-hal` traits v1.0 and later
//! - Optional support for the `defmt` and `ufmt` logging frameworks
//!
//! ## Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! i2c-lcd1602 = { version = "0.1", features = ["defmt"] }
//! ```
//! Then create and connect the display:
//! ```rust
//! use i2c_lcd1602::{Backlight, Lcd1602};
//!
//! // board setup
//! let i2c = ...; // I2C peripheral
//! let delay = ...; // DelayNs implementation
//!
//! let mut lcd = Lcd1602::new(i2c, delay);
//! // 0x27 (PCF8574) and 0x3F (PCF8574A) are the widely used addresses
//! if let Err(e) = lcd.connect(0x27) {
//!     panic!("Error connecting to LCD: {}", e);
//! }
//! ```
//! Use the display:
//! ```rust
//! // write a message across the line boundary; it wraps onto line 2
//! lcd.show_string("Hello, world!", 10)?;
//! // write a number on the second line
//! lcd.show_number(42, 16)?;
//! // blank all 32 cells
//! lcd.clear()?;
//! lcd.set_backlight(Backlight::Off)?;
//! ```
//! Each method returns a `Result` that wraps the display object in `Ok()`, allowing for
//! easy chaining of commands:
//! ```rust
//! lcd.clear()?.show_string("temperature:", 0)?.show_number(21, 16)?;
//! ```
//!
//! Connecting binds the I2C address and replays the controller's cold-start handshake
//! mandated by the HD44780 datasheet; until `connect` succeeds, all operations are
//! accepted and silently discarded. The driver is synchronous and blocking: every
//! operation performs its I2C writes and the controller's required settle delays
//! in-line on the calling thread.
#![no_std]
#![allow(dead_code, non_upper_case_globals)]
use core::fmt::{Display, Write};

use embedded_hal::{delay::DelayNs, i2c};

pub mod transport;

use transport::Pcf8574Bus;

// commands
const LCD_CMD_CLEARDISPLAY: u8 = 0x01; //  Clear display, set cursor position to zero
const LCD_CMD_RETURNHOME: u8 = 0x02; //  Set cursor position to zero
const LCD_CMD_ENTRYMODESET: u8 = 0x04; //  Sets the entry mode
const LCD_CMD_DISPLAYCONTROL: u8 = 0x08; //  Controls the display; does stuff like turning it off and on
const LCD_CMD_FUNCTIONSET: u8 = 0x20; //  Used to send the function to set to the display
const LCD_CMD_SETDDRAMADDR: u8 = 0x80; //  Used to set the DDRAM (Display Data RAM)

// flags for display entry mode
const LCD_FLAG_ENTRYRIGHT: u8 = 0x00; //  Used to set text to flow from right to left
const LCD_FLAG_ENTRYLEFT: u8 = 0x02; //  Used to set text to flow from left to right
const LCD_FLAG_ENTRYSHIFTINCREMENT: u8 = 0x01; //  Used to 'right justify' text from the cursor
const LCD_FLAG_ENTRYSHIFTDECREMENT: u8 = 0x00; //  Used to 'left justify' text from the cursor

// flags for display on/off control
const LCD_FLAG_DISPLAYON: u8 = 0x04; //  Turns the display on
const LCD_FLAG_DISPLAYOFF: u8 = 0x00; //  Turns the display off
const LCD_FLAG_CURSORON: u8 = 0x02; //  Turns the cursor on
const LCD_FLAG_CURSOROFF: u8 = 0x00; //  Turns the cursor off
const LCD_FLAG_BLINKON: u8 = 0x01; //  Turns on the blinking cursor
const LCD_FLAG_BLINKOFF: u8 = 0x00; //  Turns off the blinking cursor

// flags for function set
const LCD_FLAG_8BITMODE: u8 = 0x10; //  LCD 8 bit mode
const LCD_FLAG_4BITMODE: u8 = 0x00; //  LCD 4 bit mode
const LCD_FLAG_2LINE: u8 = 0x08; //  LCD 2 line mode
const LCD_FLAG_1LINE: u8 = 0x00; //  LCD 1 line mode
const LCD_FLAG_5x10_DOTS: u8 = 0x04; //  10 pixel high font mode
const LCD_FLAG_5x8_DOTS: u8 = 0x00; //  8 pixel high font mode

// raw nibble frames for the cold-start handshake, sent before the
// controller listens in 4-bit mode (function set high nibble, DL=1 / DL=0)
const LCD_SEQ_FORCE_8BIT: u8 = 0x30;
const LCD_SEQ_SELECT_4BIT: u8 = 0x20;

/// Number of character cells per display line.
const LCD_COLUMNS: u8 = 16;
/// Total addressable cells across both lines.
const LCD_CELLS: u8 = 32;
/// DDRAM base address of each display line. The gap between the two
/// address ranges is why the driver re-issues a cursor set when text
/// wraps lines.
const LCD_ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

/// 32 blanks, one per cell.
const BLANK_DISPLAY: &str = "                                ";

#[derive(Debug, PartialEq, Copy, Clone)]
/// Errors that can occur when driving the LCD
pub enum LcdError<I2C>
where
    I2C: i2c::I2c,
{
    /// I2C error returned from the underlying I2C implementation
    I2cError(I2C::Error),
    /// Formatting error while rendering a number
    FormattingError(core::fmt::Error),
}

impl<I2C> From<core::fmt::Error> for LcdError<I2C>
where
    I2C: i2c::I2c,
{
    fn from(err: core::fmt::Error) -> Self {
        LcdError::FormattingError(err)
    }
}

impl<I2C> From<&LcdError<I2C>> for &'static str
where
    I2C: i2c::I2c,
{
    fn from(err: &LcdError<I2C>) -> Self {
        match err {
            LcdError::I2cError(_) => "I2C error",
            LcdError::FormattingError(_) => "Formatting error",
        }
    }
}

#[cfg(feature = "defmt")]
impl<I2C> defmt::Format for LcdError<I2C>
where
    I2C: i2c::I2c,
{
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl<I2C> ufmt::uDisplay for LcdError<I2C>
where
    I2C: i2c::I2c,
{
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl<I2C> Display for LcdError<I2C>
where
    I2C: i2c::I2c,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
/// Backlight state of the display. The setting persists across all
/// subsequent writes until explicitly changed: every transmitted nibble
/// carries the current backlight bit, since the expander has no memory of
/// its own and would otherwise drop the line on the next write.
pub enum Backlight {
    Off,
    On,
}

impl From<&Backlight> for &'static str {
    fn from(backlight: &Backlight) -> Self {
        match backlight {
            Backlight::Off => "off",
            Backlight::On => "on",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Backlight {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for Backlight {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl Display for Backlight {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

/// Stack buffer for the decimal rendering of a number. Sized for the
/// longest `i32` value, `-2147483648`.
struct DecimalBuffer {
    bytes: [u8; 12],
    len: usize,
}

impl DecimalBuffer {
    const fn new() -> Self {
        Self {
            bytes: [0; 12],
            len: 0,
        }
    }

    fn as_str(&self) -> &str {
        // only ever holds ASCII digits and a sign
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

impl core::fmt::Write for DecimalBuffer {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        if self.len + bytes.len() > self.bytes.len() {
            return Err(core::fmt::Error);
        }
        self.bytes[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

/// HD44780 16x2 character display behind a PCF8574 I2C expander.
///
/// The handle owns the I2C peripheral and delay provider, plus the session
/// state of one display: the bound bus address and the backlight setting.
/// All operations take `&mut self`; the driver provides no internal
/// synchronization, and access to a shared I2C bus must be serialized by
/// the caller.
pub struct Lcd1602<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    bus: Pcf8574Bus<I2C, DELAY>,
}

impl<I2C, DELAY> Lcd1602<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    /// Default address of PCF8574 backpacks. PCF8574A boards typically
    /// respond at 0x3F instead.
    pub const DEFAULT_I2C_ADDRESS: u8 = 0x27;

    /// Create a new display handle. No bus traffic occurs until `connect`
    /// is called; until then all operations are accepted and discarded.
    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Self {
            bus: Pcf8574Bus::new(i2c, delay),
        }
    }

    /// returns `true` once `connect` has bound an address
    pub fn is_connected(&self) -> bool {
        self.bus.address().is_some()
    }

    /// returns the current backlight setting
    pub fn backlight(&self) -> Backlight {
        self.bus.backlight()
    }

    /// returns a reference to the I2C peripheral. mostly needed for testing
    fn i2c(&mut self) -> &mut I2C {
        self.bus.i2c()
    }

    /// Binds the display to the given 7-bit I2C address and runs the
    /// controller's cold-start handshake, leaving the display configured
    /// for 4-bit operation, switched on and cleared. Addresses above 0x7F
    /// are silently ignored and leave the handle unconnected.
    ///
    /// The handshake sequence and its delays come from the HD44780
    /// datasheet; the triple function-set reset brings the controller into
    /// a known state regardless of what mode it was left in. Deviating
    /// from the order leaves the controller stuck interpreting the nibble
    /// stream as 8-bit traffic.
    pub fn connect(&mut self, address: u8) -> Result<&mut Self, LcdError<I2C>> {
        if address > 0x7F {
            return Ok(self);
        }
        self.bus.set_address(address);

        // post-power-on settle before the first byte reaches the controller
        self.bus.delay().delay_ms(50);

        // drive RS and R/W low (and the backlight line) once, bypassing the
        // framer; the controller is not yet listening in 4-bit mode
        let frame = self.bus.backlight_frame();
        self.bus.write_raw(frame)?;
        self.bus.delay().delay_ms(50);

        // force 8-bit mode three times, then select 4-bit mode
        for _ in 0..3 {
            self.bus.write_nibble(LCD_SEQ_FORCE_8BIT)?;
            self.bus.delay().delay_us(4100);
        }
        self.bus.write_nibble(LCD_SEQ_SELECT_4BIT)?;
        self.bus.delay().delay_us(1000);

        // 4-bit interface, 2 display lines, 5x8 font
        self.bus.send_command(
            LCD_CMD_FUNCTIONSET | LCD_FLAG_4BITMODE | LCD_FLAG_2LINE | LCD_FLAG_5x8_DOTS,
        )?;
        self.bus.delay().delay_us(1000);

        // display on, cursor off, blink off
        self.bus.send_command(
            LCD_CMD_DISPLAYCONTROL | LCD_FLAG_DISPLAYON | LCD_FLAG_CURSOROFF | LCD_FLAG_BLINKOFF,
        )?;
        self.bus.delay().delay_us(1000);

        // cursor auto-increments left to right, no display shift
        self.bus.send_command(
            LCD_CMD_ENTRYMODESET | LCD_FLAG_ENTRYLEFT | LCD_FLAG_ENTRYSHIFTDECREMENT,
        )?;
        self.bus.delay().delay_us(1000);

        self.clear()
    }

    /// Set the cursor via the DDRAM address command. `line` selects the
    /// per-line base address.
    fn set_cursor(&mut self, line: u8, column: u8) -> Result<(), LcdError<I2C>> {
        let base = if line == 0 {
            LCD_ROW_OFFSETS[0]
        } else {
            LCD_ROW_OFFSETS[1]
        };
        self.bus
            .send_command(LCD_CMD_SETDDRAMADDR | (base + column))
    }

    /// Writes `text` starting at the given linear position in `[0, 31]`.
    /// Positions above 31 are silently ignored, and characters that would
    /// land past the last cell are dropped. Crossing from the end of the
    /// first line onto the second re-issues a cursor set, because the
    /// controller's auto-increment does not bridge the DDRAM gap between
    /// the two line address ranges.
    pub fn show_string(&mut self, text: &str, position: u8) -> Result<&mut Self, LcdError<I2C>> {
        if position >= LCD_CELLS {
            return Ok(self);
        }
        self.set_cursor(position / LCD_COLUMNS, position % LCD_COLUMNS)?;

        for (i, c) in text.chars().enumerate() {
            let cell = position as usize + i;
            if cell >= LCD_CELLS as usize {
                break;
            }
            let cell = cell as u8;
            if i > 0 && cell % LCD_COLUMNS == 0 {
                // simulate a carriage return
                self.set_cursor(cell / LCD_COLUMNS, 0)?;
            }
            self.bus.send_data(c as u8)?;
        }
        Ok(self)
    }

    /// Writes the decimal rendering of `value` starting at the given
    /// linear position, with the same wrap and truncation behavior as
    /// `show_string`.
    pub fn show_number(&mut self, value: i32, position: u8) -> Result<&mut Self, LcdError<I2C>> {
        let mut buffer = DecimalBuffer::new();
        write!(buffer, "{}", value)?;
        self.show_string(buffer.as_str(), position)
    }

    /// Blanks all 32 cells. Implemented as a full-width write of spaces
    /// through the normal addressing path rather than the controller's
    /// native clear command, so it shares the wrap logic and needs no
    /// separate settle-time case.
    pub fn clear(&mut self) -> Result<&mut Self, LcdError<I2C>> {
        self.show_string(BLANK_DISPLAY, 0)
    }

    /// Switches the backlight on or off. The new state applies to every
    /// subsequent write; an inert command byte of 0 is framed immediately
    /// so the expander lines pick up the new backlight bit right away.
    pub fn set_backlight(&mut self, backlight: Backlight) -> Result<&mut Self, LcdError<I2C>> {
        self.bus.set_backlight_state(backlight);
        self.bus.send_command(0)?;
        Ok(self)
    }
}

#[cfg(test)]
mod lib_tests {
    extern crate std;
    use super::*;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };
    use std::vec::Vec;

    const ADDR: u8 = 0x27;
    const ENABLE: u8 = 0b0000_0100;
    const BL: u8 = 0b0000_1000;

    /// the three raw writes of one nibble frame: enable low, high, low
    fn nibble_frames(frame: u8) -> Vec<I2cTransaction> {
        std::vec![
            I2cTransaction::write(ADDR, std::vec![frame & !ENABLE]),
            I2cTransaction::write(ADDR, std::vec![frame | ENABLE]),
            I2cTransaction::write(ADDR, std::vec![frame & !ENABLE]),
        ]
    }

    /// the six raw writes of one framed byte, high nibble first
    fn byte_frames(rs: bool, backlight: u8, value: u8) -> Vec<I2cTransaction> {
        let mut frames = nibble_frames((value & 0xF0) | backlight | rs as u8);
        frames.extend(nibble_frames(((value << 4) & 0xF0) | backlight | rs as u8));
        frames
    }

    /// a display handle with the address already bound, skipping the
    /// connect handshake
    fn connected_lcd(i2c: I2cMock) -> Lcd1602<I2cMock, NoopDelay> {
        let mut lcd = Lcd1602::new(i2c, NoopDelay::new());
        lcd.bus.set_address(ADDR);
        lcd
    }

    /// expected write log of `clear`: cursor home, 16 blanks, cursor to
    /// line 2, 16 more blanks
    fn clear_frames() -> Vec<I2cTransaction> {
        let mut expected = byte_frames(false, BL, 0x80);
        for _ in 0..16 {
            expected.extend(byte_frames(true, BL, b' '));
        }
        expected.extend(byte_frames(false, BL, 0xC0));
        for _ in 0..16 {
            expected.extend(byte_frames(true, BL, b' '));
        }
        expected
    }

    #[test]
    fn test_connect_runs_init_sequence() {
        let mut expected = std::vec![
            // pre-handshake raw write of the backlight bits
            I2cTransaction::write(ADDR, std::vec![0b0000_1000]),
        ];
        // force 8-bit mode three times
        for _ in 0..3 {
            expected.extend(nibble_frames(0x30));
        }
        // select 4-bit mode
        expected.extend(nibble_frames(0x20));
        // function set: 4-bit, 2 lines, 5x8 font = 0x28
        expected.extend(byte_frames(false, BL, 0x28));
        // display control: display on, cursor off, blink off = 0x0C
        expected.extend(byte_frames(false, BL, 0x0C));
        // entry mode: increment, no shift = 0x06
        expected.extend(byte_frames(false, BL, 0x06));
        // connect finishes with a clear
        expected.extend(clear_frames());

        let i2c = I2cMock::new(&expected);
        let mut lcd = Lcd1602::new(i2c, NoopDelay::new());
        assert!(lcd.connect(ADDR).is_ok());
        assert!(lcd.is_connected());
        lcd.i2c().done();
    }

    #[test]
    fn test_connect_invalid_address_is_ignored() {
        let i2c = I2cMock::new(&[]);
        let mut lcd = Lcd1602::new(i2c, NoopDelay::new());
        assert!(lcd.connect(0x80).is_ok());
        assert!(!lcd.is_connected());
        // still unconnected, so writes stay discarded
        assert!(lcd.show_string("nothing", 0).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_operations_before_connect_are_noops() {
        let i2c = I2cMock::new(&[]);
        let mut lcd = Lcd1602::new(i2c, NoopDelay::new());
        assert!(lcd.show_string("hello", 0).is_ok());
        assert!(lcd.show_number(1234, 16).is_ok());
        assert!(lcd.clear().is_ok());
        assert!(lcd.set_backlight(Backlight::Off).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_show_string_wraps_at_line_boundary() {
        // "HI" at position 15: 'H' lands on the last cell of line 1, the
        // wrap re-issues a cursor set to (1, 0), then 'I' is written
        let mut expected = byte_frames(false, BL, 0x80 | 15);
        expected.extend(byte_frames(true, BL, b'H'));
        expected.extend(byte_frames(false, BL, 0xC0));
        expected.extend(byte_frames(true, BL, b'I'));

        let mut lcd = connected_lcd(I2cMock::new(&expected));
        assert!(lcd.show_string("HI", 15).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_show_string_truncates_at_last_cell() {
        // "123" at position 30 only has room for two characters
        let mut expected = byte_frames(false, BL, 0xC0 | 14);
        expected.extend(byte_frames(true, BL, b'1'));
        expected.extend(byte_frames(true, BL, b'2'));

        let mut lcd = connected_lcd(I2cMock::new(&expected));
        assert!(lcd.show_string("123", 30).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_show_string_position_out_of_range() {
        let mut lcd = connected_lcd(I2cMock::new(&[]));
        assert!(lcd.show_string("ignored", 32).is_ok());
        assert!(lcd.show_string("ignored", 255).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_show_number_matches_decimal_string() {
        // -42 at position 3 produces the same write log as
        // show_string("-42", 3)
        let mut expected = byte_frames(false, BL, 0x80 | 3);
        expected.extend(byte_frames(true, BL, b'-'));
        expected.extend(byte_frames(true, BL, b'4'));
        expected.extend(byte_frames(true, BL, b'2'));

        let mut lcd = connected_lcd(I2cMock::new(&expected));
        assert!(lcd.show_number(-42, 3).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_clear_blanks_all_cells() {
        let mut lcd = connected_lcd(I2cMock::new(&clear_frames()));
        assert!(lcd.clear().is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_backlight_bit_follows_state() {
        let mut expected = Vec::new();
        // set_backlight(Off) frames an inert command 0 with the bit clear
        expected.extend(byte_frames(false, 0, 0x00));
        // subsequent writes carry the cleared bit on every frame
        expected.extend(byte_frames(false, 0, 0x80 | 4));
        expected.extend(byte_frames(true, 0, b'A'));
        // switching back on pushes the set bit immediately
        expected.extend(byte_frames(false, BL, 0x00));
        expected.extend(byte_frames(false, BL, 0x80 | 4));
        expected.extend(byte_frames(true, BL, b'A'));

        let mut lcd = connected_lcd(I2cMock::new(&expected));
        assert!(lcd.set_backlight(Backlight::Off).is_ok());
        assert_eq!(lcd.backlight(), Backlight::Off);
        assert!(lcd.show_string("A", 4).is_ok());
        assert!(lcd.set_backlight(Backlight::On).is_ok());
        assert_eq!(lcd.backlight(), Backlight::On);
        assert!(lcd.show_string("A", 4).is_ok());
        lcd.i2c().done();
    }

    #[test]
    fn test_decimal_buffer_extremes() {
        let mut buffer = DecimalBuffer::new();
        assert!(write!(buffer, "{}", i32::MIN).is_ok());
        assert_eq!(buffer.as_str(), "-2147483648");
    }
}
