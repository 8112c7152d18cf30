// PCF8574 transport for the HD44780 4-bit interface.
//
// The expander exposes 8 output lines that are wired to the LCD controller
// as 4 data lines plus RS, RW and enable, with the remaining line driving
// the backlight. One expander byte therefore describes the complete state
// of the bus. The controller latches a nibble on the falling edge of the
// enable line, so transmitting a nibble takes three raw I2C writes: the
// frame with enable low, the frame with enable high, and the frame with
// enable low again.

use bitfield::bitfield;
use embedded_hal::{delay::DelayNs, i2c};

use crate::{Backlight, LcdError};

bitfield! {
    /// Pin assignment of the PCF8574 output byte for the common 4-bit
    /// LCD backpack wiring: P0=RS, P1=RW, P2=E, P3=backlight, P4-P7=data.
    pub struct ExpanderPins(u8);
    impl Debug;
    pub rs, set_rs: 0, 0;
    pub rw, set_rw: 1, 1;
    pub enable, set_enable: 2, 2;
    pub backlight, set_backlight: 3, 3;
    pub data, set_data: 7, 4;
}

/// Owns the I2C peripheral, the delay provider and the session state of
/// one expander: the bound bus address and the current backlight setting.
///
/// The address starts out unbound. Every transmit path checks it and turns
/// into a no-op while unbound, so a driver handle can be constructed and
/// used before the hardware is attached without raising errors.
pub struct Pcf8574Bus<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    i2c: I2C,
    delay: DELAY,
    address: Option<u8>,
    backlight: Backlight,
}

impl<I2C, DELAY> Pcf8574Bus<I2C, DELAY>
where
    I2C: i2c::I2c,
    DELAY: DelayNs,
{
    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Self {
            i2c,
            delay,
            address: None,
            backlight: Backlight::On,
        }
    }

    /// returns the bound I2C address, or `None` while unconnected
    pub fn address(&self) -> Option<u8> {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: u8) {
        self.address = Some(address);
    }

    /// returns the current backlight setting
    pub fn backlight(&self) -> Backlight {
        self.backlight
    }

    pub(crate) fn set_backlight_state(&mut self, backlight: Backlight) {
        self.backlight = backlight;
    }

    /// returns the expander byte with only the backlight line driven,
    /// keeping RS, RW and enable low
    pub(crate) fn backlight_frame(&self) -> u8 {
        let mut pins = ExpanderPins(0);
        pins.set_backlight((self.backlight == Backlight::On) as u8);
        pins.0
    }

    pub(crate) fn delay(&mut self) -> &mut DELAY {
        &mut self.delay
    }

    /// returns a reference to the I2C peripheral. mostly needed for testing
    pub(crate) fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    fn write_expander(&mut self, address: u8, bits: u8) -> Result<(), LcdError<I2C>> {
        self.i2c
            .write(address, &[bits])
            .map_err(LcdError::I2cError)
    }

    /// Writes one raw byte to the expander outputs without the enable
    /// strobe. Used during the cold-start handshake, before the controller
    /// listens in 4-bit mode. No-op while unconnected.
    pub(crate) fn write_raw(&mut self, bits: u8) -> Result<(), LcdError<I2C>> {
        let Some(address) = self.address else {
            return Ok(());
        };
        self.write_expander(address, bits)
    }

    /// Transmits one nibble frame, strobing the enable line so the
    /// controller latches it. The frame carries the data nibble in its top
    /// four bits along with the RS and backlight bits; the enable bit is
    /// managed here. No-op while unconnected.
    ///
    /// Timing: the enable pulse is held ≥1 µs, and the controller needs
    /// ≥50 µs to process the latched nibble before the next one.
    pub fn write_nibble(&mut self, frame: u8) -> Result<(), LcdError<I2C>> {
        let Some(address) = self.address else {
            return Ok(());
        };
        let mut pins = ExpanderPins(frame);
        pins.set_enable(0);
        self.write_expander(address, pins.0)?;
        pins.set_enable(1);
        self.write_expander(address, pins.0)?;
        self.delay.delay_us(1);
        pins.set_enable(0);
        self.write_expander(address, pins.0)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn send_nibble(&mut self, rs_setting: bool, nibble: u8) -> Result<(), LcdError<I2C>> {
        let mut pins = ExpanderPins(0);
        pins.set_data(nibble & 0x0F);
        pins.set_rs(rs_setting as u8);
        pins.set_rw(0);
        pins.set_backlight((self.backlight == Backlight::On) as u8);
        self.write_nibble(pins.0)
    }

    /// Frames a full byte as two nibble transmissions, high nibble first as
    /// the controller's 4-bit protocol requires. If `rs_setting` is `true`
    /// the byte goes to the data register, otherwise to the command
    /// register. The current backlight bit rides along on every frame.
    pub fn send(&mut self, rs_setting: bool, payload: u8) -> Result<(), LcdError<I2C>> {
        self.send_nibble(rs_setting, payload >> 4)?;
        self.send_nibble(rs_setting, payload & 0x0F)
    }

    /// Sends a byte to the command register.
    pub fn send_command(&mut self, command: u8) -> Result<(), LcdError<I2C>> {
        self.send(false, command)
    }

    /// Sends a byte to the data register (DDRAM at the current cursor).
    pub fn send_data(&mut self, data: u8) -> Result<(), LcdError<I2C>> {
        self.send(true, data)
    }
}
