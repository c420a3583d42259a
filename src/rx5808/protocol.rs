//! RX5808 three-wire register protocol.
//!
//! Frames are clocked LSB first: 4 address bits, a read/write bit, then 20
//! data bits. Timing lives in the [`BitTransport`] implementation so framing
//! can be checked against a recording transport.

pub const REG_FREQUENCY: u8 = 0x1;
pub const REG_POWER: u8 = 0xA;
pub const REG_STATE: u8 = 0xF;

pub const ADDRESS_BITS: u8 = 4;
pub const DATA_BITS: u8 = 20;
/// Only D0..D15 carry data on read-back; D16..D19 are clocked and dropped.
pub const READ_VALUE_BITS: u8 = 16;

pub const POWER_DOWN_MASK: u32 = 0b1111_1111_1111_1111_1111;
/// Normal operation with the unused audio/video blocks switched off.
pub const POWER_NORMAL_MASK: u32 = 0b1101_0000_1101_1111_0011;

/// Settle after a frequency frame before touching the bus again.
pub const FRAME_SETTLE_MS: u32 = 2;

/// Bit-level access to the data, clock and select lines.
///
/// Implementations own the fixed phase delays. A transaction must not be
/// preempted between `select_low` and the closing `select_high`.
pub trait BitTransport {
    type Error;

    fn select_high(&mut self) -> Result<(), Self::Error>;
    fn select_low(&mut self) -> Result<(), Self::Error>;
    /// Drives the data line and holds it for the settle phase.
    fn set_bit(&mut self, bit: bool) -> Result<(), Self::Error>;
    /// Clock high then low, holding each phase.
    fn pulse_clock(&mut self) -> Result<(), Self::Error>;
    /// Stops driving data so the receiver can answer a read.
    fn release_data(&mut self) -> Result<(), Self::Error>;
    fn sample_data(&mut self) -> Result<bool, Self::Error>;
    /// Clock low, data driven low.
    fn idle(&mut self) -> Result<(), Self::Error>;
    fn settle_ms(&mut self, millis: u32);
}

impl<T: BitTransport + ?Sized> BitTransport for &mut T {
    type Error = T::Error;

    fn select_high(&mut self) -> Result<(), Self::Error> {
        (**self).select_high()
    }

    fn select_low(&mut self) -> Result<(), Self::Error> {
        (**self).select_low()
    }

    fn set_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        (**self).set_bit(bit)
    }

    fn pulse_clock(&mut self) -> Result<(), Self::Error> {
        (**self).pulse_clock()
    }

    fn release_data(&mut self) -> Result<(), Self::Error> {
        (**self).release_data()
    }

    fn sample_data(&mut self) -> Result<bool, Self::Error> {
        (**self).sample_data()
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        (**self).idle()
    }

    fn settle_ms(&mut self, millis: u32) {
        (**self).settle_ms(millis)
    }
}

/// Synthesizer register value for a channel in MHz.
///
/// `tf = (F - 479) / 2`, `N = tf / 32`, `A = tf % 32`, register = `N << 7 | A`.
pub fn frequency_to_register(freq_mhz: u16) -> u16 {
    let tf = freq_mhz.saturating_sub(479) / 2;
    let n = tf / 32;
    let a = tf % 32;
    (n << 7) | a
}

/// Lower edge of the 2 MHz bin a register value selects.
pub fn register_to_frequency(register: u16) -> u16 {
    let n = register >> 7;
    let a = register & 0x1F;
    (n * 32 + a) * 2 + 479
}

pub struct RegisterBus<T> {
    transport: T,
}

impl<T: BitTransport> RegisterBus<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
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

    pub fn settle_ms(&mut self, millis: u32) {
        self.transport.settle_ms(millis);
    }

    /// Lines at rest: select high, clock low, data low.
    pub fn park(&mut self) -> Result<(), T::Error> {
        self.transport.select_high()?;
        self.transport.idle()
    }

    pub fn write_register(&mut self, address: u8, value: u32) -> Result<(), T::Error> {
        self.begin_frame(address, true)?;
        for i in 0..DATA_BITS {
            self.send_bit((value >> i) & 0x1 == 1)?;
        }
        self.transport.select_high()?;
        self.transport.idle()
    }

    pub fn read_register(&mut self, address: u8) -> Result<u16, T::Error> {
        self.begin_frame(address, false)?;
        self.transport.release_data()?;

        let mut value = 0u16;
        for i in 0..DATA_BITS {
            let bit = self.transport.sample_data()?;
            if i < READ_VALUE_BITS && bit {
                value |= 1 << i;
            }
            self.transport.pulse_clock()?;
        }

        self.transport.idle()?;
        self.transport.select_high()?;
        Ok(value)
    }

    fn begin_frame(&mut self, address: u8, write: bool) -> Result<(), T::Error> {
        self.transport.select_high()?;
        self.transport.select_low()?;
        for i in 0..ADDRESS_BITS {
            self.send_bit((address >> i) & 0x1 == 1)?;
        }
        self.send_bit(write)
    }

    fn send_bit(&mut self, bit: bool) -> Result<(), T::Error> {
        self.transport.set_bit(bit)?;
        self.transport.pulse_clock()
    }
}
