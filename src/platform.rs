use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin};

use crate::rx5808::BitTransport;

/// Hold time for each data and clock phase of a bit.
pub const BIT_PHASE_US: u32 = 300;
/// Hold time after each select edge.
pub const SELECT_EDGE_US: u32 = 200;

pub trait DelayOps {
    fn delay_us(&self, micros: u32);
    fn delay_ms(&self, millis: u32);
}

/// Bit-banged RX5808 bus on three GPIOs.
///
/// `data` must be an open-drain line with a pull-up so driving it high
/// releases it for read-back.
pub struct GpioBus<D, C, S, Dl> {
    data: D,
    clock: C,
    select: S,
    delay: Dl,
}

impl<D, C, S, Dl> GpioBus<D, C, S, Dl>
where
    D: OutputPin + InputPin,
    C: OutputPin,
    S: OutputPin,
    Dl: DelayOps,
{
    pub fn new(data: D, clock: C, select: S, delay: Dl) -> Self {
        Self {
            data,
            clock,
            select,
            delay,
        }
    }

    pub fn release(self) -> (D, C, S, Dl) {
        (self.data, self.clock, self.select, self.delay)
    }
}

impl<D, C, S, Dl> BitTransport for GpioBus<D, C, S, Dl>
where
    D: OutputPin + InputPin,
    C: OutputPin,
    S: OutputPin,
    Dl: DelayOps,
{
    type Error = ErrorKind;

    fn select_high(&mut self) -> Result<(), Self::Error> {
        self.select.set_high().map_err(|err| err.kind())?;
        self.delay.delay_us(SELECT_EDGE_US);
        Ok(())
    }

    fn select_low(&mut self) -> Result<(), Self::Error> {
        self.select.set_low().map_err(|err| err.kind())?;
        self.delay.delay_us(SELECT_EDGE_US);
        Ok(())
    }

    fn set_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        let driven = if bit {
            self.data.set_high()
        } else {
            self.data.set_low()
        };
        driven.map_err(|err| err.kind())?;
        self.delay.delay_us(BIT_PHASE_US);
        Ok(())
    }

    fn pulse_clock(&mut self) -> Result<(), Self::Error> {
        self.clock.set_high().map_err(|err| err.kind())?;
        self.delay.delay_us(BIT_PHASE_US);
        self.clock.set_low().map_err(|err| err.kind())?;
        self.delay.delay_us(BIT_PHASE_US);
        Ok(())
    }

    fn release_data(&mut self) -> Result<(), Self::Error> {
        self.data.set_high().map_err(|err| err.kind())?;
        self.delay.delay_us(BIT_PHASE_US);
        Ok(())
    }

    fn sample_data(&mut self) -> Result<bool, Self::Error> {
        self.data.is_high().map_err(|err| err.kind())
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        self.clock.set_low().map_err(|err| err.kind())?;
        self.data.set_low().map_err(|err| err.kind())
    }

    fn settle_ms(&mut self, millis: u32) {
        self.delay.delay_ms(millis);
    }
}

#[cfg(feature = "firmware")]
pub use busy::BusyDelay;

#[cfg(feature = "firmware")]
mod busy {
    use esp_hal::time::{Duration, Instant};

    use super::DelayOps;

    #[derive(Clone, Copy, Default)]
    pub struct BusyDelay;

    impl BusyDelay {
        pub const fn new() -> Self {
            Self
        }

        fn delay_duration(&self, duration: Duration) {
            let start = Instant::now();
            while start.elapsed() < duration {}
        }
    }

    impl DelayOps for BusyDelay {
        fn delay_us(&self, micros: u32) {
            self.delay_duration(Duration::from_micros(micros as u64));
        }

        fn delay_ms(&self, millis: u32) {
            self.delay_duration(Duration::from_millis(millis as u64));
        }
    }
}
