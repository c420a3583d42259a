//! RX5808 5.8 GHz receiver: channel programming and RSSI readout.

pub mod protocol;
mod tuning;

use log::{debug, warn};

pub use protocol::{
    frequency_to_register, register_to_frequency, BitTransport, RegisterBus, POWER_DOWN_MASK,
    POWER_NORMAL_MASK, REG_FREQUENCY, REG_POWER, REG_STATE,
};
pub use tuning::{TuningState, UNTUNED_MHZ};

/// Requesting this "frequency" powers the module down.
pub const POWER_DOWN_FREQ_MHZ: u16 = 1111;
pub const BAND_MIN_MHZ: u16 = 5645;
pub const BAND_MAX_MHZ: u16 = 5945;

/// Minimum spacing between two frequency writes.
pub const MIN_BUS_TIME_MS: u32 = 30;
/// Time the synthesizer needs before a read-back is meaningful.
pub const MIN_TUNE_TIME_MS: u32 = 35;
pub const WAKE_SETTLE_MS: u32 = 10;

/// ADC counts above this are clamped; the module runs at 3.3 V and never
/// reaches the top of the 12-bit range.
pub const RSSI_ADC_CLAMP: u16 = 2047;
const RSSI_SHIFT: u32 = 3;

pub struct Rx5808<'a, T> {
    bus: RegisterBus<T>,
    tuning: &'a TuningState,
    last_write_ms: u32,
    powered_down: bool,
}

impl<'a, T: BitTransport> Rx5808<'a, T> {
    pub fn new(transport: T, tuning: &'a TuningState, now_ms: u32) -> Self {
        Self {
            bus: RegisterBus::new(transport),
            tuning,
            last_write_ms: now_ms,
            powered_down: false,
        }
    }

    /// Parks the bus, resets the module and leaves it powered down.
    pub fn init(&mut self) -> Result<(), T::Error> {
        self.bus.park()?;
        self.reset_module()?;
        self.set_frequency(POWER_DOWN_FREQ_MHZ)
    }

    pub fn current_frequency(&self) -> u16 {
        self.tuning.frequency_mhz()
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    pub fn is_settling(&self) -> bool {
        self.tuning.is_settling()
    }

    pub fn last_write_ms(&self) -> u32 {
        self.last_write_ms
    }

    pub fn transport(&self) -> &T {
        self.bus.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.bus.transport_mut()
    }

    /// Periodic housekeeping: commits a changed channel once the bus is free
    /// and verifies it once the synthesizer had time to lock.
    pub fn handle_frequency_change(
        &mut self,
        now_ms: u32,
        requested_mhz: u16,
    ) -> Result<(), T::Error> {
        if self.tuning.frequency_mhz() != requested_mhz
            && now_ms.wrapping_sub(self.last_write_ms) >= MIN_BUS_TIME_MS
        {
            self.last_write_ms = now_ms;
            self.set_frequency(requested_mhz)?;
        }

        if self.tuning.is_settling() && now_ms.wrapping_sub(self.last_write_ms) >= MIN_TUNE_TIME_MS
        {
            self.last_write_ms = now_ms;
            if self.verify_frequency()? {
                self.tuning.mark_settled();
            } else {
                warn!("rx5808: frequency verification failed, retrying");
            }
        }

        Ok(())
    }

    pub fn set_frequency(&mut self, freq_mhz: u16) -> Result<(), T::Error> {
        if self.tuning.frequency_mhz() == freq_mhz {
            debug!("rx5808: already on {} MHz", freq_mhz);
            return Ok(());
        }

        let result = if freq_mhz == POWER_DOWN_FREQ_MHZ {
            self.power_down()
        } else {
            self.tune(freq_mhz)
        };
        if result.is_err() {
            self.tuning.invalidate();
        }
        result
    }

    /// Reads back the frequency register and compares it with the channel
    /// that was last programmed.
    pub fn verify_frequency(&mut self) -> Result<bool, T::Error> {
        let register = self.bus.read_register(REG_FREQUENCY)?;
        self.bus.settle_ms(protocol::FRAME_SETTLE_MS);

        let current = self.tuning.frequency_mhz();
        let expected = frequency_to_register(current);
        if register != expected {
            debug!(
                "rx5808: register {:#06x} does not match {:#06x} for {} MHz",
                register, expected, current
            );
            return Ok(false);
        }
        debug!("rx5808: {} MHz verified", current);
        Ok(true)
    }

    fn tune(&mut self, freq_mhz: u16) -> Result<(), T::Error> {
        self.tuning.begin_retune(freq_mhz);

        if self.powered_down {
            self.reset_module()?;
            self.powered_down = false;
            self.bus.settle_ms(WAKE_SETTLE_MS);
        }

        let register = frequency_to_register(freq_mhz);
        debug!("rx5808: tuning {} MHz, register {:#06x}", freq_mhz, register);
        self.bus.write_register(REG_FREQUENCY, u32::from(register))?;
        self.bus.settle_ms(protocol::FRAME_SETTLE_MS);
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), T::Error> {
        debug!("rx5808: powering down");
        self.bus.write_register(REG_POWER, POWER_DOWN_MASK)?;
        self.powered_down = true;
        self.tuning.mark_powered_down(POWER_DOWN_FREQ_MHZ);
        Ok(())
    }

    /// Clears the state register, then reapplies the normal power options.
    fn reset_module(&mut self) -> Result<(), T::Error> {
        self.bus.write_register(REG_STATE, 0)?;
        self.bus.write_register(REG_POWER, POWER_NORMAL_MASK)
    }
}

/// Raw 12-bit analog reading of the RSSI pin.
pub trait AnalogSource {
    fn read_raw(&mut self) -> u16;
}

/// Amplitude feed for the lap timer.
pub trait RssiSource {
    fn read_rssi(&mut self) -> u8;
}

/// RSSI readout gated by the shared tuning state.
pub struct RssiInput<'a, A> {
    adc: A,
    tuning: &'a TuningState,
}

impl<'a, A: AnalogSource> RssiInput<'a, A> {
    pub fn new(adc: A, tuning: &'a TuningState) -> Self {
        Self { adc, tuning }
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}

impl<A: AnalogSource> RssiSource for RssiInput<'_, A> {
    /// Zero while the channel is unverified; the output is unstable after a retune.
    fn read_rssi(&mut self) -> u8 {
        if self.tuning.is_settling() {
            return 0;
        }
        scale_rssi(self.adc.read_raw())
    }
}

pub fn scale_rssi(raw: u16) -> u8 {
    (raw.min(RSSI_ADC_CLAMP) >> RSSI_SHIFT) as u8
}

#[cfg(test)]
mod tests;
