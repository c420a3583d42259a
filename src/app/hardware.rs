use esp_hal::gpio::Output;
use gatetimer::{
    laptimer::{Indicator, LapObserver, Notifier},
    rx5808::AnalogSource,
};
use log::warn;

use super::{
    config::{CONSOLE_EVENTS, INDICATOR_PULSES},
    types::{ConsoleEvent, IndicatorPulse, RssiAdc, RssiPin},
};

pub(crate) struct AdcRssi {
    adc: RssiAdc,
    pin: RssiPin,
}

impl AdcRssi {
    pub(crate) fn new(adc: RssiAdc, pin: RssiPin) -> Self {
        Self { adc, pin }
    }
}

impl AnalogSource for AdcRssi {
    fn read_raw(&mut self) -> u16 {
        // A failed conversion reads as no signal.
        nb::block!(self.adc.read_oneshot(&mut self.pin)).unwrap_or(0)
    }
}

/// Forwards pulses to the housekeeping task that owns the buzzer and LED.
pub(crate) struct ChannelNotifier;

impl Notifier for ChannelNotifier {
    fn pulse(&mut self, indicator: Indicator, duration_ms: u32) {
        if INDICATOR_PULSES
            .try_send(IndicatorPulse {
                indicator,
                duration_ms,
            })
            .is_err()
        {
            warn!("indicator: pulse queue full, dropping {:?}", indicator);
        }
    }
}

#[derive(Default)]
pub(crate) struct ChannelObserver {
    completed: u32,
}

impl LapObserver for ChannelObserver {
    fn lap_completed(&mut self, lap_ms: u32) {
        self.completed = self.completed.wrapping_add(1);
        let event = ConsoleEvent::Lap {
            number: self.completed,
            lap_ms,
        };
        if CONSOLE_EVENTS.try_send(event).is_err() {
            warn!("console: event queue full, lap {} not reported", self.completed);
        }
    }
}

impl ChannelObserver {
    pub(crate) fn reset(&mut self) {
        self.completed = 0;
    }
}

/// Drives one indicator output for the duration of the latest pulse.
pub(crate) struct IndicatorOutput {
    pin: Output<'static>,
    active_low: bool,
    off_at_ms: Option<u32>,
}

impl IndicatorOutput {
    pub(crate) fn new(pin: Output<'static>, active_low: bool) -> Self {
        let mut output = Self {
            pin,
            active_low,
            off_at_ms: None,
        };
        output.drive(false);
        output
    }

    pub(crate) fn pulse(&mut self, now_ms: u32, duration_ms: u32) {
        self.off_at_ms = Some(now_ms.wrapping_add(duration_ms));
        self.drive(true);
    }

    pub(crate) fn update(&mut self, now_ms: u32) {
        let Some(off_at_ms) = self.off_at_ms else {
            return;
        };
        if (now_ms.wrapping_sub(off_at_ms) as i32) >= 0 {
            self.off_at_ms = None;
            self.drive(false);
        }
    }

    fn drive(&mut self, on: bool) {
        if on != self.active_low {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
