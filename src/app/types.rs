use esp_hal::{
    analog::adc::{Adc, AdcPin},
    gpio::{Flex, Output},
    peripherals::{ADC1, GPIO33},
    uart::Uart,
    Async, Blocking,
};
use gatetimer::{
    laptimer::{Indicator, LapTimer},
    platform::{BusyDelay, GpioBus},
    rx5808::{Rx5808, RssiInput},
    GateConfig,
};

pub(crate) type SerialUart = Uart<'static, Async>;
pub(crate) type ReceiverBus = GpioBus<Flex<'static>, Output<'static>, Output<'static>, BusyDelay>;
pub(crate) type ReceiverDriver = Rx5808<'static, ReceiverBus>;
pub(crate) type RssiPin = AdcPin<GPIO33<'static>, ADC1<'static>>;
pub(crate) type RssiAdc = Adc<'static, ADC1<'static>, Blocking>;
pub(crate) type GateTimer = LapTimer<
    RssiInput<'static, super::hardware::AdcRssi>,
    &'static GateConfig,
    super::hardware::ChannelNotifier,
    super::hardware::ChannelObserver,
>;

#[derive(Clone, Copy, Debug)]
pub(crate) enum TimerCommand {
    Start,
    Stop,
    NoiseCalibration { active: bool },
    CrossingCalibration { active: bool },
    Status,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct IndicatorPulse {
    pub indicator: Indicator,
    pub duration_ms: u32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum ConsoleEvent {
    Lap { number: u32, lap_ms: u32 },
    CalibrationResult { crossing: bool, max: u8, samples: u16 },
    Status {
        running: bool,
        rssi: u8,
        frequency_mhz: u16,
        laps: u16,
    },
}
