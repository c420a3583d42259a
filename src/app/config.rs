use core::sync::atomic::AtomicU32;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use gatetimer::{config::GATE_CONFIG, rx5808::TuningState};

use super::types::{ConsoleEvent, IndicatorPulse, TimerCommand};

pub(crate) const UART_BAUD: u32 = 115_200;
pub(crate) const HOUSEKEEPING_INTERVAL_MS: u64 = 1;
pub(crate) const CONSOLE_POLL_MS: u64 = 10;
/// The on-board LED lights when driven low.
pub(crate) const LED_ACTIVE_LOW: bool = true;

pub(crate) static TUNING: TuningState = TuningState::new();
/// Channel the housekeeping task converges the receiver to.
pub(crate) static REQUESTED_FREQUENCY_MHZ: AtomicU32 =
    AtomicU32::new(GATE_CONFIG.frequency_mhz as u32);

pub(crate) static TIMER_COMMANDS: Channel<CriticalSectionRawMutex, TimerCommand, 4> =
    Channel::new();
pub(crate) static INDICATOR_PULSES: Channel<CriticalSectionRawMutex, IndicatorPulse, 8> =
    Channel::new();
pub(crate) static CONSOLE_EVENTS: Channel<CriticalSectionRawMutex, ConsoleEvent, 8> =
    Channel::new();
