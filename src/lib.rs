#![cfg_attr(not(test), no_std)]

//! RF race-gate timing core: RX5808 channel control, RSSI filtering and lap
//! detection. Hardware access goes through small traits so the whole core
//! runs under host tests; the ESP32 shell lives in the `firmware` binary.

pub mod config;
pub mod console;
pub mod filter;
pub mod laptimer;
pub mod platform;
pub mod rx5808;

pub use config::{active_config, GateConfig, TimerSettings};
pub use filter::KalmanFilter;
pub use laptimer::{LapObserver, LapTimer, Notifier, TimerState};
pub use rx5808::{Rx5808, TuningState};
