use core::sync::atomic::Ordering;

use embassy_futures::yield_now;
use embassy_time::{Duration, Instant, Ticker};
use gatetimer::{laptimer::Indicator, TimerState};
use log::{info, warn};

use super::{
    config::{
        CONSOLE_EVENTS, HOUSEKEEPING_INTERVAL_MS, INDICATOR_PULSES, REQUESTED_FREQUENCY_MHZ,
        TIMER_COMMANDS,
    },
    hardware::IndicatorOutput,
    types::{ConsoleEvent, GateTimer, ReceiverDriver, TimerCommand},
};

pub(crate) fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Sampling loop: one tick per executor pass.
#[embassy_executor::task]
pub(crate) async fn timer_task(mut timer: GateTimer) {
    loop {
        while let Ok(command) = TIMER_COMMANDS.try_receive() {
            apply_command(&mut timer, command);
        }
        timer.handle_tick(now_ms());
        yield_now().await;
    }
}

fn apply_command(timer: &mut GateTimer, command: TimerCommand) {
    match command {
        TimerCommand::Start => {
            timer.observer_mut().reset();
            timer.start(now_ms());
            info!("timer: started");
        }
        TimerCommand::Stop => {
            timer.stop();
            info!("timer: stopped");
        }
        TimerCommand::NoiseCalibration { active: true } => timer.start_noise_calibration(),
        TimerCommand::NoiseCalibration { active: false } => {
            timer.stop_noise_calibration();
            report(calibration_event(timer, false));
        }
        TimerCommand::CrossingCalibration { active: true } => timer.start_crossing_calibration(),
        TimerCommand::CrossingCalibration { active: false } => {
            timer.stop_crossing_calibration();
            report(calibration_event(timer, true));
        }
        TimerCommand::Status => report(ConsoleEvent::Status {
            running: timer.state() != TimerState::Stopped,
            rssi: timer.rssi(),
            frequency_mhz: REQUESTED_FREQUENCY_MHZ.load(Ordering::Relaxed) as u16,
            laps: timer.lap_count() as u16,
        }),
    }
}

fn calibration_event(timer: &GateTimer, crossing: bool) -> ConsoleEvent {
    let snapshot = if crossing {
        timer.crossing_calibration()
    } else {
        timer.noise_calibration()
    };
    ConsoleEvent::CalibrationResult {
        crossing,
        max: snapshot.max,
        samples: snapshot.samples,
    }
}

fn report(event: ConsoleEvent) {
    if CONSOLE_EVENTS.try_send(event).is_err() {
        warn!("console: event queue full");
    }
}

/// Frequency convergence and indicator timing.
#[embassy_executor::task]
pub(crate) async fn housekeeping_task(
    mut receiver: ReceiverDriver,
    mut buzzer: IndicatorOutput,
    mut led: IndicatorOutput,
) {
    let mut ticker = Ticker::every(Duration::from_millis(HOUSEKEEPING_INTERVAL_MS));

    loop {
        ticker.next().await;
        let now = now_ms();

        while let Ok(pulse) = INDICATOR_PULSES.try_receive() {
            match pulse.indicator {
                Indicator::Audible => buzzer.pulse(now, pulse.duration_ms),
                Indicator::Visual => led.pulse(now, pulse.duration_ms),
            }
        }
        buzzer.update(now);
        led.update(now);

        let requested = REQUESTED_FREQUENCY_MHZ.load(Ordering::Relaxed) as u16;
        if let Err(err) = receiver.handle_frequency_change(now, requested) {
            warn!("rx5808: bus error {:?}, retuning on next pass", err);
        }
    }
}
