//! Lap detection: filters the RSSI stream, tracks crossing candidates and
//! turns confirmed crossings into lap times.

pub mod calibration;
mod machine;
pub mod policy;
pub mod types;

use log::{debug, info};

use crate::{
    config::{DetectionSettings, TimerSettings},
    filter::KalmanFilter,
    rx5808::RssiSource,
};

pub use calibration::{
    recommend_thresholds, CalibrationSession, CalibrationSnapshot, ThresholdRecommendation,
    DEFAULT_DROP_FRACTION,
};
pub use policy::{policy_for, CrossingPolicy, ExitThresholdPolicy, PeakDropPolicy};
pub use types::{
    ActionBuffer, CrossingCandidate, LapHistory, SampleHistory, TimerAction, TimerState,
    LAP_HISTORY_LEN, SAMPLE_HISTORY_LEN,
};

use machine::{DetectionMachine, TimerEvent};

pub const START_STOP_PULSE_MS: u32 = 500;
pub const LAP_START_PULSE_MS: u32 = 200;
pub const CALIBRATION_PULSE_MS: u32 = 200;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Indicator {
    Audible,
    Visual,
}

/// Buzzer/LED seam. Implementations schedule a pulse and return at once.
pub trait Notifier {
    fn pulse(&mut self, indicator: Indicator, duration_ms: u32);
}

impl<T: Notifier + ?Sized> Notifier for &mut T {
    fn pulse(&mut self, indicator: Indicator, duration_ms: u32) {
        (**self).pulse(indicator, duration_ms)
    }
}

/// Called synchronously from the tick that completed a lap.
pub trait LapObserver {
    fn lap_completed(&mut self, lap_ms: u32);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoObserver;

impl LapObserver for NoObserver {
    fn lap_completed(&mut self, _lap_ms: u32) {}
}

impl<T: LapObserver + ?Sized> LapObserver for &mut T {
    fn lap_completed(&mut self, lap_ms: u32) {
        (**self).lap_completed(lap_ms)
    }
}

pub struct LapTimer<R, S, N, O = NoObserver> {
    source: R,
    settings: S,
    notifier: N,
    observer: O,
    filter: KalmanFilter,
    machine: DetectionMachine,
    samples: SampleHistory,
    laps: LapHistory,
    lap_available: bool,
    noise_calibration: CalibrationSession,
    crossing_calibration: CalibrationSession,
}

impl<R, S, N> LapTimer<R, S, N, NoObserver>
where
    R: RssiSource,
    S: TimerSettings,
    N: Notifier,
{
    pub fn new(source: R, settings: S, notifier: N, filter: KalmanFilter) -> Self {
        let policy = policy_for(settings.crossing_policy());
        Self {
            source,
            settings,
            notifier,
            observer: NoObserver,
            filter,
            machine: DetectionMachine::new(policy),
            samples: SampleHistory::new(),
            laps: LapHistory::new(),
            lap_available: false,
            noise_calibration: CalibrationSession::default(),
            crossing_calibration: CalibrationSession::default(),
        }
    }
}

impl<R, S, N, O> LapTimer<R, S, N, O>
where
    R: RssiSource,
    S: TimerSettings,
    N: Notifier,
    O: LapObserver,
{
    /// Registers the lap observer. Replaces any previous one.
    pub fn with_observer<O2: LapObserver>(self, observer: O2) -> LapTimer<R, S, N, O2> {
        LapTimer {
            source: self.source,
            settings: self.settings,
            notifier: self.notifier,
            observer,
            filter: self.filter,
            machine: self.machine,
            samples: self.samples,
            laps: self.laps,
            lap_available: self.lap_available,
            noise_calibration: self.noise_calibration,
            crossing_calibration: self.crossing_calibration,
        }
    }

    /// Swaps in a custom crossing rule. Only meaningful before `start()`;
    /// the detection state is rebuilt in `Stopped`.
    pub fn with_policy(mut self, policy: &'static dyn CrossingPolicy) -> Self {
        self.machine = DetectionMachine::new(policy);
        self
    }

    pub fn start(&mut self, now_ms: u32) {
        self.reset_history();
        self.dispatch(TimerEvent::Start { now_ms });
    }

    pub fn stop(&mut self) {
        self.reset_history();
        self.dispatch(TimerEvent::Stop);
    }

    /// One polling cycle: read, filter, record.
    pub fn handle_tick(&mut self, now_ms: u32) {
        let raw = self.source.read_rssi();
        let amplitude = self.filter.filter_amplitude(raw);
        self.record_sample(now_ms, amplitude);
    }

    /// Feeds an already filtered amplitude through storage, calibration and
    /// detection.
    pub fn record_sample(&mut self, now_ms: u32, amplitude: u8) {
        self.samples.store(amplitude);
        self.noise_calibration.observe(amplitude);
        self.crossing_calibration.observe(amplitude);
        self.dispatch(TimerEvent::Sample { now_ms, amplitude });
        self.samples.advance();
    }

    pub fn state(&self) -> TimerState {
        self.machine.state()
    }

    pub fn candidate(&self) -> CrossingCandidate {
        self.machine.candidate()
    }

    pub fn lap_started_at_ms(&self) -> u32 {
        self.machine.lap_started_at_ms()
    }

    /// Most recently stored filtered amplitude.
    pub fn rssi(&self) -> u8 {
        self.samples.latest()
    }

    pub fn samples(&self) -> &SampleHistory {
        &self.samples
    }

    pub fn sample_cursor(&self) -> usize {
        self.samples.cursor()
    }

    pub fn lap_cursor(&self) -> usize {
        self.laps.cursor()
    }

    pub fn is_lap_available(&self) -> bool {
        self.lap_available
    }

    /// Latest lap time. Clears availability; a repeated call returns the same
    /// stale value.
    pub fn lap_time(&mut self) -> u32 {
        self.lap_available = false;
        self.laps.latest()
    }

    /// Recorded laps, oldest first.
    pub fn laps(&self) -> impl Iterator<Item = u32> + '_ {
        self.laps.iter()
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn start_noise_calibration(&mut self) {
        self.noise_calibration.start();
        self.notifier.pulse(Indicator::Audible, CALIBRATION_PULSE_MS);
        debug!("laptimer: noise calibration started");
    }

    pub fn stop_noise_calibration(&mut self) -> u8 {
        let max = self.noise_calibration.stop();
        self.notifier.pulse(Indicator::Audible, CALIBRATION_PULSE_MS);
        info!(
            "laptimer: noise calibration max={} samples={}",
            max,
            self.noise_calibration.samples()
        );
        max
    }

    pub fn start_crossing_calibration(&mut self) {
        self.crossing_calibration.start();
        self.notifier.pulse(Indicator::Audible, CALIBRATION_PULSE_MS);
        debug!("laptimer: crossing calibration started");
    }

    pub fn stop_crossing_calibration(&mut self) -> u8 {
        let max = self.crossing_calibration.stop();
        self.notifier.pulse(Indicator::Audible, CALIBRATION_PULSE_MS);
        info!(
            "laptimer: crossing calibration max={} samples={}",
            max,
            self.crossing_calibration.samples()
        );
        max
    }

    pub fn noise_calibration(&self) -> CalibrationSnapshot {
        self.noise_calibration
            .snapshot(self.settings.calibration_samples())
    }

    pub fn crossing_calibration(&self) -> CalibrationSnapshot {
        self.crossing_calibration
            .snapshot(self.settings.calibration_samples())
    }

    fn reset_history(&mut self) {
        self.samples.clear();
        self.laps.clear();
        self.lap_available = false;
    }

    fn dispatch(&mut self, event: TimerEvent) {
        let settings = DetectionSettings::capture(&self.settings);
        let actions = self.machine.dispatch(event, settings);
        for action in actions.iter().copied() {
            self.apply(action);
        }
    }

    fn apply(&mut self, action: TimerAction) {
        match action {
            TimerAction::Armed { racing } => {
                debug!("laptimer: armed, racing={}", racing);
                self.pulse_both(START_STOP_PULSE_MS);
            }
            TimerAction::Stopped => {
                debug!("laptimer: stopped");
                self.pulse_both(START_STOP_PULSE_MS);
            }
            TimerAction::LapStarted { at_ms } => {
                debug!("laptimer: lap started at {} ms", at_ms);
                self.pulse_both(LAP_START_PULSE_MS);
            }
            TimerAction::LapFinished { lap_ms } => {
                self.laps.push(lap_ms);
                self.lap_available = true;
                info!("laptimer: lap {} ms", lap_ms);
                self.observer.lap_completed(lap_ms);
            }
        }
    }

    fn pulse_both(&mut self, duration_ms: u32) {
        self.notifier.pulse(Indicator::Audible, duration_ms);
        self.notifier.pulse(Indicator::Visual, duration_ms);
    }
}

#[cfg(test)]
mod tests;
