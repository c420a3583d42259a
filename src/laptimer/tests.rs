use super::*;
use crate::config::CrossingPolicyKind;
use crate::rx5808::{RssiInput, TuningState};

#[derive(Clone, Copy, Debug)]
struct TestSettings {
    enter_rssi: u8,
    exit_rssi: u8,
    gate_diameter_mm: u16,
    min_lap_ms: u32,
    calibration_samples: u16,
    hole_shot_min_delta: Option<u8>,
    min_lap_guard: bool,
    skip_hole_shot: bool,
    policy: CrossingPolicyKind,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            enter_rssi: 120,
            exit_rssi: 100,
            gate_diameter_mm: 3000,
            min_lap_ms: 10_000,
            calibration_samples: 20,
            hole_shot_min_delta: None,
            min_lap_guard: false,
            skip_hole_shot: false,
            policy: CrossingPolicyKind::PeakDrop,
        }
    }
}

impl TimerSettings for TestSettings {
    fn enter_rssi(&self) -> u8 {
        self.enter_rssi
    }

    fn exit_rssi(&self) -> u8 {
        self.exit_rssi
    }

    fn gate_diameter_mm(&self) -> u16 {
        self.gate_diameter_mm
    }

    fn min_lap_ms(&self) -> u32 {
        self.min_lap_ms
    }

    fn calibration_samples(&self) -> u16 {
        self.calibration_samples
    }

    fn hole_shot_min_delta(&self) -> Option<u8> {
        self.hole_shot_min_delta
    }

    fn min_lap_guard(&self) -> bool {
        self.min_lap_guard
    }

    fn skip_hole_shot(&self) -> bool {
        self.skip_hole_shot
    }

    fn crossing_policy(&self) -> CrossingPolicyKind {
        self.policy
    }
}

struct ConstantSource(u8);

impl RssiSource for ConstantSource {
    fn read_rssi(&mut self) -> u8 {
        self.0
    }
}

#[derive(Default)]
struct RecordingNotifier {
    pulses: Vec<(Indicator, u32)>,
}

#[derive(Default)]
struct RecordingObserver {
    laps: Vec<u32>,
}

impl Notifier for RecordingNotifier {
    fn pulse(&mut self, indicator: Indicator, duration_ms: u32) {
        self.pulses.push((indicator, duration_ms));
    }
}

impl LapObserver for RecordingObserver {
    fn lap_completed(&mut self, lap_ms: u32) {
        self.laps.push(lap_ms);
    }
}

type TestTimer = LapTimer<ConstantSource, TestSettings, RecordingNotifier>;

fn timer_with(settings: TestSettings) -> TestTimer {
    LapTimer::new(
        ConstantSource(0),
        settings,
        RecordingNotifier::default(),
        KalmanFilter::new(2000, 40),
    )
}

fn timer() -> TestTimer {
    timer_with(TestSettings::default())
}

fn feed<R, S, N, O>(timer: &mut LapTimer<R, S, N, O>, samples: &[(u32, u8)])
where
    R: RssiSource,
    S: TimerSettings,
    N: Notifier,
    O: LapObserver,
{
    for &(now_ms, amplitude) in samples {
        timer.record_sample(now_ms, amplitude);
    }
}

fn pulses_of(notifier: &RecordingNotifier, duration_ms: u32) -> usize {
    notifier
        .pulses
        .iter()
        .filter(|(_, duration)| *duration == duration_ms)
        .count()
}

#[test]
fn hole_shot_confirms_at_the_drop_and_times_from_the_peak() {
    let mut timer = timer();
    timer.start(0);

    let samples = [50u8, 50, 130, 128, 100, 95, 90];
    let mut transitions = Vec::new();
    for (index, amplitude) in samples.iter().enumerate() {
        let before = timer.state();
        timer.record_sample(index as u32 * 10, *amplitude);
        if before != timer.state() {
            transitions.push((index, before, timer.state()));
        }
    }

    assert_eq!(
        transitions,
        vec![(4, TimerState::Waiting, TimerState::Running)]
    );
    assert_eq!(timer.lap_started_at_ms(), 20);
    assert!(!timer.is_lap_available());
    assert_eq!(pulses_of(timer.notifier(), LAP_START_PULSE_MS), 2);
}

#[test]
fn start_resets_cursors_and_availability() {
    let mut timer = timer();
    timer.start(0);
    feed(&mut timer, &[(100, 130), (110, 100), (2_000, 140), (2_010, 120)]);
    assert!(timer.is_lap_available());
    assert_eq!(timer.lap_cursor(), 1);

    timer.start(3_000);

    assert_eq!(timer.state(), TimerState::Waiting);
    assert_eq!(timer.sample_cursor(), 0);
    assert_eq!(timer.lap_cursor(), 0);
    assert!(!timer.is_lap_available());
    assert_eq!(timer.candidate(), CrossingCandidate::default());
}

#[test]
fn start_and_stop_pulse_both_indicators() {
    let mut timer = timer();
    timer.start(0);
    timer.stop();

    let expected = vec![
        (Indicator::Audible, START_STOP_PULSE_MS),
        (Indicator::Visual, START_STOP_PULSE_MS),
        (Indicator::Audible, START_STOP_PULSE_MS),
        (Indicator::Visual, START_STOP_PULSE_MS),
    ];
    assert_eq!(timer.notifier().pulses, expected);
    assert_eq!(timer.state(), TimerState::Stopped);
}

#[test]
fn running_lap_is_peak_to_peak() {
    let mut timer = timer();
    timer.start(0);
    feed(&mut timer, &[(100, 130), (110, 100), (2_000, 140), (2_010, 120)]);

    assert_eq!(timer.state(), TimerState::Running);
    assert_eq!(timer.lap_started_at_ms(), 2_000);
    assert_eq!(timer.lap_time(), 1_900);
}

#[test]
fn lap_time_clears_availability_and_repeats_stale_value() {
    let mut timer = timer();
    timer.start(0);
    feed(&mut timer, &[(100, 130), (110, 100), (2_000, 140), (2_010, 120)]);

    assert!(timer.is_lap_available());
    assert_eq!(timer.lap_time(), 1_900);
    assert!(!timer.is_lap_available());
    assert_eq!(timer.lap_time(), 1_900);
    assert!(!timer.is_lap_available());
}

#[test]
fn crossing_is_not_confirmed_before_the_full_drop() {
    let mut timer = timer();
    timer.start(0);

    feed(&mut timer, &[(0, 120), (10, 130), (20, 140), (30, 135)]);
    assert_eq!(timer.state(), TimerState::Waiting);
    assert_eq!(timer.candidate().peak, 140);

    timer.record_sample(40, 134);
    assert_eq!(timer.state(), TimerState::Running);
    assert_eq!(timer.lap_started_at_ms(), 20);
}

#[test]
fn samples_below_enter_threshold_never_arm_a_candidate() {
    let mut timer = timer();
    timer.start(0);
    feed(&mut timer, &[(0, 119), (10, 60), (20, 119), (30, 10)]);

    assert_eq!(timer.state(), TimerState::Waiting);
    assert_eq!(timer.candidate(), CrossingCandidate::default());
}

#[test]
fn small_gate_needs_a_larger_drop() {
    let mut timer = timer_with(TestSettings {
        gate_diameter_mm: 1500,
        ..TestSettings::default()
    });
    timer.start(0);

    feed(&mut timer, &[(0, 150), (10, 142)]);
    assert_eq!(timer.state(), TimerState::Waiting);
    timer.record_sample(20, 140);
    assert_eq!(timer.state(), TimerState::Running);
}

#[test]
fn hole_shot_delta_applies_only_while_waiting() {
    let mut timer = timer_with(TestSettings {
        hole_shot_min_delta: Some(4),
        ..TestSettings::default()
    });
    timer.start(0);

    feed(&mut timer, &[(0, 130), (10, 126)]);
    assert_eq!(timer.state(), TimerState::Running);

    feed(&mut timer, &[(1_000, 150), (1_010, 146)]);
    assert!(!timer.is_lap_available());
    timer.record_sample(1_020, 144);
    assert_eq!(timer.lap_time(), 1_000);
}

#[test]
fn exit_threshold_policy_waits_for_exit_level() {
    let mut timer = timer_with(TestSettings {
        policy: CrossingPolicyKind::ExitThreshold,
        ..TestSettings::default()
    });
    timer.start(0);

    feed(&mut timer, &[(0, 130), (10, 110), (20, 101)]);
    assert_eq!(timer.state(), TimerState::Waiting);
    timer.record_sample(30, 99);
    assert_eq!(timer.state(), TimerState::Running);
    assert_eq!(timer.lap_started_at_ms(), 0);
}

#[test]
fn min_lap_guard_ignores_early_peaks() {
    let script = [
        (0, 130),
        (10, 100),
        (500, 150),
        (510, 100),
        (1_100, 150),
        (1_110, 100),
    ];

    let mut guarded = timer_with(TestSettings {
        min_lap_ms: 1_000,
        min_lap_guard: true,
        ..TestSettings::default()
    });
    guarded.start(0);
    feed(&mut guarded, &script);
    assert_eq!(guarded.laps().collect::<Vec<_>>(), vec![1_100]);

    let mut unguarded = timer_with(TestSettings {
        min_lap_ms: 1_000,
        ..TestSettings::default()
    });
    unguarded.start(0);
    feed(&mut unguarded, &script);
    assert_eq!(unguarded.laps().collect::<Vec<_>>(), vec![500, 600]);
}

#[test]
fn skipping_hole_shot_times_from_start() {
    let mut timer = timer_with(TestSettings {
        skip_hole_shot: true,
        ..TestSettings::default()
    });
    timer.start(1_000);
    assert_eq!(timer.state(), TimerState::Running);
    assert_eq!(timer.lap_started_at_ms(), 1_000);

    feed(&mut timer, &[(1_500, 130), (1_510, 100)]);
    assert_eq!(timer.lap_time(), 500);
}

#[test]
fn stop_discards_detection_and_ignores_samples() {
    let mut timer = timer();
    timer.start(0);
    feed(&mut timer, &[(100, 130), (110, 100), (500, 140)]);

    timer.stop();
    feed(&mut timer, &[(600, 100), (700, 200), (800, 10)]);

    assert_eq!(timer.state(), TimerState::Stopped);
    assert_eq!(timer.lap_count(), 0);
    assert_eq!(timer.candidate(), CrossingCandidate::default());
    assert_eq!(timer.rssi(), 10);
}

#[test]
fn observer_sees_each_lap_synchronously() {
    let mut timer = timer().with_observer(RecordingObserver::default());
    timer.start(0);
    feed(
        &mut timer,
        &[
            (100, 130),
            (110, 100),
            (1_300, 140),
            (1_310, 120),
            (2_450, 150),
            (2_460, 100),
        ],
    );

    assert_eq!(timer.observer().laps, vec![1_200, 1_150]);
    assert_eq!(timer.lap_count(), 2);
}

#[test]
fn sample_history_wraps_and_overwrites_oldest() {
    let mut timer = timer();
    timer.start(0);
    for i in 0..=SAMPLE_HISTORY_LEN as u32 {
        timer.record_sample(i, (i % 100) as u8 + 1);
    }

    assert_eq!(timer.sample_cursor(), 1);
    let history: Vec<u8> = timer.samples().iter().collect();
    assert_eq!(history.len(), SAMPLE_HISTORY_LEN);
    assert_eq!(history.first(), Some(&2));
    assert_eq!(history.last(), Some(&1));
    assert_eq!(timer.rssi(), 1);
}

#[test]
fn lap_history_wraps_and_overwrites_oldest() {
    let mut laps = LapHistory::new();
    for lap in 0..=LAP_HISTORY_LEN as u32 {
        laps.push(1_000 + lap);
    }

    assert_eq!(laps.cursor(), 1);
    assert_eq!(laps.len(), LAP_HISTORY_LEN);
    assert_eq!(laps.latest(), 1_000 + LAP_HISTORY_LEN as u32);
    assert!(laps.iter().all(|lap| lap != 1_000));
}

#[test]
fn lap_cursor_wraps_through_the_timer() {
    let mut timer = timer();
    timer.start(0);
    timer.record_sample(0, 130);
    timer.record_sample(1, 100);

    let mut peak_at = 0u32;
    for lap in 0..=LAP_HISTORY_LEN as u32 {
        peak_at += 1_000 + lap;
        feed(&mut timer, &[(peak_at, 140), (peak_at + 1, 100)]);
    }

    assert_eq!(timer.lap_cursor(), 1);
    assert_eq!(timer.lap_count(), LAP_HISTORY_LEN);
    assert_eq!(timer.lap_time(), 1_000 + LAP_HISTORY_LEN as u32);
    assert_eq!(timer.laps().next(), Some(1_001));
}

#[test]
fn noise_calibration_reports_max_and_count() {
    let mut timer = timer();
    timer.start_noise_calibration();
    for (i, amplitude) in (5u8..=24).enumerate() {
        timer.record_sample(i as u32, amplitude);
    }

    assert_eq!(timer.stop_noise_calibration(), 24);
    let snapshot = timer.noise_calibration();
    assert_eq!(snapshot.samples, 20);
    assert_eq!(snapshot.max, 24);
    assert!(snapshot.target_reached());
    assert!(!snapshot.active);
    assert_eq!(pulses_of(timer.notifier(), CALIBRATION_PULSE_MS), 2);
}

#[test]
fn crossing_calibration_runs_alongside_detection() {
    let mut calibrating = timer();
    calibrating.start(0);
    calibrating.start_crossing_calibration();
    feed(&mut calibrating, &[(0, 50), (10, 130), (20, 100)]);

    let mut plain = timer();
    plain.start(0);
    feed(&mut plain, &[(0, 50), (10, 130), (20, 100)]);

    assert_eq!(calibrating.state(), plain.state());
    assert_eq!(calibrating.lap_started_at_ms(), plain.lap_started_at_ms());
    assert_eq!(calibrating.crossing_calibration().max, 130);
    assert_eq!(calibrating.crossing_calibration().samples, 3);
    assert_eq!(calibrating.noise_calibration().samples, 0);
    assert_eq!(calibrating.stop_crossing_calibration(), 130);
}

#[test]
fn tick_filters_the_source_reading() {
    let mut timer = LapTimer::new(
        ConstantSource(90),
        TestSettings::default(),
        RecordingNotifier::default(),
        KalmanFilter::new(2000, 40),
    );
    timer.start(0);
    for now_ms in 0..5 {
        timer.handle_tick(now_ms);
    }

    assert_eq!(timer.rssi(), 90);
    assert_eq!(timer.sample_cursor(), 5);
}

#[test]
fn tick_reads_through_the_receiver_input() {
    struct Adc;
    impl crate::rx5808::AnalogSource for Adc {
        fn read_raw(&mut self) -> u16 {
            2047
        }
    }

    let tuning = TuningState::new();
    let mut timer = LapTimer::new(
        RssiInput::new(Adc, &tuning),
        TestSettings::default(),
        RecordingNotifier::default(),
        KalmanFilter::new(2000, 40),
    );
    timer.start(0);
    timer.handle_tick(0);
    assert!(!tuning.is_settling());
    assert_eq!(timer.rssi(), 255);
}

struct NeverConfirm;

impl CrossingPolicy for NeverConfirm {
    fn confirm_crossing(
        &self,
        _sample: u8,
        _candidate: &CrossingCandidate,
        _state: TimerState,
        _settings: &DetectionSettings,
    ) -> bool {
        false
    }
}

static NEVER_CONFIRM: NeverConfirm = NeverConfirm;

#[test]
fn custom_policy_replaces_configured_rule() {
    let mut timer = timer().with_policy(&NEVER_CONFIRM);
    timer.start(0);
    feed(&mut timer, &[(0, 200), (10, 20), (20, 0)]);

    assert_eq!(timer.state(), TimerState::Waiting);
    assert_eq!(timer.candidate().peak, 200);
}
