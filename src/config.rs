//! Read-only gate settings consumed by the lap timer and the receiver driver.
//!
//! Defaults are compiled from `config/gate.toml` by `build.rs`.

pub const CALIBRATION_SAMPLES_MIN: u16 = 10;
pub const CALIBRATION_SAMPLES_MAX: u16 = 200;

/// Drone size class; the gate diameter follows from it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum DroneSize {
    TwoInch,
    #[default]
    FiveInch,
}

impl DroneSize {
    /// Unknown classes fall back to 5".
    pub fn from_inches(inches: u8) -> Self {
        match inches {
            2 => Self::TwoInch,
            _ => Self::FiveInch,
        }
    }

    pub fn inches(self) -> u8 {
        match self {
            Self::TwoInch => 2,
            Self::FiveInch => 5,
        }
    }

    pub fn gate_diameter_mm(self) -> u16 {
        match self {
            Self::TwoInch => 1500,
            Self::FiveInch => 3000,
        }
    }
}

/// Which crossing confirmation rule the firmware wires in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum CrossingPolicyKind {
    #[default]
    PeakDrop,
    ExitThreshold,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FilterConfig {
    pub measurement_noise_raw: u16,
    pub process_noise_raw: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GateConfig {
    pub frequency_mhz: u16,
    pub enter_rssi: u8,
    pub exit_rssi: u8,
    pub drone_size: DroneSize,
    /// Minimum lap time in tenths of a second.
    pub min_lap_tenths: u16,
    pub policy: CrossingPolicyKind,
    pub hole_shot_min_delta: Option<u8>,
    pub min_lap_guard: bool,
    pub skip_hole_shot: bool,
    pub filter: FilterConfig,
    pub calibration_samples: u16,
}

include!(concat!(env!("OUT_DIR"), "/gate_config.rs"));

pub fn active_config() -> &'static GateConfig {
    &GATE_CONFIG
}

impl Default for GateConfig {
    fn default() -> Self {
        GATE_CONFIG
    }
}

/// Settings the lap timer reads on every tick.
pub trait TimerSettings {
    fn enter_rssi(&self) -> u8;
    fn exit_rssi(&self) -> u8;
    fn gate_diameter_mm(&self) -> u16;
    fn min_lap_ms(&self) -> u32;
    fn calibration_samples(&self) -> u16;

    /// Minimum drop used while waiting for the hole shot. `None` keeps the gate delta.
    fn hole_shot_min_delta(&self) -> Option<u8> {
        None
    }

    /// Hold off peak capture in `Running` until `min_lap_ms` has passed.
    fn min_lap_guard(&self) -> bool {
        false
    }

    /// `start()` goes straight to `Running` and times from the start call.
    fn skip_hole_shot(&self) -> bool {
        false
    }

    fn crossing_policy(&self) -> CrossingPolicyKind {
        CrossingPolicyKind::PeakDrop
    }
}

impl TimerSettings for GateConfig {
    fn enter_rssi(&self) -> u8 {
        self.enter_rssi
    }

    fn exit_rssi(&self) -> u8 {
        self.exit_rssi
    }

    fn gate_diameter_mm(&self) -> u16 {
        self.drone_size.gate_diameter_mm()
    }

    fn min_lap_ms(&self) -> u32 {
        u32::from(self.min_lap_tenths) * 100
    }

    fn calibration_samples(&self) -> u16 {
        self.calibration_samples
            .clamp(CALIBRATION_SAMPLES_MIN, CALIBRATION_SAMPLES_MAX)
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

impl<T: TimerSettings + ?Sized> TimerSettings for &T {
    fn enter_rssi(&self) -> u8 {
        (**self).enter_rssi()
    }

    fn exit_rssi(&self) -> u8 {
        (**self).exit_rssi()
    }

    fn gate_diameter_mm(&self) -> u16 {
        (**self).gate_diameter_mm()
    }

    fn min_lap_ms(&self) -> u32 {
        (**self).min_lap_ms()
    }

    fn calibration_samples(&self) -> u16 {
        (**self).calibration_samples()
    }

    fn hole_shot_min_delta(&self) -> Option<u8> {
        (**self).hole_shot_min_delta()
    }

    fn min_lap_guard(&self) -> bool {
        (**self).min_lap_guard()
    }

    fn skip_hole_shot(&self) -> bool {
        (**self).skip_hole_shot()
    }

    fn crossing_policy(&self) -> CrossingPolicyKind {
        (**self).crossing_policy()
    }
}

/// Per-tick copy of the settings handed to the detection state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DetectionSettings {
    pub enter_rssi: u8,
    pub exit_rssi: u8,
    pub gate_diameter_mm: u16,
    pub min_lap_ms: u32,
    pub hole_shot_min_delta: Option<u8>,
    pub min_lap_guard: bool,
    pub skip_hole_shot: bool,
}

impl DetectionSettings {
    pub fn capture<S: TimerSettings + ?Sized>(settings: &S) -> Self {
        Self {
            enter_rssi: settings.enter_rssi(),
            exit_rssi: settings.exit_rssi(),
            gate_diameter_mm: settings.gate_diameter_mm(),
            min_lap_ms: settings.min_lap_ms(),
            hole_shot_min_delta: settings.hole_shot_min_delta(),
            min_lap_guard: settings.min_lap_guard(),
            skip_hole_shot: settings.skip_hole_shot(),
        }
    }

    /// Smaller gates need a larger confirmed drop to reject noise.
    pub fn gate_min_delta(&self) -> u8 {
        min_delta_for_gate(self.gate_diameter_mm)
    }
}

pub fn min_delta_for_gate(gate_diameter_mm: u16) -> u8 {
    if gate_diameter_mm <= 1500 {
        10
    } else {
        6
    }
}
