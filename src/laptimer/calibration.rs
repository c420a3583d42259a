//! Operator calibration helpers.
//!
//! Sessions only observe the filtered stream. Detection never reads them.

use crate::config::DroneSize;

/// Fraction of the observed signal swing the operator expects to lose at the
/// edge of the gate.
pub const DEFAULT_DROP_FRACTION: f32 = 0.3;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CalibrationSession {
    active: bool,
    max: u8,
    samples: u16,
}

impl CalibrationSession {
    pub fn start(&mut self) {
        *self = Self {
            active: true,
            ..Self::default()
        };
    }

    /// Ends the session and returns the highest amplitude seen.
    pub fn stop(&mut self) -> u8 {
        self.active = false;
        self.max
    }

    pub fn observe(&mut self, amplitude: u8) {
        if !self.active {
            return;
        }
        self.samples = self.samples.saturating_add(1);
        if amplitude > self.max {
            self.max = amplitude;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn samples(&self) -> u16 {
        self.samples
    }

    pub fn snapshot(&self, target: u16) -> CalibrationSnapshot {
        CalibrationSnapshot {
            active: self.active,
            max: self.max,
            samples: self.samples,
            target,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CalibrationSnapshot {
    pub active: bool,
    pub max: u8,
    pub samples: u16,
    pub target: u16,
}

impl CalibrationSnapshot {
    pub fn target_reached(&self) -> bool {
        self.samples >= self.target
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThresholdRecommendation {
    pub enter_rssi: u8,
    pub exit_rssi: u8,
    /// Smallest swing above the noise floor the gate size warrants.
    pub min_delta: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Tuning {
    enter_ratio: f32,
    exit_ratio: f32,
    min_delta: u8,
    estimated_delta: u8,
}

fn tuning_for(drone_size: DroneSize, drop_fraction: f32) -> Tuning {
    let diameter_m = f32::from(drone_size.gate_diameter_mm()) / 1000.0;
    let correction = 1.0 + (1.0 - diameter_m / 1.5) * 0.3;

    let enter_base = (1.0 - drop_fraction * 0.7).clamp(0.55, 0.8);
    let exit_base = (1.0 - drop_fraction * 1.3).clamp(0.2, 0.7);
    let min_delta = libm::roundf(25.0 * (1.5 / diameter_m)).clamp(10.0, 35.0) as u8;

    Tuning {
        enter_ratio: (enter_base * correction).clamp(0.65, 0.9),
        exit_ratio: (exit_base * correction).clamp(0.3, 0.8),
        min_delta,
        estimated_delta: min_delta.saturating_add(15).clamp(20, 50),
    }
}

/// Suggests enter/exit thresholds from a noise floor and, when a crossing
/// run was recorded, the peak seen while flying through the gate.
///
/// Without a peak the swing is estimated from the gate size. The enter
/// threshold always ends up above the exit threshold unless both saturate.
pub fn recommend_thresholds(
    noise: u8,
    peak: Option<u8>,
    drone_size: DroneSize,
    drop_fraction: f32,
) -> ThresholdRecommendation {
    let tuning = tuning_for(drone_size, drop_fraction);
    let swing = peak.map_or(tuning.estimated_delta, |peak| peak.saturating_sub(noise));
    let effective = f32::from(swing.max(tuning.min_delta));

    let level = |ratio: f32| libm::roundf(f32::from(noise) + effective * ratio).clamp(0.0, 255.0) as u8;
    let exit_rssi = level(tuning.exit_ratio);
    let mut enter_rssi = level(tuning.enter_ratio);
    if enter_rssi <= exit_rssi {
        enter_rssi = exit_rssi.saturating_add(10);
    }

    ThresholdRecommendation {
        enter_rssi,
        exit_rssi,
        min_delta: tuning.min_delta,
    }
}
