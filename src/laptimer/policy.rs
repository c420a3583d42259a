//! Crossing confirmation rules.
//!
//! Revisions of the gate firmware disagreed on when a crossing is confirmed,
//! so the rule is injected into the timer and chosen by configuration.

use crate::config::{CrossingPolicyKind, DetectionSettings};

use super::types::{CrossingCandidate, TimerState};

pub trait CrossingPolicy {
    /// True once `sample` confirms that the drone passed the candidate peak.
    fn confirm_crossing(
        &self,
        sample: u8,
        candidate: &CrossingCandidate,
        state: TimerState,
        settings: &DetectionSettings,
    ) -> bool;
}

/// Confirms once the signal fell a minimum delta below the tracked peak.
///
/// The delta follows the gate size. While waiting for the hole shot an
/// optional separate delta applies.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeakDropPolicy;

impl PeakDropPolicy {
    pub fn min_delta(state: TimerState, settings: &DetectionSettings) -> u8 {
        match (state, settings.hole_shot_min_delta) {
            (TimerState::Waiting, Some(delta)) => delta,
            _ => settings.gate_min_delta(),
        }
    }
}

impl CrossingPolicy for PeakDropPolicy {
    fn confirm_crossing(
        &self,
        sample: u8,
        candidate: &CrossingCandidate,
        state: TimerState,
        settings: &DetectionSettings,
    ) -> bool {
        sample < candidate.peak && candidate.peak - sample >= Self::min_delta(state, settings)
    }
}

/// Confirms once the signal dropped under the fixed exit threshold.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExitThresholdPolicy;

impl CrossingPolicy for ExitThresholdPolicy {
    fn confirm_crossing(
        &self,
        sample: u8,
        candidate: &CrossingCandidate,
        _state: TimerState,
        settings: &DetectionSettings,
    ) -> bool {
        sample < candidate.peak && sample < settings.exit_rssi
    }
}

static PEAK_DROP: PeakDropPolicy = PeakDropPolicy;
static EXIT_THRESHOLD: ExitThresholdPolicy = ExitThresholdPolicy;

pub fn policy_for(kind: CrossingPolicyKind) -> &'static dyn CrossingPolicy {
    match kind {
        CrossingPolicyKind::PeakDrop => &PEAK_DROP,
        CrossingPolicyKind::ExitThreshold => &EXIT_THRESHOLD,
    }
}
