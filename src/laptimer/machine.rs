use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use crate::config::DetectionSettings;

use super::{
    policy::CrossingPolicy,
    types::{ActionBuffer, CrossingCandidate, TimerAction, TimerState},
};

#[derive(Clone, Copy, Debug)]
pub(super) enum TimerEvent {
    Start { now_ms: u32 },
    Stop,
    Sample { now_ms: u32, amplitude: u8 },
}

pub(super) struct DispatchContext {
    pub settings: DetectionSettings,
    pub actions: ActionBuffer,
}

impl DispatchContext {
    pub fn new(settings: DetectionSettings) -> Self {
        Self {
            settings,
            actions: ActionBuffer::new(),
        }
    }

    fn push(&mut self, action: TimerAction) {
        // Capacity covers the worst case of one dispatch.
        let _ = self.actions.push(action);
    }
}

pub(super) struct DetectionMachine {
    machine: statig::blocking::StateMachine<LapHsm>,
}

impl DetectionMachine {
    pub fn new(policy: &'static dyn CrossingPolicy) -> Self {
        Self {
            machine: LapHsm::new(policy).state_machine(),
        }
    }

    pub fn dispatch(&mut self, event: TimerEvent, settings: DetectionSettings) -> ActionBuffer {
        let mut context = DispatchContext::new(settings);
        self.machine.handle_with_context(&event, &mut context);
        context.actions
    }

    pub fn state(&self) -> TimerState {
        self.machine.inner().state_id
    }

    pub fn candidate(&self) -> CrossingCandidate {
        self.machine.inner().candidate
    }

    pub fn lap_started_at_ms(&self) -> u32 {
        self.machine.inner().lap_started_at_ms
    }
}

struct LapHsm {
    policy: &'static dyn CrossingPolicy,
    candidate: CrossingCandidate,
    lap_started_at_ms: u32,
    state_id: TimerState,
}

impl LapHsm {
    fn new(policy: &'static dyn CrossingPolicy) -> Self {
        Self {
            policy,
            candidate: CrossingCandidate::default(),
            lap_started_at_ms: 0,
            state_id: TimerState::Stopped,
        }
    }

    fn capture_peak(&mut self, settings: &DetectionSettings, now_ms: u32, amplitude: u8) {
        if amplitude >= settings.enter_rssi && amplitude > self.candidate.peak {
            self.candidate.peak = amplitude;
            self.candidate.peak_at_ms = now_ms;
        }
    }

    fn crossing_confirmed(&self, settings: &DetectionSettings, amplitude: u8) -> bool {
        self.policy
            .confirm_crossing(amplitude, &self.candidate, self.state_id, settings)
    }

    fn min_lap_elapsed(&self, settings: &DetectionSettings, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.lap_started_at_ms) > settings.min_lap_ms
    }

    fn start_lap(&mut self, context: &mut DispatchContext, at_ms: u32) {
        self.lap_started_at_ms = at_ms;
        self.candidate.reset();
        context.push(TimerAction::LapStarted { at_ms });
    }

    fn finish_lap(&mut self, context: &mut DispatchContext) {
        let lap_ms = self
            .candidate
            .peak_at_ms
            .wrapping_sub(self.lap_started_at_ms);
        context.push(TimerAction::LapFinished { lap_ms });
    }

    fn reset(&mut self) {
        self.candidate.reset();
        self.lap_started_at_ms = 0;
    }
}

#[state_machine(initial = "State::stopped()")]
impl LapHsm {
    #[state(superstate = "controlled")]
    fn stopped(&mut self, context: &mut DispatchContext, event: &TimerEvent) -> Outcome<State> {
        let _ = context;
        match event {
            TimerEvent::Sample { .. } => Handled,
            _ => Super,
        }
    }

    #[state(superstate = "controlled")]
    fn waiting(&mut self, context: &mut DispatchContext, event: &TimerEvent) -> Outcome<State> {
        match event {
            TimerEvent::Sample { now_ms, amplitude } => {
                self.capture_peak(&context.settings, *now_ms, *amplitude);
                if !self.crossing_confirmed(&context.settings, *amplitude) {
                    return Handled;
                }

                let at_ms = self.candidate.peak_at_ms;
                self.start_lap(context, at_ms);
                self.state_id = TimerState::Running;
                Transition(State::running())
            }
            _ => Super,
        }
    }

    #[state(superstate = "controlled")]
    fn running(&mut self, context: &mut DispatchContext, event: &TimerEvent) -> Outcome<State> {
        match event {
            TimerEvent::Sample { now_ms, amplitude } => {
                if !context.settings.min_lap_guard || self.min_lap_elapsed(&context.settings, *now_ms)
                {
                    self.capture_peak(&context.settings, *now_ms, *amplitude);
                }
                if !self.crossing_confirmed(&context.settings, *amplitude) {
                    return Handled;
                }

                let at_ms = self.candidate.peak_at_ms;
                self.finish_lap(context);
                self.start_lap(context, at_ms);
                Handled
            }
            _ => Super,
        }
    }

    #[superstate]
    fn controlled(&mut self, context: &mut DispatchContext, event: &TimerEvent) -> Outcome<State> {
        match event {
            TimerEvent::Start { now_ms } => {
                self.reset();
                let racing = context.settings.skip_hole_shot;
                context.push(TimerAction::Armed { racing });
                if racing {
                    self.lap_started_at_ms = *now_ms;
                    self.state_id = TimerState::Running;
                    return Transition(State::running());
                }
                self.state_id = TimerState::Waiting;
                Transition(State::waiting())
            }
            TimerEvent::Stop => {
                self.reset();
                self.state_id = TimerState::Stopped;
                context.push(TimerAction::Stopped);
                Transition(State::stopped())
            }
            TimerEvent::Sample { .. } => Handled,
        }
    }
}
