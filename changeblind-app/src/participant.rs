use std::ops::RangeInclusive;

use changeblind_core::{Phase, SessionPhase};
use changeblind_experiment::{ExperimentEvent, InputEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const NS_PER_MS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
struct PlannedClick {
    at_ns: u64,
    sphere: usize,
}

/// Presses advance/continue when asked and clicks a sphere some time after
/// the change begins.
pub struct SimulatedParticipant {
    rng: StdRng,
    accuracy: f64,
    latency_ms: RangeInclusive<u64>,
    planned: Option<PlannedClick>,
}

impl SimulatedParticipant {
    pub fn new(seed: u64, accuracy: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            accuracy: accuracy.clamp(0.0, 1.0),
            latency_ms: 250..=1500,
            planned: None,
        }
    }

    pub fn observe(&mut self, event: &ExperimentEvent, now: u64, target: Option<usize>, spheres: usize) {
        match event {
            ExperimentEvent::ChangeStarted { trial_id } => {
                let Some(target) = target else {
                    return;
                };
                let latency = self.rng.random_range(self.latency_ms.clone());
                let sphere = if spheres < 2 || self.rng.random_bool(self.accuracy) {
                    target
                } else {
                    // any sphere but the target
                    let other = self.rng.random_range(0..spheres - 1);
                    if other >= target { other + 1 } else { other }
                };
                debug!(trial = trial_id, sphere, latency_ms = latency, "click planned");
                self.planned = Some(PlannedClick {
                    at_ns: now + latency * NS_PER_MS,
                    sphere,
                });
            }
            ExperimentEvent::TrialComplete { .. } => self.planned = None,
            _ => {}
        }
    }

    pub fn next_input(
        &mut self,
        now: u64,
        phase: SessionPhase,
        trial_running: bool,
        accepting_clicks: bool,
        auto_advance: bool,
    ) -> Option<InputEvent> {
        if phase.awaits_continue() {
            return Some(InputEvent::BreakContinue);
        }
        if !trial_running {
            let first = phase == SessionPhase::Welcome;
            return (phase.allows_advance() && (first || !auto_advance)).then_some(InputEvent::Advance);
        }
        match self.planned {
            Some(click) if accepting_clicks && now >= click.at_ns => {
                self.planned = None;
                Some(InputEvent::Response {
                    sphere: click.sphere,
                    timestamp_ns: now,
                })
            }
            _ => None,
        }
    }
}
