#![allow(dead_code)]

use changeblind_core::{
    AttributeValue, CueKind, CueSink, PersistError, ResultSink, StimulusSink, TrialResult,
};
use changeblind_experiment::{ExperimentConfig, ExperimentController};
use changeblind_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Debug, Default)]
pub struct StimulusLog {
    pub renders: Vec<(usize, AttributeValue)>,
    pub visibility: Vec<(usize, bool)>,
    pub ring: Vec<[f32; 3]>,
}

impl StimulusSink for StimulusLog {
    fn has_stimulus(&self, _sphere: usize) -> bool {
        true
    }
    fn render_stimulus(&mut self, sphere: usize, value: AttributeValue) {
        self.renders.push((sphere, value));
    }
    fn set_stimulus_visible(&mut self, sphere: usize, visible: bool) {
        self.visibility.push((sphere, visible));
    }
    fn place_ring(&mut self, position: [f32; 3]) {
        self.ring.push(position);
    }
}

#[derive(Debug, Default)]
pub struct CueLog {
    pub cues: Vec<CueKind>,
}

impl CueSink for CueLog {
    fn play_cue(&mut self, cue: CueKind) {
        self.cues.push(cue);
    }
}

/// Result sink whose writes fail while `failing` is set.
#[derive(Debug, Default)]
pub struct FlakySink {
    pub failing: bool,
    pub written: Vec<TrialResult>,
    pub finalize_calls: usize,
}

impl ResultSink for FlakySink {
    fn record_trial_result(&mut self, result: &TrialResult) -> Result<(), PersistError> {
        if self.failing {
            return Err(PersistError::Unavailable("file locked".into()));
        }
        self.written.push(result.clone());
        Ok(())
    }

    fn finalize(&mut self, _results: &[TrialResult]) -> Result<(), PersistError> {
        if self.failing {
            return Err(PersistError::Unavailable("file locked".into()));
        }
        self.finalize_calls += 1;
        Ok(())
    }
}

pub type Controller = ExperimentController<ManualTimer, StdRng, StimulusLog, CueLog, FlakySink>;

pub fn controller(config: ExperimentConfig, seed: u64) -> (Controller, ManualTimer) {
    let timer = ManualTimer::new();
    let controller = ExperimentController::new(
        config,
        timer.clone(),
        StdRng::seed_from_u64(seed),
        StimulusLog::default(),
        CueLog::default(),
        FlakySink::default(),
    )
    .expect("valid config");
    (controller, timer)
}

/// No delay and no blink, so the main timeline starts with the trial.
pub fn immediate_config() -> ExperimentConfig {
    ExperimentConfig {
        trial_start_delay_ms: 0,
        blink_enabled: false,
        ..Default::default()
    }
}
