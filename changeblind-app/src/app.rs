use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use changeblind_core::TrialOutcome;
use changeblind_experiment::{
    ExperimentConfig, ExperimentController, ExperimentEvent, TrialTiming,
};
use changeblind_timing::{CalibrationStats, Timer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::participant::SimulatedParticipant;
use crate::sinks::{CueCounter, HeadlessStimuli, JsonLinesSink};

const PERSIST_RETRIES: u64 = 3;
/// Slack per trial on top of its configured durations when bounding a run.
const TRIAL_SLACK_MS: u64 = 5_000;

type Controller<T> = ExperimentController<T, StdRng, HeadlessStimuli, CueCounter, JsonLinesSink>;

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub trials: usize,
    pub aborted: usize,
    pub hits: usize,
    pub misses: usize,
    pub no_response: usize,
    pub frames: usize,
    pub low_cues: usize,
    pub high_cues: usize,
    pub frame_stats: CalibrationStats,
}

pub struct App<T: Timer<Timestamp = u64>> {
    experiment: Controller<T>,
    participant: SimulatedParticipant,
    frame: Duration,
}

impl<T: Timer<Timestamp = u64>> App<T> {
    pub fn new(
        config: ExperimentConfig,
        timer: T,
        output: &Path,
        seed: u64,
        accuracy: f64,
    ) -> Result<Self> {
        let stimuli = HeadlessStimuli::new(config.sphere_count, config.saturation, config.value);
        let experiment = ExperimentController::new(
            config,
            timer,
            StdRng::seed_from_u64(seed),
            stimuli,
            CueCounter::default(),
            JsonLinesSink::new(output),
        )?;
        Ok(Self {
            experiment,
            participant: SimulatedParticipant::new(seed.wrapping_add(1), accuracy),
            frame: Duration::from_millis(16),
        })
    }

    pub fn with_frame_ms(mut self, frame_ms: u64) -> Self {
        self.frame = Duration::from_millis(frame_ms.max(1));
        self
    }

    /// Runs the session to completion, one frame per iteration.
    pub fn run(mut self) -> Result<RunSummary> {
        let frame_budget = self.frame_budget();
        let mut frames = 0usize;

        while !(self.experiment.is_complete() && self.experiment.state().finalized) {
            if frames >= frame_budget {
                bail!(
                    "session did not finish within {frame_budget} frames ({} of {} trials)",
                    self.experiment.progress().0,
                    self.experiment.progress().1
                );
            }

            let now = self.experiment.timer.now();
            if let Some(input) = self.participant.next_input(
                now,
                self.experiment.phase(),
                self.experiment.current_trial().is_some(),
                self.experiment.accepting_clicks(),
                self.experiment.config.auto_advance,
            ) {
                self.experiment.handle_input(input);
            }

            let events = self.experiment.update();
            let now = self.experiment.timer.now();
            let target = self.experiment.current_trial().map(|t| t.target_sphere);
            let spheres = self.experiment.config.sphere_count;
            for event in &events {
                self.participant.observe(event, now, target, spheres);
                match event {
                    ExperimentEvent::BreakStarted { completed_block } => {
                        let (done, total) = self.experiment.progress();
                        info!(block = completed_block, done, total, "break");
                    }
                    ExperimentEvent::TrialComplete { trial_id, .. } => {
                        let stimuli = self.experiment.stimuli();
                        debug!(
                            trial = trial_id,
                            renders = stimuli.renders,
                            shown = stimuli.values.iter().flatten().count(),
                            visible = stimuli.visible.iter().filter(|v| **v).count(),
                            ring = ?stimuli.ring,
                            "stimulus state"
                        );
                    }
                    _ => {}
                }
            }

            if self.experiment.persistence_error().is_some() {
                self.recover_persistence()?;
            }

            self.step_frame();
            frames += 1;
        }

        Ok(self.summary(frames))
    }

    fn step_frame(&mut self) {
        let timer = &mut self.experiment.timer;
        let start = timer.now();
        timer.sleep(self.frame);
        let elapsed = timer.elapsed(start);
        timer.record_frame(elapsed);
    }

    /// Retries with a growing pause. Gives up with the sink's error once the
    /// attempts are spent; collected results stay in memory until then.
    fn recover_persistence(&mut self) -> Result<()> {
        for attempt in 1..=PERSIST_RETRIES {
            if let Some(err) = self.experiment.persistence_error() {
                warn!(attempt, error = %err, "persisting results failed, retrying");
            }
            self.experiment
                .timer
                .sleep(Duration::from_millis(100 * attempt));
            if self.experiment.retry_persistence() {
                return Ok(());
            }
        }
        match self.experiment.persistence_error() {
            Some(err) => bail!("could not persist results: {err}"),
            None => Ok(()),
        }
    }

    fn frame_budget(&self) -> usize {
        let config = &self.experiment.config;
        let timing = TrialTiming::from_config(config);
        let per_trial_ms = timing.start_delay_ms
            + timing.blink_span_ms()
            + timing.trial_length_ms
            + config.inter_trial_interval_ms
            + TRIAL_SLACK_MS;
        let total_ms = per_trial_ms.saturating_mul(config.total_trials() as u64);
        let frame_ms = self.frame.as_millis().max(1) as u64;
        ((total_ms / frame_ms) as usize)
            .saturating_mul(2)
            .saturating_add(1_000)
    }

    fn summary(&self, frames: usize) -> RunSummary {
        let mut summary = RunSummary {
            frames,
            low_cues: self.experiment.cues().low,
            high_cues: self.experiment.cues().high,
            frame_stats: self.experiment.timer.calibration_stats(),
            ..Default::default()
        };
        for result in self.experiment.results() {
            match result.outcome {
                TrialOutcome::Success => summary.hits += 1,
                TrialOutcome::Failure => summary.misses += 1,
                TrialOutcome::NoResponse => summary.no_response += 1,
                TrialOutcome::Aborted => {
                    summary.aborted += 1;
                    continue;
                }
            }
            summary.trials += 1;
        }
        summary
    }
}
