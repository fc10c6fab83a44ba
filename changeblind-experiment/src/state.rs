use crate::config::ExperimentConfig;
use crate::engine::TrialEngine;
use crate::error::ConfigError;
use crate::generator::AttributeGenerator;
use crate::rings::RingBalancer;
use crate::schedule::TrialTiming;
use crate::trial::{Trial, TrialTimestamps};
use changeblind_core::{
    ChangeType, CueSink, MotionType, PersistError, Phase, ResultSink, SessionPhase, StimulusSink,
    TrialOutcome, TrialResult, TrialState,
};
use changeblind_timing::Timer;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

const NS_PER_MS: u64 = 1_000_000;

/// Inbound participant and operator input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Starts the next trial. Ignored during breaks.
    Advance,
    /// Leaves a break. Has no other use.
    BreakContinue,
    Response { sphere: usize, timestamp_ns: u64 },
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentEvent {
    BlockStarted {
        block_index: usize,
        motion_type: MotionType,
    },
    TrialStarted {
        trial_id: usize,
        block_index: usize,
        change_type: ChangeType,
    },
    ChangeStarted {
        trial_id: usize,
    },
    TrialComplete {
        trial_id: usize,
        outcome: TrialOutcome,
    },
    BreakStarted {
        completed_block: usize,
    },
    ExperimentComplete,
    PersistenceFailed {
        trial_id: Option<usize>,
        reason: String,
    },
}

/// Session-wide progress, owned by the controller for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentState {
    pub phase: SessionPhase,
    /// 0 is the training block.
    pub current_block: usize,
    pub current_block_trial_count: usize,
    /// Completed trials; aborted ones are excluded.
    pub trial_number: usize,
    pub trials_started: usize,
    pub static_trials_run: usize,
    pub moving_trials_run: usize,
    pub on_break: bool,
    pub finalized: bool,
    pub next_auto_start_ns: Option<u64>,
}

pub struct ExperimentController<T, R, S, C, W>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    S: StimulusSink,
    C: CueSink,
    W: ResultSink,
{
    pub config: ExperimentConfig,
    pub timer: T,
    state: ExperimentState,
    rng: R,
    generator: AttributeGenerator,
    engine: TrialEngine,
    rings: RingBalancer,
    stimuli: S,
    cues: C,
    sink: W,
    results: Vec<TrialResult>,
    persisted: usize,
    persistence_error: Option<PersistError>,
    change_announced: bool,
    pending: Vec<ExperimentEvent>,
}

impl<T, R, S, C, W> ExperimentController<T, R, S, C, W>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    S: StimulusSink,
    C: CueSink,
    W: ResultSink,
{
    /// Fails before any trial can run if the configuration is invalid.
    pub fn new(
        config: ExperimentConfig,
        timer: T,
        rng: R,
        stimuli: S,
        cues: C,
        sink: W,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let first_block = config.first_block();
        let state = ExperimentState {
            current_block: first_block,
            ..Default::default()
        };
        info!(
            total_trials = config.total_trials(),
            blocks = config.total_blocks,
            training = config.training_block,
            "experiment configured"
        );
        Ok(Self {
            generator: AttributeGenerator::from_config(&config),
            engine: TrialEngine::new(config.motion_start, config.motion_end),
            rings: RingBalancer::new(config.ring_layouts.clone(), config.block_target(first_block)),
            config,
            timer,
            state,
            rng,
            stimuli,
            cues,
            sink,
            results: Vec::new(),
            persisted: 0,
            persistence_error: None,
            change_announced: false,
            pending: Vec::new(),
        })
    }

    pub fn handle_input(&mut self, input: InputEvent) -> bool {
        match input {
            InputEvent::Advance => self.advance(),
            InputEvent::BreakContinue => self.continue_from_break(),
            InputEvent::Response {
                sphere,
                timestamp_ns,
            } => match self.engine.respond(sphere, timestamp_ns) {
                Some(trial) => {
                    self.complete_trial(trial);
                    true
                }
                None => false,
            },
            InputEvent::Abort => {
                let now = self.timer.now();
                match self.engine.abort(now) {
                    Some(trial) => {
                        self.complete_trial(trial);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Steps the running trial and returns everything that happened since
    /// the last call.
    pub fn update(&mut self) -> Vec<ExperimentEvent> {
        let now = self.timer.now();
        let finished = self.engine.tick(now, &mut self.stimuli, &mut self.cues);

        let change_seen = match &finished {
            Some(trial) => trial.timestamps.change_start.is_some(),
            None => self.engine.accepting_clicks(),
        };
        if change_seen && !self.change_announced {
            self.change_announced = true;
            if let Some(trial_id) = finished
                .as_ref()
                .map(|t| t.id)
                .or_else(|| self.engine.current_trial().map(|t| t.id))
            {
                self.pending.push(ExperimentEvent::ChangeStarted { trial_id });
            }
        }

        if let Some(trial) = finished {
            self.complete_trial(trial);
        }

        if self.config.auto_advance
            && self.persistence_error.is_none()
            && self.state.next_auto_start_ns.is_some_and(|at| now >= at)
            && self.state.phase.allows_advance()
        {
            self.start_trial();
        }

        std::mem::take(&mut self.pending)
    }

    fn advance(&mut self) -> bool {
        if self.persistence_error.is_some() {
            debug!("advance blocked by persistence error");
            return false;
        }
        if self.state.phase.awaits_continue() {
            debug!("advance ignored during break");
            return false;
        }
        if !self.state.phase.allows_advance() || !self.engine.is_idle() {
            return false;
        }
        if self.state.phase == SessionPhase::Welcome {
            self.state.phase = if self.state.current_block == 0 {
                SessionPhase::Training
            } else {
                SessionPhase::Block
            };
            self.announce_block();
        }
        self.start_trial()
    }

    fn continue_from_break(&mut self) -> bool {
        if !self.state.phase.awaits_continue() || self.persistence_error.is_some() {
            return false;
        }
        self.state.phase = self.state.phase.next().unwrap_or(SessionPhase::Block);
        self.state.on_break = false;
        self.state.current_block += 1;
        self.state.current_block_trial_count = 0;
        self.rings
            .reset(self.config.block_target(self.state.current_block));
        self.announce_block();
        if self.config.auto_advance {
            self.schedule_auto_start();
        }
        true
    }

    fn announce_block(&mut self) {
        let block_index = self.state.current_block;
        let motion_type = self.config.motion_for_block(block_index);
        info!(
            block = block_index,
            motion = motion_type.trial_type_label(),
            target = self.config.block_target(block_index),
            "block started"
        );
        self.pending.push(ExperimentEvent::BlockStarted {
            block_index,
            motion_type,
        });
    }

    /// Sets up the next trial slot and hands it to the engine.
    fn start_trial(&mut self) -> bool {
        if self.state.phase.is_complete() || !self.engine.is_idle() {
            return false;
        }
        let block_index = self.state.current_block;
        if self.state.current_block_trial_count >= self.config.block_target(block_index) {
            return false;
        }

        let change_type = self
            .config
            .change_types
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(ChangeType::Hue);
        let motion_type = self.config.motion_for_block(block_index);
        let ring_layout = self.rings.next(&mut self.rng);
        let attributes =
            self.generator
                .generate_set(change_type, self.config.sphere_count, &mut self.rng);
        let target_sphere = self.rng.random_range(0..attributes.values.len());
        let change = self
            .generator
            .plan_change(attributes.values[target_sphere], &mut self.rng);

        let trial = Trial {
            id: self.state.trials_started,
            block_index,
            change_type,
            motion_type,
            ring_layout,
            target_sphere,
            attributes,
            change,
            timing: TrialTiming::from_config(&self.config),
            timestamps: TrialTimestamps::default(),
            selected_sphere: None,
            outcome: None,
            state: TrialState::Idle,
        };

        let now = self.timer.now();
        if self.engine.begin(trial, now, &mut self.stimuli).is_err() {
            return false;
        }

        let trial_id = self.state.trials_started;
        self.state.trials_started += 1;
        self.state.next_auto_start_ns = None;
        self.change_announced = false;
        info!(
            trial = trial_id,
            block = block_index,
            %change_type,
            motion = motion_type.trial_type_label(),
            target = target_sphere,
            "trial started"
        );
        self.pending.push(ExperimentEvent::TrialStarted {
            trial_id,
            block_index,
            change_type,
        });
        true
    }

    fn complete_trial(&mut self, trial: Trial) {
        let result = trial.to_result();
        let outcome = result.outcome;
        info!(
            trial = trial.id,
            ?outcome,
            latency_ms = result.response_latency_ns.map(|ns| ns / NS_PER_MS),
            "trial complete"
        );
        self.pending.push(ExperimentEvent::TrialComplete {
            trial_id: trial.id,
            outcome,
        });
        self.results.push(result);
        self.flush();

        if outcome == TrialOutcome::Aborted {
            self.rings.release(trial.ring_layout);
            if self.config.auto_advance {
                self.schedule_auto_start();
            }
            return;
        }

        self.state.trial_number += 1;
        self.state.current_block_trial_count += 1;
        if trial.motion_type == MotionType::Static {
            self.state.static_trials_run += 1;
        } else {
            self.state.moving_trials_run += 1;
        }

        if self.state.trial_number >= self.config.total_trials() {
            self.finish_experiment();
        } else if self.should_take_break() {
            self.enter_break();
        } else if self.config.auto_advance {
            self.schedule_auto_start();
        }
    }

    fn schedule_auto_start(&mut self) {
        let at = self.timer.now() + self.config.inter_trial_interval_ms * NS_PER_MS;
        self.state.next_auto_start_ns = Some(at);
    }

    pub fn should_take_break(&self) -> bool {
        self.state.current_block_trial_count >= self.config.block_target(self.state.current_block)
    }

    fn enter_break(&mut self) {
        let completed_block = self.state.current_block;
        self.state.phase = SessionPhase::Break;
        self.state.on_break = true;
        self.state.next_auto_start_ns = None;
        info!(block = completed_block, "break started");
        self.pending
            .push(ExperimentEvent::BreakStarted { completed_block });
    }

    fn finish_experiment(&mut self) {
        self.state.phase = SessionPhase::Complete;
        self.state.next_auto_start_ns = None;
        info!(
            trials = self.state.trial_number,
            static_trials = self.state.static_trials_run,
            moving_trials = self.state.moving_trials_run,
            "experiment complete"
        );
        self.pending.push(ExperimentEvent::ExperimentComplete);
        self.finalize_results();
    }

    /// Sends unsent results in order. Stops at the first failure, which
    /// blocks further trials until `retry_persistence` succeeds.
    fn flush(&mut self) -> bool {
        if self.persistence_error.is_some() {
            return false;
        }
        while let Some(result) = self.results.get(self.persisted) {
            if let Err(err) = self.sink.record_trial_result(result) {
                warn!(trial = result.trial_id, error = %err, "failed to persist trial result");
                self.pending.push(ExperimentEvent::PersistenceFailed {
                    trial_id: Some(result.trial_id),
                    reason: err.to_string(),
                });
                self.persistence_error = Some(err);
                return false;
            }
            self.persisted += 1;
        }
        true
    }

    /// Hands the full result list to the sink once, after every record has
    /// been written.
    fn finalize_results(&mut self) {
        if self.state.finalized || !self.flush() {
            return;
        }
        match self.sink.finalize(&self.results) {
            Ok(()) => {
                self.state.finalized = true;
                info!(results = self.results.len(), "results finalized");
            }
            Err(err) => {
                warn!(error = %err, "failed to finalize results");
                self.pending.push(ExperimentEvent::PersistenceFailed {
                    trial_id: None,
                    reason: err.to_string(),
                });
                self.persistence_error = Some(err);
            }
        }
    }

    /// Re-sends everything not yet persisted. Returns true when nothing is
    /// outstanding.
    pub fn retry_persistence(&mut self) -> bool {
        if self.persistence_error.take().is_none() {
            return true;
        }
        info!(outstanding = self.results.len() - self.persisted, "retrying persistence");
        if self.state.phase.is_complete() {
            self.finalize_results();
        } else {
            self.flush();
        }
        self.persistence_error.is_none()
    }

    /// Completed trials against the configured total.
    pub fn progress(&self) -> (usize, usize) {
        (self.state.trial_number, self.config.total_trials())
    }

    pub fn state(&self) -> &ExperimentState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase.is_complete()
    }

    pub fn trial_state(&self) -> TrialState {
        self.engine.state()
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.engine.current_trial()
    }

    pub fn accepting_clicks(&self) -> bool {
        self.engine.accepting_clicks()
    }

    pub fn pending_timelines(&self) -> usize {
        self.engine.pending_timelines()
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn persisted_count(&self) -> usize {
        self.persisted
    }

    pub fn persistence_error(&self) -> Option<&PersistError> {
        self.persistence_error.as_ref()
    }

    pub fn stimuli(&self) -> &S {
        &self.stimuli
    }

    pub fn cues(&self) -> &C {
        &self.cues
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use changeblind_core::{AttributeValue, CueKind};
    use changeblind_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Default)]
    struct Quiet;

    impl StimulusSink for Quiet {
        fn has_stimulus(&self, _sphere: usize) -> bool {
            true
        }
        fn render_stimulus(&mut self, _sphere: usize, _value: AttributeValue) {}
        fn set_stimulus_visible(&mut self, _sphere: usize, _visible: bool) {}
        fn place_ring(&mut self, _position: [f32; 3]) {}
    }

    impl CueSink for Quiet {
        fn play_cue(&mut self, _cue: CueKind) {}
    }

    type Controller = ExperimentController<ManualTimer, StdRng, Quiet, Quiet, Vec<TrialResult>>;

    fn controller(config: ExperimentConfig) -> (Controller, ManualTimer) {
        let timer = ManualTimer::new();
        let c = ExperimentController::new(
            config,
            timer.clone(),
            StdRng::seed_from_u64(7),
            Quiet,
            Quiet,
            Vec::new(),
        )
        .unwrap();
        (c, timer)
    }

    fn small() -> ExperimentConfig {
        ExperimentConfig {
            trials_per_training_block: 1,
            trials_per_block: 2,
            total_blocks: 1,
            blink_enabled: false,
            trial_start_delay_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = ExperimentConfig {
            sphere_count: 0,
            ..Default::default()
        };
        let result = ExperimentController::new(
            config,
            ManualTimer::new(),
            StdRng::seed_from_u64(0),
            Quiet,
            Quiet,
            Vec::<TrialResult>::new(),
        );
        assert!(matches!(result, Err(ConfigError::NoSpheres)));
    }

    #[test]
    fn advance_from_welcome_enters_training() {
        let (mut c, _) = controller(small());
        assert_eq!(c.phase(), SessionPhase::Welcome);
        assert!(c.handle_input(InputEvent::Advance));
        assert_eq!(c.phase(), SessionPhase::Training);
        let events = c.update();
        assert!(matches!(
            events[0],
            ExperimentEvent::BlockStarted { block_index: 0, motion_type: MotionType::Static }
        ));
        assert!(matches!(events[1], ExperimentEvent::TrialStarted { trial_id: 0, .. }));
    }

    #[test]
    fn advance_is_ignored_while_trial_runs() {
        let (mut c, _) = controller(small());
        c.handle_input(InputEvent::Advance);
        assert!(!c.handle_input(InputEvent::Advance));
        assert_eq!(c.state().trials_started, 1);
    }

    #[test]
    fn skipping_training_starts_at_block_one() {
        let (mut c, _) = controller(ExperimentConfig {
            training_block: false,
            ..small()
        });
        c.handle_input(InputEvent::Advance);
        assert_eq!(c.phase(), SessionPhase::Block);
        assert_eq!(c.current_trial().unwrap().block_index, 1);
    }

    #[test]
    fn abort_does_not_consume_the_slot() {
        let (mut c, timer) = controller(small());
        c.handle_input(InputEvent::Advance);
        timer.advance_ms(100);
        c.update();
        assert!(c.handle_input(InputEvent::Abort));
        assert_eq!(c.progress(), (0, 3));
        assert_eq!(c.results().len(), 1);
        assert_eq!(c.results()[0].outcome, TrialOutcome::Aborted);
        assert_eq!(c.phase(), SessionPhase::Training);
        assert!(c.handle_input(InputEvent::Advance));
    }

    #[test]
    fn timeout_counts_toward_block_and_breaks() {
        let (mut c, timer) = controller(small());
        c.handle_input(InputEvent::Advance);
        timer.advance_ms(4000);
        let events = c.update();
        assert!(events.contains(&ExperimentEvent::ChangeStarted { trial_id: 0 }));
        assert!(events.contains(&ExperimentEvent::TrialComplete {
            trial_id: 0,
            outcome: TrialOutcome::NoResponse
        }));
        assert!(events.contains(&ExperimentEvent::BreakStarted { completed_block: 0 }));
        assert_eq!(c.phase(), SessionPhase::Break);
        assert_eq!(c.state().static_trials_run, 1);
        assert_eq!(c.sink().len(), 1);
    }

    #[test]
    fn auto_advance_waits_for_interval() {
        let (mut c, timer) = controller(ExperimentConfig {
            auto_advance: true,
            inter_trial_interval_ms: 500,
            trials_per_training_block: 2,
            ..small()
        });
        c.handle_input(InputEvent::Advance);
        timer.advance_ms(4000);
        c.update();
        assert!(c.current_trial().is_none());
        timer.advance_ms(499);
        c.update();
        assert!(c.current_trial().is_none());
        timer.advance_ms(1);
        let events = c.update();
        assert!(matches!(events[0], ExperimentEvent::TrialStarted { trial_id: 1, .. }));
    }
}
