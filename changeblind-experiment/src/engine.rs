//! Single-trial timeline.
//!
//! A trial runs `Delay -> Blink -> main timeline -> Complete`. The main
//! timeline carries up to three concurrent sub-timelines (ring motion, the
//! beep countdown and the attribute change), each stepped from `tick` against
//! the clock. They share no state beyond the trial and are cancelled together
//! when the trial ends.

use crate::schedule::CUE_COUNT;
use crate::trial::Trial;
use changeblind_core::{AttributeValue, CueKind, CueSink, StimulusSink, TrialOutcome, TrialState};
use tracing::{debug, info};

const NS_PER_MS: u64 = 1_000_000;

/// Click acceptance for the running trial. Opened only when the change
/// begins; closed only by a response, the timeout or an abort.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClickGate {
    open: bool,
}

impl ClickGate {
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) {
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[derive(Debug, Clone, Copy)]
struct BlinkTimeline {
    start: u64,
    half_cycle_ns: u64,
    toggles: u32,
    applied: u32,
}

impl BlinkTimeline {
    fn new(start: u64, cycles: u32, half_cycle_ms: u64) -> Self {
        Self {
            start,
            half_cycle_ns: half_cycle_ms * NS_PER_MS,
            toggles: 2 * cycles,
            applied: 0,
        }
    }

    fn end(&self) -> u64 {
        self.start + self.toggles as u64 * self.half_cycle_ns
    }

    /// Applies every toggle due by `now`. Even toggles hide, odd toggles
    /// show, so the last one leaves the ring visible.
    fn step<S: StimulusSink>(&mut self, now: u64, spheres: usize, stimuli: &mut S) -> bool {
        while self.applied < self.toggles
            && now >= self.start + self.applied as u64 * self.half_cycle_ns
        {
            let visible = self.applied % 2 == 1;
            for sphere in 0..spheres {
                if stimuli.has_stimulus(sphere) {
                    stimuli.set_stimulus_visible(sphere, visible);
                }
            }
            self.applied += 1;
        }
        now >= self.end()
    }
}

#[derive(Debug, Clone, Copy)]
struct MotionTimeline {
    from: [f32; 3],
    to: [f32; 3],
}

impl MotionTimeline {
    fn position(&self, progress: f64) -> [f32; 3] {
        let t = progress.clamp(0.0, 1.0) as f32;
        [
            self.from[0] + (self.to[0] - self.from[0]) * t,
            self.from[1] + (self.to[1] - self.from[1]) * t,
            self.from[2] + (self.to[2] - self.from[2]) * t,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct CountdownTimeline {
    cues: [(u64, CueKind); CUE_COUNT],
    next: usize,
}

impl CountdownTimeline {
    /// Fires every cue due by `elapsed`; true once all have played.
    fn step<C: CueSink>(&mut self, elapsed: u64, cues: &mut C) -> bool {
        while self.next < CUE_COUNT && elapsed >= self.cues[self.next].0 {
            let cue = self.cues[self.next].1;
            debug!(?cue, elapsed_ms = elapsed / NS_PER_MS, "cue");
            cues.play_cue(cue);
            self.next += 1;
        }
        self.next == CUE_COUNT
    }
}

#[derive(Debug, Clone, Copy)]
struct ChangeTimeline {
    start: u64,
    duration: u64,
    target: usize,
    from: AttributeValue,
    to: AttributeValue,
    begun: bool,
}

impl ChangeTimeline {
    fn progress(&self, elapsed: u64) -> f64 {
        if self.duration == 0 {
            return 1.0;
        }
        (elapsed.saturating_sub(self.start) as f64 / self.duration as f64).min(1.0)
    }
}

/// Every pending sub-timeline of the running trial.
#[derive(Debug, Default, Clone, Copy)]
struct Timelines {
    blink: Option<BlinkTimeline>,
    motion: Option<MotionTimeline>,
    countdown: Option<CountdownTimeline>,
    change: Option<ChangeTimeline>,
}

impl Timelines {
    fn cancel_all(&mut self) {
        *self = Timelines::default();
    }

    fn active_count(&self) -> usize {
        self.blink.is_some() as usize
            + self.motion.is_some() as usize
            + self.countdown.is_some() as usize
            + self.change.is_some() as usize
    }
}

#[derive(Debug)]
struct ActiveTrial {
    trial: Trial,
    gate: ClickGate,
    delay_end: u64,
    motion_from: [f32; 3],
    motion_to: [f32; 3],
    timelines: Timelines,
}

impl ActiveTrial {
    /// Steps the trial up to `now`; true once it has finished.
    fn advance<S: StimulusSink, C: CueSink>(
        &mut self,
        now: u64,
        stimuli: &mut S,
        cues: &mut C,
    ) -> bool {
        loop {
            match self.trial.state {
                TrialState::Delay => {
                    if now < self.delay_end {
                        return false;
                    }
                    match self.trial.timing.blink {
                        Some((cycles, half_ms)) => {
                            self.timelines.blink =
                                Some(BlinkTimeline::new(self.delay_end, cycles, half_ms));
                            self.trial.state = TrialState::Blink;
                            debug!(trial = self.trial.id, "blink");
                        }
                        None => self.start_main(self.delay_end, stimuli),
                    }
                }
                TrialState::Blink => {
                    let spheres = self.trial.sphere_count();
                    let Some(blink) = self.timelines.blink.as_mut() else {
                        return false;
                    };
                    if !blink.step(now, spheres, stimuli) {
                        return false;
                    }
                    let end = blink.end();
                    self.timelines.blink = None;
                    self.start_main(end, stimuli);
                }
                state if state.is_presenting() => return self.step_main(now, stimuli, cues),
                _ => return false,
            }
        }
    }

    fn start_main<S: StimulusSink>(&mut self, at: u64, stimuli: &mut S) {
        self.trial.timestamps.main_start = Some(at);
        let timing = &self.trial.timing;

        if self.trial.motion_type.moves_ring() {
            self.timelines.motion = Some(MotionTimeline {
                from: self.motion_from,
                to: self.motion_to,
            });
        } else if stimuli.has_ring() {
            stimuli.place_ring(self.motion_from);
        }

        let mut cues = [(0, CueKind::Low); CUE_COUNT];
        for (slot, (offset_ms, kind)) in cues.iter_mut().zip(timing.cue_offsets_ms()) {
            *slot = (offset_ms * NS_PER_MS, kind);
        }
        self.timelines.countdown = Some(CountdownTimeline { cues, next: 0 });

        self.timelines.change = Some(ChangeTimeline {
            start: timing.change.start_ms * NS_PER_MS,
            duration: timing.change.duration_ms * NS_PER_MS,
            target: self.trial.target_sphere,
            from: self.trial.change.before,
            to: self.trial.change.after,
            begun: false,
        });

        self.trial.state = TrialState::ChangeScheduled;
        debug!(
            trial = self.trial.id,
            motion = self.trial.motion_type.trial_type_label(),
            "main timeline started"
        );
    }

    fn step_main<S: StimulusSink, C: CueSink>(
        &mut self,
        now: u64,
        stimuli: &mut S,
        cues: &mut C,
    ) -> bool {
        let main_start = self.trial.timestamps.main_start.unwrap_or(now);
        let elapsed = now.saturating_sub(main_start);
        let length = self.trial.timing.trial_length_ms * NS_PER_MS;

        if let Some(motion) = self.timelines.motion {
            if stimuli.has_ring() {
                stimuli.place_ring(motion.position(elapsed as f64 / length as f64));
            } else {
                debug!(trial = self.trial.id, "ring gone, motion stopped");
                self.timelines.motion = None;
            }
            if elapsed >= length {
                self.timelines.motion = None;
            }
        }

        if let Some(countdown) = self.timelines.countdown.as_mut() {
            if countdown.step(elapsed, cues) {
                self.timelines.countdown = None;
            }
        }

        self.step_change(main_start, elapsed, stimuli);

        if elapsed >= length {
            info!(trial = self.trial.id, "trial timed out without response");
            self.finish(TrialOutcome::NoResponse, main_start + length, None);
            return true;
        }
        false
    }

    fn step_change<S: StimulusSink>(&mut self, main_start: u64, elapsed: u64, stimuli: &mut S) {
        let Some(mut change) = self.timelines.change else {
            return;
        };

        if !change.begun {
            if elapsed < change.start {
                return;
            }
            change.begun = true;
            self.gate.open();
            self.trial.timestamps.change_start = Some(main_start + change.start);
            self.trial.state = TrialState::ChangeApplying;
            info!(
                trial = self.trial.id,
                target = change.target,
                change_type = %self.trial.change_type,
                "change started"
            );
        }

        if !stimuli.has_stimulus(change.target) {
            debug!(trial = self.trial.id, target = change.target, "target gone, change stopped");
            self.timelines.change = None;
            self.trial.state = TrialState::AwaitingResponse;
            return;
        }

        let t = change.progress(elapsed);
        stimuli.render_stimulus(change.target, change.from.lerp(&change.to, t));

        if t >= 1.0 {
            self.trial.timestamps.change_end = Some(main_start + change.start + change.duration);
            self.timelines.change = None;
            self.trial.state = TrialState::AwaitingResponse;
        } else {
            self.timelines.change = Some(change);
        }
    }

    fn finish(&mut self, outcome: TrialOutcome, at: u64, selected: Option<usize>) {
        self.gate.close();
        self.timelines.cancel_all();
        self.trial.outcome = Some(outcome);
        self.trial.selected_sphere = selected;
        self.trial.timestamps.end = Some(at);
        self.trial.state = TrialState::Complete;
    }
}

/// Runs one trial at a time, driven by `tick` from an external frame loop.
#[derive(Debug)]
pub struct TrialEngine {
    motion_from: [f32; 3],
    motion_to: [f32; 3],
    active: Option<ActiveTrial>,
}

impl TrialEngine {
    pub fn new(motion_from: [f32; 3], motion_to: [f32; 3]) -> Self {
        Self {
            motion_from,
            motion_to,
            active: None,
        }
    }

    /// Starts `trial` at `now`, showing its original values. Returns the
    /// trial back if another one is still running.
    pub fn begin<S: StimulusSink>(
        &mut self,
        mut trial: Trial,
        now: u64,
        stimuli: &mut S,
    ) -> Result<(), Trial> {
        if self.active.is_some() {
            return Err(trial);
        }

        for (sphere, value) in trial.attributes.values.iter().enumerate() {
            if stimuli.has_stimulus(sphere) {
                stimuli.render_stimulus(sphere, *value);
                stimuli.set_stimulus_visible(sphere, true);
            }
        }
        if stimuli.has_ring() {
            stimuli.place_ring(self.motion_from);
        }

        trial.state = TrialState::Delay;
        trial.timestamps.start = now;
        let delay_end = now + trial.timing.start_delay_ms * NS_PER_MS;
        debug!(trial = trial.id, delay_end, "trial delay");

        self.active = Some(ActiveTrial {
            trial,
            gate: ClickGate::default(),
            delay_end,
            motion_from: self.motion_from,
            motion_to: self.motion_to,
            timelines: Timelines::default(),
        });
        Ok(())
    }

    /// Advances the running trial to `now`. Returns the finalized trial on
    /// the tick it times out.
    pub fn tick<S: StimulusSink, C: CueSink>(
        &mut self,
        now: u64,
        stimuli: &mut S,
        cues: &mut C,
    ) -> Option<Trial> {
        let active = self.active.as_mut()?;
        if active.advance(now, stimuli, cues) {
            return self.active.take().map(|a| a.trial);
        }
        None
    }

    /// Click on `sphere`. Ignored unless clicks are being accepted; otherwise
    /// ends the trial at once and returns it.
    pub fn respond(&mut self, sphere: usize, timestamp: u64) -> Option<Trial> {
        let active = self.active.as_mut()?;
        if !active.gate.is_open() {
            debug!(trial = active.trial.id, sphere, "click ignored");
            return None;
        }
        let outcome = if sphere == active.trial.target_sphere {
            TrialOutcome::Success
        } else {
            TrialOutcome::Failure
        };
        active.trial.timestamps.response = Some(timestamp);
        active.finish(outcome, timestamp, Some(sphere));
        info!(trial = active.trial.id, sphere, ?outcome, "response recorded");
        self.active.take().map(|a| a.trial)
    }

    /// Tears down the running trial, cancelling all of its timelines.
    pub fn abort(&mut self, now: u64) -> Option<Trial> {
        let active = self.active.as_mut()?;
        active.finish(TrialOutcome::Aborted, now, None);
        info!(trial = active.trial.id, "trial aborted");
        self.active.take().map(|a| a.trial)
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    pub fn state(&self) -> TrialState {
        self.active
            .as_ref()
            .map_or(TrialState::Idle, |a| a.trial.state)
    }

    pub fn accepting_clicks(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.gate.is_open())
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.active.as_ref().map(|a| &a.trial)
    }

    /// Number of sub-timelines still pending for the running trial.
    pub fn pending_timelines(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.timelines.active_count())
    }
}
