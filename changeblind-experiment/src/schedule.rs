use crate::config::ExperimentConfig;
use changeblind_core::CueKind;

pub const LOW_CUES: usize = 3;
pub const CUE_COUNT: usize = LOW_CUES + 1;

/// Change window relative to the start of the main timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeWindow {
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl ChangeWindow {
    /// Centers the change on the trial midpoint. A change longer than the
    /// trial is stretched to cover all of it.
    pub fn centered(trial_length_ms: u64, change_duration_ms: u64) -> Self {
        if change_duration_ms > trial_length_ms {
            return Self {
                start_ms: 0,
                duration_ms: trial_length_ms,
            };
        }
        Self {
            start_ms: (trial_length_ms - change_duration_ms) / 2,
            duration_ms: change_duration_ms,
        }
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// Start of the beep countdown so that it ends on the trial midpoint,
/// clamped to the start of the timeline.
pub fn countdown_start_ms(trial_length_ms: u64, sound_interval_ms: u64) -> u64 {
    (trial_length_ms / 2).saturating_sub(CUE_COUNT as u64 * sound_interval_ms)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialTiming {
    pub start_delay_ms: u64,
    /// Off/on cycles and the duration of each half cycle.
    pub blink: Option<(u32, u64)>,
    pub trial_length_ms: u64,
    pub change: ChangeWindow,
    pub countdown_start_ms: u64,
    pub sound_interval_ms: u64,
}

impl TrialTiming {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            start_delay_ms: config.trial_start_delay_ms,
            blink: config
                .blink_enabled
                .then_some((config.blink_count, config.blink_duration_ms)),
            trial_length_ms: config.trial_length_ms,
            change: ChangeWindow::centered(config.trial_length_ms, config.change_duration_ms),
            countdown_start_ms: countdown_start_ms(
                config.trial_length_ms,
                config.sound_interval_ms,
            ),
            sound_interval_ms: config.sound_interval_ms,
        }
    }

    /// Three low cues then one high cue, `sound_interval_ms` apart.
    pub fn cue_offsets_ms(&self) -> [(u64, CueKind); CUE_COUNT] {
        let at = |k: u64| self.countdown_start_ms + k * self.sound_interval_ms;
        [
            (at(0), CueKind::Low),
            (at(1), CueKind::Low),
            (at(2), CueKind::Low),
            (at(3), CueKind::High),
        ]
    }

    pub fn blink_span_ms(&self) -> u64 {
        self.blink
            .map(|(count, half)| 2 * count as u64 * half)
            .unwrap_or(0)
    }
}
