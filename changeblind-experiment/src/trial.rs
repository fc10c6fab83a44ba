use crate::generator::{ChangePlan, StimulusAttributeSet};
use crate::schedule::TrialTiming;
use changeblind_core::{ChangeType, MotionType, RingLayout, TrialOutcome, TrialResult, TrialState};

/// One measurement unit. Setup fields are fixed once the trial begins; the
/// engine fills in timestamps and the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub id: usize,
    pub block_index: usize,
    pub change_type: ChangeType,
    pub motion_type: MotionType,
    pub ring_layout: RingLayout,
    pub target_sphere: usize,
    pub attributes: StimulusAttributeSet,
    pub change: ChangePlan,
    pub timing: TrialTiming,
    pub timestamps: TrialTimestamps,
    pub selected_sphere: Option<usize>,
    pub outcome: Option<TrialOutcome>,
    pub state: TrialState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialTimestamps {
    pub start: u64,
    pub main_start: Option<u64>,
    pub change_start: Option<u64>,
    pub change_end: Option<u64>,
    pub response: Option<u64>,
    pub end: Option<u64>,
}

impl Trial {
    pub fn sphere_count(&self) -> usize {
        self.attributes.values.len()
    }

    pub fn is_training(&self) -> bool {
        self.block_index == 0
    }

    pub fn response_latency_ns(&self) -> Option<u64> {
        let response = self.timestamps.response?;
        let change = self.timestamps.change_start?;
        Some(response.saturating_sub(change))
    }

    pub fn to_result(&self) -> TrialResult {
        let outcome = self.outcome.unwrap_or(TrialOutcome::NoResponse);
        TrialResult {
            trial_id: self.id,
            block_index: self.block_index,
            training: self.is_training(),
            change_type: self.change_type,
            motion_type: self.motion_type,
            trial_type: self.motion_type.trial_type_label().to_string(),
            ring_layout: self.ring_layout,
            target_sphere: self.target_sphere,
            direction: self.change.direction,
            before: self.change.before,
            after: self.change.after,
            values: self.attributes.values.clone(),
            selected_sphere: self.selected_sphere,
            outcome,
            success: outcome == TrialOutcome::Success,
            trial_start_ns: self.timestamps.start,
            change_start_ns: self.timestamps.change_start,
            change_end_ns: self.timestamps.change_end,
            response_ns: self.timestamps.response,
            response_latency_ns: self.response_latency_ns(),
        }
    }
}
