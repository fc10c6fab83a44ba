use crate::stimulus::{AttributeValue, ChangeDirection, ChangeType, MotionType, RingLayout};
use serde::{Deserialize, Serialize};

/// Trial state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialState {
    #[default]
    Idle,
    Delay,
    Blink,
    ChangeScheduled,
    ChangeApplying,
    AwaitingResponse,
    Complete,
}

impl TrialState {
    /// Whether the main (motion/static) timeline is running.
    pub fn is_presenting(&self) -> bool {
        matches!(
            self,
            TrialState::ChangeScheduled | TrialState::ChangeApplying | TrialState::AwaitingResponse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    Success,
    Failure,
    NoResponse,
    Aborted,
}

/// Recorded result per trial, handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub block_index: usize,
    pub training: bool,
    pub change_type: ChangeType,
    pub motion_type: MotionType,
    pub trial_type: String,
    pub ring_layout: RingLayout,
    pub target_sphere: usize,
    pub direction: ChangeDirection,
    pub before: AttributeValue,
    pub after: AttributeValue,
    pub values: Vec<AttributeValue>,
    pub selected_sphere: Option<usize>,
    pub outcome: TrialOutcome,
    pub success: bool,
    pub trial_start_ns: u64,
    pub change_start_ns: Option<u64>,
    pub change_end_ns: Option<u64>,
    pub response_ns: Option<u64>,
    pub response_latency_ns: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode trial {trial_id}: {reason}")]
    Encode { trial_id: usize, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persistence collaborator. Called once per finalized trial, then once more
/// when the experiment completes.
pub trait ResultSink {
    fn record_trial_result(&mut self, result: &TrialResult) -> Result<(), PersistError>;

    fn finalize(&mut self, _results: &[TrialResult]) -> Result<(), PersistError> {
        Ok(())
    }
}

impl ResultSink for Vec<TrialResult> {
    fn record_trial_result(&mut self, result: &TrialResult) -> Result<(), PersistError> {
        self.push(result.clone());
        Ok(())
    }
}
