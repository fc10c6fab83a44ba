pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::{Phase, SessionPhase};
pub use stimulus::{
    AttributeValue, ChangeDirection, ChangeType, CueKind, CueSink, MotionType, RingLayout,
    StimulusSink,
};
pub use trial::{PersistError, ResultSink, TrialOutcome, TrialResult, TrialState};
