/// Fatal setup errors, reported before any trial starts
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sphere count must be at least 1")]
    NoSpheres,
    #[error("trial length must be positive")]
    ZeroTrialLength,
    #[error("blinking is enabled but blink count or duration is zero")]
    InvalidBlink,
    #[error("at least one change type must be enabled")]
    NoChangeTypes,
    #[error("at least one block motion type is required")]
    NoMotionTypes,
    #[error("at least one ring layout is required")]
    NoRingLayouts,
    #[error("the configuration schedules no trials")]
    NoTrials,
    #[error("measurement blocks need at least one trial each")]
    ZeroTrialsPerBlock,
    #[error("the training block needs at least one trial")]
    ZeroTrainingTrials,
    #[error("invalid size range [{min}, {max}]")]
    InvalidSizeRange { min: f64, max: f64 },
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{name} of {value_ms} ms exceeds the {max_ms} ms limit")]
    DurationTooLong {
        name: &'static str,
        value_ms: u64,
        max_ms: u64,
    },
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
