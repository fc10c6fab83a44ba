pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod rings;
pub mod schedule;
pub mod state;
pub mod trial;

pub use config::{ExperimentConfig, HueChangeMode, HueSampling, MAX_DURATION_MS};
pub use engine::TrialEngine;
pub use error::ConfigError;
pub use generator::{AttributeGenerator, ChangePlan, StimulusAttributeSet};
pub use rings::RingBalancer;
pub use schedule::{ChangeWindow, TrialTiming};
pub use state::{ExperimentController, ExperimentEvent, ExperimentState, InputEvent};
pub use trial::{Trial, TrialTimestamps};
