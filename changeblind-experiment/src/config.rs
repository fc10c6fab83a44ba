use crate::error::ConfigError;
use changeblind_core::{ChangeType, MotionType, RingLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest accepted duration for any timed setting, and for the blink span.
/// Keeps nanosecond arithmetic on trial timelines far from overflow.
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// How base hues are drawn for hue trials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueSampling {
    Uniform,
    Perceptual,
}

/// How the hue change magnitude is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueChangeMode {
    /// Fixed shift in HSV hue.
    Simple,
    /// Shift searched per trial to hit `target_delta_e`.
    Calibrated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub sphere_count: usize,
    pub trial_length_ms: u64,
    pub trial_start_delay_ms: u64,
    pub blink_enabled: bool,
    pub blink_count: u32,
    pub blink_duration_ms: u64,
    pub change_duration_ms: u64,
    pub sound_interval_ms: u64,

    pub change_types: Vec<ChangeType>,
    pub hue_sampling: HueSampling,
    pub hue_change_mode: HueChangeMode,
    /// Normalized hue shift; also the fallback when calibration degenerates.
    pub hue_change: f64,
    pub target_delta_e: f64,
    pub saturation: f64,
    pub value: f64,
    pub luminance_change: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub size_change: f64,
    pub orientation_change_deg: f64,

    pub motion_start: [f32; 3],
    pub motion_end: [f32; 3],

    pub training_block: bool,
    pub trials_per_training_block: usize,
    pub total_blocks: usize,
    pub trials_per_block: usize,
    /// Motion condition per measurement block, cycled when shorter than
    /// `total_blocks`.
    pub block_motion_types: Vec<MotionType>,
    pub ring_layouts: Vec<RingLayout>,

    pub auto_advance: bool,
    pub inter_trial_interval_ms: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            sphere_count: 6,
            trial_length_ms: 4000,
            trial_start_delay_ms: 1000,
            blink_enabled: true,
            blink_count: 3,
            blink_duration_ms: 150,
            change_duration_ms: 1000,
            sound_interval_ms: 750,
            change_types: ChangeType::ALL.to_vec(),
            hue_sampling: HueSampling::Perceptual,
            hue_change_mode: HueChangeMode::Calibrated,
            hue_change: 0.05,
            target_delta_e: 4.0,
            saturation: 0.8,
            value: 0.8,
            luminance_change: 0.2,
            min_size: 0.05,
            max_size: 0.15,
            size_change: 0.03,
            orientation_change_deg: 30.0,
            motion_start: [-0.5, 0.0, 2.0],
            motion_end: [0.5, 0.0, 2.0],
            training_block: true,
            trials_per_training_block: 5,
            total_blocks: 3,
            trials_per_block: 20,
            block_motion_types: vec![
                MotionType::Static,
                MotionType::ObjectMotion,
                MotionType::ObserverMotion,
            ],
            ring_layouts: vec![RingLayout::Single],
            auto_advance: false,
            inter_trial_interval_ms: 1000,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sphere_count == 0 {
            return Err(ConfigError::NoSpheres);
        }
        if self.trial_length_ms == 0 {
            return Err(ConfigError::ZeroTrialLength);
        }
        if self.blink_enabled && (self.blink_count == 0 || self.blink_duration_ms == 0) {
            return Err(ConfigError::InvalidBlink);
        }
        let blink_span_ms =
            (2 * u64::from(self.blink_count)).saturating_mul(self.blink_duration_ms);
        for (name, value_ms) in [
            ("trial_length_ms", self.trial_length_ms),
            ("trial_start_delay_ms", self.trial_start_delay_ms),
            ("blink span", if self.blink_enabled { blink_span_ms } else { 0 }),
            ("change_duration_ms", self.change_duration_ms),
            ("sound_interval_ms", self.sound_interval_ms),
            ("inter_trial_interval_ms", self.inter_trial_interval_ms),
        ] {
            if value_ms > MAX_DURATION_MS {
                return Err(ConfigError::DurationTooLong {
                    name,
                    value_ms,
                    max_ms: MAX_DURATION_MS,
                });
            }
        }
        if self.change_types.is_empty() {
            return Err(ConfigError::NoChangeTypes);
        }
        if self.block_motion_types.is_empty() {
            return Err(ConfigError::NoMotionTypes);
        }
        if self.ring_layouts.is_empty() {
            return Err(ConfigError::NoRingLayouts);
        }
        if self.total_trials() == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.total_blocks > 0 && self.trials_per_block == 0 {
            return Err(ConfigError::ZeroTrialsPerBlock);
        }
        if self.training_block && self.trials_per_training_block == 0 {
            return Err(ConfigError::ZeroTrainingTrials);
        }
        if !(self.min_size.is_finite() && self.max_size.is_finite())
            || self.min_size <= 0.0
            || self.min_size > self.max_size
        {
            return Err(ConfigError::InvalidSizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }
        for (name, value) in [("saturation", self.saturation), ("value", self.value)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        for (name, value) in [
            ("hue_change", self.hue_change),
            ("target_delta_e", self.target_delta_e),
            ("luminance_change", self.luminance_change),
            ("size_change", self.size_change),
            ("orientation_change_deg", self.orientation_change_deg),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }

    pub fn total_trials(&self) -> usize {
        let training = if self.training_block {
            self.trials_per_training_block
        } else {
            0
        };
        training + self.total_blocks * self.trials_per_block
    }

    /// Index of the first block run: 0 when training is enabled.
    pub fn first_block(&self) -> usize {
        if self.training_block { 0 } else { 1 }
    }

    pub fn block_target(&self, block_index: usize) -> usize {
        if block_index == 0 {
            self.trials_per_training_block
        } else {
            self.trials_per_block
        }
    }

    /// Training runs static; measurement blocks cycle the configured list.
    pub fn motion_for_block(&self, block_index: usize) -> MotionType {
        if block_index == 0 || self.block_motion_types.is_empty() {
            return MotionType::Static;
        }
        self.block_motion_types[(block_index - 1) % self.block_motion_types.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_spheres_is_fatal() {
        let config = ExperimentConfig {
            sphere_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoSpheres)));
    }

    #[test]
    fn zero_trial_length_is_fatal() {
        let config = ExperimentConfig {
            trial_length_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTrialLength)));
    }

    #[test]
    fn inverted_size_range_is_fatal() {
        let config = ExperimentConfig {
            min_size: 0.2,
            max_size: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSizeRange { .. })
        ));
    }

    #[test]
    fn oversized_durations_are_fatal() {
        let config = ExperimentConfig {
            trial_length_ms: 20_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationTooLong {
                name: "trial_length_ms",
                ..
            })
        ));

        let config = ExperimentConfig {
            blink_count: u32::MAX,
            blink_duration_ms: MAX_DURATION_MS,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationTooLong { name: "blink span", .. })
        ));

        let config = ExperimentConfig {
            inter_trial_interval_ms: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn longest_accepted_trial_still_validates() {
        let config = ExperimentConfig {
            trial_length_ms: MAX_DURATION_MS,
            trial_start_delay_ms: MAX_DURATION_MS,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn total_trials_counts_training() {
        let config = ExperimentConfig {
            training_block: true,
            trials_per_training_block: 2,
            trials_per_block: 3,
            total_blocks: 3,
            ..Default::default()
        };
        assert_eq!(config.total_trials(), 11);
        assert_eq!(config.block_target(0), 2);
        assert_eq!(config.block_target(2), 3);
    }

    #[test]
    fn block_motion_cycles() {
        let config = ExperimentConfig {
            block_motion_types: vec![MotionType::ObjectMotion, MotionType::Static],
            ..Default::default()
        };
        assert_eq!(config.motion_for_block(0), MotionType::Static);
        assert_eq!(config.motion_for_block(1), MotionType::ObjectMotion);
        assert_eq!(config.motion_for_block(2), MotionType::Static);
        assert_eq!(config.motion_for_block(3), MotionType::ObjectMotion);
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let config = ExperimentConfig::from_json_str(
            r#"{"sphere_count": 8, "hue_change_mode": "simple", "change_types": ["Hue"]}"#,
        )
        .unwrap();
        assert_eq!(config.sphere_count, 8);
        assert_eq!(config.hue_change_mode, HueChangeMode::Simple);
        assert_eq!(config.change_types, vec![ChangeType::Hue]);
        assert_eq!(config.trial_length_ms, 4000);
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        let err = ExperimentConfig::from_json_str(r#"{"saturation": 1.5}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfUnitRange {
                name: "saturation",
                ..
            }
        ));
    }
}
