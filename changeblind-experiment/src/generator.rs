use crate::config::{ExperimentConfig, HueChangeMode, HueSampling};
use changeblind_color::{ColorScience, HueCalibration};
use changeblind_core::{AttributeValue, ChangeDirection, ChangeType};
use rand::Rng;
use tracing::warn;

pub const MAX_ATTEMPTS: usize = 50;
/// Hues closer than this (degrees, circular) count as a close pair.
pub const CLOSE_HUE_DEG: f64 = 20.0;
const LUMINANCE_BANDS: [f64; 5] = [0.2, 0.35, 0.5, 0.65, 0.8];
const LUMINANCE_BAND_HALF_WIDTH: f64 = 0.075;

/// One trial's per-sphere values, drawn fresh for that trial.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusAttributeSet {
    pub change_type: ChangeType,
    pub values: Vec<AttributeValue>,
    pub attempts: usize,
    /// False when every attempt was rejected and the last draw was kept.
    pub accepted: bool,
}

impl StimulusAttributeSet {
    pub fn raw(&self) -> Vec<f64> {
        self.values.iter().map(AttributeValue::raw).collect()
    }
}

/// What happens to the changed sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangePlan {
    pub direction: ChangeDirection,
    pub before: AttributeValue,
    pub after: AttributeValue,
    pub calibration: Option<HueCalibration>,
}

#[derive(Debug, Clone)]
pub struct AttributeGenerator {
    pub hue_sampling: HueSampling,
    pub hue_change_mode: HueChangeMode,
    pub hue_change: f64,
    pub target_delta_e: f64,
    pub luminance_change: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub size_change: f64,
    pub orientation_change_deg: f64,
    color: ColorScience,
}

impl AttributeGenerator {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            hue_sampling: config.hue_sampling,
            hue_change_mode: config.hue_change_mode,
            hue_change: config.hue_change,
            target_delta_e: config.target_delta_e,
            luminance_change: config.luminance_change,
            min_size: config.min_size,
            max_size: config.max_size,
            size_change: config.size_change,
            orientation_change_deg: config.orientation_change_deg,
            color: ColorScience::new(config.saturation, config.value),
        }
    }

    pub fn color_science(&self) -> &ColorScience {
        &self.color
    }

    pub fn generate_one<R: Rng + ?Sized>(
        &mut self,
        change_type: ChangeType,
        rng: &mut R,
    ) -> AttributeValue {
        match change_type {
            ChangeType::Hue => {
                let u: f64 = rng.random();
                let hue = match self.hue_sampling {
                    HueSampling::Uniform => u,
                    HueSampling::Perceptual => self.color.sample_perceptual_hue(u),
                };
                AttributeValue::Hue(hue)
            }
            ChangeType::Luminance => AttributeValue::Luminance(rng.random()),
            ChangeType::Size => AttributeValue::Size(rng.random_range(self.min_size..=self.max_size)),
            ChangeType::Orientation => AttributeValue::Orientation(rng.random_range(-180.0..180.0)),
        }
    }

    /// Rejection-samples a full set, keeping the last draw if none of the
    /// attempts pass.
    pub fn generate_set<R: Rng + ?Sized>(
        &mut self,
        change_type: ChangeType,
        count: usize,
        rng: &mut R,
    ) -> StimulusAttributeSet {
        let mut values = Vec::with_capacity(count);
        for attempt in 1..=MAX_ATTEMPTS {
            values.clear();
            for _ in 0..count {
                values.push(self.generate_one(change_type, rng));
            }
            if is_set_acceptable(change_type, &values) {
                return StimulusAttributeSet {
                    change_type,
                    values,
                    attempts: attempt,
                    accepted: true,
                };
            }
        }
        warn!(
            %change_type,
            count,
            attempts = MAX_ATTEMPTS,
            "no acceptable attribute set, keeping last draw"
        );
        StimulusAttributeSet {
            change_type,
            values,
            attempts: MAX_ATTEMPTS,
            accepted: false,
        }
    }

    pub fn plan_change<R: Rng + ?Sized>(
        &mut self,
        original: AttributeValue,
        rng: &mut R,
    ) -> ChangePlan {
        let mut calibration = None;
        let (direction, after) = match original {
            AttributeValue::Hue(h) => {
                let delta = match self.hue_change_mode {
                    HueChangeMode::Simple => self.hue_change,
                    HueChangeMode::Calibrated => {
                        let cal = self.color.calibrate(h, self.target_delta_e, self.hue_change);
                        calibration = Some(cal);
                        cal.delta
                    }
                };
                let direction = random_direction(rng);
                (direction, original.with_raw(h + direction.sign() * delta))
            }
            AttributeValue::Luminance(l) => {
                let direction = bounded_direction(l, self.luminance_change, 0.0, 1.0, rng);
                let v = (l + direction.sign() * self.luminance_change).clamp(0.0, 1.0);
                (direction, AttributeValue::Luminance(v))
            }
            AttributeValue::Size(s) => {
                let direction =
                    bounded_direction(s, self.size_change, self.min_size, self.max_size, rng);
                let v = (s + direction.sign() * self.size_change).max(f64::EPSILON);
                (direction, AttributeValue::Size(v))
            }
            AttributeValue::Orientation(deg) => {
                let direction = random_direction(rng);
                (
                    direction,
                    original.with_raw(deg + direction.sign() * self.orientation_change_deg),
                )
            }
        };
        ChangePlan {
            direction,
            before: original,
            after,
            calibration,
        }
    }
}

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> ChangeDirection {
    if rng.random_bool(0.5) {
        ChangeDirection::Increase
    } else {
        ChangeDirection::Decrease
    }
}

/// Picks a direction that keeps `v ± step` inside [lo, hi] when possible,
/// otherwise heads towards the roomier side.
fn bounded_direction<R: Rng + ?Sized>(
    v: f64,
    step: f64,
    lo: f64,
    hi: f64,
    rng: &mut R,
) -> ChangeDirection {
    let can_up = v + step <= hi;
    let can_down = v - step >= lo;
    match (can_up, can_down) {
        (true, true) => random_direction(rng),
        (true, false) => ChangeDirection::Increase,
        (false, true) => ChangeDirection::Decrease,
        (false, false) if hi - v >= v - lo => ChangeDirection::Increase,
        (false, false) => ChangeDirection::Decrease,
    }
}

pub fn is_set_acceptable(change_type: ChangeType, values: &[AttributeValue]) -> bool {
    let raw: Vec<f64> = values.iter().map(AttributeValue::raw).collect();
    match change_type {
        ChangeType::Hue => is_hue_set_acceptable(&raw),
        ChangeType::Luminance => is_luminance_set_acceptable(&raw),
        ChangeType::Size | ChangeType::Orientation => true,
    }
}

/// Circular distance in degrees between two normalized hues.
pub fn circular_hue_distance_deg(a: f64, b: f64) -> f64 {
    let d = ((a - b) * 360.0).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// At most one pair of normalized hues may sit closer than 20°.
pub fn is_hue_set_acceptable(hues: &[f64]) -> bool {
    let mut close_pairs = 0;
    for (i, a) in hues.iter().enumerate() {
        for b in &hues[i + 1..] {
            if circular_hue_distance_deg(*a, *b) < CLOSE_HUE_DEG {
                close_pairs += 1;
                if close_pairs > 1 {
                    return false;
                }
            }
        }
    }
    true
}

/// Spread checks for luminance sets: range, mean, both tails present, no
/// crowding at either extreme or in any narrow band, and a mid value once
/// there are four or more spheres.
pub fn is_luminance_set_acceptable(values: &[f64]) -> bool {
    if values.is_empty() {
        return false;
    }
    let n = values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min < 0.4 {
        return false;
    }

    let mean = values.iter().sum::<f64>() / n;
    if !(0.3..=0.7).contains(&mean) {
        return false;
    }

    if !values.iter().any(|&v| v < 0.4) || !values.iter().any(|&v| v > 0.6) {
        return false;
    }

    let share = |pred: &dyn Fn(f64) -> bool| values.iter().filter(|&&v| pred(v)).count() as f64 / n;
    if share(&|v: f64| v < 0.3) > 0.6 || share(&|v: f64| v > 0.7) > 0.6 {
        return false;
    }

    if values.len() >= 4 && !values.iter().any(|&v| (0.4..=0.6).contains(&v)) {
        return false;
    }

    LUMINANCE_BANDS
        .iter()
        .all(|c| share(&|v: f64| (v - c).abs() <= LUMINANCE_BAND_HALF_WIDTH) <= 0.5)
}
