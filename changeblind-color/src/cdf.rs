use crate::calibrate::{calibrate_hue_delta, HueCalibration};
use crate::delta_e::ciede2000;
use crate::lab::{hue_to_lab, Lab};
use tracing::debug;

pub const HUE_BINS: usize = 360;

/// Neighbours probed around each hue, in degrees (4 per side, out to ±15°).
const NEIGHBOR_OFFSETS_DEG: [f64; 8] = [-15.0, -11.25, -7.5, -3.75, 3.75, 7.5, 11.25, 15.0];
const BASELINE_WEIGHT: f64 = 0.05;

/// Inverse-transform sampling table over hue, weighted towards hues whose
/// neighbours are hard to tell apart.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptualHueCdf {
    pub saturation: f64,
    pub value: f64,
    /// Normalized hue of each one-degree bin.
    pub hues: [f64; HUE_BINS],
    pub cdf: [f64; HUE_BINS],
}

impl PerceptualHueCdf {
    pub fn build(saturation: f64, value: f64) -> Self {
        let mut hues = [0.0; HUE_BINS];
        let mut weights = [0.0; HUE_BINS];
        let labs: Vec<Lab> = (0..HUE_BINS)
            .map(|i| hue_to_lab(i as f64 / HUE_BINS as f64, saturation, value))
            .collect();

        for i in 0..HUE_BINS {
            let hue = i as f64 / HUE_BINS as f64;
            hues[i] = hue;
            let difficulty = NEIGHBOR_OFFSETS_DEG
                .iter()
                .map(|off| {
                    let neighbour = hue_to_lab(hue + off / 360.0, saturation, value);
                    1.0 / (1.0 + ciede2000(labs[i], neighbour))
                })
                .sum::<f64>()
                / NEIGHBOR_OFFSETS_DEG.len() as f64;
            weights[i] = difficulty + BASELINE_WEIGHT;
        }

        let total: f64 = weights.iter().sum();
        let mut cdf = [0.0; HUE_BINS];
        let mut acc = 0.0;
        for (slot, w) in cdf.iter_mut().zip(weights.iter()) {
            acc += w / total;
            *slot = acc;
        }
        cdf[HUE_BINS - 1] = 1.0;

        debug!(saturation, value, "perceptual hue CDF built");
        Self {
            saturation,
            value,
            hues,
            cdf,
        }
    }

    /// Maps `u` in [0, 1] to a normalized hue.
    pub fn sample(&self, u: f64) -> f64 {
        let u = if u.is_finite() { u.clamp(0.0, 1.0) } else { 0.0 };
        let idx = self.cdf.partition_point(|&c| c < u).min(HUE_BINS - 1);
        self.hues[idx]
    }

    /// Probability mass of bin `i`.
    pub fn mass(&self, i: usize) -> f64 {
        if i == 0 {
            self.cdf[0]
        } else {
            self.cdf[i] - self.cdf[i - 1]
        }
    }
}

/// Color-science component owning the cached hue CDF.
///
/// The table is built on first use and kept until `rebuild` or `reset` is
/// called; draws never rebuild it implicitly.
#[derive(Debug, Clone)]
pub struct ColorScience {
    saturation: f64,
    value: f64,
    cdf: Option<PerceptualHueCdf>,
    builds: usize,
}

impl ColorScience {
    pub fn new(saturation: f64, value: f64) -> Self {
        Self {
            saturation,
            value,
            cdf: None,
            builds: 0,
        }
    }

    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn perceptual_cdf(&mut self) -> &PerceptualHueCdf {
        let (s, v) = (self.saturation, self.value);
        if self.cdf.is_none() {
            self.builds += 1;
        }
        self.cdf.get_or_insert_with(|| PerceptualHueCdf::build(s, v))
    }

    pub fn sample_perceptual_hue(&mut self, u: f64) -> f64 {
        self.perceptual_cdf().sample(u)
    }

    /// Switches saturation/value and rebuilds the table right away.
    pub fn rebuild(&mut self, saturation: f64, value: f64) {
        self.saturation = saturation;
        self.value = value;
        self.cdf = Some(PerceptualHueCdf::build(saturation, value));
        self.builds += 1;
    }

    pub fn reset(&mut self) {
        self.cdf = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cdf.is_some()
    }

    pub fn build_count(&self) -> usize {
        self.builds
    }

    pub fn calibrate(&self, base_hue: f64, target_delta_e: f64, base_delta: f64) -> HueCalibration {
        calibrate_hue_delta(
            base_hue,
            self.saturation,
            self.value,
            target_delta_e,
            base_delta,
        )
    }
}
