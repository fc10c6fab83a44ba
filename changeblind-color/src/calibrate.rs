use crate::delta_e::ciede2000;
use crate::lab::hue_to_lab;
use tracing::{debug, warn};

pub const MIN_HUE_DELTA: f64 = 0.005;
pub const MAX_HUE_DELTA: f64 = 0.4;
pub const MAX_ITERATIONS: usize = 12;
pub const DELTA_E_TOLERANCE: f64 = 0.2;

/// Outcome of a hue-delta search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueCalibration {
    /// Normalized hue delta to apply in either direction.
    pub delta: f64,
    /// ΔE produced by `delta` (the larger of the two directions).
    pub delta_e: f64,
    pub iterations: usize,
    /// The search landed within tolerance of the target.
    pub converged: bool,
    /// The search degenerated and `delta` is the caller's base delta.
    pub fallback: bool,
}

/// Larger of the ΔE distances from `base_hue` to `base_hue ± delta`.
pub fn directional_delta_e(base_hue: f64, saturation: f64, value: f64, delta: f64) -> f64 {
    let base = hue_to_lab(base_hue, saturation, value);
    let up = ciede2000(base, hue_to_lab(base_hue + delta, saturation, value));
    let down = ciede2000(base, hue_to_lab(base_hue - delta, saturation, value));
    up.max(down)
}

/// Binary-searches a hue delta in [0.005, 0.4] whose ΔE from `base_hue`
/// matches `target_delta_e`.
///
/// Stops once within 0.2 of the target or after 12 probes. A NaN or zero
/// result (achromatic colors, a non-positive target) falls back to
/// `base_delta`, flagged on the returned value.
pub fn calibrate_hue_delta(
    base_hue: f64,
    saturation: f64,
    value: f64,
    target_delta_e: f64,
    base_delta: f64,
) -> HueCalibration {
    let base_hue = base_hue.rem_euclid(1.0);
    let mut lo = MIN_HUE_DELTA;
    let mut hi = MAX_HUE_DELTA;
    let mut delta = (lo + hi) / 2.0;
    let mut delta_e = f64::NAN;
    let mut iterations = 0;
    let mut converged = false;

    if target_delta_e.is_finite() && target_delta_e > 0.0 {
        for i in 0..MAX_ITERATIONS {
            delta = (lo + hi) / 2.0;
            delta_e = directional_delta_e(base_hue, saturation, value, delta);
            iterations = i + 1;

            if !delta_e.is_finite() {
                break;
            }
            if (delta_e - target_delta_e).abs() <= DELTA_E_TOLERANCE {
                converged = true;
                break;
            }
            if delta_e < target_delta_e {
                lo = delta;
            } else {
                hi = delta;
            }
        }
    }

    if !delta_e.is_finite() || delta_e <= 0.0 || !delta.is_finite() || delta <= 0.0 {
        warn!(
            base_hue,
            target_delta_e, base_delta, "hue calibration degenerated, using base delta"
        );
        return HueCalibration {
            delta: base_delta,
            delta_e: directional_delta_e(base_hue, saturation, value, base_delta),
            iterations,
            converged: false,
            fallback: true,
        };
    }

    debug!(base_hue, delta, delta_e, iterations, converged, "hue delta calibrated");
    HueCalibration {
        delta,
        delta_e,
        iterations,
        converged,
        fallback: false,
    }
}
