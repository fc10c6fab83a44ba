//! Color-space math and perceptual hue calibration for hue-change stimuli.

#![allow(clippy::many_single_char_names)]
#![allow(clippy::excessive_precision)]

pub mod calibrate;
pub mod cdf;
pub mod delta_e;
pub mod lab;

pub use calibrate::{calibrate_hue_delta, HueCalibration};
pub use cdf::{ColorScience, PerceptualHueCdf, HUE_BINS};
pub use delta_e::ciede2000;
pub use lab::{hsv_to_rgb, hue_to_lab, lab_to_rgb, rgb_to_lab, Lab, Rgb};
