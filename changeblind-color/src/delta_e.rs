use crate::lab::Lab;
use std::f64::consts::PI;

const POW25_7: f64 = 6103515625.0; // 25^7

/// Simplified CIEDE2000 color difference (ΔE00).
///
/// Keeps the chroma correction `G` and the `S_L`, `S_C`, `S_H` weighting
/// functions with `k_L = k_C = k_H = 1`, and leaves out the blue-region
/// rotation term `R_T`. Hue-delta calibration is tuned against this variant,
/// so values differ slightly from the full standard near hue 275°.
pub fn ciede2000(lab1: Lab, lab2: Lab) -> f64 {
    let c1_ab = lab1.a.hypot(lab1.b);
    let c2_ab = lab2.a.hypot(lab2.b);
    let c_ab_mean = (c1_ab + c2_ab) / 2.0;

    let c_mean_pow7 = c_ab_mean.powi(7);
    let g = 0.5 * (1.0 - (c_mean_pow7 / (c_mean_pow7 + POW25_7)).sqrt());

    let a1p = lab1.a * (1.0 + g);
    let a2p = lab2.a * (1.0 + g);

    let c1p = a1p.hypot(lab1.b);
    let c2p = a2p.hypot(lab2.b);

    let h1p = hue_angle(a1p, lab1.b);
    let h2p = hue_angle(a2p, lab2.b);

    let dl = lab2.l - lab1.l;
    let dc = c2p - c1p;

    let chroma_product = c1p * c2p;
    let dh = if chroma_product == 0.0 {
        0.0
    } else {
        let d = h2p - h1p;
        if d.abs() <= 180.0 {
            d
        } else if d > 180.0 {
            d - 360.0
        } else {
            d + 360.0
        }
    };
    let big_dh = 2.0 * chroma_product.sqrt() * (dh.to_radians() / 2.0).sin();

    let l_mean = (lab1.l + lab2.l) / 2.0;
    let c_mean = (c1p + c2p) / 2.0;
    let h_mean = if chroma_product == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) / 2.0
    } else {
        (h1p + h2p - 360.0) / 2.0
    };

    let hr = h_mean.to_radians();
    let t = 1.0 - 0.17 * (hr - PI / 6.0).cos()
        + 0.24 * (2.0 * hr).cos()
        + 0.32 * (3.0 * hr + PI / 30.0).cos()
        - 0.20 * (4.0 * hr - 63f64.to_radians()).cos();

    let l50 = (l_mean - 50.0).powi(2);
    let sl = 1.0 + (0.015 * l50) / (20.0 + l50).sqrt();
    let sc = 1.0 + 0.045 * c_mean;
    let sh = 1.0 + 0.015 * c_mean * t;

    let term_l = dl / sl;
    let term_c = dc / sc;
    let term_h = big_dh / sh;

    (term_l * term_l + term_c * term_c + term_h * term_h).sqrt()
}

fn hue_angle(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        return 0.0;
    }
    let h = b.atan2(a).to_degrees();
    if h < 0.0 { h + 360.0 } else { h }
}
