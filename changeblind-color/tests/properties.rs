use changeblind_color::{
    calibrate_hue_delta, ciede2000, hsv_to_rgb, lab_to_rgb, rgb_to_lab, PerceptualHueCdf, Rgb,
};
use proptest::prelude::*;

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u32..=10_000u32).prop_map(|v| v as f64 / 10_000.0)
}

proptest! {
    #[test]
    fn lab_round_trip(r in arb_unit(), g in arb_unit(), b in arb_unit()) {
        let back = lab_to_rgb(rgb_to_lab(Rgb::new(r, g, b)));
        prop_assert!((back.r - r).abs() < 1e-4);
        prop_assert!((back.g - g).abs() < 1e-4);
        prop_assert!((back.b - b).abs() < 1e-4);
    }

    #[test]
    fn delta_e_identity(r in arb_unit(), g in arb_unit(), b in arb_unit()) {
        let lab = rgb_to_lab(Rgb::new(r, g, b));
        prop_assert_eq!(ciede2000(lab, lab), 0.0);
    }

    #[test]
    fn delta_e_non_negative(h1 in arb_unit(), h2 in arb_unit()) {
        let a = rgb_to_lab(hsv_to_rgb(h1, 0.8, 0.8));
        let b = rgb_to_lab(hsv_to_rgb(h2, 0.8, 0.8));
        prop_assert!(ciede2000(a, b) >= 0.0);
    }

    #[test]
    fn calibration_never_panics(hue in -2.0f64..3.0, s in arb_unit(), v in arb_unit()) {
        let cal = calibrate_hue_delta(hue, s, v, 4.0, 0.05);
        prop_assert!(cal.delta.is_finite());
        prop_assert!(cal.delta > 0.0);
        if cal.fallback {
            prop_assert_eq!(cal.delta, 0.05);
        }
    }
}

#[test]
fn cdf_samples_stay_in_range() {
    let cdf = PerceptualHueCdf::build(0.8, 0.8);
    for i in 0..=100 {
        let h = cdf.sample(i as f64 / 100.0);
        assert!((0.0..1.0).contains(&h));
    }
}

#[test]
fn cdf_samples_are_monotone_in_u() {
    let cdf = PerceptualHueCdf::build(0.8, 0.8);
    let hues: Vec<f64> = (0..=50).map(|i| cdf.sample(i as f64 / 50.0)).collect();
    assert!(hues.windows(2).all(|w| w[0] <= w[1]));
}
