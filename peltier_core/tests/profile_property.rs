//! Property tests for profile interpolation and persistence.

use peltier_core::{MAX_TEMP_C, MIN_TEMP_C, Profile};
use proptest::prelude::*;

prop_compose! {
    /// Sorted waypoints with unique times (0.1 s grid) and in-range temps.
    fn profile_strategy()(
        raw in prop::collection::btree_map(0u32..36_000, MIN_TEMP_C..MAX_TEMP_C, 1..8)
    ) -> Profile {
        Profile::from_points(raw.into_iter().map(|(t, v)| (t as f32 / 10.0, v)))
            .expect("strategy yields valid points")
    }
}

proptest! {
    #[test]
    fn interp_clamps_outside_the_time_range(profile in profile_strategy(), t in -100.0f32..5000.0) {
        let points = profile.points();
        let first = points.first().unwrap();
        let last = points.last().unwrap();
        let v = profile.interp(t).unwrap();
        if t <= first.time_offset_s {
            prop_assert_eq!(v, first.target_temp);
        } else if t >= last.time_offset_s {
            prop_assert_eq!(v, last.target_temp);
        }
    }

    #[test]
    fn interp_matches_the_bracketing_blend(profile in profile_strategy(), frac in 0.0f32..1.0) {
        let points = profile.points();
        prop_assume!(points.len() >= 2);
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let t = a.time_offset_s + (b.time_offset_s - a.time_offset_s) * frac;
            let expected =
                a.target_temp + (b.target_temp - a.target_temp) * (t - a.time_offset_s)
                    / (b.time_offset_s - a.time_offset_s);
            let v = profile.interp(t).unwrap();
            // Result is the blend rounded to 0.1 °C.
            prop_assert!((v - expected).abs() <= 0.051, "t={t} v={v} expected={expected}");
        }
    }

    #[test]
    fn interp_stays_within_the_profile_temperature_envelope(
        profile in profile_strategy(),
        t in -100.0f32..5000.0,
    ) {
        let v = profile.interp(t).unwrap();
        let lo = profile.points().iter().map(|p| p.target_temp).fold(f32::INFINITY, f32::min);
        let hi = profile.points().iter().map(|p| p.target_temp).fold(f32::NEG_INFINITY, f32::max);
        // 0.05 of slack for the 0.1 °C rounding at the envelope edge.
        prop_assert!(v >= lo - 0.05 && v <= hi + 0.05);
    }

    #[test]
    fn save_then_load_round_trips(profile in profile_strategy()) {
        let mut buf = Vec::new();
        profile.write_to(&mut buf).unwrap();
        let back = Profile::read_from(buf.as_slice()).unwrap();
        prop_assert_eq!(profile, back);
    }
}

#[test]
fn save_and_load_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("steps.profile");
    let p = Profile::from_points([(0.0, 20.0), (30.0, 25.5), (90.0, 18.0)]).expect("valid");
    p.save(&path).expect("save");
    let back = Profile::load(&path).expect("load");
    assert_eq!(p, back);
}
