use linetrack_core::{CalibrationTable, CrossingDetector, WeightSet, estimate};
use linetrack_traits::CHANNELS;
use proptest::prelude::*;

prop_compose! {
    fn raw_frame()(v in prop::array::uniform8(0u16..3000)) -> [u16; CHANNELS] {
        v
    }
}

proptest! {
    #[test]
    fn estimate_is_pure(raw in raw_frame()) {
        let cal = CalibrationTable::default();
        let w = WeightSet::default();
        let a = estimate(&cal.normalize(&raw), &w.outbound, 880);
        let b = estimate(&cal.normalize(&raw), &w.outbound, 880);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn channels_at_floor_contribute_nothing(raw in raw_frame()) {
        let cal = CalibrationTable::default();
        let w = WeightSet::default();
        // Push every at-or-below-floor channel down to zero; nothing may change.
        let mut floored = raw;
        for ch in 0..CHANNELS {
            if raw[ch] <= cal.sensor_min()[ch] {
                floored[ch] = 0;
            }
        }
        for weights in [&w.outbound, &w.returning] {
            prop_assert_eq!(
                estimate(&cal.normalize(&raw), weights, 880),
                estimate(&cal.normalize(&floored), weights, 880)
            );
        }
    }

    #[test]
    fn high_count_never_exceeds_active(raw in raw_frame()) {
        let cal = CalibrationTable::default();
        let f = cal.normalize(&raw);
        let e = estimate(&f, &WeightSet::default().outbound, 880);
        let active = f.active.iter().filter(|a| **a).count();
        prop_assert!(usize::from(e.high_count) <= active);
    }

    /// Every run of two or more consecutive marker ticks yields exactly one event.
    #[test]
    fn one_event_per_marker_run(counts in prop::collection::vec(0u8..=8, 0..200)) {
        let mut det = CrossingDetector::new(6);
        let events = counts.iter().filter(|&&c| det.observe(c).is_some()).count();

        let mut expected = 0usize;
        let mut run = 0usize;
        for &c in &counts {
            if c >= 6 {
                run += 1;
                if run == 2 {
                    expected += 1;
                }
            } else {
                run = 0;
            }
        }
        prop_assert_eq!(events, expected);
        prop_assert_eq!(usize::from(det.crossing_count()), expected);
    }
}
