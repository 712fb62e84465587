#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use linetrack_core::mocks::{NoIndicator, NoopArray};
use linetrack_core::{CalibrationTable, ControlCfg, TrackerParams, build_tracker};
use linetrack_traits::clock::Clock;
use linetrack_traits::{Direction, HwResult, Wheel};

#[derive(Debug, Arbitrary)]
struct Input {
    min: [u16; 8],
    span: [u16; 8],
    kp: f32,
    kd: f32,
    frames: Vec<[u16; 8]>,
}

struct CheckedWheel(u16);

impl Wheel for CheckedWheel {
    fn set_direction(&mut self, _dir: Direction) -> HwResult<()> {
        Ok(())
    }
    fn set_duty(&mut self, duty: u16) -> HwResult<()> {
        assert!(duty <= self.0, "duty {duty} above max {}", self.0);
        Ok(())
    }
}

struct NoSleep;

impl Clock for NoSleep {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }
    fn sleep(&self, _d: std::time::Duration) {}
}

// Any calibration, finite gains and frame sequence: ticks never panic and
// never command more than max_duty.
fuzz_target!(|input: Input| {
    let max = input.min.map(|m| m.saturating_add(1));
    let max: [u16; 8] = std::array::from_fn(|i| max[i].saturating_add(input.span[i]));
    let Ok(calibration) = CalibrationTable::new(input.min, max) else {
        return;
    };
    if !(input.kp.is_finite() && input.kd.is_finite()) {
        return;
    }
    let control = ControlCfg {
        kp: input.kp,
        kd: input.kd,
        ..ControlCfg::default()
    };
    let max_duty = control.max_duty;
    let params = TrackerParams {
        calibration,
        control,
        ..TrackerParams::default()
    };
    let Ok(mut t) = build_tracker(
        NoopArray,
        CheckedWheel(max_duty),
        CheckedWheel(max_duty),
        NoIndicator,
        params,
        Some(std::sync::Arc::new(NoSleep)),
    ) else {
        return;
    };
    for f in &input.frames {
        let _ = t.step_from_raw(f);
    }
});
