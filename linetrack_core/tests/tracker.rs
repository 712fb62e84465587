use std::sync::Arc;
use std::time::Duration;

use linetrack_core::{
    CalibrationTable, ControlCfg, Phase, TickStatus, TrackerError, TrackerParams, WheelDrive,
    build_tracker,
};
use linetrack_hardware::{SimulatedArray, SimulatedIndicator, SimulatedWheel, WheelState};
use linetrack_traits::clock::test_clock::TestClock;
use linetrack_traits::{CHANNELS, Direction};
use rstest::rstest;

/// Identity calibration: a raw reading of `r` normalizes to `r`.
fn identity_params() -> TrackerParams {
    TrackerParams {
        calibration: CalibrationTable::new([0; CHANNELS], [1000; CHANNELS]).unwrap(),
        ..TrackerParams::default()
    }
}

const FLOOR: [u16; CHANNELS] = [0; CHANNELS];
const STRIPE: [u16; CHANNELS] = [1000; CHANNELS];

struct Rig {
    left: SimulatedWheel,
    right: SimulatedWheel,
    led: SimulatedIndicator,
    clock: TestClock,
}

fn rig(
    frames: Vec<[u16; CHANNELS]>,
    params: TrackerParams,
) -> (
    linetrack_core::TrackerCore<SimulatedArray, SimulatedWheel, SimulatedWheel, SimulatedIndicator>,
    Rig,
) {
    let left = SimulatedWheel::new();
    let right = SimulatedWheel::new();
    let led = SimulatedIndicator::new();
    let clock = TestClock::new();
    let core = build_tracker(
        SimulatedArray::from_frames(frames),
        left.clone(),
        right.clone(),
        led.clone(),
        params,
        Some(Arc::new(clock.clone())),
    )
    .unwrap();
    (
        core,
        Rig {
            left,
            right,
            led,
            clock,
        },
    )
}

#[rstest]
fn begin_sets_idle_outputs() {
    let (mut t, rig) = rig(vec![FLOOR], identity_params());
    t.begin().unwrap();
    assert!(!rig.led.is_on());
    assert_eq!(rig.left.state(), WheelState::default());
    assert_eq!(rig.right.state(), WheelState::default());
    assert_eq!(t.state().phase(), Phase::Outbound);
}

#[rstest]
fn centred_line_drives_both_wheels_at_base() {
    let (mut t, rig) = rig(vec![FLOOR], identity_params());
    t.begin().unwrap();
    let status = t.step().unwrap();
    let straight = WheelDrive {
        direction: Direction::Forward,
        duty: 25,
    };
    assert_eq!(status.command().map(|c| c.left), Some(straight));
    assert_eq!(rig.left.state().duty, 25);
    assert_eq!(rig.right.state().duty, 25);
    assert_eq!(t.state().last_error(), 0);
}

#[rstest]
fn large_error_reverses_left_wheel_with_gain() {
    let mut params = identity_params();
    params.control = ControlCfg {
        kp: 1.0,
        kd: 0.0,
        ..ControlCfg::default()
    };
    // Channel 7 weight is 20: 16 * 20 / 8 = 40.
    let mut raw = FLOOR;
    raw[7] = 16;
    let (mut t, rig) = rig(vec![raw], params);
    t.begin().unwrap();
    t.step().unwrap();
    assert_eq!(
        rig.left.state(),
        WheelState {
            direction: Direction::Reverse,
            duty: 22
        }
    );
    assert_eq!(
        rig.right.state(),
        WheelState {
            direction: Direction::Forward,
            duty: 65
        }
    );
}

#[rstest]
fn first_crossing_turns_and_switches_weights() {
    let (mut t, rig) = rig(vec![STRIPE, STRIPE, STRIPE, FLOOR], identity_params());
    t.begin().unwrap();

    assert!(matches!(t.step().unwrap(), TickStatus::Tracking { .. }));
    let before = rig.left.history().len();

    let status = t.step().unwrap();
    let TickStatus::Turned { estimate } = status else {
        panic!("expected a turn, got {status:?}");
    };
    // Outbound weights sum to 24; 24 * 1000 / 8.
    assert_eq!(estimate.error, 3000);
    assert_eq!(estimate.high_count, 8);
    assert_eq!(t.state().phase(), Phase::Returning);
    assert_eq!(t.state().crossing_count(), 1);
    assert_eq!(t.state().last_error(), 3000);
    assert_eq!(rig.clock.sleeps(), vec![Duration::from_millis(600)]);

    // Spin at 100 (left forward, right reverse) then stop; no steering write.
    let left: Vec<_> = rig.left.history()[before..].to_vec();
    let right: Vec<_> = rig.right.history()[before..].to_vec();
    assert_eq!(
        left,
        vec![
            WheelState {
                direction: Direction::Forward,
                duty: 100
            },
            WheelState {
                direction: Direction::Forward,
                duty: 0
            },
        ]
    );
    assert_eq!(right[0].direction, Direction::Reverse);
    assert_eq!(right[0].duty, 100);
    assert_eq!(right[1].duty, 0);

    // Still on the stripe: no second event, steering resumes with returning weights.
    let status = t.step().unwrap();
    assert_eq!(t.state().crossing_count(), 1);
    match status {
        TickStatus::Tracking { estimate, .. } => assert_eq!(estimate.error, -3000),
        other => panic!("expected tracking, got {other:?}"),
    }
    t.step().unwrap();
    assert!(!t.state().crossing_in_progress());
}

#[rstest]
fn second_crossing_halts_for_good() {
    let frames = vec![STRIPE, STRIPE, FLOOR, STRIPE, STRIPE];
    let (mut t, rig) = rig(frames, identity_params());
    t.begin().unwrap();
    for _ in 0..4 {
        t.step().unwrap();
    }
    assert_eq!(t.state().crossing_count(), 1);

    assert_eq!(t.step().unwrap(), TickStatus::Halted);
    assert!(t.state().halted());
    assert_eq!(t.state().crossing_count(), 2);
    assert!(rig.led.is_on());
    assert_eq!(rig.left.state().duty, 0);
    assert_eq!(rig.right.state().duty, 0);

    // Halted ticks never sense or steer again.
    let writes = rig.left.history().len();
    for _ in 0..5 {
        assert_eq!(t.step().unwrap(), TickStatus::Halted);
        assert_eq!(t.step_from_raw(&FLOOR).unwrap(), TickStatus::Halted);
    }
    assert!(rig.left.history()[writes..].iter().all(|w| w.duty == 0));
    assert_eq!(t.state().crossing_count(), 2);
    assert!(rig.led.is_on());
}

#[rstest]
fn one_marker_tick_is_not_a_crossing() {
    let frames = vec![FLOOR, STRIPE, FLOOR, STRIPE, FLOOR];
    let (mut t, rig) = rig(frames, identity_params());
    t.begin().unwrap();
    for _ in 0..5 {
        assert!(matches!(t.step().unwrap(), TickStatus::Tracking { .. }));
    }
    assert_eq!(t.state().crossing_count(), 0);
    assert!(rig.clock.sleeps().is_empty());
}

#[rstest]
fn five_saturated_channels_do_not_count_as_marker() {
    let mut raw = STRIPE;
    raw[5] = 0;
    raw[6] = 0;
    raw[7] = 0;
    let (mut t, _rig) = rig(vec![raw; 4], identity_params());
    t.begin().unwrap();
    for _ in 0..4 {
        let status = t.step().unwrap();
        match status {
            TickStatus::Tracking { estimate, .. } => assert_eq!(estimate.high_count, 5),
            other => panic!("expected tracking, got {other:?}"),
        }
    }
    assert_eq!(t.state().phase(), Phase::Outbound);
}

#[rstest]
fn begin_after_halt_is_rejected() {
    let (mut t, _rig) = rig(vec![STRIPE, STRIPE, FLOOR, STRIPE, STRIPE], identity_params());
    t.begin().unwrap();
    for _ in 0..5 {
        t.step().unwrap();
    }
    let err = t.begin().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TrackerError>(),
        Some(TrackerError::State(_))
    ));
    assert!(t.state().halted());
}

#[rstest]
fn first_tick_without_begin_applies_startup_outputs() {
    let (mut t, rig) = rig(vec![FLOOR], identity_params());
    t.step().unwrap();
    assert_eq!(t.ticks(), 1);
    // Two startup writes then the steering write.
    assert_eq!(rig.left.history().len(), 2);
}

#[rstest]
fn replayed_frames_match_live_reads() {
    let frames = vec![FLOOR, STRIPE, STRIPE, FLOOR, STRIPE];
    let (mut live, _a) = rig(frames.clone(), identity_params());
    let (mut replay, _b) = rig(vec![], identity_params());
    live.begin().unwrap();
    replay.begin().unwrap();
    for f in &frames {
        assert_eq!(live.step().unwrap(), replay.step_from_raw(f).unwrap());
    }
    assert_eq!(live.state().phase(), replay.state().phase());
}
