use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use linetrack_core::{Phase, RunParams, RunnerCfg, StopReason, TrackerError, TrackerParams, run};
use linetrack_hardware::{SimulatedArray, SimulatedIndicator, SimulatedWheel};
use linetrack_traits::clock::test_clock::TestClock;
use linetrack_traits::{CHANNELS, HwResult, ReflectanceArray};
use rstest::rstest;

fn params(clock: &TestClock, tick_hz: u32, max_ticks: u64, hold: bool) -> RunParams {
    RunParams {
        tracker: TrackerParams::default(),
        runner: RunnerCfg {
            tick_hz,
            max_ticks,
            startup_delay_ms: 0,
        },
        hold_after_halt: hold,
        clock: Some(Arc::new(clock.clone())),
    }
}

#[rstest]
fn out_and_back_course_halts_after_two_crossings() {
    let clock = TestClock::new();
    let left = SimulatedWheel::new();
    let right = SimulatedWheel::new();
    let led = SimulatedIndicator::new();

    // 5 line ticks, 3 stripe ticks, twice: the second crossing lands on tick 15.
    let summary = run(
        SimulatedArray::course(5, 3),
        left.clone(),
        right.clone(),
        led.clone(),
        params(&clock, 0, 0, false),
        None,
    )
    .unwrap();

    assert_eq!(summary.reason, StopReason::Halted);
    assert_eq!(summary.ticks, 15);
    assert_eq!(summary.crossings, 2);
    assert_eq!(summary.phase, Phase::Returning);
    assert!(led.is_on());
    assert_eq!(left.state().duty, 0);
    assert_eq!(right.state().duty, 0);
    // Free-running: the only blocking delay is the turn.
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(600)]);
}

#[rstest]
fn startup_delay_precedes_first_tick() {
    let clock = TestClock::new();
    let left = SimulatedWheel::new();
    let mut p = params(&clock, 0, 0, false);
    p.runner = RunnerCfg::default();

    let summary = run(
        SimulatedArray::course(5, 3),
        left.clone(),
        SimulatedWheel::new(),
        SimulatedIndicator::new(),
        p,
        None,
    )
    .unwrap();

    assert_eq!(summary.reason, StopReason::Halted);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(2000), Duration::from_millis(600)]
    );
    // The wait is not counted as run time.
    assert_eq!(summary.elapsed_ms, 600);
    // begin() idled the wheels before the wait.
    assert_eq!(left.history()[0].duty, 0);
}

#[rstest]
fn paced_loop_sleeps_out_each_period() {
    let clock = TestClock::new();
    let summary = run(
        SimulatedArray::course(5, 3),
        SimulatedWheel::new(),
        SimulatedWheel::new(),
        SimulatedIndicator::new(),
        params(&clock, 100, 0, false),
        None,
    )
    .unwrap();

    let sleeps = clock.sleeps();
    // Ticks 1..=14 pace, except the turn tick which overruns its period.
    let pacing = sleeps
        .iter()
        .filter(|d| **d == Duration::from_millis(10))
        .count();
    assert_eq!(pacing, 13);
    assert!(sleeps.contains(&Duration::from_millis(600)));
    assert_eq!(summary.elapsed_ms, 730);
    // The turn tick is left out of latency stats.
    assert_eq!(summary.stats.samples, 14);
    assert_eq!(summary.stats.missed_deadlines, 0);
}

#[rstest]
fn tick_cap_stops_wheels() {
    let clock = TestClock::new();
    let left = SimulatedWheel::new();
    let right = SimulatedWheel::new();
    let summary = run(
        SimulatedArray::course(50, 3),
        left.clone(),
        right.clone(),
        SimulatedIndicator::new(),
        params(&clock, 0, 3, false),
        None,
    )
    .unwrap();
    assert_eq!(summary.reason, StopReason::TickLimit);
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.crossings, 0);
    assert_eq!(left.state().duty, 0);
    assert_eq!(right.state().duty, 0);
}

#[rstest]
fn hold_keeps_ticking_after_halt() {
    let clock = TestClock::new();
    let led = SimulatedIndicator::new();
    let summary = run(
        SimulatedArray::course(5, 3),
        SimulatedWheel::new(),
        SimulatedWheel::new(),
        led.clone(),
        params(&clock, 0, 40, true),
        None,
    )
    .unwrap();
    assert_eq!(summary.reason, StopReason::Halted);
    assert_eq!(summary.ticks, 40);
    assert_eq!(summary.crossings, 2);
    assert!(led.is_on());
}

#[rstest]
fn shutdown_flag_is_honoured_before_first_tick() {
    let clock = TestClock::new();
    let flag = Arc::new(AtomicBool::new(true));
    let summary = run(
        SimulatedArray::course(5, 3),
        SimulatedWheel::new(),
        SimulatedWheel::new(),
        SimulatedIndicator::new(),
        params(&clock, 0, 0, false),
        Some(flag),
    )
    .unwrap();
    assert_eq!(summary.reason, StopReason::Shutdown);
    assert_eq!(summary.ticks, 0);
}

struct FailingArray;

impl ReflectanceArray for FailingArray {
    fn read(&mut self) -> HwResult<[u16; CHANNELS]> {
        Err("sensor read timed out".into())
    }
}

#[rstest]
fn read_error_stops_wheels_and_propagates() {
    let clock = TestClock::new();
    let left = SimulatedWheel::new();
    let err = run(
        FailingArray,
        left.clone(),
        SimulatedWheel::new(),
        SimulatedIndicator::new(),
        params(&clock, 0, 0, false),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TrackerError>(),
        Some(TrackerError::Timeout)
    ));
    assert_eq!(left.state().duty, 0);
}
