use std::time::{Duration, Instant};

use linetrack_hardware::util::{discharge_times, duration_to_raw};

#[test]
fn lines_that_never_fall_read_as_timeout() {
    let timeout = Duration::from_millis(3);
    let times: [Duration; 4] = discharge_times(|_| true, timeout, Duration::from_micros(100));
    assert!(times.iter().all(|t| *t == timeout));
}

#[test]
fn fast_lines_report_short_times() {
    let start = Instant::now();
    // Channel 0 is low immediately; channel 1 falls after ~2 ms; channel 2 never.
    let times: [Duration; 3] = discharge_times(
        |ch| match ch {
            0 => false,
            1 => start.elapsed() < Duration::from_millis(2),
            _ => true,
        },
        Duration::from_millis(20),
        Duration::from_micros(100),
    );
    assert!(times[0] < Duration::from_millis(2));
    assert!(times[1] >= Duration::from_millis(1));
    assert!(times[1] < Duration::from_millis(20));
    assert_eq!(times[2], Duration::from_millis(20));
}

#[test]
fn raw_conversion_saturates() {
    assert_eq!(duration_to_raw(Duration::from_micros(2500)), 2500);
    assert_eq!(duration_to_raw(Duration::from_secs(1)), u16::MAX);
}
