use std::time::{Duration, Instant};

/// Time how long each of `N` lines takes to fall low after being released.
///
/// `is_high(ch)` samples line `ch`. Lines still high when `timeout` expires
/// read as `timeout`, which is the darkest value a reflectance channel can
/// report. Polls every `poll_interval` (zero means busy-spin).
pub fn discharge_times<const N: usize>(
    mut is_high: impl FnMut(usize) -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> [Duration; N] {
    let start = Instant::now();
    let mut out = [timeout; N];
    let mut pending = [true; N];
    let mut remaining = N;
    while remaining > 0 {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            break;
        }
        for ch in 0..N {
            if pending[ch] && !is_high(ch) {
                out[ch] = elapsed;
                pending[ch] = false;
                remaining -= 1;
            }
        }
        if poll_interval.is_zero() {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(poll_interval);
        }
    }
    out
}

/// Convert a discharge duration to a raw reading in microseconds.
#[inline]
pub fn duration_to_raw(d: Duration) -> u16 {
    u16::try_from(d.as_micros()).unwrap_or(u16::MAX)
}
