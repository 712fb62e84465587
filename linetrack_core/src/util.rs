//! Tick pacing helpers.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Tick period for `hz`, or `None` when the loop is free-running (`hz == 0`).
/// Never returns a zero period.
#[inline]
pub fn tick_period_us(hz: u32) -> Option<u64> {
    if hz == 0 {
        None
    } else {
        Some((MICROS_PER_SEC / u64::from(hz)).max(1))
    }
}
