//! Lateral error and saturation count from one normalized frame.

use linetrack_traits::CHANNELS;

use crate::calibration::SensorFrame;
use crate::weights::WeightVector;

/// Result of a single estimator pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Estimate {
    /// Weighted sum over active channels divided by the channel count.
    pub error: i32,
    /// Active channels strictly above the saturation threshold.
    pub high_count: u8,
}

/// Combine a frame with the active weights.
///
/// Channels at floor contribute to neither output. The division truncates
/// toward zero, and the weighted sum is accumulated in 64 bits so extreme
/// calibrations cannot overflow it.
pub fn estimate(frame: &SensorFrame, weights: &WeightVector, saturation_threshold: i32) -> Estimate {
    let mut sum: i64 = 0;
    let mut high_count: u8 = 0;
    for ch in 0..CHANNELS {
        if !frame.active[ch] {
            continue;
        }
        let n = frame.normalized[ch];
        if n > saturation_threshold {
            high_count += 1;
        }
        sum += i64::from(n) * i64::from(weights.get(ch));
    }
    let error = (sum / CHANNELS as i64).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    Estimate { error, high_count }
}
