//! Per-channel floor/ceiling calibration and the normalization step.

use linetrack_traits::CHANNELS;

use crate::error::BuildError;

/// Full-scale value of a normalized reading (per-mille).
pub const FULL_SCALE: i32 = 1000;

/// Fixed `sensor_min`/`sensor_max` pair for every channel.
///
/// Construction enforces `max > min` on each channel, so normalization never
/// divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTable {
    min: [u16; CHANNELS],
    max: [u16; CHANNELS],
}

impl CalibrationTable {
    pub fn new(min: [u16; CHANNELS], max: [u16; CHANNELS]) -> Result<Self, BuildError> {
        for ch in 0..CHANNELS {
            if max[ch] <= min[ch] {
                return Err(BuildError::InvertedCalibration {
                    channel: ch,
                    min: min[ch],
                    max: max[ch],
                });
            }
        }
        Ok(Self { min, max })
    }

    pub fn sensor_min(&self) -> &[u16; CHANNELS] {
        &self.min
    }

    pub fn sensor_max(&self) -> &[u16; CHANNELS] {
        &self.max
    }

    /// Rescale one tick's raw readings.
    ///
    /// A channel at or below its floor is marked inactive and normalizes to 0.
    /// Otherwise `(raw - min) * 1000 / max`, truncated and not clamped, so a
    /// channel reading past its ceiling reports more than 1000.
    pub fn normalize(&self, raw: &[u16; CHANNELS]) -> SensorFrame {
        let mut normalized = [0i32; CHANNELS];
        let mut active = [false; CHANNELS];
        for ch in 0..CHANNELS {
            let adjusted = i32::from(raw[ch]) - i32::from(self.min[ch]);
            if adjusted > 0 {
                normalized[ch] = adjusted * FULL_SCALE / i32::from(self.max[ch]);
                active[ch] = true;
            }
        }
        SensorFrame {
            raw: *raw,
            normalized,
            active,
        }
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        let cal = linetrack_config::Calibration::default();
        Self {
            min: cal.sensor_min,
            max: cal.sensor_max,
        }
    }
}

/// One tick's readings, raw and normalized. Not kept across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    pub raw: [u16; CHANNELS],
    /// Per-mille readings; 0 for inactive channels.
    pub normalized: [i32; CHANNELS],
    /// Channels whose raw reading was above the calibrated floor.
    pub active: [bool; CHANNELS],
}
