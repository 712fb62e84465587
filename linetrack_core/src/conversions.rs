//! `From`/`TryFrom` implementations bridging `linetrack_config` types to core types.

use crate::calibration::CalibrationTable;
use crate::config::{ControlCfg, DetectorCfg, RunnerCfg, TrackerParams, TurnCfg};
use crate::error::BuildError;
use crate::weights::{WeightSet, WeightVector};

const _: () = assert!(linetrack_config::CHANNELS == linetrack_traits::CHANNELS);

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&linetrack_config::ControlCfg> for ControlCfg {
    fn from(c: &linetrack_config::ControlCfg) -> Self {
        Self {
            kp: c.kp,
            kd: c.kd,
            base_speed: c.base_speed,
            reverse_gain: c.reverse_gain,
            max_duty: c.max_duty,
        }
    }
}

// ── DetectorCfg ──────────────────────────────────────────────────────────────

impl From<&linetrack_config::DetectorCfg> for DetectorCfg {
    fn from(c: &linetrack_config::DetectorCfg) -> Self {
        Self {
            saturation_threshold: c.saturation_threshold,
            marker_min_channels: c.marker_min_channels,
        }
    }
}

// ── TurnCfg ──────────────────────────────────────────────────────────────────

impl From<&linetrack_config::TurnCfg> for TurnCfg {
    fn from(c: &linetrack_config::TurnCfg) -> Self {
        Self {
            duty: c.duty,
            duration_ms: c.duration_ms,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

impl From<&linetrack_config::RunnerCfg> for RunnerCfg {
    fn from(c: &linetrack_config::RunnerCfg) -> Self {
        Self {
            tick_hz: c.tick_hz,
            max_ticks: c.max_ticks,
            startup_delay_ms: c.startup_delay_ms,
        }
    }
}

// ── Calibration / weights ────────────────────────────────────────────────────

impl TryFrom<&linetrack_config::Calibration> for CalibrationTable {
    type Error = BuildError;
    fn try_from(c: &linetrack_config::Calibration) -> Result<Self, Self::Error> {
        CalibrationTable::new(c.sensor_min, c.sensor_max)
    }
}

impl From<&linetrack_config::Weights> for WeightSet {
    fn from(w: &linetrack_config::Weights) -> Self {
        Self {
            outbound: WeightVector(w.outbound),
            returning: WeightVector(w.returning),
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl TryFrom<&linetrack_config::Config> for TrackerParams {
    type Error = BuildError;
    fn try_from(c: &linetrack_config::Config) -> Result<Self, Self::Error> {
        Ok(Self {
            calibration: (&c.calibration).try_into()?,
            weights: (&c.weights).into(),
            control: (&c.control).into(),
            detector: (&c.detector).into(),
            turn: (&c.turn).into(),
        })
    }
}
