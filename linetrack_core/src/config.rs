//! Runtime configuration for the tracking controller.
//!
//! These are the structs `TrackerCore` consumes. They are separate from the
//! TOML schema in `linetrack_config`; see `conversions` for the mapping.

use crate::calibration::CalibrationTable;
use crate::weights::WeightSet;

/// PD gains and actuator limits.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Proportional gain on lateral error.
    pub kp: f32,
    /// Derivative gain on the tick-to-tick change in error.
    pub kd: f32,
    /// Forward duty on both wheels when the line is centred.
    pub base_speed: u16,
    /// Reverse-drive compensation: a wheel asked to run backwards at speed `s`
    /// gets `reverse_gain * |s|`.
    pub reverse_gain: f32,
    /// Actuator ceiling; larger requests are clamped.
    pub max_duty: u16,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            kp: 0.0355,
            kd: 0.1775,
            base_speed: 25,
            reverse_gain: 1.5,
            max_duty: 255,
        }
    }
}

/// Saturation and marker thresholds.
#[derive(Debug, Clone)]
pub struct DetectorCfg {
    /// Normalized value a channel must strictly exceed to count as saturated.
    pub saturation_threshold: i32,
    /// Saturated channels needed for a marker tick.
    pub marker_min_channels: usize,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            saturation_threshold: 880,
            marker_min_channels: 6,
        }
    }
}

/// Spin-in-place parameters, tuned for 180° on the reference chassis.
#[derive(Debug, Clone)]
pub struct TurnCfg {
    pub duty: u16,
    pub duration_ms: u64,
}

impl Default for TurnCfg {
    fn default() -> Self {
        Self {
            duty: 100,
            duration_ms: 600,
        }
    }
}

/// Loop pacing and caps for the hosted runner.
#[derive(Debug, Clone)]
pub struct RunnerCfg {
    /// Ticks per second; 0 runs back to back.
    pub tick_hz: u32,
    /// Stop after this many ticks; 0 means no cap.
    pub max_ticks: u64,
    /// Sleep after `begin` and before the first tick.
    pub startup_delay_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            tick_hz: 0,
            max_ticks: 0,
            startup_delay_ms: 2000,
        }
    }
}

/// Everything needed to build a controller besides the hardware.
#[derive(Debug, Clone, Default)]
pub struct TrackerParams {
    pub calibration: CalibrationTable,
    pub weights: WeightSet,
    pub control: ControlCfg,
    pub detector: DetectorCfg,
    pub turn: TurnCfg,
}
