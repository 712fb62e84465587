#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core line-tracking logic (hardware-agnostic).
//!
//! All hardware goes through the `linetrack_traits` seams: a `ReflectanceArray`,
//! two `Wheel`s and an `Indicator`.
//!
//! ## Architecture
//!
//! - **Calibration**: per-channel min/max normalization to 0..=1000 (`calibration`)
//! - **Estimation**: weighted lateral error and saturated-channel count (`estimator`)
//! - **Crossings**: rising-edge debounce and crossing count (`crossing`)
//! - **Steering**: PD law with reverse-drive compensation (`steering`)
//! - **Turn**: timed spin in place after the first crossing (`turn`)
//! - **Tick**: the per-tick state machine (`TrackerCore`)
//! - **Runner**: paced loop with shutdown and tick cap (`runner`)
//!
//! Arithmetic is integer throughout except the gain multiply and the reverse
//! gain, both of which truncate toward zero.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod core;
pub mod crossing;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod status;
pub mod steering;
pub mod turn;
pub mod util;
pub mod weights;

pub use crate::builder::{Missing, Set, Tracker, TrackerBuilder, build_tracker};
pub use crate::calibration::{CalibrationTable, FULL_SCALE, SensorFrame};
pub use crate::config::{ControlCfg, DetectorCfg, RunnerCfg, TrackerParams, TurnCfg};
pub use crate::core::{ControlState, TrackerCore};
pub use crate::crossing::{Crossing, CrossingDetector};
pub use crate::error::{BuildError, Report, Result, TrackerError};
pub use crate::estimator::{Estimate, estimate};
pub use crate::runner::{RunParams, RunSummary, StopReason, TickStats, run};
pub use crate::status::TickStatus;
pub use crate::steering::{SteeringController, WheelCommand, WheelDrive};
pub use crate::turn::TurnManeuver;
pub use crate::weights::{Phase, WeightSet, WeightVector};
