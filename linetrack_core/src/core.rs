//! The unified tracking control loop (`TrackerCore`).
//!
//! One call to `step` is one control tick: normalize, estimate, run the
//! crossing detector (which may turn or halt instead of steering), then steer
//! and actuate. All mutable state lives in `ControlState`, owned here.

use std::sync::Arc;

use eyre::WrapErr;
use linetrack_traits::clock::Clock;
use linetrack_traits::{CHANNELS, Indicator, ReflectanceArray, Wheel};

use crate::calibration::CalibrationTable;
use crate::config::DetectorCfg;
use crate::crossing::{Crossing, CrossingDetector};
use crate::error::{Result, TrackerError};
use crate::estimator::{Estimate, estimate};
use crate::hw_error::map_hw_error;
use crate::status::TickStatus;
use crate::steering::{SteeringController, WheelCommand, WheelDrive};
use crate::turn::TurnManeuver;
use crate::weights::{Phase, WeightSet};

/// Everything that changes from tick to tick.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub(crate) phase: Phase,
    pub(crate) detector: CrossingDetector,
    pub(crate) steering: SteeringController,
    pub(crate) halted: bool,
}

impl ControlState {
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn last_error(&self) -> i32 {
        self.steering.last_error()
    }
    pub fn was_marker_present(&self) -> bool {
        self.detector.was_marker_present()
    }
    pub fn crossing_in_progress(&self) -> bool {
        self.detector.crossing_in_progress()
    }
    pub fn crossing_count(&self) -> u8 {
        self.detector.crossing_count()
    }
    pub fn halted(&self) -> bool {
        self.halted
    }
}

/// Controller generic over its hardware; see `Tracker` for the boxed form.
pub struct TrackerCore<A, L, R, I>
where
    A: ReflectanceArray,
    L: Wheel,
    R: Wheel,
    I: Indicator,
{
    pub(crate) sensors: A,
    pub(crate) left: L,
    pub(crate) right: R,
    pub(crate) indicator: I,
    pub(crate) calibration: CalibrationTable,
    pub(crate) weights: WeightSet,
    pub(crate) detector: DetectorCfg,
    pub(crate) turn: TurnManeuver,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) state: ControlState,
    pub(crate) initial: ControlState,
    pub(crate) ticks: u64,
    pub(crate) started: bool,
    pub(crate) last_estimate: Option<Estimate>,
}

impl<A, L, R, I> core::fmt::Debug for TrackerCore<A, L, R, I>
where
    A: ReflectanceArray,
    L: Wheel,
    R: Wheel,
    I: Indicator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TrackerCore")
            .field("ticks", &self.ticks)
            .field("phase", &self.state.phase)
            .field("crossings", &self.state.crossing_count())
            .field("halted", &self.state.halted)
            .finish()
    }
}

impl<A, L, R, I> TrackerCore<A, L, R, I>
where
    A: ReflectanceArray,
    L: Wheel,
    R: Wheel,
    I: Indicator,
{
    /// Read-only view of the control state.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Ticks processed since `begin`, including short-circuited and halted ones.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Estimate from the most recent tick that read sensors.
    pub fn last_estimate(&self) -> Option<Estimate> {
        self.last_estimate
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// Startup outputs: indicator off, wheels forward at zero duty.
    ///
    /// Resets the control state before the first tick. A halted controller
    /// stays halted: calling this afterwards is an error.
    pub fn begin(&mut self) -> Result<()> {
        if self.state.halted {
            return Err(eyre::Report::new(TrackerError::State(
                "controller is halted; power-cycle to start a new run".into(),
            )));
        }
        self.state = self.initial.clone();
        self.ticks = 0;
        self.last_estimate = None;
        self.indicator
            .set(false)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("indicator off")?;
        self.apply(&WheelCommand::default()).wrap_err("wheels idle")?;
        self.started = true;
        tracing::info!(phase = self.state.phase.as_str(), "tracker ready");
        Ok(())
    }

    /// One control tick, reading the sensor array itself.
    pub fn step(&mut self) -> Result<TickStatus> {
        if self.state.halted {
            self.ticks = self.ticks.saturating_add(1);
            return Ok(self.hold_halt());
        }
        let raw = self
            .sensors
            .read()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading sensor array")?;
        self.process(&raw)
    }

    /// One control tick from an externally supplied raw frame (replay, tests).
    pub fn step_from_raw(&mut self, raw: &[u16; CHANNELS]) -> Result<TickStatus> {
        if self.state.halted {
            self.ticks = self.ticks.saturating_add(1);
            return Ok(self.hold_halt());
        }
        self.process(raw)
    }

    /// Zero both wheels (best-effort). Does not change the control state.
    pub fn stop(&mut self) -> Result<()> {
        let mut first: Option<eyre::Report> = None;
        for (name, res) in [
            ("left", self.left.set_duty(0)),
            ("right", self.right.set_duty(0)),
        ] {
            if let Err(e) = res {
                tracing::warn!(wheel = name, error = %e, "wheel stop failed");
                first.get_or_insert_with(|| {
                    eyre::Report::new(map_hw_error(&*e)).wrap_err(format!("{name} wheel stop"))
                });
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ── Private: shared tick logic ───────────────────────────────────────────

    fn process(&mut self, raw: &[u16; CHANNELS]) -> Result<TickStatus> {
        if !self.started {
            tracing::debug!("first tick without begin(); applying startup outputs");
            self.begin()?;
        }
        self.ticks = self.ticks.saturating_add(1);

        let frame = self.calibration.normalize(raw);
        let est = estimate(
            &frame,
            self.weights.active(self.state.phase),
            self.detector.saturation_threshold,
        );
        self.last_estimate = Some(est);
        tracing::trace!(
            tick = self.ticks,
            error = est.error,
            high_count = est.high_count,
            normalized = ?frame.normalized,
            "estimate"
        );

        match self.state.detector.observe(est.high_count) {
            Some(Crossing::First) => {
                self.state.steering.hold(est.error);
                tracing::info!(tick = self.ticks, error = est.error, "first crossing");
                self.turn
                    .execute(&mut self.left, &mut self.right, &*self.clock)?;
                self.state.phase = Phase::Returning;
                tracing::info!(phase = self.state.phase.as_str(), "weights switched");
                return Ok(TickStatus::Turned { estimate: est });
            }
            Some(Crossing::Second) => {
                self.state.steering.hold(est.error);
                tracing::info!(tick = self.ticks, "second crossing; halting");
                self.state.halted = true;
                return Ok(self.hold_halt());
            }
            None => {}
        }

        let command = self.state.steering.command(est.error);
        self.apply(&command).wrap_err("applying wheel command")?;
        Ok(TickStatus::Tracking {
            estimate: est,
            command,
        })
    }

    fn apply(&mut self, cmd: &WheelCommand) -> Result<()> {
        drive(&mut self.left, &cmd.left).wrap_err("left wheel")?;
        drive(&mut self.right, &cmd.right).wrap_err("right wheel")?;
        Ok(())
    }

    /// Terminal side effects, re-applied every halted tick. Failures are
    /// logged and do not leave the halted state.
    fn hold_halt(&mut self) -> TickStatus {
        if let Err(e) = self.indicator.set(true) {
            tracing::warn!(error = %e, "indicator set failed while halted");
        }
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "wheel stop failed while halted");
        }
        TickStatus::Halted
    }
}

fn drive<W: Wheel>(wheel: &mut W, d: &WheelDrive) -> Result<()> {
    wheel
        .set_direction(d.direction)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    wheel
        .set_duty(d.duty)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    Ok(())
}
