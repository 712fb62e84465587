//! Type-state builder for `Tracker` and the generic `build_tracker` constructor.
//!
//! The builder enforces at compile time that the sensor array and both wheels
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use linetrack_traits::clock::{Clock, MonotonicClock};
use linetrack_traits::{CHANNELS, Indicator, ReflectanceArray, Wheel};

use crate::calibration::CalibrationTable;
use crate::config::*;
use crate::core::{ControlState, TrackerCore};
use crate::crossing::CrossingDetector;
use crate::error::{BuildError, Result};
use crate::mocks::NoIndicator;
use crate::status::TickStatus;
use crate::steering::SteeringController;
use crate::turn::TurnManeuver;
use crate::weights::{Phase, WeightSet};

type BoxedCore = TrackerCore<
    Box<dyn ReflectanceArray>,
    Box<dyn Wheel>,
    Box<dyn Wheel>,
    Box<dyn Indicator>,
>;

// ── Public dynamic-dispatch wrapper ──────────────────────────────────────────

/// Controller over boxed hardware, for callers that pick backends at runtime.
pub struct Tracker {
    pub(crate) inner: BoxedCore,
}

impl core::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.inner, f)
    }
}

impl Tracker {
    /// Start building a Tracker.
    pub fn builder() -> TrackerBuilder<Missing, Missing> {
        TrackerBuilder::default()
    }

    pub fn state(&self) -> &ControlState {
        self.inner.state()
    }

    pub fn ticks(&self) -> u64 {
        self.inner.ticks()
    }

    pub fn last_estimate(&self) -> Option<crate::estimator::Estimate> {
        self.inner.last_estimate()
    }

    /// Startup outputs and state reset; call once before the first tick.
    pub fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    /// One control tick.
    pub fn step(&mut self) -> Result<TickStatus> {
        self.inner.step()
    }

    /// One control tick from a recorded raw frame.
    pub fn step_from_raw(&mut self, raw: &[u16; CHANNELS]) -> Result<TickStatus> {
        self.inner.step_from_raw(raw)
    }

    /// Zero both wheels (best-effort).
    pub fn stop(&mut self) -> Result<()> {
        self.inner.stop()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Tracker`. All parameters are validated on `build()`.
pub struct TrackerBuilder<A, W> {
    sensors: Option<Box<dyn ReflectanceArray>>,
    left: Option<Box<dyn Wheel>>,
    right: Option<Box<dyn Wheel>>,
    indicator: Option<Box<dyn Indicator>>,
    calibration: Option<CalibrationTable>,
    weights: Option<WeightSet>,
    control: Option<ControlCfg>,
    detector: Option<DetectorCfg>,
    turn: Option<TurnCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _a: PhantomData<A>,
    _w: PhantomData<W>,
}

impl Default for TrackerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensors: None,
            left: None,
            right: None,
            indicator: None,
            calibration: None,
            weights: None,
            control: None,
            detector: None,
            turn: None,
            clock: None,
            _a: PhantomData,
            _w: PhantomData,
        }
    }
}

impl<A, W> TrackerBuilder<A, W> {
    fn retype<A2, W2>(self) -> TrackerBuilder<A2, W2> {
        TrackerBuilder {
            sensors: self.sensors,
            left: self.left,
            right: self.right,
            indicator: self.indicator,
            calibration: self.calibration,
            weights: self.weights,
            control: self.control,
            detector: self.detector,
            turn: self.turn,
            clock: self.clock,
            _a: PhantomData,
            _w: PhantomData,
        }
    }

    pub fn with_sensors(
        mut self,
        sensors: impl ReflectanceArray + 'static,
    ) -> TrackerBuilder<Set, W> {
        self.sensors = Some(Box::new(sensors));
        self.retype()
    }

    pub fn with_wheels(
        mut self,
        left: impl Wheel + 'static,
        right: impl Wheel + 'static,
    ) -> TrackerBuilder<A, Set> {
        self.left = Some(Box::new(left));
        self.right = Some(Box::new(right));
        self.retype()
    }

    pub fn with_indicator(mut self, indicator: impl Indicator + 'static) -> Self {
        self.indicator = Some(Box::new(indicator));
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_weights(mut self, weights: WeightSet) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_detector(mut self, detector: DetectorCfg) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_turn(mut self, turn: TurnCfg) -> Self {
        self.turn = Some(turn);
        self
    }

    /// Apply every non-hardware parameter at once.
    pub fn with_params(self, p: TrackerParams) -> Self {
        self.with_calibration(p.calibration)
            .with_weights(p.weights)
            .with_control(p.control)
            .with_detector(p.detector)
            .with_turn(p.turn)
    }

    /// Clock used for the turn delay; tests inject a manual clock here.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build with runtime checks regardless of type-state.
    pub fn try_build(self) -> Result<Tracker> {
        let sensors = self
            .sensors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensors))?;
        let (left, right) = match (self.left, self.right) {
            (Some(l), Some(r)) => (l, r),
            _ => return Err(eyre::Report::new(BuildError::MissingWheels)),
        };
        let indicator = self.indicator.unwrap_or_else(|| Box::new(NoIndicator));
        let params = TrackerParams {
            calibration: self.calibration.unwrap_or_default(),
            weights: self.weights.unwrap_or_default(),
            control: self.control.unwrap_or_default(),
            detector: self.detector.unwrap_or_default(),
            turn: self.turn.unwrap_or_default(),
        };
        let inner = build_tracker(sensors, left, right, indicator, params, self.clock)?;
        Ok(Tracker { inner })
    }
}

impl TrackerBuilder<Set, Set> {
    /// Build once sensors and wheels are set.
    pub fn build(self) -> Result<Tracker> {
        self.try_build()
    }
}

/// Validate parameters and construct a `TrackerCore`.
///
/// This is the single source of truth for validation and construction, used
/// by both `TrackerBuilder::try_build()` and the runner.
pub fn build_tracker<A, L, R, I>(
    sensors: A,
    left: L,
    right: R,
    indicator: I,
    params: TrackerParams,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<TrackerCore<A, L, R, I>>
where
    A: ReflectanceArray,
    L: Wheel,
    R: Wheel,
    I: Indicator,
{
    validate(&params).map_err(eyre::Report::new)?;

    let initial = ControlState {
        phase: Phase::Outbound,
        detector: CrossingDetector::new(params.detector.marker_min_channels),
        steering: SteeringController::new(&params.control),
        halted: false,
    };
    Ok(TrackerCore {
        sensors,
        left,
        right,
        indicator,
        calibration: params.calibration,
        weights: params.weights,
        turn: TurnManeuver::new(&params.turn),
        detector: params.detector,
        clock: clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
        state: initial.clone(),
        initial,
        ticks: 0,
        started: false,
        last_estimate: None,
    })
}

fn validate(p: &TrackerParams) -> std::result::Result<(), BuildError> {
    let c = &p.control;
    if !(c.kp.is_finite() && c.kd.is_finite()) || c.kp < 0.0 || c.kd < 0.0 {
        return Err(BuildError::InvalidConfig("gains must be finite and >= 0"));
    }
    if !c.reverse_gain.is_finite() || c.reverse_gain < 1.0 {
        return Err(BuildError::InvalidConfig("reverse_gain must be >= 1.0"));
    }
    if c.max_duty == 0 {
        return Err(BuildError::InvalidConfig("max_duty must be > 0"));
    }
    if c.base_speed > c.max_duty {
        return Err(BuildError::InvalidConfig("base_speed exceeds max_duty"));
    }
    if !(1..=CHANNELS).contains(&p.detector.marker_min_channels) {
        return Err(BuildError::InvalidConfig(
            "marker_min_channels must be in 1..=8",
        ));
    }
    if p.detector.saturation_threshold <= 0 {
        return Err(BuildError::InvalidConfig("saturation_threshold must be > 0"));
    }
    if p.turn.duty == 0 || p.turn.duty > c.max_duty {
        return Err(BuildError::InvalidConfig("turn duty out of range"));
    }
    if p.turn.duration_ms == 0 {
        return Err(BuildError::InvalidConfig("turn duration must be > 0"));
    }
    Ok(())
}
