use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use linetrack_traits::clock::{Clock, MonotonicClock};
use linetrack_traits::{Indicator, ReflectanceArray, Wheel};

use crate::builder::build_tracker;
use crate::config::{RunnerCfg, TrackerParams};
use crate::error::Result as CoreResult;
use crate::status::TickStatus;
use crate::weights::Phase;

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Second crossing reached.
    Halted,
    /// `max_ticks` reached before halting.
    TickLimit,
    /// External shutdown request (Ctrl-C).
    Shutdown,
}

/// Per-tick latency figures, in microseconds.
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub samples: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub total_us: u64,
    /// Ticks that took longer than the configured period.
    pub missed_deadlines: u64,
}

impl TickStats {
    fn record(&mut self, latency_us: u64, period_us: Option<u64>) {
        if self.samples == 0 || latency_us < self.min_us {
            self.min_us = latency_us;
        }
        self.max_us = self.max_us.max(latency_us);
        self.total_us = self.total_us.saturating_add(latency_us);
        self.samples += 1;
        if period_us.is_some_and(|p| latency_us > p) {
            self.missed_deadlines += 1;
        }
    }

    pub fn avg_us(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_us as f64 / self.samples as f64
        }
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub ticks: u64,
    pub crossings: u8,
    pub phase: Phase,
    pub elapsed_ms: u64,
    pub stats: TickStats,
}

/// Parameters for `run`.
pub struct RunParams {
    pub tracker: TrackerParams,
    pub runner: RunnerCfg,
    /// Keep issuing terminal ticks after the halt until shutdown or the tick cap.
    pub hold_after_halt: bool,
    pub clock: Option<Arc<dyn Clock + Send + Sync>>,
}

/// Run the controller until it halts, hits the tick cap, or `shutdown` is set.
///
/// The wheels are idled by `begin`, then the loop waits `startup_delay_ms`
/// before the first tick. Elapsed time in the summary starts after that wait.
///
/// Any error from a tick stops the wheels (best-effort) and is returned.
pub fn run<A, L, R, I>(
    sensors: A,
    left: L,
    right: R,
    indicator: I,
    params: RunParams,
    shutdown: Option<Arc<AtomicBool>>,
) -> CoreResult<RunSummary>
where
    A: ReflectanceArray,
    L: Wheel,
    R: Wheel,
    I: Indicator,
{
    let clock: Arc<dyn Clock + Send + Sync> = params
        .clock
        .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    let mut tracker = build_tracker(
        sensors,
        left,
        right,
        indicator,
        params.tracker,
        Some(clock.clone()),
    )?;
    let period_us = crate::util::tick_period_us(params.runner.tick_hz);
    let max_ticks = params.runner.max_ticks;

    tracker.begin()?;
    if params.runner.startup_delay_ms > 0 {
        tracing::info!(ms = params.runner.startup_delay_ms, "waiting before first tick");
        clock.sleep(Duration::from_millis(params.runner.startup_delay_ms));
    }
    let epoch = clock.now();
    tracing::info!(
        tick_hz = params.runner.tick_hz,
        max_ticks,
        hold = params.hold_after_halt,
        "run start"
    );

    let mut stats = TickStats::default();
    let mut halted_logged = false;
    let reason = loop {
        if shutdown
            .as_ref()
            .is_some_and(|s| s.load(Ordering::Relaxed))
        {
            if let Err(e) = tracker.stop() {
                tracing::warn!(error = %e, "wheel stop failed on shutdown");
            }
            break StopReason::Shutdown;
        }

        let t_start = clock.now();
        let status = match tracker.step() {
            Ok(s) => s,
            Err(e) => {
                if let Err(stop_err) = tracker.stop() {
                    tracing::warn!(error = %stop_err, "wheel stop failed after tick error");
                }
                tracing::error!(error = %e, tick = tracker.ticks(), "tick failed");
                return Err(e);
            }
        };
        let latency_us = clock.now().saturating_duration_since(t_start).as_micros() as u64;
        // The turn tick blocks for the whole maneuver; keep it out of loop stats.
        if !matches!(status, TickStatus::Turned { .. }) {
            stats.record(latency_us, period_us);
        }

        if status.is_halted() {
            if !halted_logged {
                tracing::info!(ticks = tracker.ticks(), "run halted");
                halted_logged = true;
            }
            if !params.hold_after_halt {
                break StopReason::Halted;
            }
        }

        if max_ticks > 0 && tracker.ticks() >= max_ticks {
            if !tracker.state().halted() {
                if let Err(e) = tracker.stop() {
                    tracing::warn!(error = %e, "wheel stop failed at tick limit");
                }
                break StopReason::TickLimit;
            }
            break StopReason::Halted;
        }

        if let Some(p) = period_us {
            let spent = clock.now().saturating_duration_since(t_start);
            let period = Duration::from_micros(p);
            if spent < period {
                clock.sleep(period - spent);
            }
        }
    };

    let summary = RunSummary {
        reason,
        ticks: tracker.ticks(),
        crossings: tracker.state().crossing_count(),
        phase: tracker.state().phase(),
        elapsed_ms: clock.ms_since(epoch),
        stats,
    };
    tracing::info!(
        reason = ?summary.reason,
        ticks = summary.ticks,
        crossings = summary.crossings,
        phase = summary.phase.as_str(),
        "run finished"
    );
    Ok(summary)
}
