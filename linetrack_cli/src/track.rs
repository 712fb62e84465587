//! Command bodies: backend assembly, the tracking run, replay and self-check.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use linetrack_core::error::Result as CoreResult;
use linetrack_core::hw_error::map_hw_error;
use linetrack_core::mocks::NoopArray;
use linetrack_core::{
    RunParams, RunSummary, RunnerCfg, StopReason, TickStatus, Tracker, TrackerParams, WheelDrive,
    build_tracker, estimate,
};
use linetrack_hardware::{SimulatedIndicator, SimulatedWheel};
use linetrack_traits::clock::Clock;
use linetrack_traits::{CHANNELS, Direction, Indicator, ReflectanceArray, Wheel};
use serde_json::json;

use crate::cli::RtArgs;
use crate::rt::setup_rt_once;

/// Env override for the simulated course: line ticks per leg.
pub const SIM_LEG_TICKS_ENV: &str = "LINETRACK_SIM_LEG_TICKS";
/// Env override for the simulated course: ticks spent on each crosspiece.
pub const SIM_STRIPE_TICKS_ENV: &str = "LINETRACK_SIM_STRIPE_TICKS";

/// Hardware the controller drives, picked at compile time.
pub struct Backend {
    pub name: &'static str,
    pub sensors: Box<dyn ReflectanceArray>,
    pub left: Box<dyn Wheel>,
    pub right: Box<dyn Wheel>,
    pub indicator: Box<dyn Indicator>,
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn bring_up_backend(cfg: &linetrack_config::Config) -> eyre::Result<Backend> {
    use linetrack_hardware::gpio::{VehiclePins, bring_up};

    let p = &cfg.pins;
    let pins = VehiclePins {
        left_pwm: p.left_pwm,
        left_dir: p.left_dir,
        left_sleep: p.left_sleep,
        right_pwm: p.right_pwm,
        right_dir: p.right_dir,
        right_sleep: p.right_sleep,
        led: p.led,
        sensors: p.sensors,
        charge: Duration::from_micros(cfg.hardware.charge_us),
        sensor_timeout: Duration::from_micros(cfg.hardware.sensor_timeout_us),
        max_duty: cfg.control.max_duty,
    };
    let v = bring_up(&pins).wrap_err("hardware bring-up")?;
    Ok(Backend {
        name: "gpio",
        sensors: Box::new(v.sensors),
        left: Box::new(v.left),
        right: Box::new(v.right),
        indicator: Box::new(v.indicator),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn bring_up_backend(_cfg: &linetrack_config::Config) -> eyre::Result<Backend> {
    let leg = env_usize(SIM_LEG_TICKS_ENV, 200)?;
    let stripe = env_usize(SIM_STRIPE_TICKS_ENV, 3)?;
    tracing::info!(leg, stripe, "using simulated course");
    Ok(Backend {
        name: "sim",
        sensors: Box::new(linetrack_hardware::SimulatedArray::course(leg, stripe)),
        left: Box::new(SimulatedWheel::new()),
        right: Box::new(SimulatedWheel::new()),
        indicator: Box::new(SimulatedIndicator::new()),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn env_usize(key: &str, default: usize) -> eyre::Result<usize> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .wrap_err_with(|| format!("{key} must be a non-negative integer, got {v:?}")),
        Err(_) => Ok(default),
    }
}

/// Options for `linetrack run` after merging CLI flags over the config.
pub struct RunOptions {
    pub runner: RunnerCfg,
    pub hold: bool,
    pub rt: RtArgs,
    pub stats: bool,
    pub json: bool,
}

pub fn run_track(
    cfg: &linetrack_config::Config,
    backend: Backend,
    opts: &RunOptions,
    shutdown: Arc<AtomicBool>,
) -> CoreResult<RunSummary> {
    setup_rt_once(&opts.rt);

    let tracker = TrackerParams::try_from(cfg).map_err(eyre::Report::new)?;
    let params = RunParams {
        tracker,
        runner: opts.runner.clone(),
        hold_after_halt: opts.hold,
        clock: None,
    };
    tracing::info!(backend = backend.name, "starting run");
    let summary = linetrack_core::run(
        backend.sensors,
        backend.left,
        backend.right,
        backend.indicator,
        params,
        Some(shutdown),
    )?;
    print_summary(&summary, opts);
    Ok(summary)
}

fn reason_str(r: StopReason) -> &'static str {
    match r {
        StopReason::Halted => "halted",
        StopReason::TickLimit => "tick_limit",
        StopReason::Shutdown => "shutdown",
    }
}

fn print_summary(s: &RunSummary, opts: &RunOptions) {
    if opts.json {
        let mut obj = json!({
            "reason": reason_str(s.reason),
            "ticks": s.ticks,
            "crossings": s.crossings,
            "phase": s.phase.as_str(),
            "elapsed_ms": s.elapsed_ms,
        });
        if opts.stats {
            obj["stats"] = json!({
                "samples": s.stats.samples,
                "min_us": s.stats.min_us,
                "avg_us": s.stats.avg_us(),
                "max_us": s.stats.max_us,
                "missed_deadlines": s.stats.missed_deadlines,
            });
        }
        println!("{obj}");
        return;
    }
    println!(
        "Run finished ({}): {} ticks, {} crossings, phase {}, {} ms",
        reason_str(s.reason),
        s.ticks,
        s.crossings,
        s.phase.as_str(),
        s.elapsed_ms
    );
    if opts.stats {
        println!(
            "Loop stats: samples={} min={}us avg={:.1}us max={}us missed_deadlines={}",
            s.stats.samples,
            s.stats.min_us,
            s.stats.avg_us(),
            s.stats.max_us,
            s.stats.missed_deadlines
        );
    }
}

/// Turn delays are skipped when replaying: the frames already encode time.
struct ReplayClock;

impl Clock for ReplayClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        tracing::debug!(skipped_ms = d.as_millis() as u64, "replay: turn delay skipped");
    }
}

/// Parse a frames CSV with headers `s0..s7`, one raw reading per column.
pub fn read_frames(path: &Path) -> eyre::Result<Vec<[u16; CHANNELS]>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open frames CSV {:?}: {}", path, e))?;

    let expected: Vec<String> = (0..CHANNELS).map(|ch| format!("s{ch}")).collect();
    let actual: Vec<String> = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if actual != expected {
        eyre::bail!(
            "frames CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut frames = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let line = idx + 2;
        let rec = rec.wrap_err_with(|| format!("frames CSV row {line}"))?;
        let mut frame = [0u16; CHANNELS];
        for (ch, slot) in frame.iter_mut().enumerate() {
            let field = rec.get(ch).unwrap_or_default();
            *slot = field.parse::<u16>().wrap_err_with(|| {
                format!("frames CSV row {line}, s{ch}: {field:?} is not a raw reading")
            })?;
        }
        frames.push(frame);
    }
    Ok(frames)
}

fn status_str(s: &TickStatus) -> &'static str {
    match s {
        TickStatus::Tracking { .. } => "tracking",
        TickStatus::Turned { .. } => "turned",
        TickStatus::Halted => "halted",
    }
}

fn drive_json(d: &WheelDrive) -> serde_json::Value {
    let direction = match d.direction {
        Direction::Forward => "forward",
        Direction::Reverse => "reverse",
    };
    json!({ "direction": direction, "duty": d.duty })
}

fn drive_text(d: &WheelDrive) -> String {
    let dir = match d.direction {
        Direction::Forward => 'F',
        Direction::Reverse => 'R',
    };
    format!("{dir}{}", d.duty)
}

/// Drive the controller from recorded frames with simulated actuators.
pub fn replay(
    cfg: &linetrack_config::Config,
    frames_path: &Path,
    json_out: bool,
) -> CoreResult<()> {
    let frames = read_frames(frames_path)?;
    let params = TrackerParams::try_from(cfg).map_err(eyre::Report::new)?;
    let mut tracker = Tracker::builder()
        .with_sensors(NoopArray)
        .with_wheels(SimulatedWheel::new(), SimulatedWheel::new())
        .with_indicator(SimulatedIndicator::new())
        .with_params(params)
        .with_clock(Arc::new(ReplayClock))
        .build()?;
    tracker.begin()?;
    tracing::info!(frames = frames.len(), path = %frames_path.display(), "replay start");

    for (i, raw) in frames.iter().enumerate() {
        let tick = i + 1;
        let status = tracker.step_from_raw(raw)?;
        let state = tracker.state();
        if json_out {
            let mut obj = json!({
                "tick": tick,
                "status": status_str(&status),
                "crossings": state.crossing_count(),
                "phase": state.phase().as_str(),
            });
            match status {
                TickStatus::Tracking { estimate, command } => {
                    obj["error"] = json!(estimate.error);
                    obj["high_count"] = json!(estimate.high_count);
                    obj["left"] = drive_json(&command.left);
                    obj["right"] = drive_json(&command.right);
                }
                TickStatus::Turned { estimate } => {
                    obj["error"] = json!(estimate.error);
                    obj["high_count"] = json!(estimate.high_count);
                }
                TickStatus::Halted => {}
            }
            println!("{obj}");
        } else {
            match status {
                TickStatus::Tracking { estimate, command } => println!(
                    "tick {tick}: error={} high={} left={} right={}",
                    estimate.error,
                    estimate.high_count,
                    drive_text(&command.left),
                    drive_text(&command.right)
                ),
                TickStatus::Turned { estimate } => println!(
                    "tick {tick}: error={} high={} crossing {} -> turned, phase {}",
                    estimate.error,
                    estimate.high_count,
                    state.crossing_count(),
                    state.phase().as_str()
                ),
                TickStatus::Halted => println!("tick {tick}: halted"),
            }
        }
    }

    let state = tracker.state();
    if json_out {
        println!(
            "{}",
            json!({
                "frames": frames.len(),
                "crossings": state.crossing_count(),
                "phase": state.phase().as_str(),
                "halted": state.halted(),
            })
        );
    } else {
        println!(
            "Replay finished: {} frames, {} crossings, phase {}, halted={}",
            frames.len(),
            state.crossing_count(),
            state.phase().as_str(),
            state.halted()
        );
    }
    Ok(())
}

/// Exercise the backend once: read the bar, apply idle outputs, stop.
pub fn self_check(
    cfg: &linetrack_config::Config,
    mut backend: Backend,
    json_out: bool,
) -> CoreResult<()> {
    let params = TrackerParams::try_from(cfg).map_err(eyre::Report::new)?;
    let raw = backend
        .sensors
        .read()
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("reading sensor array")?;
    let frame = params.calibration.normalize(&raw);
    let est = estimate(
        &frame,
        params.weights.active(linetrack_core::Phase::Outbound),
        params.detector.saturation_threshold,
    );

    let mut tracker = build_tracker(
        backend.sensors,
        backend.left,
        backend.right,
        backend.indicator,
        params,
        None,
    )?;
    tracker.begin()?;
    tracker.stop()?;

    if json_out {
        println!(
            "{}",
            json!({
                "status": "ok",
                "backend": backend.name,
                "raw": raw,
                "normalized": frame.normalized,
                "error": est.error,
                "high_count": est.high_count,
            })
        );
    } else {
        println!("Self-check OK (backend: {})", backend.name);
        println!("raw:        {raw:?}");
        println!("normalized: {:?}", frame.normalized);
        println!("error={} high_count={}", est.error, est.high_count);
    }
    Ok(())
}
