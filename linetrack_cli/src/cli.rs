//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "linetrack", version, about = "Line-following vehicle controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/linetrack.toml")]
    pub config: PathBuf,

    /// Optional calibration CSV overriding [calibration] (strict header)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Real-time knobs for the control loop.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority, pins the process to one CPU, and calls mlockall to keep the control loop out of page faults. May require CAP_SYS_NICE / CAP_IPC_LOCK or root. Failures are logged and the run continues without them."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority (1..=max); defaults to the maximum
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to; defaults to 0
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the line until the second crossing
    Run {
        /// Stop after this many ticks (overrides [runner].max_ticks; 0 = no cap)
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Control tick rate in Hz (overrides [runner].tick_hz; 0 = free-running)
        #[arg(long, value_name = "HZ")]
        tick_hz: Option<u32>,
        /// Wait before the first tick, in ms (overrides [runner].startup_delay_ms)
        #[arg(long, value_name = "MS")]
        startup_delay_ms: Option<u64>,
        /// After halting, keep re-asserting the halt outputs until Ctrl-C or the tick cap
        #[arg(long, action = ArgAction::SetTrue)]
        hold: bool,
        #[command(flatten)]
        rt: RtArgs,
        /// Print control loop latency stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Feed recorded raw frames (CSV, headers s0..s7) through the controller
    Replay {
        #[arg(long, value_name = "FILE")]
        frames: PathBuf,
    },
    /// Validate config and calibration, then read the sensor bar once
    SelfCheck,
}
