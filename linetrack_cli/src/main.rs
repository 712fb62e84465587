mod cli;
mod error_fmt;
mod rt;
mod track;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use linetrack_config::Config;
use linetrack_core::{RunnerCfg, StopReason};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{EXIT_INTERRUPTED, exit_code_for_error, format_error_json, humanize};
use crate::track::{RunOptions, bring_up_backend, replay, run_track, self_check};

fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("Warning: error reporter not installed: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match real_main(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            ExitCode::from(exit_code_for_error(&err))
        }
    }
}

fn real_main(cli: Cli) -> Result<ExitCode> {
    // Logging comes up even when the config is broken, so that failure is reported too.
    let loaded = load_config(&cli);
    init_tracing(&cli, loaded.as_ref().ok().map(|c| &c.logging))?;
    let cfg = loaded?;
    cfg.validate().wrap_err("invalid configuration")?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            max_ticks,
            tick_hz,
            startup_delay_ms,
            hold,
            rt,
            stats,
        } => {
            let mut runner = RunnerCfg::from(&cfg.runner);
            if let Some(n) = max_ticks {
                runner.max_ticks = n;
            }
            if let Some(hz) = tick_hz {
                runner.tick_hz = hz;
            }
            if let Some(ms) = startup_delay_ms {
                runner.startup_delay_ms = ms;
            }
            let opts = RunOptions {
                runner,
                hold,
                rt,
                stats,
                json: cli.json,
            };
            let shutdown = install_shutdown_handler();
            let backend = bring_up_backend(&cfg)?;
            let summary = run_track(&cfg, backend, &opts, shutdown)?;
            if summary.reason == StopReason::Shutdown {
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
        }
        Commands::Replay { frames } => {
            replay(&cfg, &frames, cli.json)?;
        }
        Commands::SelfCheck => {
            let backend = bring_up_backend(&cfg)?;
            self_check(&cfg, backend, cli.json)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("reading config {}", cli.config.display()))?;
    let mut cfg = linetrack_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing config {}", cli.config.display()))?;
    if let Some(path) = &cli.calibration {
        cfg.calibration = linetrack_config::load_calibration_csv(path)
            .wrap_err_with(|| format!("loading calibration {}", path.display()))?;
    }
    Ok(cfg)
}

/// Console logs go to stderr (pretty, or JSON with `--json`); `[logging].file`
/// adds a JSON-lines file sink. `RUST_LOG` overrides `--log-level`.
fn init_tracing(cli: &Cli, logging: Option<&linetrack_config::Logging>) -> Result<()> {
    let level = logging
        .and_then(|l| l.level.clone())
        .filter(|_| cli.log_level == "info")
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console_json = cli.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let console_pretty = (!cli.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = match logging.and_then(|l| l.file.as_deref()) {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or(path.as_os_str());
            let appender = match logging.and_then(|l| l.rotation.as_deref()) {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_pretty)
        .with(file_layer)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}

/// Ctrl-C flips the returned flag; the runner checks it between ticks.
fn install_shutdown_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "Ctrl-C handler not installed; stop the vehicle by power");
    }
    flag
}
