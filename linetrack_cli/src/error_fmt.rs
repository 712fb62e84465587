//! Human-readable error descriptions, exit codes and structured JSON errors.

use linetrack_core::error::{BuildError, TrackerError};

/// Exit code for a bad config or calibration file.
pub const EXIT_CONFIG: u8 = 3;
/// Exit code for hardware faults and sensor timeouts.
pub const EXIT_HARDWARE: u8 = 4;
/// Exit code for an operator abort (Ctrl-C) before the run completed.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensors => {
                "What happened: No sensor array was provided to the controller.\nLikely causes: The reflectance bar failed to initialize or was not wired into the builder.\nHow to fix: Check the [pins].sensors assignment and that bring-up succeeded.".to_string()
            }
            BuildError::MissingWheels => {
                "What happened: The controller was built without both wheels.\nLikely causes: A motor driver failed to initialize.\nHow to fix: Check the left/right pwm and dir pins in [pins].".to_string()
            }
            BuildError::InvertedCalibration { channel, min, max } => format!(
                "What happened: Calibration for channel {channel} is inverted (max {max} <= min {min}).\nLikely causes: Columns swapped in the calibration CSV or a typo in [calibration].\nHow to fix: Re-measure the channel over floor and tape; max must exceed min."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<TrackerError>() {
        return match te {
            TrackerError::Timeout => "What happened: A hardware operation timed out.\nLikely causes: Sensor bar unpowered or a pin miswired.\nHow to fix: Verify power and the [pins].sensors wiring, or raise hardware.sensor_timeout_us.".to_string(),
            TrackerError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Wrong pin numbers, a pin claimed by another process, or missing GPIO permissions.\nHow to fix: Fix [pins] and ensure access to /dev/gpiomem."
            ),
            TrackerError::State(msg) => format!(
                "What happened: {msg}.\nHow to fix: Restart the program to begin a new run."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this schema.\nDetails: {te}\nHow to fix: Compare against etc/linetrack.toml; [pins] is required."
        );
    }

    // Whole context chain, outermost first.
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'channel,min,max'.".to_string();
    }
    if lower.contains("frames csv must have headers") {
        return "Invalid headers in frames CSV. Expected 's0,s1,s2,s3,s4,s5,s6,s7'.".to_string();
    }
    if lower.contains("must be") || lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit code for a failed command.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    if err.downcast_ref::<BuildError>().is_some() || err.downcast_ref::<toml::de::Error>().is_some()
    {
        return EXIT_CONFIG;
    }
    match err.downcast_ref::<TrackerError>() {
        Some(
            TrackerError::Hardware(_) | TrackerError::HardwareFault(_) | TrackerError::Timeout,
        ) => EXIT_HARDWARE,
        _ if is_config_message(err) => EXIT_CONFIG,
        _ => 1,
    }
}

fn is_config_message(err: &eyre::Report) -> bool {
    let lower = format!("{err:#}").to_ascii_lowercase();
    lower.contains("must be") || lower.contains("must have headers") || lower.contains("config")
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<TrackerError>() {
        Some(TrackerError::Timeout) => "Timeout",
        Some(TrackerError::Hardware(_) | TrackerError::HardwareFault(_)) => "Hardware",
        Some(TrackerError::State(_)) => "State",
        None if exit_code_for_error(err) == EXIT_CONFIG => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
