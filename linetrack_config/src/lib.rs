#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration parsing for the line tracker.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` has defaults matching the reference
//!   vehicle, so a config file only needs to state what differs.
//! - The calibration CSV loader enforces headers and one row per channel.
use serde::Deserialize;

/// Channels on the reflectance bar. Mirrors `linetrack_traits::CHANNELS`,
/// which this crate does not depend on; `linetrack_core` asserts they agree.
pub const CHANNELS: usize = 8;

/// Calibration CSV schema.
///
/// Expected headers:
/// channel,min,max
///
/// Example:
/// channel,min,max
/// 0,596,1802
/// 1,527,1444
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub channel: usize,
    pub min: u16,
    pub max: u16,
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub left_pwm: u8,
    pub left_dir: u8,
    pub left_sleep: Option<u8>,
    pub right_pwm: u8,
    pub right_dir: u8,
    pub right_sleep: Option<u8>,
    pub led: Option<u8>,
    /// Sensor pins, left to right.
    pub sensors: [u8; CHANNELS],
}

/// Per-channel floor and ceiling as measured on the course.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Calibration {
    pub sensor_min: [u16; CHANNELS],
    pub sensor_max: [u16; CHANNELS],
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            sensor_min: [596, 527, 573, 596, 550, 573, 575, 667],
            sensor_max: [1802, 1444, 1397, 1113, 1065, 1563, 1224, 1833],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Weights {
    /// Active until the first crossing.
    pub outbound: [i32; CHANNELS],
    /// Active after the 180° turn.
    pub returning: [i32; CHANNELS],
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            outbound: [-15, -10, -8, -11, 14, 16, 18, 20],
            returning: [-20, -18, -16, -14, 11, 8, 10, 15],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    pub kp: f32,
    pub kd: f32,
    /// Forward duty when the line is centred.
    pub base_speed: u16,
    /// Multiplier applied to a wheel's magnitude when it has to run in reverse.
    pub reverse_gain: f32,
    /// Largest duty the actuator accepts; commands are clamped to it.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DetectorCfg {
    /// Normalized value (per-mille) a channel must exceed to count as saturated.
    pub saturation_threshold: i32,
    /// Saturated channels needed to call the tick a marker tick.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Control tick rate; 0 runs ticks back to back.
    pub tick_hz: u32,
    /// Stop after this many ticks even if not halted; 0 disables the cap.
    pub max_ticks: u64,
    /// Pause between bring-up and the first tick, to place the vehicle on the line.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Cap on the RC discharge time per channel; also the raw reading for "black".
    pub sensor_timeout_us: u64,
    /// How long each sensor capacitor is charged before timing its discharge.
    pub charge_us: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_timeout_us: 2500,
            charge_us: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub detector: DetectorCfg,
    #[serde(default)]
    pub turn: TurnCfg,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Calibration {
    /// Build a table from CSV rows; every channel must appear exactly once.
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() != CHANNELS {
            eyre::bail!(
                "calibration requires exactly {CHANNELS} rows, got {}",
                rows.len()
            );
        }
        let mut seen = [false; CHANNELS];
        let mut out = Self {
            sensor_min: [0; CHANNELS],
            sensor_max: [0; CHANNELS],
        };
        for row in rows {
            if row.channel >= CHANNELS {
                eyre::bail!(
                    "calibration channel {} out of range 0..{CHANNELS}",
                    row.channel
                );
            }
            if seen[row.channel] {
                eyre::bail!("calibration channel {} listed twice", row.channel);
            }
            seen[row.channel] = true;
            out.sensor_min[row.channel] = row.min;
            out.sensor_max[row.channel] = row.max;
        }
        out.check()?;
        Ok(out)
    }

    fn check(&self) -> eyre::Result<()> {
        for (ch, (min, max)) in self.sensor_min.iter().zip(&self.sensor_max).enumerate() {
            if max <= min {
                eyre::bail!("calibration.sensor_max[{ch}] must be > sensor_min[{ch}] ({max} <= {min})");
            }
        }
        Ok(())
    }
}

impl TryFrom<&[CalibrationRow]> for Calibration {
    type Error = eyre::Report;
    fn try_from(rows: &[CalibrationRow]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Calibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["channel", "min", "max"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'channel,min,max', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::with_capacity(CHANNELS);
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Calibration::try_from(rows.as_slice())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        self.calibration.check()?;

        // Control
        if !self.control.kp.is_finite() || self.control.kp < 0.0 {
            eyre::bail!("control.kp must be finite and >= 0");
        }
        if !self.control.kd.is_finite() || self.control.kd < 0.0 {
            eyre::bail!("control.kd must be finite and >= 0");
        }
        if !self.control.reverse_gain.is_finite() || self.control.reverse_gain < 1.0 {
            eyre::bail!("control.reverse_gain must be finite and >= 1.0");
        }
        if self.control.max_duty == 0 {
            eyre::bail!("control.max_duty must be > 0");
        }
        if self.control.base_speed > self.control.max_duty {
            eyre::bail!("control.base_speed must be <= control.max_duty");
        }

        // Detector
        if self.detector.saturation_threshold <= 0 {
            eyre::bail!("detector.saturation_threshold must be > 0");
        }
        if !(1..=CHANNELS).contains(&self.detector.marker_min_channels) {
            eyre::bail!("detector.marker_min_channels must be in [1, {CHANNELS}]");
        }

        // Turn
        if self.turn.duty == 0 || self.turn.duty > self.control.max_duty {
            eyre::bail!("turn.duty must be in [1, control.max_duty]");
        }
        if self.turn.duration_ms == 0 {
            eyre::bail!("turn.duration_ms must be >= 1");
        }
        if self.turn.duration_ms > 60 * 1000 {
            eyre::bail!("turn.duration_ms is unreasonably large (>60s)");
        }

        // Runner
        if self.runner.tick_hz > 100_000 {
            eyre::bail!("runner.tick_hz is unreasonably large (>100kHz)");
        }
        if self.runner.startup_delay_ms > 60 * 1000 {
            eyre::bail!("runner.startup_delay_ms is unreasonably large (>60s)");
        }

        // Hardware
        if self.hardware.sensor_timeout_us == 0 {
            eyre::bail!("hardware.sensor_timeout_us must be >= 1");
        }
        if self.hardware.sensor_timeout_us > u64::from(u16::MAX) {
            eyre::bail!("hardware.sensor_timeout_us must fit a raw reading (<= 65535)");
        }
        if self.hardware.charge_us == 0 {
            eyre::bail!("hardware.charge_us must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
