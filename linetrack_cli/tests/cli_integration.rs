use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config; the sim backend ignores pins but the schema requires them.
// The startup wait is zeroed so runs finish immediately.
const VALID: &str = r#"
[pins]
left_pwm = 12
left_dir = 5
right_pwm = 13
right_dir = 6
led = 4
sensors = [17, 27, 23, 24, 25, 16, 26, 20]

[runner]
startup_delay_ms = 0
"#;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("linetrack.toml");
    fs::write(&path, body).unwrap();
    path
}

fn linetrack(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("linetrack").unwrap();
    cmd.arg("--config")
        .arg(cfg)
        .env_remove("RUST_LOG")
        .env("LINETRACK_SIM_LEG_TICKS", "5")
        .env("LINETRACK_SIM_STRIPE_TICKS", "3");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run"], 0, "2 crossings", "stdout")]
#[case(&["run", "--max-ticks", "3"], 0, "tick_limit", "stdout")]
#[case(&["run", "--stats"], 0, "Loop stats", "stdout")]
#[case(&["self-check"], 0, "Self-check OK (backend: sim)", "stdout")]
#[case(&["replay"], 2, "--frames", "stderr")]
#[case(&["fly"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    let mut cmd = linetrack(&cfg);
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn run_json_summary_reports_two_crossings() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    let out = linetrack(&cfg)
        .args(["--json", "run"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["reason"], "halted");
    assert_eq!(v["crossings"], 2);
    assert_eq!(v["ticks"], 15);
    assert_eq!(v["phase"], "returning");
    assert!(v["elapsed_ms"].as_u64().unwrap() >= 600);
}

#[rstest]
fn startup_delay_flag_overrides_config() {
    let dir = tempdir().unwrap();
    let body = VALID.replace("startup_delay_ms = 0", "startup_delay_ms = 60000");
    let cfg = write_config(&dir, &body);
    let started = std::time::Instant::now();
    linetrack(&cfg)
        .args(["run", "--startup-delay-ms", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 crossings"));
    assert!(started.elapsed() < std::time::Duration::from_secs(30));
}

#[rstest]
fn invalid_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let body = format!("{VALID}\n[control]\nmax_duty = 0\n");
    let cfg = write_config(&dir, &body);
    linetrack(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("max_duty"));
}

#[rstest]
fn missing_pins_is_a_toml_error() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[turn]\nduty = 90\n");
    linetrack(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not valid TOML for this schema"));
}

#[rstest]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("nope.toml");
    linetrack(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("nope.toml"));
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "sensor,lo,hi").unwrap();
    writeln!(f, "0,596,1802").unwrap();

    linetrack(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "Invalid headers in calibration CSV",
        ));
}

#[rstest]
fn calibration_csv_overrides_config_table() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);

    let csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "channel,min,max").unwrap();
    for ch in 0..8 {
        writeln!(f, "{ch},0,1000").unwrap();
    }

    let out = linetrack(&cfg)
        .arg("--json")
        .arg("--calibration")
        .arg(&csv)
        .arg("self-check")
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    // Identity table: normalized == raw for the first simulated frame.
    assert_eq!(
        v["normalized"],
        serde_json::json!([400, 400, 400, 2500, 2500, 400, 400, 400])
    );
}

fn write_frames(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("frames.csv");
    let line = "400,400,400,2500,2500,400,400,400";
    let stripe = "2500,2500,2500,2500,2500,2500,2500,2500";
    let rows = [line, stripe, stripe, line, stripe, stripe, line];
    let mut body = String::from("s0,s1,s2,s3,s4,s5,s6,s7\n");
    for r in rows {
        body.push_str(r);
        body.push('\n');
    }
    fs::write(&path, body).unwrap();
    path
}

#[rstest]
fn replay_json_lines_trace_both_crossings() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    let frames = write_frames(&dir);

    let out = linetrack(&cfg)
        .arg("--json")
        .arg("replay")
        .arg("--frames")
        .arg(&frames)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 8);
    let statuses: Vec<&str> = lines[..7]
        .iter()
        .map(|v| v["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        [
            "tracking", "tracking", "turned", "tracking", "tracking", "halted", "halted"
        ]
    );
    assert_eq!(lines[2]["phase"], "returning");
    assert!(lines[2].get("left").is_none());
    assert_eq!(lines[0]["high_count"], 2);
    assert_eq!(lines[7]["crossings"], 2);
    assert_eq!(lines[7]["halted"], true);
}

#[rstest]
fn replay_rejects_bad_frame_headers() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALID);
    let frames = dir.path().join("frames.csv");
    fs::write(&frames, "a,b,c\n1,2,3\n").unwrap();

    linetrack(&cfg)
        .arg("replay")
        .arg("--frames")
        .arg(&frames)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid headers in frames CSV"));
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let body = format!("{VALID}\n[turn]\nduration_ms = 0\n");
    let cfg = write_config(&dir, &body);
    let out = linetrack(&cfg)
        .args(["--json", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["exit_code"], 3);
}
