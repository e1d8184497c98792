use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "tourtrack-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("read output");
    serde_json::from_str(&content).expect("json report")
}

#[test]
fn cli_lists_demo_key_points() {
    let exe = env!("CARGO_BIN_EXE_tourtrack-sim");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-key-points", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Key points of belgrade-old-town"));
    assert!(content.contains("Republic Square"));
    assert!(content.contains("Kalemegdan Fortress"));
}

#[test]
fn cli_simulated_demo_completes_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_tourtrack-sim");
    let output_path = temp_path("simulate");
    let status = Command::new(exe)
        .args([
            "--tick-ms",
            "5",
            "--poll-ms",
            "2",
            "--seed",
            "7",
            "--max-seconds",
            "60",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let report = read_json(&output_path);
    assert_eq!(report["ending"], "completed");
    assert_eq!(report["status"], "Completed");
    assert_eq!(report["completed"], 3);
    assert_eq!(report["source"], "simulated");
    assert_eq!(report["execution"]["ID"].as_str().map(str::len), Some(24));
}

#[test]
fn cli_manual_positions_abandon_early() {
    let exe = env!("CARGO_BIN_EXE_tourtrack-sim");
    let output_path = temp_path("manual");
    let output = Command::new(exe)
        .args([
            "--mode",
            "manual",
            "--positions",
            "44.8163,20.4602",
            "--poll-ms",
            "5",
            "--abandon-after",
            "0.5",
            "--report",
            "markdown",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("- **Status**: Abandoned"));
    assert!(content.contains("- **Key points**: 1/3"));
    assert!(content.contains("| 3 | Kalemegdan Fortress | - |"));
}

#[test]
fn cli_rejects_invalid_tour_file() {
    let exe = env!("CARGO_BIN_EXE_tourtrack-sim");
    let tour_path = temp_path("bad-tour");
    std::fs::write(&tour_path, "{ not json").expect("write tour");
    let output = Command::new(exe)
        .arg("--tour")
        .arg(&tour_path)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid tour"));
}

#[test]
fn cli_times_out_with_failure_status() {
    let exe = env!("CARGO_BIN_EXE_tourtrack-sim");
    let output_path = temp_path("timeout");
    let output = Command::new(exe)
        .args([
            "--mode",
            "manual",
            "--positions",
            "0,0",
            "--poll-ms",
            "5",
            "--max-seconds",
            "0.2",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert_eq!(output.status.code(), Some(1));
    let report = read_json(&output_path);
    assert_eq!(report["ending"], "timed_out");
    assert_eq!(report["status"], "Abandoned");
}
