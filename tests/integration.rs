// SPDX-License-Identifier: PMPL-1.0-or-later

//! End-to-end integration tests for the `bayzzer` binary.

use std::path::Path;
use std::process::Command;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_bayzzer")
}

fn cc_available() -> bool {
    Command::new(std::env::var("CC").unwrap_or_else(|_| "cc".to_string()))
        .arg("--version")
        .output()
        .is_ok()
}

#[test]
fn cli_rejects_out_of_range_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("safe.c");
    std::fs::write(&src, "int main() {\n    return 0;\n}\n").unwrap();

    let output = Command::new(bin())
        .args(["run", "--target"])
        .arg(&src)
        .args(["--alpha", "1.5", "--time", "1"])
        .output()
        .expect("binary should run");

    assert!(!output.status.success(), "an out-of-range alpha should be rejected");
    assert!(String::from_utf8_lossy(&output.stderr).contains("--alpha"));
}

#[test]
fn cli_run_reports_setup_error_for_alarm_free_source() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("safe.c");
    std::fs::write(&src, "int main() {\n    return 0;\n}\n").unwrap();

    let output = Command::new(bin())
        .args(["run", "--target"])
        .arg(&src)
        .args(["--time", "1"])
        .output()
        .expect("binary should run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no alarms derived"));
}

#[test]
fn cli_diagnostics_runs_and_checks_scratch_directory() {
    let output = Command::new(bin())
        .arg("diagnostics")
        .output()
        .expect("binary should run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("self-diagnostics"));
    assert!(stdout.contains("scratch directory"));
}

#[test]
fn end_to_end_overflow_campaign_finds_bug_and_persists_results() {
    if !cc_available() {
        eprintln!("skipping: no C compiler available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("overflow.c");
    std::fs::write(
        &src,
        "#include <string.h>\n#include <stdio.h>\nint main(int argc, char **argv) {\n    char buffer[10];\n    strcpy(buffer, argv[1]);\n    printf(\"%s\\n\", buffer);\n    return 0;\n}\n",
    )
    .unwrap();
    let output_path = dir.path().join("results.json");

    let output = Command::new(bin())
        .args(["run", "--target"])
        .arg(&src)
        .args(["--time", "20", "--alpha", "1.0", "--output"])
        .arg(&output_path)
        .args(["--quiet"])
        .output()
        .expect("binary should run");

    assert!(output.status.success(), "campaign should complete: {}", String::from_utf8_lossy(&output.stderr));
    assert!(Path::new(&output_path).exists(), "results.json should be written");

    let contents = std::fs::read_to_string(&output_path).unwrap();
    let stats: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert!(stats["rounds_run"].as_u64().unwrap() >= 1);
    assert!(
        !stats["unique_bugs"].as_array().unwrap().is_empty(),
        "expected the overflow to be found within budget: {contents}"
    );
}
