//! Integration test: fault containment in the misbehaving suite binary.
//!
//! Validates that:
//! 1. A failed check and a panic each fail their case without stopping the run.
//! 2. With `--isolate`, an aborting case is reported and the run continues.
//! 3. With `--timeout-ms`, a hanging case is killed and reported.
//! 4. Any failure turns the process exit code into 1.
//! 5. Passing cases stay passing when isolated, whatever their name or output.
//!
//! Run: cargo test -p branchprobe-harness --test faults_cli_test

use std::process::{Command, Output};
use std::time::{Duration, Instant};

fn faults(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_branchprobe-faults"))
        .args(args)
        .output()
        .expect("faults binary should run")
}

#[test]
fn failed_check_reports_expected_and_actual() {
    let output = faults(&["--exact", "fails_check"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("[FAIL] fails_check (1 of 2 checks failed)"));
    assert!(stdout.contains("Run: 2, Passed: 1, Failed: 1"));
    assert!(stderr.contains("length mismatch"));
    assert!(stderr.contains("expected: 99"));
    assert!(stderr.contains("actual: 6"));
}

#[test]
fn panic_is_contained_in_process() {
    let output = faults(&["--exact", "panics"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("[FAIL] panics"));
    assert!(stdout.contains("RESULT: FAIL"));
    assert!(
        stderr.contains("case 'panics' panicked: focal function blew up"),
        "stderr: {stderr}"
    );
}

#[test]
fn passing_case_alone_exits_zero() {
    let output = faults(&["--exact", "passes"]);
    assert!(output.status.success());
}

#[test]
fn isolated_run_survives_abort_and_hang() {
    let started = Instant::now();
    let output = faults(&["--isolate", "--timeout-ms", "500"]);
    assert!(
        started.elapsed() < Duration::from_secs(20),
        "hanging case was not killed"
    );
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("[PASS] passes"));
    assert!(stdout.contains("[FAIL] fails_check"));
    assert!(stdout.contains("[FAIL] panics"));
    assert!(stdout.contains("[FAIL] aborts"));
    assert!(stdout.contains("[FAIL] hangs"));
    assert!(stdout.contains("[PASS] -dash_prefixed_name"));
    assert!(stdout.contains("[PASS] binary_stdout"));
    assert!(stdout.contains("[PASS] passes_after_faults"));
    assert!(stdout.contains("Cases: 8, Failed cases: 4"));

    assert!(stderr.contains("case 'aborts' process exited abnormally"));
    assert!(stderr.contains("case 'hangs' exceeded timeout of 500 ms and was killed"));
}

#[test]
fn timeout_without_isolation_is_flagged() {
    let output = faults(&["--exact", "passes", "--timeout-ms", "100"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--timeout-ms is only enforced with --isolate"));
}

#[test]
fn bad_flag_exits_one() {
    let output = faults(&["--tolerance=-1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("tolerance"));
}

#[test]
fn dash_prefixed_case_runs_isolated() {
    let output = faults(&["--isolate", "--exact=-dash_prefixed_name"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "stdout:\n{stdout}\nstderr:\n{stderr}"
    );
    assert!(stdout.contains("[PASS] -dash_prefixed_name"));
}

#[test]
fn binary_output_is_forwarded_and_case_passes_isolated() {
    let output = faults(&["--isolate", "--exact", "binary_stdout"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\u{fffd}\u{fffd}"), "stdout: {stdout}");
    assert!(stdout.contains("[PASS] binary_stdout"));
    assert!(!stdout.contains("exited abnormally"));
}
