//! Non-terminating branch-coverage micro-test harness.
//!
//! This crate provides:
//! - Assertion recording: checks that record pass/fail and keep going
//! - Case registration: ordered, uniquely named test cases with fixtures
//! - Mocks: call-counting, argument-capturing, failure-injecting stubs
//! - Execution: in-process with panic containment, or one process per case
//! - Reporting: `[PASS]`/`[FAIL]` lines, a totals line and a 0/1 exit code,
//!   plus optional JSONL run logs and JSON summaries

#![forbid(unsafe_code)]

pub mod case;
pub mod check;
pub mod config;
pub mod error;
pub mod isolate;
pub mod mock;
pub mod report;
pub mod runner;
pub mod structured_log;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

pub use case::{Fixture, Suite, TestCase};
pub use check::{ApproxEq, CheckEq, CheckOutcome, DEFAULT_TOLERANCE, Location, Recorder};
pub use config::{HarnessArgs, Isolation, RunConfig};
pub use error::HarnessError;
pub use mock::{FailurePlan, Mock, MockRegistry, Resettable};
pub use report::{CaseReport, CaseStatus, Console, RunSummary, SharedBuffer, Verdict, report};
pub use runner::Runner;

/// Entry point for a suite binary: parse arguments, run, report.
///
/// A suite that failed to build (duplicate or empty case names) is a
/// malformed harness and exits 1 before anything runs.
pub fn harness_main(suite: Result<Suite, HarnessError>) -> ExitCode {
    let args = match HarnessArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // `--help` renders to stdout and is not a failure.
            let _ = err.print();
            return if err.use_stderr() {
                Verdict::Failure.into()
            } else {
                Verdict::Success.into()
            };
        }
    };
    let outcome = suite.and_then(|suite| {
        let config = RunConfig::from_args(args)?;
        execute(suite, config, Console::stdio())
    });
    match outcome {
        Ok(verdict) => verdict.into(),
        Err(err) => {
            eprintln!("branchprobe: {err}");
            Verdict::Failure.into()
        }
    }
}

/// Run `suite` under `config`, writing human output to `console`.
pub fn execute(
    suite: Suite,
    config: RunConfig,
    mut console: Console,
) -> Result<Verdict, HarnessError> {
    if config.list {
        for name in suite.case_names() {
            writeln!(console.out, "{name}")?;
        }
        console.out.flush()?;
        return Ok(Verdict::Success);
    }
    if config.child && config.exact.is_none() {
        return Err(HarnessError::ChildProtocol {
            case: suite.name().to_string(),
            detail: "--child requires --exact".to_string(),
        });
    }
    if config.timeout.is_some() && config.isolation == Isolation::InProcess && !config.child {
        writeln!(
            console.err,
            "branchprobe: --timeout-ms is only enforced with --isolate"
        )?;
    }

    let child = config.child;
    let report_path = config.report_path.clone();
    let log_path = config.log_path.clone();
    let mut runner = Runner::new(config).with_console(console);
    let summary = runner.run_all(suite)?;

    if child {
        isolate::write_child_report(&summary, &mut *runner.console_mut().out)?;
        return Ok(summary.verdict());
    }
    if let Some(path) = report_path {
        write_report_file(&summary, &path, log_path.as_deref(), runner.run_id())?;
    }
    Ok(report(&summary, &mut *runner.console_mut().out)?)
}

#[derive(Serialize)]
struct RunReportFile<'a> {
    summary: &'a RunSummary,
    artifacts: structured_log::ArtifactIndex,
}

fn write_report_file(
    summary: &RunSummary,
    path: &Path,
    log_path: Option<&Path>,
    run_id: &str,
) -> Result<(), HarnessError> {
    let mut artifacts = structured_log::ArtifactIndex::new(run_id);
    if let Some(log) = log_path {
        artifacts.add_file(log, "run_log")?;
    }
    let body = serde_json::to_string_pretty(&RunReportFile { summary, artifacts })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(())
}
