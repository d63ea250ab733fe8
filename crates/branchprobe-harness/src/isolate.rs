//! Per-case process isolation.
//!
//! The parent re-executes the suite binary as `--exact <case> --child`. The
//! child runs that one case in-process and prints its [`CaseReport`] as one
//! marked JSON line on stdout. Anything that stops the child from doing so
//! (abort, signal, deadline) is recorded as a single failed check, so faults
//! `catch_unwind` cannot see still leave the rest of the run intact.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::check::CheckOutcome;
use crate::config::RunConfig;
use crate::error::HarnessError;
use crate::report::{CaseReport, Console, RunSummary};
use crate::runner::elapsed_ms;

/// Prefix of the stdout line carrying a child's case report.
pub const REPORT_MARKER: &str = "BRANCHPROBE_CASE_REPORT ";

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Run `case` in a child process of `program` and collect its report.
///
/// Child stdout lines other than the report are forwarded to the console;
/// child stderr is inherited so diagnostics appear as they happen.
pub fn run_in_child(
    program: &Path,
    case: &str,
    config: &RunConfig,
    console: &mut Console,
) -> Result<CaseReport, HarnessError> {
    let started = Instant::now();
    let mut child = Command::new(program)
        // `=` keeps a case name that starts with `-` from reading as a flag.
        .arg(format!("--exact={case}"))
        .arg("--child")
        .arg("--tolerance")
        .arg(config.tolerance.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let mut stdout = child.stdout.take().ok_or_else(|| HarnessError::ChildProtocol {
        case: case.to_string(),
        detail: "stdout was not captured".to_string(),
    })?;
    // Drain on a separate thread so a chatty child cannot block on a full pipe.
    // Case output is arbitrary bytes, so it is captured raw.
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let read = stdout.read_to_end(&mut buf);
        (buf, read)
    });

    let status = wait_with_deadline(&mut child, config.timeout)?;
    let (captured, read) = reader.join().unwrap_or_else(|_| {
        (
            Vec::new(),
            Err(std::io::Error::other("stdout reader thread panicked")),
        )
    });
    if let Err(err) = read {
        writeln!(console.err, "  [{case}] child stdout truncated: {err}")?;
    }

    let ChildOutput { report, forwarded } = split_child_output(&captured);
    for line in &forwarded {
        writeln!(console.out, "{line}")?;
    }

    let failure = match (status, report) {
        (Some(_), Some(report)) => return Ok(report),
        (None, _) => format!(
            "case '{case}' exceeded timeout of {} ms and was killed",
            config.timeout.unwrap_or_default().as_millis()
        ),
        (Some(status), None) => format!("case '{case}' process exited abnormally ({status})"),
    };
    writeln!(console.err, "  [{case}] {failure}")?;
    Ok(failed_report(case, failure, elapsed_ms(started)))
}

/// Child stdout split into the case report and everything else.
#[derive(Debug, Default)]
struct ChildOutput {
    report: Option<CaseReport>,
    forwarded: Vec<String>,
}

/// Find the report line in `captured` and decode the rest lossily.
///
/// The marker may follow case output that lacked a trailing newline; the
/// bytes before it are forwarded like any other line.
fn split_child_output(captured: &[u8]) -> ChildOutput {
    let marker = REPORT_MARKER.as_bytes();
    let mut out = ChildOutput::default();
    for line in captured.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match line.windows(marker.len()).position(|w| w == marker) {
            Some(at) => {
                if at > 0 {
                    out.forwarded.push(String::from_utf8_lossy(&line[..at]).into_owned());
                }
                out.report = serde_json::from_slice(&line[at + marker.len()..]).ok();
            }
            None => out.forwarded.push(String::from_utf8_lossy(line).into_owned()),
        }
    }
    // `split` yields an empty tail after a final newline.
    if captured.ends_with(b"\n") {
        out.forwarded.pop();
    }
    out
}

/// Print the single case of a child run as a marked JSON line.
pub fn write_child_report(summary: &RunSummary, out: &mut dyn Write) -> Result<(), HarnessError> {
    let report = summary
        .cases
        .first()
        .ok_or_else(|| HarnessError::ChildProtocol {
            case: summary.suite.clone(),
            detail: "child ran no case".to_string(),
        })?;
    writeln!(out, "{REPORT_MARKER}{}", serde_json::to_string(report)?)?;
    out.flush()?;
    Ok(())
}

fn failed_report(case: &str, description: String, elapsed: u64) -> CaseReport {
    CaseReport::from_outcomes(
        case,
        vec![CheckOutcome {
            description,
            passed: false,
            expected: None,
            actual: None,
            location: None,
        }],
        None,
        elapsed,
    )
}

/// Wait for `child`; `None` means the deadline passed and the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
