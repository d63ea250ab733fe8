//! Case reports, run summary and the process-level verdict.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::check::CheckOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
}

/// Everything one case produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub status: CaseStatus,
    pub checks: Vec<CheckOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panic: Option<String>,
    pub duration_ms: u64,
}

impl CaseReport {
    /// A case passes when none of its checks failed. No checks at all is a pass.
    #[must_use]
    pub fn from_outcomes(
        name: impl Into<String>,
        checks: Vec<CheckOutcome>,
        panic: Option<String>,
        duration_ms: u64,
    ) -> Self {
        let status = if checks.iter().all(|c| c.passed) {
            CaseStatus::Passed
        } else {
            CaseStatus::Failed
        };
        Self {
            name: name.into(),
            status,
            checks,
            panic,
            duration_ms,
        }
    }

    /// Whether every check of the case passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    /// Number of failed checks in this case.
    #[must_use]
    pub fn checks_failed(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Aggregate counters for one harness invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub suite: String,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub cases_run: usize,
    pub cases_failed: usize,
    pub cases: Vec<CaseReport>,
}

impl RunSummary {
    /// Create an empty summary for `suite`.
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            ..Self::default()
        }
    }

    /// Fold one finished case into the totals.
    pub fn merge_case(&mut self, report: CaseReport) {
        let failed = report.checks_failed();
        self.checks_run += report.checks.len();
        self.checks_failed += failed;
        self.checks_passed += report.checks.len() - failed;
        self.cases_run += 1;
        if !report.passed() {
            self.cases_failed += 1;
        }
        self.cases.push(report);
    }

    /// Whether no check failed anywhere in the run.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks_failed == 0
    }

    /// Process-level verdict for the run.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.all_passed() {
            Verdict::Success
        } else {
            Verdict::Failure
        }
    }

    /// Serialize the summary as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `Run: N, Passed: P, Failed: F`
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "Run: {}, Passed: {}, Failed: {}",
            self.checks_run, self.checks_passed, self.checks_failed
        )
    }
}

/// Binary pass/fail signal at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    /// Process exit code: 0 on success, 1 otherwise.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

impl From<Verdict> for ExitCode {
    fn from(verdict: Verdict) -> Self {
        ExitCode::from(verdict.code())
    }
}

/// Print the totals to `out` and return the verdict for the exit code.
pub fn report(summary: &RunSummary, out: &mut dyn Write) -> std::io::Result<Verdict> {
    writeln!(out)?;
    writeln!(
        out,
        "Cases: {}, Failed cases: {}",
        summary.cases_run, summary.cases_failed
    )?;
    writeln!(out, "{}", summary.summary_line())?;
    let verdict = summary.verdict();
    match verdict {
        Verdict::Success => writeln!(out, "RESULT: PASS")?,
        Verdict::Failure => writeln!(out, "RESULT: FAIL")?,
    }
    out.flush()?;
    Ok(verdict)
}

/// Clonable in-memory writer; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Human-facing output streams: progress on `out`, diagnostics on `err`.
pub struct Console {
    pub out: Box<dyn Write>,
    pub err: Box<dyn Write>,
}

impl Console {
    /// Console on the process stdout and stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self {
            out: Box::new(std::io::stdout()),
            err: Box::new(std::io::stderr()),
        }
    }

    /// Console writing into two buffers the caller keeps handles to.
    #[must_use]
    pub fn buffered(out: &SharedBuffer, err: &SharedBuffer) -> Self {
        Self {
            out: Box::new(out.clone()),
            err: Box::new(err.clone()),
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
