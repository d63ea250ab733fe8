//! Command-line surface and run configuration.
//!
//! With no arguments the harness runs every case in-process and writes only
//! to stdout/stderr.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::check::DEFAULT_TOLERANCE;
use crate::error::HarnessError;

/// Branch-coverage micro-test harness.
#[derive(Debug, Clone, Parser)]
#[command(name = "branchprobe")]
#[command(about = "Run a branchprobe test suite")]
pub struct HarnessArgs {
    /// Print the registered case names in order and exit.
    #[arg(long)]
    pub list: bool,
    /// Run only the case with exactly this name.
    #[arg(long)]
    pub exact: Option<String>,
    /// Run every case in its own child process.
    #[arg(long)]
    pub isolate: bool,
    /// Per-case deadline in milliseconds (enforced with --isolate only).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Absolute tolerance for float equality checks.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE, value_parser = parse_tolerance)]
    pub tolerance: f64,
    /// Write a JSONL structured run log to this path.
    #[arg(long)]
    pub log: Option<PathBuf>,
    /// Write the JSON run summary and artifact index to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Suppress per-case start markers.
    #[arg(long)]
    pub quiet: bool,
    /// Internal: act as the child of an isolated run.
    #[arg(long, hide = true)]
    pub child: bool,
}

fn parse_tolerance(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|err| format!("invalid tolerance '{raw}': {err}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("tolerance must be finite and non-negative, got {raw}"));
    }
    Ok(value)
}

/// How case bodies are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// Call the body on the runner thread behind `catch_unwind`.
    InProcess,
    /// Re-run `program --exact <case> --child` for every case.
    Subprocess { program: PathBuf },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub list: bool,
    pub exact: Option<String>,
    pub isolation: Isolation,
    pub timeout: Option<Duration>,
    pub tolerance: f64,
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub quiet: bool,
    pub child: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            list: false,
            exact: None,
            isolation: Isolation::InProcess,
            timeout: None,
            tolerance: DEFAULT_TOLERANCE,
            log_path: None,
            report_path: None,
            quiet: false,
            child: false,
        }
    }
}

impl RunConfig {
    /// Resolve parsed arguments. `--isolate` re-executes the current binary.
    pub fn from_args(args: HarnessArgs) -> Result<Self, HarnessError> {
        let isolation = if args.isolate && !args.child {
            Isolation::Subprocess {
                program: std::env::current_exe()?,
            }
        } else {
            Isolation::InProcess
        };
        Ok(Self {
            list: args.list,
            exact: args.exact,
            isolation,
            timeout: args.timeout_ms.map(Duration::from_millis),
            tolerance: args.tolerance,
            log_path: args.log,
            report_path: args.report,
            quiet: args.quiet,
            child: args.child,
        })
    }

    /// Set how cases are executed.
    #[must_use]
    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the per-case deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default float tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Run only the case called `name`.
    #[must_use]
    pub fn with_exact(mut self, name: impl Into<String>) -> Self {
        self.exact = Some(name.into());
        self
    }

    /// Suppress per-case start markers.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}
