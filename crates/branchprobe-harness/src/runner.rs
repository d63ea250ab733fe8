//! Test execution engine.
//!
//! Cases run one after another on the calling thread, in registration order.
//! A panicking body is caught at the case boundary and recorded as a single
//! failed check; the run always continues with the next case.

use std::any::Any;
use std::cell::RefCell;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::case::{CaseBody, Suite};
use crate::check::{Location, Recorder};
use crate::config::{Isolation, RunConfig};
use crate::error::HarnessError;
use crate::isolate;
use crate::report::{CaseReport, Console, RunSummary};
use crate::structured_log::{LogEmitter, LogLevel, Outcome, unix_millis};

/// Executes a [`Suite`] and folds its cases into a [`RunSummary`].
pub struct Runner {
    config: RunConfig,
    console: Console,
    log: Option<LogEmitter>,
    run_id: String,
}

impl Runner {
    /// Create a runner that writes to stdout/stderr.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            console: Console::stdio(),
            log: None,
            run_id: format!("run-{}", unix_millis()),
        }
    }

    /// Write human output to `console` instead of stdout/stderr.
    #[must_use]
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Send structured events to `log` instead of the configured log path.
    #[must_use]
    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = Some(log);
        self
    }

    /// Identifier of this run, used in log trace ids and the artifact index.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Output streams, for writing the final report after the run.
    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Run every case of `suite` (or just `--exact`) and return the totals.
    ///
    /// Errors are reserved for a malformed invocation or unwritable output;
    /// failing and panicking cases are part of the summary.
    ///
    /// The process panic hook is swapped for the duration of the run. Runs on
    /// different threads take turns; a run nested inside a case body is
    /// allowed.
    pub fn run_all(&mut self, mut suite: Suite) -> Result<RunSummary, HarnessError> {
        if let Some(name) = &self.config.exact {
            suite.retain_exact(name)?;
        }
        if self.log.is_none()
            && let Some(path) = &self.config.log_path
        {
            self.log = Some(LogEmitter::to_file(path, suite.name(), &self.run_id)?);
        }

        let (suite_name, cases, mocks) = suite.into_parts();
        let mut summary = RunSummary::new(&suite_name);
        let chatty = !self.config.child;

        if chatty {
            writeln!(
                self.console.out,
                "branchprobe: running {} case(s) from suite '{suite_name}'",
                cases.len()
            )?;
        }
        self.log_event(LogLevel::Info, "run_start", None, |e| {
            e.with_details(serde_json::json!({ "cases": cases.len(), "mocks": mocks.names() }))
        })?;

        let _capture = PanicCapture::install();
        for case in cases {
            let (name, body) = case.into_parts();
            mocks.reset_all();
            if chatty && !self.config.quiet {
                writeln!(self.console.out, "[RUN ] {name}")?;
                self.console.out.flush()?;
            }
            self.log_event(LogLevel::Debug, "case_start", Some(name.as_str()), |e| e)?;

            let report = match self.config.isolation.clone() {
                Isolation::InProcess => self.run_in_process(&name, body),
                Isolation::Subprocess { program } => isolate::run_in_child(
                    &program,
                    &name,
                    &self.config,
                    &mut self.console,
                )?,
            };
            mocks.reset_all();

            if chatty {
                if report.passed() {
                    writeln!(self.console.out, "[PASS] {name}")?;
                } else {
                    writeln!(
                        self.console.out,
                        "[FAIL] {name} ({} of {} checks failed)",
                        report.checks_failed(),
                        report.checks.len()
                    )?;
                }
            }
            self.log_case(&report)?;
            summary.merge_case(report);
        }

        self.log_event(LogLevel::Info, "run_end", None, |e| {
            e.with_outcome(if summary.all_passed() {
                Outcome::Pass
            } else {
                Outcome::Fail
            })
            .with_exit_code(i32::from(summary.verdict().code()))
            .with_details(serde_json::json!({
                "checks_run": summary.checks_run,
                "checks_failed": summary.checks_failed,
                "cases_run": summary.cases_run,
                "cases_failed": summary.cases_failed,
            }))
        })?;
        if let Some(log) = self.log.as_mut() {
            log.flush()?;
        }
        self.console.out.flush()?;
        self.console.err.flush()?;
        Ok(summary)
    }

    fn run_in_process(&mut self, name: &str, body: CaseBody) -> CaseReport {
        let started = Instant::now();
        let mut rec = Recorder::new(name, self.config.tolerance, &mut *self.console.err);
        // A panic caught inside an earlier case leaves its location behind.
        take_panic_location();
        let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut rec)));
        let panic = match result {
            Ok(()) => None,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                rec.fail(
                    format!("case '{name}' panicked: {message}"),
                    take_panic_location(),
                );
                Some(message)
            }
        };
        let checks = rec.into_outcomes();
        CaseReport::from_outcomes(name, checks, panic, elapsed_ms(started))
    }

    fn log_case(&mut self, report: &CaseReport) -> Result<(), HarnessError> {
        if self.log.is_none() {
            return Ok(());
        }
        for check in report.checks.iter().filter(|c| !c.passed) {
            self.log_event(LogLevel::Error, "check_failed", Some(report.name.as_str()), |e| {
                let e = e
                    .with_outcome(Outcome::Fail)
                    .with_comparison(check.expected.clone(), check.actual.clone())
                    .with_details(serde_json::json!({ "description": check.description }));
                match &check.location {
                    Some(loc) => e.with_location(loc.file.clone(), loc.line),
                    None => e,
                }
            })?;
        }
        if let Some(message) = &report.panic {
            self.log_event(LogLevel::Error, "case_panic", Some(report.name.as_str()), |e| {
                e.with_outcome(Outcome::Error)
                    .with_details(serde_json::json!({ "message": message }))
            })?;
        }
        self.log_event(LogLevel::Info, "case_end", Some(report.name.as_str()), |e| {
            e.with_outcome(if report.passed() {
                Outcome::Pass
            } else {
                Outcome::Fail
            })
            .with_duration_ms(report.duration_ms)
        })
    }

    fn log_event(
        &mut self,
        level: LogLevel,
        event: &str,
        case: Option<&str>,
        fill: impl FnOnce(crate::structured_log::LogEntry) -> crate::structured_log::LogEntry,
    ) -> Result<(), HarnessError> {
        let Some(log) = self.log.as_mut() else {
            return Ok(());
        };
        let mut entry = log.entry(level, event);
        if let Some(case) = case {
            entry = entry.with_case(case);
        }
        log.emit(&fill(entry))?;
        Ok(())
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Panic location capture
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_PANIC: RefCell<Option<Location>> = const { RefCell::new(None) };
}

type PanicHook = Box<dyn Fn(&panic::PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Held while a capture is installed, so hooks are restored in the order they
/// were taken.
static HOOK_LOCK: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Replaces the default panic printout with a hook that remembers where the
/// panic happened, restoring the previous hook on drop.
struct PanicCapture {
    previous: Option<PanicHook>,
    _serial: ReentrantMutexGuard<'static, ()>,
}

impl PanicCapture {
    fn install() -> Self {
        let serial = HOOK_LOCK.lock();
        let previous = panic::take_hook();
        panic::set_hook(Box::new(|info| {
            let location = info.location().map(|l| Location {
                file: l.file().to_string(),
                line: l.line(),
            });
            LAST_PANIC.with(|slot| *slot.borrow_mut() = location);
        }));
        Self {
            previous: Some(previous),
            _serial: serial,
        }
    }
}

impl Drop for PanicCapture {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            panic::set_hook(previous);
        }
    }
}

fn take_panic_location() -> Option<Location> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}
