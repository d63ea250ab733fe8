//! Suite of deliberately misbehaving cases.
//!
//! Shows how each fault class is contained. `aborts` and `hangs` can only be
//! survived with `--isolate` (plus `--timeout-ms` for `hangs`); run the rest
//! in-process with `--exact`. `-dash_prefixed_name` and `binary_stdout` pass
//! and must keep passing when isolated.

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use branchprobe_harness::{HarnessError, Suite, check, check_eq, harness_main};

fn build_suite() -> Result<Suite, HarnessError> {
    let mut suite = Suite::new("branchprobe-faults");
    suite.register("passes", |rec| {
        check!(rec, 1 + 1 == 2);
    })?;
    suite.register("fails_check", |rec| {
        check_eq!(rec, "actual".len(), 99, "length mismatch");
        check!(rec, true, "later checks still run");
    })?;
    suite.register("panics", |rec| {
        check!(rec, true, "before the panic");
        let parsed: Result<u32, _> = "not a number".parse::<u32>();
        let value = parsed.unwrap_or_else(|err| panic!("focal function blew up: {err}"));
        check_eq!(rec, value, 0);
    })?;
    suite.register("aborts", |_| {
        std::process::abort();
    })?;
    suite.register("hangs", |_| {
        std::thread::sleep(Duration::from_secs(30));
    })?;
    suite.register("-dash_prefixed_name", |rec| {
        let name = rec.case_name().to_string();
        check!(rec, name.starts_with('-'));
    })?;
    suite.register("binary_stdout", |rec| {
        let mut out = std::io::stdout();
        let written = out.write_all(&[0xff, 0xfe, b'\n']).and_then(|()| out.flush());
        check!(rec, written.is_ok(), "raw bytes written to stdout");
    })?;
    suite.register("passes_after_faults", |rec| {
        check!(rec, !Vec::<u8>::new().iter().any(|&b| b > 0));
    })?;
    Ok(suite)
}

fn main() -> ExitCode {
    harness_main(build_suite())
}
