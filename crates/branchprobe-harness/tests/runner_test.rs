//! Integration test: runner + recorder + reporter through the public API.
//!
//! Validates that:
//! 1. Passing suites report zero failures and exit code 0.
//! 2. A panicking case is contained; every later case still runs.
//! 3. A mock failing on its Nth call drives a focal function's error path.
//! 4. Float checks honour the tolerance boundary.
//! 5. Check totals always equal the sum over cases.
//!
//! Run: cargo test -p branchprobe-harness --test runner_test

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use branchprobe_focal::{AllocError, Allocator, Block, BlockPool};
use branchprobe_harness::{
    Console, FailurePlan, Mock, Resettable, RunConfig, Runner, SharedBuffer, Suite, Verdict,
    check, check_close, execute, report,
};

fn run(suite: Suite) -> (branchprobe_harness::RunSummary, String, String) {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let mut runner = Runner::new(RunConfig::default()).with_console(Console::buffered(&out, &err));
    let summary = runner.run_all(suite).expect("run completes");
    (summary, out.contents(), err.contents())
}

#[test]
fn three_passing_cases_exit_zero() {
    let mut suite = Suite::new("scenario_a");
    for name in ["one", "two", "three"] {
        suite
            .register(name, |rec| {
                check!(rec, true);
            })
            .unwrap();
    }
    let (summary, stdout, _) = run(suite);
    assert!(summary.checks_run >= 3);
    assert!(summary.checks_passed >= 3);
    assert_eq!(summary.checks_failed, 0);

    let mut out = Vec::new();
    assert_eq!(report(&summary, &mut out).unwrap(), Verdict::Success);
    assert!(String::from_utf8(out).unwrap().contains("Run: 3, Passed: 3, Failed: 0"));
    assert_eq!(stdout.matches("[PASS]").count(), 3);
}

#[test]
fn panicking_case_does_not_stop_the_run() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    let mut suite = Suite::new("scenario_b");
    for (name, explode) in [("first", false), ("exploder", true), ("last", false)] {
        let ran = ran.clone();
        suite
            .register(name, move |rec| {
                ran.borrow_mut().push(name);
                if explode {
                    panic!("unexpected error mid-body");
                }
                check!(rec, true);
            })
            .unwrap();
    }
    let (summary, stdout, stderr) = run(suite);

    assert_eq!(*ran.borrow(), vec!["first", "exploder", "last"]);
    assert!(summary.checks_failed >= 1);
    assert_eq!(summary.verdict().code(), 1);
    assert!(stdout.contains("[FAIL] exploder"));
    assert!(stdout.contains("[PASS] last"));
    assert!(stderr.contains("case 'exploder' panicked: unexpected error mid-body"));
    let exploder = &summary.cases[1];
    assert_eq!(exploder.checks.len(), 1);
    assert!(exploder.checks[0].description.contains("exploder"));
}

struct ScriptedAlloc {
    grant: Arc<Mock<usize, bool>>,
    released: Arc<Mock<usize, ()>>,
}

impl Allocator for ScriptedAlloc {
    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        if self.grant.invoke(size) {
            Ok(Block::zeroed(size))
        } else {
            Err(AllocError::Refused { size })
        }
    }

    fn release(&self, block: Block) {
        self.released.invoke(block.len());
    }
}

#[test]
fn fail_on_second_allocation_short_circuits() {
    let grant: Arc<Mock<usize, bool>> = Mock::shared("grant", true);
    let released: Arc<Mock<usize, ()>> = Mock::shared("released", ());
    let mut suite = Suite::new("scenario_c");
    suite.track(grant.clone()).track(released.clone());

    let alloc = ScriptedAlloc {
        grant: grant.clone(),
        released: released.clone(),
    };
    suite
        .register("second_call_refused", move |rec| {
            alloc.grant.fail_with(FailurePlan::OnCall(2), false);
            let pool = BlockPool::create(&alloc, 256);
            check!(rec, pool.is_none(), "create must report failure");
            rec.record_eq(alloc.grant.call_count(), 2, "no allocation after refusal");
            rec.record_eq(alloc.released.call_count(), 1, "header released");
        })
        .unwrap();

    // A focal function that ignores the refusal is caught by the same checks.
    let sloppy = ScriptedAlloc {
        grant: grant.clone(),
        released: released.clone(),
    };
    suite
        .register("sloppy_caller_is_flagged", move |rec| {
            sloppy.grant.fail_with(FailurePlan::OnCall(2), false);
            let first = sloppy.allocate(64);
            let _second = sloppy.allocate(128);
            let _third = sloppy.allocate(128);
            rec.record_eq(sloppy.grant.call_count(), 2, "no allocation after refusal");
            if let Ok(block) = first {
                sloppy.release(block);
            }
        })
        .unwrap();

    let (summary, _, stderr) = run(suite);
    assert!(summary.cases[0].passed());
    assert!(!summary.cases[1].passed());
    assert!(stderr.contains("expected: 2"));
    assert!(stderr.contains("actual: 3"));
    assert_eq!(grant.call_count(), 0, "runner reset the mock after the last case");
}

#[test]
fn float_tolerance_boundary() {
    let mut suite = Suite::new("scenario_d");
    suite
        .register("inside", |rec| {
            check_close!(rec, 0.1 + 0.2, 0.3);
            check_close!(rec, 1.0, 1.0 + 0.5e-9);
        })
        .unwrap();
    suite
        .register("outside", |rec| {
            check_close!(rec, 1.0, 1.0 + 2e-9);
        })
        .unwrap();
    let (summary, _, _) = run(suite);
    assert!(summary.cases[0].passed());
    assert!(!summary.cases[1].passed());
    assert_eq!(summary.checks_failed, 1);
}

#[test]
fn totals_equal_sum_of_recorded_checks() {
    let mut suite = Suite::new("accounting");
    for n in 0..6usize {
        suite
            .register(format!("case_{n}"), move |rec| {
                for i in 0..n {
                    rec.record_check(i % 3 != 2, format!("check {i}"));
                }
                if n == 4 {
                    panic!("mid-case");
                }
            })
            .unwrap();
    }
    let (summary, _, _) = run(suite);
    let per_case: usize = summary.cases.iter().map(|c| c.checks.len()).sum();
    assert_eq!(summary.checks_run, per_case);
    assert_eq!(summary.checks_run, summary.checks_passed + summary.checks_failed);
    assert_eq!(summary.cases_run, 6);
}

#[test]
fn reset_then_single_invoke_counts_one() {
    let mocks: Vec<Arc<Mock<u8, u8>>> = (0..3)
        .map(|i| Mock::shared(format!("m{i}"), i))
        .collect();
    for mock in &mocks {
        mock.fail_with(FailurePlan::Always, 0);
        mock.invoke(1);
        mock.invoke(2);
        mock.reset();
        mock.invoke(3);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls(), vec![3]);
    }
}

#[test]
fn list_mode_prints_names_without_running() {
    let ran = Rc::new(RefCell::new(false));
    let flag = ran.clone();
    let mut suite = Suite::new("listing");
    suite.register("alpha", move |_| *flag.borrow_mut() = true).unwrap();
    suite.register("beta", |_| {}).unwrap();

    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let config = RunConfig {
        list: true,
        ..RunConfig::default()
    };
    let verdict = execute(suite, config, Console::buffered(&out, &err)).unwrap();
    assert_eq!(verdict, Verdict::Success);
    assert_eq!(out.contents(), "alpha\nbeta\n");
    assert!(!*ran.borrow());
}

#[test]
fn execute_reports_summary_line_and_verdict() {
    let mut suite = Suite::new("exec");
    suite
        .register("bad", |rec| {
            rec.record_eq("x", "y", "strings differ");
        })
        .unwrap();
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let verdict = execute(suite, RunConfig::default(), Console::buffered(&out, &err)).unwrap();
    assert_eq!(verdict, Verdict::Failure);
    let stdout = out.contents();
    assert!(stdout.contains("Run: 1, Passed: 0, Failed: 1"));
    assert!(stdout.contains("RESULT: FAIL"));
    assert!(err.contents().contains("strings differ"));
}
