//! Self-test suite: drives the focal functions through their success and
//! failure branches using mock collaborators.

use std::process::ExitCode;
use std::sync::Arc;

use branchprobe_focal::interp::{eval_table, lerp};
use branchprobe_focal::name_list::{self, SLOT_SIZE};
use branchprobe_focal::pool::PoolSlot;
use branchprobe_focal::{AllocError, Allocator, Block, BlockPool};
use branchprobe_harness::{
    FailurePlan, Fixture, HarnessError, Mock, Recorder, Suite, check, check_close, check_eq,
    harness_main, require_some,
};

/// Allocator whose every decision is scripted through mocks.
#[derive(Clone)]
struct MockAllocator {
    grant: Arc<Mock<usize, bool>>,
    release: Arc<Mock<usize, ()>>,
}

impl MockAllocator {
    fn new() -> Self {
        Self {
            grant: Mock::shared("allocate", true),
            release: Mock::shared("release", ()),
        }
    }
}

impl Allocator for MockAllocator {
    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if self.grant.invoke(size) {
            Ok(Block::zeroed(size))
        } else {
            Err(AllocError::Refused { size })
        }
    }

    fn release(&self, block: Block) {
        self.release.invoke(block.len());
    }
}

/// Fresh mock allocator per case.
#[derive(Default)]
struct AllocFixture {
    alloc: Option<MockAllocator>,
}

impl AllocFixture {
    fn alloc(&self) -> &MockAllocator {
        self.alloc.as_ref().expect("fixture is set up before the body runs")
    }
}

impl Fixture for AllocFixture {
    fn setup(&mut self) -> Result<(), String> {
        self.alloc = Some(MockAllocator::new());
        Ok(())
    }

    fn teardown(&mut self) {
        self.alloc = None;
    }
}

/// `(chunk, offset, len)` of a slot, in a shape checks can compare.
fn slot(slot: Option<PoolSlot>) -> Option<(usize, usize, usize)> {
    slot.map(|s| (s.chunk, s.offset, s.len))
}

fn pool_cases(suite: &mut Suite, shared: &MockAllocator) -> Result<(), HarnessError> {
    let alloc = shared.clone();
    suite.register("pool_create_takes_header_then_chunk", move |rec| {
        let pool = BlockPool::create(&alloc, 128);
        check!(rec, pool.is_some(), "pool created when both allocations succeed");
        check_eq!(rec, alloc.grant.calls(), vec![64, 128]);
        drop(pool);
        check_eq!(rec, alloc.release.call_count(), 2, "drop releases header and chunk");
    })?;

    let alloc = shared.clone();
    suite.register("pool_create_second_allocation_fails", move |rec| {
        alloc.grant.fail_with(FailurePlan::OnCall(2), false);
        let pool = BlockPool::create(&alloc, 128);
        check!(rec, pool.is_none(), "create reports failure");
        check_eq!(rec, alloc.grant.call_count(), 2, "no allocation after the refusal");
        check_eq!(rec, alloc.release.calls(), vec![64], "header handed back");
    })?;

    let alloc = shared.clone();
    suite.register("pool_create_first_allocation_fails", move |rec| {
        alloc.grant.fail_with(FailurePlan::OnCall(1), false);
        check!(rec, BlockPool::create(&alloc, 128).is_none());
        check_eq!(rec, alloc.grant.call_count(), 1);
        check!(rec, !alloc.release.was_called(), "nothing to release");
    })?;

    suite.register_with_fixture::<AllocFixture, _>(
        "pool_refused_growth_leaves_pool_unchanged",
        |fx: &mut AllocFixture, rec: &mut Recorder<'_>| {
            let alloc = fx.alloc();
            let mut pool = require_some!(rec, BlockPool::create(alloc, 16), "pool created");
            check_eq!(rec, slot(pool.alloc(16)), Some((0, 0, 16)));
            alloc.grant.fail_with(FailurePlan::FromCall(3), false);
            check_eq!(rec, slot(pool.alloc(8)), None, "growth refused");
            check_eq!(rec, pool.chunk_count(), 1);
            check_eq!(rec, pool.used(), 16);
            check_eq!(rec, alloc.grant.last_call(), Some(32), "growth asked for a doubled chunk");
        },
    )?;

    suite.register_with_fixture::<AllocFixture, _>(
        "pool_zero_sized_request_skips_allocator",
        |fx: &mut AllocFixture, rec: &mut Recorder<'_>| {
            let alloc = fx.alloc();
            let mut pool = require_some!(rec, BlockPool::create(alloc, 16), "pool created");
            let before = alloc.grant.call_count();
            check_eq!(rec, slot(pool.alloc(0)), None);
            check_eq!(rec, alloc.grant.call_count(), before);
        },
    )?;
    Ok(())
}

fn name_list_cases(suite: &mut Suite, shared: &MockAllocator) -> Result<(), HarnessError> {
    let alloc = shared.clone();
    suite.register("name_list_append_creates_list", move |rec| {
        let list = require_some!(
            rec,
            name_list::append(&alloc, None, "alpha", None),
            "list created"
        );
        check_eq!(rec, list.len(), 1);
        check_eq!(rec, list.name(0), Some("alpha"));
        check_eq!(rec, alloc.grant.calls(), vec![SLOT_SIZE]);
        list.release(&alloc);
    })?;

    let alloc = shared.clone();
    suite.register("name_list_growth_failure_releases_list", move |rec| {
        alloc.grant.fail_with(FailurePlan::OnCall(2), false);
        let list = name_list::append(&alloc, None, "a", None);
        let grown = name_list::append(&alloc, list, "b", None);
        check!(rec, grown.is_none(), "append reports failure");
        check_eq!(rec, alloc.release.calls(), vec![SLOT_SIZE], "old storage released");
    })?;

    let alloc = shared.clone();
    suite.register("name_list_empty_token_skips_rename_hook", move |rec| {
        let hook_calls: Mock<(usize, String), ()> = Mock::new("rename", ());
        let mut hook = |i: usize, name: &str| hook_calls.invoke((i, name.to_string()));
        let list = name_list::append(&alloc, None, "t1", Some(&mut hook));
        let list = name_list::append(&alloc, list, "", Some(&mut hook));
        check_eq!(rec, hook_calls.calls(), vec![(0, "t1".to_string())]);
        if let Some(list) = list {
            check_eq!(rec, list.len(), 2);
            check_eq!(rec, list.name(1), None);
            list.release(&alloc);
        }
    })?;
    Ok(())
}

fn interp_cases(suite: &mut Suite) -> Result<(), HarnessError> {
    suite.register("interp_table_midpoints", |rec| {
        let table = [0.0, 0.1, 0.4, 0.9];
        check_close!(rec, eval_table(&table, 0.5).unwrap_or(f64::NAN), 0.25);
        check_close!(rec, eval_table(&table, 1.0 / 3.0).unwrap_or(f64::NAN), 0.1);
        check_close!(rec, lerp(0.1, 0.2, 0.5), 0.15);
    })?;

    suite.register("interp_degenerate_inputs", |rec| {
        check_eq!(rec, eval_table(&[], 0.5), None);
        check_eq!(rec, eval_table(&[1.0, 2.0], f64::INFINITY), None);
        check_eq!(rec, eval_table(&[3.5], 0.9), Some(3.5));
        check_close!(rec, eval_table(&[0.0, 2.0], 7.0).unwrap_or(f64::NAN), 2.0);
    })?;
    Ok(())
}

fn build_suite() -> Result<Suite, HarnessError> {
    let mut suite = Suite::new("branchprobe-selftest");
    let shared = MockAllocator::new();
    suite.track(shared.grant.clone()).track(shared.release.clone());

    pool_cases(&mut suite, &shared)?;
    name_list_cases(&mut suite, &shared)?;
    interp_cases(&mut suite)?;
    Ok(suite)
}

fn main() -> ExitCode {
    harness_main(build_suite())
}
