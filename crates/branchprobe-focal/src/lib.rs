//! Focal functions for branchprobe suites.
//!
//! Every function here reaches its collaborators through a capability trait
//! passed in by the caller, so a test can substitute a mock and steer the
//! function down each of its branches.

#![forbid(unsafe_code)]

pub mod alloc;
pub mod interp;
pub mod name_list;
pub mod pool;

pub use alloc::{AllocError, Allocator, Block, HeapAllocator};
pub use name_list::NameList;
pub use pool::BlockPool;
