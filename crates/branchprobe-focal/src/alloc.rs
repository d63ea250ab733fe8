//! Allocation capability.

use std::cell::Cell;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("allocation of {size} bytes refused")]
    Refused { size: usize },
    #[error("zero-sized allocation")]
    ZeroSize,
}

/// An owned, zero-initialised byte region handed out by an [`Allocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    bytes: Vec<u8>,
}

impl Block {
    /// Create a zero-filled block of `size` bytes.
    #[must_use]
    pub fn zeroed(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Size of the block in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the block holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Contents of the block.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable contents of the block.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Source of memory for focal functions.
///
/// Implementations decide whether a request succeeds; callers must handle
/// refusal on every call.
pub trait Allocator {
    fn allocate(&self, size: usize) -> Result<Block, AllocError>;

    fn release(&self, block: Block);
}

/// Allocator backed by the process heap that tracks live blocks.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    live: Cell<usize>,
}

impl HeapAllocator {
    /// Create an allocator with no live blocks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks handed out and not yet released.
    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.live.get()
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        self.live.set(self.live.get() + 1);
        Ok(Block::zeroed(size))
    }

    fn release(&self, block: Block) {
        drop(block);
        self.live.set(self.live.get().saturating_sub(1));
    }
}
