//! Chunked bump allocator layered over an [`Allocator`].
//!
//! Creating a pool takes two allocations (bookkeeping header, then the first
//! chunk). Growing takes one more per chunk. A refused allocation leaves the
//! pool exactly as it was.

use crate::alloc::{Allocator, Block};

const HEADER_SIZE: usize = 64;
const DEFAULT_CHUNK: usize = 4096;
const MAX_CHUNK: usize = 1 << 20;
const ALIGN: usize = 8;

/// Location of a sub-allocation inside a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSlot {
    pub chunk: usize,
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug)]
struct Chunk {
    block: Block,
    used: usize,
}

impl Chunk {
    fn free(&self) -> usize {
        self.block.len() - self.used
    }
}

#[derive(Debug)]
pub struct BlockPool<'a, A: Allocator + ?Sized> {
    alloc: &'a A,
    header: Option<Block>,
    chunks: Vec<Chunk>,
    next_chunk_size: usize,
}

fn align_up(size: usize) -> Option<usize> {
    size.checked_add(ALIGN - 1).map(|s| s & !(ALIGN - 1))
}

impl<'a, A: Allocator + ?Sized> BlockPool<'a, A> {
    /// Build a pool whose first chunk holds `initial` bytes (a default size
    /// when zero). Returns `None` when either allocation is refused; the
    /// header is handed back to the allocator if the chunk cannot be had.
    pub fn create(alloc: &'a A, initial: usize) -> Option<Self> {
        let initial = if initial == 0 { DEFAULT_CHUNK } else { initial };
        let header = alloc.allocate(HEADER_SIZE).ok()?;
        let first = match alloc.allocate(initial) {
            Ok(block) => block,
            Err(_) => {
                alloc.release(header);
                return None;
            }
        };
        Some(Self {
            alloc,
            header: Some(header),
            chunks: vec![Chunk {
                block: first,
                used: 0,
            }],
            next_chunk_size: initial.saturating_mul(2).min(MAX_CHUNK),
        })
    }

    /// Reserve `size` bytes (rounded up to 8). Zero-sized requests and refused
    /// growth return `None` without touching pool state.
    pub fn alloc(&mut self, size: usize) -> Option<PoolSlot> {
        if size == 0 {
            return None;
        }
        let size = align_up(size)?;

        let fits = self.chunks.last().is_some_and(|c| c.free() >= size);
        if !fits {
            let chunk_size = self.next_chunk_size.max(size);
            let block = self.alloc.allocate(chunk_size).ok()?;
            self.chunks.push(Chunk { block, used: 0 });
            self.next_chunk_size = chunk_size.saturating_mul(2).min(MAX_CHUNK);
        }

        let index = self.chunks.len() - 1;
        let chunk = &mut self.chunks[index];
        let offset = chunk.used;
        chunk.used += size;
        Some(PoolSlot {
            chunk: index,
            offset,
            len: size,
        })
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes handed out across all chunks.
    #[must_use]
    pub fn used(&self) -> usize {
        self.chunks.iter().map(|c| c.used).sum()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.iter().map(|c| c.block.len()).sum()
    }
}

impl<A: Allocator + ?Sized> Drop for BlockPool<'_, A> {
    fn drop(&mut self) {
        for chunk in self.chunks.drain(..) {
            self.alloc.release(chunk.block);
        }
        if let Some(header) = self.header.take() {
            self.alloc.release(header);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    #[test]
    fn create_uses_two_allocations() {
        let heap = HeapAllocator::new();
        let pool = BlockPool::create(&heap, 128).expect("heap never refuses");
        assert_eq!(heap.live_blocks(), 2);
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(pool.capacity(), 128);
        drop(pool);
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn alloc_rounds_to_alignment_and_bumps() {
        let heap = HeapAllocator::new();
        let mut pool = BlockPool::create(&heap, 64).unwrap();
        let a = pool.alloc(3).unwrap();
        let b = pool.alloc(8).unwrap();
        assert_eq!(a, PoolSlot { chunk: 0, offset: 0, len: 8 });
        assert_eq!(b, PoolSlot { chunk: 0, offset: 8, len: 8 });
        assert_eq!(pool.used(), 16);
    }

    #[test]
    fn exhausted_chunk_grows_pool() {
        let heap = HeapAllocator::new();
        let mut pool = BlockPool::create(&heap, 16).unwrap();
        pool.alloc(16).unwrap();
        let slot = pool.alloc(8).unwrap();
        assert_eq!(slot.chunk, 1);
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.capacity(), 16 + 32);
    }

    #[test]
    fn oversized_request_gets_dedicated_chunk() {
        let heap = HeapAllocator::new();
        let mut pool = BlockPool::create(&heap, 16).unwrap();
        let slot = pool.alloc(1000).unwrap();
        assert_eq!(slot.chunk, 1);
        assert_eq!(slot.len, 1000);
        assert!(pool.capacity() >= 1016);
    }

    #[test]
    fn zero_sized_alloc_is_rejected() {
        let heap = HeapAllocator::new();
        let mut pool = BlockPool::create(&heap, 16).unwrap();
        assert_eq!(pool.alloc(0), None);
        assert_eq!(pool.used(), 0);
    }
}
