//! Growable list of identifier names whose backing storage comes from an
//! [`Allocator`].
//!
//! Appending re-allocates storage for one more slot. When growth is refused
//! the existing list is released and the append yields `None`, so callers
//! never hold a half-grown list.

use crate::alloc::{Allocator, Block};

/// Bytes of backing storage per name slot.
pub const SLOT_SIZE: usize = 32;

#[derive(Debug)]
pub struct NameList {
    names: Vec<Option<String>>,
    storage: Block,
}

impl NameList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name at `index`; `None` both past the end and for an empty token.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).and_then(|n| n.as_deref())
    }

    #[must_use]
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    /// Hand the backing storage back to `alloc`.
    pub fn release<A: Allocator + ?Sized>(self, alloc: &A) {
        alloc.release(self.storage);
    }
}

/// Append `token` to `list`, creating the list when absent.
///
/// An empty `token` appends an unnamed slot. `on_rename`, when given, is told
/// the index and text of every named slot appended.
pub fn append<A: Allocator + ?Sized>(
    alloc: &A,
    list: Option<NameList>,
    token: &str,
    on_rename: Option<&mut dyn FnMut(usize, &str)>,
) -> Option<NameList> {
    let mut list = match list {
        None => {
            let storage = alloc.allocate(SLOT_SIZE).ok()?;
            NameList {
                names: Vec::with_capacity(1),
                storage,
            }
        }
        Some(mut list) => {
            let wanted = (list.names.len() + 1) * SLOT_SIZE;
            match alloc.allocate(wanted) {
                Ok(mut grown) => {
                    let keep = list.storage.len().min(grown.len());
                    grown.as_mut_slice()[..keep].copy_from_slice(&list.storage.as_slice()[..keep]);
                    let old = std::mem::replace(&mut list.storage, grown);
                    alloc.release(old);
                    list
                }
                Err(_) => {
                    list.release(alloc);
                    return None;
                }
            }
        }
    };

    let index = list.names.len();
    let name = (!token.is_empty()).then(|| token.to_string());
    if let (Some(hook), Some(text)) = (on_rename, name.as_deref()) {
        hook(index, text);
    }
    list.names.push(name);
    Some(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    #[test]
    fn append_to_none_creates_single_entry() {
        let heap = HeapAllocator::new();
        let list = append(&heap, None, "alpha", None).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.name(0), Some("alpha"));
        assert_eq!(list.storage_len(), SLOT_SIZE);
        list.release(&heap);
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn growth_replaces_storage_without_leaking() {
        let heap = HeapAllocator::new();
        let list = append(&heap, None, "a", None).unwrap();
        let list = append(&heap, Some(list), "b", None).unwrap();
        let list = append(&heap, Some(list), "", None).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.name(1), Some("b"));
        assert_eq!(list.name(2), None);
        assert_eq!(list.storage_len(), 3 * SLOT_SIZE);
        assert_eq!(heap.live_blocks(), 1);
        list.release(&heap);
    }

    #[test]
    fn rename_hook_sees_named_slots_only() {
        let heap = HeapAllocator::new();
        let mut seen = Vec::new();
        let mut hook = |i: usize, s: &str| seen.push((i, s.to_string()));
        let list = append(&heap, None, "x", Some(&mut hook)).unwrap();
        let list = append(&heap, Some(list), "", Some(&mut hook)).unwrap();
        list.release(&heap);
        assert_eq!(seen, vec![(0, "x".to_string())]);
    }
}
