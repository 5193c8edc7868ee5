//! # Per-frame Reference Counts
//!
//! One counter per managed frame, counting the logical owners of the frame's
//! contents. Shared (copy-on-write) frames have a count above one; the
//! allocator only reclaims a frame once its last owner releases it.
//!
//! The counters are atomics so that [`RefCountTable::get`] can be called
//! without the allocator lock. Every *mutation* takes a `&FreeList`, which can
//! only be obtained through the allocator lock, so read-decide-mutate
//! sequences in the allocator are serialized with the free list itself.

use crate::free_list::FreeList;
use crate::layout::MemoryLayout;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_memory_addresses::PhysicalPage;

/// Dense reference-count table, indexed relative to the first managed frame.
pub struct RefCountTable<'a> {
    layout: MemoryLayout,
    counts: &'a [AtomicU32],
}

impl<'a> RefCountTable<'a> {
    /// Takes exclusive ownership of `counts` and clears every slot.
    ///
    /// `counts` must hold at least [`MemoryLayout::frame_count`] slots; slots
    /// past that are left untouched.
    pub(crate) fn new(layout: MemoryLayout, counts: &'a mut [AtomicU32]) -> Self {
        debug_assert!(counts.len() >= layout.frame_count());
        let counts = &counts[..layout.frame_count()];
        for slot in counts {
            slot.store(0, Ordering::Relaxed);
        }
        Self { layout, counts }
    }

    #[inline]
    fn slot(&self, page: PhysicalPage) -> &AtomicU32 {
        // Callers pass pages derived from validated addresses.
        match self.layout.index_of(page).and_then(|i| self.counts.get(i)) {
            Some(slot) => slot,
            None => panic!("kalloc: reference count lookup for unmanaged page {page}"),
        }
    }

    /// Current count; may be stale relative to concurrent mutators.
    #[inline]
    #[must_use]
    pub fn get(&self, page: PhysicalPage) -> u32 {
        self.slot(page).load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set(&self, _locked: &FreeList, page: PhysicalPage, count: u32) {
        self.slot(page).store(count, Ordering::Relaxed);
    }

    /// Adds one owner; `None` if the counter is saturated.
    #[inline]
    pub(crate) fn increment(&self, _locked: &FreeList, page: PhysicalPage) -> Option<u32> {
        let slot = self.slot(page);
        let next = slot.load(Ordering::Relaxed).checked_add(1)?;
        slot.store(next, Ordering::Relaxed);
        Some(next)
    }

    /// Removes one owner; `None` if the count already was zero.
    #[inline]
    pub(crate) fn decrement(&self, _locked: &FreeList, page: PhysicalPage) -> Option<u32> {
        let slot = self.slot(page);
        let next = slot.load(Ordering::Relaxed).checked_sub(1)?;
        slot.store(next, Ordering::Relaxed);
        Some(next)
    }
}
