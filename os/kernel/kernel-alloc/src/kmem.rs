//! # Kernel Page Allocator
//!
//! [`KernelMemory`] hands out and reclaims the 4 KiB physical pages between
//! the end of the kernel image and the physical-memory ceiling. Pages may be
//! shared by several owners (copy-on-write after `fork`); a per-frame
//! reference count decides when a release actually returns the page.
//!
//! ## Page states
//!
//! ```text
//!            alloc()                  increment()
//!   free ──────────────► exclusive ─────────────► shared
//!    ▲                   (count 1)  ◄───────────  (count > 1)
//!    │                       │      free()/decrement()
//!    └───────────────────────┘
//!            free()
//! ```
//!
//! ## Locking
//!
//! A single [`SpinLock`] named `"kmem"` guards the free list, and every
//! reference-count mutation requires that lock. [`KernelMemory::free`] reads
//! the count, decides between "release" and "drop one owner", and applies the
//! decision in one critical section, so concurrent releases of a shared page
//! reclaim it exactly once.

use crate::error::{InitError, KallocError};
use crate::free_list::{CorruptLink, FreeList};
use crate::layout::{FreePolicy, MemoryLayout};
use crate::phys_mapper::PhysMapper;
use crate::ref_count::RefCountTable;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};
use kernel_sync::SpinLock;
use log::{debug, error, info, trace};

/// What [`KernelMemory::free`] did with a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FreeOutcome {
    /// The caller was the last owner; the page is back on the free list.
    Released,
    /// Other owners remain; only the reference count dropped.
    Shared { remaining: u32 },
}

/// The physical page allocator of one physical address space.
///
/// Created once by kernel bootstrap through [`KernelMemory::init`] and passed
/// by reference to everything that allocates pages.
pub struct KernelMemory<'a, M: PhysMapper> {
    layout: MemoryLayout,
    policy: FreePolicy,
    mapper: M,
    kmem: SpinLock<FreeList>,
    refs: RefCountTable<'a>,
    /// Result of the most recent [`KernelMemory::count_free`] walk.
    last_free_count: AtomicUsize,
}

impl<'a, M: PhysMapper> KernelMemory<'a, M> {
    /// Builds the allocator and places every managed page on the free list.
    ///
    /// Each page gets a reference count of one and then goes through
    /// [`KernelMemory::free`], the same path runtime releases take.
    ///
    /// # Errors
    /// [`InitError::TableTooSmall`] if `counts` has fewer slots than the
    /// layout manages frames.
    ///
    /// # Safety
    /// - The managed range must be unused RAM that nothing else references.
    /// - `mapper` must map the whole managed range writable.
    pub unsafe fn init(
        layout: MemoryLayout,
        mapper: M,
        counts: &'a mut [AtomicU32],
        policy: FreePolicy,
    ) -> Result<Self, InitError> {
        let needed = layout.frame_count();
        if counts.len() < needed {
            return Err(InitError::TableTooSmall {
                needed,
                provided: counts.len(),
            });
        }

        let mut mem = Self {
            layout,
            policy,
            mapper,
            kmem: SpinLock::named("kmem", FreeList::new()),
            refs: RefCountTable::new(layout, counts),
            last_free_count: AtomicUsize::new(0),
        };

        for page in layout.pages() {
            mem.refs.set(mem.kmem.get_mut(), page, 1);
            mem.free(page);
        }
        mem.last_free_count.store(needed, Ordering::Relaxed);

        info!(
            "kalloc: {needed} free pages in [{}, {})",
            layout.first_page(),
            layout.ceiling()
        );
        Ok(mem)
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Number of frames the allocator manages, free or not.
    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.layout.frame_count()
    }

    /// Allocates one page with a reference count of one.
    ///
    /// The page still contains the poison pattern (or stale data) except for
    /// its first word; callers needing zeroed memory clear it themselves.
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] if no page is free.
    pub fn alloc(&self) -> Result<PhysicalPage, KallocError> {
        let mut kmem = self.kmem.lock();
        // SAFETY: listed pages are managed and mapped; the lock is held.
        let page = match unsafe { kmem.pop(&self.mapper) } {
            Ok(Some(page)) => page,
            Ok(None) => {
                drop(kmem);
                debug!("kalloc: out of memory");
                return Err(KallocError::OutOfMemory);
            }
            Err(corrupt) => corrupted(corrupt),
        };
        if self.layout.validate(page.base()).is_err() {
            corrupted(CorruptLink {
                at: page,
                link: page.base().as_u64(),
            });
        }
        self.refs.set(&kmem, page, 1);
        drop(kmem);

        trace!("kalloc: {page}");
        Ok(page)
    }

    /// Releases one owner's claim on the page at `pa`.
    ///
    /// # Panics
    /// If `pa` is not a managed page; allocator bookkeeping cannot be trusted
    /// after a bad release.
    pub fn free(&self, pa: impl Into<PhysicalAddress>) -> FreeOutcome {
        match self.try_free(pa) {
            Ok(outcome) => outcome,
            Err(err) => fatal("kfree", &err),
        }
    }

    /// [`KernelMemory::free`] without the fatal stop on a bad address.
    ///
    /// If the page's count is at most one, its contents are replaced according
    /// to the [`FreePolicy`] and it rejoins the free list with a count of one.
    /// Otherwise the count drops by one and the page stays with its other owners.
    ///
    /// # Errors
    /// [`KallocError::InvalidAddress`] if `pa` is misaligned or not managed.
    pub fn try_free(&self, pa: impl Into<PhysicalAddress>) -> Result<FreeOutcome, KallocError> {
        let page = self.page_of(pa.into())?;

        let mut kmem = self.kmem.lock();
        let outcome = if self.refs.get(page) <= 1 {
            // SAFETY: the page is managed, its last owner is letting go, and
            // the lock is held.
            unsafe { kmem.push(&self.mapper, page, self.policy) };
            self.refs.set(&kmem, page, 1);
            FreeOutcome::Released
        } else {
            match self.refs.decrement(&kmem, page) {
                Some(remaining) => FreeOutcome::Shared { remaining },
                None => unreachable!("count above one cannot underflow"),
            }
        };
        drop(kmem);

        trace!("kfree: {page} -> {outcome:?}");
        Ok(outcome)
    }

    /// Registers another owner of the page at `pa`; returns the new count.
    ///
    /// # Panics
    /// If `pa` is not a managed page or the count would overflow.
    pub fn increment(&self, pa: impl Into<PhysicalAddress>) -> u32 {
        let page = self.page_or_fatal("incref", pa.into());
        let kmem = self.kmem.lock();
        let Some(count) = self.refs.increment(&kmem, page) else {
            drop(kmem);
            error!("incref: reference count of {page} overflowed");
            panic!("incref: reference count of {page} overflowed");
        };
        count
    }

    /// Drops one owner of the page at `pa` without ever freeing it; returns
    /// the new count.
    ///
    /// Page release goes through [`KernelMemory::free`]; this is for
    /// bookkeeping where the caller knows other owners remain.
    ///
    /// # Panics
    /// If `pa` is not a managed page or its count already is zero.
    pub fn decrement(&self, pa: impl Into<PhysicalAddress>) -> u32 {
        let page = self.page_or_fatal("decref", pa.into());
        let kmem = self.kmem.lock();
        let Some(count) = self.refs.decrement(&kmem, page) else {
            drop(kmem);
            error!("decref: reference count of {page} is already zero");
            panic!("decref: reference count of {page} is already zero");
        };
        count
    }

    /// Current owner count of the page at `pa`.
    ///
    /// Lock-free; the value may be stale by the time the caller sees it.
    ///
    /// # Panics
    /// If `pa` is not a managed page.
    #[must_use]
    pub fn ref_count(&self, pa: impl Into<PhysicalAddress>) -> u32 {
        let page = self.page_or_fatal("getref", pa.into());
        self.refs.get(page)
    }

    /// Counts the free pages by walking the free list.
    ///
    /// Linear in the number of free pages and holds the lock throughout; meant
    /// for diagnostics and memory-pressure reporting only.
    ///
    /// # Panics
    /// If the free list is corrupted: a bad link, an unmanaged page, or more
    /// entries than there are managed frames.
    pub fn count_free(&self) -> usize {
        let limit = self.layout.frame_count();
        let mut stray = None;

        let kmem = self.kmem.lock();
        // A looped list never ends; stop one entry past the managed frames.
        let mut seen = 0_usize;
        // SAFETY: listed pages are managed and mapped; the lock is held.
        let walked = unsafe {
            kmem.walk(&self.mapper, |page| {
                seen += 1;
                if self.layout.validate(page.base()).is_err() {
                    stray = Some(page);
                }
                stray.is_none() && seen <= limit
            })
        };
        drop(kmem);

        let count = match walked {
            Ok(count) => count,
            Err(corrupt) => corrupted(corrupt),
        };
        if let Some(page) = stray {
            corrupted(CorruptLink {
                at: page,
                link: page.base().as_u64(),
            });
        }
        if count > limit {
            error!("kalloc: free list has more than {limit} entries");
            panic!("kalloc: free list has more than {limit} entries");
        }

        self.last_free_count.store(count, Ordering::Relaxed);
        count
    }

    /// Result of the most recent [`KernelMemory::count_free`] (or of
    /// initialization), without walking the list again.
    #[inline]
    #[must_use]
    pub fn last_free_count(&self) -> usize {
        self.last_free_count.load(Ordering::Relaxed)
    }

    fn page_of(&self, pa: PhysicalAddress) -> Result<PhysicalPage, KallocError> {
        self.layout
            .validate(pa)
            .map_err(|reason| KallocError::InvalidAddress {
                address: pa,
                reason,
            })
    }

    fn page_or_fatal(&self, op: &str, pa: PhysicalAddress) -> PhysicalPage {
        match self.page_of(pa) {
            Ok(page) => page,
            Err(err) => fatal(op, &err),
        }
    }
}

impl<M: PhysMapper> core::fmt::Debug for KernelMemory<'_, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelMemory")
            .field("layout", &self.layout)
            .field("policy", &self.policy)
            .field("kmem", &self.kmem)
            .field("last_free_count", &self.last_free_count())
            .finish_non_exhaustive()
    }
}

#[cold]
fn fatal(op: &str, err: &KallocError) -> ! {
    error!("{op}: {err}");
    panic!("{op}: {err}");
}

#[cold]
fn corrupted(corrupt: CorruptLink) -> ! {
    error!(
        "kalloc: free list corrupted at {}: link {:#x}",
        corrupt.at, corrupt.link
    );
    panic!(
        "kalloc: free list corrupted at {}: link {:#x}",
        corrupt.at, corrupt.link
    );
}
