//! # Kernel Physical Page Allocator
//!
//! This crate owns the pool of 4 KiB physical pages between the end of the
//! loaded kernel image and the physical-memory ceiling. Process creation,
//! page tables, kernel stacks and pipe buffers all take their memory from it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 KernelMemory                        │
//! │    • init: every managed page enters via free()     │
//! │    • alloc / free / try_free / count_free           │
//! │    • increment / decrement / ref_count (COW)        │
//! └───────────┬───────────────────────────┬─────────────┘
//!             │ "kmem" SpinLock           │
//! ┌───────────▼─────────────┐ ┌───────────▼─────────────┐
//! │        FreeList         │ │      RefCountTable      │
//! │  intrusive, LIFO, O(1)  │ │  one counter per frame  │
//! └───────────┬─────────────┘ └─────────────────────────┘
//!             │
//! ┌───────────▼─────────────────────────────────────────┐
//! │                   PhysMapper                        │
//! │    • HHDM in the kernel, RAM arena in tests         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reference counting
//!
//! A page handed out by [`KernelMemory::alloc`] has one owner. When a fork
//! shares it copy-on-write, the mapping code calls
//! [`KernelMemory::increment`] for the new owner. Each owner eventually calls
//! [`KernelMemory::free`]; only the last one puts the page back on the free
//! list. The whole read-decide-mutate step runs under the `"kmem"` lock.
//!
//! ## Errors
//!
//! Running out of pages is an ordinary [`KallocError::OutOfMemory`]. Handing
//! the allocator an address it does not manage is a kernel bug: the
//! address-taking operations log the fault and panic. [`KernelMemory::try_free`]
//! reports the fault as a value instead.
//!
//! ## Usage
//! ```rust
//! use core::sync::atomic::AtomicU32;
//! use kernel_alloc::{FreeOutcome, FreePolicy, KernelMemory, MemoryLayout, PhysMapper};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! #[repr(C, align(4096))]
//! struct Ram([u8; 4 * 4096]);
//!
//! struct Identity;
//! impl PhysMapper for Identity {
//!     unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
//!         unsafe { &mut *(pa.as_u64() as usize as *mut T) }
//!     }
//! }
//!
//! let ram: &mut Ram = Box::leak(Box::new(Ram([0; 4 * 4096])));
//! let start = PhysicalAddress::from_ptr(ram.0.as_mut_ptr().cast_const());
//! let layout = MemoryLayout::new(start, start + 4 * 4096).unwrap();
//! let mut counts: Vec<AtomicU32> = (0..4).map(|_| AtomicU32::new(0)).collect();
//!
//! let mem = unsafe { KernelMemory::init(layout, Identity, &mut counts, FreePolicy::default()) }.unwrap();
//! assert_eq!(mem.count_free(), 4);
//!
//! let page = mem.alloc().unwrap();
//! mem.increment(page);
//! assert_eq!(mem.free(page), FreeOutcome::Shared { remaining: 1 });
//! assert_eq!(mem.free(page), FreeOutcome::Released);
//! assert_eq!(mem.count_free(), 4);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod error;
mod free_list;
mod kmem;
pub mod layout;
pub mod phys_mapper;
mod ref_count;

pub use error::{InitError, KallocError};
pub use kmem::{FreeOutcome, KernelMemory};
pub use layout::{AddressFault, FreePolicy, LayoutError, MemoryLayout};
pub use phys_mapper::{HhdmPhysMapper, PhysMapper};
