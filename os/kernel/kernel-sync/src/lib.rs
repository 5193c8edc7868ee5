//! # Kernel synchronization primitives
//!
//! The allocator state of the kernel is guarded by a single busy-wait lock:
//! critical sections are short and never yield, so a spinning waiter is
//! cheaper than any scheduler interaction.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
