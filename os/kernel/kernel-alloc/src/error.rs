use crate::layout::AddressFault;
use kernel_memory_addresses::PhysicalAddress;

/// Errors reported by the page allocator at runtime.
///
/// Only [`KallocError::OutOfMemory`] is meant to be handled by callers.
/// An [`KallocError::InvalidAddress`] handed to [`KernelMemory::free`](crate::KernelMemory::free)
/// and friends stops the kernel; [`KernelMemory::try_free`](crate::KernelMemory::try_free)
/// returns it as a value instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KallocError {
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("invalid page address {address}: {reason}")]
    InvalidAddress {
        address: PhysicalAddress,
        reason: AddressFault,
    },
}

/// Errors raised while bootstrapping the allocator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("reference count table has {provided} slots but {needed} frames are managed")]
    TableTooSmall { needed: usize, provided: usize },
}
