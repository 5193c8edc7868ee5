//! # Managed Memory Layout
//!
//! Compile-time defaults and the runtime-validated range of physical memory
//! handed to the page allocator.

use core::ops::Range;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// Top of physical memory managed by default (224 MiB).
pub const PHYSTOP: u64 = 0x0E00_0000;

/// Byte pattern written over every page that returns to the free list.
///
/// Stale readers of a released page see this pattern instead of the previous
/// owner's data.
pub const POISON_BYTE: u8 = 0x01;

const _: () = {
    assert!(PHYSTOP.is_multiple_of(PAGE_SIZE));
    assert!(POISON_BYTE != 0);
};

/// What happens to the contents of a page when it rejoins the free list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FreePolicy {
    /// Fill the page with the given byte.
    Poison(u8),
    /// Leave the contents as they are (apart from the free-list link).
    Keep,
}

impl Default for FreePolicy {
    fn default() -> Self {
        Self::Poison(POISON_BYTE)
    }
}

/// Why a physical address is not an allocator-managed page.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressFault {
    #[error("not page-aligned")]
    Misaligned,
    #[error("below the managed range")]
    BelowManaged,
    #[error("at or above the physical memory ceiling")]
    AboveCeiling,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("kernel image end {0} cannot be rounded up to a page boundary")]
    KernelEndOverflow(PhysicalAddress),
    #[error("no whole page between kernel image end {kernel_end} and ceiling {ceiling}")]
    Empty {
        kernel_end: PhysicalAddress,
        ceiling: PhysicalAddress,
    },
}

/// The half-open range of pages `[first, ceiling)` owned by the allocator.
///
/// `first` is the page-aligned end of the kernel image; `ceiling` is the
/// physical-memory ceiling rounded down to a page boundary, so only whole
/// pages are ever managed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    first: PhysicalPage,
    ceiling: PhysicalAddress,
}

impl MemoryLayout {
    /// Builds the layout from the first address after the loaded kernel image
    /// and the physical-memory ceiling.
    ///
    /// # Errors
    /// [`LayoutError`] if no whole page fits between the two.
    pub fn new(kernel_end: PhysicalAddress, ceiling: PhysicalAddress) -> Result<Self, LayoutError> {
        let first = kernel_end
            .align_up()
            .ok_or(LayoutError::KernelEndOverflow(kernel_end))?;
        let top = ceiling.align_down();
        if first >= top {
            return Err(LayoutError::Empty {
                kernel_end,
                ceiling,
            });
        }

        Ok(Self {
            first: first.page(),
            ceiling: top,
        })
    }

    /// Layout ending at the default [`PHYSTOP`].
    ///
    /// # Errors
    /// [`LayoutError`] if the kernel image reaches past [`PHYSTOP`].
    pub fn from_kernel_end(kernel_end: PhysicalAddress) -> Result<Self, LayoutError> {
        Self::new(kernel_end, PhysicalAddress::new(PHYSTOP))
    }

    #[inline]
    #[must_use]
    pub const fn first_page(&self) -> PhysicalPage {
        self.first
    }

    /// Exclusive, page-aligned upper bound of the managed range.
    #[inline]
    #[must_use]
    pub const fn ceiling(&self) -> PhysicalAddress {
        self.ceiling
    }

    #[inline]
    #[must_use]
    pub const fn frame_range(&self) -> Range<FrameNumber> {
        self.first.frame_number()..self.ceiling.page().frame_number()
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn frame_count(&self) -> usize {
        ((self.ceiling.as_u64() - self.first.base().as_u64()) / PAGE_SIZE) as usize
    }

    /// All managed pages, lowest address first.
    pub fn pages(&self) -> impl Iterator<Item = PhysicalPage> + use<> {
        let Range { start, end } = self.frame_range();
        (start.as_u64()..end.as_u64()).map(|f| PhysicalPage::from_frame_number(FrameNumber::new(f)))
    }

    /// Checks that `pa` is the base of a managed page.
    ///
    /// # Errors
    /// The [`AddressFault`] describing why it is not.
    pub fn validate(&self, pa: PhysicalAddress) -> Result<PhysicalPage, AddressFault> {
        let Some(page) = PhysicalPage::from_aligned(pa) else {
            return Err(AddressFault::Misaligned);
        };
        if page < self.first {
            return Err(AddressFault::BelowManaged);
        }
        if pa >= self.ceiling {
            return Err(AddressFault::AboveCeiling);
        }
        Ok(page)
    }

    /// Position of `page` in the managed range, if it is managed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_of(&self, page: PhysicalPage) -> Option<usize> {
        if page.base() >= self.ceiling {
            return None;
        }
        page.frame_number()
            .distance_from(self.first.frame_number())
            .map(|d| d as usize)
    }
}
