use crate::{FrameNumber, PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// Base address of a 4 KiB physical page.
///
/// ### Invariants
/// - The low [`PAGE_SHIFT`] bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let page = PhysicalPage::from_aligned(PhysicalAddress::new(0x0020_0000)).unwrap();
/// assert_eq!(page.frame_number(), FrameNumber::new(0x200));
/// assert_eq!(page.next().unwrap().base().as_u64(), 0x0020_1000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(PhysicalAddress);

impl PhysicalPage {
    /// The page containing `pa`.
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.align_down())
    }

    /// Returns the page starting at `pa`, or `None` if `pa` is not page-aligned.
    #[inline]
    #[must_use]
    pub const fn from_aligned(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_page_aligned() {
            Some(Self(pa))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_frame_number(frame: FrameNumber) -> Self {
        Self(PhysicalAddress::new(frame.as_u64() << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber::new(self.0.as_u64() >> PAGE_SHIFT)
    }

    /// The page directly after this one; `None` at the top of the address space.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(PAGE_SIZE) {
            Some(pa) => Some(Self(pa)),
            None => None,
        }
    }

    /// Exclusive end address of this page; `None` for the topmost page.
    #[inline]
    #[must_use]
    pub const fn end(self) -> Option<PhysicalAddress> {
        self.0.checked_add(PAGE_SIZE)
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:#018X})", self.0.as_u64())
    }
}
