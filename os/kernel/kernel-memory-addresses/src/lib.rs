//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses and the 4 KiB page frames
//! the kernel's page allocator hands out.
//!
//! ## Overview
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address (RAM or MMIO). |
//! | [`PhysicalPage`] | The page-aligned base address of a 4 KiB physical page. |
//! | [`FrameNumber`] | The index of a page frame: address divided by [`PAGE_SIZE`]. |
//!
//! A [`PhysicalPage`] can only be obtained from an address by rounding it
//! down ([`PhysicalAddress::page`]) or by an explicit alignment check
//! ([`PhysicalPage::from_aligned`]), so code that receives a page never has
//! to re-check its alignment.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0010_2042);
//! assert!(!pa.is_page_aligned());
//!
//! let page = pa.page();
//! assert_eq!(page.base().as_u64(), 0x0010_2000);
//! assert_eq!(page.frame_number().as_u64(), 0x102);
//! assert_eq!(PhysicalPage::from_aligned(pa), None);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod frame_number;
mod physical_address;
mod physical_page;

pub use frame_number::FrameNumber;
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;

/// Size in bytes of a page frame.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`, the number of in-page offset bits.
pub const PAGE_SHIFT: u32 = 12;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
};
