//! # Physical Memory Access
//!
//! The allocator keeps its free list inside the free pages themselves, so it
//! must be able to touch physical memory. [`PhysMapper`] abstracts over how a
//! physical address becomes a dereferenceable pointer:
//!
//! - **Kernel**: every physical address is mapped at `HHDM_BASE + pa`
//!   ([`HhdmPhysMapper`]).
//! - **Tests**: a heap-backed RAM arena stands in for physical memory.

use kernel_memory_addresses::PhysicalAddress;

/// Higher Half Direct Map base of the kernel address space.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Converts physical addresses to usable pointers in the current address space.
///
/// # Safety
/// - `pa` must be mapped writable for the lifetime `'a`.
/// - Type `T` must match the bytes at `pa` and fit within its page.
pub trait PhysMapper {
    /// Convert a *physical* address to a mutable reference in the current address space.
    ///
    /// # Safety
    /// The caller must guarantee that nothing else accesses the referenced
    /// memory for `'a` (for the allocator: the page is free and the lock is held).
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

impl<M: PhysMapper> PhysMapper for &M {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { (**self).phys_to_mut(pa) }
    }
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
///
/// Exactly one page allocator may manage the physical memory seen through an
/// HHDM window; the constructor is `unsafe` to make callers state that.
#[derive(Debug)]
pub struct HhdmPhysMapper {
    base: u64,
}

impl HhdmPhysMapper {
    /// # Safety
    /// - The direct map at `hhdm_base` must cover all managed physical memory.
    /// - At most one mapper may be created per direct-mapped window.
    #[must_use]
    pub const unsafe fn new(hhdm_base: u64) -> Self {
        Self { base: hhdm_base }
    }

    /// # Safety
    /// See [`HhdmPhysMapper::new`]; uses the kernel's [`HHDM_BASE`].
    #[must_use]
    pub const unsafe fn kernel() -> Self {
        unsafe { Self::new(HHDM_BASE) }
    }

    /// Virtual address at which `pa` appears in the direct map.
    #[inline]
    #[must_use]
    pub const fn virt_addr(&self, pa: PhysicalAddress) -> u64 {
        self.base.wrapping_add(pa.as_u64())
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = self.virt_addr(pa) as usize as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_map_offsets_by_base() {
        let mapper = unsafe { HhdmPhysMapper::new(0x4000_0000) };
        assert_eq!(mapper.virt_addr(PhysicalAddress::new(0)), 0x4000_0000);
        assert_eq!(mapper.virt_addr(PhysicalAddress::new(0x0010_1000)), 0x4010_1000);
    }

    #[test]
    fn kernel_mapper_uses_higher_half() {
        let mapper = unsafe { HhdmPhysMapper::kernel() };
        assert_eq!(
            mapper.virt_addr(PhysicalAddress::new(0x0E00_0000)),
            0xffff_8880_0E00_0000
        );
    }
}
