#![allow(dead_code)]

use core::cell::UnsafeCell;
use core::sync::atomic::AtomicU32;
use kernel_alloc::{FreePolicy, KernelMemory, MemoryLayout, PhysMapper};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// First address after the (pretend) kernel image.
pub const KERNEL_END: u64 = 0x0010_0000;

/// A 4 KiB-aligned raw frame of "physical RAM".
#[repr(C, align(4096))]
struct Frame([u8; PAGE_SIZE as usize]);

/// In-memory physical RAM starting at [`KERNEL_END`].
///
/// Physical address `KERNEL_END + i * 4096 + off` maps to byte `off` of frame `i`.
pub struct RamArena {
    frames: Box<[UnsafeCell<Frame>]>,
}

// Safety: the allocator serializes access to free pages with its lock; tests
// only touch pages they own.
unsafe impl Sync for RamArena {}

impl RamArena {
    pub fn with_frames(n: usize) -> Self {
        Self {
            frames: (0..n)
                .map(|_| UnsafeCell::new(Frame([0; PAGE_SIZE as usize])))
                .collect(),
        }
    }

    pub fn layout(&self) -> MemoryLayout {
        MemoryLayout::new(
            PhysicalAddress::new(KERNEL_END),
            PhysicalAddress::new(KERNEL_END + self.frames.len() as u64 * PAGE_SIZE),
        )
        .unwrap()
    }

    /// Snapshot of a page's contents.
    pub fn read(&self, pa: impl Into<PhysicalAddress>) -> Vec<u8> {
        let page = unsafe { self.phys_to_mut::<[u8; PAGE_SIZE as usize]>(pa.into()) };
        page.to_vec()
    }

    pub fn write(&self, pa: impl Into<PhysicalAddress>, byte: u8) {
        let page = unsafe { self.phys_to_mut::<[u8; PAGE_SIZE as usize]>(pa.into()) };
        page.fill(byte);
    }
}

impl PhysMapper for RamArena {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let off = pa.as_u64() - KERNEL_END;
        let idx = (off / PAGE_SIZE) as usize;
        let in_page = (off % PAGE_SIZE) as usize;
        assert!(in_page + size_of::<T>() <= PAGE_SIZE as usize);

        let frame = self.frames[idx].get().cast::<u8>();
        unsafe { &mut *frame.add(in_page).cast::<T>() }
    }
}

pub fn ref_table(n: usize) -> Vec<AtomicU32> {
    (0..n).map(|_| AtomicU32::new(0)).collect()
}

pub fn kernel_memory<'a>(
    arena: &'a RamArena,
    counts: &'a mut [AtomicU32],
) -> KernelMemory<'a, &'a RamArena> {
    unsafe { KernelMemory::init(arena.layout(), arena, counts, FreePolicy::default()) }.unwrap()
}
