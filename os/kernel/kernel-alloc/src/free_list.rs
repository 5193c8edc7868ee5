use crate::layout::FreePolicy;
use crate::phys_mapper::PhysMapper;
use core::ptr;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// Link word marking the end of the list. Never page-aligned, so it cannot
/// collide with a real page address.
const END_OF_LIST: u64 = u64::MAX;

/// Header stored at the beginning of every **free** page.
///
/// ```text
/// +-------------------+----------------------------------+
/// | FreeNode (8 B)    |  poison / stale page contents    |
/// +-------------------+----------------------------------+
/// ^ page base                                   page base + 4096 ^
/// ```
///
/// The header only has meaning while the page is free; the first write of
/// the next owner overwrites it.
#[repr(C)]
struct FreeNode {
    /// Physical address of the next free page, or [`END_OF_LIST`].
    next: u64,
}

/// A free-list link that does not decode to a page address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CorruptLink {
    /// Page whose header holds the bad link.
    pub(crate) at: PhysicalPage,
    pub(crate) link: u64,
}

/// An intrusive, singly linked LIFO list of free 4 KiB pages.
///
/// # Invariants
/// - Every listed page is free, managed and appears exactly once.
/// - Only accessed while holding the allocator lock; the list lives inside
///   the allocator's [`SpinLock`](kernel_sync::SpinLock).
pub(crate) struct FreeList {
    head: Option<PhysicalPage>,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    /// Applies `policy` to `page` and links it in as the new head.
    ///
    /// # Safety
    /// - `page` must be managed, unowned, and not already on the list.
    /// - `mapper` must map `page` writable.
    pub(crate) unsafe fn push<M: PhysMapper>(
        &mut self,
        mapper: &M,
        page: PhysicalPage,
        policy: FreePolicy,
    ) {
        if let FreePolicy::Poison(byte) = policy {
            let bytes = unsafe { mapper.phys_to_mut::<[u8; PAGE_SIZE as usize]>(page.base()) };
            bytes.fill(byte);
        }

        let next = self.head.map_or(END_OF_LIST, |p| p.base().as_u64());
        unsafe {
            ptr::write(mapper.phys_to_mut::<FreeNode>(page.base()), FreeNode { next });
        }
        self.head = Some(page);
    }

    /// Detaches the head page.
    ///
    /// # Errors
    /// [`CorruptLink`] if the head's link word is not a page address; the
    /// list is left untouched.
    ///
    /// # Safety
    /// `mapper` must map every listed page readable.
    pub(crate) unsafe fn pop<M: PhysMapper>(
        &mut self,
        mapper: &M,
    ) -> Result<Option<PhysicalPage>, CorruptLink> {
        let Some(page) = self.head else {
            return Ok(None);
        };
        let next = unsafe { read_link(mapper, page)? };
        self.head = next;
        Ok(Some(page))
    }

    /// Walks the list, calling `visit` for each page; stops early when `visit`
    /// returns `false`. Returns the number of pages visited.
    ///
    /// # Errors
    /// [`CorruptLink`] if a link word is not a page address.
    ///
    /// # Safety
    /// `mapper` must map every listed page readable.
    pub(crate) unsafe fn walk<M: PhysMapper>(
        &self,
        mapper: &M,
        mut visit: impl FnMut(PhysicalPage) -> bool,
    ) -> Result<usize, CorruptLink> {
        let mut visited = 0;
        let mut current = self.head;
        while let Some(page) = current {
            visited += 1;
            if !visit(page) {
                break;
            }
            current = unsafe { read_link(mapper, page)? };
        }
        Ok(visited)
    }
}

unsafe fn read_link<M: PhysMapper>(
    mapper: &M,
    page: PhysicalPage,
) -> Result<Option<PhysicalPage>, CorruptLink> {
    let link = unsafe { ptr::read(mapper.phys_to_mut::<FreeNode>(page.base())) }.next;
    if link == END_OF_LIST {
        return Ok(None);
    }
    PhysicalPage::from_aligned(PhysicalAddress::new(link))
        .map(Some)
        .ok_or(CorruptLink { at: page, link })
}
