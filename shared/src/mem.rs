use crate::sizes::KB;

// Page size is 4KB. This is a property of x86 processors.
pub const PAGE_FRAME_SIZE: usize = 4 * KB;

// Any virtual address at or above OFFSET is a kernel address.
pub const OFFSET: usize = 0x80000000;

/// Rounds `addr` down to the start of its containing page.
#[inline]
pub const fn page_round_down(addr: usize) -> usize {
    addr & !(PAGE_FRAME_SIZE - 1)
}

/// Rounds `addr` up to the next page boundary. Saturates at `usize::MAX`'s
/// last page rather than wrapping.
#[inline]
pub const fn page_round_up(addr: usize) -> usize {
    page_round_down(addr.saturating_add(PAGE_FRAME_SIZE - 1))
}

/// Byte offset of `addr` within its page.
#[inline]
pub const fn page_offset(addr: usize) -> usize {
    addr & (PAGE_FRAME_SIZE - 1)
}

#[inline]
pub const fn is_page_aligned(addr: usize) -> bool {
    page_offset(addr) == 0
}

#[inline]
pub const fn is_user_vaddr(addr: usize) -> bool {
    addr < OFFSET
}

#[inline]
pub const fn is_kernel_vaddr(addr: usize) -> bool {
    addr >= OFFSET
}
