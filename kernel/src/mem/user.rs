//! Validation and copying of user-supplied pointers.
//!
//! Syscall handling must never dereference a user pointer blindly. A
//! pointer is rejected outright only when it is null, points into kernel
//! space, or names a page the process never mapped; a page that is mapped
//! but not yet loaded takes the same resolution path a hardware fault
//! would, then the access proceeds.

use crate::mem::error::VmError;
use crate::system::SystemState;
use crate::threading::process::Pid;
use alloc::vec;
use alloc::vec::Vec;
use medulla_shared::mem::{is_kernel_vaddr, page_offset, page_round_down, PAGE_FRAME_SIZE};

/// What a raw user address currently is, before any fault resolution.
#[derive(Debug, PartialEq, Eq)]
pub enum PointerClass {
    /// Mapped and resident; dereferencing it cannot fault.
    SafelyMapped,
    /// The process owns the page but its content is not in a frame yet.
    MappedNotLoaded,
    /// Null, kernel-space, or never mapped by this process.
    Invalid,
}

/// Classify `addr` for process `pid`.
pub fn classify(system: &SystemState, pid: Pid, addr: usize) -> PointerClass {
    if addr == 0 || is_kernel_vaddr(addr) {
        return PointerClass::Invalid;
    }
    let procs = system.processes.lock();
    let Some(pcb) = procs.table.get(pid) else {
        return PointerClass::Invalid;
    };
    if pcb.page_manager.is_mapped(addr) {
        return PointerClass::SafelyMapped;
    }
    match pcb.pages.fetch(addr) {
        Some(_) => PointerClass::MappedNotLoaded,
        None => PointerClass::Invalid,
    }
}

/// Make `[start, start + len)` safe to access, faulting pages in as needed.
///
/// # Errors
///
/// `InvalidAccess` for null/kernel/unmapped addresses or a store to a
/// read-only page; whatever `load_page` reports if a page cannot be
/// brought in.
pub fn ensure_user_range(
    system: &SystemState,
    pid: Pid,
    start: usize,
    len: usize,
    write: bool,
) -> Result<(), VmError> {
    if start == 0 {
        return Err(VmError::InvalidAccess);
    }
    let end = start.checked_add(len).ok_or(VmError::InvalidAccess)?;
    if len == 0 {
        return Ok(());
    }
    if is_kernel_vaddr(start) || is_kernel_vaddr(end - 1) {
        return Err(VmError::InvalidAccess);
    }

    let mut page = page_round_down(start);
    while page < end {
        if write {
            // Permission comes from the descriptor, which is stable even if
            // the page gets evicted between this check and the access.
            let procs = system.processes.lock();
            let pcb = procs.table.get(pid).ok_or(VmError::InvalidAccess)?;
            match pcb.pages.fetch(page) {
                Some(descriptor) if descriptor.writable() => {}
                _ => return Err(VmError::InvalidAccess),
            }
        }
        match classify(system, pid, page.max(start)) {
            PointerClass::SafelyMapped => {}
            PointerClass::MappedNotLoaded => system.load_page(pid, page)?,
            PointerClass::Invalid => return Err(VmError::InvalidAccess),
        }
        page += PAGE_FRAME_SIZE;
    }
    Ok(())
}

/// Copy `len` bytes from user memory into a kernel-owned buffer, faulting
/// pages in on demand.
pub fn copy_from_user(
    system: &SystemState,
    pid: Pid,
    start: usize,
    len: usize,
) -> Result<Vec<u8>, VmError> {
    ensure_user_range(system, pid, start, len, false)?;
    let mut out = vec![0u8; len];
    access_resident_range(system, pid, start, len, false, |frame_bytes, range| {
        out[range].copy_from_slice(frame_bytes);
    })?;
    Ok(out)
}

/// Copy `data` into user memory, faulting pages in on demand and marking
/// them dirty.
pub fn copy_to_user(
    system: &SystemState,
    pid: Pid,
    start: usize,
    data: &[u8],
) -> Result<(), VmError> {
    ensure_user_range(system, pid, start, data.len(), true)?;
    access_resident_range(system, pid, start, data.len(), true, |frame_bytes, range| {
        frame_bytes.copy_from_slice(&data[range]);
    })
}

/// Walk `[start, start + len)` page by page, handing each page's frame
/// bytes (and the matching range of the user buffer) to `visit`. A page
/// evicted between validation and the copy is simply faulted back in; each
/// touched frame is marked referenced, and writes mark the page dirty.
fn access_resident_range(
    system: &SystemState,
    pid: Pid,
    start: usize,
    len: usize,
    write: bool,
    mut visit: impl FnMut(&mut [u8], core::ops::Range<usize>),
) -> Result<(), VmError> {
    let mut copied = 0;
    while copied < len {
        let addr = start + copied;
        let in_page = (PAGE_FRAME_SIZE - page_offset(addr)).min(len - copied);

        let resident = {
            let mut procs = system.processes.lock();
            let pcb = procs.table.get_mut(pid).ok_or(VmError::InvalidAccess)?;
            match pcb.page_manager.lookup(addr) {
                Some(pte) => {
                    let frame = pte.frame;
                    if write {
                        pcb.page_manager.record_access(addr, true)?;
                    }
                    let mut frames = system.frames.lock();
                    frames.mark_referenced(frame);
                    let offset = page_offset(addr);
                    visit(
                        &mut frames.frame_bytes_mut(frame)[offset..offset + in_page],
                        copied..copied + in_page,
                    );
                    true
                }
                None => false,
            }
        };

        if resident {
            copied += in_page;
        } else {
            system.load_page(pid, addr)?;
        }
    }
    Ok(())
}
