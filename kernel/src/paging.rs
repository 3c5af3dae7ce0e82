//! Per-process installed mappings.
//!
//! The hardware page table is outside this subsystem, so `PageManager`
//! records what that table would contain: which virtual pages currently
//! point at which physical frames, with what permission, and whether the
//! process has stored to them. The fault resolver installs mappings here;
//! the frame allocator removes them when it evicts.

use crate::mem::error::VmError;
use crate::mem::frame_allocator::FrameIndex;
use alloc::collections::BTreeMap;
use medulla_shared::mem::{is_page_aligned, page_round_down, PAGE_FRAME_SIZE};

/// One installed virtual-to-physical translation.
#[derive(Clone, Copy, Debug)]
pub struct PageTableEntry {
    pub frame: FrameIndex,
    pub writable: bool,
    /// Set when the process stores to the page. Clean file-backed pages can
    /// be discarded on eviction; dirty ones must go to swap.
    pub dirty: bool,
}

/// The installed mappings of a single process.
#[derive(Default)]
pub struct PageManager {
    entries: BTreeMap<usize, PageTableEntry>,
}

impl PageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a mapping for the page containing `vaddr`.
    pub fn map(&mut self, vaddr: usize, frame: FrameIndex, writable: bool) -> Result<(), VmError> {
        debug_assert!(is_page_aligned(vaddr));
        if self.entries.contains_key(&vaddr) {
            return Err(VmError::ConsistencyViolation);
        }
        self.entries.insert(
            vaddr,
            PageTableEntry {
                frame,
                writable,
                dirty: false,
            },
        );
        Ok(())
    }

    /// Remove the mapping for the page containing `vaddr`, returning the
    /// frame it pointed at.
    pub fn unmap(&mut self, vaddr: usize) -> Option<FrameIndex> {
        self.entries
            .remove(&page_round_down(vaddr))
            .map(|pte| pte.frame)
    }

    pub fn lookup(&self, vaddr: usize) -> Option<&PageTableEntry> {
        self.entries.get(&page_round_down(vaddr))
    }

    pub fn is_mapped(&self, vaddr: usize) -> bool {
        self.lookup(vaddr).is_some()
    }

    /// Record an access to `vaddr`, as the MMU would by setting the
    /// accessed/dirty bits. Fails if the page is unmapped, or on a store to
    /// a read-only page.
    pub fn record_access(&mut self, vaddr: usize, write: bool) -> Result<FrameIndex, VmError> {
        let pte = self
            .entries
            .get_mut(&page_round_down(vaddr))
            .ok_or(VmError::InvalidAccess)?;
        if write && !pte.writable {
            return Err(VmError::InvalidAccess);
        }
        if write {
            pte.dirty = true;
        }
        Ok(pte.frame)
    }

    /// Force the dirty bit on, regardless of write permission. Used for
    /// pages whose frame content already diverges from their file backing
    /// (a reload from swap), so a later eviction cannot discard the frame.
    pub fn mark_dirty(&mut self, vaddr: usize) -> Result<(), VmError> {
        let pte = self
            .entries
            .get_mut(&page_round_down(vaddr))
            .ok_or(VmError::InvalidAccess)?;
        pte.dirty = true;
        Ok(())
    }

    /// Whether every page of `[start, start + len)` is mapped, writable if
    /// `write` is requested.
    pub fn can_access_range(&self, start: usize, len: usize, write: bool) -> bool {
        let Some(end) = start.checked_add(len) else {
            return false;
        };
        let mut page = page_round_down(start);
        while page < end {
            match self.lookup(page) {
                Some(pte) if !write || pte.writable => {}
                _ => return false,
            }
            page += PAGE_FRAME_SIZE;
        }
        true
    }

    /// Iterate over installed mappings as `(vaddr, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PageTableEntry)> {
        self.entries.iter().map(|(vaddr, pte)| (*vaddr, pte))
    }
}
