//! Supplemental page table: the authoritative record of where each virtual
//! page's true content currently lives.
//!
//! The hardware page table only knows about resident pages. Every page a
//! process can validly touch has a descriptor here, and the descriptor's
//! [`PageState`] says how to reconstruct the content on a fault: all zeroes,
//! a file region, a swap slot, or already in a frame.

use crate::fs::FileId;
use crate::mem::error::VmError;
use crate::mem::frame_allocator::FrameIndex;
use crate::mem::swap::SwapSlot;
use crate::threading::process::Pid;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use medulla_shared::mem::{is_page_aligned, PAGE_FRAME_SIZE};

/// Identifies the memory-mapped-file group a page belongs to, so an unmap
/// request can tear down the whole group. Pages outside any mapping
/// (ordinary executable or stack pages) carry no `MapId`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MapId(pub u32);

/// The file region behind a page of file origin.
///
/// `read_len` bytes come from `file` at `offset`; the remaining `zero_len`
/// bytes of the page are zero. `read_len + zero_len` is always the page
/// size. Retained while the page is resident so that a clean eviction can
/// fall back to the file instead of swap.
#[derive(Clone, Copy, Debug)]
pub struct FileBacking {
    pub file: FileId,
    pub offset: u64,
    pub read_len: usize,
    pub zero_len: usize,
}

/// Where a page's content currently lives.
#[derive(Clone, Copy, Debug)]
pub enum PageState {
    /// Never touched; reads as all zero bytes.
    ZeroFill,
    /// Content is the descriptor's file region (which must be present).
    FileBacked,
    /// Content was evicted to the given swap slot.
    SwappedOut { slot: SwapSlot },
    /// Content is in the given physical frame.
    Resident { frame: FrameIndex },
}

/// Descriptor for one virtual page of one process.
#[derive(Debug)]
pub struct Page {
    vaddr: usize,
    owner: Pid,
    writable: bool,
    map_id: Option<MapId>,
    file: Option<FileBacking>,
    state: PageState,
}

impl Page {
    pub fn vaddr(&self) -> usize {
        self.vaddr
    }

    pub fn owner(&self) -> Pid {
        self.owner
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn map_id(&self) -> Option<MapId> {
        self.map_id
    }

    pub fn file_backing(&self) -> Option<&FileBacking> {
        self.file.as_ref()
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn is_resident(&self) -> bool {
        matches!(self.state, PageState::Resident { .. })
    }

    /// The frame holding this page, if resident.
    pub fn frame(&self) -> Option<FrameIndex> {
        match self.state {
            PageState::Resident { frame } => Some(frame),
            _ => None,
        }
    }

    /// The swap slot holding this page, if swapped out.
    pub fn swap_slot(&self) -> Option<SwapSlot> {
        match self.state {
            PageState::SwappedOut { slot } => Some(slot),
            _ => None,
        }
    }

    /// Mark the page resident in `frame`. The previous state must not be
    /// `Resident`; a resident page never faults.
    pub fn set_resident(&mut self, frame: FrameIndex) -> Result<(), VmError> {
        if self.is_resident() {
            return Err(VmError::ConsistencyViolation);
        }
        self.state = PageState::Resident { frame };
        Ok(())
    }

    /// Transition a resident page to `SwappedOut`, recording its slot.
    pub fn evict_to_swap(&mut self, slot: SwapSlot) -> Result<(), VmError> {
        if !self.is_resident() {
            return Err(VmError::ConsistencyViolation);
        }
        self.state = PageState::SwappedOut { slot };
        Ok(())
    }

    /// Transition a resident, file-origin page back to `FileBacked`,
    /// discarding the frame contents. Only valid for clean pages whose file
    /// region is still recorded.
    pub fn evict_to_file(&mut self) -> Result<(), VmError> {
        if !self.is_resident() || self.file.is_none() {
            return Err(VmError::ConsistencyViolation);
        }
        self.state = PageState::FileBacked;
        Ok(())
    }
}

/// Per-process map from virtual page address to descriptor.
pub struct SupplementalPageTable {
    owner: Pid,
    entries: BTreeMap<usize, Page>,
}

impl SupplementalPageTable {
    pub fn new(owner: Pid) -> Self {
        Self {
            owner,
            entries: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> Pid {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, page: Page) -> Result<(), VmError> {
        assert!(is_page_aligned(page.vaddr));
        if self.entries.contains_key(&page.vaddr) {
            // The address already means something; clobbering it would leak
            // whatever backing the old descriptor holds.
            return Err(VmError::ConsistencyViolation);
        }
        self.entries.insert(page.vaddr, page);
        Ok(())
    }

    /// Insert a descriptor for a zero-fill page. `frame` is given when the
    /// process loader has already populated a frame (e.g. the initial
    /// stack page at exec), in which case the page starts out resident.
    pub fn create_zero_entry(
        &mut self,
        vaddr: usize,
        frame: Option<FrameIndex>,
        writable: bool,
    ) -> Result<(), VmError> {
        self.insert(Page {
            vaddr,
            owner: self.owner,
            writable,
            map_id: None,
            file: None,
            state: match frame {
                Some(frame) => PageState::Resident { frame },
                None => PageState::ZeroFill,
            },
        })
    }

    /// Insert a descriptor for a page backed by `read_len` bytes of `file`
    /// at `offset`, zero-padded to the page size.
    #[allow(clippy::too_many_arguments)]
    pub fn create_file_entry(
        &mut self,
        vaddr: usize,
        frame: Option<FrameIndex>,
        file: FileId,
        offset: u64,
        read_len: usize,
        zero_len: usize,
        writable: bool,
        map_id: Option<MapId>,
    ) -> Result<(), VmError> {
        assert_eq!(
            read_len + zero_len,
            PAGE_FRAME_SIZE,
            "file entry must cover exactly one page"
        );
        self.insert(Page {
            vaddr,
            owner: self.owner,
            writable,
            map_id,
            file: Some(FileBacking {
                file,
                offset,
                read_len,
                zero_len,
            }),
            state: match frame {
                Some(frame) => PageState::Resident { frame },
                None => PageState::FileBacked,
            },
        })
    }

    /// Look up the descriptor for the page containing `vaddr`.
    pub fn fetch(&self, vaddr: usize) -> Option<&Page> {
        self.entries.get(&medulla_shared::mem::page_round_down(vaddr))
    }

    pub fn fetch_mut(&mut self, vaddr: usize) -> Option<&mut Page> {
        self.entries
            .get_mut(&medulla_shared::mem::page_round_down(vaddr))
    }

    /// Remove and return the descriptor for `vaddr`. The caller is
    /// responsible for releasing any frame or swap slot it still holds.
    pub fn remove(&mut self, vaddr: usize) -> Option<Page> {
        self.entries
            .remove(&medulla_shared::mem::page_round_down(vaddr))
    }

    /// Addresses of every page belonging to mapping `map_id`.
    pub fn pages_of_mapping(&self, map_id: MapId) -> Vec<usize> {
        self.entries
            .values()
            .filter(|page| page.map_id == Some(map_id))
            .map(|page| page.vaddr)
            .collect()
    }

    /// Addresses of every page in the table.
    pub fn all_pages(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }
}
