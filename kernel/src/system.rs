//! Shared paging state and the operations the rest of the kernel calls.
//!
//! One `SystemState` exists per machine and is passed (by reference) to
//! whoever needs it; there is no global. Each structure has its own lock,
//! acquired in the fixed order process table, frame table, swap store, file
//! table. Faults, mapping creation, and teardown all follow that order, so
//! no lock cycle can form.

use crate::fs::{FileId, FileTable, VmFile};
use crate::mem::error::VmError;
use crate::mem::fault;
use crate::mem::frame_allocator::FrameTable;
use crate::mem::page::MapId;
use crate::mem::swap::SwapSpace;
use crate::sync::Mutex;
use crate::threading::process::{Pid, ProcessControlBlock, ProcessState};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};
use log::warn;
use medulla_shared::mem::{
    is_kernel_vaddr, is_page_aligned, page_round_down, page_round_up, PAGE_FRAME_SIZE,
};
use medulla_shared::sizes::SWAP_SECTORS;

pub struct SystemConfig {
    /// Physical frames available to user pages.
    pub frames: usize,
    /// Size of the swap device in sectors.
    pub swap_sectors: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            frames: 64,
            swap_sectors: SWAP_SECTORS,
        }
    }
}

pub struct SystemState {
    pub processes: Mutex<ProcessState>,
    pub frames: Mutex<FrameTable>,
    pub swap: Mutex<SwapSpace>,
    pub files: Mutex<FileTable>,
    next_map_id: AtomicU32,
}

impl SystemState {
    pub fn new(config: SystemConfig) -> Self {
        Self::with_parts(
            FrameTable::new(config.frames),
            SwapSpace::with_ram_disk(config.swap_sectors),
        )
    }

    /// Assemble a system from pre-built frame and swap tables (custom
    /// eviction policy, real swap device).
    pub fn with_parts(frames: FrameTable, swap: SwapSpace) -> Self {
        Self {
            processes: Mutex::new(ProcessState::default()),
            frames: Mutex::new(frames),
            swap: Mutex::new(swap),
            files: Mutex::new(FileTable::new()),
            next_map_id: AtomicU32::new(0),
        }
    }

    pub fn create_process(&self) -> Pid {
        let mut procs = self.processes.lock();
        let pid = procs.allocate_pid();
        procs.table.add(ProcessControlBlock::new(pid));
        pid
    }

    pub fn register_file(&self, file: Box<dyn VmFile>) -> FileId {
        self.files.lock().register(file)
    }

    /// Resolve a page fault at `fault_addr`. On `Err` the caller must
    /// terminate the faulting process.
    pub fn load_page(&self, pid: Pid, fault_addr: usize) -> Result<(), VmError> {
        fault::load_page(self, pid, fault_addr)
    }

    /// Map a zero-fill page at `vaddr`, loaded lazily on first touch.
    pub fn create_zero_entry(&self, pid: Pid, vaddr: usize, writable: bool) -> Result<(), VmError> {
        if is_kernel_vaddr(vaddr) {
            return Err(VmError::InvalidAccess);
        }
        let mut procs = self.processes.lock();
        procs
            .table
            .get_mut(pid)
            .ok_or(VmError::InvalidAccess)?
            .pages
            .create_zero_entry(page_round_down(vaddr), None, writable)
    }

    /// Map a single file-backed page, loaded lazily on first touch.
    #[allow(clippy::too_many_arguments)]
    pub fn create_file_entry(
        &self,
        pid: Pid,
        vaddr: usize,
        file: FileId,
        offset: u64,
        read_len: usize,
        zero_len: usize,
        writable: bool,
        map_id: Option<MapId>,
    ) -> Result<(), VmError> {
        if is_kernel_vaddr(vaddr) {
            return Err(VmError::InvalidAccess);
        }
        let mut procs = self.processes.lock();
        procs
            .table
            .get_mut(pid)
            .ok_or(VmError::InvalidAccess)?
            .pages
            .create_file_entry(
                page_round_down(vaddr),
                None,
                file,
                offset,
                read_len,
                zero_len,
                writable,
                map_id,
            )
    }

    /// Load `bytes` into a fresh resident page at `vaddr` (process-loader
    /// path: the page exists before it is ever touched).
    pub fn install_prepared(
        &self,
        pid: Pid,
        vaddr: usize,
        writable: bool,
        bytes: &[u8],
    ) -> Result<(), VmError> {
        fault::install_prepared(self, pid, vaddr, writable, bytes)
    }

    /// Map `len` bytes of `file` starting at `vaddr`, demand-paged, as one
    /// mapping group. Returns the id the syscall layer hands to `munmap`.
    pub fn map_file(
        &self,
        pid: Pid,
        vaddr: usize,
        file: FileId,
        offset: u64,
        len: usize,
        writable: bool,
    ) -> Result<MapId, VmError> {
        if len == 0 || !is_page_aligned(vaddr) {
            return Err(VmError::InvalidAccess);
        }
        let end = vaddr
            .checked_add(len)
            .map(page_round_up)
            .ok_or(VmError::InvalidAccess)?;
        if is_kernel_vaddr(end - 1) {
            return Err(VmError::InvalidAccess);
        }
        let map_id = MapId(self.next_map_id.fetch_add(1, Ordering::SeqCst));
        let start = vaddr;

        let mut procs = self.processes.lock();
        let pcb = procs.table.get_mut(pid).ok_or(VmError::InvalidAccess)?;
        let mut mapped = Vec::new();
        for (index, page) in (start..end).step_by(PAGE_FRAME_SIZE).enumerate() {
            let page_offset = offset + (index * PAGE_FRAME_SIZE) as u64;
            let remaining = vaddr + len - page;
            let read_len = remaining.min(PAGE_FRAME_SIZE);
            let result = pcb.pages.create_file_entry(
                page,
                None,
                file,
                page_offset,
                read_len,
                PAGE_FRAME_SIZE - read_len,
                writable,
                Some(map_id),
            );
            match result {
                Ok(()) => mapped.push(page),
                Err(e) => {
                    // Partial mappings are all-or-nothing: roll back what
                    // was created before the conflict.
                    for created in mapped {
                        pcb.pages.remove(created);
                    }
                    return Err(e);
                }
            }
        }
        Ok(map_id)
    }

    /// Tear down every page of mapping `map_id`, releasing any frames and
    /// swap slots they hold.
    pub fn munmap(&self, pid: Pid, map_id: MapId) -> Result<(), VmError> {
        let mut procs = self.processes.lock();
        let pcb = procs.table.get_mut(pid).ok_or(VmError::InvalidAccess)?;
        let pages = pcb.pages.pages_of_mapping(map_id);
        if pages.is_empty() {
            return Err(VmError::InvalidAccess);
        }
        let mut result = Ok(());
        for vaddr in pages {
            if let Err(e) = self.free_one(pcb, vaddr, true) {
                result = result.and(Err(e));
            }
        }
        result
    }

    /// Remove the descriptor at `vaddr` and, if `release_backing`, return
    /// its frame or swap slot to the shared pools.
    pub fn page_free(&self, pid: Pid, vaddr: usize, release_backing: bool) -> Result<(), VmError> {
        let mut procs = self.processes.lock();
        let pcb = procs.table.get_mut(pid).ok_or(VmError::InvalidAccess)?;
        self.free_one(pcb, vaddr, release_backing)
    }

    fn free_one(
        &self,
        pcb: &mut ProcessControlBlock,
        vaddr: usize,
        release_backing: bool,
    ) -> Result<(), VmError> {
        let page = pcb
            .pages
            .remove(vaddr)
            .ok_or(VmError::ConsistencyViolation)?;
        pcb.page_manager.unmap(vaddr);
        if !release_backing {
            return Ok(());
        }
        if let Some(frame) = page.frame() {
            self.frames.lock().release(frame)?;
        }
        if let Some(slot) = page.swap_slot() {
            self.swap.lock().free_slot(slot);
        }
        Ok(())
    }

    /// Process teardown: free every descriptor `pid` owns, then forget the
    /// process. Keeps going past individual failures so one bad descriptor
    /// cannot leak the rest; the first error is reported.
    pub fn free_all_for(&self, pid: Pid) -> Result<(), VmError> {
        let mut procs = self.processes.lock();
        let Some(mut pcb) = procs.table.remove(pid) else {
            return Ok(());
        };
        drop(procs);

        let mut result = Ok(());
        for vaddr in pcb.pages.all_pages() {
            if let Err(e) = self.free_one(&mut pcb, vaddr, true) {
                warn!("pid {pid}: failed to release page {vaddr:#x}: {e}");
                result = result.and(Err(e));
            }
        }
        result
    }

    pub fn free_frames(&self) -> usize {
        self.frames.lock().free_frames()
    }

    pub fn free_slots(&self) -> u32 {
        self.swap.lock().free_slots()
    }
}
