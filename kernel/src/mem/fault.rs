//! Fault resolution: realizing a page's content into a physical frame.
//!
//! `load_page` is called for every user-mode page fault. It holds the
//! process-table lock for the duration of the fault and takes the frame,
//! swap, and file locks strictly in that order (never the reverse), so two
//! concurrent faults cannot deadlock or double-use a frame. Frames are
//! pinned from acquisition until the mapping is installed; eviction skips
//! pinned frames.

use crate::mem::error::VmError;
use crate::mem::frame_allocator::FrameIndex;
use crate::mem::page::{FileBacking, PageState};
use crate::sync::MutexGuard;
use crate::system::SystemState;
use crate::threading::process::{Pid, ProcessState};
use log::{debug, error, warn};
use medulla_shared::mem::{is_kernel_vaddr, page_round_down, PAGE_FRAME_SIZE};

/// What the faulting page's content must be rebuilt from.
enum Source {
    Zero,
    File(FileBacking),
    Swap(u32),
}

/// Resolve a fault at `fault_addr` for process `pid`.
///
/// # Errors
///
/// `InvalidAccess` if the process never mapped the address,
/// `ConsistencyViolation` if the page is already resident,
/// `ResourceExhausted` if no frame can be evicted or swap is full. All are
/// fatal for the faulting process; the trap handler terminates it.
pub fn load_page(system: &SystemState, pid: Pid, fault_addr: usize) -> Result<(), VmError> {
    if is_kernel_vaddr(fault_addr) {
        warn!("pid {pid}: fault on kernel address {fault_addr:#x}");
        return Err(VmError::InvalidAccess);
    }
    let vaddr = page_round_down(fault_addr);

    let mut procs = system.processes.lock();

    // Work out where the page's content lives before touching any other
    // lock. Unknown addresses terminate the process; stack growth is not
    // attempted here.
    let pcb = procs.table.get(pid).ok_or(VmError::InvalidAccess)?;
    let Some(page) = pcb.pages.fetch(vaddr) else {
        warn!("pid {pid}: fault on unmapped address {fault_addr:#x}");
        return Err(VmError::InvalidAccess);
    };
    let writable = page.writable();
    let source = match *page.state() {
        PageState::Resident { .. } => {
            error!("pid {pid}: fault on resident page {vaddr:#x}");
            return Err(VmError::ConsistencyViolation);
        }
        PageState::ZeroFill => Source::Zero,
        PageState::FileBacked => {
            let backing = page.file_backing().ok_or(VmError::ConsistencyViolation)?;
            Source::File(*backing)
        }
        PageState::SwappedOut { slot } => Source::Swap(slot),
    };

    let frame = acquire_frame(system, &mut procs, pid, vaddr)?;

    if let Err(e) = populate(system, frame, &source) {
        system.frames.lock().release(frame)?;
        return Err(e);
    }

    // Install the translation and flip the descriptor to resident, then let
    // the frame become evictable again. A failed install puts the frame
    // back in the pool rather than leaving it pinned and occupied forever.
    if let Err(e) = install(&mut procs, pid, vaddr, frame, writable, &source) {
        system.frames.lock().release(frame)?;
        return Err(e);
    }
    system.frames.lock().unpin(frame);

    // The swap copy is dead only once the page is safely resident.
    if let Source::Swap(slot) = source {
        system.swap.lock().free_slot(slot);
    }

    debug!("pid {pid}: page {vaddr:#x} loaded into frame {frame}");
    Ok(())
}

/// Load `bytes` into a fresh page at `vaddr`, creating its descriptor
/// already resident. Used by the process loader for pages that must exist
/// before first touch (the initial stack, for instance).
pub fn install_prepared(
    system: &SystemState,
    pid: Pid,
    vaddr: usize,
    writable: bool,
    bytes: &[u8],
) -> Result<(), VmError> {
    assert!(bytes.len() <= PAGE_FRAME_SIZE);
    if is_kernel_vaddr(vaddr) {
        return Err(VmError::InvalidAccess);
    }
    let vaddr = page_round_down(vaddr);

    let mut procs = system.processes.lock();
    if procs
        .table
        .get(pid)
        .ok_or(VmError::InvalidAccess)?
        .pages
        .fetch(vaddr)
        .is_some()
    {
        return Err(VmError::ConsistencyViolation);
    }

    let frame = acquire_frame(system, &mut procs, pid, vaddr)?;
    {
        let mut frames = system.frames.lock();
        let dest = frames.frame_bytes_mut(frame);
        dest[..bytes.len()].copy_from_slice(bytes);
        dest[bytes.len()..].fill(0);
    }

    let pcb = procs
        .table
        .get_mut(pid)
        .ok_or(VmError::ConsistencyViolation)?;
    if let Err(e) = pcb
        .pages
        .create_zero_entry(vaddr, Some(frame), writable)
        .and_then(|()| pcb.page_manager.map(vaddr, frame, writable))
    {
        pcb.pages.remove(vaddr);
        system.frames.lock().release(frame)?;
        return Err(e);
    }
    system.frames.lock().unpin(frame);
    Ok(())
}

/// Install the translation for `(pid, vaddr)` and flip its descriptor to
/// resident. A page whose content came from swap is mapped already dirty:
/// its bytes no longer match any file region it once had, so every later
/// eviction must go back to swap, never discard the frame. On failure the
/// mapping is rolled back and the caller releases the frame.
fn install(
    procs: &mut MutexGuard<ProcessState>,
    pid: Pid,
    vaddr: usize,
    frame: FrameIndex,
    writable: bool,
    source: &Source,
) -> Result<(), VmError> {
    let pcb = procs
        .table
        .get_mut(pid)
        .ok_or(VmError::ConsistencyViolation)?;
    pcb.page_manager.map(vaddr, frame, writable)?;
    let result = if matches!(source, Source::Swap(_)) {
        pcb.page_manager.mark_dirty(vaddr)
    } else {
        Ok(())
    }
    .and_then(|()| {
        pcb.pages
            .fetch_mut(vaddr)
            .ok_or(VmError::ConsistencyViolation)?
            .set_resident(frame)
    });
    if result.is_err() {
        pcb.page_manager.unmap(vaddr);
    }
    result
}

/// Get a frame for `(pid, vaddr)`, evicting another page if the pool is
/// full. The returned frame is pinned.
fn acquire_frame(
    system: &SystemState,
    procs: &mut MutexGuard<ProcessState>,
    pid: Pid,
    vaddr: usize,
) -> Result<FrameIndex, VmError> {
    let mut frames = system.frames.lock();
    if let Some(frame) = frames.acquire(pid, vaddr) {
        return Ok(frame);
    }

    // Pool exhausted: pick a victim (pinned by choose_victim so a
    // concurrent fault cannot race us to it) and relocate its content.
    let victim = frames.choose_victim()?;
    let (victim_pid, victim_vaddr) = frames
        .occupant(victim)
        .ok_or(VmError::ConsistencyViolation)?;

    let victim_pcb = procs
        .table
        .get_mut(victim_pid)
        .ok_or(VmError::ConsistencyViolation)?;
    // Unknown mappings are treated as dirty: when in doubt, swap.
    let dirty = victim_pcb
        .page_manager
        .lookup(victim_vaddr)
        .map_or(true, |pte| pte.dirty);
    let victim_page = victim_pcb
        .pages
        .fetch_mut(victim_vaddr)
        .ok_or(VmError::ConsistencyViolation)?;

    if victim_page.file_backing().is_some() && !dirty {
        // Clean page of file origin: the file still has the bytes, just
        // drop the frame's copy.
        victim_page.evict_to_file()?;
        debug!("evicting pid {victim_pid} page {victim_vaddr:#x} to its file");
    } else {
        let mut swap = system.swap.lock();
        let slot = match swap.allocate_slot() {
            Ok(slot) => slot,
            Err(e) => {
                warn!("swap full while evicting pid {victim_pid} page {victim_vaddr:#x}");
                frames.unpin(victim);
                return Err(e);
            }
        };
        if let Err(e) = swap.write_slot(slot, frames.frame_bytes(victim)) {
            swap.free_slot(slot);
            frames.unpin(victim);
            return Err(e);
        }
        victim_page.evict_to_swap(slot)?;
        debug!("evicting pid {victim_pid} page {victim_vaddr:#x} to swap slot {slot}");
    }

    // Only now that the victim's descriptor points at its new home does the
    // frame change hands.
    victim_pcb.page_manager.unmap(victim_vaddr);
    frames.reassign(victim, pid, vaddr);
    Ok(victim)
}

/// Fill `frame` with the page's content.
fn populate(system: &SystemState, frame: FrameIndex, source: &Source) -> Result<(), VmError> {
    let mut frames = system.frames.lock();
    match source {
        Source::Zero => {
            frames.frame_bytes_mut(frame).fill(0);
        }
        Source::File(backing) => {
            let files = system.files.lock();
            let file = files
                .get(backing.file)
                .ok_or(VmError::ConsistencyViolation)?;
            let dest = frames.frame_bytes_mut(frame);
            // A short read is not an error; everything past the bytes the
            // file provided reads as zero, including the zero_len tail.
            let n = file.read_at(&mut dest[..backing.read_len], backing.offset);
            dest[n..].fill(0);
        }
        Source::Swap(slot) => {
            let mut swap = system.swap.lock();
            swap.read_slot(*slot, frames.frame_bytes_mut(frame))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fs::MemFile;
    use crate::mem::error::VmError;
    use crate::mem::frame_allocator::eviction::FirstEvictable;
    use crate::mem::frame_allocator::FrameTable;
    use crate::mem::page::PageState;
    use crate::mem::swap::{SwapSpace, SECTORS_IN_PAGE};
    use crate::mem::user::{copy_from_user, copy_to_user};
    use crate::system::SystemState;
    use crate::threading::process::Pid;
    use alloc::boxed::Box;
    use alloc::vec;
    use alloc::vec::Vec;
    use medulla_shared::mem::PAGE_FRAME_SIZE;

    /// System with `frames` frames, `swap_slots` swap slots, and the
    /// deterministic lowest-frame-first eviction policy.
    fn tiny_system(frames: usize, swap_slots: u32) -> SystemState {
        SystemState::with_parts(
            FrameTable::with_policy(frames, Box::new(FirstEvictable)),
            SwapSpace::with_ram_disk(swap_slots * SECTORS_IN_PAGE),
        )
    }

    fn page_state(system: &SystemState, pid: Pid, vaddr: usize) -> PageState {
        let procs = system.processes.lock();
        *procs
            .table
            .get(pid)
            .expect("process should exist")
            .pages
            .fetch(vaddr)
            .expect("descriptor should exist")
            .state()
    }

    #[test]
    fn zero_fill_page_loads_as_zeroes() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();

        system.load_page(pid, 0x8048000).unwrap();
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::Resident { .. }
        ));
        let bytes = copy_from_user(&system, pid, 0x8048000, PAGE_FRAME_SIZE).unwrap();
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn fault_on_unmapped_address_is_invalid_access() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        assert!(matches!(
            system.load_page(pid, 0x8048000),
            Err(VmError::InvalidAccess)
        ));
    }

    #[test]
    fn fault_on_resident_page_is_a_consistency_error() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();
        system.load_page(pid, 0x8048000).unwrap();
        assert!(matches!(
            system.load_page(pid, 0x8048000),
            Err(VmError::ConsistencyViolation)
        ));
    }

    #[test]
    fn file_backed_page_zero_fills_past_read_len() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        // The file has plenty of content, but only 16 bytes of this page
        // come from it.
        let file = system.register_file(Box::new(MemFile::new(vec![0x7F; 4 * PAGE_FRAME_SIZE])));
        system
            .create_file_entry(pid, 0x8048000, file, 0, 16, PAGE_FRAME_SIZE - 16, false, None)
            .unwrap();

        system.load_page(pid, 0x8048000).unwrap();
        let bytes = copy_from_user(&system, pid, 0x8048000, PAGE_FRAME_SIZE).unwrap();
        assert!(bytes[..16].iter().all(|&b| b == 0x7F));
        assert!(bytes[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn short_file_read_is_zero_filled() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        // The descriptor asks for a full page but the file only has 10
        // bytes: the remainder must read as zero, not as garbage.
        let file = system.register_file(Box::new(MemFile::new(vec![0x42; 10])));
        system
            .create_file_entry(pid, 0x8048000, file, 0, PAGE_FRAME_SIZE, 0, false, None)
            .unwrap();

        system.load_page(pid, 0x8048000).unwrap();
        let bytes = copy_from_user(&system, pid, 0x8048000, PAGE_FRAME_SIZE).unwrap();
        assert!(bytes[..10].iter().all(|&b| b == 0x42));
        assert!(bytes[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn dirty_page_round_trips_through_swap() {
        let system = tiny_system(1, 4);
        let pid = system.create_process();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();
        system.create_zero_entry(pid, 0x8050000, true).unwrap();

        let pattern: Vec<u8> = (0..PAGE_FRAME_SIZE).map(|i| (i % 251) as u8).collect();
        copy_to_user(&system, pid, 0x8048000, &pattern).unwrap();

        // Faulting the second page with only one frame evicts the first,
        // which is dirty and not file-backed, so it must go to swap.
        let slots_before = system.free_slots();
        system.load_page(pid, 0x8050000).unwrap();
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::SwappedOut { .. }
        ));
        assert_eq!(system.free_slots(), slots_before - 1);

        // Touching the first page faults it back in, byte-identical. Its
        // slot is returned; the second page takes one on its way out.
        let bytes = copy_from_user(&system, pid, 0x8048000, PAGE_FRAME_SIZE).unwrap();
        assert_eq!(bytes, pattern);
        assert_eq!(system.free_slots(), slots_before - 1);
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::Resident { .. }
        ));
    }

    #[test]
    fn clean_file_page_is_discarded_without_swap() {
        let system = tiny_system(1, 4);
        let pid = system.create_process();
        let content: Vec<u8> = (0..PAGE_FRAME_SIZE).map(|i| (i % 13) as u8).collect();
        let file = system.register_file(Box::new(MemFile::new(content.clone())));
        system
            .create_file_entry(pid, 0x8048000, file, 0, PAGE_FRAME_SIZE, 0, false, None)
            .unwrap();
        system.create_zero_entry(pid, 0x8050000, true).unwrap();

        system.load_page(pid, 0x8048000).unwrap();

        // Evicting the clean read-only page must not touch the swap store.
        let slots_before = system.free_slots();
        system.load_page(pid, 0x8050000).unwrap();
        assert_eq!(system.free_slots(), slots_before);
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::FileBacked
        ));

        // And it reloads from the file.
        assert_eq!(
            copy_from_user(&system, pid, 0x8048000, PAGE_FRAME_SIZE).unwrap(),
            content
        );
    }

    #[test]
    fn dirty_file_page_goes_to_swap() {
        let system = tiny_system(1, 4);
        let pid = system.create_process();
        let file = system.register_file(Box::new(MemFile::new(vec![9; PAGE_FRAME_SIZE])));
        system
            .create_file_entry(pid, 0x8048000, file, 0, PAGE_FRAME_SIZE, 0, true, None)
            .unwrap();
        system.create_zero_entry(pid, 0x8050000, true).unwrap();

        copy_to_user(&system, pid, 0x8048000, &[1, 2, 3]).unwrap();
        let slots_before = system.free_slots();
        system.load_page(pid, 0x8050000).unwrap();
        assert_eq!(system.free_slots(), slots_before - 1);
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::SwappedOut { .. }
        ));

        // The modified bytes survive the round trip.
        let bytes = copy_from_user(&system, pid, 0x8048000, 4).unwrap();
        assert_eq!(bytes, [1, 2, 3, 9]);
    }

    #[test]
    fn modified_file_page_survives_repeated_eviction() {
        let system = tiny_system(1, 4);
        let pid = system.create_process();
        let file = system.register_file(Box::new(MemFile::new(vec![9; PAGE_FRAME_SIZE])));
        system
            .create_file_entry(pid, 0x8048000, file, 0, PAGE_FRAME_SIZE, 0, true, None)
            .unwrap();
        system.create_zero_entry(pid, 0x8050000, true).unwrap();

        copy_to_user(&system, pid, 0x8048000, &[1, 2, 3]).unwrap();

        // First eviction: the page is dirty, so it goes to swap.
        system.load_page(pid, 0x8050000).unwrap();
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::SwappedOut { .. }
        ));

        // Read it back in without writing, then evict it again. Its bytes
        // still differ from the file, so the second eviction must also go
        // to swap; discarding to the file would lose the modification.
        assert_eq!(copy_from_user(&system, pid, 0x8048000, 3).unwrap(), [1, 2, 3]);
        system.load_page(pid, 0x8050000).unwrap();
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::SwappedOut { .. }
        ));

        assert_eq!(copy_from_user(&system, pid, 0x8048000, 4).unwrap(), [1, 2, 3, 9]);
    }

    #[test]
    fn failed_install_releases_the_frame() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();
        // Plant a stale translation so the install step fails.
        {
            let mut procs = system.processes.lock();
            let pcb = procs.table.get_mut(pid).unwrap();
            pcb.page_manager.map(0x8048000, 0, true).unwrap();
        }

        let frames_before = system.free_frames();
        assert!(matches!(
            system.load_page(pid, 0x8048000),
            Err(VmError::ConsistencyViolation)
        ));
        // The frame acquired for the fault went back to the pool instead of
        // staying pinned and occupied.
        assert_eq!(system.free_frames(), frames_before);
    }

    #[test]
    fn resident_pages_never_share_a_frame() {
        let system = tiny_system(4, 4);
        let a = system.create_process();
        let b = system.create_process();
        for (pid, vaddr) in [(a, 0x8048000), (a, 0x8049000), (b, 0x8048000), (b, 0x1000)] {
            system.create_zero_entry(pid, vaddr, true).unwrap();
            system.load_page(pid, vaddr).unwrap();
        }

        let procs = system.processes.lock();
        let mut frames: Vec<_> = [(a, 0x8048000), (a, 0x8049000), (b, 0x8048000), (b, 0x1000)]
            .iter()
            .map(|&(pid, vaddr)| {
                procs
                    .table
                    .get(pid)
                    .unwrap()
                    .pages
                    .fetch(vaddr)
                    .unwrap()
                    .frame()
                    .expect("page should be resident")
            })
            .collect();
        frames.sort_unstable();
        frames.windows(2).for_each(|w| assert_ne!(w[0], w[1]));
    }

    #[test]
    fn exhausted_swap_fails_the_fault() {
        let system = tiny_system(1, 0);
        let pid = system.create_process();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();
        system.create_zero_entry(pid, 0x8050000, true).unwrap();

        copy_to_user(&system, pid, 0x8048000, &[1]).unwrap();
        // No free frame, the only victim is dirty, and swap has no slots.
        assert!(matches!(
            system.load_page(pid, 0x8050000),
            Err(VmError::ResourceExhausted)
        ));
        // The victim is untouched and still resident.
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::Resident { .. }
        ));
        assert_eq!(copy_from_user(&system, pid, 0x8048000, 1).unwrap(), [1]);
    }

    #[test]
    fn teardown_restores_frame_and_slot_baselines() {
        let system = tiny_system(2, 4);
        let baseline_frames = system.free_frames();
        let baseline_slots = system.free_slots();

        let pid = system.create_process();
        let file = system.register_file(Box::new(MemFile::new(vec![5; PAGE_FRAME_SIZE])));
        system.create_zero_entry(pid, 0x8048000, true).unwrap();
        system.create_zero_entry(pid, 0x8049000, true).unwrap();
        system.create_zero_entry(pid, 0x804a000, true).unwrap();
        system
            .create_file_entry(pid, 0x804b000, file, 0, PAGE_FRAME_SIZE, 0, true, None)
            .unwrap();

        // Touch everything, with writes, so frames and swap slots are all
        // in play.
        for vaddr in [0x8048000usize, 0x8049000, 0x804a000, 0x804b000] {
            copy_to_user(&system, pid, vaddr, &[0xEE]).unwrap();
        }
        assert!(system.free_frames() < baseline_frames || system.free_slots() < baseline_slots);

        system.free_all_for(pid).unwrap();
        assert_eq!(system.free_frames(), baseline_frames);
        assert_eq!(system.free_slots(), baseline_slots);

        // Teardown happened; a second call is a no-op.
        assert!(system.free_all_for(pid).is_ok());
    }

    #[test]
    fn fetch_after_free_returns_not_found() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();
        system.load_page(pid, 0x8048000).unwrap();

        let frames_before = system.free_frames();
        system.page_free(pid, 0x8048000, true).unwrap();
        assert_eq!(system.free_frames(), frames_before + 1);
        {
            let procs = system.processes.lock();
            assert!(procs.table.get(pid).unwrap().pages.fetch(0x8048000).is_none());
        }
        // Freeing again is a double free.
        assert!(matches!(
            system.page_free(pid, 0x8048000, true),
            Err(VmError::ConsistencyViolation)
        ));
    }

    #[test]
    fn munmap_tears_down_exactly_its_group() {
        let system = tiny_system(4, 8);
        let pid = system.create_process();
        let file = system.register_file(Box::new(MemFile::new(vec![3; 3 * PAGE_FRAME_SIZE])));
        let map_id = system
            .map_file(pid, 0x9000000, file, 0, 2 * PAGE_FRAME_SIZE, false)
            .unwrap();
        system.create_zero_entry(pid, 0x8048000, true).unwrap();

        system.load_page(pid, 0x9000000).unwrap();
        system.munmap(pid, map_id).unwrap();

        let procs = system.processes.lock();
        let pcb = procs.table.get(pid).unwrap();
        assert!(pcb.pages.fetch(0x9000000).is_none());
        assert!(pcb.pages.fetch(0x9001000).is_none());
        assert!(pcb.pages.fetch(0x8048000).is_some());
        drop(procs);

        // Unmapping the same id twice is an error the syscall layer sees.
        assert!(matches!(
            system.munmap(pid, map_id),
            Err(VmError::InvalidAccess)
        ));
    }

    #[test]
    fn prepared_pages_are_resident_from_the_start() {
        let system = tiny_system(2, 4);
        let pid = system.create_process();
        system
            .install_prepared(pid, 0x8048000, true, &[0xCA, 0xFE])
            .unwrap();
        assert!(matches!(
            page_state(&system, pid, 0x8048000),
            PageState::Resident { .. }
        ));
        // No fault needed to read it, and the tail is zeroed.
        let bytes = copy_from_user(&system, pid, 0x8048000, 4).unwrap();
        assert_eq!(bytes, [0xCA, 0xFE, 0, 0]);
    }

    #[test]
    fn concurrent_faults_never_double_use_frames() {
        let system = tiny_system(3, 64);
        let pids: Vec<Pid> = (0..4).map(|_| system.create_process()).collect();
        for &pid in &pids {
            for i in 0..4usize {
                system
                    .create_zero_entry(pid, 0x8048000 + i * PAGE_FRAME_SIZE, true)
                    .unwrap();
            }
        }

        let system = &system;
        std::thread::scope(|scope| {
            for &pid in &pids {
                scope.spawn(move || {
                    for round in 0..8u8 {
                        for i in 0..4usize {
                            let vaddr = 0x8048000 + i * PAGE_FRAME_SIZE;
                            copy_to_user(system, pid, vaddr, &[round]).unwrap();
                            assert_eq!(copy_from_user(system, pid, vaddr, 1).unwrap(), [round]);
                        }
                    }
                });
            }
        });

        // Every process released nothing yet; residency bookkeeping must
        // still be pairwise consistent with the frame table's reverse map.
        let procs = system.processes.lock();
        let frames = system.frames.lock();
        let mut seen = Vec::new();
        for &pid in &pids {
            let pcb = procs.table.get(pid).unwrap();
            for vaddr in pcb.pages.all_pages() {
                if let Some(frame) = pcb.pages.fetch(vaddr).unwrap().frame() {
                    assert_eq!(frames.occupant(frame), Some((pid, vaddr)));
                    seen.push(frame);
                }
            }
        }
        seen.sort_unstable();
        seen.windows(2).for_each(|w| assert_ne!(w[0], w[1]));
    }
}
