pub mod eviction;

use crate::mem::error::VmError;
use crate::threading::process::Pid;
use alloc::{boxed::Box, vec};
use bitbybit::bitfield;
use eviction::{Clock, EvictionPolicy};
use medulla_shared::mem::PAGE_FRAME_SIZE;

/// Index of a physical frame. Frames are slots in a fixed arena, never raw
/// pointers, so the reverse map from frame to occupant is a plain array.
pub type FrameIndex = u32;

#[bitfield(u8, default = 0)]
pub struct FrameMapEntry {
    /// The frame holds some page's content.
    #[bit(0, rw)]
    occupied: bool,
    /// The frame must not be evicted (it is being populated, or holds a
    /// page mid-eviction).
    #[bit(1, rw)]
    pinned: bool,
    /// The occupant was accessed since the clock hand last passed.
    #[bit(2, rw)]
    referenced: bool,
}

/// The bounded pool of physical frames, with a reverse map from each frame
/// to the page descriptor occupying it.
///
/// `acquire` hands frames out pinned; the fault resolver unpins once the
/// mapping is installed. When no frame is free the caller runs the eviction
/// protocol: `choose_victim`, relocate the victim's content, `release`, then
/// `acquire` again. The whole table sits behind one lock (see
/// `SystemState`), so two concurrent faults can never pick the same frame.
pub struct FrameTable {
    memory: Box<[u8]>,
    core_map: Box<[FrameMapEntry]>,
    occupants: Box<[Option<(Pid, usize)>]>,
    policy: Box<dyn EvictionPolicy + Send>,
    frames_allocated: usize,
}

impl FrameTable {
    pub fn new(num_frames: usize) -> Self {
        Self::with_policy(num_frames, Box::new(Clock::default()))
    }

    pub fn with_policy(num_frames: usize, policy: Box<dyn EvictionPolicy + Send>) -> Self {
        FrameTable {
            memory: vec![0; num_frames * PAGE_FRAME_SIZE].into_boxed_slice(),
            core_map: vec![FrameMapEntry::DEFAULT; num_frames].into_boxed_slice(),
            occupants: vec![None; num_frames].into_boxed_slice(),
            policy,
            frames_allocated: 0,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.core_map.len()
    }

    pub fn free_frames(&self) -> usize {
        self.core_map.len() - self.frames_allocated
    }

    /// Take a free frame for `(owner, vaddr)`, pinned and marked referenced.
    ///
    /// Returns `None` when every frame is occupied; the caller must then
    /// evict (see [`Self::choose_victim`]) and retry.
    pub fn acquire(&mut self, owner: Pid, vaddr: usize) -> Option<FrameIndex> {
        let index = self.core_map.iter().position(|entry| !entry.occupied())?;
        self.core_map[index] = FrameMapEntry::DEFAULT
            .with_occupied(true)
            .with_pinned(true)
            .with_referenced(true);
        self.occupants[index] = Some((owner, vaddr));
        self.frames_allocated += 1;
        Some(index as FrameIndex)
    }

    /// Select a victim frame for eviction and pin it so no other fault can
    /// select it again while its content is being relocated.
    ///
    /// Fails with `ResourceExhausted` when every occupied frame is pinned.
    pub fn choose_victim(&mut self) -> Result<FrameIndex, VmError> {
        let index = self.policy.select(&mut self.core_map)?;
        debug_assert!(self.core_map[index].occupied() && !self.core_map[index].pinned());
        self.core_map[index] = self.core_map[index].with_pinned(true);
        Ok(index as FrameIndex)
    }

    /// Return a frame to the free pool. The occupant's descriptor must
    /// already have been repointed elsewhere.
    pub fn release(&mut self, frame: FrameIndex) -> Result<(), VmError> {
        let entry = self
            .core_map
            .get(frame as usize)
            .ok_or(VmError::ConsistencyViolation)?;
        if !entry.occupied() {
            return Err(VmError::ConsistencyViolation);
        }
        self.core_map[frame as usize] = FrameMapEntry::DEFAULT;
        self.occupants[frame as usize] = None;
        self.frames_allocated -= 1;
        Ok(())
    }

    /// Hand an evicted frame straight to a new occupant, pinned and marked
    /// referenced. The previous occupant's descriptor must already have
    /// been repointed at its new backing store.
    pub fn reassign(&mut self, frame: FrameIndex, owner: Pid, vaddr: usize) {
        debug_assert!(self.core_map[frame as usize].occupied());
        self.core_map[frame as usize] = FrameMapEntry::DEFAULT
            .with_occupied(true)
            .with_pinned(true)
            .with_referenced(true);
        self.occupants[frame as usize] = Some((owner, vaddr));
    }

    pub fn pin(&mut self, frame: FrameIndex) {
        self.core_map[frame as usize] = self.core_map[frame as usize].with_pinned(true);
    }

    pub fn unpin(&mut self, frame: FrameIndex) {
        self.core_map[frame as usize] = self.core_map[frame as usize].with_pinned(false);
    }

    /// Note an access to the frame's occupant, for the eviction policy.
    pub fn mark_referenced(&mut self, frame: FrameIndex) {
        self.core_map[frame as usize] = self.core_map[frame as usize].with_referenced(true);
    }

    /// The page currently occupying `frame`, as `(owner, vaddr)`.
    pub fn occupant(&self, frame: FrameIndex) -> Option<(Pid, usize)> {
        self.occupants[frame as usize]
    }

    pub fn frame_bytes(&self, frame: FrameIndex) -> &[u8] {
        let start = frame as usize * PAGE_FRAME_SIZE;
        &self.memory[start..start + PAGE_FRAME_SIZE]
    }

    pub fn frame_bytes_mut(&mut self, frame: FrameIndex) -> &mut [u8] {
        let start = frame as usize * PAGE_FRAME_SIZE;
        &mut self.memory[start..start + PAGE_FRAME_SIZE]
    }
}
