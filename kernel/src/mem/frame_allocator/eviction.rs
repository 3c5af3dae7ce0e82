//! Victim-selection policies for frame eviction.

use super::FrameMapEntry;
use crate::mem::error::VmError;

/// A policy for choosing which resident frame to evict.
pub trait EvictionPolicy {
    /// Returns the frame number of the victim.
    ///
    /// Candidates are entries that are occupied and not pinned. The policy
    /// may rewrite entry metadata (the clock hand clears referenced bits as
    /// it sweeps).
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when no candidate exists, i.e. every occupied
    /// frame is pinned.
    fn select(&mut self, core_map: &mut [FrameMapEntry]) -> Result<usize, VmError>;
}

/// Second-chance (clock) eviction.
///
/// Sweeps a hand over the core map; a referenced candidate loses its
/// referenced bit and is passed over, an unreferenced one is the victim.
/// Approximates LRU with one bit per frame.
#[derive(Default)]
pub struct Clock {
    /// The frame number the hand points at.
    hand: usize,
}

/// Evicts the lowest-numbered candidate, ignoring reference history.
/// Predictable, which makes it the policy of choice in tests.
#[derive(Default)]
pub struct FirstEvictable;

impl EvictionPolicy for Clock {
    fn select(&mut self, core_map: &mut [FrameMapEntry]) -> Result<usize, VmError> {
        if core_map.is_empty() {
            return Err(VmError::ResourceExhausted);
        }

        // Two revolutions: the first may only be stripping referenced bits,
        // the second must then find one of the stripped frames, unless
        // everything is pinned.
        for _ in 0..2 * core_map.len() {
            let index = self.hand;
            self.hand = (self.hand + 1) % core_map.len();

            let entry = core_map[index];
            if !entry.occupied() || entry.pinned() {
                continue;
            }
            if entry.referenced() {
                core_map[index] = entry.with_referenced(false);
                continue;
            }
            return Ok(index);
        }

        Err(VmError::ResourceExhausted)
    }
}

impl EvictionPolicy for FirstEvictable {
    fn select(&mut self, core_map: &mut [FrameMapEntry]) -> Result<usize, VmError> {
        core_map
            .iter()
            .position(|entry| entry.occupied() && !entry.pinned())
            .ok_or(VmError::ResourceExhausted)
    }
}
