//! Swap store: a pool of page-sized slots on a block device.
//!
//! Slots are opaque outside this module; the only operations are allocate,
//! free, and whole-page read/write. Slot bookkeeping uses a [`FreeSet`]
//! bitmap, one page is `SECTORS_IN_PAGE` consecutive sectors.

use crate::block::{Block, BLOCK_SECTOR_SIZE};
use crate::block::block_core::{BlockSector, RamDisk};
use crate::mem::error::VmError;
use alloc::boxed::Box;
use alloc::string::ToString;
use medulla_shared::free_set::FreeSet;
use medulla_shared::mem::PAGE_FRAME_SIZE;

/// Index of a swap slot.
pub type SwapSlot = u32;

pub const SECTORS_IN_PAGE: u32 = (PAGE_FRAME_SIZE / BLOCK_SECTOR_SIZE) as u32;

pub struct SwapSpace {
    block: Block,
    slots: FreeSet,
}

impl SwapSpace {
    /// Build a swap store over `block`. Sectors that do not fill a whole
    /// slot at the end of the device are unused.
    pub fn new(block: Block) -> Self {
        let slot_count = block.size() / SECTORS_IN_PAGE;
        Self {
            block,
            slots: FreeSet::new_all_free(slot_count),
        }
    }

    /// Swap store over an in-memory disk of `sectors` sectors.
    pub fn with_ram_disk(sectors: BlockSector) -> Self {
        Self::new(Block::new(
            "swap".to_string(),
            sectors,
            Box::new(RamDisk::new(sectors)),
        ))
    }

    /// Total slots on the device.
    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    /// Slots currently unallocated.
    pub fn free_slots(&self) -> u32 {
        self.slots.free_count()
    }

    /// Claim a free slot.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when the device is full. The caller treats this
    /// as fatal for the allocation that needed the slot.
    pub fn allocate_slot(&mut self) -> Result<SwapSlot, VmError> {
        self.slots.allocate().ok_or(VmError::ResourceExhausted)
    }

    /// Return a slot to the pool. The slot's content becomes meaningless.
    pub fn free_slot(&mut self, slot: SwapSlot) {
        self.slots.free(slot);
    }

    fn first_sector(slot: SwapSlot) -> BlockSector {
        slot * SECTORS_IN_PAGE
    }

    /// Write one page of data into `slot`.
    pub fn write_slot(&mut self, slot: SwapSlot, page: &[u8]) -> Result<(), VmError> {
        assert_eq!(page.len(), PAGE_FRAME_SIZE);
        let base = Self::first_sector(slot);
        for i in 0..SECTORS_IN_PAGE as usize {
            let chunk = &page[i * BLOCK_SECTOR_SIZE..(i + 1) * BLOCK_SECTOR_SIZE];
            self.block.write(base + i as BlockSector, chunk)?;
        }
        Ok(())
    }

    /// Read one page of data out of `slot`.
    pub fn read_slot(&mut self, slot: SwapSlot, page: &mut [u8]) -> Result<(), VmError> {
        assert_eq!(page.len(), PAGE_FRAME_SIZE);
        let base = Self::first_sector(slot);
        for i in 0..SECTORS_IN_PAGE as usize {
            let chunk = &mut page[i * BLOCK_SECTOR_SIZE..(i + 1) * BLOCK_SECTOR_SIZE];
            self.block.read(base + i as BlockSector, chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medulla_shared::sizes::SWAP_SECTORS;

    #[test]
    fn capacity_from_device_size() {
        let swap = SwapSpace::with_ram_disk(SWAP_SECTORS);
        assert_eq!(swap.capacity(), SWAP_SECTORS / SECTORS_IN_PAGE);
        assert_eq!(swap.free_slots(), swap.capacity());

        // A trailing partial slot is not offered.
        let swap = SwapSpace::with_ram_disk(SECTORS_IN_PAGE + 1);
        assert_eq!(swap.capacity(), 1);
    }

    #[test]
    fn page_round_trips_through_slot() {
        let mut swap = SwapSpace::with_ram_disk(SECTORS_IN_PAGE * 2);
        let slot = swap.allocate_slot().unwrap();
        let mut page = [0u8; PAGE_FRAME_SIZE];
        for (i, byte) in page.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        swap.write_slot(slot, &page).unwrap();

        let mut out = [0u8; PAGE_FRAME_SIZE];
        swap.read_slot(slot, &mut out).unwrap();
        assert_eq!(out[..], page[..]);
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut swap = SwapSpace::with_ram_disk(SECTORS_IN_PAGE);
        let slot = swap.allocate_slot().unwrap();
        assert!(matches!(
            swap.allocate_slot(),
            Err(VmError::ResourceExhausted)
        ));
        swap.free_slot(slot);
        assert!(swap.allocate_slot().is_ok());
    }
}
