use super::block_error::BlockError;
use alloc::{boxed::Box, string::String, vec};

/// Size of a block device sector in bytes.
///
/// All IDE disks use this sector size, as do most USB and SCSI disks.
pub const BLOCK_SECTOR_SIZE: usize = 512;

/// Index of a block device sector.
///
/// Good enough for devices up to 2 TB.
pub type BlockSector = u32;

/// Lower-level interface to block device drivers
pub trait BlockOp {
    /// Read a block sector
    fn read(&self, sector: BlockSector, buf: &mut [u8]);
    /// Write a block sector
    fn write(&mut self, sector: BlockSector, buf: &[u8]);
}

/// A memory-backed block device. Stands in for a real disk driver; the swap
/// partition in this subsystem is one of these unless a driver is supplied.
pub struct RamDisk {
    data: Box<[u8]>,
}

impl RamDisk {
    pub fn new(sectors: BlockSector) -> Self {
        Self {
            data: vec![0; sectors as usize * BLOCK_SECTOR_SIZE].into_boxed_slice(),
        }
    }
}

impl BlockOp for RamDisk {
    fn read(&self, sector: BlockSector, buf: &mut [u8]) {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        buf.copy_from_slice(&self.data[start..start + BLOCK_SECTOR_SIZE]);
    }

    fn write(&mut self, sector: BlockSector, buf: &[u8]) {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        self.data[start..start + BLOCK_SECTOR_SIZE].copy_from_slice(buf);
    }
}

/// A block device
pub struct Block {
    /// The name of the block device
    block_name: String,
    /// The size of the block device in sectors
    block_size: BlockSector,
    /// The block driver
    driver: Box<dyn BlockOp + Send>,

    /// The read count
    read_count: u32,
    /// The write count
    write_count: u32,
}

impl Block {
    pub fn new(block_name: String, block_size: BlockSector, driver: Box<dyn BlockOp + Send>) -> Self {
        Self {
            block_name,
            block_size,
            driver,
            read_count: 0,
            write_count: 0,
        }
    }

    /// Verifies that `buf` is a valid buffer for reading or writing a block
    /// sector and that `sector` lies on the device.
    fn verify_access(&self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        if buf.len() != BLOCK_SECTOR_SIZE {
            return Err(BlockError::BufferInvalid);
        }
        if sector >= self.block_size {
            return Err(BlockError::SectorOutOfBounds);
        }
        Ok(())
    }

    /// Read a sector into `buf` (which must be `BLOCK_SECTOR_SIZE` bytes).
    pub fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        self.verify_access(sector, buf)?;
        self.driver.read(sector, buf);
        self.read_count += 1;
        Ok(())
    }

    /// Write `buf` (which must be `BLOCK_SECTOR_SIZE` bytes) to a sector.
    pub fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        self.verify_access(sector, buf)?;
        self.driver.write(sector, buf);
        self.write_count += 1;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.block_name
    }

    pub fn size(&self) -> BlockSector {
        self.block_size
    }

    /// Sectors read since creation.
    pub fn read_count(&self) -> u32 {
        self.read_count
    }

    /// Sectors written since creation.
    pub fn write_count(&self) -> u32 {
        self.write_count
    }
}
