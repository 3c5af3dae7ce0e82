pub mod block_core;
pub mod block_error;

pub use block_core::{Block, BlockSector, BLOCK_SECTOR_SIZE};
pub use block_error::BlockError;
