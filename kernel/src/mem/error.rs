use crate::block::BlockError;
use core::error::Error;
use core::fmt::{Debug, Display, Formatter};

/// Error type for paging operations.
///
/// Only `InvalidAccess` and `ResourceExhausted` cross the subsystem
/// boundary; both mean the faulting process must be terminated. Transient
/// conditions (frame shortage resolved by eviction, short file reads) are
/// handled inside the fault resolver and never surface.
pub enum VmError {
    /// Null/kernel pointer, or a user address the process never mapped
    InvalidAccess,
    /// An internal invariant failed (fault on a resident page, double free)
    ConsistencyViolation,
    /// No evictable frame, or no free swap slot
    ResourceExhausted,
    /// The swap device rejected an operation
    Block(BlockError),
}

impl Debug for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            VmError::InvalidAccess => write!(f, "InvalidAccess"),
            VmError::ConsistencyViolation => write!(f, "ConsistencyViolation"),
            VmError::ResourceExhausted => write!(f, "ResourceExhausted"),
            VmError::Block(e) => write!(f, "Block({e:?})"),
        }
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            VmError::InvalidAccess => write!(f, "invalid memory access"),
            VmError::ConsistencyViolation => write!(f, "page table consistency violation"),
            VmError::ResourceExhausted => write!(f, "out of frames or swap slots"),
            VmError::Block(e) => write!(f, "swap device error: {e}"),
        }
    }
}

impl Error for VmError {}

impl From<BlockError> for VmError {
    fn from(e: BlockError) -> Self {
        VmError::Block(e)
    }
}
