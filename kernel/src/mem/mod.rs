pub mod error;
pub mod fault;
pub mod frame_allocator;
pub mod page;
pub mod swap;
pub mod user;

pub use error::VmError;
pub use frame_allocator::{FrameIndex, FrameTable};
pub use page::{MapId, Page, PageState, SupplementalPageTable};
pub use swap::{SwapSlot, SwapSpace};
