//! Demand-paging subsystem: supplemental page tables, a bounded physical
//! frame pool with eviction, and a slot-based swap store.
//!
//! The fault path is [`system::SystemState::load_page`]: look the faulting
//! page up in the owning process's supplemental page table, realize its
//! content into a physical frame (zero fill, file read, or swap read), and
//! install the virtual-to-physical mapping. The trap handler, process
//! loader, and syscall layer are external; they call in through
//! [`system::SystemState`].

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod block;
pub mod fs;
pub mod mem;
pub mod paging;
pub mod sync;
pub mod system;
pub mod threading;

pub use mem::error::VmError;
pub use system::{SystemConfig, SystemState};
