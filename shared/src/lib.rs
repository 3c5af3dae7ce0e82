#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod free_set;
pub mod mem;
pub mod sizes;
