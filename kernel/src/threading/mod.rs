pub mod process;

pub use process::{Pid, ProcessControlBlock, ProcessState, ProcessTable};
