use crate::mem::page::SupplementalPageTable;
use crate::paging::PageManager;
use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicU16, Ordering};

pub type Pid = u16;
pub type AtomicPid = AtomicU16;

/// The per-process state the pager cares about: the supplemental page table
/// and the installed mappings. Scheduling state lives elsewhere.
pub struct ProcessControlBlock {
    pub pid: Pid,
    pub pages: SupplementalPageTable,
    pub page_manager: PageManager,
}

impl ProcessControlBlock {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            pages: SupplementalPageTable::new(pid),
            page_manager: PageManager::new(),
        }
    }
}

#[derive(Default)]
pub struct ProcessTable {
    content: BTreeMap<Pid, ProcessControlBlock>,
}

pub struct ProcessState {
    pub table: ProcessTable,
    next_pid: AtomicPid,
}

impl Default for ProcessState {
    fn default() -> Self {
        Self {
            table: ProcessTable::default(),
            next_pid: AtomicPid::new(1),
        }
    }
}

impl ProcessState {
    pub fn allocate_pid(&self) -> Pid {
        // SAFETY: Atomically accesses a shared variable.
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        if pid == 0 {
            panic!("PID overflow");
        }
        pid
    }
}

impl ProcessTable {
    pub fn add(&mut self, pcb: ProcessControlBlock) {
        assert!(
            !self.content.contains_key(&pcb.pid),
            "PCB with pid {} already added to process table.",
            pcb.pid
        );
        self.content.insert(pcb.pid, pcb);
    }

    pub fn remove(&mut self, pid: Pid) -> Option<ProcessControlBlock> {
        self.content.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.content.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessControlBlock> {
        self.content.get_mut(&pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_unique_and_nonzero() {
        let state = ProcessState::default();
        let a = state.allocate_pid();
        let b = state.allocate_pid();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn table_lookup_by_pid() {
        let mut table = ProcessTable::default();
        table.add(ProcessControlBlock::new(7));
        assert!(table.get(7).is_some());
        assert!(table.get(8).is_none());
        assert!(table.remove(7).is_some());
        assert!(table.get(7).is_none());
    }
}
