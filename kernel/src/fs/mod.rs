//! File-backing boundary for demand paging.
//!
//! The real filesystem lives outside this subsystem; all the pager needs is
//! positioned reads from an already-opened file, so that is the whole
//! interface. The process loader registers each executable or mmapped file
//! here and hands the resulting [`FileId`] to the supplemental page table.

use crate::sync::Mutex;
use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};

/// Identifies a file registered with the pager. Weak handle: dropping the
/// table entry invalidates it, nothing keeps the file alive through it.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// Positioned reads on a page-backing file.
///
/// A short read is not an error: pages past the readable extent are
/// zero-filled by the fault resolver.
pub trait VmFile: Send {
    /// Read up to `buf.len()` bytes at byte `offset`, returning how many
    /// bytes were actually read.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> usize;
}

/// Registry of files available as page backing.
#[derive(Default)]
pub struct FileTable {
    content: BTreeMap<FileId, Box<dyn VmFile>>,
    next_id: u32,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, file: Box<dyn VmFile>) -> FileId {
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.content.insert(id, file);
        id
    }

    pub fn remove(&mut self, id: FileId) -> Option<Box<dyn VmFile>> {
        self.content.remove(&id)
    }

    pub fn get(&self, id: FileId) -> Option<&dyn VmFile> {
        self.content.get(&id).map(|file| &**file)
    }
}

/// An in-memory file, used as backing in hosted runs and tests.
pub struct MemFile {
    data: Mutex<Vec<u8>>,
}

impl MemFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

impl VmFile for MemFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let data = self.data.lock();
        let Ok(offset) = usize::try_from(offset) else {
            return 0;
        };
        if offset >= data.len() {
            return 0;
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn mem_file_short_read() {
        let file = MemFile::new(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(file.read_at(&mut buf, 0), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(file.read_at(&mut buf, 3), 0);
        assert_eq!(file.read_at(&mut buf, 2), 1);
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn table_hands_out_distinct_ids() {
        let mut table = FileTable::new();
        let a = table.register(Box::new(MemFile::new(vec![])));
        let b = table.register(Box::new(MemFile::new(vec![])));
        assert_ne!(a, b);
        assert!(table.get(a).is_some());
        assert!(table.remove(a).is_some());
        assert!(table.get(a).is_none());
        assert!(table.get(b).is_some());
    }
}
