use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

pub mod file;
pub mod memory;

/// Logical page identifier. Page ids are positive and handed out
/// monotonically; zero is never a valid page.
pub type PageId = u64;

/// Size of a page on disk and of a buffer frame in memory, in bytes.
pub const FRAME_SIZE: usize = 4096;

/// A page-addressed storage backend. Pages are opaque fixed-size byte
/// blocks; page `p` occupies bytes `[(p-1)*FRAME_SIZE, p*FRAME_SIZE)` of
/// the backing medium (page numbering is 1-based).
///
/// The trait is object safe so the buffer pool can hold whichever backend
/// the configuration selected as a trait object.
pub trait PageStorage {
    /// Reads the block of `page_id` into `buf`. A page that was never
    /// written is an error, not zero-filled data.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; FRAME_SIZE]) -> Result<()>;

    /// Writes the block of `page_id`, returning the number of bytes
    /// written.
    fn write_page(&mut self, page_id: PageId, data: &[u8; FRAME_SIZE]) -> Result<usize>;

    /// Flushes and releases the backing handle.
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    File,
    Memory,
}

pub fn new_storage(typ: StorageType, path: &Path) -> Result<Box<dyn PageStorage>> {
    match typ {
        StorageType::File => Ok(Box::new(file::FileStorage::open(path)?)),
        StorageType::Memory => Ok(Box::new(memory::Memory::new())),
    }
}
