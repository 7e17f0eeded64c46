use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::storage::{PageId, PageStorage, FRAME_SIZE};

/// In-memory page storage, used by tests. Behaves like the file backend,
/// including erroring on reads of pages that were never written.
pub struct Memory {
    pages: HashMap<PageId, Box<[u8; FRAME_SIZE]>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { pages: HashMap::new() }
    }
}

impl PageStorage for Memory {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; FRAME_SIZE]) -> Result<()> {
        match self.pages.get(&page_id) {
            Some(data) => {
                buf.copy_from_slice(&data[..]);
                Ok(())
            }
            None => Err(Error::DiskIo(format!("read page {}: not on disk", page_id))),
        }
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8; FRAME_SIZE]) -> Result<usize> {
        self.pages.insert(page_id, Box::new(*data));
        Ok(FRAME_SIZE)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
