use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::storage::{PageId, PageStorage, FRAME_SIZE};

/// Flat-file page storage. The file carries no header and no checksums;
/// page `p` lives at byte offset `(p-1) * FRAME_SIZE`.
pub struct FileStorage {
    file: File,
}

impl FileStorage {
    /// Opens the backing file at `path`, creating it if absent.
    pub fn open(path: &Path) -> Result<FileStorage> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|err| Error::DiskOpen(format!("{}: {}", path.display(), err)))?;
        Ok(FileStorage { file })
    }

    fn seek_to(&mut self, page_id: PageId) -> Result<()> {
        debug_assert!(page_id > 0, "page ids are 1-based");
        let offset = (page_id - 1) * FRAME_SIZE as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|err| Error::DiskIo(format!("seek page {}: {}", page_id, err)))?;
        Ok(())
    }
}

impl PageStorage for FileStorage {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; FRAME_SIZE]) -> Result<()> {
        self.seek_to(page_id)?;
        self.file
            .read_exact(buf)
            .map_err(|err| Error::DiskIo(format!("read page {}: {}", page_id, err)))?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8; FRAME_SIZE]) -> Result<usize> {
        self.seek_to(page_id)?;
        self.file
            .write_all(data)
            .map_err(|err| Error::DiskIo(format!("write page {}: {}", page_id, err)))?;
        Ok(FRAME_SIZE)
    }

    fn close(&mut self) -> Result<()> {
        self.file.sync_all().map_err(|err| Error::DiskClose(err.to_string()))
    }
}
