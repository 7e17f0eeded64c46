use std::collections::VecDeque;

use log::debug;
use rand::rngs::SmallRng;
use rand::RngCore;
use rand::SeedableRng;

use crate::buffer::frame::Frame;
use crate::buffer::pagetable::PageTable;
use crate::buffer::replacer::{new_replacer, Replacer, ReplacerType};
use crate::buffer::FrameId;
use crate::error::{Error, Result};
use crate::storage::{PageId, PageStorage, FRAME_SIZE};

/// How a page is being accessed. A write access marks the page dirty so
/// its bytes are written back before the frame is reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccessMode {
    Read,
    Write,
}

/// The buffer pool moves physical pages back and forth between a fixed
/// set of in-memory frames and page storage. Callers ask for a page by
/// id and get back the frame it resides in, without knowing whether the
/// request was served from memory or required disk I/O.
///
/// All bookkeeping (BCB index, free list, replacement policy) is owned
/// by the pool and updated as one unit per request: at every observable
/// point `free_frames() + resident_pages() == pool_size()`, and a page
/// is resident exactly when it has a BCB and its frame is registered
/// with the replacement policy.
pub struct BufferPool {
    pool_size: usize,
    storage: Box<dyn PageStorage>,
    frames: Vec<Frame>,
    /// The page resident in each frame, if any.
    owners: Vec<Option<PageId>>,
    page_table: PageTable,
    free_list: VecDeque<FrameId>,
    replacer: Box<dyn Replacer>,
    /// Source of placeholder content for freshly allocated pages.
    rng: Box<dyn RngCore>,
    next_page_id: PageId,
    hit_count: u64,
    read_bytes: u64,
    write_bytes: u64,
}

impl BufferPool {
    pub fn new(
        storage: Box<dyn PageStorage>,
        typ: ReplacerType,
        pool_size: usize,
        k: usize,
    ) -> BufferPool {
        Self::with_rng(storage, typ, pool_size, k, Box::new(SmallRng::from_entropy()))
    }

    /// Like `new`, with the random source for placeholder page content
    /// supplied by the caller.
    pub fn with_rng(
        storage: Box<dyn PageStorage>,
        typ: ReplacerType,
        pool_size: usize,
        k: usize,
        rng: Box<dyn RngCore>,
    ) -> BufferPool {
        assert!(pool_size > 0, "buffer pool requires at least one frame");
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for frame_id in 0..pool_size {
            frames.push(Frame::new());
            free_list.push_back(frame_id);
        }
        BufferPool {
            pool_size,
            storage,
            frames,
            owners: vec![None; pool_size],
            page_table: PageTable::new(pool_size),
            free_list,
            replacer: new_replacer(typ, pool_size, k),
            rng,
            next_page_id: 0,
            hit_count: 0,
            read_bytes: 0,
            write_bytes: 0,
        }
    }

    /// Makes `page_id` resident and returns its frame. Every access
    /// counts toward the replacement policy, including the very first;
    /// a `Write` access marks the page dirty.
    pub fn fix(&mut self, page_id: PageId, mode: AccessMode) -> Result<FrameId> {
        if page_id == 0 || page_id > self.next_page_id {
            return Err(Error::InvalidPageId(page_id));
        }
        let frame_id = match self.page_table.lookup(page_id) {
            Some(frame_id) => {
                self.hit_count += 1;
                frame_id
            }
            None => self.load(page_id)?,
        };
        self.replacer.query(frame_id);
        if mode == AccessMode::Write {
            self.page_table.set_dirty(page_id)?;
        }
        Ok(frame_id)
    }

    /// Brings a non-resident page into a frame: a free frame if one
    /// exists, an evicted one otherwise; then registers the page in the
    /// BCB index and the replacement policy.
    fn load(&mut self, page_id: PageId) -> Result<FrameId> {
        let frame_id = match self.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => self.evict()?,
        };
        // A failed read must not leak the frame.
        if let Err(err) = self.storage.read_page(page_id, self.frames[frame_id].bytes_mut()) {
            self.free_list.push_front(frame_id);
            return Err(err);
        }
        self.read_bytes += FRAME_SIZE as u64;
        self.page_table.insert(page_id, frame_id);
        self.owners[frame_id] = Some(page_id);
        self.replacer.insert(frame_id);
        Ok(frame_id)
    }

    /// Tears down the policy's victim and hands its frame back for
    /// reuse. A dirty victim is flushed before any bookkeeping is
    /// unlinked: a failed write leaves the page resident and the pool
    /// untouched.
    fn evict(&mut self) -> Result<FrameId> {
        let frame_id = self.replacer.victim().ok_or_else(|| {
            Error::PolicyInvariant(format!("no victim in a full pool of {} frames", self.pool_size))
        })?;
        let page_id = self.owners[frame_id]
            .ok_or_else(|| Error::Internal(format!("victim frame {} holds no page", frame_id)))?;
        let dirty = self.page_table.get(page_id).map_or(false, |bcb| bcb.dirty);
        if dirty {
            self.storage.write_page(page_id, self.frames[frame_id].bytes())?;
            self.write_bytes += FRAME_SIZE as u64;
        }
        self.replacer.remove(frame_id);
        self.page_table.remove(page_id)?;
        self.owners[frame_id] = None;
        debug!("evicted page {} from frame {} (dirty: {})", page_id, frame_id, dirty);
        Ok(frame_id)
    }

    /// Allocates the next page id and persists placeholder content for
    /// it directly to storage, bypassing the cache. The new page is not
    /// registered anywhere: a following `fix` is always a cold miss.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = self.next_page_id + 1;
        let mut data = [0u8; FRAME_SIZE];
        self.rng.fill_bytes(&mut data);
        self.storage.write_page(page_id, &data)?;
        self.next_page_id = page_id;
        Ok(page_id)
    }

    /// Flushes every dirty resident page and releases the storage
    /// handle. The flush order across buckets carries no meaning.
    pub fn shutdown(mut self) -> Result<()> {
        let dirty: Vec<_> = self.page_table.entries().filter(|bcb| bcb.dirty).copied().collect();
        debug!("shutdown: flushing {} dirty pages", dirty.len());
        for bcb in dirty {
            self.storage.write_page(bcb.page_id, self.frames[bcb.frame_id].bytes())?;
            self.write_bytes += FRAME_SIZE as u64;
        }
        self.storage.close()
    }

    /// Borrows the bytes of a fixed frame.
    pub fn frame_bytes(&self, frame_id: FrameId) -> &[u8; FRAME_SIZE] {
        self.frames[frame_id].bytes()
    }

    /// Mutably borrows the bytes of a fixed frame. The page must have
    /// been fixed with `AccessMode::Write`, or the modification is lost
    /// when the frame is reused.
    pub fn frame_bytes_mut(&mut self, frame_id: FrameId) -> &mut [u8; FRAME_SIZE] {
        self.frames[frame_id].bytes_mut()
    }

    /// Number of requests served without touching storage.
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Cumulative bytes read from storage on cache misses.
    pub fn read_bytes(&self) -> u64 {
        self.read_bytes
    }

    /// Cumulative bytes written back to storage on eviction and
    /// shutdown.
    pub fn write_bytes(&self) -> u64 {
        self.write_bytes
    }

    /// Frames not currently holding any page.
    pub fn free_frames(&self) -> usize {
        self.free_list.len()
    }

    /// Pages currently resident in the pool.
    pub fn resident_pages(&self) -> usize {
        self.page_table.len()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::storage::memory::Memory;

    use super::*;

    fn new_pool(typ: ReplacerType, pool_size: usize, k: usize) -> BufferPool {
        BufferPool::with_rng(
            Box::new(Memory::new()),
            typ,
            pool_size,
            k,
            Box::new(SmallRng::seed_from_u64(17)),
        )
    }

    /// Memory storage that records the page id of every write, so tests
    /// can observe write-backs directly.
    struct RecordingStorage {
        inner: Memory,
        writes: Rc<RefCell<Vec<PageId>>>,
    }

    impl PageStorage for RecordingStorage {
        fn read_page(&mut self, page_id: PageId, buf: &mut [u8; FRAME_SIZE]) -> Result<()> {
            self.inner.read_page(page_id, buf)
        }

        fn write_page(&mut self, page_id: PageId, data: &[u8; FRAME_SIZE]) -> Result<usize> {
            self.writes.borrow_mut().push(page_id);
            self.inner.write_page(page_id, data)
        }

        fn close(&mut self) -> Result<()> {
            self.inner.close()
        }
    }

    /// Storage whose reads always fail, for error propagation tests.
    struct FailingReads {
        inner: Memory,
    }

    impl PageStorage for FailingReads {
        fn read_page(&mut self, page_id: PageId, _buf: &mut [u8; FRAME_SIZE]) -> Result<()> {
            Err(Error::DiskIo(format!("read page {}: injected failure", page_id)))
        }

        fn write_page(&mut self, page_id: PageId, data: &[u8; FRAME_SIZE]) -> Result<usize> {
            self.inner.write_page(page_id, data)
        }

        fn close(&mut self) -> Result<()> {
            self.inner.close()
        }
    }

    #[test]
    fn test_end_to_end_lru() -> Result<()> {
        let mut pool = new_pool(ReplacerType::Lru, 2, 2);
        let a = pool.allocate_page()?;
        let b = pool.allocate_page()?;
        let c = pool.allocate_page()?;

        // Two cold misses fill the pool.
        let frame_a = pool.fix(a, AccessMode::Read)?;
        let frame_b = pool.fix(b, AccessMode::Read)?;
        assert_eq!(0, pool.free_frames());
        assert_eq!(2, pool.resident_pages());
        assert_eq!(0, pool.hit_count());
        assert_eq!(2 * FRAME_SIZE as u64, pool.read_bytes());

        // A is resident: a hit that also refreshes A's recency.
        assert_eq!(frame_a, pool.fix(a, AccessMode::Read)?);
        assert_eq!(1, pool.hit_count());

        // C misses; B is now the least recently used page and gets
        // evicted clean, so no bytes are written.
        let frame_c = pool.fix(c, AccessMode::Write)?;
        assert_eq!(frame_b, frame_c);
        assert_eq!(0, pool.write_bytes());
        assert_eq!(None, pool.page_table.lookup(b));

        // B was evicted, so fixing it again is a cold reload.
        let reads = pool.read_bytes();
        pool.fix(b, AccessMode::Read)?;
        assert_eq!(reads + FRAME_SIZE as u64, pool.read_bytes());
        assert_eq!(1, pool.hit_count());
        assert_eq!(0, pool.free_frames());
        assert_eq!(2, pool.resident_pages());
        Ok(())
    }

    #[test]
    fn test_shutdown_flushes_only_dirty_pages() -> Result<()> {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let storage = RecordingStorage { inner: Memory::new(), writes: Rc::clone(&writes) };
        let mut pool = BufferPool::with_rng(
            Box::new(storage),
            ReplacerType::Lru,
            2,
            2,
            Box::new(SmallRng::seed_from_u64(17)),
        );

        let a = pool.allocate_page()?;
        let b = pool.allocate_page()?;
        pool.fix(a, AccessMode::Read)?;
        pool.fix(b, AccessMode::Write)?;

        writes.borrow_mut().clear();
        pool.shutdown()?;
        assert_eq!(vec![b], *writes.borrow());
        Ok(())
    }

    #[test]
    fn test_dirty_write_back_on_eviction() -> Result<()> {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let storage = RecordingStorage { inner: Memory::new(), writes: Rc::clone(&writes) };
        let mut pool = BufferPool::with_rng(
            Box::new(storage),
            ReplacerType::Lru,
            1,
            2,
            Box::new(SmallRng::seed_from_u64(17)),
        );

        let a = pool.allocate_page()?;
        let b = pool.allocate_page()?;
        let c = pool.allocate_page()?;

        // A is written, then evicted by B: exactly one write-back of A
        // before its frame is reused.
        pool.fix(a, AccessMode::Write)?;
        writes.borrow_mut().clear();
        pool.fix(b, AccessMode::Read)?;
        assert_eq!(vec![a], *writes.borrow());
        assert_eq!(FRAME_SIZE as u64, pool.write_bytes());

        // B was only read; evicting it writes nothing.
        writes.borrow_mut().clear();
        pool.fix(c, AccessMode::Read)?;
        assert!(writes.borrow().is_empty());
        assert_eq!(FRAME_SIZE as u64, pool.write_bytes());
        Ok(())
    }

    #[test]
    fn test_allocate_then_fix_round_trip() -> Result<()> {
        let mut pool = new_pool(ReplacerType::Lru, 2, 2);
        let page_id = pool.allocate_page()?;

        // The pool was seeded deterministically; regenerate the bytes
        // allocate_page persisted.
        let mut rng = SmallRng::seed_from_u64(17);
        let mut expected = [0u8; FRAME_SIZE];
        rng.fill_bytes(&mut expected);

        let frame_id = pool.fix(page_id, AccessMode::Read)?;
        assert_eq!(&expected, pool.frame_bytes(frame_id));
        assert_eq!(FRAME_SIZE as u64, pool.read_bytes());
        assert_eq!(0, pool.write_bytes());
        Ok(())
    }

    #[test]
    fn test_lruk_eviction_prefers_history() -> Result<()> {
        let mut pool = new_pool(ReplacerType::LruK, 2, 2);
        let a = pool.allocate_page()?;
        let b = pool.allocate_page()?;
        let c = pool.allocate_page()?;

        // A is fixed twice and becomes hot; B is only fixed once.
        pool.fix(a, AccessMode::Read)?;
        pool.fix(a, AccessMode::Read)?;
        let frame_b = pool.fix(b, AccessMode::Read)?;

        // C evicts B from the history list even though B is the more
        // recently used page.
        let frame_c = pool.fix(c, AccessMode::Read)?;
        assert_eq!(frame_b, frame_c);
        assert_eq!(Some(a), pool.owners[pool.page_table.lookup(a).unwrap()]);
        assert_eq!(None, pool.page_table.lookup(b));
        Ok(())
    }

    #[test]
    fn test_invalid_page_id() -> Result<()> {
        let mut pool = new_pool(ReplacerType::Lru, 2, 2);
        assert_eq!(Err(Error::InvalidPageId(0)), pool.fix(0, AccessMode::Read));
        assert_eq!(Err(Error::InvalidPageId(1)), pool.fix(1, AccessMode::Read));

        let page_id = pool.allocate_page()?;
        pool.fix(page_id, AccessMode::Read)?;
        assert_eq!(Err(Error::InvalidPageId(2)), pool.fix(2, AccessMode::Read));
        Ok(())
    }

    #[test]
    fn test_failed_read_returns_frame_to_free_list() -> Result<()> {
        let mut pool = BufferPool::with_rng(
            Box::new(FailingReads { inner: Memory::new() }),
            ReplacerType::Lru,
            2,
            2,
            Box::new(SmallRng::seed_from_u64(17)),
        );

        let page_id = pool.allocate_page()?;
        assert!(matches!(pool.fix(page_id, AccessMode::Read), Err(Error::DiskIo(_))));

        // The grabbed frame went back to the free list; nothing is
        // resident or registered.
        assert_eq!(2, pool.free_frames());
        assert_eq!(0, pool.resident_pages());
        assert_eq!(0, pool.read_bytes());
        Ok(())
    }

    #[test]
    fn test_free_resident_invariant() -> Result<()> {
        let mut pool = new_pool(ReplacerType::LruK, 4, 2);
        let mut pages = Vec::new();
        for _ in 0..16 {
            pages.push(pool.allocate_page()?);
        }

        let mut requests = 0u64;
        for step in 0..200usize {
            let page_id = pages[step * 7 % pages.len()];
            let mode = if step % 3 == 0 { AccessMode::Write } else { AccessMode::Read };
            pool.fix(page_id, mode)?;
            requests += 1;
            assert_eq!(pool.pool_size(), pool.free_frames() + pool.resident_pages());
        }

        // Every request was either a hit or a miss that read one page.
        let misses = requests - pool.hit_count();
        assert_eq!(misses * FRAME_SIZE as u64, pool.read_bytes());
        Ok(())
    }
}
