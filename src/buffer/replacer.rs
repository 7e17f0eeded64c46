use serde::Deserialize;

use crate::buffer::FrameId;

/// Replacement policy over registered buffer frames. The pool registers
/// a frame when a page is loaded into it, records every access, and asks
/// for a victim once no free frame remains.
///
/// A frame id must be deregistered with `remove` before it is reused for
/// a different page and registered again.
pub trait Replacer {
    /// Registers a just-loaded frame as most recently used, with an
    /// observed count of one. The frame must not already be registered.
    fn insert(&mut self, frame_id: FrameId);

    /// Records an access to a registered frame, updating recency order
    /// and observed counts.
    fn query(&mut self, frame_id: FrameId);

    /// Reports, without removing, the frame that should be evicted next.
    /// `None` when no frame is registered; the pool treats that as a
    /// broken invariant, since a victim must exist whenever no frame is
    /// free.
    fn victim(&self) -> Option<FrameId>;

    /// Deregisters a frame, dropping its access history.
    fn remove(&mut self, frame_id: FrameId);

    /// Number of registered frames.
    fn len(&self) -> usize;
}

/// Replacement policy selection, fixed at pool construction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacerType {
    Lru,
    LruK,
}

pub fn new_replacer(typ: ReplacerType, pool_size: usize, k: usize) -> Box<dyn Replacer> {
    match typ {
        ReplacerType::Lru => Box::new(LruReplacer::new(pool_size)),
        ReplacerType::LruK => Box::new(LruKReplacer::new(pool_size, k)),
    }
}

#[derive(Clone, Copy, Default)]
struct Link {
    prev: Option<FrameId>,
    next: Option<FrameId>,
    linked: bool,
}

/// Recency-ordered doubly linked list over dense frame ids. Links are
/// stable indices into a flat arena rather than pointers, which keeps
/// push-front, move-to-front, unlink and tail access O(1) without any
/// unsafe aliasing.
struct FrameList {
    head: Option<FrameId>,
    tail: Option<FrameId>,
    links: Vec<Link>,
    len: usize,
}

impl FrameList {
    fn new(capacity: usize) -> FrameList {
        FrameList { head: None, tail: None, links: vec![Link::default(); capacity], len: 0 }
    }

    fn contains(&self, frame_id: FrameId) -> bool {
        self.links.get(frame_id).map_or(false, |link| link.linked)
    }

    fn push_front(&mut self, frame_id: FrameId) {
        if frame_id >= self.links.len() {
            self.links.resize(frame_id + 1, Link::default());
        }
        debug_assert!(!self.links[frame_id].linked, "frame {} already linked", frame_id);
        self.links[frame_id] = Link { prev: None, next: self.head, linked: true };
        match self.head {
            Some(old) => self.links[old].prev = Some(frame_id),
            None => self.tail = Some(frame_id),
        }
        self.head = Some(frame_id);
        self.len += 1;
    }

    fn unlink(&mut self, frame_id: FrameId) {
        debug_assert!(self.contains(frame_id), "frame {} not linked", frame_id);
        let Link { prev, next, .. } = self.links[frame_id];
        match prev {
            Some(p) => self.links[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n].prev = prev,
            None => self.tail = prev,
        }
        self.links[frame_id] = Link::default();
        self.len -= 1;
    }

    fn move_to_front(&mut self, frame_id: FrameId) {
        if self.head == Some(frame_id) {
            return;
        }
        self.unlink(frame_id);
        self.push_front(frame_id);
    }

    fn back(&self) -> Option<FrameId> {
        self.tail
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Least-recently-used replacement: one strict recency order, the victim
/// at the tail.
pub struct LruReplacer {
    list: FrameList,
}

impl LruReplacer {
    pub fn new(pool_size: usize) -> LruReplacer {
        LruReplacer { list: FrameList::new(pool_size) }
    }
}

impl Replacer for LruReplacer {
    fn insert(&mut self, frame_id: FrameId) {
        self.list.push_front(frame_id);
    }

    fn query(&mut self, frame_id: FrameId) {
        self.list.move_to_front(frame_id);
    }

    fn victim(&self) -> Option<FrameId> {
        self.list.back()
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.list.unlink(frame_id);
    }

    fn len(&self) -> usize {
        self.list.len()
    }
}

/// LRU-K replacement. A frame starts on the *history* list and is
/// promoted to the *hot* list on its k-th recorded access after
/// registration; promotion is one-way for the rest of the frame's
/// residency. Victims are taken from the history tail while any history
/// entry exists, so a page touched once by a sequential scan is evicted
/// before any proven-hot page.
pub struct LruKReplacer {
    k: usize,
    history: FrameList,
    hot: FrameList,
    counts: Vec<usize>,
}

impl LruKReplacer {
    pub fn new(pool_size: usize, k: usize) -> LruKReplacer {
        assert!(k > 0, "lru-k requires k > 0");
        LruKReplacer {
            k,
            history: FrameList::new(pool_size),
            hot: FrameList::new(pool_size),
            counts: vec![0; pool_size],
        }
    }
}

impl Replacer for LruKReplacer {
    fn insert(&mut self, frame_id: FrameId) {
        if frame_id >= self.counts.len() {
            self.counts.resize(frame_id + 1, 0);
        }
        self.counts[frame_id] = 1;
        self.history.push_front(frame_id);
    }

    fn query(&mut self, frame_id: FrameId) {
        if self.history.contains(frame_id) {
            self.counts[frame_id] += 1;
            if self.counts[frame_id] > self.k {
                self.history.unlink(frame_id);
                self.hot.push_front(frame_id);
            } else {
                self.history.move_to_front(frame_id);
            }
        } else {
            self.hot.move_to_front(frame_id);
        }
    }

    fn victim(&self) -> Option<FrameId> {
        self.history.back().or_else(|| self.hot.back())
    }

    fn remove(&mut self, frame_id: FrameId) {
        if self.history.contains(frame_id) {
            self.history.unlink(frame_id);
        } else {
            self.hot.unlink(frame_id);
        }
        self.counts[frame_id] = 0;
    }

    fn len(&self) -> usize {
        self.history.len() + self.hot.len()
    }
}
