use std::collections::HashMap;

use super::file::PageNum;
use super::policy::{Recency, ReplacementPolicy};
use crate::constants::PAGE_SIZE;
use crate::error::PfError;

pub struct Frame {
    pub bytes: Box<[u8; PAGE_SIZE]>,
    pub pin_count: u32,
    pub dirty: bool,
}

/// The fixed-capacity page cache. Holds resident frames keyed by page
/// number and picks an eviction victim via the configured replacement
/// policy when a miss arrives with no free slots.
pub struct BufferPool {
    capacity: usize,
    policy: ReplacementPolicy,
    frames: HashMap<PageNum, Frame>,
    recency: Recency,
}

impl BufferPool {
    pub fn new(capacity: usize, policy: ReplacementPolicy) -> Self {
        assert!(capacity > 0, "buffer pool capacity must be positive");
        Self {
            capacity,
            policy,
            frames: HashMap::new(),
            recency: Recency::new(),
        }
    }

    pub fn contains(&self, page: PageNum) -> bool {
        self.frames.contains_key(&page)
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    pub fn insert(&mut self, page: PageNum, bytes: Box<[u8; PAGE_SIZE]>) {
        self.frames.insert(
            page,
            Frame {
                bytes,
                pin_count: 0,
                dirty: false,
            },
        );
    }

    pub fn pin(&mut self, page: PageNum) {
        let frame = self.frames.get_mut(&page).expect("pin of absent frame");
        frame.pin_count += 1;
        self.recency.touch(page);
    }

    pub fn unpin(&mut self, page: PageNum, dirty: bool) -> Result<(), PfError> {
        let frame = self
            .frames
            .get_mut(&page)
            .ok_or(PfError::InvalidPage)?;
        if frame.pin_count == 0 {
            return Err(PfError::InvalidPage);
        }
        frame.pin_count -= 1;
        frame.dirty |= dirty;
        Ok(())
    }

    pub fn frame(&self, page: PageNum) -> &Frame {
        self.frames.get(&page).expect("missing frame")
    }

    pub fn frame_mut(&mut self, page: PageNum) -> &mut Frame {
        self.frames.get_mut(&page).expect("missing frame")
    }

    /// Evict one unpinned frame per the configured policy, returning it so
    /// the caller can flush it to disk if dirty. Returns `None` if every
    /// resident frame is currently pinned (the pool's working set has
    /// outgrown its capacity).
    pub fn evict_one(&mut self) -> Option<(PageNum, Frame)> {
        let frames = &self.frames;
        let victim = self
            .recency
            .pick_victim(self.policy, &|p| frames.get(&p).map_or(false, |f| f.pin_count == 0))?;
        self.recency.remove(victim);
        self.frames.remove(&victim).map(|f| (victim, f))
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
