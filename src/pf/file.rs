use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use log::debug;

use super::buffer::{BufferPool, Frame};
use super::policy::ReplacementPolicy;
use super::stats::PfStats;
use crate::constants::PAGE_SIZE;
use crate::error::PfError;

/// A page number within a `PagedFile`. Non-negative by construction; `-1`
/// is used elsewhere (leaf sibling links, free-list heads) as a "no page"
/// sentinel, which is why this is a signed type rather than `u32`.
pub type PageNum = i32;

struct Inner {
    file: File,
    page_count: usize,
    pool: BufferPool,
    stats: PfStats,
    /// Net outstanding pins across the whole pool (pins minus unpins).
    /// Production code never reads this; it exists so tests can assert
    /// invariant 8 (pin balance) after every public operation.
    pin_balance: i64,
}

impl Inner {
    fn offset(page: PageNum) -> u64 {
        page as u64 * PAGE_SIZE as u64
    }

    fn read_page_from_disk(&mut self, page: PageNum) -> Result<Box<[u8; PAGE_SIZE]>, PfError> {
        self.file.seek(SeekFrom::Start(Self::offset(page)))?;
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        self.file.read_exact(buf.as_mut())?;
        Ok(buf)
    }

    fn write_page_to_disk(&mut self, page: PageNum, bytes: &[u8; PAGE_SIZE]) -> Result<(), PfError> {
        self.file.seek(SeekFrom::Start(Self::offset(page)))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Evict one unpinned frame to make room, flushing it first if dirty.
    /// Returns `PfError::NoMem` if the whole pool is pinned.
    fn evict_to_make_room(&mut self) -> Result<(), PfError> {
        let (victim, frame) = self.pool.evict_one().ok_or(PfError::NoMem)?;
        if frame.dirty {
            self.write_page_to_disk(victim, &frame.bytes)?;
            self.stats.physical_writes += 1;
            debug!("evicted dirty page {} (flushed)", victim);
        } else {
            debug!("evicted clean page {}", victim);
        }
        Ok(())
    }

    fn fetch_and_pin(&mut self, page: PageNum) -> Result<(), PfError> {
        self.stats.logical_reads += 1;
        if self.pool.contains(page) {
            self.pool.pin(page);
            self.pin_balance += 1;
            return Ok(());
        }

        if self.pool.is_full() {
            self.evict_to_make_room()?;
        }

        let bytes = self.read_page_from_disk(page)?;
        self.stats.physical_reads += 1;
        self.pool.insert(page, bytes);
        self.pool.pin(page);
        self.pin_balance += 1;
        Ok(())
    }

    fn unpin(&mut self, page: PageNum, dirty: bool) -> Result<(), PfError> {
        if dirty {
            self.stats.logical_writes += 1;
        }
        self.pool.unpin(page, dirty)?;
        self.pin_balance -= 1;
        Ok(())
    }

    fn flush_all(&mut self) -> Result<(), PfError> {
        // Drain by repeatedly evicting; simplest way to flush every
        // resident frame without a second frame-iteration API surface.
        loop {
            match self.pool.evict_one() {
                Some((page, frame)) => {
                    if frame.dirty {
                        self.write_page_to_disk(page, &frame.bytes)?;
                        self.stats.physical_writes += 1;
                    }
                }
                None => break,
            }
        }
        Ok(())
    }
}

/// The paged-file handle: create/destroy/open/close a page-addressed file
/// backed by a fixed-capacity buffer pool.
///
/// Wraps its mutable state in `Rc<RefCell<_>>` solely so that `PinnedPage`
/// (below) can hold a handle back into the pool and release its pin on
/// `Drop`, guaranteeing unpin-on-every-exit-path without requiring the
/// caller to thread a `&mut PagedFile` through every fallible call. This is
/// not a process-wide singleton: each `PagedFile::open` call produces an
/// independent instance, and the type is neither `Send` nor `Sync`.
pub struct PagedFile {
    inner: Rc<RefCell<Inner>>,
}

impl PagedFile {
    /// Create an empty paged file at `path`. Fails if the file already
    /// exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<(), PfError> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(())
    }

    /// Remove a paged file created by `create`.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<(), PfError> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Open an existing paged file, attaching a buffer pool of `capacity`
    /// frames using `policy` for eviction.
    pub fn open<P: AsRef<Path>>(
        path: P,
        capacity: usize,
        policy: ReplacementPolicy,
    ) -> Result<Self, PfError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        let page_count = len / PAGE_SIZE;

        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                file,
                page_count,
                pool: BufferPool::new(capacity, policy),
                stats: PfStats::default(),
                pin_balance: 0,
            })),
        })
    }

    /// Close the file, flushing any dirty resident pages.
    ///
    /// Consumes `self`; any outstanding `PinnedPage`s from this file must
    /// be unpinned first (their `Rc` keeps `Inner` alive regardless, but a
    /// pin outliving `close` indicates a pin-discipline bug in the
    /// caller).
    pub fn close(self) -> Result<(), PfError> {
        self.inner.borrow_mut().flush_all()
    }

    pub fn page_count(&self) -> usize {
        self.inner.borrow().page_count
    }

    /// Allocate a new page at the end of the file, zero-fill it, and pin
    /// it. Always causes a physical write, so the file's on-disk length
    /// reflects the allocation immediately.
    pub fn alloc_page(&mut self) -> Result<PinnedPage, PfError> {
        let page = {
            let mut inner = self.inner.borrow_mut();
            let page = inner.page_count as PageNum;
            let bytes = Box::new([0u8; PAGE_SIZE]);
            inner.write_page_to_disk(page, &bytes)?;
            inner.stats.physical_writes += 1;
            inner.stats.logical_writes += 1;
            inner.page_count += 1;
            if inner.pool.is_full() {
                inner.evict_to_make_room()?;
            }
            inner.pool.insert(page, bytes);
            inner.pool.pin(page);
            inner.pin_balance += 1;
            page
        };
        debug!("allocated page {}", page);
        Ok(PinnedPage::new(Rc::clone(&self.inner), page))
    }

    /// Page 0 of the file. `PFE_EOF` if the file has no pages.
    pub fn get_first_page(&mut self) -> Result<PinnedPage, PfError> {
        if self.inner.borrow().page_count == 0 {
            return Err(PfError::Eof);
        }
        self.get_this_page(0)
    }

    /// The page immediately after `current` in page-number order. `PFE_EOF`
    /// at end of file.
    pub fn get_next_page(&mut self, current: PageNum) -> Result<PinnedPage, PfError> {
        let next = current + 1;
        if next as usize >= self.inner.borrow().page_count {
            return Err(PfError::Eof);
        }
        self.get_this_page(next)
    }

    /// Pin `page` by number.
    pub fn get_this_page(&mut self, page: PageNum) -> Result<PinnedPage, PfError> {
        if page < 0 || page as usize >= self.inner.borrow().page_count {
            return Err(PfError::InvalidPage);
        }
        self.inner.borrow_mut().fetch_and_pin(page)?;
        Ok(PinnedPage::new(Rc::clone(&self.inner), page))
    }

    pub fn stats(&self) -> PfStats {
        self.inner.borrow().stats
    }

    pub fn reset_stats(&mut self) {
        self.inner.borrow_mut().stats.reset();
    }

    /// Net outstanding pins (pins minus unpins) across the whole pool.
    /// Test-only: asserts invariant 8 (pin balance) after a sequence of
    /// public calls all complete.
    #[cfg(test)]
    pub(crate) fn net_pins(&self) -> i64 {
        self.inner.borrow().pin_balance
    }
}

/// RAII guard for a pinned page: releases the pin on `Drop` if the caller
/// did not already call `unpin` explicitly. Defaults to `dirty = false` on
/// the implicit drop path, so callers that mutate `bytes_mut()` must call
/// `unpin(true)` (or `mark_dirty()` then let it drop) themselves — the
/// spec's dirty flag is "true iff bytes were modified," which only the
/// caller, not this guard, can know for certain.
pub struct PinnedPage {
    inner: Rc<RefCell<Inner>>,
    page: PageNum,
    released: Cell<bool>,
    dirty_on_drop: Cell<bool>,
}

impl PinnedPage {
    fn new(inner: Rc<RefCell<Inner>>, page: PageNum) -> Self {
        Self {
            inner,
            page,
            released: Cell::new(false),
            dirty_on_drop: Cell::new(false),
        }
    }

    pub fn page_num(&self) -> PageNum {
        self.page
    }

    pub fn bytes(&self) -> Ref<[u8; PAGE_SIZE]> {
        Ref::map(self.inner.borrow(), |inner| inner.pool.frame(self.page).bytes.as_ref())
    }

    pub fn bytes_mut(&self) -> RefMut<[u8; PAGE_SIZE]> {
        RefMut::map(self.inner.borrow_mut(), |inner| {
            inner.pool.frame_mut(self.page).bytes.as_mut()
        })
    }

    /// Mark the page dirty so that an implicit (drop-triggered) unpin still
    /// flags it correctly, without requiring the caller to route every
    /// return path through an explicit `unpin(true)` call.
    pub fn mark_dirty(&self) {
        self.dirty_on_drop.set(true);
    }

    /// Explicitly release the pin with the given dirty flag.
    pub fn unpin(self, dirty: bool) -> Result<(), PfError> {
        self.released.set(true);
        self.inner.borrow_mut().unpin(self.page, dirty)
    }
}

impl Drop for PinnedPage {
    fn drop(&mut self) {
        if !self.released.get() {
            let _ = self.inner.borrow_mut().unpin(self.page, self.dirty_on_drop.get());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_BUFFER_CAPACITY;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("pf_file_test_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn persists_across_close_and_reopen() {
        let path = temp_path("persist");
        PagedFile::create(&path).unwrap();
        let mut pf = PagedFile::open(&path, DEFAULT_BUFFER_CAPACITY, ReplacementPolicy::Lru).unwrap();

        let mut page = pf.alloc_page().unwrap();
        page.bytes_mut()[0..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        page.unpin(true).unwrap();
        pf.close().unwrap();

        // A fresh PagedFile, not the same handle, must see the same bytes.
        let mut reopened = PagedFile::open(&path, DEFAULT_BUFFER_CAPACITY, ReplacementPolicy::Lru).unwrap();
        let page = reopened.get_first_page().unwrap();
        assert_eq!(&page.bytes()[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        page.unpin(false).unwrap();
        reopened.close().unwrap();

        PagedFile::destroy(&path).unwrap();
    }

    #[test]
    fn pin_balance_returns_to_zero_after_every_public_call() {
        let path = temp_path("pin_balance");
        PagedFile::create(&path).unwrap();
        let mut pf = PagedFile::open(&path, 2, ReplacementPolicy::Lru).unwrap();

        let p0 = pf.alloc_page().unwrap();
        p0.unpin(false).unwrap();
        assert_eq!(pf.net_pins(), 0);

        let p1 = pf.alloc_page().unwrap();
        p1.unpin(false).unwrap();
        assert_eq!(pf.net_pins(), 0);

        let first = pf.get_first_page().unwrap();
        first.unpin(false).unwrap();
        assert_eq!(pf.net_pins(), 0);

        let next = pf.get_next_page(0).unwrap();
        assert_eq!(pf.net_pins(), 1);
        drop(next);
        assert_eq!(pf.net_pins(), 0);

        let this = pf.get_this_page(0).unwrap();
        this.unpin(false).unwrap();
        assert_eq!(pf.net_pins(), 0);

        pf.close().unwrap();
        PagedFile::destroy(&path).unwrap();
    }
}
