use std::path::Path;

use log::debug;

use super::page::{PageHeader, Slot, HEADER_SIZE};
use super::record::{Record, Rid};
use crate::constants::{PAGE_SIZE, RM_SLOT_SIZE};
use crate::error::PfError;
use crate::pf::{PagedFile, ReplacementPolicy};

/// File-level aggregate statistics, as computed by `compute_file_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub pages: usize,
    pub payload_bytes: usize,
    pub num_slots: usize,
    pub num_deleted: usize,
}

impl FileStats {
    /// Percentage of total page bytes occupied by live payload.
    pub fn utilization(&self) -> f64 {
        if self.pages == 0 {
            return 0.0;
        }
        100.0 * self.payload_bytes as f64 / (self.pages * PAGE_SIZE) as f64
    }
}

/// A slotted-page, variable-length record store over a `PagedFile`.
///
/// Carries running totals (`total_records`, `total_deleted`,
/// `total_payload_bytes`), mirroring the original `RM_FileHandle`'s fields.
pub struct RmFileHandle {
    pf: PagedFile,
    pub total_records: u64,
    pub total_deleted: u64,
    pub total_payload_bytes: u64,
}

impl RmFileHandle {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<(), PfError> {
        PagedFile::create(path)
    }

    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<(), PfError> {
        PagedFile::destroy(path)
    }

    /// Open an RM file with a fixed-size buffer pool under the LRU policy
    /// — the replacement policy the original `RM_OpenFile` hardcodes.
    pub fn open<P: AsRef<Path>>(path: P, buffer_capacity: usize) -> Result<Self, PfError> {
        let pf = PagedFile::open(path, buffer_capacity, ReplacementPolicy::Lru)?;
        Ok(Self {
            pf,
            total_records: 0,
            total_deleted: 0,
            total_payload_bytes: 0,
        })
    }

    pub fn close(self) -> Result<(), PfError> {
        self.pf.close()
    }

    /// Insert `data` as a new record, returning its stable RID.
    ///
    /// Scans existing pages for the first with enough free space; if none
    /// fits, allocates a fresh page. Never compacts. Fails (without
    /// truncating) if the record does not fit on an otherwise-empty page.
    pub fn insert(&mut self, data: &[u8]) -> Result<Rid, PfError> {
        let max_payload = PAGE_SIZE - HEADER_SIZE - RM_SLOT_SIZE;
        if data.len() > max_payload {
            return Err(PfError::NoMem);
        }

        let needed = data.len() as i32 + RM_SLOT_SIZE as i32;

        let mut page = self.pf.get_first_page();
        let target_page = loop {
            match page {
                Ok(pinned) => {
                    let hdr = PageHeader::read(&*pinned.bytes());
                    if hdr.free_space() >= needed {
                        break pinned;
                    }
                    let next = pinned.page_num();
                    pinned.unpin(false)?;
                    page = self.pf.get_next_page(next);
                }
                Err(PfError::Eof) => {
                    let pinned = self.pf.alloc_page()?;
                    PageHeader::init(&mut *pinned.bytes_mut());
                    break pinned;
                }
                Err(e) => return Err(e),
            }
        };

        let mut hdr = PageHeader::read(&*target_page.bytes());
        let slot_no = hdr.num_slots;

        {
            let mut bytes = target_page.bytes_mut();
            bytes[hdr.free_start as usize..hdr.free_start as usize + data.len()]
                .copy_from_slice(data);
            Slot {
                offset: hdr.free_start as i16,
                length: data.len() as i16,
            }
            .write(&mut *bytes, slot_no as usize);
        }

        hdr.free_start += data.len() as i32;
        hdr.free_end -= RM_SLOT_SIZE as i32;
        hdr.num_slots += 1;
        hdr.write(&mut *target_page.bytes_mut());

        let rid = Rid::new(target_page.page_num(), slot_no);
        target_page.unpin(true)?;

        self.total_records += 1;
        self.total_payload_bytes += data.len() as u64;
        debug!("inserted record at {:?} ({} bytes)", rid, data.len());
        Ok(rid)
    }

    /// Tombstone the slot at `rid`. Fails with `InvalidPage` for an
    /// out-of-range slot, `PageFree` for an already-deleted one.
    pub fn delete(&mut self, rid: Rid) -> Result<(), PfError> {
        let pinned = self.pf.get_this_page(rid.page)?;
        let hdr = PageHeader::read(&*pinned.bytes());
        if rid.slot < 0 || rid.slot >= hdr.num_slots {
            pinned.unpin(false)?;
            return Err(PfError::InvalidPage);
        }

        let mut slot = Slot::read(&*pinned.bytes(), rid.slot as usize);
        if slot.is_tombstone() {
            pinned.unpin(false)?;
            return Err(PfError::PageFree);
        }
        slot.offset = Slot::TOMBSTONE;
        slot.write(&mut *pinned.bytes_mut(), rid.slot as usize);
        pinned.unpin(true)?;

        self.total_deleted += 1;
        Ok(())
    }

    /// First live record in the file, scanning pages in PF order. `Ok(None)`
    /// if the file has no live records (spec's `PFE_EOF`, collapsed to an
    /// `Option` at this Rust-idiomatic boundary — see SPEC_FULL §7).
    pub fn get_first_record(&mut self) -> Result<Option<(Rid, Record)>, PfError> {
        let mut page = self.pf.get_first_page();
        loop {
            match page {
                Ok(pinned) => {
                    let hdr = PageHeader::read(&*pinned.bytes());
                    for s in 0..hdr.num_slots {
                        let slot = Slot::read(&*pinned.bytes(), s as usize);
                        if !slot.is_tombstone() {
                            let rec = Self::read_record(&*pinned.bytes(), &slot);
                            let rid = Rid::new(pinned.page_num(), s);
                            pinned.unpin(false)?;
                            return Ok(Some((rid, rec)));
                        }
                    }
                    let next = pinned.page_num();
                    pinned.unpin(false)?;
                    page = self.pf.get_next_page(next);
                }
                Err(PfError::Eof) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Next live record after `rid`: finish the current page, then walk
    /// subsequent pages in PF order. `Ok(None)` at end of file.
    pub fn get_next_record(&mut self, rid: Rid) -> Result<Option<(Rid, Record)>, PfError> {
        let pinned = self.pf.get_this_page(rid.page)?;
        let hdr = PageHeader::read(&*pinned.bytes());
        for s in (rid.slot + 1)..hdr.num_slots {
            let slot = Slot::read(&*pinned.bytes(), s as usize);
            if !slot.is_tombstone() {
                let rec = Self::read_record(&*pinned.bytes(), &slot);
                let next_rid = Rid::new(pinned.page_num(), s);
                pinned.unpin(false)?;
                return Ok(Some((next_rid, rec)));
            }
        }
        let current = pinned.page_num();
        pinned.unpin(false)?;

        let mut page = self.pf.get_next_page(current);
        loop {
            match page {
                Ok(pinned) => {
                    let hdr = PageHeader::read(&*pinned.bytes());
                    for s in 0..hdr.num_slots {
                        let slot = Slot::read(&*pinned.bytes(), s as usize);
                        if !slot.is_tombstone() {
                            let rec = Self::read_record(&*pinned.bytes(), &slot);
                            let next_rid = Rid::new(pinned.page_num(), s);
                            pinned.unpin(false)?;
                            return Ok(Some((next_rid, rec)));
                        }
                    }
                    let next = pinned.page_num();
                    pinned.unpin(false)?;
                    page = self.pf.get_next_page(next);
                }
                Err(PfError::Eof) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    fn read_record(bytes: &[u8], slot: &Slot) -> Record {
        if slot.length == 0 {
            Record::empty()
        } else {
            Record::new(&bytes[slot.offset as usize..slot.offset as usize + slot.length as usize])
        }
    }

    /// Per-page analysis: used payload bytes, slot count, tombstone count.
    /// Tolerates the page already being pinned elsewhere (the spec's
    /// `PAGEFIXED`-as-success contract): `get_this_page` here never fails
    /// on a page that is merely already pinned, since our buffer pool
    /// tracks pin counts rather than a single-owner fix, so that case is
    /// structurally a success rather than an error this method has to
    /// catch.
    pub fn analyze_page(&mut self, page: crate::pf::PageNum) -> Result<(usize, usize, usize), PfError> {
        let pinned = self.pf.get_this_page(page)?;
        let hdr = PageHeader::read(&*pinned.bytes());
        let mut used = 0usize;
        let mut deleted = 0usize;
        for s in 0..hdr.num_slots {
            let slot = Slot::read(&*pinned.bytes(), s as usize);
            if slot.is_tombstone() {
                deleted += 1;
            } else {
                used += slot.length as usize;
            }
        }
        let num_slots = hdr.num_slots as usize;
        pinned.unpin(false)?;
        Ok((used, num_slots, deleted))
    }

    /// Whole-file aggregation, walking every page via PF page succession.
    pub fn compute_file_stats(&mut self) -> Result<FileStats, PfError> {
        let mut stats = FileStats {
            pages: 0,
            payload_bytes: 0,
            num_slots: 0,
            num_deleted: 0,
        };

        let mut page = self.pf.get_first_page();
        loop {
            match page {
                Ok(pinned) => {
                    let num = pinned.page_num();
                    pinned.unpin(false)?;
                    let (used, slots, deleted) = self.analyze_page(num)?;
                    stats.pages += 1;
                    stats.payload_bytes += used;
                    stats.num_slots += slots;
                    stats.num_deleted += deleted;
                    page = self.pf.get_next_page(num);
                }
                Err(PfError::Eof) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_BUFFER_CAPACITY;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("rm_file_test_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn insert_and_scan_round_trip() {
        let path = temp_path("insert_scan");
        RmFileHandle::create(&path).unwrap();
        let mut rm = RmFileHandle::open(&path, DEFAULT_BUFFER_CAPACITY).unwrap();

        let r1 = rm.insert(b"alpha").unwrap();
        let r2 = rm.insert(b"beta").unwrap();
        assert_eq!(rm.total_records, 2);

        let (rid, rec) = rm.get_first_record().unwrap().unwrap();
        assert_eq!(rid, r1);
        assert_eq!(rec.bytes(), b"alpha");

        let (rid, rec) = rm.get_next_record(rid).unwrap().unwrap();
        assert_eq!(rid, r2);
        assert_eq!(rec.bytes(), b"beta");

        assert!(rm.get_next_record(rid).unwrap().is_none());

        rm.close().unwrap();
        RmFileHandle::destroy(&path).unwrap();
    }

    #[test]
    fn delete_tombstones_and_is_skipped() {
        let path = temp_path("delete");
        RmFileHandle::create(&path).unwrap();
        let mut rm = RmFileHandle::open(&path, DEFAULT_BUFFER_CAPACITY).unwrap();

        let r1 = rm.insert(b"keep").unwrap();
        let r2 = rm.insert(b"drop").unwrap();
        rm.delete(r2).unwrap();
        assert_eq!(rm.total_deleted, 1);

        let (rid, rec) = rm.get_first_record().unwrap().unwrap();
        assert_eq!(rid, r1);
        assert_eq!(rec.bytes(), b"keep");
        assert!(rm.get_next_record(rid).unwrap().is_none());

        assert!(matches!(rm.delete(r2), Err(PfError::PageFree)));

        rm.close().unwrap();
        RmFileHandle::destroy(&path).unwrap();
    }

    #[test]
    fn compute_file_stats_counts_live_and_deleted() {
        let path = temp_path("stats");
        RmFileHandle::create(&path).unwrap();
        let mut rm = RmFileHandle::open(&path, DEFAULT_BUFFER_CAPACITY).unwrap();

        rm.insert(b"one").unwrap();
        let r2 = rm.insert(b"two").unwrap();
        rm.delete(r2).unwrap();

        let stats = rm.compute_file_stats().unwrap();
        assert_eq!(stats.num_slots, 2);
        assert_eq!(stats.num_deleted, 1);
        assert_eq!(stats.payload_bytes, 3);

        rm.close().unwrap();
        RmFileHandle::destroy(&path).unwrap();
    }
}
