//! Bottom-up bulk loader: Phase A (file setup), Phase B (leaf
//! construction), Phase C (internal-level packing), Phase D (root
//! installation). The only consumer of the input ordering precondition —
//! every other builder goes through [`super::insert::insert_entry`] instead.

use std::cmp::Ordering;
use std::path::Path;
use std::time::Instant;

use crate::am::compare::{compare, validate_attr_length, AttrType};
use crate::am::file::index_file_name;
use crate::am::page::{InternalHeader, LeafHeader};
use crate::am::stats::Stats;
use crate::constants::{DEFAULT_BUFFER_CAPACITY, PAGE_SIZE};
use crate::error::AmError;
use crate::pf::{PageNum, PagedFile, ReplacementPolicy};

/// `keys`/`recids` must already be sorted non-decreasing under [`compare`]
/// and have equal length — the caller's responsibility, per spec.
pub fn bulk_load_from_sorted_pairs<P: AsRef<Path>>(
    base: P,
    index_no: u32,
    attr_type: char,
    attr_length: usize,
    keys: &[Vec<u8>],
    recids: &[i32],
) -> Result<Stats, AmError> {
    let attr_type_enum = AttrType::from_char(attr_type)?;
    validate_attr_length(attr_length)?;
    assert_eq!(keys.len(), recids.len(), "keys and recids must be parallel");

    let path = index_file_name(base, index_no);
    PagedFile::create(&path)?;
    let mut pf = PagedFile::open(&path, DEFAULT_BUFFER_CAPACITY, ReplacementPolicy::Lru)?;
    let start = Instant::now();

    let build = (|| -> Result<(), AmError> {
        // Phase A.
        let page0 = pf.alloc_page()?;
        LeafHeader::empty(attr_length as i32).write(&mut *page0.bytes_mut());
        page0.unpin(true)?;

        // Phase B.
        let (child_pages, child_first_keys) =
            build_leaves(&mut pf, keys, recids, attr_type_enum, attr_length)?;

        // Phase C.
        let root_page = build_internal_levels(&mut pf, child_pages, child_first_keys, attr_length)?;

        // Phase D.
        install_root(&mut pf, root_page)?;
        Ok(())
    })();

    match build {
        Ok(()) => {
            let elapsed = start.elapsed();
            let pf_stats = pf.stats();
            pf.close()?;
            Ok(Stats::capture(pf_stats, elapsed))
        }
        Err(e) => {
            let _ = pf.close();
            Err(e)
        }
    }
}

/// Phase B: allocate leaves left to right, never consuming an input key
/// that didn't fit — instead close the current leaf, link it to a fresh
/// one, and reprocess. Returns each leaf's page number alongside the first
/// key it holds, the sidecar arrays Phase C packs bottom-up.
fn build_leaves(
    pf: &mut PagedFile,
    keys: &[Vec<u8>],
    recids: &[i32],
    attr_type: AttrType,
    attr_length: usize,
) -> Result<(Vec<PageNum>, Vec<Vec<u8>>), AmError> {
    let first_leaf = pf.alloc_page()?;
    let mut current_num = first_leaf.page_num();
    LeafHeader::empty(attr_length as i32).write(&mut *first_leaf.bytes_mut());
    first_leaf.unpin(true)?;

    let mut child_pages = vec![current_num];
    let mut child_first_keys = Vec::new();
    let mut first_key_pending = true;

    if keys.is_empty() {
        child_first_keys.push(Vec::new());
        return Ok((child_pages, child_first_keys));
    }

    let mut i = 0;
    while i < keys.len() {
        let key = &keys[i];
        let recid = recids[i];

        let pinned = pf.get_this_page(current_num)?;
        let mut hdr = LeafHeader::read(&*pinned.bytes());

        let dup_idx = if hdr.num_keys > 0 {
            let last_key = hdr.key_at(&pinned.bytes(), hdr.num_keys as usize - 1);
            if compare(key, attr_type, attr_length, &last_key) == Ordering::Equal {
                Some(hdr.num_keys as usize - 1)
            } else {
                None
            }
        } else {
            None
        };

        let fits = match dup_idx {
            Some(_) => hdr.fits_chain_node(),
            None => hdr.fits_new_key(),
        };

        if fits {
            if first_key_pending {
                child_first_keys.push(key.clone());
                first_key_pending = false;
            }
            {
                let mut bytes = pinned.bytes_mut();
                match dup_idx {
                    Some(idx) => hdr.prepend_to_chain(&mut bytes, idx, recid),
                    None => hdr.push_key(&mut bytes, key, recid),
                }
                hdr.write(&mut bytes);
            }
            pinned.unpin(true)?;
            i += 1;
        } else {
            pinned.unpin(false)?;

            let new_leaf = pf.alloc_page()?;
            let new_num = new_leaf.page_num();
            LeafHeader::empty(attr_length as i32).write(&mut *new_leaf.bytes_mut());
            new_leaf.unpin(true)?;

            let prev = pf.get_this_page(current_num)?;
            let mut prev_hdr = LeafHeader::read(&*prev.bytes());
            prev_hdr.next_leaf_page = new_num;
            prev_hdr.write(&mut *prev.bytes_mut());
            prev.unpin(true)?;

            current_num = new_num;
            child_pages.push(current_num);
            first_key_pending = true;
            // kᵢ is reprocessed next iteration against the new leaf.
        }
    }

    Ok((child_pages, child_first_keys))
}

/// Phase C: pack children into parent levels bottom-up until one page
/// remains. `level_keys[i]` is always "the first key of `level_pages[i]`'s
/// subtree" — including index 0, which is carried through but never used
/// as an actual separator (nothing routes to the left of the whole tree).
/// Each freshly packed internal page contributes `level_keys[group_start]`
/// — its own leftmost child's first key — to the next level, fixing the
/// source's bug of always reading index 0 regardless of which group was
/// being packed.
fn build_internal_levels(
    pf: &mut PagedFile,
    mut level_pages: Vec<PageNum>,
    mut level_keys: Vec<Vec<u8>>,
    attr_length: usize,
) -> Result<PageNum, AmError> {
    while level_pages.len() > 1 {
        let mut next_pages = Vec::new();
        let mut next_keys = Vec::new();

        let mut idx = 0;
        while idx < level_pages.len() {
            let group_start = idx;
            let page = pf.alloc_page()?;
            let page_num = page.page_num();
            let mut hdr = InternalHeader::empty(attr_length as i32);
            {
                let mut bytes = page.bytes_mut();
                hdr.set_child_at(&mut bytes, 0, level_pages[group_start]);
            }
            idx += 1;

            while idx < level_pages.len()
                && InternalHeader::bytes_used(hdr.num_keys + 1, attr_length as i32) <= PAGE_SIZE
            {
                {
                    let mut bytes = page.bytes_mut();
                    hdr.push_child(&mut bytes, &level_keys[idx], level_pages[idx]);
                }
                idx += 1;
            }

            {
                let mut bytes = page.bytes_mut();
                hdr.write(&mut bytes);
            }
            page.unpin(true)?;

            next_pages.push(page_num);
            next_keys.push(level_keys[group_start].clone());
        }

        level_pages = next_pages;
        level_keys = next_keys;
    }

    Ok(level_pages[0])
}

/// Phase D: whole-page copy of the logical root into the reserved page 0.
fn install_root(pf: &mut PagedFile, root_page: PageNum) -> Result<(), AmError> {
    if root_page == 0 {
        return Ok(());
    }
    let root = pf.get_this_page(root_page)?;
    let page0 = pf.get_this_page(0)?;
    {
        let src = *root.bytes();
        *page0.bytes_mut() = src;
    }
    page0.unpin(true)?;
    root.unpin(false)?;
    Ok(())
}
