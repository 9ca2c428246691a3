//! RM-backed sorted build: scan a record file into `(key, recid)` arrays,
//! sort an index permutation via a comparator closure (no global comparator
//! state — see design notes), then either bulk-load or repeatedly
//! `insert_entry` in sorted order. The latter is the "sorted insert" method
//! benchmarked against incremental and bulk-load builds.

use std::path::Path;

use super::bulk::bulk_load_from_sorted_pairs;
use super::insert::insert_entry;
use crate::am::compare::{compare, validate_attr_length, AttrType};
use crate::am::file::{create_index, AmFileHandle};
use crate::am::stats::Stats;
use crate::error::AmError;
use crate::rm::RmFileHandle;

/// Scan `rm` fully, returning parallel `keys`/`recids` vectors. `Vec::push`
/// already grows geometrically, so no hand-rolled capacity doubling is
/// needed the way the original's `malloc`/`realloc` dance required.
fn scan_into_pairs(
    rm: &mut RmFileHandle,
    attr_length: usize,
) -> Result<(Vec<Vec<u8>>, Vec<i32>), AmError> {
    let mut keys = Vec::new();
    let mut recids = Vec::new();

    let mut current = rm.get_first_record()?;
    while let Some((rid, record)) = current {
        let data = record.bytes();
        if data.len() >= attr_length {
            keys.push(data[..attr_length].to_vec());
            recids.push(rid.to_packed());
        }
        current = rm.get_next_record(rid)?;
    }
    Ok((keys, recids))
}

/// Index permutation sorted by key, via a comparator closure over a
/// borrowed `keys` slice — no file-scope mutable comparator state.
fn sorted_order(keys: &[Vec<u8>], attr_type: AttrType, attr_length: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| compare(&keys[a], attr_type, attr_length, &keys[b]));
    order
}

/// Build via the bulk loader, after scanning and sorting `rm`'s contents.
pub fn build_index_from_existing_file_bulk<P: AsRef<Path>>(
    rm: &mut RmFileHandle,
    attr_type: char,
    attr_length: usize,
    index_base: P,
    index_no: u32,
) -> Result<Stats, AmError> {
    AttrType::from_char(attr_type)?;
    validate_attr_length(attr_length)?;

    let (keys, recids) = scan_into_pairs(rm, attr_length)?;
    let order = sorted_order(&keys, AttrType::from_char(attr_type)?, attr_length);
    let sorted_keys: Vec<Vec<u8>> = order.iter().map(|&i| keys[i].clone()).collect();
    let sorted_recids: Vec<i32> = order.iter().map(|&i| recids[i]).collect();

    bulk_load_from_sorted_pairs(
        index_base,
        index_no,
        attr_type,
        attr_length,
        &sorted_keys,
        &sorted_recids,
    )
}

/// Build via repeated `insert_entry` in sorted order — the "sorted insert"
/// method benchmarked alongside bulk load and plain incremental build.
pub fn build_index_from_existing_file_sorted_insert<P: AsRef<Path>>(
    rm: &mut RmFileHandle,
    attr_type: char,
    attr_length: usize,
    index_base: P,
    index_no: u32,
) -> Result<Stats, AmError> {
    let attr_type_enum = AttrType::from_char(attr_type)?;
    validate_attr_length(attr_length)?;

    let (keys, recids) = scan_into_pairs(rm, attr_length)?;
    let order = sorted_order(&keys, attr_type_enum, attr_length);

    create_index(&index_base, index_no, attr_type, attr_length)?;
    let mut am = AmFileHandle::open(&index_base, index_no, attr_type, attr_length)?;
    am.pf().reset_stats();

    let start = std::time::Instant::now();
    for &i in &order {
        insert_entry(&mut am, &keys[i], recids[i])?;
    }
    let elapsed = start.elapsed();

    let pf_stats = am.pf().stats();
    am.close()?;
    Ok(Stats::capture(pf_stats, elapsed))
}
