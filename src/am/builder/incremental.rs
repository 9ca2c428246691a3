//! Incremental builder: scan a data source, call [`insert_entry`] per
//! parsed pair. Insertion failures are logged and do not abort the scan —
//! a deliberate load-robustness choice, per spec.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use log::warn;

use super::insert::insert_entry;
use crate::am::compare::{validate_attr_length, AttrType};
use crate::am::file::{create_index, AmFileHandle};
use crate::am::stats::Stats;
use crate::error::AmError;
use crate::rm::RmFileHandle;

/// Text source: `;`-separated lines, key = field index 1 (the second
/// field), empty second field skipped silently, recid = a counter over
/// processed (non-skipped) lines starting at 0.
pub fn build_index_incremental_from_text<P: AsRef<Path>, Q: AsRef<Path>>(
    text_path: P,
    attr_type: char,
    attr_length: usize,
    index_base: Q,
    index_no: u32,
) -> Result<Stats, AmError> {
    let attr_type_enum = AttrType::from_char(attr_type)?;
    validate_attr_length(attr_length)?;

    create_index(&index_base, index_no, attr_type, attr_length)?;
    let mut am = AmFileHandle::open(&index_base, index_no, attr_type, attr_length)?;
    am.pf().reset_stats();

    let start = Instant::now();

    let file = File::open(text_path).map_err(crate::error::PfError::from)?;
    let reader = BufReader::new(file);
    let mut recid: i32 = 0;

    for line in reader.lines() {
        let line = line.map_err(crate::error::PfError::from)?;
        let field1 = match line.split(';').nth(1) {
            Some(f) if !f.is_empty() => f,
            _ => continue,
        };
        let key = match encode_text_key(field1, attr_type_enum, attr_length) {
            Some(k) => k,
            None => continue,
        };

        if let Err(e) = insert_entry(&mut am, &key, recid) {
            warn!("incremental insert failed for recid {}: {}", recid, e);
        }
        recid += 1;
    }

    let elapsed = start.elapsed();
    let pf_stats = am.pf().stats();
    am.close()?;
    Ok(Stats::capture(pf_stats, elapsed))
}

/// RM source: scan `GetFirstRecord`/`GetNextRecord`, key = the first
/// `attrLength` bytes of each record's payload, recid = the packed RID.
pub fn build_index_incremental_from_rm<P: AsRef<Path>>(
    rm: &mut RmFileHandle,
    attr_type: char,
    attr_length: usize,
    index_base: P,
    index_no: u32,
) -> Result<Stats, AmError> {
    AttrType::from_char(attr_type)?;
    validate_attr_length(attr_length)?;

    create_index(&index_base, index_no, attr_type, attr_length)?;
    let mut am = AmFileHandle::open(&index_base, index_no, attr_type, attr_length)?;
    am.pf().reset_stats();

    let start = Instant::now();

    let mut current = rm.get_first_record()?;
    while let Some((rid, record)) = current {
        let data = record.bytes();
        if data.len() >= attr_length {
            let key = data[..attr_length].to_vec();
            let recid = rid.to_packed();
            if let Err(e) = insert_entry(&mut am, &key, recid) {
                warn!("incremental insert failed for rid {:?}: {}", rid, e);
            }
        }
        current = rm.get_next_record(rid)?;
    }

    let elapsed = start.elapsed();
    let pf_stats = am.pf().stats();
    am.close()?;
    Ok(Stats::capture(pf_stats, elapsed))
}

fn encode_text_key(field: &str, attr_type: AttrType, attr_length: usize) -> Option<Vec<u8>> {
    match attr_type {
        AttrType::Int => {
            let value: i64 = field.trim().parse().ok()?;
            match attr_length {
                1 => Some((value as i8).to_le_bytes().to_vec()),
                2 => Some((value as i16).to_le_bytes().to_vec()),
                4 => Some((value as i32).to_le_bytes().to_vec()),
                8 => Some(value.to_le_bytes().to_vec()),
                _ => None,
            }
        }
        AttrType::Float => {
            let value: f64 = field.trim().parse().ok()?;
            match attr_length {
                4 => Some((value as f32).to_le_bytes().to_vec()),
                8 => Some(value.to_le_bytes().to_vec()),
                _ => None,
            }
        }
        AttrType::Char => {
            let mut bytes = field.as_bytes().to_vec();
            bytes.resize(attr_length, 0);
            Some(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_int_field() {
        let key = encode_text_key("42", AttrType::Int, 4).unwrap();
        assert_eq!(key, 42i32.to_le_bytes());
    }

    #[test]
    fn rejects_unparseable_int() {
        assert!(encode_text_key("cs", AttrType::Int, 4).is_none());
    }

    #[test]
    fn pads_and_truncates_char_field() {
        let key = encode_text_key("ab", AttrType::Char, 4).unwrap();
        assert_eq!(key, vec![b'a', b'b', 0, 0]);
        let key = encode_text_key("abcdef", AttrType::Char, 4).unwrap();
        assert_eq!(key, vec![b'a', b'b', b'c', b'd']);
    }
}
