//! End-to-end scenarios over the public `am`/`rm` surface.

use std::path::{Path, PathBuf};

use toydb::am::builder::{bulk_load_from_sorted_pairs, insert_entry};
use toydb::am::page::{read_page_type, InternalHeader, LeafHeader, PAGE_TYPE_INTERNAL, PAGE_TYPE_LEAF};
use toydb::am::{index_file_name, AmFileHandle};
use toydb::constants::DEFAULT_BUFFER_CAPACITY;
use toydb::rm::RmFileHandle;

fn temp_base(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("toydb_scenario_{}_{}", std::process::id(), name));
    p
}

fn cleanup(base: &Path, index_no: u32) {
    let _ = toydb::pf::PagedFile::destroy(index_file_name(base, index_no));
}

fn int_pairs(values: &[i32]) -> (Vec<Vec<u8>>, Vec<i32>) {
    let keys = values.iter().map(|v| v.to_le_bytes().to_vec()).collect();
    let recids: Vec<i32> = (0..values.len() as i32).collect();
    (keys, recids)
}

fn in_order_keys(am: &mut AmFileHandle) -> Vec<(i32, Vec<i32>)> {
    let mut page_num = descend_leftmost(am, 0);
    let mut out = Vec::new();
    loop {
        let pinned = am.pf().get_this_page(page_num).unwrap();
        let hdr = LeafHeader::read(&*pinned.bytes());
        for i in 0..hdr.num_keys as usize {
            let key = hdr.key_at(&pinned.bytes(), i);
            let k = i32::from_le_bytes(key.try_into().unwrap());
            let chain = hdr.chain_recids(&pinned.bytes(), i);
            out.push((k, chain));
        }
        let next = hdr.next_leaf_page;
        pinned.unpin(false).unwrap();
        if next < 0 {
            break;
        }
        page_num = next;
    }
    out
}

fn descend_leftmost(am: &mut AmFileHandle, mut page_num: i32) -> i32 {
    loop {
        let pinned = am.pf().get_this_page(page_num).unwrap();
        let page_type = read_page_type(&*pinned.bytes());
        if page_type == PAGE_TYPE_LEAF {
            pinned.unpin(false).unwrap();
            return page_num;
        }
        let hdr = InternalHeader::read(&*pinned.bytes());
        let child = hdr.child_at(&*pinned.bytes(), 0);
        pinned.unpin(false).unwrap();
        page_num = child;
    }
}

#[test]
fn s1_single_leaf_index() {
    let base = temp_base("s1");
    cleanup(&base, 1);
    let (keys, recids) = int_pairs(&[10, 20, 30, 40]);
    bulk_load_from_sorted_pairs(&base, 1, 'i', 4, &keys, &recids).unwrap();

    let mut am = AmFileHandle::open(&base, 1, 'i', 4).unwrap();
    let pinned = am.pf().get_this_page(0).unwrap();
    assert_eq!(read_page_type(&*pinned.bytes()), PAGE_TYPE_LEAF);
    let hdr = LeafHeader::read(&*pinned.bytes());
    assert_eq!(hdr.num_keys, 4);
    assert_eq!(hdr.next_leaf_page, -1);
    for (i, expected) in [10, 20, 30, 40].iter().enumerate() {
        let k = hdr.key_at(&pinned.bytes(), i);
        assert_eq!(i32::from_le_bytes(k.try_into().unwrap()), *expected);
        assert_eq!(hdr.chain_recids(&pinned.bytes(), i).len(), 1);
    }
    pinned.unpin(false).unwrap();
    am.close().unwrap();
}

#[test]
fn s2_two_level_tree_has_root_at_page_zero() {
    let base = temp_base("s2");
    cleanup(&base, 1);
    let values: Vec<i32> = (1..=500).collect();
    let (keys, recids) = int_pairs(&values);
    bulk_load_from_sorted_pairs(&base, 1, 'i', 4, &keys, &recids).unwrap();

    let mut am = AmFileHandle::open(&base, 1, 'i', 4).unwrap();
    let pinned = am.pf().get_this_page(0).unwrap();
    assert_eq!(read_page_type(&*pinned.bytes()), PAGE_TYPE_INTERNAL);
    pinned.unpin(false).unwrap();

    let seq = in_order_keys(&mut am);
    let got: Vec<i32> = seq.iter().map(|(k, _)| *k).collect();
    assert_eq!(got, values);
    am.close().unwrap();
}

#[test]
fn s3_duplicates_all_recids_survive() {
    let base = temp_base("s3");
    cleanup(&base, 1);
    let keys = vec![
        5i32.to_le_bytes().to_vec(),
        5i32.to_le_bytes().to_vec(),
        5i32.to_le_bytes().to_vec(),
        7i32.to_le_bytes().to_vec(),
    ];
    let recids = vec![0, 1, 2, 3];
    bulk_load_from_sorted_pairs(&base, 1, 'i', 4, &keys, &recids).unwrap();

    let mut am = AmFileHandle::open(&base, 1, 'i', 4).unwrap();
    let seq = in_order_keys(&mut am);
    let mut all_recids: Vec<i32> = seq.iter().flat_map(|(_, c)| c.iter().copied()).collect();
    all_recids.sort();
    assert_eq!(all_recids, vec![0, 1, 2, 3]);
    am.close().unwrap();
}

#[test]
fn s4_slotted_insert_and_delete_stats() {
    let base = temp_base("s4_rm");
    let _ = RmFileHandle::destroy(&base);
    RmFileHandle::create(&base).unwrap();
    let mut rm = RmFileHandle::open(&base, DEFAULT_BUFFER_CAPACITY).unwrap();

    let r1 = rm.insert(&vec![0u8; 100]).unwrap();
    let r2 = rm.insert(&vec![0u8; 200]).unwrap();
    let _r3 = rm.insert(&vec![0u8; 300]).unwrap();
    rm.delete(r2).unwrap();

    let stats = rm.compute_file_stats().unwrap();
    assert_eq!(stats.payload_bytes, 400);
    assert_eq!(stats.num_deleted, 1);
    assert_eq!(stats.num_slots, 3);

    assert!(rm.get_first_record().unwrap().is_some());
    let _ = r1;
    rm.close().unwrap();
    let _ = RmFileHandle::destroy(&base);
}

#[test]
fn s5_incremental_and_bulk_agree_on_key_order() {
    let values: Vec<i32> = vec![8, 3, 1, 9, 3, 5, 2];
    let mut sorted = values.clone();
    sorted.sort();

    let bulk_base = temp_base("s5_bulk");
    cleanup(&bulk_base, 1);
    let (keys, recids) = int_pairs(&sorted);
    bulk_load_from_sorted_pairs(&bulk_base, 1, 'i', 4, &keys, &recids).unwrap();
    let mut bulk_am = AmFileHandle::open(&bulk_base, 1, 'i', 4).unwrap();
    let bulk_seq: Vec<i32> = in_order_keys(&mut bulk_am).into_iter().map(|(k, _)| k).collect();
    bulk_am.close().unwrap();

    let inc_base = temp_base("s5_inc");
    toydb::am::create_index(&inc_base, 1, 'i', 4).unwrap();
    let mut inc_am = AmFileHandle::open(&inc_base, 1, 'i', 4).unwrap();
    for v in &values {
        insert_entry(&mut inc_am, &v.to_le_bytes(), *v).unwrap();
    }
    let inc_seq: Vec<i32> = in_order_keys(&mut inc_am).into_iter().map(|(k, _)| k).collect();
    inc_am.close().unwrap();

    assert_eq!(bulk_seq, inc_seq);
    cleanup(&inc_base, 1);
}

#[test]
fn s6_text_parse_skips_malformed_lines() {
    let dir = std::env::temp_dir();
    let data_path = dir.join(format!("toydb_s6_{}.txt", std::process::id()));
    std::fs::write(&data_path, "alice;42;cs;2024\n;;x\nonlyname\nbob;7;math;2023\n").unwrap();

    let index_base = temp_base("s6");
    toydb::am::builder::build_index_incremental_from_text(&data_path, 'i', 4, &index_base, 1).unwrap();

    let mut am = AmFileHandle::open(&index_base, 1, 'i', 4).unwrap();
    let seq: Vec<i32> = in_order_keys(&mut am).into_iter().map(|(k, _)| k).collect();
    assert_eq!(seq, vec![7, 42]);
    am.close().unwrap();

    let _ = std::fs::remove_file(&data_path);
    cleanup(&index_base, 1);
}
