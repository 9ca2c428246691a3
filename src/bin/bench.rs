//! Benchmark harness: builds the same text data set into three index files
//! via incremental insert, sorted insert, and bulk load, and prints a
//! CSV-ish comparison table. Mirrors `ambench.c`'s three-method structure.

use std::path::Path;
use std::process;

use toydb::am::builder::{
    build_index_from_existing_file_bulk, build_index_from_existing_file_sorted_insert,
    build_index_incremental_from_text,
};
use toydb::am::Stats;
use toydb::constants::DEFAULT_BUFFER_CAPACITY;
use toydb::rm::RmFileHandle;

const ATTR_TYPE: char = 'i';
const ATTR_LENGTH: usize = 4;

fn main() {
    toydb::init_log();

    let data_file = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: bench <data-file>");
            process::exit(2);
        }
    };

    if let Err(e) = run(&data_file) {
        eprintln!("bench failed: {}", e);
        process::exit(1);
    }
}

fn run(data_file: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("PF/AM Benchmark: data={}", data_file);
    let index_base = "bench_index";

    let mut rows = Vec::new();

    println!("\n=== Method: Incremental Insert ===");
    let incremental = build_index_incremental_from_text(
        data_file,
        ATTR_TYPE,
        ATTR_LENGTH,
        index_base,
        1,
    )?;
    rows.push(("Incremental", incremental));

    let rm_path = load_into_rm(data_file)?;
    let mut rm = RmFileHandle::open(&rm_path, DEFAULT_BUFFER_CAPACITY)?;

    println!("=== Method: Sorted Insert ===");
    let sorted_insert =
        build_index_from_existing_file_sorted_insert(&mut rm, ATTR_TYPE, ATTR_LENGTH, index_base, 2)?;
    rows.push(("SortedInsert", sorted_insert));

    println!("=== Method: Bulk Load ===");
    let bulk = build_index_from_existing_file_bulk(&mut rm, ATTR_TYPE, ATTR_LENGTH, index_base, 3)?;
    rows.push(("BulkLoad", bulk));

    rm.close()?;
    let _ = RmFileHandle::destroy(&rm_path);

    println!();
    println!("Method,Time_ms,LogicalReads,LogicalWrites,PhysicalReads,PhysicalWrites");
    for (name, stats) in &rows {
        print_row(name, stats);
    }

    Ok(())
}

/// Loads every `;`-separated line's second field into a fresh RM file, so
/// the sorted-insert and bulk-load methods have the same source the
/// incremental method scanned directly, per the original harness.
fn load_into_rm(data_file: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let rm_path = format!("{}.rm", data_file);
    if Path::new(&rm_path).exists() {
        RmFileHandle::destroy(&rm_path)?;
    }
    RmFileHandle::create(&rm_path)?;
    let mut rm = RmFileHandle::open(&rm_path, DEFAULT_BUFFER_CAPACITY)?;

    let file = File::open(data_file)?;
    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = line?;
        if line.split(';').nth(1).map_or(true, |f| f.is_empty()) {
            continue;
        }
        rm.insert(line.as_bytes())?;
    }
    rm.close()?;
    Ok(rm_path)
}

fn print_row(name: &str, stats: &Stats) {
    println!(
        "{},{:.2},{},{},{},{}",
        name,
        stats.time_ms,
        stats.logical_reads,
        stats.logical_writes,
        stats.physical_reads,
        stats.physical_writes
    );
}
