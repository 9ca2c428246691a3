//! Index Builder: two entry points over the same on-disk format.

pub mod bulk;
pub mod from_rm;
pub mod incremental;
pub mod insert;

pub use bulk::bulk_load_from_sorted_pairs;
pub use from_rm::{build_index_from_existing_file_bulk, build_index_from_existing_file_sorted_insert};
pub use incremental::{build_index_incremental_from_rm, build_index_incremental_from_text};
pub use insert::insert_entry;
