//! B+ tree access method: shared page format and comparator, plus the two
//! index builders (incremental and bulk load) under [`builder`].

pub mod builder;
pub mod compare;
pub mod file;
pub mod page;
pub mod stats;

pub use compare::AttrType;
pub use file::{create_index, index_file_name, AmFileHandle};
pub use stats::Stats;
