//! A teaching-grade paged storage engine: a slotted-page record manager and
//! a B+ tree access method with both incremental and bulk-load index
//! construction, built on a pinning buffer pool with pluggable replacement.

pub mod am;
pub mod constants;
pub mod error;
pub mod io;
pub mod log;
pub mod pf;
pub mod rm;

pub use error::{AmError, PfError};
pub use log::init_log;
