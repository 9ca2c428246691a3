/// Fixed page size for the paged file, in bytes. Matches `PF_PAGE_SIZE` in
/// the original C sources. Compile-time constant, not a per-file parameter.
pub const PAGE_SIZE: usize = 4096;

/// Size in bytes of the on-page slot descriptor used by the record manager.
pub const RM_SLOT_SIZE: usize = std::mem::size_of::<i16>() * 2;

/// Default buffer pool capacity for record-manager and index files, matching
/// the `PF_Init(50)` call in the original benchmark harness.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50;
