//! Slotted-page byte layout, shared by every `RmFileHandle` operation.
//!
//! ```text
//! | freeStart: i32 | freeEnd: i32 | numSlots: i32 |   <- header (12 bytes)
//! | live payload, growing upward from freeStart    |
//! |                 ... hole ...                   |
//! | slot descriptors, growing downward from the end |
//! ```
//!
//! Slot `i` lives at `PAGE_SIZE - (i+1) * RM_SLOT_SIZE`. A slot's `offset`
//! field is `-1` for a tombstone; its bytes are never reclaimed and its
//! slot descriptor is never compacted (see spec invariant 1).

use crate::constants::{PAGE_SIZE, RM_SLOT_SIZE};
use crate::io::{get, put};

pub const HEADER_SIZE: usize = 12;

pub struct PageHeader {
    pub free_start: i32,
    pub free_end: i32,
    pub num_slots: i32,
}

impl PageHeader {
    pub fn read(bytes: &[u8]) -> Self {
        Self {
            free_start: get(bytes, 0),
            free_end: get(bytes, 4),
            num_slots: get(bytes, 8),
        }
    }

    pub fn write(&self, bytes: &mut [u8]) {
        put(bytes, 0, &self.free_start);
        put(bytes, 4, &self.free_end);
        put(bytes, 8, &self.num_slots);
    }

    pub fn init(bytes: &mut [u8]) {
        PageHeader {
            free_start: HEADER_SIZE as i32,
            free_end: PAGE_SIZE as i32,
            num_slots: 0,
        }
        .write(bytes);
    }

    pub fn free_space(&self) -> i32 {
        self.free_end - self.free_start
    }
}

#[derive(Clone, Copy)]
pub struct Slot {
    pub offset: i16,
    pub length: i16,
}

impl Slot {
    pub const TOMBSTONE: i16 = -1;

    pub fn is_tombstone(&self) -> bool {
        self.offset == Self::TOMBSTONE
    }

    fn position(slot_no: usize) -> usize {
        PAGE_SIZE - (slot_no + 1) * RM_SLOT_SIZE
    }

    pub fn read(bytes: &[u8], slot_no: usize) -> Self {
        let pos = Self::position(slot_no);
        Self {
            offset: get(bytes, pos),
            length: get(bytes, pos + 2),
        }
    }

    pub fn write(&self, bytes: &mut [u8], slot_no: usize) {
        let pos = Self::position(slot_no);
        put(bytes, pos, &self.offset);
        put(bytes, pos + 2, &self.length);
    }
}
