//! Little-endian fixed-width (de)serialization for on-page fields.
//!
//! Mirrors the teacher codebase's `Encodeable`/`Decodeable` pattern: every
//! multi-byte field that lands on a page goes through `encode`/`decode_from`
//! rather than ad hoc slicing, so the byte layout stays exact and visible in
//! one place.

use std::convert::TryInto;
use std::mem::size_of;

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from(bytes: &[u8]) -> Self;
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from(bytes: &[u8]) -> Self {
                    Self::from_le_bytes(bytes[..size_of::<Self>()].try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Write `value.encode()` into `buf` at `offset`.
pub fn put<T: Encodeable>(buf: &mut [u8], offset: usize, value: &T) {
    let bytes = value.encode();
    buf[offset..offset + bytes.len()].copy_from_slice(&bytes);
}

/// Read a `T` out of `buf` at `offset`.
pub fn get<T: Decodeable>(buf: &[u8], offset: usize) -> T {
    T::decode_from(&buf[offset..])
}
