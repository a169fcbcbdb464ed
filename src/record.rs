//! Fixed-size binary encoding for types persisted through
//! [`crate::arena::Arena::checkpoint`]/[`crate::arena::Arena::recover`].
//!
//! Every persisted type here is a small, `Copy` struct of `u32`/`u8`
//! fields — the Rust equivalent of the flat C structs `obj_pool_gen`
//! writes verbatim with `fwrite`. Encoding is hand-written rather than
//! pulled from a serialization crate: the format is internal-only, never
//! read by another tool, and fixed-size records make a framework
//! unnecessary (see DESIGN.md's note on dropping `cbordata`).

use crate::entry::{Entry, FileMode};
use crate::interner::{Span, StringId};
use crate::treap::TreapNode;

/// A type with a fixed-size, endian-stable binary representation.
pub trait Record: Sized {
    /// Encoded size in bytes; every record of this type is exactly this
    /// long, which is what makes the checkpoint file a flat array.
    const SIZE: usize;

    /// Encode `self` into `out`, which is exactly `Self::SIZE` bytes long.
    fn to_bytes(&self, out: &mut [u8]);

    /// Decode a record from exactly `Self::SIZE` bytes.
    fn from_bytes(bytes: &[u8]) -> Self;
}

impl Record for u8 {
    const SIZE: usize = 1;

    fn to_bytes(&self, out: &mut [u8]) {
        out[0] = *self;
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Record for TreapNode<StringId, Entry> {
    const SIZE: usize = 4 + 4 + 1 + 4 + 4 + 4 + 4;

    fn to_bytes(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.key.0.to_le_bytes());
        out[4..8].copy_from_slice(&self.value.name.0.to_le_bytes());
        out[8] = self.value.mode.to_posix_tag();
        out[9..13].copy_from_slice(&self.value.content.to_le_bytes());
        out[13..17].copy_from_slice(&self.priority.to_le_bytes());
        out[17..21].copy_from_slice(&self.left.to_le_bytes());
        out[21..25].copy_from_slice(&self.right.to_le_bytes());
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let key = StringId(u32::from_le_bytes(bytes[0..4].try_into().unwrap()));
        let name = StringId(u32::from_le_bytes(bytes[4..8].try_into().unwrap()));
        let mode = FileMode::from_posix_tag(bytes[8]);
        let content = u32::from_le_bytes(bytes[9..13].try_into().unwrap());
        let priority = u32::from_le_bytes(bytes[13..17].try_into().unwrap());
        let left = u32::from_le_bytes(bytes[17..21].try_into().unwrap());
        let right = u32::from_le_bytes(bytes[21..25].try_into().unwrap());
        TreapNode {
            key,
            value: Entry {
                name,
                mode,
                content,
            },
            priority,
            left,
            right,
        }
    }
}

impl Record for u32 {
    const SIZE: usize = 4;

    fn to_bytes(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.to_le_bytes());
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        u32::from_le_bytes(bytes[0..4].try_into().unwrap())
    }
}

impl Record for Span {
    const SIZE: usize = 4 + 4;

    fn to_bytes(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..8].copy_from_slice(&self.len.to_le_bytes());
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Span {
            offset: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            len: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        }
    }
}

impl Record for TreapNode<StringId, ()> {
    const SIZE: usize = 4 + 4 + 4 + 4;

    fn to_bytes(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.key.0.to_le_bytes());
        out[4..8].copy_from_slice(&self.priority.to_le_bytes());
        out[8..12].copy_from_slice(&self.left.to_le_bytes());
        out[12..16].copy_from_slice(&self.right.to_le_bytes());
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let key = StringId(u32::from_le_bytes(bytes[0..4].try_into().unwrap()));
        let priority = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let left = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let right = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        TreapNode {
            key,
            value: (),
            priority,
            left,
            right,
        }
    }
}
