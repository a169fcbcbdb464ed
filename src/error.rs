//! Crate-wide error type.
//!
//! The store's mutation API is total on well-formed input (spec.md §7):
//! `modify`/`delete`/`copy` against an absent path are no-ops, not errors.
//! `Error` only covers the two genuinely exceptional conditions the core
//! recognizes, plus I/O failures from the optional persistence layer.

use thiserror::Error;

/// Errors surfaced by the store and its persistence layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing arena could not grow to satisfy an allocation. Fatal:
    /// there is no recovery path, matching spec.md §7's "allocator failure
    /// is fatal".
    #[error("arena exhausted: failed to grow to {requested} elements")]
    ArenaExhausted {
        /// Requested capacity, in elements, at the point of failure.
        requested: usize,
    },

    /// A path exceeded the configured maximum depth (spec.md §3: "Maximum
    /// depth is a fixed bound"). Rejected at the API boundary before it
    /// reaches any write path.
    #[error("path depth {depth} exceeds maximum of {max}")]
    PathTooDeep {
        /// Depth of the offending path.
        depth: usize,
        /// Configured maximum depth.
        max: usize,
    },

    /// A checkpoint/recovery I/O failure from the persistence layer.
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record was truncated or had an unexpected length.
    #[error("corrupt record in {what}: expected a multiple of {record_size} bytes, got {len}")]
    CorruptRecord {
        /// Which arena/file the corrupt record was read from.
        what: &'static str,
        /// Fixed record size in bytes.
        record_size: usize,
        /// Actual byte length read.
        len: usize,
    },

    /// A symlink node's blob was shorter than Subversion's 5-byte `"link "`
    /// prefix, so it cannot be a well-formed symlink target.
    #[error("symlink blob of {len} bytes is shorter than the 5-byte \"link \" prefix")]
    SymlinkBlobTooShort {
        /// The blob's reported total length.
        len: u64,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
