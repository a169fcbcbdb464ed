//! An in-memory, versioned directory store that turns a stream of
//! Subversion revisions into the directory-tree changes between
//! consecutive revisions, expressed as `git fast-import` commands.
//!
//! The store is built from four layers, bottom to top:
//!
//! - [`arena`]: an offset-addressed, watermark-gated bump allocator —
//!   every other structure in the crate is a tree of offsets into one of
//!   these.
//! - [`treap`]: a generic, comparator-parameterized persistent treap built
//!   on top of an arena, used both for directory contents ([`tree`]) and
//!   for the string interner's lookup index ([`interner`]).
//! - [`interner`] and [`tree`]: the directory model itself — interned path
//!   components and a copy-on-write forest of directories.
//! - [`commit`] and [`diff`]: revision bookkeeping and the two-cursor diff
//!   that turns two tree snapshots into an edit script, which [`store`]
//!   exposes behind a single embeddable façade and [`stdout_emitter`]
//!   renders as fast-import text.
//!
//! [`dumpreader`] is the thin Subversion dump-format front end the `svnfi`
//! binary drives; [`blob`] is the byte-relay contract blob content flows
//! through on its way from the dump stream to stdout.

pub mod arena;
pub mod blob;
pub mod commit;
pub mod config;
pub mod diff;
pub mod dumpreader;
pub mod entry;
pub mod error;
pub mod interner;
pub mod path;
pub mod record;
pub mod stdout_emitter;
pub mod store;
pub mod treap;
pub mod tree;

pub use crate::error::{Error, Result};
pub use crate::store::Store;
