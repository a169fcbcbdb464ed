//! Tunables for a [`crate::store::Store`].

use std::path::PathBuf;

/// Maximum path depth the store accepts (spec.md §3: "Maximum depth is a
/// fixed bound (reference: 1000)"). Also bounds the diff engine's
/// [`crate::path::PathStack`].
pub const MAX_PATH_DEPTH: usize = 1000;

/// Initial element capacity new arenas are created with, before the
/// doubling growth described in spec.md §4.1 kicks in.
pub const DEFAULT_ARENA_CAPACITY: usize = 4096;

/// Construction-time configuration for a [`crate::store::Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Initial capacity, in elements, for every arena the store owns.
    pub initial_capacity: usize,

    /// Maximum accepted path depth; paths deeper than this are rejected
    /// with [`crate::error::Error::PathTooDeep`] at the API boundary.
    pub max_path_depth: usize,

    /// Directory holding this store's checkpoint files, one
    /// `<prefix>.bin` per arena (spec.md §6). `None` disables persistence:
    /// the store lives entirely in memory and `reset()` is the only way to
    /// reclaim it.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            initial_capacity: DEFAULT_ARENA_CAPACITY,
            max_path_depth: MAX_PATH_DEPTH,
            checkpoint_dir: None,
        }
    }
}

impl StoreConfig {
    /// Configuration with persistence enabled at `dir`.
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }
}
