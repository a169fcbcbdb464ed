//! Revision lifecycle (spec.md §4.6).
//!
//! `CommitController` is the only thing in the crate that knows "which
//! root offset belongs to which revision number" — [`crate::tree::VersionedTree`]
//! itself is revision-agnostic, operating purely on whatever root offset
//! it's handed. This mirrors the split the teacher draws between an index
//! (`llrb::Index`) and the snapshot bookkeeping layered on top of it.

use tracing::{debug, trace};

use crate::arena::{Arena, NIL};
use crate::entry::FileMode;
use crate::error::Result;
use crate::interner::StringId;
use crate::tree::VersionedTree;

/// The five out-of-band fields a commit carries, beyond the diff itself
/// (spec.md §4.6's `commit(rev, author, log, uuid, url, ts)`).
#[derive(Debug, Clone)]
pub struct CommitMeta {
    pub author: String,
    pub log: String,
    pub uuid: Option<String>,
    pub url: Option<String>,
    /// Unix timestamp; kept as the wire type spec.md §6 names even though
    /// `chrono` is used internally wherever a calendar date is needed
    /// (it currently isn't — `ts` is forwarded to the emitter verbatim).
    pub timestamp: i64,
}

/// Lifecycle state of the active revision (spec.md §4.6's state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionState {
    /// No writes yet; root equals the previous revision's root.
    Fresh,
    /// Root has been cloned; at least one mutable object exists.
    Dirty,
}

/// Owns the revision list and the active (uncommitted) revision's root,
/// threading both through [`VersionedTree`]'s root-parameterized API.
#[derive(Debug)]
pub struct CommitController {
    /// `revisions[r]` is committed revision `r`'s root directory offset.
    /// Does not include the active revision. An `Arena<u32>` rather than a
    /// plain `Vec` so it checkpoints the same way every other arena in the
    /// store does (spec.md §6).
    revisions: Arena<u32>,
    active_root: u32,
    state: RevisionState,
    next_blob_mark: u32,
}

impl Default for CommitController {
    fn default() -> Self {
        CommitController {
            revisions: Arena::default(),
            active_root: NIL,
            state: RevisionState::Fresh,
            next_blob_mark: 1,
        }
    }
}

impl CommitController {
    /// `init()`: creates revision 0 if none exist (empty tree), recovers
    /// the max blob mark by scanning the entry arena, and opens an active
    /// revision above the latest committed one.
    pub fn init(tree: &VersionedTree) -> Self {
        let next_blob_mark = tree.max_blob_mark() + 1;
        debug!(next_blob_mark, "commit controller initialized");
        CommitController {
            revisions: Arena::default(),
            active_root: NIL,
            state: RevisionState::Fresh,
            next_blob_mark,
        }
    }

    /// Rebuild from a recovered revision arena, resuming the active
    /// revision at `active_root` (the last committed revision's root,
    /// per the structure-sharing hand-off) and the blob mark counter past
    /// `tree`'s highest known mark.
    pub fn from_recovered(revisions: Arena<u32>, tree: &VersionedTree) -> Self {
        let active_root = revisions
            .iter_committed()
            .last()
            .map(|(_, root)| *root)
            .unwrap_or(NIL);
        let next_blob_mark = tree.max_blob_mark() + 1;
        CommitController {
            revisions,
            active_root,
            state: RevisionState::Fresh,
            next_blob_mark,
        }
    }

    /// Revision arena, for checkpointing.
    pub fn revisions_arena_mut(&mut self) -> &mut Arena<u32> {
        &mut self.revisions
    }

    pub fn reset(&mut self) {
        self.revisions.reset();
        self.active_root = NIL;
        self.state = RevisionState::Fresh;
        self.next_blob_mark = 1;
    }

    /// The revision number that will be assigned to the active revision
    /// once it commits.
    pub fn active_revision(&self) -> u32 {
        self.revisions.len()
    }

    pub fn active_root(&self) -> u32 {
        self.active_root
    }

    pub fn state(&self) -> RevisionState {
        self.state
    }

    /// Root offset of a previously committed revision, or `None` if it was
    /// never committed (including the currently-active one).
    pub fn committed_root(&self, rev: u32) -> Option<u32> {
        self.revisions.get(rev).copied()
    }

    /// Mark the active revision dirty after a mutation changed its root.
    pub fn set_active_root(&mut self, root: u32) {
        if root != self.active_root {
            self.active_root = root;
            self.state = RevisionState::Dirty;
        }
    }

    /// An opaque blob mark never seen before, for the parser to stamp a
    /// new file's content with.
    pub fn next_blob_mark(&mut self) -> u32 {
        let mark = self.next_blob_mark;
        self.next_blob_mark += 1;
        mark
    }

    pub fn observe_blob_mark(&mut self, mark: u32) {
        if mark >= self.next_blob_mark {
            self.next_blob_mark = mark + 1;
        }
    }

    /// Seal the active revision: advance watermarks, record its root as
    /// committed revision `rev`, and open a fresh active revision seeded
    /// from it (structure-sharing hand-off — no clone). Returns the
    /// revision number that was just committed, and its predecessor's root
    /// (for the caller to diff against).
    pub fn commit(&mut self, tree: &mut VersionedTree, rev: u32) -> Result<(u32, u32)> {
        debug_assert_eq!(rev, self.active_revision(), "commit() called out of order");
        let prev_root = if self.revisions.len() == 0 {
            NIL
        } else {
            *self.revisions.get(self.revisions.len() - 1).unwrap()
        };

        tree.commit();
        self.revisions.push(self.active_root)?;
        self.revisions.commit();
        self.state = RevisionState::Fresh;

        trace!(rev, root = self.active_root, "committed revision");
        // New active revision starts identical to the one just committed;
        // the first mutation under it will clone on touch.
        Ok((rev, prev_root))
    }

    /// `read(path)` against the active revision.
    pub fn read_active<'a>(
        &self,
        tree: &'a VersionedTree,
        path: &[StringId],
    ) -> Option<crate::entry::Entry> {
        tree.read(self.active_root, path)
    }

    pub fn add(&mut self, tree: &mut VersionedTree, path: &[StringId], mode: FileMode, content: u32) -> Result<()> {
        let new_root = tree.add(self.active_root, path, mode, content)?;
        self.set_active_root(new_root);
        Ok(())
    }

    pub fn modify(&mut self, tree: &mut VersionedTree, path: &[StringId], mode: FileMode, content: u32) -> Result<()> {
        let new_root = tree.modify(self.active_root, path, mode, content)?;
        self.set_active_root(new_root);
        Ok(())
    }

    pub fn replace(
        &mut self,
        tree: &mut VersionedTree,
        path: &[StringId],
        content: u32,
    ) -> Result<Option<FileMode>> {
        let (new_root, old_mode) = tree.replace(self.active_root, path, content)?;
        self.set_active_root(new_root);
        Ok(old_mode)
    }

    pub fn delete(&mut self, tree: &mut VersionedTree, path: &[StringId]) -> Result<()> {
        let new_root = tree.delete(self.active_root, path)?;
        self.set_active_root(new_root);
        Ok(())
    }

    pub fn copy(
        &mut self,
        tree: &mut VersionedTree,
        src_rev: u32,
        src_path: &[StringId],
        dst_path: &[StringId],
    ) -> Result<Option<FileMode>> {
        let src_root = match self.committed_root(src_rev) {
            Some(r) => r,
            None => return Ok(None),
        };
        let (new_root, mode) = tree.copy(src_root, src_path, self.active_root, dst_path)?;
        self.set_active_root(new_root);
        Ok(mode)
    }
}
