//! The versioned, copy-on-write directory tree (spec.md §4.4).
//!
//! `VersionedTree` is deliberately revision-agnostic: every method takes the
//! root offset of the directory tree to operate on and, for mutations,
//! returns the new root after the copy-on-write write path has run.
//! [`crate::commit::CommitController`] is the one that remembers which root
//! belongs to which revision number and threads the active root through
//! calls here — the separation mirrors spec.md's own split between §4.4
//! (tree mechanics) and §4.6 (revision lifecycle).
//!
//! All directories, across every revision this tree has ever held, live in
//! one [`Treap`] (`dirs`): a directory is simply a subtree root offset into
//! it. Two revisions "sharing a subtree" is nothing more than two roots
//! that happen to name the same offset — there is no separate notion of
//! sharing to implement.

use std::cmp::Ordering;

use crate::arena::NIL;
use crate::entry::{Entry, FileMode};
use crate::error::Result;
use crate::interner::{Interner, StringId};
use crate::treap::{priority_of, Treap};

fn cmp_id(a: &StringId, b: &StringId) -> Ordering {
    a.cmp(b)
}

/// The directory forest plus the string table backing its keys.
#[derive(Debug)]
pub struct VersionedTree {
    pub interner: Interner,
    dirs: Treap<StringId, Entry>,
    next_priority: u32,
}

impl Default for VersionedTree {
    fn default() -> Self {
        VersionedTree::with_capacity(4096)
    }
}

impl VersionedTree {
    pub fn with_capacity(capacity: usize) -> Self {
        VersionedTree {
            interner: Interner::with_capacity(capacity),
            dirs: Treap::with_capacity(capacity),
            next_priority: 0,
        }
    }

    fn fresh_priority(&mut self) -> u32 {
        let p = priority_of(self.next_priority);
        self.next_priority += 1;
        p
    }

    pub fn committed(&self) -> u32 {
        self.dirs.committed()
    }

    /// Directory-treap node arena, for checkpointing (spec.md §6).
    pub fn dirs_arena_mut(&mut self) -> &mut crate::arena::Arena<crate::treap::TreapNode<StringId, Entry>> {
        self.dirs.arena_mut()
    }

    /// Reconstruct a tree from a recovered directory-treap arena and
    /// interner. The directory treap's roots (one per revision) are *not*
    /// stored here — [`crate::commit::CommitController`] recovers those
    /// separately and the root offsets are meaningful against this same
    /// arena regardless of which revision list rebuilds them.
    pub fn from_recovered(dirs_arena: crate::arena::Arena<crate::treap::TreapNode<StringId, Entry>>, interner: Interner) -> Self {
        let mut dirs = Treap::with_capacity(0);
        *dirs.arena_mut() = dirs_arena;
        VersionedTree {
            interner,
            dirs,
            next_priority: 0,
        }
    }

    /// Seal every mutable object created since the last commit.
    pub fn commit(&mut self) {
        self.dirs.commit();
        self.interner.commit();
    }

    pub fn reset(&mut self) {
        self.dirs.reset();
        self.interner.reset();
        self.next_priority = 0;
    }

    /// `read(rev, path)` (spec.md §4.4's read path): walk from `root`,
    /// looking up each component. Stops early and returns a non-directory
    /// entry encountered mid-path (deliberate: lets `copy` reach files).
    pub fn read(&self, root: u32, path: &[StringId]) -> Option<Entry> {
        let mut cur = root;
        let mut found = None;
        for (i, key) in path.iter().enumerate() {
            let entry = *self.dirs.search_by(cur, key, cmp_id)?;
            found = Some(entry);
            if i + 1 < path.len() {
                if !entry.mode.is_dir() {
                    return Some(entry);
                }
                cur = entry.content;
            }
        }
        found
    }

    /// The copy-on-write write path (spec.md §4.4). Descends `root` along
    /// `path`, applying `leaf_fn` to the entry found at the final
    /// component (or `None` if absent) to decide the entry's new value —
    /// `Some(entry)` upserts it, `None` removes it (a no-op if it was
    /// already absent). When `create_dirs` is set, missing intermediate
    /// directories are created with `mode = Dir`; otherwise a missing or
    /// non-directory intermediate component makes the whole call a no-op.
    ///
    /// Returns the new subtree root and the entry that occupied the final
    /// component before `leaf_fn` ran (the caller's "old entry").
    fn apply_at(
        &mut self,
        root: u32,
        path: &[StringId],
        committed: u32,
        create_dirs: bool,
        leaf_fn: impl Fn(StringId, Option<Entry>) -> Option<Entry> + Copy,
    ) -> Result<(u32, Option<Entry>)> {
        let key = match path.first() {
            Some(k) => *k,
            None => return Ok((root, None)),
        };
        let existing = self.dirs.search_by(root, &key, cmp_id).copied();

        if path.len() == 1 {
            return match leaf_fn(key, existing) {
                Some(value) => {
                    let priority = self.fresh_priority();
                    let (new_root, _) =
                        self.dirs.set_by(root, key, value, priority, committed, cmp_id)?;
                    Ok((new_root, existing))
                }
                None => {
                    let (new_root, _) = self.dirs.remove_by(root, &key, committed, cmp_id)?;
                    Ok((new_root, existing))
                }
            };
        }

        let child_root = match existing {
            Some(e) if e.mode.is_dir() => e.content,
            Some(_) => return Ok((root, None)),
            None if create_dirs => NIL,
            None => return Ok((root, None)),
        };
        let (new_child_root, old_leaf) =
            self.apply_at(child_root, &path[1..], committed, create_dirs, leaf_fn)?;
        if new_child_root == child_root {
            // Nothing actually changed below (no-op deeper in the walk);
            // don't rewrite this directory's entry for `key` at all.
            return Ok((root, old_leaf));
        }
        let priority = self.fresh_priority();
        let (new_root, _) = self.dirs.set_by(
            root,
            key,
            Entry::new_dir(key, new_child_root),
            priority,
            committed,
            cmp_id,
        )?;
        Ok((new_root, old_leaf))
    }

    /// `add(path, mode, content_ref)`: create or overwrite the entry at
    /// `path`; missing intermediate directories are created with
    /// `mode = Dir`.
    pub fn add(
        &mut self,
        root: u32,
        path: &[StringId],
        mode: FileMode,
        content: u32,
    ) -> Result<u32> {
        let committed = self.committed();
        let (new_root, _) =
            self.apply_at(root, path, committed, true, move |key, _existing| {
                Some(Entry { name: key, mode, content })
            })?;
        Ok(new_root)
    }

    /// `modify(path, mode, content_ref)`: as `add`, but `content == 0`
    /// retains the entry's existing `content_ref` (used when only the mode
    /// changes). No-op if the entry does not exist.
    pub fn modify(
        &mut self,
        root: u32,
        path: &[StringId],
        mode: FileMode,
        content: u32,
    ) -> Result<u32> {
        let committed = self.committed();
        let (new_root, _) = self.apply_at(root, path, committed, false, move |key, existing| {
            existing.map(|e| Entry {
                name: key,
                mode,
                content: if content == 0 { e.content } else { content },
            })
        })?;
        Ok(new_root)
    }

    /// `replace(path, content_ref) -> old_mode`: overwrite the content of
    /// an existing entry, keeping its mode, and return the prior mode so
    /// the caller can re-apply it when only content changed. `None` (mode
    /// 0 in spec.md's C-flavored return convention) if the entry is
    /// absent; absent is a no-op, not an error.
    pub fn replace(
        &mut self,
        root: u32,
        path: &[StringId],
        content: u32,
    ) -> Result<(u32, Option<FileMode>)> {
        let committed = self.committed();
        let (new_root, old) = self.apply_at(root, path, committed, false, move |key, existing| {
            existing.map(|e| Entry {
                name: key,
                mode: e.mode,
                content,
            })
        })?;
        Ok((new_root, old.map(|e| e.mode)))
    }

    /// `delete(path)`: remove the entry at `path`. No-op if absent.
    pub fn delete(&mut self, root: u32, path: &[StringId]) -> Result<u32> {
        let committed = self.committed();
        let (new_root, _) = self.apply_at(root, path, committed, false, |_key, _existing| None)?;
        Ok(new_root)
    }

    /// `copy(rev, src_path, dst_path) -> mode`: look up `src_path` in a
    /// committed revision's `src_root`; if present, copy the entry (same
    /// mode, same `content_ref` — including directory offsets, producing
    /// structure sharing) into `dst_root` at `dst_path`. A no-op (and
    /// `None`) if the source is absent.
    pub fn copy(
        &mut self,
        src_root: u32,
        src_path: &[StringId],
        dst_root: u32,
        dst_path: &[StringId],
    ) -> Result<(u32, Option<FileMode>)> {
        let src_entry = match self.read(src_root, src_path) {
            Some(e) => e,
            None => return Ok((dst_root, None)),
        };
        let committed = self.committed();
        let (new_root, _) =
            self.apply_at(dst_root, dst_path, committed, true, move |key, _existing| {
                Some(Entry {
                    name: key,
                    mode: src_entry.mode,
                    content: src_entry.content,
                })
            })?;
        Ok((new_root, Some(src_entry.mode)))
    }

    /// Iterate the immediate entries of the directory rooted at `root`, in
    /// ascending `name_id` order (spec.md §8 invariant 3).
    pub fn iter_dir(&self, root: u32) -> impl Iterator<Item = (&StringId, &Entry)> {
        self.dirs.iter(root)
    }

    /// Scan every committed entry for the highest blob mark in use
    /// (spec.md §4.4's "Blob marks" paragraph), so a recovered store's
    /// `next_blob_mark()` never collides with previously emitted marks.
    pub fn max_blob_mark(&self) -> u32 {
        self.dirs
            .arena()
            .iter_committed()
            .filter(|(_, node)| !node.value.mode.is_dir())
            .map(|(_, node)| node.value.content)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(tree: &mut VersionedTree, s: &str) -> Vec<StringId> {
        crate::path::tokenize(&mut tree.interner, s, 1000)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn add_creates_intermediate_directories() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "a/b/c.txt");
        let root = tree.add(NIL, &p, FileMode::File, 7).unwrap();
        let entry = tree.read(root, &p).unwrap();
        assert_eq!(entry.mode, FileMode::File);
        assert_eq!(entry.content, 7);
    }

    #[test]
    fn modify_with_zero_content_retains_existing_mark() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let root = tree.add(NIL, &p, FileMode::File, 7).unwrap();
        let root = tree.modify(root, &p, FileMode::Exe, 0).unwrap();
        let entry = tree.read(root, &p).unwrap();
        assert_eq!(entry.mode, FileMode::Exe);
        assert_eq!(entry.content, 7);
    }

    #[test]
    fn modify_on_absent_path_is_a_no_op() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "nope");
        let root = tree.modify(NIL, &p, FileMode::File, 1).unwrap();
        assert_eq!(root, NIL);
        assert!(tree.read(root, &p).is_none());
    }

    #[test]
    fn replace_keeps_mode_and_returns_old_mode() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let root = tree.add(NIL, &p, FileMode::Exe, 7).unwrap();
        let (root, old) = tree.replace(root, &p, 99).unwrap();
        assert_eq!(old, Some(FileMode::Exe));
        let entry = tree.read(root, &p).unwrap();
        assert_eq!(entry.mode, FileMode::Exe);
        assert_eq!(entry.content, 99);
    }

    #[test]
    fn replace_on_absent_path_returns_none() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "nope");
        let (root, old) = tree.replace(NIL, &p, 1).unwrap();
        assert_eq!(root, NIL);
        assert_eq!(old, None);
    }

    #[test]
    fn delete_removes_entry_and_is_noop_if_absent() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let root = tree.add(NIL, &p, FileMode::File, 1).unwrap();
        let root = tree.delete(root, &p).unwrap();
        assert!(tree.read(root, &p).is_none());
        let root2 = tree.delete(root, &p).unwrap();
        assert_eq!(root, root2);
    }

    #[test]
    fn copy_shares_subtree_offset() {
        let mut tree = VersionedTree::default();
        let abc = path(&mut tree, "a/b/c.txt");
        let src_root = tree.add(NIL, &abc, FileMode::File, 1).unwrap();
        tree.commit();

        let dst_prefix = path(&mut tree, "x");
        let (dst_root, mode) = tree.copy(src_root, &path(&mut tree, "a"), NIL, &dst_prefix).unwrap();
        assert_eq!(mode, Some(FileMode::Dir));

        let xbc = path(&mut tree, "x/b/c.txt");
        let copied = tree.read(dst_root, &xbc).unwrap();
        let original = tree.read(src_root, &abc).unwrap();
        assert_eq!(copied.mode, original.mode);
        assert_eq!(copied.content, original.content);

        let a_entry = tree.read(src_root, &path(&mut tree, "a")).unwrap();
        let x_entry = tree.read(dst_root, &path(&mut tree, "x")).unwrap();
        assert_eq!(a_entry.content, x_entry.content, "subtree offset must be shared");
    }

    #[test]
    fn copy_from_missing_source_is_noop() {
        let mut tree = VersionedTree::default();
        let src = path(&mut tree, "nope");
        let dst = path(&mut tree, "dst");
        let (root, mode) = tree.copy(NIL, &src, NIL, &dst).unwrap();
        assert_eq!(root, NIL);
        assert_eq!(mode, None);
    }

    #[test]
    fn iteration_is_ascending_by_name_id() {
        let mut tree = VersionedTree::default();
        let mut root = NIL;
        let names = ["zeta", "alpha", "mid"];
        for n in names {
            let p = path(&mut tree, n);
            root = tree.add(root, &p, FileMode::File, 1).unwrap();
        }
        let ids: Vec<StringId> = tree.iter_dir(root).map(|(k, _)| *k).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn write_under_committed_revision_does_not_mutate_it() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let root1 = tree.add(NIL, &p, FileMode::File, 1).unwrap();
        tree.commit();
        let before = tree.read(root1, &p).unwrap();

        let root2 = tree.modify(root1, &p, FileMode::Exe, 0).unwrap();
        let after1 = tree.read(root1, &p).unwrap();
        let after2 = tree.read(root2, &p).unwrap();

        assert_eq!(before, after1, "committed revision must be unaffected by later writes");
        assert_eq!(after2.mode, FileMode::Exe);
    }
}
