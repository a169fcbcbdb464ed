//! Two-cursor synchronized directory diff (spec.md §4.5).
//!
//! `diff()` walks two directory trees in lockstep, in ascending
//! `name_id` order (the same order [`crate::treap::Treap::iter`] already
//! produces), and emits the minimal add/modify/delete sequence that turns
//! one into the other. The six cases below are spec.md §4.5's cases 1-6,
//! verbatim.

use tracing::trace;

use crate::entry::{Entry, FileMode};
use crate::error::Result;
use crate::interner::StringId;
use crate::path::PathStack;
use crate::tree::VersionedTree;

/// The four callbacks the store drives during diffing and committing
/// (spec.md §6's "Store -> emitter callbacks").
pub trait Emitter {
    /// Remove `path` (and, if it named a directory, everything under it —
    /// git fast-import deletes a tree by deleting its path).
    fn emit_delete(&mut self, depth: usize, path: &[StringId]);

    /// Set the file at `path` to `mode`/`mark`.
    fn emit_modify(&mut self, depth: usize, path: &[StringId], mode: FileMode, mark: u32);

    /// Begin a commit; the emitter is expected to call back into
    /// [`diff`] between `emit_commit` and returning, to produce the
    /// change set (spec.md §6: "the emitter also calls back into
    /// `diff(rev-1, rev)`").
    fn emit_commit(&mut self, rev: u32, meta: &crate::commit::CommitMeta);

    /// Relay `len` bytes of blob content tagged `mark`/`mode`. Called
    /// during parsing, not during diffing; included here because it is
    /// one of the same four named callbacks spec.md §6 groups together.
    fn emit_blob(&mut self, mode: FileMode, mark: u32, len: u64);
}

/// Diff the directory trees rooted at `r1` and `r2`, emitting the ops that
/// turn `r1` into `r2`. `diff(r, r)` emits nothing (spec.md §8 invariant
/// 5) because two identical roots make every directory comparison along
/// the walk hit case 3 immediately.
pub fn diff(
    tree: &VersionedTree,
    r1: u32,
    r2: u32,
    max_depth: usize,
    emitter: &mut impl Emitter,
) -> Result<()> {
    let mut stack = PathStack::new();
    diff_dirs(tree, &mut stack, r1, r2, max_depth, emitter)
}

fn diff_dirs(
    tree: &VersionedTree,
    stack: &mut PathStack,
    a_root: u32,
    b_root: u32,
    max_depth: usize,
    emitter: &mut impl Emitter,
) -> Result<()> {
    let mut a = tree.iter_dir(a_root).peekable();
    let mut b = tree.iter_dir(b_root).peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ok(()),
            (Some((name, _)), None) => {
                emit_delete_at(stack, *name, max_depth, emitter)?;
                a.next();
            }
            (None, Some((name, entry))) => {
                stack.push(*name, max_depth)?;
                emit_add_recursive(tree, stack, *entry, max_depth, emitter)?;
                stack.pop();
                b.next();
            }
            (Some((an, ae)), Some((bn, be))) => {
                if an < bn {
                    emit_delete_at(stack, *an, max_depth, emitter)?;
                    a.next();
                } else if an > bn {
                    stack.push(*bn, max_depth)?;
                    emit_add_recursive(tree, stack, *be, max_depth, emitter)?;
                    stack.pop();
                    b.next();
                } else {
                    diff_same_name(tree, stack, *an, *ae, *be, max_depth, emitter)?;
                    a.next();
                    b.next();
                }
            }
        }
    }
}

fn diff_same_name(
    tree: &VersionedTree,
    stack: &mut PathStack,
    name: StringId,
    ae: Entry,
    be: Entry,
    max_depth: usize,
    emitter: &mut impl Emitter,
) -> Result<()> {
    if ae.mode == be.mode && ae.content == be.content {
        return Ok(()); // case 3: unchanged, advance both.
    }
    stack.push(name, max_depth)?;
    if ae.mode.is_dir() && be.mode.is_dir() {
        // case 4: recurse into the referenced directories.
        diff_dirs(tree, stack, ae.content, be.content, max_depth, emitter)?;
    } else if ae.mode.is_dir() != be.mode.is_dir() {
        // case 5: a type change across DIR/non-DIR; delete then add.
        emitter.emit_delete(stack.as_slice().len(), stack.as_slice());
        emit_add_recursive(tree, stack, be, max_depth, emitter)?;
    } else {
        // case 6: both non-DIR but differ; add-or-overwrite ("modify").
        emitter.emit_modify(stack.as_slice().len(), stack.as_slice(), be.mode, be.content);
    }
    stack.pop();
    Ok(())
}

fn emit_delete_at(
    stack: &mut PathStack,
    name: StringId,
    max_depth: usize,
    emitter: &mut impl Emitter,
) -> Result<()> {
    stack.push(name, max_depth)?;
    emitter.emit_delete(stack.as_slice().len(), stack.as_slice());
    stack.pop();
    Ok(())
}

/// "Add recursively" (spec.md §4.5): walk a directory in order, emitting
/// `modify` for every file leaf and recursing into sub-directories. An
/// empty directory produces nothing, matching git fast-import semantics
/// (spec.md S4).
fn emit_add_recursive(
    tree: &VersionedTree,
    stack: &mut PathStack,
    entry: Entry,
    max_depth: usize,
    emitter: &mut impl Emitter,
) -> Result<()> {
    if !entry.mode.is_dir() {
        trace!(depth = stack.as_slice().len(), "diff: add leaf");
        emitter.emit_modify(stack.as_slice().len(), stack.as_slice(), entry.mode, entry.content);
        return Ok(());
    }
    for (name, child) in tree.iter_dir(entry.content) {
        stack.push(*name, max_depth)?;
        emit_add_recursive(tree, stack, *child, max_depth, emitter)?;
        stack.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NIL;
    use crate::commit::CommitMeta;

    #[derive(Default)]
    struct Recorder {
        deletes: Vec<(usize, Vec<StringId>)>,
        modifies: Vec<(usize, Vec<StringId>, FileMode, u32)>,
        commits: Vec<u32>,
    }

    impl Emitter for Recorder {
        fn emit_delete(&mut self, depth: usize, path: &[StringId]) {
            self.deletes.push((depth, path.to_vec()));
        }
        fn emit_modify(&mut self, depth: usize, path: &[StringId], mode: FileMode, mark: u32) {
            self.modifies.push((depth, path.to_vec(), mode, mark));
        }
        fn emit_commit(&mut self, rev: u32, _meta: &CommitMeta) {
            self.commits.push(rev);
        }
        fn emit_blob(&mut self, _mode: FileMode, _mark: u32, _len: u64) {}
    }

    fn path(tree: &mut VersionedTree, s: &str) -> Vec<StringId> {
        crate::path::tokenize(&mut tree.interner, s, 1000).unwrap().to_vec()
    }

    #[test]
    fn identical_trees_diff_to_nothing() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "a/b.txt");
        let root = tree.add(NIL, &p, FileMode::File, 1).unwrap();
        tree.commit();

        let mut rec = Recorder::default();
        diff(&tree, root, root, 1000, &mut rec).unwrap();
        assert!(rec.deletes.is_empty());
        assert!(rec.modifies.is_empty());
    }

    #[test]
    fn s1_add_then_commit_emits_one_modify() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let r1 = NIL;
        let r2 = tree.add(NIL, &p, FileMode::File, 7).unwrap();
        tree.commit();

        let mut rec = Recorder::default();
        diff(&tree, r1, r2, 1000, &mut rec).unwrap();
        assert_eq!(rec.modifies, vec![(1, p.clone(), FileMode::File, 7)]);
        assert!(rec.deletes.is_empty());
    }

    #[test]
    fn s2_delete_emits_one_delete() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let r1 = tree.add(NIL, &p, FileMode::File, 7).unwrap();
        tree.commit();
        let r2 = tree.delete(r1, &p).unwrap();
        tree.commit();

        let mut rec = Recorder::default();
        diff(&tree, r1, r2, 1000, &mut rec).unwrap();
        assert_eq!(rec.deletes, vec![(1, p)]);
        assert!(rec.modifies.is_empty());
    }

    #[test]
    fn s3_subtree_copy_diffs_to_single_modify_under_new_name() {
        let mut tree = VersionedTree::default();
        let abc = path(&mut tree, "a/b/c");
        let r1 = tree.add(NIL, &abc, FileMode::File, 1).unwrap();
        tree.commit();

        let a = path(&mut tree, "a");
        let x = path(&mut tree, "x");
        let (r2, _) = tree.copy(r1, &a, r1, &x).unwrap();
        tree.commit();

        let mut rec = Recorder::default();
        diff(&tree, r1, r2, 1000, &mut rec).unwrap();
        let xbc = path(&mut tree, "x/b/c");
        assert_eq!(rec.modifies, vec![(3, xbc, FileMode::File, 1)]);
        assert!(rec.deletes.is_empty(), "a itself is unchanged, no delete expected");
    }

    #[test]
    fn s4_replace_file_with_empty_dir_emits_delete_only() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "p");
        let r1 = tree.add(NIL, &p, FileMode::File, 5).unwrap();
        tree.commit();

        let r2 = tree.delete(r1, &p).unwrap();
        let r2 = tree.add(r2, &p, FileMode::Dir, 0).unwrap();
        tree.commit();

        let mut rec = Recorder::default();
        diff(&tree, r1, r2, 1000, &mut rec).unwrap();
        assert_eq!(rec.deletes, vec![(1, p)]);
        assert!(rec.modifies.is_empty(), "empty directory yields nothing");
    }

    #[test]
    fn s6_modify_retaining_content_preserves_mark() {
        let mut tree = VersionedTree::default();
        let p = path(&mut tree, "file");
        let r1 = tree.add(NIL, &p, FileMode::File, 7).unwrap();
        tree.commit();
        let r2 = tree.modify(r1, &p, FileMode::Exe, 0).unwrap();
        tree.commit();

        let mut rec = Recorder::default();
        diff(&tree, r1, r2, 1000, &mut rec).unwrap();
        assert_eq!(rec.modifies, vec![(1, p, FileMode::Exe, 7)]);
    }
}
