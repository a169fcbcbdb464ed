//! A reference [`Emitter`] that prints `git fast-import` command text,
//! grounded line-for-line in `fast_export.c`'s output (spec.md §6).

use std::io::{self, Write};

use crate::commit::CommitMeta;
use crate::diff::Emitter;
use crate::entry::FileMode;
use crate::interner::{Interner, StringId};

/// Writes fast-import commands to any `Write` sink — `Stdout` in the CLI
/// binary, a `Vec<u8>` in tests.
pub struct FastImportEmitter<'a, W> {
    out: W,
    interner: &'a Interner,
    mark_counter: u32,
    in_commit: bool,
}

impl<'a, W: Write> FastImportEmitter<'a, W> {
    pub fn new(out: W, interner: &'a Interner) -> Self {
        FastImportEmitter {
            out,
            interner,
            mark_counter: 0,
            in_commit: false,
        }
    }

    fn render(&self, path: &[StringId]) -> String {
        crate::path::render(self.interner, path)
    }

    fn writeln(&mut self, line: &str) {
        // A write to an in-memory Vec or stdout's line buffer cannot
        // meaningfully fail in a way the emitter should recover from;
        // matches fast_export.c's unchecked printf calls.
        let _ = writeln!(self.out, "{line}");
    }
}

impl<'a, W: Write> Emitter for FastImportEmitter<'a, W> {
    fn emit_delete(&mut self, _depth: usize, path: &[StringId]) {
        self.writeln(&format!("D {}", self.render(path)));
    }

    fn emit_modify(&mut self, _depth: usize, path: &[StringId], mode: FileMode, mark: u32) {
        self.writeln(&format!("M {:o} :{} {}", mode.to_posix(), mark, self.render(path)));
    }

    fn emit_commit(&mut self, rev: u32, meta: &CommitMeta) {
        if self.in_commit {
            self.writeln("");
        }
        self.in_commit = true;
        self.writeln("commit refs/heads/master");
        self.mark_counter += 1;
        self.writeln(&format!("mark :{}", self.mark_counter));
        self.writeln(&format!("committer {} <{}> {} +0000", meta.author, meta.author, meta.timestamp));
        let mut log = meta.log.clone();
        if let (Some(uuid), Some(url)) = (&meta.uuid, &meta.url) {
            log.push_str(&format!("\n\ngit-svn-id: {url}@{rev} {uuid}\n"));
        }
        self.writeln(&format!("data {}", log.len()));
        self.writeln(&log);
        if rev > 0 {
            self.writeln("from refs/heads/master^0");
        }
    }

    fn emit_blob(&mut self, _mode: FileMode, mark: u32, len: u64) {
        self.writeln("blob");
        self.writeln(&format!("mark :{mark}"));
        self.writeln(&format!("data {len}"));
    }
}

/// A thin convenience wrapper over [`io::Stdout`], since the CLI binary
/// never needs a non-stdout sink.
pub fn stdout_emitter(interner: &Interner) -> FastImportEmitter<'_, io::Stdout> {
    FastImportEmitter::new(io::stdout(), interner)
}
