//! `svnfi`: read a Subversion dump stream and write `git fast-import`
//! commands to stdout. Wires [`svnfi::dumpreader::DumpReader`],
//! [`svnfi::store::Store`] and [`svnfi::stdout_emitter::FastImportEmitter`]
//! together (spec.md §6's "Parser -> store -> emitter" pipeline).

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use svnfi::blob::{relay_blob, relayed_len, BlobSource};
use svnfi::commit::CommitMeta;
use svnfi::config::StoreConfig;
use svnfi::diff::{diff, Emitter};
use svnfi::dumpreader::{DumpError, DumpEvent, DumpReader, NodeAction, NodeRecord};
use svnfi::entry::FileMode;
use svnfi::stdout_emitter::FastImportEmitter;
use svnfi::store::Store;

/// The CLI's own error type, aggregating the store's and the dump
/// reader's separately-kept error domains (spec.md §7) plus plain I/O,
/// since only the binary needs to report both under one exit code.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] svnfi::error::Error),

    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

type Result<T> = std::result::Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "svnfi", about = "Convert an SVN dump stream into git fast-import commands")]
struct Cli {
    /// Path to a Subversion dump file, or omit / pass `-` to read stdin.
    dump_file: Option<PathBuf>,

    /// Directory to checkpoint store state into after every commit.
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Source repository URL, threaded into each commit's `git-svn-id`
    /// trailer alongside the dump stream's `UUID:` header (mirrors
    /// `svndump_read`'s `url` argument, passed on the command line rather
    /// than read from the dump stream since it isn't part of it).
    #[arg(long)]
    url: Option<String>,
}

/// A source of blob bytes for a fully-buffered node's content, so
/// [`relay_blob`] can drive it through the same skip/copy contract a
/// streaming reader would use.
struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlobSource for SliceSource<'a> {
    fn skip(&mut self, n: u64) -> svnfi::error::Result<()> {
        self.pos += n as usize;
        Ok(())
    }

    fn copy_to(&mut self, out: &mut dyn Write, n: u64) -> svnfi::error::Result<()> {
        let end = self.pos + n as usize;
        let mut chunk = &self.data[self.pos..end];
        io::copy(&mut chunk, out)?;
        self.pos = end;
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("svnfi: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut reader: Box<dyn Read> = match &cli.dump_file {
        None => Box::new(io::stdin()),
        Some(p) if p.as_os_str() == "-" => Box::new(io::stdin()),
        Some(p) => Box::new(File::open(p)?),
    };
    let mut dump = DumpReader::new(BufReader::new(&mut reader));

    let mut config = StoreConfig::default();
    if let Some(dir) = cli.checkpoint_dir.clone() {
        config = config.with_checkpoint_dir(dir);
    }
    let mut store = Store::init(config)?;

    let mut pending: Option<CommitMeta> = None;
    let mut repo_uuid: Option<String> = None;

    while let Some(event) = dump.next_event()? {
        match event {
            DumpEvent::Uuid(raw) => {
                if uuid::Uuid::parse_str(&raw).is_err() {
                    tracing::warn!(uuid = %raw, "dump stream UUID header is not a well-formed UUID");
                }
                repo_uuid = Some(raw);
            }
            DumpEvent::Revision { number, props } => {
                if let Some(meta) = pending.take() {
                    seal(&mut store, meta)?;
                }
                tracing::debug!(revision = number, "parsing revision");
                pending = Some(CommitMeta {
                    author: props.author,
                    log: props.log,
                    uuid: repo_uuid.clone(),
                    url: cli.url.clone(),
                    timestamp: parse_svn_date(&props.date),
                });
            }
            DumpEvent::Node(node) => apply_node(&mut store, node)?,
        }
    }
    if let Some(meta) = pending.take() {
        seal(&mut store, meta)?;
    }
    Ok(())
}

fn seal(store: &mut Store, meta: CommitMeta) -> Result<()> {
    let (rev, prev_root, curr_root) = store.seal_revision()?;
    let mut emitter = FastImportEmitter::new(io::stdout(), store.interner());
    emitter.emit_commit(rev, &meta);
    diff(store.tree(), prev_root, curr_root, 1000, &mut emitter)?;
    Ok(())
}

fn apply_node(store: &mut Store, node: NodeRecord) -> Result<()> {
    let path = store.tokenize(&node.path)?;

    match node.action {
        NodeAction::Delete => {
            store.delete(&path)?;
        }
        NodeAction::Add | NodeAction::Replace => {
            if node.action == NodeAction::Replace {
                store.delete(&path)?;
            }
            if let (Some(rev), Some(src)) = (node.copyfrom_rev, &node.copyfrom_path) {
                let src_path = store.tokenize(src)?;
                store.copy(rev, &src_path, &path)?;
            } else if node.kind == Some(FileMode::Dir) {
                store.add(&path, FileMode::Dir, 0)?;
            } else if let Some(content) = &node.content {
                let mark = emit_blob_and_mark(store, FileMode::File, content)?;
                store.add(&path, FileMode::File, mark)?;
            }
        }
        NodeAction::Change => {
            if let Some(content) = &node.content {
                let mark = emit_blob_and_mark(store, FileMode::File, content)?;
                store.modify(&path, FileMode::File, mark)?;
            }
        }
    }
    Ok(())
}

/// Assign a fresh blob mark, emit its `blob`/`mark`/`data` header and bytes
/// to stdout, and return the mark for the following `M` line. The `data`
/// header must declare the post-prefix-skip length (spec.md S5), so it is
/// computed once via [`relayed_len`] and shared with the actual relay
/// below rather than recomputed independently.
fn emit_blob_and_mark(store: &mut Store, mode: FileMode, content: &[u8]) -> Result<u32> {
    let len = content.len() as u64;
    let declared_len = relayed_len(mode, len)?;

    let mark = store.next_blob_mark();
    let mut emitter = FastImportEmitter::new(io::stdout(), store.interner());
    emitter.emit_blob(mode, mark, declared_len);
    let mut src = SliceSource { data: content, pos: 0 };
    relay_blob(&mut src, &mut io::stdout(), mode, len)?;
    Ok(mark)
}

/// SVN's `svn:date` property is an ISO-8601 timestamp; parsed loosely since
/// the emitter only needs a Unix second count for its `committer` line.
fn parse_svn_date(date: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(date)
        .map(|d| d.timestamp())
        .unwrap_or(0)
}
