//! Blob byte relay (spec.md §6's `emit_blob` contract), kept deliberately
//! thin: the store never interprets blob bytes, only forwards them.

use std::io::Write;

use crate::entry::FileMode;
use crate::error::{Error, Result};

/// Subversion's symlink blob content is `"link "` followed by the target
/// path (`fast_export.c`'s `fast_export_blob`); this is the prefix dropped
/// before relaying.
const SYMLINK_PREFIX_LEN: u64 = 5; // b"link "

/// A single-reader, strictly-monotonic byte source for one blob's content
/// (spec.md §5: "single-reader and advanced strictly monotonically").
/// Grounded in `fast_export.c`'s `buffer_skip_bytes`/`buffer_copy_bytes`
/// pairing used by `fast_export_blob` to drop Subversion's 5-byte
/// `"link "` symlink prefix before relaying the rest.
pub trait BlobSource {
    /// Advance the stream by `n` bytes without copying them anywhere.
    fn skip(&mut self, n: u64) -> Result<()>;

    /// Copy exactly `n` bytes of the stream to `out`.
    fn copy_to(&mut self, out: &mut dyn Write, n: u64) -> Result<()>;
}

/// The byte count that will actually be relayed for a blob of `len` bytes
/// under `mode` — `len` itself, or `len` minus the `"link "` prefix for a
/// symlink. Callers must use this value for any `data <len>` header they
/// emit *before* calling [`relay_blob`], so the declared length always
/// matches what gets relayed (spec.md S5).
pub fn relayed_len(mode: FileMode, len: u64) -> Result<u64> {
    if mode == FileMode::Symlink {
        len.checked_sub(SYMLINK_PREFIX_LEN)
            .ok_or(Error::SymlinkBlobTooShort { len })
    } else {
        Ok(len)
    }
}

/// Relay a blob of `len` bytes from `src` to `out`, dropping Subversion's
/// `"link "` prefix first when `mode == Symlink` (spec.md S5). Returns the
/// same count [`relayed_len`] would for the same arguments.
pub fn relay_blob(src: &mut impl BlobSource, out: &mut dyn Write, mode: FileMode, len: u64) -> Result<u64> {
    let relayed = relayed_len(mode, len)?;
    if mode == FileMode::Symlink {
        src.skip(SYMLINK_PREFIX_LEN)?;
    }
    src.copy_to(out, relayed)?;
    Ok(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    struct SliceSource<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> BlobSource for SliceSource<'a> {
        fn skip(&mut self, n: u64) -> Result<()> {
            self.pos += n as usize;
            Ok(())
        }

        fn copy_to(&mut self, out: &mut dyn Write, n: u64) -> Result<()> {
            let end = self.pos + n as usize;
            let mut chunk = &self.data[self.pos..end];
            std::io::copy(&mut chunk, out)?;
            self.pos = end;
            Ok(())
        }
    }

    #[test]
    fn symlink_blob_drops_link_prefix() {
        let data = b"link target/path";
        let mut src = SliceSource { data, pos: 0 };
        let mut out = Vec::new();
        let relayed = relay_blob(&mut src, &mut out, FileMode::Symlink, data.len() as u64).unwrap();
        assert_eq!(relayed, (data.len() - 5) as u64);
        assert_eq!(out, b"target/path");
    }

    #[test]
    fn regular_file_blob_is_relayed_unchanged() {
        let data = b"hello world";
        let mut src = SliceSource { data, pos: 0 };
        let mut out = Vec::new();
        let relayed = relay_blob(&mut src, &mut out, FileMode::File, data.len() as u64).unwrap();
        assert_eq!(relayed, data.len() as u64);
        assert_eq!(out.as_slice(), &data[..]);
    }

    #[test]
    fn skip_then_read_works_through_a_reader_adapter() {
        struct ReaderSource<R> {
            reader: R,
        }
        impl<R: Read> BlobSource for ReaderSource<R> {
            fn skip(&mut self, n: u64) -> Result<()> {
                std::io::copy(&mut (&mut self.reader).take(n), &mut std::io::sink())?;
                Ok(())
            }
            fn copy_to(&mut self, out: &mut dyn Write, n: u64) -> Result<()> {
                std::io::copy(&mut (&mut self.reader).take(n), out)?;
                Ok(())
            }
        }
        let mut src = ReaderSource {
            reader: &b"link a/b"[..],
        };
        let mut out = Vec::new();
        let relayed = relay_blob(&mut src, &mut out, FileMode::Symlink, 8).unwrap();
        assert_eq!(relayed, 3);
        assert_eq!(out, b"a/b");
    }

    /// spec scenario S5: a 12-byte symlink blob ("link target/" minus one,
    /// i.e. `"link "` + 7 bytes) must declare length 7, not 12.
    #[test]
    fn relayed_len_matches_spec_scenario_s5() {
        assert_eq!(relayed_len(FileMode::Symlink, 12).unwrap(), 7);
        assert_eq!(relayed_len(FileMode::File, 12).unwrap(), 12);
    }

    #[test]
    fn relayed_len_rejects_symlink_blob_shorter_than_prefix() {
        let err = relayed_len(FileMode::Symlink, 4).unwrap_err();
        assert!(matches!(err, crate::error::Error::SymlinkBlobTooShort { len: 4 }));
    }

    #[test]
    fn relay_blob_rejects_symlink_blob_shorter_than_prefix() {
        let data = b"link";
        let mut src = SliceSource { data, pos: 0 };
        let mut out = Vec::new();
        let err = relay_blob(&mut src, &mut out, FileMode::Symlink, data.len() as u64).unwrap_err();
        assert!(matches!(err, crate::error::Error::SymlinkBlobTooShort { len: 4 }));
    }
}
