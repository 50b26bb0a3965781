//! Virtual file factory (§4.I, component I).
//!
//! Wraps a transformed (or passed-through) byte buffer plus a stolen
//! modification time as a read-only file handle the downstream loader reads
//! exactly like an ordinary file. No `Write` impl exists on this type by
//! design — §3's invariant "write operations fail" is enforced by the type
//! system rather than by a runtime check.

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::time::SystemTime;

/// A read-only, in-memory file handle produced by the interception pipeline.
#[derive(Debug, Clone)]
pub struct InterceptedFile {
    path: String,
    cursor: Cursor<Vec<u8>>,
    modified: Option<SystemTime>,
}

impl InterceptedFile {
    /// Takes ownership of `bytes` for the handle's lifetime (§4.I).
    #[must_use]
    pub fn new(path: impl Into<String>, bytes: Vec<u8>, modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            cursor: Cursor::new(bytes),
            modified,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The real file's modification time at interception, or `None` if it
    /// was unavailable (§3 invariant: "...or zero if unavailable").
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the full buffer without consuming the cursor position.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }
}

impl Read for InterceptedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for InterceptedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_read_returns_exact_bytes() {
        let mut file = InterceptedFile::new("kernel", vec![1, 2, 3, 4], None);
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn modified_time_is_preserved_or_none() {
        let now = SystemTime::now();
        let file = InterceptedFile::new("kernel", vec![], Some(now));
        assert_eq!(file.modified(), Some(now));
        let file = InterceptedFile::new("kernel", vec![], None);
        assert_eq!(file.modified(), None);
    }
}
