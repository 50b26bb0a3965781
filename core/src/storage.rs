//! Storage abstraction over the firmware-volume overlay and the real boot
//! volume (§4.K).
//!
//! `BootVolume` is the one trait every pipeline reads through. Two real
//! backends exist in this crate, both thin adapters over `std::fs` — the
//! real firmware integration substitutes a UEFI-protocol-backed
//! implementation at the boundary named in §6, which is out of scope here.
//! This mirrors the teacher crate's `sim::loader::load_binary`: turn an I/O
//! failure into a typed result instead of panicking, generalized behind a
//! trait so pipelines can be unit-tested against an in-memory fake.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One entry returned by [`BootVolume::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub modified: Option<SystemTime>,
}

/// Read-only access to a tree of files, keyed by relative unicode path.
///
/// No write methods exist on this trait by design (§4.I: "write operations
/// fail").
pub trait BootVolume {
    /// Reads an entire file's bytes.
    ///
    /// # Errors
    /// Returns [`io::Error`] with [`io::ErrorKind::NotFound`] if `path`
    /// does not exist, or another I/O error on read failure.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Returns a file or directory's modification time, or `None` if it is
    /// unavailable (§3: "or zero if unavailable").
    fn modified(&self, path: &str) -> io::Result<Option<SystemTime>>;

    /// Lists a directory's immediate children.
    ///
    /// # Errors
    /// Returns [`io::Error`] if `path` is not a readable directory.
    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Whether `path` exists at all (file or directory).
    fn exists(&self, path: &str) -> bool;
}

/// A [`BootVolume`] rooted at a real directory on disk.
///
/// Used for both the overlay storage (`Add` entries) and the root storage
/// (`Force` entries, the real kernel/cache/extensions-directory files) — the
/// two only differ in which root directory they are constructed with.
#[derive(Debug, Clone)]
pub struct FsVolume {
    root: PathBuf,
}

impl FsVolume {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BootVolume for FsVolume {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn modified(&self, path: &str) -> io::Result<Option<SystemTime>> {
        match fs::metadata(self.resolve(path)) {
            Ok(meta) => Ok(meta.modified().ok()),
            Err(e) => Err(e),
        }
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            entries.push(DirEntry { name, modified });
        }
        Ok(entries)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

/// An in-memory [`BootVolume`], used by this crate's own tests (§8).
#[derive(Debug, Clone, Default)]
pub struct MemoryVolume {
    files: std::collections::HashMap<String, (Vec<u8>, Option<SystemTime>)>,
}

impl MemoryVolume {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>, modified: Option<SystemTime>) {
        self.files.insert(path.into(), (bytes.into(), modified));
    }
}

impl BootVolume for MemoryVolume {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn modified(&self, path: &str) -> io::Result<Option<SystemTime>> {
        self.files
            .get(path)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        for (key, (_, modified)) in &self.files {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let name = rest.split('/').next().unwrap_or(rest).to_string();
            if seen.insert(name.clone()) {
                entries.push(DirEntry {
                    name,
                    modified: *modified,
                });
            }
        }
        Ok(entries)
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
            || self
                .files
                .keys()
                .any(|k| k.starts_with(&format!("{path}/")))
    }
}

/// Joins a directory path and a child name the way every `BootVolume`
/// backend expects (forward slashes, no leading slash).
#[must_use]
pub fn join(dir: &str, child: &str) -> String {
    if dir.is_empty() {
        child.to_string()
    } else {
        format!("{dir}/{child}")
    }
}

/// Returns the parent directory of `path` (before the final `/`), or `""`.
#[must_use]
pub fn parent_of(path: &str) -> &str {
    Path::new(path)
        .parent()
        .and_then(|p| p.to_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn init_test_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn fs_volume_reads_a_real_file() {
        init_test_logger();
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("kernel")).unwrap();
        file.write_all(b"hello").unwrap();
        file.flush().unwrap();

        let volume = FsVolume::new(dir.path());
        assert_eq!(volume.read("kernel").unwrap(), b"hello");
        assert!(volume.exists("kernel"));
        assert!(!volume.exists("missing"));
    }

    #[test]
    fn memory_volume_round_trips() {
        let mut vol = MemoryVolume::new();
        vol.insert("a/b.txt", b"hi".to_vec(), None);
        assert_eq!(vol.read("a/b.txt").unwrap(), b"hi");
        assert!(vol.exists("a"));
        let children = vol.read_dir("a").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "b.txt");
    }

    #[test]
    fn join_and_parent() {
        assert_eq!(join("System/Library/Extensions", "OcA"), "System/Library/Extensions/OcA");
        assert_eq!(join("", "OcA"), "OcA");
        assert_eq!(parent_of("Boot/kernelcache"), "Boot");
    }
}
