//! Collision-free destination naming.
//!
//! When a destination already exists, a `copy` suffix sequence is inserted
//! before the extension: `report.txt`, `report copy.txt`, `report copy 2.txt`,
//! and so on. Directories get the suffix on their full name.
//!
//! # Examples
//!
//! ```no_run
//! use deskbroom::conflict::{ConflictResolver, EntryKind};
//! use std::path::Path;
//!
//! let target = ConflictResolver::resolve(Path::new("/archive/2024/03/report.txt"), EntryKind::File);
//! println!("writing to {}", target.display());
//! ```

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether the entry being placed is a regular file or a directory.
///
/// Files keep their extension at the end of the name; directories are
/// suffixed as a whole, so `v1.2` becomes `v1.2 copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Classifies a path by its metadata, without following symlinks.
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        Ok(if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        })
    }
}

/// Finds a destination path that does not collide with anything on disk.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Returns `candidate` when nothing exists there, otherwise the first free
    /// `"<name> copy<ext>"` / `"<name> copy N<ext>"` sibling.
    ///
    /// A dangling symlink occupies its name and is treated as existing.
    pub fn resolve(candidate: &Path, kind: EntryKind) -> PathBuf {
        if !occupied(candidate) {
            return candidate.to_path_buf();
        }

        let (name, ext) = split_name(candidate, kind);
        let parent = candidate.parent().unwrap_or_else(|| Path::new(""));

        let mut counter: u64 = 1;
        loop {
            let probe = parent.join(suffixed_name(&name, ext.as_ref(), counter));
            if !occupied(&probe) {
                tracing::debug!(
                    original = %candidate.display(),
                    resolved = %probe.display(),
                    "resolved name conflict"
                );
                return probe;
            }
            counter += 1;
        }
    }
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Splits the final component into the part that receives the suffix and the
/// extension that stays at the end.
fn split_name(path: &Path, kind: EntryKind) -> (OsString, Option<OsString>) {
    let full = path.file_name().map(OsString::from).unwrap_or_default();
    if kind == EntryKind::Directory {
        return (full, None);
    }
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => (stem.to_os_string(), Some(ext.to_os_string())),
        _ => (full, None),
    }
}

fn suffixed_name(name: &OsString, ext: Option<&OsString>, counter: u64) -> OsString {
    let mut out = name.clone();
    if counter == 1 {
        out.push(" copy");
    } else {
        out.push(format!(" copy {counter}"));
    }
    if let Some(ext) = ext {
        out.push(".");
        out.push(ext);
    }
    out
}
