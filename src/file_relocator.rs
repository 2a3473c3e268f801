/// Single-entry relocation into a destination directory.
///
/// This module moves or copies one file or directory into a destination
/// directory, picking a collision-free name first. Failures are returned as
/// values so a pass can record them and keep going.
use crate::conflict::{ConflictResolver, EntryKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// How the source is treated once its contents reach the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationMode {
    /// Rename into place, falling back to copy + delete across devices.
    Move,
    /// Copy the contents and leave the source untouched.
    Copy,
}

/// A completed relocation.
#[derive(Debug, Clone)]
pub struct Relocation {
    /// Where the entry was taken from.
    pub source: PathBuf,
    /// Where it ended up, after collision resolution.
    pub destination: PathBuf,
    /// Whether a file or a whole directory was relocated.
    pub kind: EntryKind,
    /// Total size of the regular files that were relocated.
    pub bytes: u64,
}

/// Errors for a single entry. None of these abort a pass.
#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("{} has no file name component", path.display())]
    NoFileName { path: PathBuf },

    #[error("failed to inspect {}: {source}", path.display())]
    Inspect { path: PathBuf, source: io::Error },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("copied {} to {} but could not remove the original: {source}", from.display(), to.display())]
    RemoveSourceFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Result type for single-entry relocations.
pub type RelocateResult<T> = Result<T, RelocateError>;

/// Moves or copies entries into a destination directory without overwriting.
pub struct FileRelocator;

impl FileRelocator {
    /// Relocates `source` into `destination_dir`.
    ///
    /// The destination name is `basename(source)`, passed through
    /// [`ConflictResolver`] so nothing already in `destination_dir` is
    /// replaced. Missing directories on the way to the destination are
    /// created.
    ///
    /// # Arguments
    ///
    /// * `source` - The file or directory to relocate
    /// * `destination_dir` - The directory that should receive it
    /// * `mode` - Whether to move or copy
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use deskbroom::file_relocator::{FileRelocator, RelocationMode};
    /// use std::path::Path;
    ///
    /// match FileRelocator::relocate(
    ///     Path::new("/home/me/Desktop/notes.txt"),
    ///     Path::new("/home/me/Archive/2024/03"),
    ///     RelocationMode::Move,
    /// ) {
    ///     Ok(done) => println!("moved to {}", done.destination.display()),
    ///     Err(e) => eprintln!("{e}"),
    /// }
    /// ```
    pub fn relocate(
        source: &Path,
        destination_dir: &Path,
        mode: RelocationMode,
    ) -> RelocateResult<Relocation> {
        let file_name = source.file_name().ok_or_else(|| RelocateError::NoFileName {
            path: source.to_path_buf(),
        })?;

        let kind = EntryKind::of(source).map_err(|e| RelocateError::Inspect {
            path: source.to_path_buf(),
            source: e,
        })?;
        let bytes = measure(source);

        let destination = ConflictResolver::resolve(&destination_dir.join(file_name), kind);

        let parent = destination.parent().unwrap_or(destination_dir);
        fs::create_dir_all(parent).map_err(|e| RelocateError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;

        match mode {
            RelocationMode::Move => Self::move_entry(source, &destination)?,
            RelocationMode::Copy => {
                copy_recursive(source, &destination).map_err(|e| RelocateError::CopyFailed {
                    from: source.to_path_buf(),
                    to: destination.clone(),
                    source: e,
                })?;
            }
        }

        tracing::debug!(
            from = %source.display(),
            to = %destination.display(),
            ?mode,
            bytes,
            "relocated entry"
        );

        Ok(Relocation {
            source: source.to_path_buf(),
            destination,
            kind,
            bytes,
        })
    }

    fn move_entry(source: &Path, destination: &Path) -> RelocateResult<()> {
        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(
                    from = %source.display(),
                    to = %destination.display(),
                    "rename crosses devices, copying instead"
                );
                copy_then_remove(source, destination)
            }
            Err(e) => Err(RelocateError::MoveFailed {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                source: e,
            }),
        }
    }
}

/// Moves `source` to `destination` by copying it and then deleting the
/// original.
///
/// `destination` must not exist. When the copy fails, whatever was already
/// copied is removed again and the source is left alone.
fn copy_then_remove(source: &Path, destination: &Path) -> RelocateResult<()> {
    let copy_failed = |e| RelocateError::CopyFailed {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: e,
    };

    if fs::symlink_metadata(destination).is_ok() {
        return Err(copy_failed(io::Error::from(io::ErrorKind::AlreadyExists)));
    }

    if let Err(copy_err) = copy_recursive(source, destination) {
        if let Err(cleanup_err) = remove_entry(destination) {
            if cleanup_err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %destination.display(),
                    error = %cleanup_err,
                    "could not remove partial copy"
                );
            }
        }
        return Err(copy_failed(copy_err));
    }

    remove_entry(source).map_err(|e| RelocateError::RemoveSourceFailed {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: e,
    })
}

/// Copies a file, or a directory with everything below it, to `destination`.
///
/// `destination` must not exist yet. Returns the number of bytes copied.
pub fn copy_recursive(source: &Path, destination: &Path) -> io::Result<u64> {
    let meta = fs::symlink_metadata(source)?;
    if !meta.is_dir() {
        return fs::copy(source, destination);
    }

    fs::create_dir(destination)?;
    let mut total = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        total += copy_recursive(&entry.path(), &destination.join(entry.file_name()))?;
    }
    Ok(total)
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Sums the sizes of the regular files at or below `path`.
///
/// Entries that cannot be read are left out of the total.
fn measure(path: &Path) -> u64 {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        match entry.and_then(|e| e.metadata()) {
            Ok(meta) if meta.is_file() => total += meta.len(),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping entry while counting bytes");
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_creates_destination_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "test content").expect("Failed to write test file");
        let destination_dir = temp_dir.path().join("archive").join("2024").join("03");

        let done = FileRelocator::relocate(&file_path, &destination_dir, RelocationMode::Move)
            .expect("Failed to move file");

        assert!(destination_dir.is_dir());
        assert!(!file_path.exists());
        assert_eq!(done.destination, destination_dir.join("test.txt"));
        assert_eq!(done.kind, EntryKind::File);
        assert_eq!(done.bytes, 12);
        assert_eq!(fs::read_to_string(&done.destination).unwrap(), "test content");
    }

    #[test]
    fn test_move_resolves_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let destination_dir = temp_dir.path().join("dest");
        fs::create_dir(&destination_dir).unwrap();
        fs::write(destination_dir.join("report.txt"), "old").unwrap();

        let file_path = temp_dir.path().join("report.txt");
        fs::write(&file_path, "new").unwrap();

        let done = FileRelocator::relocate(&file_path, &destination_dir, RelocationMode::Move)
            .expect("Failed to move file");

        assert_eq!(done.destination, destination_dir.join("report copy.txt"));
        assert_eq!(fs::read_to_string(destination_dir.join("report.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(&done.destination).unwrap(), "new");
    }

    #[test]
    fn test_move_directory_as_unit() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source_dir = temp_dir.path().join("Notes");
        fs::create_dir_all(source_dir.join("inner")).unwrap();
        fs::write(source_dir.join("inner").join("a.md"), "abc").unwrap();

        let destination_dir = temp_dir.path().join("dest");
        fs::create_dir_all(destination_dir.join("Notes")).unwrap();

        let done = FileRelocator::relocate(&source_dir, &destination_dir, RelocationMode::Move)
            .expect("Failed to move directory");

        assert_eq!(done.kind, EntryKind::Directory);
        assert_eq!(done.bytes, 3);
        assert_eq!(done.destination, destination_dir.join("Notes copy"));
        assert!(done.destination.join("inner").join("a.md").is_file());
        assert!(!source_dir.exists());
    }

    #[test]
    fn test_copy_leaves_source_untouched() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source_dir = temp_dir.path().join("photos");
        fs::create_dir(&source_dir).unwrap();
        fs::write(source_dir.join("cat.jpg"), "meow").unwrap();
        let destination_dir = temp_dir.path().join("dest");

        let done = FileRelocator::relocate(&source_dir, &destination_dir, RelocationMode::Copy)
            .expect("Failed to copy directory");

        assert!(source_dir.join("cat.jpg").is_file());
        assert_eq!(fs::read_to_string(done.destination.join("cat.jpg")).unwrap(), "meow");
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = FileRelocator::relocate(
            &temp_dir.path().join("ghost.txt"),
            temp_dir.path(),
            RelocationMode::Move,
        );

        assert!(matches!(result, Err(RelocateError::Inspect { .. })));
    }

    #[test]
    fn test_source_without_file_name() {
        let result = FileRelocator::relocate(Path::new("/"), Path::new("/tmp"), RelocationMode::Copy);
        assert!(matches!(result, Err(RelocateError::NoFileName { .. })));
    }

    #[test]
    fn test_unusable_suffixed_name_is_reported() {
        // A 255 byte name is valid, but its " copy" variant is too long for
        // the filesystem, so the rename itself fails.
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let long_name = "n".repeat(255);
        let destination_dir = temp_dir.path().join("dest");
        fs::create_dir(&destination_dir).unwrap();
        fs::write(destination_dir.join(&long_name), "existing").unwrap();
        let file_path = temp_dir.path().join(&long_name);
        fs::write(&file_path, "incoming").unwrap();

        let result = FileRelocator::relocate(&file_path, &destination_dir, RelocationMode::Move);

        assert!(matches!(result, Err(RelocateError::MoveFailed { .. })));
        assert!(file_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_does_not_block_move() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project = temp_dir.path().join("proj");
        let locked = project.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(project.join("readme.txt"), "hello").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits do not apply to this user (root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let destination_dir = temp_dir.path().join("dest");

        let result = FileRelocator::relocate(&project, &destination_dir, RelocationMode::Move);

        let moved_locked = destination_dir.join("proj").join("locked");
        let restore = if moved_locked.exists() { &moved_locked } else { &locked };
        fs::set_permissions(restore, fs::Permissions::from_mode(0o755)).unwrap();

        let done = result.expect("Failed to move directory");
        assert!(!project.exists());
        assert!(moved_locked.is_dir());
        assert_eq!(done.bytes, 5);
    }

    #[test]
    fn test_copy_then_remove_moves_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("note.txt");
        fs::write(&source, "content").unwrap();
        let destination = temp_dir.path().join("note moved.txt");

        copy_then_remove(&source, &destination).expect("Failed to move file");

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "content");
    }

    #[test]
    fn test_copy_then_remove_moves_tree() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("Notes");
        fs::create_dir_all(source.join("inner").join("deeper")).unwrap();
        fs::write(source.join("top.md"), "top").unwrap();
        fs::write(source.join("inner").join("deeper").join("low.md"), "low").unwrap();
        let destination = temp_dir.path().join("elsewhere");

        copy_then_remove(&source, &destination).expect("Failed to move directory");

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(destination.join("top.md")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(destination.join("inner").join("deeper").join("low.md")).unwrap(),
            "low"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_leaves_no_partial_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("proj");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), "alpha").unwrap();
        // Copying follows the link, which points nowhere.
        std::os::unix::fs::symlink(temp_dir.path().join("nowhere"), source.join("broken")).unwrap();
        let destination = temp_dir.path().join("dest");

        let result = copy_then_remove(&source, &destination);

        assert!(matches!(result, Err(RelocateError::CopyFailed { .. })));
        assert!(!destination.exists());
        assert_eq!(fs::read_to_string(source.join("a.txt")).unwrap(), "alpha");
    }

    #[test]
    fn test_copy_then_remove_refuses_existing_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("a.txt");
        fs::write(&source, "new").unwrap();
        let destination = temp_dir.path().join("b.txt");
        fs::write(&destination, "old").unwrap();

        let result = copy_then_remove(&source, &destination);

        assert!(matches!(result, Err(RelocateError::CopyFailed { .. })));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "old");
        assert!(source.exists());
    }
}
