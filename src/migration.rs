//! Moving the whole archive to a new root.
//!
//! The old tree is copied entry by entry into the new root, then deleted.
//! Copying instead of renaming works across volumes and leaves the old tree
//! intact when anything goes wrong: the old root is only removed after every
//! entry was copied.

use crate::config::{Config, ConfigError, ConfigStore};
use crate::conflict::{ConflictResolver, EntryKind};
use crate::progress::{ProgressSender, ProgressSink, with_progress};
use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("the new destination {} lies inside the current one {}", new_root.display(), old_root.display())]
    NestedRoot { old_root: PathBuf, new_root: PathBuf },

    #[error("error creating destination directory {}: {source}", path.display())]
    CreateRoot { path: PathBuf, source: io::Error },

    #[error("error scanning {}: {source}", path.display())]
    Scan { path: PathBuf, source: io::Error },

    #[error("error copying {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("error deleting old destination directory {}: {source}", path.display())]
    RemoveOld { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How a destination change ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing to move; the new root was simply recorded.
    Initialized { root: PathBuf },
    /// The old tree was copied into `root` and deleted.
    Migrated { root: PathBuf, items: u64 },
}

pub struct TreeMigrator;

impl TreeMigrator {
    /// Moves the archive from `config.destination_directory` to `new_root`
    /// and records `new_root` in `config`.
    ///
    /// `new_root` must already be validated (non-empty, not the home
    /// directory). When no archive is configured, or the configured one is
    /// `new_root` itself or no longer exists, nothing is copied.
    ///
    /// Progress events are delivered to `sink` from a separate thread.
    ///
    /// # Errors
    ///
    /// When copying or saving the configuration fails, the old tree is kept
    /// and `config` is left unchanged. The first copy failure is returned;
    /// entries already copied into `new_root` stay there. A failure to delete
    /// the old tree is reported after `new_root` has been recorded.
    pub fn migrate<S>(
        config: &mut Config,
        store: &dyn ConfigStore,
        new_root: &Path,
        sink: &mut S,
    ) -> Result<MigrationOutcome, MigrationError>
    where
        S: ProgressSink + Send + ?Sized,
    {
        let old_root = match config.destination_root() {
            Some(old) if old != new_root && old.exists() => old.to_path_buf(),
            Some(old) if old != new_root => {
                tracing::warn!(
                    old_root = %old.display(),
                    "configured destination no longer exists, nothing to migrate"
                );
                return Self::initialize(config, store, new_root);
            }
            _ => return Self::initialize(config, store, new_root),
        };

        if new_root.starts_with(&old_root) {
            return Err(MigrationError::NestedRoot {
                old_root,
                new_root: new_root.to_path_buf(),
            });
        }

        create_root(new_root)?;
        let items_total = count_entries(&old_root)?;

        tracing::info!(
            from = %old_root.display(),
            to = %new_root.display(),
            items_total,
            "migrating archive"
        );

        let copied = with_progress(sink, |progress| {
            progress.start(items_total);
            let copied = copy_tree(&old_root, new_root, progress);
            progress.finish(copied.is_ok());
            copied.map(|()| progress.progress().items_completed)
        })?;

        // Recorded before the old tree is deleted.
        Self::record_root(config, store, new_root)?;

        fs::remove_dir_all(&old_root).map_err(|e| MigrationError::RemoveOld {
            path: old_root.clone(),
            source: e,
        })?;

        tracing::info!(root = %new_root.display(), items = copied, "archive migrated");
        Ok(MigrationOutcome::Migrated {
            root: new_root.to_path_buf(),
            items: copied,
        })
    }

    fn initialize(
        config: &mut Config,
        store: &dyn ConfigStore,
        new_root: &Path,
    ) -> Result<MigrationOutcome, MigrationError> {
        create_root(new_root)?;
        Self::record_root(config, store, new_root)?;

        tracing::info!(root = %new_root.display(), "destination directory recorded");
        Ok(MigrationOutcome::Initialized {
            root: new_root.to_path_buf(),
        })
    }

    /// Points `config` at `new_root` and persists it. `config` is restored
    /// when the save fails.
    fn record_root(
        config: &mut Config,
        store: &dyn ConfigStore,
        new_root: &Path,
    ) -> Result<(), MigrationError> {
        let previous = std::mem::replace(&mut config.destination_directory, new_root.to_path_buf());
        if let Err(e) = store.save(config) {
            config.destination_directory = previous;
            return Err(e.into());
        }
        Ok(())
    }
}

fn create_root(root: &Path) -> Result<(), MigrationError> {
    fs::create_dir_all(root).map_err(|e| MigrationError::CreateRoot {
        path: root.to_path_buf(),
        source: e,
    })
}

/// Counts every file and directory below `root`.
fn count_entries(root: &Path) -> Result<u64, MigrationError> {
    let mut count = 0;
    for entry in WalkDir::new(root).min_depth(1) {
        entry.map_err(|e| MigrationError::Scan {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        count += 1;
    }
    Ok(count)
}

/// Depth-first copy of the children of `source_dir` into `destination_dir`.
fn copy_tree(
    source_dir: &Path,
    destination_dir: &Path,
    progress: &mut ProgressSender,
) -> Result<(), MigrationError> {
    let scan_error = |e| MigrationError::Scan {
        path: source_dir.to_path_buf(),
        source: e,
    };

    for entry in fs::read_dir(source_dir).map_err(scan_error)? {
        let entry = entry.map_err(scan_error)?;
        let source = entry.path();
        let file_type = entry.file_type().map_err(scan_error)?;
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let target = ConflictResolver::resolve(&destination_dir.join(entry.file_name()), kind);
        let copy_error = |e| MigrationError::Copy {
            from: source.clone(),
            to: target.clone(),
            source: e,
        };

        if kind == EntryKind::Directory {
            fs::create_dir(&target).map_err(copy_error)?;
            copy_tree(&source, &target, progress)?;
        } else {
            copy_file(&source, &target, file_type).map_err(copy_error)?;
        }

        tracing::trace!(from = %source.display(), to = %target.display(), "copied entry");
        progress.item_completed();
    }

    Ok(())
}

#[cfg(unix)]
fn copy_file(source: &Path, target: &Path, file_type: FileType) -> io::Result<()> {
    if file_type.is_symlink() {
        return std::os::unix::fs::symlink(fs::read_link(source)?, target);
    }
    fs::copy(source, target).map(|_| ())
}

#[cfg(not(unix))]
fn copy_file(source: &Path, target: &Path, _file_type: FileType) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfigStore;
    use crate::progress::tests::RecordingSink;
    use crate::progress::{MigrationProgress, NullSink, ProgressEvent};
    use tempfile::TempDir;

    fn store_in(temp_dir: &TempDir) -> JsonConfigStore {
        JsonConfigStore::new(temp_dir.path().join("config.json"))
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("2024").join("03").join("sub")).unwrap();
        fs::write(root.join("2024").join("03").join("a.txt"), "a").unwrap();
        fs::write(root.join("2024").join("03").join("sub").join("b.txt"), "b").unwrap();
        fs::write(root.join("loose.md"), "loose").unwrap();
    }

    #[test]
    fn test_first_time_setup_copies_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let new_root = temp_dir.path().join("archive");
        let mut config = Config::default();
        let mut sink = RecordingSink::default();

        let outcome = TreeMigrator::migrate(&mut config, &store, &new_root, &mut sink).unwrap();

        assert_eq!(outcome, MigrationOutcome::Initialized { root: new_root.clone() });
        assert!(new_root.is_dir());
        assert!(sink.events.is_empty());
        assert_eq!(config.destination_root(), Some(new_root.as_path()));
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_same_root_is_noop() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let root = temp_dir.path().join("archive");
        populate(&root);
        let mut config = Config {
            destination_directory: root.clone(),
            last_cleanup_date: None,
        };

        let outcome = TreeMigrator::migrate(&mut config, &store, &root, &mut NullSink).unwrap();

        assert!(matches!(outcome, MigrationOutcome::Initialized { .. }));
        assert!(root.join("loose.md").is_file());
    }

    #[test]
    fn test_migrates_tree_and_deletes_old_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("new");
        populate(&old_root);
        let mut config = Config {
            destination_directory: old_root.clone(),
            last_cleanup_date: None,
        };
        let mut sink = RecordingSink::default();

        let outcome = TreeMigrator::migrate(&mut config, &store, &new_root, &mut sink).unwrap();

        // 2024, 03, sub, a.txt, b.txt, loose.md
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                root: new_root.clone(),
                items: 6
            }
        );
        assert!(!old_root.exists());
        assert_eq!(
            fs::read_to_string(new_root.join("2024/03/sub/b.txt")).unwrap(),
            "b"
        );
        assert!(new_root.join("loose.md").is_file());
        assert_eq!(store.load().unwrap().destination_root(), Some(new_root.as_path()));

        assert_eq!(sink.events.first(), Some(&ProgressEvent::Started { items_total: 6 }));
        assert_eq!(
            sink.events[sink.events.len() - 2],
            ProgressEvent::Advanced(MigrationProgress {
                items_total: 6,
                items_completed: 6
            })
        );
        assert_eq!(sink.events.last(), Some(&ProgressEvent::Finished { succeeded: true }));
    }

    #[test]
    fn test_existing_entries_in_new_root_are_kept() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("new");
        populate(&old_root);
        fs::create_dir_all(&new_root).unwrap();
        fs::write(new_root.join("loose.md"), "already here").unwrap();
        let mut config = Config {
            destination_directory: old_root.clone(),
            last_cleanup_date: None,
        };

        TreeMigrator::migrate(&mut config, &store, &new_root, &mut NullSink).unwrap();

        assert_eq!(fs::read_to_string(new_root.join("loose.md")).unwrap(), "already here");
        assert_eq!(fs::read_to_string(new_root.join("loose copy.md")).unwrap(), "loose");
    }

    #[test]
    fn test_copy_failure_keeps_old_root_and_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("new");
        populate(&old_root);

        // The suffixed name for this entry exceeds the filesystem limit.
        let long_name = "n".repeat(255);
        fs::write(old_root.join(&long_name), "data").unwrap();
        fs::create_dir_all(&new_root).unwrap();
        fs::write(new_root.join(&long_name), "existing").unwrap();

        let mut config = Config {
            destination_directory: old_root.clone(),
            last_cleanup_date: None,
        };
        let before = config.clone();
        let mut sink = RecordingSink::default();

        let result = TreeMigrator::migrate(&mut config, &store, &new_root, &mut sink);

        assert!(matches!(result, Err(MigrationError::Copy { .. })));
        assert_eq!(config, before);
        assert!(old_root.join(&long_name).is_file());
        assert!(old_root.join("2024/03/sub/b.txt").is_file());
        assert!(old_root.join("loose.md").is_file());
        assert_eq!(store.load().unwrap(), Config::default());
        assert_eq!(sink.events.last(), Some(&ProgressEvent::Finished { succeeded: false }));
    }

    #[test]
    fn test_save_failure_keeps_old_root_and_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = JsonConfigStore::new(temp_dir.path().join("missing").join("config.json"));
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("new");
        populate(&old_root);
        let mut config = Config {
            destination_directory: old_root.clone(),
            last_cleanup_date: None,
        };
        let before = config.clone();

        let result = TreeMigrator::migrate(&mut config, &store, &new_root, &mut NullSink);

        assert!(matches!(result, Err(MigrationError::Config(_))));
        assert_eq!(config, before);
        assert!(old_root.join("2024/03/a.txt").is_file());
        assert!(old_root.join("loose.md").is_file());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_failure_on_first_setup_restores_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = JsonConfigStore::new(temp_dir.path().join("missing").join("config.json"));
        let mut config = Config::default();

        let result = TreeMigrator::migrate(
            &mut config,
            &store,
            &temp_dir.path().join("archive"),
            &mut NullSink,
        );

        assert!(matches!(result, Err(MigrationError::Config(_))));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_new_root_inside_old_root_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let old_root = temp_dir.path().join("old");
        populate(&old_root);
        let mut config = Config {
            destination_directory: old_root.clone(),
            last_cleanup_date: None,
        };

        let result =
            TreeMigrator::migrate(&mut config, &store, &old_root.join("nested"), &mut NullSink);

        assert!(matches!(result, Err(MigrationError::NestedRoot { .. })));
        assert!(old_root.join("loose.md").is_file());
        assert!(!old_root.join("nested").exists());
    }

    #[test]
    fn test_vanished_old_root_is_treated_as_setup() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = store_in(&temp_dir);
        let new_root = temp_dir.path().join("new");
        let mut config = Config {
            destination_directory: temp_dir.path().join("gone"),
            last_cleanup_date: None,
        };

        let outcome = TreeMigrator::migrate(&mut config, &store, &new_root, &mut NullSink).unwrap();

        assert!(matches!(outcome, MigrationOutcome::Initialized { .. }));
        assert_eq!(config.destination_root(), Some(new_root.as_path()));
    }
}
