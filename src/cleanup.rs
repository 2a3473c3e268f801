//! Cleanup pass over the source directory.
//!
//! A pass moves every direct child of the source directory into
//! `root/YYYY/MM`. Subdirectories travel as whole units. One pass runs per
//! calendar day unless forced:
//!
//! ```text
//! Idle ──run──▶ Running ──▶ Completed(Done)
//!   └──already ran today──▶ Completed(Skipped)
//! ```

use crate::archive_path::ArchivePathBuilder;
use crate::config::{Config, ConfigError, ConfigStore};
use crate::file_relocator::{FileRelocator, RelocationMode};
use crate::filters::CompiledFilters;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the watched directory inside the home directory.
pub const SOURCE_DIR_NAME: &str = "Desktop";

/// Failures that stop a pass before any entry is touched.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("no destination directory configured")]
    DestinationUnset,

    #[error("could not determine the home directory")]
    NoHomeDirectory,

    #[error("error reading directory {}: {source}", path.display())]
    ReadSource { path: PathBuf, source: io::Error },

    #[error("error creating destination directory {}: {source}", path.display())]
    CreateDestination { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One source entry and where it is headed, before collision resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationItem {
    pub source_path: PathBuf,
    pub proposed_destination_path: PathBuf,
    pub is_directory: bool,
}

/// What a completed pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    /// Sources that were moved, in processing order.
    pub moved_files: Vec<PathBuf>,
    /// Sources that could not be moved, with the reason.
    pub failed_files: Vec<(PathBuf, String)>,
    /// Sources left in place by the filters.
    pub excluded_files: Vec<PathBuf>,
    /// Size of the regular files moved.
    pub bytes_moved: u64,
}

impl CleanupResult {
    /// True when nothing was moved, failed or excluded.
    pub fn is_empty(&self) -> bool {
        self.moved_files.is_empty() && self.failed_files.is_empty() && self.excluded_files.is_empty()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_files.is_empty()
    }

    /// Number of entries a relocation was attempted for.
    pub fn total_attempted(&self) -> usize {
        self.moved_files.len() + self.failed_files.len()
    }
}

/// Terminal state of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// A pass already completed today and the run was not forced.
    Skipped,
    Done(CleanupResult),
}

impl CleanupOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CleanupOutcome::Skipped)
    }

    /// The pass result; empty for a skipped pass.
    pub fn into_result(self) -> CleanupResult {
        match self {
            CleanupOutcome::Skipped => CleanupResult::default(),
            CleanupOutcome::Done(result) => result,
        }
    }
}

/// Runs cleanup passes over one source directory.
#[derive(Debug)]
pub struct CleanupEngine {
    source_dir: PathBuf,
    filters: CompiledFilters,
}

impl CleanupEngine {
    /// Creates an engine for `source_dir` that relocates every entry.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            filters: CompiledFilters::default(),
        }
    }

    /// Creates an engine for `~/Desktop`.
    pub fn for_desktop() -> Result<Self, CleanupError> {
        let home = dirs::home_dir().ok_or(CleanupError::NoHomeDirectory)?;
        Ok(Self::new(home.join(SOURCE_DIR_NAME)))
    }

    /// Leaves entries rejected by `filters` in place.
    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Runs a pass at the current local time.
    ///
    /// See [`CleanupEngine::run_at`].
    pub fn run(
        &self,
        config: &mut Config,
        store: &dyn ConfigStore,
        forced: bool,
    ) -> Result<CleanupOutcome, CleanupError> {
        self.run_at(config, store, forced, Local::now())
    }

    /// Runs a pass as if the time were `now`.
    ///
    /// Unless `forced`, a pass is skipped when the last one completed on the
    /// same local calendar day. Per-entry failures are collected in the
    /// result; the pass still completes, stamps `last_cleanup_date` and
    /// persists `config` through `store`.
    ///
    /// # Errors
    ///
    /// Returns an error, without touching any entry, when the destination is
    /// unset, the source directory cannot be read or the destination
    /// directory cannot be created. Saving the configuration can fail after
    /// the entries were moved.
    pub fn run_at(
        &self,
        config: &mut Config,
        store: &dyn ConfigStore,
        forced: bool,
        now: DateTime<Local>,
    ) -> Result<CleanupOutcome, CleanupError> {
        if !forced && config.last_cleanup_day() == Some(now.date_naive()) {
            tracing::info!("cleanup already performed today, skipping");
            return Ok(CleanupOutcome::Skipped);
        }

        let (items, excluded) = self.enumerate(config, &now)?;
        let destination_dir = self.destination_dir(config, &now)?;

        fs::create_dir_all(&destination_dir).map_err(|e| CleanupError::CreateDestination {
            path: destination_dir.clone(),
            source: e,
        })?;

        tracing::info!(
            source = %self.source_dir.display(),
            destination = %destination_dir.display(),
            entries = items.len(),
            "starting cleanup pass"
        );

        let mut result = CleanupResult {
            excluded_files: excluded,
            ..Default::default()
        };

        for item in items {
            match FileRelocator::relocate(&item.source_path, &destination_dir, RelocationMode::Move)
            {
                Ok(relocation) => {
                    result.bytes_moved += relocation.bytes;
                    result.moved_files.push(item.source_path);
                }
                Err(e) => {
                    tracing::warn!(path = %item.source_path.display(), error = %e, "could not move entry");
                    result.failed_files.push((item.source_path, e.to_string()));
                }
            }
        }

        config.stamp_cleanup(now);
        store.save(config)?;

        tracing::info!(
            moved = result.moved_files.len(),
            failed = result.failed_files.len(),
            excluded = result.excluded_files.len(),
            bytes = result.bytes_moved,
            "cleanup pass completed"
        );

        Ok(CleanupOutcome::Done(result))
    }

    /// Lists what a pass at `now` would relocate, without touching anything.
    pub fn plan(
        &self,
        config: &Config,
        now: DateTime<Local>,
    ) -> Result<Vec<RelocationItem>, CleanupError> {
        self.enumerate(config, &now).map(|(items, _)| items)
    }

    fn destination_dir(&self, config: &Config, now: &DateTime<Local>) -> Result<PathBuf, CleanupError> {
        let root = config.destination_root().ok_or(CleanupError::DestinationUnset)?;
        Ok(ArchivePathBuilder::build_destination_dir(root, now))
    }

    /// Snapshots the direct children of the source directory, split into
    /// entries to relocate and entries to leave alone.
    fn enumerate(
        &self,
        config: &Config,
        now: &DateTime<Local>,
    ) -> Result<(Vec<RelocationItem>, Vec<PathBuf>), CleanupError> {
        let destination_dir = self.destination_dir(config, now)?;

        let read_error = |e| CleanupError::ReadSource {
            path: self.source_dir.clone(),
            source: e,
        };

        let mut items = Vec::new();
        let mut excluded = Vec::new();
        for entry in fs::read_dir(&self.source_dir).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            let path = entry.path();

            // An archive living inside the source directory must not be
            // moved into itself.
            if destination_dir.starts_with(&path) || !self.filters.should_include(&path) {
                tracing::debug!(path = %path.display(), "leaving entry in place");
                excluded.push(path);
                continue;
            }

            let is_directory = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            items.push(RelocationItem {
                proposed_destination_path: destination_dir.join(entry.file_name()),
                source_path: path,
                is_directory,
            });
        }

        Ok((items, excluded))
    }
}
