//! deskbroom - sweeps the desktop into a dated archive
//!
//! This library moves everything on the desktop into `root/YYYY/MM` once a
//! day without ever overwriting an existing entry, and can relocate the whole
//! archive to a new root with progress reporting.

pub mod archive_path;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod file_relocator;
pub mod filters;
pub mod logging;
pub mod migration;
pub mod output;
pub mod progress;
pub mod setup;
pub mod ui;

pub use archive_path::ArchivePathBuilder;
pub use cleanup::{CleanupEngine, CleanupError, CleanupOutcome, CleanupResult, RelocationItem};
pub use config::{Config, ConfigError, ConfigStore, JsonConfigStore};
pub use conflict::{ConflictResolver, EntryKind};
pub use file_relocator::{FileRelocator, RelocateError, Relocation, RelocationMode};
pub use filters::{CompiledFilters, FilterError, Settings};
pub use migration::{MigrationError, MigrationOutcome, TreeMigrator};
pub use progress::{MigrationProgress, ProgressSink};
pub use setup::{DestinationValidator, ValidationError};

pub use cli::{Args, SweepCommand, run_cli};
