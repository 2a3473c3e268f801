//! Output formatting and styling module.
//!
//! Every user-facing line goes through [`OutputFormatter`], so the look of
//! the tool can be changed in one place. Diagnostics for developers go through
//! `tracing` instead.

use crate::cleanup::{CleanupOutcome, CleanupResult, RelocationItem};
use crate::migration::MigrationOutcome;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use deskbroom::output::OutputFormatter;
    /// OutputFormatter::error("Could not read the desktop");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` items.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints what a cleanup pass did, successes first, then failures with
    /// their reasons.
    pub fn cleanup_summary(outcome: &CleanupOutcome, destination_dir: Option<&Path>) {
        let result = match outcome {
            CleanupOutcome::Skipped => {
                Self::info("Today's cleanup has already been performed. Use --force to run again.");
                return;
            }
            CleanupOutcome::Done(result) => result,
        };

        Self::header("CLEANUP SUMMARY");
        if let Some(dir) = destination_dir {
            Self::plain(&format!("Destination: {}", dir.display()));
        }

        if result.is_empty() {
            Self::plain("No files were processed.");
            return;
        }

        if !result.moved_files.is_empty() {
            Self::plain(&format!("{}", "Moved:".green().bold()));
            for path in &result.moved_files {
                Self::plain(&format!("  {} {}", "✓".green(), display_name(path)));
            }
        }

        if !result.failed_files.is_empty() {
            eprintln!("{}", "Failed:".red().bold());
            for (path, reason) in &result.failed_files {
                eprintln!("  {} {}: {}", "✗".red(), display_name(path), reason);
            }
        }

        if !result.excluded_files.is_empty() {
            Self::plain(&format!("{}", "Left in place:".yellow().bold()));
            for path in &result.excluded_files {
                Self::plain(&format!("  - {}", display_name(path)));
            }
        }

        Self::totals(result);
    }

    /// Prints the entries a cleanup pass would relocate.
    pub fn dry_run_plan(items: &[RelocationItem]) {
        Self::header("DRY RUN");
        if items.is_empty() {
            Self::plain("Nothing to move.");
            return;
        }
        for item in items {
            let suffix = if item.is_directory { "/" } else { "" };
            Self::plain(&format!(
                " - {}{} → {}",
                display_name(&item.source_path),
                suffix,
                item.proposed_destination_path.display()
            ));
        }
        println!(
            "{}",
            format!("[DRY RUN] {} entries would be moved. No files were modified.", items.len())
                .yellow()
        );
    }

    /// Prints the result of a destination change.
    pub fn migration_summary(outcome: &MigrationOutcome) {
        match outcome {
            MigrationOutcome::Initialized { root } => {
                Self::success(&format!("Destination directory set to {}", root.display()));
            }
            MigrationOutcome::Migrated { root, items } => {
                Self::success(&format!(
                    "Moved {} {} into {}",
                    items,
                    if *items == 1 { "item" } else { "items" },
                    root.display()
                ));
            }
        }
    }

    fn totals(result: &CleanupResult) {
        println!("{}", "-".repeat(32));
        println!(
            "{:<10} | {}",
            "Moved".bold(),
            result.moved_files.len().to_string().green()
        );
        println!(
            "{:<10} | {}",
            "Failed".bold(),
            result.failed_files.len().to_string().red()
        );
        println!("{:<10} | {} bytes", "Cleaned".bold(), result.bytes_moved);
    }

    fn plain(message: &str) {
        println!("{}", message);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
