//! Command-line interface module for deskbroom.
//!
//! This module handles:
//! - Flag parsing
//! - Loading the configuration record and the settings file
//! - Dispatching to a cleanup pass, the destination change flow, or the menu
//! - First-run setup when no destination is configured

use crate::cleanup::CleanupEngine;
use crate::config::{Config, ConfigStore, JsonConfigStore};
use crate::filters::Settings;
use crate::output::OutputFormatter;
use crate::setup::DestinationValidator;
use crate::ui::{InteractiveApp, State};
use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Sweep the desktop into a dated archive.
#[derive(Debug, Parser)]
#[command(name = "deskbroom", version, about)]
pub struct Args {
    /// Run the cleanup even if it already ran today
    #[arg(short, long)]
    pub force: bool,

    /// Change the destination directory and move the existing archive there
    #[arg(short = 'c', long, conflicts_with_all = ["menu", "dry_run"])]
    pub change_dir: bool,

    /// Open the interactive menu
    #[arg(short, long, conflicts_with = "dry_run")]
    pub menu: bool,

    /// Show what a cleanup would move without moving anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Settings file with exclusion filters
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Location of the configuration record (default: ~/.deskbroom.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More diagnostics on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// What a single invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepCommand {
    /// One cleanup pass.
    Cleanup { forced: bool, dry_run: bool },
    /// Ask for a new destination and migrate the archive there.
    ChangeDestination,
    /// Interactive menu.
    Menu,
}

impl Args {
    pub fn sweep_command(&self) -> SweepCommand {
        if self.change_dir {
            SweepCommand::ChangeDestination
        } else if self.menu {
            SweepCommand::Menu
        } else {
            SweepCommand::Cleanup {
                forced: self.force,
                dry_run: self.dry_run,
            }
        }
    }
}

/// Runs one invocation.
///
/// Per-entry failures are reported but do not fail the invocation;
/// configuration errors and directory-level errors do.
pub fn run_cli(args: &Args) -> Result<()> {
    let store = match &args.config {
        Some(path) => JsonConfigStore::new(path),
        None => JsonConfigStore::in_home()?,
    };
    let mut config = store
        .load()
        .with_context(|| format!("Error loading configuration {}", store.path().display()))?;

    let filters = Settings::load(args.settings.as_deref())
        .and_then(Settings::compile)
        .context("Error loading settings")?;
    let engine = CleanupEngine::for_desktop()?.with_filters(filters);
    let validator = DestinationValidator::for_current_user()
        .context("could not determine the home directory")?;

    run_command(args.sweep_command(), &mut config, &store, &engine, validator)
}

/// Runs `command` against an already loaded configuration.
pub fn run_command(
    command: SweepCommand,
    config: &mut Config,
    store: &dyn ConfigStore,
    engine: &CleanupEngine,
    validator: DestinationValidator,
) -> Result<()> {
    match command {
        SweepCommand::Menu => {
            InteractiveApp::new(config, store, engine, validator).run(State::welcome())?;
        }
        SweepCommand::ChangeDestination => {
            InteractiveApp::new(config, store, engine, validator)
                .one_shot()
                .run(State::setup())?;
        }
        SweepCommand::Cleanup { forced, dry_run } => {
            if config.destination_root().is_none() {
                if dry_run {
                    bail!("no destination directory configured");
                }
                OutputFormatter::warning("No destination directory configured yet.");
                InteractiveApp::new(config, store, engine, validator)
                    .one_shot()
                    .run(State::setup())?;
                if config.destination_root().is_none() {
                    bail!("no destination directory configured");
                }
            }

            if dry_run {
                let plan = engine.plan(config, Local::now())?;
                OutputFormatter::dry_run_plan(&plan);
                return Ok(());
            }

            OutputFormatter::info(&format!(
                "Cleaning up {}",
                engine.source_dir().display()
            ));
            let outcome = engine.run(config, store, forced)?;
            OutputFormatter::cleanup_summary(&outcome, config.destination_root());
        }
    }
    Ok(())
}
