//! Interactive menu.
//!
//! The screen flow is a state machine. [`transition`] is pure: it maps the
//! current [`State`] and an incoming [`Message`] to the next state and, when
//! work is needed, a [`Command`]. [`InteractiveApp`] renders states with
//! terminal prompts, executes commands and feeds their results back as
//! messages.
//!
//! ```text
//! Welcome ──Setup/Relocate──▶ Setup ──valid path──▶ Migrating ──▶ Summary
//!    │  ▲                       │ ▲                     │            │
//!    │  └────────cancel─────────┘ └──────failure────────┘            │
//!    ├──Clean up──▶ (cleanup runs) ──────────────────────────────────▶│
//!    ▲                                                               │
//!    └────────────────────────────back───────────────────────────────┘
//! ```

use crate::cleanup::{CleanupEngine, CleanupOutcome};
use crate::config::{Config, ConfigStore};
use crate::migration::{MigrationOutcome, TreeMigrator};
use crate::output::OutputFormatter;
use crate::progress::ProgressBarSink;
use crate::setup::{DestinationValidator, ValidationError};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;
use thiserror::Error;

/// Entries of the main menu, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Setup,
    Relocate,
    CleanUp,
    Quit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 4] = [
        MenuChoice::Setup,
        MenuChoice::Relocate,
        MenuChoice::CleanUp,
        MenuChoice::Quit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuChoice::Setup => "Setup - set up the destination directory",
            MenuChoice::Relocate => "Relocate - move the archive to a new location",
            MenuChoice::CleanUp => "Clean up - move desktop files to the archive",
            MenuChoice::Quit => "Quit",
        }
    }
}

/// What the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Main menu, optionally with a message from the last action.
    Welcome { notice: Option<String> },
    /// Asking for a destination root; `error` explains the last rejection.
    Setup { error: Option<String> },
    /// Copying the archive to `target`.
    Migrating { target: PathBuf },
    Summary(Summary),
    Exit,
}

impl State {
    pub fn welcome() -> Self {
        State::Welcome { notice: None }
    }

    pub fn setup() -> Self {
        State::Setup { error: None }
    }
}

/// Result screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Cleanup(CleanupOutcome),
    Migration(MigrationOutcome),
}

/// Inputs to the state machine, from the user or from finished commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Choose(MenuChoice),
    DestinationSubmitted(PathBuf),
    DestinationInvalid(ValidationError),
    Cancel,
    CleanupFinished(Result<CleanupOutcome, String>),
    MigrationFinished(Result<MigrationOutcome, String>),
    Back,
    Quit,
}

/// Work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Menu-triggered cleanups always run, even if one ran today.
    RunCleanup,
    Migrate(PathBuf),
}

/// Computes the next state. Messages that make no sense in the current
/// state leave it unchanged.
pub fn transition(state: State, message: Message) -> (State, Option<Command>) {
    match (state, message) {
        (_, Message::Quit) => (State::Exit, None),

        (State::Welcome { .. }, Message::Choose(choice)) => match choice {
            MenuChoice::Setup | MenuChoice::Relocate => (State::setup(), None),
            MenuChoice::CleanUp => (State::welcome(), Some(Command::RunCleanup)),
            MenuChoice::Quit => (State::Exit, None),
        },
        (State::Welcome { .. }, Message::CleanupFinished(Ok(outcome))) => {
            (State::Summary(Summary::Cleanup(outcome)), None)
        }
        (State::Welcome { .. }, Message::CleanupFinished(Err(reason))) => (
            State::Welcome {
                notice: Some(format!("Cleanup failed: {reason}")),
            },
            None,
        ),

        (State::Setup { .. }, Message::DestinationSubmitted(target)) => (
            State::Migrating {
                target: target.clone(),
            },
            Some(Command::Migrate(target)),
        ),
        (State::Setup { .. }, Message::DestinationInvalid(error)) => (
            State::Setup {
                error: Some(error.to_string()),
            },
            None,
        ),
        (State::Setup { .. }, Message::Cancel) => (State::welcome(), None),

        (State::Migrating { .. }, Message::MigrationFinished(Ok(outcome))) => {
            (State::Summary(Summary::Migration(outcome)), None)
        }
        (State::Migrating { .. }, Message::MigrationFinished(Err(reason))) => {
            (State::Setup { error: Some(reason) }, None)
        }

        (State::Summary(_), Message::Back) => (State::welcome(), None),

        (state, message) => {
            tracing::trace!(?state, ?message, "ignoring message");
            (state, None)
        }
    }
}

#[derive(Debug, Error)]
pub enum UiError {
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Drives the state machine with terminal prompts.
pub struct InteractiveApp<'a> {
    config: &'a mut Config,
    store: &'a dyn ConfigStore,
    engine: &'a CleanupEngine,
    validator: DestinationValidator,
    one_shot: bool,
}

impl<'a> InteractiveApp<'a> {
    pub fn new(
        config: &'a mut Config,
        store: &'a dyn ConfigStore,
        engine: &'a CleanupEngine,
        validator: DestinationValidator,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            validator,
            one_shot: false,
        }
    }

    /// Stop after the first summary, or when the user backs out to the menu.
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Runs until the user quits.
    pub fn run(mut self, initial: State) -> Result<(), UiError> {
        let mut state = initial;
        loop {
            if self.one_shot {
                match &state {
                    State::Summary(summary) => {
                        render_summary(summary, self.config);
                        return Ok(());
                    }
                    State::Welcome { notice } => {
                        if let Some(notice) = notice {
                            OutputFormatter::error(notice);
                        }
                        return Ok(());
                    }
                    _ => {}
                }
            }

            let message = match &state {
                State::Exit => {
                    OutputFormatter::info("Thanks for using deskbroom! Goodbye.");
                    return Ok(());
                }
                State::Welcome { notice } => self.prompt_menu(notice.as_deref())?,
                State::Setup { error } => self.prompt_destination(error.as_deref())?,
                State::Migrating { target } => {
                    // Only reached if a transition forgot its command.
                    Message::MigrationFinished(Err(format!(
                        "migration to {} was not started",
                        target.display()
                    )))
                }
                State::Summary(summary) => {
                    render_summary(summary, self.config);
                    self.prompt_after_summary()?
                }
            };

            let (next, mut command) = transition(state, message);
            state = next;
            while let Some(cmd) = command.take() {
                let message = self.execute(cmd);
                let (next, follow_up) = transition(state, message);
                state = next;
                command = follow_up;
            }
        }
    }

    fn execute(&mut self, command: Command) -> Message {
        match command {
            Command::RunCleanup => {
                let result = self
                    .engine
                    .run(self.config, self.store, true)
                    .map_err(|e| e.to_string());
                Message::CleanupFinished(result)
            }
            Command::Migrate(target) => {
                OutputFormatter::info(&format!("Moving archive to {}", target.display()));
                let result =
                    TreeMigrator::migrate(self.config, self.store, &target, &mut ProgressBarSink::default())
                        .map_err(|e| e.to_string());
                Message::MigrationFinished(result)
            }
        }
    }

    fn prompt_menu(&self, notice: Option<&str>) -> Result<Message, UiError> {
        if let Some(notice) = notice {
            OutputFormatter::error(notice);
        }
        OutputFormatter::header("deskbroom - keeps your desktop tidy");
        match self.config.destination_root() {
            Some(root) => OutputFormatter::info(&format!("Archive: {}", root.display())),
            None => OutputFormatter::warning("No destination directory set up yet."),
        }

        let labels: Vec<&str> = MenuChoice::ALL.iter().map(|c| c.label()).collect();
        let selection = Select::with_theme(&ColorfulTheme::default())
            .items(&labels)
            .default(0)
            .interact_opt()?;

        Ok(match selection {
            Some(index) => Message::Choose(MenuChoice::ALL[index]),
            None => Message::Quit,
        })
    }

    fn prompt_destination(&self, error: Option<&str>) -> Result<Message, UiError> {
        if let Some(error) = error {
            OutputFormatter::warning(error);
            let retry = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Try another destination?")
                .default(true)
                .interact()?;
            if !retry {
                return Ok(Message::Cancel);
            }
        }

        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt("Destination directory")
            .allow_empty(true);
        if let Some(root) = self.config.destination_root() {
            input = input.with_initial_text(root.display().to_string());
        }
        let raw = input.interact_text()?;

        Ok(match self.validator.validate(&raw) {
            Ok(path) => Message::DestinationSubmitted(path),
            Err(e) => Message::DestinationInvalid(e),
        })
    }

    fn prompt_after_summary(&self) -> Result<Message, UiError> {
        let selection = Select::with_theme(&ColorfulTheme::default())
            .items(&["Back to menu", "Quit"][..])
            .default(0)
            .interact_opt()?;
        Ok(match selection {
            Some(0) => Message::Back,
            _ => Message::Quit,
        })
    }
}

fn render_summary(summary: &Summary, config: &Config) {
    match summary {
        Summary::Cleanup(outcome) => {
            OutputFormatter::cleanup_summary(outcome, config.destination_root())
        }
        Summary::Migration(outcome) => OutputFormatter::migration_summary(outcome),
    }
}
