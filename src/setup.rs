/// Destination directory validation.
///
/// User input is trimmed, `~` and relative paths are expanded under the home
/// directory, and roots that would sweep the archive into the home directory
/// itself are refused before anything on disk changes.
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the destination directory cannot be empty")]
    Empty,

    #[error("the destination directory cannot be the home directory")]
    HomeDirectory,
}

/// Validates destination roots against a home directory.
#[derive(Debug, Clone)]
pub struct DestinationValidator {
    home: PathBuf,
}

impl DestinationValidator {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Uses the current user's home directory.
    pub fn for_current_user() -> Option<Self> {
        dirs::home_dir().map(Self::new)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Turns raw input into an absolute destination root.
    ///
    /// # Examples
    ///
    /// ```
    /// use deskbroom::setup::{DestinationValidator, ValidationError};
    /// use std::path::Path;
    ///
    /// let validator = DestinationValidator::new("/home/me");
    /// assert_eq!(validator.validate("~/Archive").unwrap(), Path::new("/home/me/Archive"));
    /// assert_eq!(validator.validate("  "), Err(ValidationError::Empty));
    /// assert_eq!(validator.validate("/home/me"), Err(ValidationError::HomeDirectory));
    /// ```
    pub fn validate(&self, input: &str) -> Result<PathBuf, ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::Empty);
        }

        let expanded = normalize(&self.expand(input));
        if expanded == normalize(&self.home) {
            return Err(ValidationError::HomeDirectory);
        }
        Ok(expanded)
    }

    fn expand(&self, input: &str) -> PathBuf {
        if let Some(rest) = input.strip_prefix('~') {
            return self.home.join(rest.trim_start_matches(['/', '\\']));
        }
        let path = Path::new(input);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }
}

/// Drops `.` components and resolves `..` lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
