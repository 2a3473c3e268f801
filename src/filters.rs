//! Exclusion rules for the source directory.
//!
//! Some desktop entries should never be swept away (Finder metadata, files
//! still downloading). The rules live in an optional TOML settings file:
//!
//! ```toml
//! [filters]
//! skip_hidden = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", ".localized"]
//! patterns = ["*.crdownload"]
//! extensions = ["part"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! The defaults exclude nothing. Rules are matched against the entry's file
//! name, since only direct children of the source directory are considered.

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while loading or compiling the settings file.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading settings: {0}")]
    Io(String),
}

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub filters: FilterRules,
}

/// Which source entries are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Leave entries whose name starts with "." in place.
    #[serde(default)]
    pub skip_hidden: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Include rules win over every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact names, e.g. ".DS_Store".
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns, e.g. "*.crdownload".
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions without the dot, compared case-insensitively.
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Settings {
    /// Loads settings, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `settings_path`, when given (must exist)
    /// 2. `~/.config/deskbroom/config.toml`
    /// 3. defaults
    pub fn load(settings_path: Option<&Path>) -> Result<Self, FilterError> {
        if let Some(path) = settings_path {
            return Self::load_from_file(path);
        }

        if let Some(home) = dirs::home_dir() {
            let home_settings = home.join(".config").join("deskbroom").join("config.toml");
            if home_settings.exists() {
                return Self::load_from_file(&home_settings);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, FilterError> {
        if !path.exists() {
            return Err(FilterError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| FilterError::Io(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loaded settings");

        toml::from_str(&content).map_err(|e| FilterError::Invalid(e.to_string()))
    }

    /// Compiles the rules into matchers.
    pub fn compile(self) -> Result<CompiledFilters, FilterError> {
        CompiledFilters::new(self.filters)
    }
}

/// Pre-compiled rules, ready to test entries against.
#[derive(Debug, Default)]
pub struct CompiledFilters {
    skip_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: FilterRules) -> Result<Self, FilterError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| FilterError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            skip_hidden: rules.skip_hidden,
            exclude_filenames: rules.exclude.filenames.into_iter().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Returns true when the entry at `path` should be relocated.
    ///
    /// Checked in order: include patterns, hidden entries, exact names,
    /// extensions, glob patterns, regexes.
    pub fn should_include(&self, path: &Path) -> bool {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.include_patterns.iter().any(|p| p.matches(&file_name)) {
            return true;
        }

        if self.skip_hidden && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.exclude_patterns.iter().any(|p| p.matches(&file_name)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|r| r.is_match(&file_name))
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, FilterError> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|_| FilterError::InvalidGlobPattern(p.clone())))
        .collect()
}
