//! Pass configuration.
//!
//! Loaded from a JSON object; every field is optional and falls back to the
//! documented default, so an empty `{}` is a valid configuration.

use crate::errors::{Result, SourceBlockError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Platform path-list separator used by `profile_files`.
#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsertionConfig {
    /// Inject source blocks even for methods without any profile.
    pub always_inject: bool,
    /// Always compute the serialized string, profiles or not.
    pub force_serialize: bool,
    /// Also emit source blocks after potentially-throwing instructions.
    pub insert_after_excs: bool,
    /// Profile file paths, one per interaction, separated by the platform
    /// path-list separator. Order defines the interaction index.
    pub profile_files: String,
    /// Preferred interaction-id order; listed ids are indexed first.
    pub ordered_interactions: Vec<String>,
    /// If positive, zero any val whose `appear100` falls below this.
    pub block_appear100_threshold: f32,
    /// Run the best-effort repair passes before finalizing.
    pub fix_violations: bool,
    /// Synthesize hot/cold vals from caller reachability for unprofiled
    /// interactions.
    pub enable_fuzzing: bool,
}

impl Default for InsertionConfig {
    fn default() -> Self {
        Self {
            always_inject: true,
            force_serialize: false,
            insert_after_excs: true,
            profile_files: String::new(),
            ordered_interactions: Vec::new(),
            block_appear100_threshold: 0.0,
            fix_violations: false,
            enable_fuzzing: false,
        }
    }
}

impl InsertionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SourceBlockError::config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.block_appear100_threshold) {
            return Err(SourceBlockError::config(format!(
                "block_appear100_threshold must be within [0, 100], got {}",
                self.block_appear100_threshold
            )));
        }
        Ok(())
    }

    /// `profile_files` split into paths; empty segments are skipped.
    pub fn profile_paths(&self) -> Vec<PathBuf> {
        self.profile_files
            .split(PATH_LIST_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}
