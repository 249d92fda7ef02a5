//! Engine configuration.
//!
//! Loading and saving of correlation-engine settings from a TOML file.
//! All fields have defaults, so a missing or partial file is fine.
//!
//! # Example Configuration
//!
//! ```toml
//! invalid_version_policy = "skip"
//! reeval_batch_size = 500
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What to do when a version string cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidVersionPolicy {
    /// Log a warning and treat the pair as "cannot determine unsafe":
    /// no problem is created. Biases toward false negatives over
    /// false problem noise.
    Skip,
    /// Propagate the error to the caller of the triggering event.
    Error,
}

/// Correlation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Handling of malformed version strings during comparison.
    ///
    /// Default: `skip`
    pub invalid_version_policy: InvalidVersionPolicy,

    /// How many installed packages an advisory publication
    /// re-evaluates per batch. Bounds lock hold times when an advisory
    /// touches many hosts at once.
    ///
    /// Default: 500
    pub reeval_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            invalid_version_policy: InvalidVersionPolicy::Skip,
            reeval_batch_size: 500,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration as TOML.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
