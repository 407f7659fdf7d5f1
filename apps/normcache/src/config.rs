//! # Configuration
//!
//! Optional TOML file holding defaults for the read commands.
//!
//! ```toml
//! [read]
//! return_partial_data = true
//! root_id = "ROOT_QUERY"
//!
//! [possible_types]
//! Character = ["Human", "Droid"]
//! ```
//!
//! Every field is optional. Command-line flags take precedence over the file.

use normcache_core::{CacheError, PossibleTypes, ReadOptions};
use serde::Deserialize;
use std::path::Path;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "normcache.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Parsed `normcache.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `[read]` section.
    pub read: ReadSection,
    /// `[possible_types]` section: abstract type -> concrete types.
    pub possible_types: PossibleTypes,
}

/// Defaults applied to `read` and `diff`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadSection {
    pub return_partial_data: Option<bool>,
    pub root_id: Option<String>,
}

impl Config {
    /// Parse config text.
    pub fn from_toml_str(text: &str) -> Result<Self, CacheError> {
        toml::from_str(text)
            .map_err(|e| CacheError::Serialization(format!("Invalid config file: {}", e)))
    }

    /// Load the config for this invocation.
    ///
    /// An explicit path must exist. Without one, `normcache.toml` in the
    /// working directory is used if present, otherwise all defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CacheError> {
        let path = match explicit {
            Some(path) => path,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    tracing::debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            CacheError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(CacheError::Serialization(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Build read options, preferring command-line values over the file.
    ///
    /// `return_partial_data` stays unset when neither source sets it, so
    /// each entry point keeps its own default.
    #[must_use]
    pub fn read_options(
        &self,
        return_partial_data: Option<bool>,
        root_id: Option<String>,
    ) -> ReadOptions {
        ReadOptions {
            return_partial_data: return_partial_data.or(self.read.return_partial_data),
            root_id: root_id.or_else(|| self.read.root_id.clone()),
            possible_types: self.possible_types.clone(),
        }
    }
}
