//! Configuration types for transfer-lifecycle
//!
//! Loading configuration (files, flags, environment) is the embedding
//! application's job; this module only defines the shape and its defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Suffix the engine appends to a file while it is still being written
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";

/// Observer configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Replace the file extension with the one detected from the content (default: false)
    #[serde(default)]
    pub rewrite_ext: bool,

    /// Reserved suffix marking a file as in progress (default: ".tmp")
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rewrite_ext: false,
            temp_suffix: default_temp_suffix(),
        }
    }
}

impl Config {
    /// Check that the configuration can be used to finalize files
    pub fn validate(&self) -> Result<()> {
        if self.temp_suffix.is_empty() {
            return Err(Error::Config {
                message: "temporary file suffix must not be empty".to_string(),
                key: Some("temp_suffix".to_string()),
            });
        }

        if self.temp_suffix.contains(['/', '\\']) {
            return Err(Error::Config {
                message: format!(
                    "temporary file suffix {:?} must not contain a path separator",
                    self.temp_suffix
                ),
                key: Some("temp_suffix".to_string()),
            });
        }

        Ok(())
    }
}

fn default_temp_suffix() -> String {
    DEFAULT_TEMP_SUFFIX.to_string()
}
