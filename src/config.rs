//! Decode options.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Options accepted by the decode dispatcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DecodeOptions {
    /// Replace falsy fields (absent, zero, empty string) with their schema
    /// default before transforming.
    #[serde(alias = "display-defaults")]
    pub apply_defaults: bool,
}

impl DecodeOptions {
    pub fn with_defaults(apply_defaults: bool) -> Self {
        Self { apply_defaults }
    }

    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse decode options in {}", path.display()))
    }
}
