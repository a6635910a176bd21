//! Run configuration loading from JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::settings::FitSettings;

/// Top-level run configuration: fit settings plus an optional result sink.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub settings: FitSettings,
    /// Where to write the merged trajectories as JSON, if anywhere.
    #[serde(default)]
    pub output_json: Option<PathBuf>,
}

/// Parse a [`RunConfig`] from a JSON string.
pub fn parse_config(contents: &str) -> Result<RunConfig, String> {
    serde_json::from_str(contents).map_err(|e| format!("Failed to parse config: {e}"))
}

/// Load a [`RunConfig`] from a JSON file.
pub fn load_config(path: &Path) -> Result<RunConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    parse_config(&contents)
}
