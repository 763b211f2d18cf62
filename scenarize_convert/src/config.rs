// scenarize_convert/src/config.rs

//! Dataset configuration loaded from TOML.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;

/// Per-dataset settings that are not derivable from the recording files
/// themselves.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Fallback sample interval in seconds, used when the recording does not
    /// state its frame rate.
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Maps a dataset-specific location id onto the key of a preloaded
    /// static scene. Unlisted ids are used as scene keys verbatim.
    #[serde(default)]
    pub locations: HashMap<String, String>,
}

fn default_dt() -> f64 {
    0.04
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            locations: HashMap::new(),
        }
    }
}

impl DatasetConfig {
    /// Load from a TOML file, or fall back to defaults when no file is
    /// given. A given-but-unreadable file is a configuration error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Figment::new()
                .merge(Toml::file(path))
                .extract()
                .with_context(|| format!("failed to load dataset config {}", path.display())),
            None => Ok(Self::default()),
        }
    }

    /// Resolve a raw location id to a scene key.
    pub fn scene_key(&self, location_id: &str) -> String {
        self.locations
            .get(location_id)
            .cloned()
            .unwrap_or_else(|| location_id.to_string())
    }
}
