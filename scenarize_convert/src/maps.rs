// scenarize_convert/src/maps.rs

//! Preloaded static scene assets.
//!
//! Scenes are JSON files, one per location, produced by whatever map tooling
//! the dataset ships with. Loading happens once at startup so lookups during
//! the run are O(1); a missing or malformed asset aborts before any job is
//! produced.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use scenarize_core::scene::{StaticScene, StaticSceneProvider};
use tracing::info;
use walkdir::WalkDir;

pub struct MapStore {
    scenes: HashMap<String, Arc<StaticScene>>,
}

impl MapStore {
    /// Load every `*.json` scene under `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Self> {
        if !dir.is_dir() {
            bail!("maps directory {} does not exist", dir.display());
        }
        let mut scenes = HashMap::new();
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                !e.file_type().is_dir()
                    && e.path().extension().map_or(false, |ext| ext == "json")
            })
        {
            let path = entry.path();
            let key = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file = File::open(path)
                .with_context(|| format!("failed to open scene asset {}", path.display()))?;
            let scene: StaticScene = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse scene asset {}", path.display()))?;
            if scenes.insert(key.clone(), Arc::new(scene)).is_some() {
                bail!("duplicate scene key `{key}` under {}", dir.display());
            }
            info!(key = %key, "loaded static scene");
        }
        if scenes.is_empty() {
            bail!("no scene assets found under {}", dir.display());
        }
        Ok(Self { scenes })
    }

    pub fn from_scenes(scenes: HashMap<String, Arc<StaticScene>>) -> Self {
        Self { scenes }
    }
}

impl StaticSceneProvider for MapStore {
    fn lookup(&self, location: &str) -> Option<Arc<StaticScene>> {
        self.scenes.get(location).cloned()
    }

    fn locations(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.scenes.keys().cloned().collect();
        keys.sort();
        keys
    }
}
