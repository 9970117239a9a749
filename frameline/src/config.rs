use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("thread {0} is assigned to both the ui and raster roles")]
    ConflictingRole(u32),
}

/// One-time configuration mapping designated thread ids to logical tracks.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    #[serde(default)]
    pub ui_threads: Vec<u32>,
    #[serde(default)]
    pub raster_threads: Vec<u32>,
}

impl TrackConfig {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TrackConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Primes roles from an engine thread listing. Rendering engines publish
    /// thread names alongside thread ids; UI and raster threads are
    /// recognized by conventional name suffixes (`.raster` was historically
    /// spelled `.gpu`).
    pub fn from_thread_names<'a>(threads: impl IntoIterator<Item = (u32, &'a str)>) -> Self {
        let mut config = TrackConfig::default();
        for (tid, name) in threads {
            if name.ends_with(".ui") {
                config.ui_threads.push(tid);
            } else if name.ends_with(".raster") || name.ends_with(".gpu") {
                config.raster_threads.push(tid);
            }
        }
        config
    }
}
