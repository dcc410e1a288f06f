use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::construct::{Item, Uid, UidGenerator};
use crate::error::Result;
use crate::stored::StoredContentCollection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidSettings {
    pub start: Uid,
    pub step: u64,
    /// Locked generators can be shared between threads.
    pub locked: bool,
}

impl Default for UidSettings {
    fn default() -> Self {
        Self { start: 0, step: 1, locked: false }
    }
}

impl UidSettings {
    pub fn generator(&self) -> Result<UidGenerator> {
        let mut generator = UidGenerator::new();
        generator.reconfigure(Some(self.start), Some(self.step), self.locked)?;
        Ok(generator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSettings {
    pub enabled: bool,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive, `RUST_LOG` wins over it.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".to_owned() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub items: UidSettings,
    pub lists: UidSettings,
    pub tracks: TrackSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Layers an optional TOML file and `MINESET__*` environment variables
    /// over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let config = builder
            .add_source(Environment::with_prefix("MINESET").separator("__").try_parsing(true))
            .build()?;
        let settings: Settings = config.try_deserialize()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }
    pub fn from_toml(text: &str) -> Result<Self> {
        let config = Config::builder().add_source(File::from_str(text, FileFormat::Toml)).build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn item_generator(&self) -> Result<UidGenerator> {
        self.items.generator()
    }
    pub fn list_generator(&self) -> Result<UidGenerator> {
        self.lists.generator()
    }
    pub fn stored_collection<I: Item>(&self) -> Result<StoredContentCollection<I>> {
        let mut stored = StoredContentCollection::with_generators(self.item_generator()?, self.list_generator()?);
        if !self.tracks.enabled {
            stored.tracks_mut().disable();
        }
        Ok(stored)
    }
}
