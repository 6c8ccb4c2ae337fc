use std::path::Path;
use std::{fs, path::PathBuf};

use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::offsets::EntityLayout;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Not part of the file; remembers where to save to
    #[serde(skip)]
    path: PathBuf,

    pub log: Log,
    pub overlay: Overlay,
    pub layout: EntityLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    /// logger directive, e.g. `info` or `esp_overlay=trace`
    pub level: String,
    /// whether to display log targets
    pub targets: bool,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            targets: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overlay {
    /// frame rate cap
    pub fps: u32,
    /// title of the window to cover
    pub window_title: String,
    /// class name tried when no window has `window_title`
    pub window_class: String,
    /// dumper-style JSON with the module-relative offsets
    pub offsets_path: PathBuf,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            fps: 60,
            window_title: "Counter-Strike 2".to_owned(),
            window_class: "SDL_app".to_owned(),
            offsets_path: PathBuf::from("offsets.json"),
        }
    }
}

impl Config {
    /// Load a config file
    /// If path doesn't exist, creates and saves default config
    /// otherwise loads what's already there
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self {
                path: path.to_owned(),
                ..Default::default()
            };

            config.save()?;
            return Ok(config);
        }

        let data = fs::read_to_string(path)?;
        let mut config = toml::from_str::<Self>(&data)?;

        path.clone_into(&mut config.path);

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let serialized = toml::to_string_pretty(self)?;
        fs::write(&self.path, serialized)?;

        Ok(())
    }

    /// Offsets file, resolved against the config file's directory.
    pub fn offsets_path(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if self.overlay.offsets_path.is_relative() => dir.join(&self.overlay.offsets_path),
            _ => self.overlay.offsets_path.clone(),
        }
    }
}
