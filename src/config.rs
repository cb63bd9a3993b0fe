//! Application Configuration
//!
//! Persistent backend settings: where the collection lives on disk and
//! which port ranges the two servers may bind.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    // === Collection layout ===
    /// Root of the on-disk collection; every other folder is relative to it.
    pub collection_path: PathBuf,

    /// Game catalog snapshot (JSON list of records), relative to the root.
    pub catalog_path: PathBuf,

    /// Playlist folder, relative to the root.
    pub playlist_folder_path: PathBuf,

    /// Media folders served by the file server, relative to the root.
    pub image_folder_path: PathBuf,
    pub video_folder_path: PathBuf,
    pub theme_folder_path: PathBuf,
    pub logo_folder_path: PathBuf,

    // === Servers ===
    /// Port range for the message server.
    pub back_port_min: u16,
    pub back_port_max: u16,

    /// Port range for the file server.
    pub file_port_min: u16,
    pub file_port_max: u16,

    /// Listen on all interfaces instead of loopback only.
    pub accept_remote: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collection_path: PathBuf::from("."),
            catalog_path: PathBuf::from("catalog.json"),
            playlist_folder_path: PathBuf::from("Playlists"),
            image_folder_path: PathBuf::from("Images"),
            video_folder_path: PathBuf::from("Videos"),
            theme_folder_path: PathBuf::from("Themes"),
            logo_folder_path: PathBuf::from("Logos"),
            back_port_min: 12001,
            back_port_max: 12100,
            file_port_min: 12101,
            file_port_max: 12200,
            accept_remote: false,
        }
    }
}

impl AppConfig {
    /// Load the config file, falling back to defaults when it does not
    /// exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exo-backend")
            .join("config.json")
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.collection_path.join(&self.catalog_path)
    }

    pub fn playlist_dir(&self) -> PathBuf {
        self.collection_path.join(&self.playlist_folder_path)
    }

    pub fn image_root(&self) -> PathBuf {
        self.collection_path.join(&self.image_folder_path)
    }

    pub fn video_root(&self) -> PathBuf {
        self.collection_path.join(&self.video_folder_path)
    }

    pub fn theme_root(&self) -> PathBuf {
        self.collection_path.join(&self.theme_folder_path)
    }

    pub fn logo_root(&self) -> PathBuf {
        self.collection_path.join(&self.logo_folder_path)
    }
}
