use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::DEFAULT_PLAYER;
use crate::session::SessionConfig;
use crate::surahs;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub surah_id: u32,
    pub start_ayah: u32,
    /// `None` means up to the last verse of the surah.
    pub end_ayah: Option<u32>,
    pub ayah_repetitions: u32,
    pub surah_repetitions: u32,
    pub autoplay: bool,
    pub post_verse_delay_ms: u64,
    pub player: String,
    pub feedback_endpoint: Option<String>,
    pub user_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            surah_id: 1,
            start_ayah: 1,
            end_ayah: None,
            ayah_repetitions: 3,
            surah_repetitions: 1,
            autoplay: true,
            post_verse_delay_ms: 1000,
            player: DEFAULT_PLAYER.to_string(),
            feedback_endpoint: None,
            user_id: "local".to_string(),
        }
    }
}

impl Config {
    /// Session settings for the configured surah. Unknown surah ids fall back
    /// to the first catalogue entry.
    pub fn session_config(&self) -> SessionConfig {
        let surah = surahs::find(self.surah_id).unwrap_or(&surahs::SURAHS[0]);
        SessionConfig {
            surah_id: surah.id,
            total_ayahs_in_surah: surah.total_ayahs,
            start_ayah: self.start_ayah,
            end_ayah: self.end_ayah.unwrap_or(surah.total_ayahs),
            ayah_repetitions: self.ayah_repetitions,
            surah_repetitions: self.surah_repetitions,
        }
        .clamped()
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "ayah-echo") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("ayah_echo_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|err| {
                log::warn!("ignoring unreadable config {}: {err}", self.path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
