use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::DayBoundary;

fn default_display_name() -> String {
    "Reader".to_string()
}
fn default_timezone_offset() -> i32 {
    0
}
fn default_per_page() -> u32 {
    1
}
fn default_per_session() -> u32 {
    5
}
fn default_per_book_finished() -> u32 {
    50
}
fn default_freezes_allowed() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Minutes from UTC. Every session, freeze and "today" is cut into days in this zone.
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset: i32,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            timezone_offset: default_timezone_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_per_session")]
    pub per_session: u32,
    #[serde(default = "default_per_book_finished")]
    pub per_book_finished: u32,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            per_session: default_per_session(),
            per_book_finished: default_per_book_finished(),
        }
    }
}

impl PointsConfig {
    /// Points granted for a single reading session
    pub fn for_session(&self, pages: u32) -> u32 {
        self.per_session
            .saturating_add(pages.saturating_mul(self.per_page))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakConfig {
    #[serde(default = "default_freezes_allowed")]
    pub freezes_allowed: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            freezes_allowed: default_freezes_allowed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub streak: StreakConfig,
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "readquest")
            .context("Could not determine project directories")
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("readquest.db"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        let config: AppConfig = toml::from_str(&content).context("Parsing config.toml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Serializing config")?;
        std::fs::write(path, content).with_context(|| format!("Writing {:?}", path))?;
        Ok(())
    }

    pub fn ensure_data_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn day_boundary(&self) -> Result<DayBoundary> {
        DayBoundary::new(self.profile.timezone_offset).context("Invalid [profile] timezone_offset")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.profile.timezone_offset, 0);
        assert_eq!(config.points.per_book_finished, 50);
        assert_eq!(config.streak.freezes_allowed, 3);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[profile]\ntimezone_offset = 330\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.profile.timezone_offset, 330);
        assert_eq!(config.profile.display_name, "Reader");
        assert_eq!(config.points.per_session, 5);
        assert_eq!(config.day_boundary().unwrap().offset_minutes(), 330);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.profile.display_name = "Ana".to_string();
        config.points.per_page = 2;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.profile.display_name, "Ana");
        assert_eq!(loaded.points.per_page, 2);
    }

    #[test]
    fn session_points_scale_with_pages() {
        let points = PointsConfig::default();
        assert_eq!(points.for_session(0), 5);
        assert_eq!(points.for_session(20), 25);
    }

    #[test]
    fn bad_offset_is_rejected() {
        let mut config = AppConfig::default();
        config.profile.timezone_offset = 100_000;
        assert!(config.day_boundary().is_err());
    }
}
