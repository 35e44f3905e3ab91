//! Notification preferences, persisted through an injected [`PreferenceStore`].

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::collections::HashMap;

use crate::db::repository::MetaRepo;

/// Key/value persistence port for user preferences.
pub trait PreferenceStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Stores preferences in the `app_meta` table
pub struct SqlitePreferenceStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePreferenceStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PreferenceStore for SqlitePreferenceStore<'_> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        MetaRepo::get(self.conn, key)
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        MetaRepo::set(self.conn, key, value)
    }
}

/// In-process store for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: HashMap<String, String>,
}

#[cfg(test)]
impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Nudge when the streak ends unless something is read today
    #[serde(default = "default_true")]
    pub streak_reminders: bool,
    #[serde(default = "default_true")]
    pub level_up_alerts: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            streak_reminders: true,
            level_up_alerts: true,
        }
    }
}

impl NotificationPreferences {
    const KEY: &'static str = "notification_preferences";

    pub fn load(store: &impl PreferenceStore) -> Result<Self> {
        let Some(raw) = store.load(Self::KEY)? else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&raw) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                log::warn!("Discarding unreadable notification preferences: {}", e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, store: &mut impl PreferenceStore) -> Result<()> {
        let raw = serde_json::to_string(self).context("Serializing notification preferences")?;
        store.store(Self::KEY, &raw)
    }
}
