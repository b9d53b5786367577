//! Client configuration
//!
//! Loaded in order of priority:
//! 1. Environment variables (`MAILSIFT_API_URL`, `MAILSIFT_SEARCH_DEBOUNCE_MS`,
//!    `MAILSIFT_SYNC_DISMISS_MS`)
//! 2. JSON file (`~/.config/mailsift/client.json`)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Config filename in the mailsift config directory
const CONFIG_FILE: &str = "client.json";

pub const API_URL_ENV: &str = "MAILSIFT_API_URL";
pub const SEARCH_DEBOUNCE_ENV: &str = "MAILSIFT_SEARCH_DEBOUNCE_MS";
pub const SYNC_DISMISS_ENV: &str = "MAILSIFT_SYNC_DISMISS_MS";

/// Settings for talking to the mail server and pacing the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:5001/api`
    pub base_url: String,
    /// Quiet period before a search lookup
    pub search_debounce_ms: u64,
    /// How long a completed sync log stays on screen
    pub sync_dismiss_ms: u64,
    pub request_timeout_secs: u64,
    /// Cap on displayed search results
    pub search_limit: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001/api".to_string(),
            search_debounce_ms: 1000,
            sync_dismiss_ms: 2000,
            request_timeout_secs: 30,
            search_limit: None,
        }
    }
}

impl ClientConfig {
    /// Load from the config directory (if present), then apply environment overrides
    pub fn load() -> Result<Self> {
        let base = if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            Self::default()
        };
        Ok(base.with_env(|key| std::env::var(key).ok()))
    }

    /// Load from a specific JSON file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let base: Self = config::load_json_file(path)?;
        Ok(base.with_env(|key| std::env::var(key).ok()))
    }

    /// Parse from a JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse client config JSON")
    }

    /// Apply overrides from an environment lookup
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(ms) = parse_env(&lookup, SEARCH_DEBOUNCE_ENV) {
            self.search_debounce_ms = ms;
        }
        if let Some(ms) = parse_env(&lookup, SYNC_DISMISS_ENV) {
            self.sync_dismiss_ms = ms;
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Default config file path (~/.config/mailsift/client.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn sync_dismiss(&self) -> Duration {
        Duration::from_millis(self.sync_dismiss_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}
