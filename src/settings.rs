//! Client settings storage
//!
//! Stores the backend URL, API token, and display preferences in a JSON
//! file under the user config directory. Environment variables override
//! stored values so scripts can point at a different server per invocation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

/// Global settings instance
static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

/// Path to config file (set during init)
static CONFIG_PATH: RwLock<Option<PathBuf>> = RwLock::new(None);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Rows requested from list endpoints (audit trail, person search)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_page_size() -> u32 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_token: None,
            page_size: 50,
        }
    }
}

impl Settings {
    /// Load settings from disk or create default
    fn load(path: &PathBuf) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => Settings::default(),
            }
        } else {
            Settings::default()
        }
    }

    /// Save settings to disk
    fn save(&self, path: &PathBuf) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }
}

/// Initialize settings from the given config directory
pub fn init(config_dir: PathBuf) {
    let config_path = config_dir.join("settings.json");
    let settings = Settings::load(&config_path);

    *CONFIG_PATH.write().unwrap() = Some(config_path);
    *SETTINGS.write().unwrap() = Some(settings);
}

/// Default config directory: `<user config dir>/orgdesk`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("orgdesk"))
        .unwrap_or_else(|| PathBuf::from(".orgdesk"))
}

/// Get the backend URL (env var ORGDESK_SERVER takes precedence)
pub fn get_server_url() -> String {
    if let Ok(url) = std::env::var("ORGDESK_SERVER") {
        if !url.is_empty() {
            return url;
        }
    }

    let guard = SETTINGS.read().ok();
    guard
        .as_ref()
        .and_then(|g| g.as_ref())
        .map(|s| s.server_url.clone())
        .unwrap_or_else(default_server_url)
}

/// Set and save the backend URL
pub fn set_server_url(url: String) -> Result<(), String> {
    update(|settings| settings.server_url = url)?;
    println!("Server URL saved to settings");
    Ok(())
}

/// Get the API token (env var ORGDESK_TOKEN takes precedence)
pub fn get_api_token() -> Option<String> {
    if let Ok(token) = std::env::var("ORGDESK_TOKEN") {
        if !token.is_empty() {
            return Some(token);
        }
    }

    let guard = SETTINGS.read().ok()?;
    let settings = guard.as_ref()?;
    settings.api_token.clone()
}

/// Set and save the API token (empty string clears it)
pub fn set_api_token(token: String) -> Result<(), String> {
    update(|settings| {
        settings.api_token = if token.is_empty() { None } else { Some(token) };
    })?;
    println!("API token saved to settings");
    Ok(())
}

/// Get masked token for display (shows first/last 4 chars)
pub fn get_masked_api_token() -> Option<String> {
    get_api_token().map(|token| {
        if token.len() > 12 {
            format!("{}...{}", &token[..8], &token[token.len() - 4..])
        } else {
            "*".repeat(token.len())
        }
    })
}

pub fn get_page_size() -> u32 {
    let guard = SETTINGS.read().ok();
    guard
        .as_ref()
        .and_then(|g| g.as_ref())
        .map(|s| s.page_size)
        .unwrap_or(50)
}

pub fn set_page_size(size: u32) -> Result<(), String> {
    update(|settings| settings.page_size = size.max(1))?;
    println!("Page size saved to settings");
    Ok(())
}

/// Mutate settings under the lock and persist the result.
fn update(f: impl FnOnce(&mut Settings)) -> Result<(), String> {
    let mut settings_guard = SETTINGS
        .write()
        .map_err(|_| "Failed to acquire settings lock")?;

    let settings = settings_guard.get_or_insert_with(Settings::default);
    f(settings);

    let config_path = CONFIG_PATH
        .read()
        .map_err(|_| "Failed to acquire config path lock")?
        .clone()
        .ok_or("Settings not initialized")?;

    settings.save(&config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://localhost:8080");
        assert_eq!(settings.api_token, None);
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings::load(&path);
        assert_eq!(settings.server_url, "http://localhost:8080");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            server_url: "https://relations.example.com".to_string(),
            api_token: Some("secret-token".to_string()),
            page_size: 25,
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.server_url, "https://relations.example.com");
        assert_eq!(loaded.api_token.as_deref(), Some("secret-token"));
        assert_eq!(loaded.page_size, 25);
    }

    #[test]
    fn test_load_tolerates_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"server_url": "http://intranet:9000"}"#).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.server_url, "http://intranet:9000");
        assert_eq!(loaded.page_size, 50);
    }
}
