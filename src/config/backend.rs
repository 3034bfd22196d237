use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use lazy_static::lazy_static;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the REST backend serving plan and aggregator data
    pub base_url: String,
    /// Default user id attached to subchapter-status requests
    pub user_id: String,
    /// Default plan id opened when none is given explicitly
    pub plan_id: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum concurrent per-id fetches within one day/subchapter batch
    pub fan_out_limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://localhost:3001".to_string(),
            user_id: String::new(),
            plan_id: String::new(),
            request_timeout_secs: 30,
            fan_out_limit: 8,
        }
    }
}

fn get_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("PLANDECK_CONFIG") {
        return PathBuf::from(path);
    }

    // Use platform-specific app data directory
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let mut dir = PathBuf::from(home);
            dir.push("Library/Application Support/com.plandeck");
            dir.push("backend.toml");
            return dir;
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            let mut dir = PathBuf::from(appdata);
            dir.push("com.plandeck");
            dir.push("backend.toml");
            return dir;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let mut dir = PathBuf::from(home);
            dir.push(".local/share/com.plandeck");
            dir.push("backend.toml");
            return dir;
        }
    }

    // Fallback
    PathBuf::from("backend.toml")
}

fn load_backend_config_internal() -> BackendConfig {
    let config_path = get_config_path();

    if let Ok(content) = fs::read_to_string(&config_path) {
        match toml::from_str::<BackendConfig>(&content) {
            Ok(config) => {
                tracing::info!(path = ?config_path, "Loaded backend config");
                return config;
            }
            Err(e) => {
                tracing::warn!(path = ?config_path, error = %e, "Failed to parse backend.toml, using defaults");
            }
        }
    }

    BackendConfig::default()
}

lazy_static! {
    static ref BACKEND_CONFIG: BackendConfig = load_backend_config_internal();
}

/// Get the cached backend configuration (loaded once at startup)
pub fn get_backend_config() -> &'static BackendConfig {
    &BACKEND_CONFIG
}
