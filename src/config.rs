//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Public base URL of this server, used to recognize self-referential
    /// artwork URLs during reconciliation. May be empty for offline use.
    #[serde(default)]
    pub base_url: String,

    /// Directory holding cached raw provider records.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Staging directory for in-flight artwork downloads.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Configured media roots, each mapping a local folder to a public URL.
    #[serde(default)]
    pub sources: Vec<Source>,

    #[serde(default)]
    pub tmdb: TmdbConfig,
}

/// A configured media root: a local folder exposed under a public URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    pub folder_path: PathBuf,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB v3 API key. Remote operations fail without one.
    #[serde(default)]
    pub api_key: String,

    /// ISO-639-1 language tag for metadata requests.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache/tmdb")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("damson")
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return the default config.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./damson.toml",
        "~/.config/damson/config.toml",
        "/etc/damson/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration.
fn validate_config(config: &Config) -> Result<()> {
    for source in &config.sources {
        if source.public_url.is_empty() {
            return Err(Error::config(format!(
                "source {} has no public URL",
                source.folder_path.display()
            )));
        }
        if !source.folder_path.exists() {
            tracing::warn!("source folder does not exist: {:?}", source.folder_path);
        }
    }

    if !config.base_url.is_empty() && !config.base_url.starts_with("http") {
        return Err(Error::config(format!(
            "base_url does not look like a URL: {}",
            config.base_url
        )));
    }

    Ok(())
}
