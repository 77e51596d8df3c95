use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Refresh interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Path of the JSON cache file holding the full update array
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Directory the /pdf route is allowed to serve from
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub sources: Vec<SourceConfig>,
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache/cloud_updates.json")
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("assets/pdf")
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    /// Provider attributed to every record from this source (e.g. "azure")
    #[serde(default)]
    pub cloud_provider: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
