//! Configuration for mojify

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ArenaError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mojify")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Database file name, or an absolute path
    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Frontend origin used to build claim links
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Public base URL injected into protocol documents
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Directory with skill.md / heartbeat.md / skill.json overrides
    #[serde(default)]
    pub protocol_dir: Option<PathBuf>,

    /// Seed the live battle example on startup
    #[serde(default = "default_true")]
    pub seed_example: bool,
}

fn default_database_file() -> String {
    "mojify.db".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_app_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            database_file: default_database_file(),
            bind_host: default_bind_host(),
            http_port: default_http_port(),
            frontend_url: default_frontend_url(),
            app_url: default_app_url(),
            protocol_dir: None,
            seed_example: true,
        }
    }
}

impl Config {
    /// Load config from a TOML file; missing keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArenaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ArenaError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolved database path; an absolute `database_file` wins over `storage_dir`
    pub fn db_path(&self) -> PathBuf {
        let file = Path::new(&self.database_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.storage_dir.join(file)
        }
    }

    /// Apply a `DATABASE_URL` value: a file path, optionally prefixed with `sqlite://`
    pub fn set_database_url(&mut self, url: &str) {
        let path = PathBuf::from(url.strip_prefix("sqlite://").unwrap_or(url));
        if path.is_absolute() {
            self.database_file = path.to_string_lossy().into_owned();
        } else if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if !parent.as_os_str().is_empty() {
                self.storage_dir = parent.to_path_buf();
            }
            self.database_file = name.to_string_lossy().into_owned();
        }
    }

    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.http_port)
    }
}
