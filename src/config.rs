use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mime_guess::Mime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stream::{StreamOptions, CHUNK_SIZE};

/// Streaming parameters (`[stream]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Largest chunk sent per write, in bytes.
    pub chunk_size: usize,
    /// Seconds a disk read may stall before the stream is abandoned. 0 disables.
    pub idle_timeout_secs: u64,
    /// Served when the file extension has no known MIME type.
    pub default_content_type: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            idle_timeout_secs: 30,
            default_content_type: "video/mp4".to_string(),
        }
    }
}

impl StreamConfig {
    pub fn options(&self) -> StreamOptions {
        StreamOptions {
            chunk_size: self.chunk_size.max(1),
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }

    pub fn default_content_type(&self) -> Result<Mime> {
        self.default_content_type
            .parse()
            .map_err(|_| Error::InvalidContentType(self.default_content_type.clone()))
    }
}

/// Title metadata lookup (`[metadata]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Lookups are skipped without a key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub language: String,
    /// Per-request timeout for lookups, in seconds.
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.themoviedb.org".to_string(),
            language: "en-US".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Server configuration, usually loaded from `cinema.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: SocketAddr,
    /// Root folder scanned for videos.
    pub video_dir: PathBuf,
    /// Catalog written by `scan` and read by `serve`.
    pub library_path: PathBuf,
    pub stream: StreamConfig,
    pub metadata: MetadataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8001)),
            video_dir: PathBuf::from("videos"),
            library_path: PathBuf::from("data/library.json"),
            stream: StreamConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::ConfigRead { path: path.to_path_buf(), source });
            }
        };
        Self::from_toml(&data).map_err(|source| Error::ConfigParse { path: path.to_path_buf(), source })
    }

    pub fn from_toml(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }
}
