use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const MIB: u64 = 1024 * 1024;

// a size whose byte count does not fit a u64 falls back to the default
fn megabytes(key: &str, value: Option<u64>, fallback: u64) -> u64 {
    match value {
        Some(mb) if mb.checked_mul(MIB).is_none() => {
            tracing::warn!("{} = {} is too large, using {}", key, mb, fallback);
            fallback
        }
        Some(mb) => mb,
        None => fallback,
    }
}

/// server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// listen address
    pub host: String,
    /// listen port
    pub port: u16,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// cors allowed origins (comma-separated, `*` for any)
    pub cors_origins: Vec<String>,
    /// directory holding the static front-end
    pub static_dir: PathBuf,
    /// path of the optional upload config file
    pub upload_config_path: PathBuf,
    /// idle time after which an upload session is swept
    pub session_ttl: Duration,
    /// how often the sweeper runs
    pub sweep_interval: Duration,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // parse cors origins
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse::<usize>().ok())
                .filter(|t| *t > 0)
                .unwrap_or(8),
            cors_origins,
            static_dir: std::env::var("STATIC_DIR")
                .unwrap_or_else(|_| "./static".to_string())
                .into(),
            upload_config_path: std::env::var("UPLOAD_CONFIG")
                .unwrap_or_else(|_| "config/upload_config.toml".to_string())
                .into(),
            session_ttl: Duration::from_secs(
                std::env::var("SESSION_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 60 * 60),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(600),
            ),
        }
    }
}

/// process-wide upload limits and storage roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// where finished files live
    pub upload_dir: PathBuf,
    /// where per-upload chunk directories live
    pub chunk_dir: PathBuf,
    pub max_file_size_mb: u64,
    pub default_chunk_size_mb: u64,
    pub min_chunk_size_mb: u64,
    pub max_chunk_size_mb: u64,
    /// advisory, never enforced server-side
    pub max_concurrency: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads/files"),
            chunk_dir: PathBuf::from("uploads/chunks"),
            max_file_size_mb: 51200,
            default_chunk_size_mb: 10,
            min_chunk_size_mb: 2,
            max_chunk_size_mb: 32,
            max_concurrency: 3,
        }
    }
}

// on-disk shape of the upload config file
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct UploadConfigFile {
    storage: StorageSection,
    limits: LimitsSection,
    chunking: ChunkingSection,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct StorageSection {
    upload_dir: Option<String>,
    temp_dir: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct LimitsSection {
    #[serde(rename = "maxFileSizeMB")]
    max_file_size_mb: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ChunkingSection {
    #[serde(rename = "defaultChunkSizeMB")]
    default_chunk_size_mb: Option<u64>,
    #[serde(rename = "minChunkSizeMB")]
    min_chunk_size_mb: Option<u64>,
    #[serde(rename = "maxChunkSizeMB")]
    max_chunk_size_mb: Option<u64>,
    #[serde(rename = "maxConcurrency")]
    max_concurrency: Option<u32>,
}

impl UploadConfig {
    /// load the upload config file, falling back to defaults on any problem
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No upload config at {:?}, using defaults", path);
            return Self::default();
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read upload config {:?}: {}, using defaults", path, e);
                return Self::default();
            }
        };

        Self::from_toml_str(&raw)
    }

    /// parse a config document; invalid input yields defaults
    pub fn from_toml_str(raw: &str) -> Self {
        let file: UploadConfigFile = match toml::from_str(raw) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Invalid upload config: {}, using defaults", e);
                return Self::default();
            }
        };

        let defaults = Self::default();
        let dir_or = |value: Option<String>, fallback: PathBuf| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(fallback)
        };

        let mut config = Self {
            upload_dir: dir_or(file.storage.upload_dir, defaults.upload_dir.clone()),
            chunk_dir: dir_or(file.storage.temp_dir, defaults.chunk_dir.clone()),
            max_file_size_mb: megabytes(
                "maxFileSizeMB",
                file.limits.max_file_size_mb.filter(|v| *v > 0),
                defaults.max_file_size_mb,
            ),
            default_chunk_size_mb: megabytes(
                "defaultChunkSizeMB",
                file.chunking.default_chunk_size_mb,
                defaults.default_chunk_size_mb,
            ),
            min_chunk_size_mb: megabytes(
                "minChunkSizeMB",
                file.chunking.min_chunk_size_mb,
                defaults.min_chunk_size_mb,
            ),
            max_chunk_size_mb: megabytes(
                "maxChunkSizeMB",
                file.chunking.max_chunk_size_mb,
                defaults.max_chunk_size_mb,
            ),
            max_concurrency: file
                .chunking
                .max_concurrency
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_concurrency),
        };

        let chunking_valid = config.min_chunk_size_mb > 0
            && config.min_chunk_size_mb <= config.max_chunk_size_mb
            && (config.min_chunk_size_mb..=config.max_chunk_size_mb)
                .contains(&config.default_chunk_size_mb);
        if !chunking_valid {
            tracing::warn!(
                "Inconsistent chunk sizes (default {} / min {} / max {} MB), using defaults",
                config.default_chunk_size_mb,
                config.min_chunk_size_mb,
                config.max_chunk_size_mb
            );
            config.default_chunk_size_mb = defaults.default_chunk_size_mb;
            config.min_chunk_size_mb = defaults.min_chunk_size_mb;
            config.max_chunk_size_mb = defaults.max_chunk_size_mb;
        }

        config
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(MIB)
    }

    pub fn default_chunk_size_bytes(&self) -> u64 {
        self.default_chunk_size_mb.saturating_mul(MIB)
    }

    pub fn min_chunk_size_bytes(&self) -> u64 {
        self.min_chunk_size_mb.saturating_mul(MIB)
    }

    pub fn max_chunk_size_bytes(&self) -> u64 {
        self.max_chunk_size_mb.saturating_mul(MIB)
    }
}
