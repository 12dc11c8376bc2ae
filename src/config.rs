use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default proof-of-work difficulty in leading zero bits.
pub const DEFAULT_DIFFICULTY: u32 = 16;

/// Configuration for the sealed-chain CLI tool
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (default: `.sealed-chain/` in current directory)
    pub data_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log level or `EnvFilter` directive (default: "info")
    pub log_level: String,

    /// Proof-of-work difficulty, fixed for the lifetime of a chain
    pub difficulty: u32,

    /// Upper bound on a single nonce search, `None` for unbounded
    pub mining_timeout: Option<Duration>,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".sealed-chain");

        Config {
            data_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            mining_timeout: None,
        }
    }

    /// Create config with custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            ..Config::new()
        }
    }

    /// Get the data directory path
    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Set data directory
    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    /// Get output format
    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    /// Get log level
    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }

    /// Set log level
    pub fn set_log_level(&mut self, level: String) {
        self.log_level = level;
    }

    /// Set difficulty
    pub fn set_difficulty(&mut self, difficulty: u32) {
        self.difficulty = difficulty;
    }

    /// Set mining timeout
    pub fn set_mining_timeout(&mut self, timeout: Option<Duration>) {
        self.mining_timeout = timeout;
    }

    /// Get block directory path
    pub fn get_blocks_dir(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }

    /// Get tip pointer path
    pub fn get_tip_path(&self) -> PathBuf {
        self.data_dir.join("tip")
    }

    /// Get recorded difficulty path
    pub fn get_difficulty_path(&self) -> PathBuf {
        self.data_dir.join("difficulty")
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `SEALED_CHAIN_DATA_DIR`: override data directory
    /// - `SEALED_CHAIN_OUTPUT_FORMAT`: "human" or "json"
    /// - `SEALED_CHAIN_LOG_LEVEL`: log level
    /// - `SEALED_CHAIN_DIFFICULTY`: proof-of-work difficulty (0-255)
    /// - `SEALED_CHAIN_MINING_TIMEOUT_SECS`: per-block mining timeout
    pub fn from_env() -> Result<Self> {
        let mut config = Config::new();

        if let Ok(dir) = env::var("SEALED_CHAIN_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("SEALED_CHAIN_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("SEALED_CHAIN_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(difficulty) = env::var("SEALED_CHAIN_DIFFICULTY") {
            config.difficulty = difficulty.parse().map_err(|e| {
                Error::Config(format!("Invalid SEALED_CHAIN_DIFFICULTY '{}': {}", difficulty, e))
            })?;
        }

        if let Ok(secs) = env::var("SEALED_CHAIN_MINING_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                Error::Config(format!("Invalid SEALED_CHAIN_MINING_TIMEOUT_SECS '{}': {}", secs, e))
            })?;
            config.mining_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
