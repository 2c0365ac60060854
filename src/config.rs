//! Uploader configuration loaded from `stream-uploader.toml`.
//!
//! Fields missing from the file use the defaults below. The environment
//! variables `BUNNY_STREAM_API_KEY` and `BUNNY_STREAM_LIBRARY_ID` take
//! precedence over the file; command line flags are applied last by `main`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "stream-uploader.toml";
pub const API_KEY_ENV: &str = "BUNNY_STREAM_API_KEY";
pub const LIBRARY_ID_ENV: &str = "BUNNY_STREAM_LIBRARY_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct UploaderConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bunny Stream library that receives the videos.
    #[serde(default)]
    pub library_id: String,

    #[serde(default)]
    pub api_key: String,

    /// Directory scanned for videos.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Upper bound on jobs in flight at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Attempts per step, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound in milliseconds for a single backoff sleep.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// File extension picked up from `source_dir`, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Separates the model name from the recording label in file names.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Keep local files after a successful upload.
    #[serde(default)]
    pub keep_files: bool,
}

fn default_api_base_url() -> String {
    crate::bunny::client::API_URL.to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./converted")
}

fn default_max_workers() -> usize {
    crate::pool::DEFAULT_CAPACITY
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    crate::retry::DEFAULT_MAX_DELAY_MS
}

fn default_extension() -> String {
    "mp4".to_string()
}

fn default_delimiter() -> char {
    '_'
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            library_id: String::new(),
            api_key: String::new(),
            source_dir: default_source_dir(),
            max_workers: default_max_workers(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            extension: default_extension(),
            delimiter: default_delimiter(),
            keep_files: false,
        }
    }
}

impl UploaderConfig {
    /// Loads the configuration from `path`, or from `stream-uploader.toml` in
    /// the current directory. Only an explicitly given file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Overrides credentials with non-empty values from `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV)
            && !key.is_empty()
        {
            self.api_key = key;
        }
        if let Some(library) = lookup(LIBRARY_ID_ENV)
            && !library.is_empty()
        {
            self.library_id = library;
        }
    }

    /// Rejects settings that would make every job fail or never start.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("api key is missing; set `api_key` or {API_KEY_ENV}");
        }
        if self.library_id.trim().is_empty() {
            bail!("library id is missing; set `library_id` or {LIBRARY_ID_ENV}");
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}
