use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::cli::Cli;
use crate::tagging::SyncOptions;
use crate::transport::{RetryPolicy, DEFAULT_TIMEOUT};

pub const DEFAULT_BASE_URL: &str = "http://localhost:41184";
pub const DEFAULT_PREFIX: &str = "notebook.";

/// Settings that may live in the optional TOML file. The token never does.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub prefix: Option<String>,
    pub refetch_on_conflict: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

pub struct SyncConfig {
    pub base_url: String,
    pub token: String,
    pub prefix: String,
    pub dry_run: bool,
    pub refetch_on_conflict: bool,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("prefix", &self.prefix)
            .field("dry_run", &self.dry_run)
            .field("refetch_on_conflict", &self.refetch_on_conflict)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SyncConfig {
    /// Flags and environment win over the config file, which wins over
    /// built-in defaults.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::from_parts(cli, file)
    }

    fn from_parts(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let token = cli
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)?
            .to_string();

        let base_url = cli
            .base_url
            .clone()
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let prefix = cli
            .prefix
            .clone()
            .or(file.prefix)
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        Ok(Self {
            base_url: validate_base_url(&base_url)?,
            token,
            prefix,
            dry_run: cli.dry_run,
            refetch_on_conflict: cli.refetch_on_conflict
                || file.refetch_on_conflict.unwrap_or(false),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            prefix: self.prefix.clone(),
            dry_run: self.dry_run,
            refetch_on_conflict: self.refetch_on_conflict,
        }
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        value: raw.to_string(),
        message: err.to_string(),
    })?;
    match url.scheme() {
        "http" => {}
        "https" => {
            return Err(ConfigError::InvalidBaseUrl {
                value: raw.to_string(),
                message: "https is not supported; the Joplin Data API serves plain http"
                    .to_string(),
            })
        }
        other => {
            return Err(ConfigError::InvalidBaseUrl {
                value: raw.to_string(),
                message: format!("unsupported scheme '{other}'"),
            })
        }
    }
    Ok(trimmed.to_string())
}

#[derive(Debug)]
pub enum ConfigError {
    MissingToken,
    InvalidBaseUrl { value: String, message: String },
    Io { path: PathBuf, source: std::io::Error },
    Toml(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingToken => write!(
                f,
                "JOPLIN_TOKEN is not set or empty; pass --token or export JOPLIN_TOKEN"
            ),
            ConfigError::InvalidBaseUrl { value, message } => {
                write!(f, "invalid base URL '{}': {}", value, message)
            }
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config '{}': {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::MissingToken => None,
            ConfigError::InvalidBaseUrl { .. } => None,
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}
