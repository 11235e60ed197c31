//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, de};
use thiserror::Error;
use vcinv_client::SessionOptions;
use vcinv_inventory::{DEFAULT_ROOT_GROUP, ScanOptions, UNKNOWN_GUEST};

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "VCINV_CONFIG";

/// Errors raised before any server contact
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config file in any of the searched locations
    #[error("configuration file not found (searched: {})", display_paths(.0))]
    NotFound(Vec<PathBuf>),

    /// File exists but could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// JSON syntax or type error
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Required setting absent or empty
    #[error("missing required setting `{0}`")]
    MissingField(&'static str),

    /// Setting present but unusable
    #[error("invalid setting: {0}")]
    Invalid(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Config file as written by the user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(default = "default_port", deserialize_with = "port_number")]
    port: u16,
    #[serde(default = "default_verify_tls")]
    verify_tls: bool,
    #[serde(default = "default_root_group")]
    root_group: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default)]
    host_vars: bool,
}

fn default_port() -> u16 {
    443
}

/// Port as a number, or as a numeric string the way older `config.json` files write it
fn port_number<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid port `{text}`"))),
    }
}

fn default_verify_tls() -> bool {
    true
}

fn default_root_group() -> String {
    DEFAULT_ROOT_GROUP.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    4
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// vCenter hostname or address
    pub server: String,
    /// SSO user
    pub username: String,
    /// SSO password
    pub password: String,
    /// HTTPS port
    pub port: u16,
    /// Verify the server certificate
    pub verify_tls: bool,
    /// Root group name
    pub root_group: String,
    /// Timeout for each remote call
    pub timeout: Duration,
    /// Top-level subtrees walked concurrently
    pub workers: usize,
    /// Expose VM details as host variables
    pub host_vars: bool,
}

/// Config file format, picked by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

impl Config {
    /// Find and load the config file
    ///
    /// An explicit path wins, then `$VCINV_CONFIG`, then `./vcinv.toml`,
    /// `/etc/vcinv/vcinv.toml` and `<config dir>/vcinv/vcinv.toml`.
    ///
    /// # Errors
    /// Returns [`ConfigError::NotFound`] if no file exists, or any error from [`Config::load`].
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let mut candidates = vec![
            PathBuf::from("vcinv.toml"),
            PathBuf::from("/etc/vcinv/vcinv.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("vcinv/vcinv.toml"));
        }

        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Err(ConfigError::NotFound(candidates)),
        }
    }

    /// Load and validate a config file
    ///
    /// # Errors
    /// Returns an error if the file is missing or unreadable, fails to parse,
    /// or lacks a required setting.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(vec![path.to_path_buf()]));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::parse(&content, Format::of(path), path)
    }

    /// Parse and validate config content
    ///
    /// # Errors
    /// Returns an error if the content fails to parse or lacks a required setting.
    pub fn parse(content: &str, format: Format, path: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = match format {
            Format::Toml => toml::from_str(content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            Format::Json => serde_json::from_str(content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
        };
        Self::validate(file)
    }

    fn validate(file: FileConfig) -> Result<Self, ConfigError> {
        let required = |value: Option<String>, name: &'static str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingField(name))
        };

        let server = required(file.server, "server")?;
        let username = required(file.username, "username")?;
        let password = required(file.password, "password")?;

        if file.root_group.trim().is_empty() {
            return Err(ConfigError::Invalid("root_group must not be empty".to_string()));
        }
        if file.root_group == UNKNOWN_GUEST {
            return Err(ConfigError::Invalid(format!(
                "root_group must not be `{UNKNOWN_GUEST}`, that name is reserved for VMs without a guest id"
            )));
        }
        if file.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".to_string()));
        }

        Ok(Self {
            server,
            username,
            password,
            port: file.port,
            verify_tls: file.verify_tls,
            root_group: file.root_group,
            timeout: Duration::from_secs(file.timeout_secs),
            workers: file.workers.max(1),
            host_vars: file.host_vars,
        })
    }

    /// Connection settings for the REST session
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::new(&self.server, &self.username, &self.password)
            .with_port(self.port)
            .with_verify_tls(self.verify_tls)
            .with_timeout(self.timeout)
    }

    /// Traversal and grouping settings
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            root_group: self.root_group.clone(),
            timeout: self.timeout,
            workers: self.workers,
        }
    }
}
