// File: src/config.rs
// Purpose: Application configuration from ingest.toml and the runtime config store

use crate::data::Data;
use crate::error::{Error, Result as IngestResult};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Free-form settings exposed to actions through `Context::config()`
    #[serde(default)]
    pub settings: toml::Table,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// View engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Directory containing templates (default: "views")
    #[serde(default = "default_view_root")]
    pub root: String,

    /// Extension appended to entries without one (default: "html")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Entry prefixes mapped to directories; `@/` maps to `root` unless set
    #[serde(default)]
    pub aliases: IndexMap<String, String>,

    /// Layout entry wrapping every page at `{slots.content}`
    #[serde(default)]
    pub layout: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default values
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_view_root() -> String {
    "views".to_string()
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_filter() -> String {
    "ingest=info,tower_http=info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            root: default_view_root(),
            extension: default_extension(),
            aliases: IndexMap::new(),
            layout: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from ingest.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Missing or empty file means defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./ingest.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("ingest.toml")
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("server.host must not be empty".into()));
        }
        if self.view.extension.starts_with('.') {
            return Err(Error::Config(format!(
                "view.extension must not start with a dot: {}",
                self.view.extension
            )));
        }
        Ok(())
    }

    /// The `[settings]` table as a config store
    pub fn store(&self) -> IngestResult<ConfigStore> {
        let value = serde_json::to_value(&self.settings)?;
        Ok(ConfigStore::from(value))
    }
}

/// Nested key/value settings shared by every action
///
/// The core passes it through untouched. Clones share the same map, so a
/// plugin writing a value during bootstrap is visible to later requests.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    inner: Arc<RwLock<Data>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at a dotted path
    pub fn get(&self, path: &str) -> Option<JsonValue> {
        self.inner.read().get_path(path).cloned()
    }

    /// Value at a dotted path, or `default` when absent
    pub fn path(&self, path: &str, default: impl Into<JsonValue>) -> JsonValue {
        self.get(path).unwrap_or_else(|| default.into())
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> IngestResult<T> {
        self.inner.read().get_as(path)
    }

    /// Sets a value at a dotted path, creating intermediate objects
    pub fn set(&self, path: &str, value: impl Into<JsonValue>) -> &Self {
        self.inner.write().set_path(path, value);
        self
    }

    pub fn has(&self, path: &str) -> bool {
        self.inner.read().has(path)
    }

    /// Merges a JSON object into the top level
    pub fn merge(&self, value: JsonValue) -> &Self {
        self.inner.write().merge(value);
        self
    }

    pub fn to_value(&self) -> JsonValue {
        self.inner.read().to_value()
    }
}

impl From<JsonValue> for ConfigStore {
    fn from(value: JsonValue) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Data::from(value))),
        }
    }
}
