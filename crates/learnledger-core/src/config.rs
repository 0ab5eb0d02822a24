use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use jsonschema::{validator_for, Validator};
use learnledger_store::{MemoryStore, RecordStore, SqliteOptions, SqliteStore};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DB_PATH: &str = "state/learnledger.sqlite";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map; nothing survives the process.
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: Option<StoreBackend>,
    /// SQLite database file (defaults to `state/learnledger.sqlite`)
    #[serde(default)]
    pub path: Option<String>,
    /// Busy timeout in milliseconds; `LEARNLEDGER_SQLITE_BUSY_MS` wins when set
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    /// `PRAGMA cache_size`; `LEARNLEDGER_SQLITE_CACHE_PAGES` wins when set
    #[serde(default)]
    pub cache_pages: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset, e.g. `info,learnledger=debug`
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

static CONFIG_SCHEMA: Lazy<Result<Validator, String>> = Lazy::new(|| {
    let schema_value = config_schema_json().map_err(|e| e.to_string())?;
    validator_for(&schema_value).map_err(|e| e.to_string())
});

/// JSON schema describing the configuration file.
pub fn config_schema_json() -> Result<serde_json::Value> {
    let schema = schemars::schema_for!(Config);
    Ok(serde_json::to_value(&schema)?)
}

pub fn write_schema_file(path: &Path) -> Result<()> {
    let schema_json = config_schema_json()?;
    std::fs::write(path, serde_json::to_string_pretty(&schema_json)?)
        .with_context(|| format!("write schema to {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let raw: toml::Value = toml::from_str(content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validator = CONFIG_SCHEMA
        .as_ref()
        .map_err(|e| anyhow!("config schema unavailable: {e}"))?;
    let validation_errors: Vec<_> = validator
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow!(validation_errors.join(", ")));
    }
    Ok(toml::from_str(content)?)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("invalid config {}", path.display()))
}

impl Config {
    pub fn backend(&self) -> StoreBackend {
        self.store.backend.unwrap_or_default()
    }

    pub fn db_path(&self) -> &str {
        self.store.path.as_deref().unwrap_or(DEFAULT_DB_PATH)
    }

    pub fn sqlite_options(&self) -> SqliteOptions {
        let mut options = SqliteOptions::default();
        if std::env::var_os("LEARNLEDGER_SQLITE_BUSY_MS").is_none() {
            if let Some(ms) = self.store.busy_timeout_ms {
                options.busy_timeout_ms = ms;
            }
        }
        if std::env::var_os("LEARNLEDGER_SQLITE_CACHE_PAGES").is_none() {
            if let Some(pages) = self.store.cache_pages {
                options.cache_pages = pages;
            }
        }
        options
    }

    pub fn open_store(&self) -> Result<Arc<dyn RecordStore>> {
        match self.backend() {
            StoreBackend::Memory => {
                tracing::debug!("using in-memory record store");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreBackend::Sqlite => {
                let path = Path::new(self.db_path());
                let store = SqliteStore::open_with(path, self.sqlite_options())
                    .with_context(|| format!("open sqlite store {}", path.display()))?;
                Ok(Arc::new(store))
            }
        }
    }
}
