//! Configuration for backends and the dispatch loop.
//!
//! Configuration is explicit and constructor-injected: there is no
//! process-wide default connection string. A config file plus
//! `PLANFORCE`-prefixed environment variables (e.g.
//! `PLANFORCE__DISPATCH__DEFAULT_TIMEOUT_MS`) are merged, deserialized
//! and validated before anything connects to a database.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use validator::Validate;

// Default constants
pub const DEFAULT_TIMEOUT_GRACE_MS: u64 = 2_000;
pub const DEFAULT_DISABLE_GENETIC_OPTIMIZER: bool = true;
pub const DEFAULT_ENABLE_OPTIMIZER: bool = true;

// Custom Serde logic for SecretString
fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(_) => serializer.serialize_str("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub dispatch: DispatchSettings,
}

/// One relational backend the dispatcher may target.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct BackendConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Backend kind, e.g. `postgres` or `duckdb`.
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub kind: String,

    /// Connection string for server backends (Postgres).
    pub dsn: Option<String>,

    /// Database file path for embedded backends (DuckDB).
    pub path: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: Option<SecretString>,

    /// Postgres only: disable the genetic query optimizer so forced
    /// join orders are not perturbed.
    #[serde(default = "default_disable_genetic_optimizer")]
    pub disable_genetic_optimizer: bool,

    /// DuckDB only: leave the native optimizer on when executing.
    #[serde(default = "default_enable_optimizer")]
    pub enable_optimizer: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DispatchSettings {
    /// Per-statement timeout applied when a job does not carry its own.
    /// `None` means unbounded.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Slack added on top of the backend-side timeout before the
    /// dispatcher abandons the call.
    #[serde(default = "default_timeout_grace_ms")]
    pub timeout_grace_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            timeout_grace_ms: default_timeout_grace_ms(),
        }
    }
}

fn default_timeout_grace_ms() -> u64 {
    DEFAULT_TIMEOUT_GRACE_MS
}

fn default_disable_genetic_optimizer() -> bool {
    DEFAULT_DISABLE_GENETIC_OPTIMIZER
}

fn default_enable_optimizer() -> bool {
    DEFAULT_ENABLE_OPTIMIZER
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // Map PLANFORCE__DISPATCH__TIMEOUT_GRACE_MS to
        // dispatch.timeout_grace_ms, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("PLANFORCE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}
