use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

// Default constants
pub const DEFAULT_CONFIG_PATH: &str = "config/ub515.yaml";
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_QUERY_LIMIT: u32 = 500;
pub const DEFAULT_REPORT_ROW_LIMIT: u32 = 10_000;
pub const DEFAULT_TOP_PARTICIPANTS: usize = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SERVICE_NAME: &str = "ub515";

pub const DEFAULT_RESULTS_TABLE: &str = "athletes_results";
pub const DEFAULT_RACES_TABLE: &str = "athletes_race";
pub const DEFAULT_ATHLETES_TABLE: &str = "athletes_athlete";

/// Discrete credential variables read on top of the file and `UB515_*` env.
const LEGACY_DB_VARS: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
];

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
    Ok(s.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseSettings,
    #[serde(default)]
    #[validate(nested)]
    pub query: QuerySettings,
    #[serde(default)]
    #[validate(nested)]
    pub reports: ReportSettings,
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
#[validate(schema(function = "validate_database_settings"))]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_pg_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(
        default,
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: Option<SecretString>,

    /// Database name
    #[serde(default)]
    pub name: Option<String>,

    /// Schema whose tables form the identifier allow-list (PostgreSQL only)
    #[serde(default = "default_schema")]
    #[validate(length(min = 1))]
    pub schema: String,

    #[serde(default = "default_pool_size")]
    #[validate(range(min = 1, max = 1024))]
    pub pool_size: usize,

    /// SQLite database file; `:memory:` opens a private in-memory database
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            host: None,
            port: default_pg_port(),
            user: None,
            password: None,
            name: None,
            schema: default_schema(),
            pool_size: default_pool_size(),
            path: None,
        }
    }
}

impl DatabaseSettings {
    /// Settings for a SQLite store at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Names of the settings the selected backend needs but does not have.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        }

        let mut missing = Vec::new();
        match self.backend {
            StoreBackend::Postgres => {
                if blank(&self.host) {
                    missing.push("host");
                }
                if blank(&self.user) {
                    missing.push("user");
                }
                if blank(&self.name) {
                    missing.push("name");
                }
            }
            StoreBackend::Sqlite => {
                if blank(&self.path) {
                    missing.push("path");
                }
            }
        }
        missing
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }

    /// Connection target with the password masked, for logs and errors.
    pub fn redacted_url(&self) -> String {
        match self.backend {
            StoreBackend::Postgres => format!(
                "postgres://{}{}@{}:{}/{}",
                self.user.as_deref().unwrap_or(""),
                if self.password.is_some() { ":***" } else { "" },
                self.host.as_deref().unwrap_or(""),
                self.port,
                self.name.as_deref().unwrap_or("")
            ),
            StoreBackend::Sqlite => format!("sqlite://{}", self.path.as_deref().unwrap_or("")),
        }
    }
}

fn validate_database_settings(settings: &DatabaseSettings) -> Result<(), ValidationError> {
    let missing = settings.missing_fields();
    if missing.is_empty() {
        return Ok(());
    }
    let mut err = ValidationError::new("missing_connection_settings");
    err.message = Some(
        format!(
            "{} backend requires database.{}",
            settings.backend.as_str(),
            missing.join(", database.")
        )
        .into(),
    );
    Err(err)
}

fn default_pg_port() -> u16 {
    DEFAULT_PG_PORT
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct QuerySettings {
    /// LIMIT applied when a caller does not pass one
    #[serde(default = "default_query_limit")]
    #[validate(range(min = 1))]
    pub default_limit: u32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
        }
    }
}

fn default_query_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ReportSettings {
    /// Rows fetched per source table when building race entries
    #[serde(default = "default_report_row_limit")]
    #[validate(range(min = 1))]
    pub row_limit: u32,

    #[serde(default = "default_top_participants")]
    #[validate(range(min = 1))]
    pub top_participants: usize,

    #[serde(default = "default_results_table")]
    pub results_table: String,

    #[serde(default = "default_races_table")]
    pub races_table: String,

    #[serde(default = "default_athletes_table")]
    pub athletes_table: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            row_limit: default_report_row_limit(),
            top_participants: default_top_participants(),
            results_table: default_results_table(),
            races_table: default_races_table(),
            athletes_table: default_athletes_table(),
        }
    }
}

fn default_report_row_limit() -> u32 {
    DEFAULT_REPORT_ROW_LIMIT
}

fn default_top_participants() -> usize {
    DEFAULT_TOP_PARTICIPANTS
}

fn default_results_table() -> String {
    DEFAULT_RESULTS_TABLE.to_string()
}

fn default_races_table() -> String {
    DEFAULT_RACES_TABLE.to_string()
}

fn default_athletes_table() -> String {
    DEFAULT_ATHLETES_TABLE.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// timestamp LEVEL target - message
    #[default]
    Compact,
    /// JSON lines
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Per-target level overrides, e.g. `tokio_postgres: warn`
    #[serde(default)]
    pub targets: HashMap<String, String>,

    /// OTLP/gRPC collector; spans are exported only with the `telemetry` feature
    #[serde(default)]
    #[validate(url)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            targets: HashMap::new(),
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

impl AppConfig {
    /// Load from `path` (if it exists), then `UB515_*` environment variables
    /// (`UB515_DATABASE__HOST` maps to `database.host`), then the discrete
    /// `DB_HOST`/`DB_PORT`/`DB_USER`/`DB_PASSWORD`/`DB_NAME` variables.
    pub fn from_file(path: &str) -> Result<Self> {
        let app_config = Self::load_unvalidated(path)?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        Ok(app_config)
    }

    /// Same layering as [`AppConfig::from_file`] without validation, for
    /// callers that only need logging settings before failing properly.
    pub fn load_unvalidated(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        let mut builder = builder.add_source(
            config::Environment::with_prefix("UB515")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in LEGACY_DB_VARS {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder
                .set_override_option(*key, value)
                .with_context(|| format!("Invalid value in {}", var))?;
        }

        let cfg = builder.build().context("Failed to build configuration")?;

        cfg.try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
