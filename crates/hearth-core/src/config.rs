//! Configuration module for Hearth.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ListId;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Hearth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub dispatch: DispatchConfig,
    pub urgent: UrgentConfig,
    pub logging: LoggingConfig,
}

/// Backing store location and owner scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database used by the local backing store.
    pub database: PathBuf,
    /// Household whose lists are opened by default.
    pub household: String,
}

/// Remote write dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound for a single create/patch/delete call, in milliseconds.
    /// A call that exceeds it counts as a failed write.
    pub operation_timeout_ms: u64,
}

/// Urgent task view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgentConfig {
    /// Tasks due within this many days of today (inclusive) are urgent.
    pub window_days: u32,
    /// Reserved list id of the derived view. Task lists with this id are
    /// never aggregated into it.
    pub list_id: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/hearth/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("hearth")
            .join("config.yaml")
    }

    /// The reserved urgent-view list id, falling back to the built-in one
    /// if the configured value is not a valid id.
    pub fn urgent_list_id(&self) -> ListId {
        ListId::new(self.urgent.list_id.clone()).unwrap_or_else(|_| ListId::urgent())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("hearth");
        Self {
            database: data_dir.join("hearth.db"),
            household: "home".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 10_000,
        }
    }
}

impl Default for UrgentConfig {
    fn default() -> Self {
        Self {
            window_days: 5,
            list_id: crate::domain::newtypes::URGENT_LIST_ID.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"urgent.window_days"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Longest accepted urgent window, in days.
const MAX_URGENT_WINDOW_DAYS: u32 = 365;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- store ---
        if self.store.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "store.database".into(),
                message: "must not be empty".into(),
            });
        }
        if let Err(e) = crate::domain::HouseholdId::new(self.store.household.clone()) {
            errors.push(ValidationError {
                field: "store.household".into(),
                message: e.to_string(),
            });
        }

        // --- dispatch ---
        if self.dispatch.operation_timeout_ms == 0 {
            errors.push(ValidationError {
                field: "dispatch.operation_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- urgent ---
        if self.urgent.window_days > MAX_URGENT_WINDOW_DAYS {
            errors.push(ValidationError {
                field: "urgent.window_days".into(),
                message: format!("must not exceed {MAX_URGENT_WINDOW_DAYS}"),
            });
        }
        if let Err(e) = ListId::new(self.urgent.list_id.clone()) {
            errors.push(ValidationError {
                field: "urgent.list_id".into(),
                message: e.to_string(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use hearth_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .store_database(PathBuf::from("/tmp/hearth.db"))
///     .urgent_window_days(3)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn store_database(mut self, path: PathBuf) -> Self {
        self.config.store.database = path;
        self
    }

    pub fn store_household(mut self, household: impl Into<String>) -> Self {
        self.config.store.household = household.into();
        self
    }

    pub fn dispatch_operation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.dispatch.operation_timeout_ms = ms;
        self
    }

    pub fn urgent_window_days(mut self, days: u32) -> Self {
        self.config.urgent.window_days = days;
        self
    }

    pub fn urgent_list_id(mut self, id: impl Into<String>) -> Self {
        self.config.urgent.list_id = id.into();
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
