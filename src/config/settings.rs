//! Settings file and environment overrides.
//!
//! The binary reads `config.toml` from the platform config directory (or a
//! path given on the command line) and then applies `SIGNIN_*` environment
//! variables on top.

use super::{SignInConfig, defaults, parse_date};
use crate::models::FieldKind;
use crate::{Error, Result};
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct SettingsFile {
    /// Store section.
    pub store: Option<SettingsFileStore>,
    /// Epoch section.
    pub epoch: Option<SettingsFileEpoch>,
    /// Logging section.
    pub logging: Option<SettingsFileLogging>,
}

/// `[store]` section in the settings file.
#[derive(Debug, Deserialize, Default)]
pub struct SettingsFileStore {
    /// Redis URL for a standalone server.
    pub url: Option<String>,
    /// Redis cluster node URLs.
    pub cluster_nodes: Option<Vec<String>>,
    /// Command timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[epoch]` section in the settings file.
#[derive(Debug, Deserialize, Default)]
pub struct SettingsFileEpoch {
    /// Key prefix.
    pub key_prefix: Option<String>,
    /// Bucket length in seconds.
    pub interval_secs: Option<i64>,
    /// Epoch start date.
    pub start_date: Option<String>,
    /// Epoch end date.
    pub end_date: Option<String>,
    /// `unsigned` or `signed`.
    pub field_kind: Option<String>,
    /// `strftime` pattern for key suffixes and labels.
    pub date_format: Option<String>,
    /// Reject dates past `now + interval`.
    pub future_guard: Option<bool>,
    /// Debug mode.
    pub debug: Option<bool>,
}

/// `[logging]` section in the settings file.
#[derive(Debug, Deserialize, Default)]
pub struct SettingsFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive.
    pub filter: Option<String>,
}

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Standalone Redis URL.
    pub url: Option<String>,
    /// Cluster node URLs; when non-empty they take precedence over `url`.
    pub cluster_nodes: Vec<String>,
    /// Command timeout.
    pub timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: Some(defaults::DEFAULT_REDIS_URL.to_string()),
            cluster_nodes: Vec::new(),
            timeout: Duration::from_secs(defaults::DEFAULT_STORE_TIMEOUT_SECS),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive.
    pub filter: Option<String>,
}

/// Epoch settings as written in the file, parsed lazily.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EpochSettings {
    key_prefix: Option<String>,
    interval_secs: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
    field_kind: Option<String>,
    date_format: Option<String>,
    future_guard: Option<bool>,
    debug: bool,
}

/// Resolved settings for the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Store connection settings.
    pub store: StoreSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
    epoch: EpochSettings,
}

impl Settings {
    /// Loads settings from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;

        let file: SettingsFile = toml::from_str(&contents).map_err(|e| {
            Error::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })?;

        let mut settings = Self::from_settings_file(file);
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Loads settings from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/.config/signin/` on Linux)
    /// 2. `~/.config/signin/` for platforms whose config dir differs
    ///
    /// Falls back to defaults plus environment overrides if no file is found.
    #[must_use]
    pub fn load_default() -> Self {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            let candidates = [
                base_dirs.config_dir().join("signin").join("config.toml"),
                base_dirs
                    .home_dir()
                    .join(".config")
                    .join("signin")
                    .join("config.toml"),
            ];
            for path in candidates {
                if path.exists() {
                    match Self::load_from_file(&path) {
                        Ok(settings) => return settings,
                        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable settings file"),
                    }
                }
            }
        }

        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Converts a parsed file into settings, keeping defaults for gaps.
    #[must_use]
    pub fn from_settings_file(file: SettingsFile) -> Self {
        let mut settings = Self::default();

        if let Some(store) = file.store {
            if let Some(url) = store.url {
                settings.store.url = non_empty(url);
            }
            if let Some(nodes) = store.cluster_nodes {
                settings.store.cluster_nodes = nodes;
            }
            if let Some(secs) = store.timeout_secs {
                settings.store.timeout = Duration::from_secs(secs);
            }
        }
        if let Some(epoch) = file.epoch {
            settings.epoch = EpochSettings {
                key_prefix: epoch.key_prefix,
                interval_secs: epoch.interval_secs,
                start_date: epoch.start_date,
                end_date: epoch.end_date,
                field_kind: epoch.field_kind,
                date_format: epoch.date_format,
                future_guard: epoch.future_guard,
                debug: epoch.debug.unwrap_or(false),
            };
        }
        if let Some(logging) = file.logging {
            settings.logging = LoggingSettings {
                format: logging.format,
                filter: logging.filter,
            };
        }

        settings
    }

    /// Applies `SIGNIN_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SIGNIN_REDIS_URL") {
            self.store.url = non_empty(url);
        }
        if let Some(nodes) = lookup("SIGNIN_REDIS_CLUSTER_NODES") {
            self.store.cluster_nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(prefix) = lookup("SIGNIN_KEY_PREFIX") {
            self.epoch.key_prefix = Some(prefix);
        }
        if let Some(start) = lookup("SIGNIN_START_DATE") {
            self.epoch.start_date = Some(start);
        }
        if let Some(end) = lookup("SIGNIN_END_DATE") {
            self.epoch.end_date = non_empty(end);
        }
        if let Some(value) = lookup("SIGNIN_INTERVAL_SECS") {
            match value.trim().parse() {
                Ok(secs) => self.epoch.interval_secs = Some(secs),
                Err(e) => tracing::warn!(
                    value = %value,
                    error = %e,
                    "Ignoring malformed SIGNIN_INTERVAL_SECS"
                ),
            }
        }
        if let Some(filter) = lookup("SIGNIN_LOG") {
            self.logging.filter = Some(filter);
        }
        if let Some(format) = lookup("SIGNIN_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
    }

    /// Sets the epoch start date string.
    #[must_use]
    pub fn with_start_date(mut self, start: impl Into<String>) -> Self {
        self.epoch.start_date = Some(start.into());
        self
    }

    /// Whether the epoch section asks for debug mode.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.epoch.debug
    }

    /// Builds the engine configuration from the epoch settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a date cannot be parsed, the field kind is
    /// unknown, or the resulting configuration fails validation.
    pub fn signin_config(&self) -> Result<SignInConfig> {
        let epoch = &self.epoch;
        let mut builder = SignInConfig::builder().debug(epoch.debug);

        if let Some(start) = &epoch.start_date {
            builder = builder.start_date(parse_date(start)?);
        }
        if let Some(end) = &epoch.end_date {
            builder = builder.end_date(parse_date(end)?);
        }
        if let Some(prefix) = &epoch.key_prefix {
            builder = builder.key_prefix(prefix.clone());
        }
        if let Some(secs) = epoch.interval_secs {
            let interval = TimeDelta::try_seconds(secs).ok_or_else(|| {
                Error::InvalidConfig(format!("interval of {secs}s is out of range"))
            })?;
            builder = builder.interval(interval);
        }
        if let Some(kind) = &epoch.field_kind {
            let kind = FieldKind::parse(kind)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown field kind '{kind}'")))?;
            builder = builder.field_kind(kind);
        }
        if let Some(format) = &epoch.date_format {
            builder = builder.date_format(format.clone());
        }
        if let Some(guard) = epoch.future_guard {
            builder = builder.future_guard(guard);
        }

        builder.build()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
