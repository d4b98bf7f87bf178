//! Centralized configuration for the heatwave CLI.
//!
//! All environment variables are loaded and validated before any command
//! runs, so misconfiguration fails fast instead of halfway through a write.

use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost when the process exits)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite") {
            Some(Self::Sqlite)
        } else if s.eq_ignore_ascii_case("memory") {
            Some(Self::Memory)
        } else {
            None
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Some(Self::Pretty)
        } else {
            None
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage provider (default: sqlite)
    pub storage_provider: StorageProvider,
    /// SQLite database path (default: ./data/heatwave.db)
    pub db_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Storage provider
        let provider_str = get("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into());
        let storage_provider =
            StorageProvider::parse(&provider_str).ok_or_else(|| ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("expected 'sqlite' or 'memory', got '{}'", provider_str),
            })?;

        // DB path (for sqlite)
        let db_path = get("DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/heatwave.db"));

        // Log format
        let format_str = get("LOG_FORMAT").unwrap_or_else(|| "pretty".into());
        let log_format = LogFormat::parse(&format_str).ok_or_else(|| ConfigError {
            field: "LOG_FORMAT",
            message: format!("expected 'pretty' or 'json', got '{}'", format_str),
        })?;

        Ok(Self {
            storage_provider,
            db_path,
            log_format,
        })
    }

    /// Log warnings about settings that lose data.
    pub fn warn_if_volatile(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: measurements are not persisted across runs."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::parse("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::parse("sqlite"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("mssql"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("jsn"), None);
    }

    #[test]
    fn invalid_log_format_fails_fast() {
        let err = load(&[("LOG_FORMAT", "jsn")]).unwrap_err();
        assert_eq!(err.field, "LOG_FORMAT");
        assert!(err.message.contains("jsn"));
        assert_eq!(load(&[("LOG_FORMAT", "json")]).unwrap().log_format, LogFormat::Json);
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from("./data/heatwave.db"));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_provider_fails_fast() {
        let err = load(&[("STORAGE_PROVIDER", "postgres")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");
    }

    #[test]
    fn blank_db_path_uses_default() {
        let cfg = load(&[("DB_PATH", "  "), ("STORAGE_PROVIDER", "memory")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("./data/heatwave.db"));
        assert_eq!(cfg.storage_provider, StorageProvider::Memory);
    }
}
