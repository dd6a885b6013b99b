use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CompanionConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub context: ContextConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// `"stdio"` or `"http"`.
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Record store file name, relative to `data_dir` unless absolute.
    pub memory_db: String,
    /// Journal store file name, relative to `data_dir` unless absolute.
    pub journal_db: String,
    pub default_namespace: String,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    pub max_length: usize,
    pub recent_hours: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search_limit: usize,
    pub list_limit: usize,
    pub journal_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().into_owned(),
            memory_db: "memory.db".into(),
            journal_db: "journal.db".into(),
            default_namespace: "default".into(),
            busy_timeout_ms: crate::db::DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_length: 2000,
            recent_hours: 48,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: 10,
            list_limit: 50,
            journal_limit: 10,
        }
    }
}

impl StorageConfig {
    pub fn memory_db_path(&self) -> PathBuf {
        self.resolve(&self.memory_db)
    }

    pub fn journal_db_path(&self) -> PathBuf {
        self.resolve(&self.journal_db)
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let file = expand_tilde(file);
        if file.is_absolute() {
            file
        } else {
            expand_tilde(&self.data_dir).join(file)
        }
    }
}

/// Returns `~/.companion-memory/`, or `./.companion-memory/` when no home
/// directory can be determined.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".companion-memory")
}

/// Returns the default config file path: `~/.companion-memory/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl CompanionConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CompanionConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (COMPANION_DATA_DIR, COMPANION_NAMESPACE,
    /// COMPANION_LOG_LEVEL, COMPANION_PORT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COMPANION_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("COMPANION_NAMESPACE") {
            self.storage.default_namespace = val;
        }
        if let Ok(val) = std::env::var("COMPANION_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("COMPANION_PORT") {
            match val.parse() {
                Ok(port) => {
                    self.server.port = port;
                    self.server.transport = "http".into();
                }
                Err(_) => tracing::warn!(value = %val, "ignoring unparseable COMPANION_PORT"),
            }
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CompanionConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.default_namespace, "default");
        assert_eq!(config.storage.busy_timeout_ms, 5000);
        assert_eq!(config.context.max_length, 2000);
        assert_eq!(config.context.recent_hours, 48);
        assert!(config.storage.memory_db_path().ends_with("memory.db"));
        assert!(config.storage.journal_db_path().ends_with("journal.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
data_dir = "/tmp/companion"
journal_db = "/var/lib/void.sqlite3"
default_namespace = "emotional-processing"

[context]
max_length = 4000
"#;
        let config: CompanionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(
            config.storage.memory_db_path(),
            PathBuf::from("/tmp/companion/memory.db")
        );
        assert_eq!(
            config.storage.journal_db_path(),
            PathBuf::from("/var/lib/void.sqlite3")
        );
        assert_eq!(config.storage.default_namespace, "emotional-processing");
        assert_eq!(config.context.max_length, 4000);
        // defaults still apply for unset fields
        assert_eq!(config.context.recent_hours, 48);
        assert_eq!(config.retrieval.search_limit, 10);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = CompanionConfig::default();
        std::env::set_var("COMPANION_DATA_DIR", "/tmp/override");
        std::env::set_var("COMPANION_NAMESPACE", "env-ns");
        std::env::set_var("COMPANION_LOG_LEVEL", "trace");
        std::env::set_var("COMPANION_PORT", "9100");

        config.apply_env_overrides();

        assert_eq!(config.storage.data_dir, "/tmp/override");
        assert_eq!(config.storage.default_namespace, "env-ns");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.transport, "http");

        // Clean up
        std::env::remove_var("COMPANION_DATA_DIR");
        std::env::remove_var("COMPANION_NAMESPACE");
        std::env::remove_var("COMPANION_LOG_LEVEL");
        std::env::remove_var("COMPANION_PORT");
    }
}
