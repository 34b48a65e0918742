//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/kuzumem/config.toml` (XDG) or platform config dir
//! 2. Project config: `.kuzumem.toml`
//! 3. Environment variables: `KUZUMEM_*`
//! 4. Fixed environment overrides: `DB_PATH_OVERRIDE`, `CLIENT_PROJECT_ROOT`,
//!    `HTTP_STREAM_PORT`, `HOST`, `DEBUG_LEVEL`

use std::ops::Deref;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Embedded database layout and behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Directory under the client project root holding the memory bank.
    #[serde(default = "default_relative_dir")]
    pub relative_dir: String,
    /// Database file name inside `relative_dir`.
    #[serde(default = "default_filename")]
    pub filename: String,
    /// Absolute path overriding per-project resolution. Testing only:
    /// this breaks multi-project isolation.
    pub path_override: Option<PathBuf>,
    /// Default query timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            relative_dir: default_relative_dir(),
            filename: default_filename(),
            path_override: None,
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

fn default_relative_dir() -> String {
    ".kuzumem".to_string()
}

fn default_filename() -> String {
    "memory-bank.db".to_string()
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Verbosity 0-3: error/warn, info, debug, trace.
    #[serde(default = "default_debug_level")]
    pub debug_level: u8,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug_level: default_debug_level(),
        }
    }
}

fn default_debug_level() -> u8 {
    1
}

impl Config {
    /// Load config with layered resolution (user → project → env → fixed overrides).
    pub fn load() -> Result<Self, ConfigError> {
        let user_config = Self::user_config_path();

        let mut config: Config = Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(user_config))
            // Layer 2: Project config
            .merge(Toml::file(".kuzumem.toml"))
            // Layer 3: Environment variables
            // Use double underscore for nesting (e.g., KUZUMEM_SERVER__PORT -> server.port)
            .merge(Env::prefixed("KUZUMEM_").map(|key| key.as_str().replace("__", ".").into()))
            .extract()
            .map_err(ConfigError::from)?;

        config.apply_fixed_env();
        Ok(config)
    }

    /// The five externally documented env vars win over every file layer.
    fn apply_fixed_env(&mut self) {
        if let Ok(path) = std::env::var("DB_PATH_OVERRIDE") {
            if !path.is_empty() {
                self.database.path_override = Some(PathBuf::from(path));
            }
        }
        if let Ok(port) = std::env::var("HTTP_STREAM_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(host) = std::env::var("HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(level) = std::env::var("DEBUG_LEVEL") {
            if let Ok(level) = level.parse() {
                self.log.debug_level = level;
            }
        }
    }

    /// Default client project root from the environment, if set.
    pub fn default_client_project_root() -> Option<PathBuf> {
        std::env::var("CLIENT_PROJECT_ROOT")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// Maps `debug_level` to a tracing directive.
    pub fn log_directive(&self) -> &'static str {
        match self.log.debug_level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// User config path: ~/.config/kuzumem/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("kuzumem").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("kuzumem").join("config.toml"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.relative_dir, ".kuzumem");
        assert_eq!(config.database.filename, "memory-bank.db");
        assert_eq!(config.database.query_timeout_ms, 30_000);
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn test_log_directive_mapping() {
        let mut config = Config::default();
        config.log.debug_level = 0;
        assert_eq!(config.log_directive(), "warn");
        config.log.debug_level = 3;
        assert_eq!(config.log_directive(), "trace");
    }
}
