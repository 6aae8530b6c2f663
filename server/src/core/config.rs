use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_EXCLUDE, DEFAULT_HOST, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MODEL_MARKER, DEFAULT_PORT,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Capture configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CaptureFileConfig {
    pub error_record: Option<bool>,
    pub only_route: Option<bool>,
    pub exclude: Option<Vec<String>>,
    pub model_marker: Option<String>,
    pub max_body_bytes: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub capture: Option<CaptureFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        // Capture
        if let Some(capture) = other.capture {
            let current = self.capture.get_or_insert_with(CaptureFileConfig::default);
            if capture.error_record.is_some() {
                current.error_record = capture.error_record;
            }
            if capture.only_route.is_some() {
                current.only_route = capture.only_route;
            }
            if capture.exclude.is_some() {
                tracing::trace!(exclude = ?capture.exclude, "Merging capture.exclude");
                current.exclude = capture.exclude;
            }
            if capture.model_marker.is_some() {
                current.model_marker = capture.model_marker;
            }
            if capture.max_body_bytes.is_some() {
                current.max_body_bytes = capture.max_body_bytes;
            }
        }

        // Debug
        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Resolved Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub error_record: bool,
    pub only_route: bool,
    pub exclude: Vec<String>,
    pub model_marker: String,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.periscope/periscope.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.periscope/periscope.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::resolve(file_config, cli)
    }

    /// Layer CLI/env overrides on top of file values and defaults
    fn resolve(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_capture = file_config.capture.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        // --debug can only switch debug on; the file decides otherwise
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let capture = CaptureConfig {
            error_record: cli
                .error_record
                .or(file_capture.error_record)
                .unwrap_or(false),
            only_route: cli.only_route.or(file_capture.only_route).unwrap_or(false),
            exclude: cli
                .exclude
                .clone()
                .or(file_capture.exclude)
                .unwrap_or_else(|| DEFAULT_EXCLUDE.iter().map(|p| p.to_string()).collect())
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            model_marker: file_capture
                .model_marker
                .unwrap_or_else(|| DEFAULT_MODEL_MARKER.to_string()),
            max_body_bytes: file_capture
                .max_body_bytes
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        };

        let config = Self {
            server: ServerConfig { host, port },
            capture,
            debug,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            debug = config.debug,
            error_record = config.capture.error_record,
            only_route = config.capture.only_route,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        // Host must not be empty
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port must be non-zero (port 0 would cause bind failure)
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if let Some(bad) = self.capture.exclude.iter().find(|p| !p.starts_with('/')) {
            anyhow::bail!(
                "Configuration error: capture.exclude pattern '{}' must start with '/'",
                bad
            );
        }

        if !self.debug && !self.capture.error_record {
            tracing::debug!("Capture disabled (neither debug nor error_record is set)");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.periscope/periscope.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}
