//! Bootstrap configuration loading
//!
//! The TOML file holds bootstrap settings only; nothing here changes while the
//! service runs. Resolution priority for each setting:
//!
//! 1. Command-line argument (highest priority, handled by the binary)
//! 2. Environment variable (handled by the binary)
//! 3. TOML config file
//! 4. Built-in defaults (fallback)
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with defaults. A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CSV file mapping pest names to pesticide names
    #[serde(default = "default_pesticide_data_path")]
    pub pesticide_data_path: PathBuf,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Upper bound for request bodies (image uploads)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Classifier weights and placement
    #[serde(default)]
    pub model: ModelConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Text-generation collaborator (optional; recommendations are disabled without it)
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Classifier model configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Local path or `http(s)://` URL of the ONNX weights
    #[serde(default = "default_model_location")]
    pub location: String,

    /// Where a downloaded model is kept between restarts
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Compute device: `auto`, `cpu`, `cuda` or `cuda:<id>`
    #[serde(default = "default_device")]
    pub device: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Text-generation collaborator configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model name sent with each completion request
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// API key; `PESTOPIA_LLM_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_generation_timeout")]
    pub timeout_seconds: u64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_pesticide_data_path() -> PathBuf {
    PathBuf::from("data/Pesticides.csv")
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_model_location() -> String {
    "models/convnext_pestopia.onnx".to_string()
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generation_timeout() -> u64 {
    60
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            pesticide_data_path: default_pesticide_data_path(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            model: ModelConfig::default(),
            logging: LoggingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            location: default_model_location(),
            cache_path: None,
            device: default_device(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_generation_model(),
            api_key: None,
            timeout_seconds: default_generation_timeout(),
        }
    }
}

/// Platform config file location: `<config dir>/pestopia/pestopia-api.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pestopia").join("pestopia-api.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML config, falling back to defaults when the file is absent
///
/// `explicit` is the path given on the command line or via `PESTOPIA_CONFIG`;
/// without it the platform default location is tried.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
