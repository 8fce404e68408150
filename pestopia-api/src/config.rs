//! Configuration resolution for pestopia-api
//!
//! Priority for every setting: command line → environment → TOML → defaults.
//! Command line and environment are handled together by clap (`env = ...`);
//! [`CliArgs::apply`] layers them over the TOML file.

use std::path::PathBuf;

use clap::Parser;
use pestopia_common::config::TomlConfig;
use tracing::{info, warn};

/// Environment variable holding the text-generation API key
pub const LLM_API_KEY_ENV: &str = "PESTOPIA_LLM_API_KEY";

#[derive(Parser, Debug, Default)]
#[command(name = "pestopia-api")]
#[command(about = "Pest classification and advisory service")]
#[command(version)]
pub struct CliArgs {
    /// TOML config file (default: <config dir>/pestopia/pestopia-api.toml)
    #[arg(short, long, env = "PESTOPIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PESTOPIA_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "PESTOPIA_BIND")]
    pub bind: Option<String>,

    /// ONNX model path or http(s) URL
    #[arg(short, long, env = "PESTOPIA_MODEL")]
    pub model: Option<String>,

    /// Where a downloaded model is cached
    #[arg(long, env = "PESTOPIA_MODEL_CACHE")]
    pub model_cache: Option<PathBuf>,

    /// Compute device: auto, cpu, cuda or cuda:<id>
    #[arg(short, long, env = "PESTOPIA_DEVICE")]
    pub device: Option<String>,

    /// Pest → pesticide CSV
    #[arg(long, env = "PESTOPIA_PESTICIDE_DATA")]
    pub pesticide_data: Option<PathBuf>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "PESTOPIA_LLM_ENDPOINT")]
    pub llm_endpoint: Option<String>,

    /// Model name for completion requests
    #[arg(long, env = "PESTOPIA_LLM_MODEL")]
    pub llm_model: Option<String>,
}

impl CliArgs {
    /// Overlay command-line/environment values on the TOML config
    pub fn apply(self, mut config: TomlConfig) -> TomlConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(model) = self.model {
            config.model.location = model;
        }
        if let Some(cache) = self.model_cache {
            config.model.cache_path = Some(cache);
        }
        if let Some(device) = self.device {
            config.model.device = device;
        }
        if let Some(path) = self.pesticide_data {
            config.pesticide_data_path = path;
        }
        if let Some(endpoint) = self.llm_endpoint {
            config.generation.endpoint = Some(endpoint);
        }
        if let Some(model) = self.llm_model {
            config.generation.model = model;
        }
        config
    }
}

/// Resolve the text-generation API key
///
/// **Priority:** ENV → TOML. A key is optional; local OpenAI-compatible
/// servers usually run without one.
pub fn resolve_llm_api_key(toml_config: &TomlConfig) -> Option<String> {
    resolve_llm_api_key_from(std::env::var(LLM_API_KEY_ENV).ok(), toml_config)
}

/// Key resolution with the environment value supplied by the caller
pub fn resolve_llm_api_key_from(
    env_key: Option<String>,
    toml_config: &TomlConfig,
) -> Option<String> {
    let env_key = env_key.filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .generation
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("LLM API key found in environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("LLM API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("LLM API key loaded from TOML config");
        return Some(key);
    }
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
