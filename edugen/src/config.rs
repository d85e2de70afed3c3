//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `EDUGEN_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `EDUGEN_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `EDUGEN_EXPLANATION__API_KEY=hf_xxx` sets the `explanation.api_key` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use edugen::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Storage**: `output_dir` - where generated images are written and served from
//! - **Explanation endpoint**: `explanation.*` - text-generation endpoint, credential and sampling
//! - **Image endpoint**: `image.*` - image-generation endpoint, credential and generation parameters
//! - **CORS**: `cors.*` - browser access policy
//! - **Telemetry**: `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! EDUGEN_PORT=8080
//! EDUGEN_EXPLANATION__API_KEY="hf_text_token"
//! EDUGEN_IMAGE__API_KEY="hf_image_token"
//! EDUGEN_IMAGE__URL="https://images.example.com/imagine/generate"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "EDUGEN_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Loaded once at startup and never mutated afterwards. Each downstream client is built from its
/// own section, so the two credentials never mix.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Directory generated images are written to, and served from under `/images`
    pub output_dir: PathBuf,
    /// Text-generation endpoint used for explanations
    pub explanation: ExplanationEndpointConfig,
    /// Image-generation endpoint used for illustrations
    pub image: ImageEndpointConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Text-generation endpoint settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplanationEndpointConfig {
    /// Full URL requests are POSTed to
    pub url: Url,
    /// Bearer token for this endpoint
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Upper bound on generated tokens
    pub max_new_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Timeout applied to each request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ExplanationEndpointConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8001/phi3/generate").unwrap(),
            api_key: String::new(),
            max_new_tokens: 300,
            temperature: 0.6,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Image-generation endpoint settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageEndpointConfig {
    /// Full URL requests are POSTed to
    pub url: Url,
    /// Bearer token for this endpoint
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Edge length of the generated image, in pixels
    pub img_size: u32,
    /// Classifier-free guidance scale
    pub guidance_scale: f32,
    /// Number of diffusion steps
    pub num_inference_steps: u32,
    /// Timeout applied to each request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ImageEndpointConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8002/imagine/generate").unwrap(),
            api_key: String::new(),
            img_size: 1024,
            guidance_scale: 7.5,
            num_inference_steps: 50,
            // Diffusion at 50 steps is slow on shared GPUs
            request_timeout: Duration::from_secs(300),
        }
    }
}

// Config is logged at startup, so the bearer tokens stay out of Debug output
impl fmt::Debug for ExplanationEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplanationEndpointConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"<redacted>")
            .field("max_new_tokens", &self.max_new_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl fmt::Debug for ImageEndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageEndpointConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"<redacted>")
            .field("img_size", &self.img_size)
            .field("guidance_scale", &self.guidance_scale)
            .field("num_inference_steps", &self.num_inference_steps)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            output_dir: PathBuf::from("output"),
            explanation: ExplanationEndpointConfig::default(),
            image: ImageEndpointConfig::default(),
            cors: CorsConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.explanation.api_key.trim().is_empty() {
            return Err(Error::Internal {
                operation: "validate config: explanation.api_key is not set. \
                            Set EDUGEN_EXPLANATION__API_KEY or add it to the config file."
                    .to_string(),
            });
        }

        if self.image.api_key.trim().is_empty() {
            return Err(Error::Internal {
                operation: "validate config: image.api_key is not set. \
                            Set EDUGEN_IMAGE__API_KEY or add it to the config file."
                    .to_string(),
            });
        }

        if self.explanation.max_new_tokens == 0 {
            return Err(Error::Internal {
                operation: "validate config: explanation.max_new_tokens must be positive".to_string(),
            });
        }

        if self.image.img_size == 0 {
            return Err(Error::Internal {
                operation: "validate config: image.img_size must be positive".to_string(),
            });
        }

        if self.image.num_inference_steps == 0 {
            return Err(Error::Internal {
                operation: "validate config: image.num_inference_steps must be positive".to_string(),
            });
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "validate config: cors.allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "validate config: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // EDUGEN_CONFIG names the file itself, it is not a config key
            .merge(Env::prefixed("EDUGEN_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
