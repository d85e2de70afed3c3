//! Clients for the two downstream generation services.
//!
//! Each client is a plain value holding its own credential, endpoint URL and fixed generation
//! parameters, built once from [`crate::config::Config`]. The [`ExplanationGenerator`] and
//! [`ImageGenerator`] traits are the seam the orchestrator in [`crate::content`] depends on, so it
//! can be driven by in-process fakes as well as by the reqwest-backed clients here.
//!
//! No client retries. Transport failures, non-2xx responses, undecodable bodies and filesystem
//! failures all come back as [`GenerationError`]; the one soft failure is an explanation response
//! without generated text, which yields [`explanation::FALLBACK_EXPLANATION`].

pub mod explanation;
pub mod image;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

pub use explanation::ExplanationClient;
pub use image::{ImageClient, output_file_name};

pub(crate) const EXPLANATION_SERVICE: &str = "explanation";
pub(crate) const IMAGE_SERVICE: &str = "image";

/// Longest slice of an upstream error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request never produced a response (connect failure, timeout, reset)
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-2xx status
    #[error("{service} endpoint returned {status}: {body}")]
    UpstreamStatus {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The endpoint answered 2xx but the body was not the expected JSON
    #[error("{service} response could not be decoded: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Creating the output directory or writing the image failed
    #[error("failed to write image to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerationError {
    /// Name of the downstream service the failure belongs to.
    pub fn service(&self) -> &'static str {
        match self {
            GenerationError::Transport { service, .. }
            | GenerationError::UpstreamStatus { service, .. }
            | GenerationError::Decode { service, .. } => service,
            GenerationError::Io { .. } => IMAGE_SERVICE,
        }
    }

    pub(crate) fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| GenerationError::Transport { service, source }
    }

    pub(crate) fn upstream_status(service: &'static str, status: StatusCode, body: &[u8]) -> Self {
        let body: String = String::from_utf8_lossy(body).chars().take(MAX_ERROR_BODY_CHARS).collect();
        GenerationError::UpstreamStatus { service, status, body }
    }
}

/// Produces a free-text explanation of a topic for a learning style.
#[async_trait]
pub trait ExplanationGenerator: Send + Sync {
    async fn generate_explanation(&self, topic: &str, learning_style: &str) -> Result<String, GenerationError>;
}

/// Produces an illustration of a topic and returns where it was written.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, topic: &str, style: &str) -> Result<PathBuf, GenerationError>;
}
