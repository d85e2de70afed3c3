//! API request/response models for content generation.

use crate::content::DEFAULT_LEARNING_STYLE;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_learning_style() -> String {
    DEFAULT_LEARNING_STYLE.to_string()
}

/// Request body for generating learning content.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentRequest {
    /// Subject to explain and illustrate
    #[schema(example = "Photosynthesis")]
    pub topic: String,
    /// Learning style the explanation and image are tailored to
    #[serde(default = "default_learning_style")]
    #[schema(example = "visual", default = "standard")]
    pub learning_style: String,
}

/// Generated learning content.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentResponse {
    /// Explanation text, or a fixed fallback sentence when the model returned none
    pub explanation: String,
    /// URL path the generated image is served from
    #[schema(example = "/images/Photosynthesisvisual_educational_image.png")]
    pub image_path: String,
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Human-readable failure description
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WelcomeResponse {
    #[schema(example = "Welcome to Educational Content Generator API")]
    pub message: String,
}
