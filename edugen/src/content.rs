//! Content orchestration: one explanation plus one illustration per request.
//!
//! [`ContentGenerator`] fans a request out to an [`ExplanationGenerator`] and an
//! [`ImageGenerator`] at the same time and joins the results. The two calls share nothing but
//! their inputs, so there is no ordering between them. The first failure wins: the sibling call
//! is dropped and the error is returned unchanged, so callers never see an explanation without
//! its image or the reverse.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::Config;
use crate::generation::{ExplanationClient, ExplanationGenerator, GenerationError, ImageClient, ImageGenerator};

/// Learning style used when a request does not name one.
pub const DEFAULT_LEARNING_STYLE: &str = "standard";

/// Result of a successful content generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningContent {
    pub explanation: String,
    /// Local path of the image that was just written
    pub image_path: PathBuf,
}

#[derive(Clone)]
pub struct ContentGenerator {
    explanations: Arc<dyn ExplanationGenerator>,
    images: Arc<dyn ImageGenerator>,
}

impl ContentGenerator {
    pub fn new(explanations: Arc<dyn ExplanationGenerator>, images: Arc<dyn ImageGenerator>) -> Self {
        Self { explanations, images }
    }

    /// Build the reqwest-backed clients from configuration, each with its own credential.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let explanations = ExplanationClient::new(&config.explanation)?;
        let images = ImageClient::new(&config.image, config.output_dir.clone())?;
        Ok(Self::new(Arc::new(explanations), Arc::new(images)))
    }

    /// Generate an explanation and an image for `topic`, both shaped by `learning_style`.
    #[instrument(skip(self), err)]
    pub async fn generate_learning_content(&self, topic: &str, learning_style: &str) -> Result<LearningContent, GenerationError> {
        let (explanation, image_path) = tokio::try_join!(
            self.explanations.generate_explanation(topic, learning_style),
            self.images.generate_image(topic, learning_style),
        )?;

        info!(image = %image_path.display(), "Learning content generated");

        Ok(LearningContent { explanation, image_path })
    }
}
