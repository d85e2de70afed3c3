//! Text-generation client for topic explanations.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{EXPLANATION_SERVICE, ExplanationGenerator, GenerationError};
use crate::config::ExplanationEndpointConfig;

/// Returned in place of an explanation when the endpoint answers without generated text.
pub const FALLBACK_EXPLANATION: &str = "Unable to generate explanation";

const SYSTEM_PROMPT: &str = "You are an educational AI assistant that provides clear, adaptive explanations.";

#[derive(Debug, Serialize)]
struct GenerateTextRequest {
    inputs: String,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
}

/// Text-generation servers answer either with a single object or with a one-element list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateTextResponse {
    Single(GeneratedText),
    Batch(Vec<GeneratedText>),
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: Option<String>,
}

impl GenerateTextResponse {
    fn into_text(self) -> Option<String> {
        let text = match self {
            GenerateTextResponse::Single(single) => single.generated_text,
            GenerateTextResponse::Batch(batch) => batch.into_iter().next().and_then(|first| first.generated_text),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

/// Builds the user request embedded in the chat template.
pub fn explanation_prompt(topic: &str, learning_style: &str) -> String {
    format!(
        "Explain {topic} in a way that suits a {learning_style} learner. \
         Break down complex concepts into simple, understandable parts."
    )
}

/// Wraps a user request in the fixed system/user/assistant chat template.
fn chat_template(prompt: &str) -> String {
    format!("<|system|>\n{SYSTEM_PROMPT}\n<|end|>\n<|user|>\n{prompt}<|end|>\n<|assistant|>")
}

/// Client for the explanation endpoint.
#[derive(Clone)]
pub struct ExplanationClient {
    client: Client,
    url: Url,
    api_key: String,
    max_new_tokens: u32,
    temperature: f32,
}

impl ExplanationClient {
    pub fn new(config: &ExplanationEndpointConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ExplanationGenerator for ExplanationClient {
    #[instrument(skip(self), err)]
    async fn generate_explanation(&self, topic: &str, learning_style: &str) -> Result<String, GenerationError> {
        let request = GenerateTextRequest {
            inputs: chat_template(&explanation_prompt(topic, learning_style)),
            parameters: GenerationParameters {
                max_new_tokens: self.max_new_tokens,
                temperature: self.temperature,
            },
        };

        debug!(url = %self.url, "Requesting explanation");

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(GenerationError::transport(EXPLANATION_SERVICE))?;

        let status = response.status();
        let body = response.bytes().await.map_err(GenerationError::transport(EXPLANATION_SERVICE))?;

        if !status.is_success() {
            return Err(GenerationError::upstream_status(EXPLANATION_SERVICE, status, &body));
        }

        let parsed: GenerateTextResponse = serde_json::from_slice(&body).map_err(|source| GenerationError::Decode {
            service: EXPLANATION_SERVICE,
            source,
        })?;

        match parsed.into_text() {
            Some(text) => {
                debug!(chars = text.len(), "Explanation generated");
                Ok(text)
            }
            None => {
                warn!("Explanation response carried no generated_text, using fallback");
                Ok(FALLBACK_EXPLANATION.to_string())
            }
        }
    }
}
