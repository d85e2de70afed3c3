use axum::{Json, extract::State};
use std::path::Path;
use url::Url;

use crate::{
    AppState,
    api::models::content::{ContentRequest, ContentResponse, ErrorDetail},
    errors::{Error, Result},
};

/// Route prefix generated images are served under.
pub const IMAGES_ROUTE: &str = "images";

/// Public URL path for a generated image: `/images/<file name>`, percent-encoded.
fn public_image_path(image_path: &Path) -> Result<String> {
    let file_name = image_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Internal {
            operation: format!("derive a public path for {}", image_path.display()),
        })?;

    let mut url = Url::parse("http://localhost/").map_err(anyhow::Error::from)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("base URL cannot carry path segments"))?
        .pop_if_empty()
        .push(IMAGES_ROUTE)
        .push(file_name);

    Ok(url.path().to_string())
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/generate-content",
    tag = "content",
    summary = "Generate learning content",
    description = "Generates an explanation of the topic and an illustrative image, both tailored to the learning style.

The explanation and the image are requested concurrently. If either fails, the whole request fails and no partial content is returned.",
    request_body = ContentRequest,
    responses(
        (status = 200, description = "Content generated", body = ContentResponse),
        (status = 400, description = "Topic or learning style is blank", body = ErrorDetail),
        (status = 500, description = "A generation service failed or the image could not be stored", body = ErrorDetail),
    )
)]
#[tracing::instrument(skip_all, fields(topic = %request.topic, learning_style = %request.learning_style))]
pub async fn generate_content(State(state): State<AppState>, Json(request): Json<ContentRequest>) -> Result<Json<ContentResponse>> {
    require_non_blank("topic", &request.topic)?;
    require_non_blank("learning_style", &request.learning_style)?;

    let content = state
        .content
        .generate_learning_content(&request.topic, &request.learning_style)
        .await?;

    Ok(Json(ContentResponse {
        explanation: content.explanation,
        image_path: public_image_path(&content.image_path)?,
    }))
}
