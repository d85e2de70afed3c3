//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] is served as JSON at `/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::api::{
    handlers,
    models::content::{ContentRequest, ContentResponse, ErrorDetail, WelcomeResponse},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Educational Content Generator API",
        description = "Generates an explanation and an illustrative image for a topic, tailored to a learning style.

Generated images are served from `/images/{file}`; the `image_path` field of a content response is that URL path."
    ),
    paths(handlers::root::root, handlers::content::generate_content),
    components(schemas(ContentRequest, ContentResponse, ErrorDetail, WelcomeResponse)),
    tags(
        (name = "root", description = "Service information"),
        (name = "content", description = "Learning content generation"),
    )
)]
pub struct ApiDoc;
