use axum::Json;

use crate::api::models::content::WelcomeResponse;

pub const WELCOME_MESSAGE: &str = "Welcome to Educational Content Generator API";

#[utoipa::path(
    get,
    path = "/",
    tag = "root",
    summary = "Welcome",
    responses(
        (status = 200, description = "Service is up", body = WelcomeResponse),
    )
)]
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}
