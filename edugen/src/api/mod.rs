//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `GET /`: welcome message
//! - `POST /generate-content`: explanation plus image for a topic
//! - `GET /images/{file}`: generated images, served from the output directory
//!
//! All endpoints are documented with `utoipa`. The document is served at `/openapi.json` and
//! rendered at `/docs` when the server is running.

pub mod handlers;
pub mod models;
