//! # edugen: Educational Content Generator
//!
//! `edugen` is a small HTTP service that turns a topic into learning material. For each request it
//! asks a text-generation endpoint for an explanation tailored to a learning style and, at the same
//! time, asks an image-generation endpoint for an illustrative infographic. The explanation comes
//! back in the response body; the image is written to a local directory and served from `/images`.
//!
//! ## Architecture
//!
//! - [`generation`]: one reqwest client per downstream service, each holding its own credential,
//!   URL and fixed generation parameters
//! - [`content`]: the orchestrator that runs both calls concurrently and joins the results
//! - [`api`]: Axum handlers and wire models
//! - [`config`]: YAML plus environment configuration, loaded once at startup
//! - [`errors`]: error type and its HTTP mapping
//! - [`telemetry`]: tracing subscriber with optional OTLP export
//!
//! ### Request Flow
//!
//! `POST /generate-content` validates that topic and learning style are non-blank, then hands both
//! to [`content::ContentGenerator`]. The two downstream calls run concurrently; if either fails the
//! request fails with `500` and `{"detail": "..."}`. On success the local image path is rewritten
//! to its public `/images/<file name>` URL path.
//!
//! Images are named after topic and style, so the same pair always maps to the same file and a
//! later request overwrites an earlier one. Writes go through a staging file and a rename, so
//! readers never see a half-written image.
//!
//! ## Configuration
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8000
//! output_dir: output
//! explanation:
//!   url: https://text.example.com/phi3/generate
//!   api_key: hf_text_token
//! image:
//!   url: https://images.example.com/imagine/generate
//!   api_key: hf_image_token
//! ```
//!
//! Any field can be overridden with an `EDUGEN_`-prefixed environment variable, using `__` for
//! nesting (for example `EDUGEN_IMAGE__API_KEY`). See [`config`] for the full structure.
//!
//! ## Getting Started
//!
//! ```no_run
//! use edugen::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = Application::new(config)?;
//!     app.serve(std::future::pending()).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod content;
pub mod errors;
pub mod generation;
pub mod openapi;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

use axum::{
    Json, Router,
    http::HeaderValue,
    routing::{get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use config::CorsOrigin;
use content::ContentGenerator;
use openapi::ApiDoc;

/// Application state shared across all request handlers.
///
/// Cloned into every handler; the generators behind [`ContentGenerator`] are reference counted,
/// so a clone is cheap.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .content(content)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub content: ContentGenerator,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let wildcard = cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard));
    // tower-http panics on this combination
    anyhow::ensure!(
        !(wildcard && cors_config.allow_credentials),
        "CORS cannot combine the wildcard origin with allow_credentials"
    );

    let allow_origin = if wildcard {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send origins without a trailing slash
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `GET /` welcome message, `GET /healthz` liveness
/// - `POST /generate-content`
/// - `GET /images/*` generated images from the output directory
/// - `GET /openapi.json` and `GET /docs`
///
/// CORS and request tracing wrap every route.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;
    let images = ServeDir::new(&state.config.output_dir);

    let router = Router::new()
        .route("/", get(api::handlers::root::root))
        .route("/healthz", get(|| async { "OK" }))
        .route("/generate-content", post(api::handlers::content::generate_content))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest_service(&format!("/{}", api::handlers::content::IMAGES_ROUTE), images)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// A configured service, ready to bind and serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Build clients, state and router from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting content generator with configuration: {:#?}", config);

        let content = ContentGenerator::from_config(&config)?;
        let state = AppState::builder().config(config.clone()).content(content).build();
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Serve until `shutdown` resolves, then flush telemetry.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Content generator listening on http://{}, images served from {}",
            bind_addr,
            self.config.output_dir.display()
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
