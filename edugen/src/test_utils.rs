//! Shared helpers for unit tests.

use crate::config::{Config, ExplanationEndpointConfig, ImageEndpointConfig};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Install the rustls crypto provider reqwest needs to build a client.
///
/// The binary does this in `main`; tests share one process, so later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Configuration pointing both generation endpoints at `server_uri` (usually a wiremock server)
/// and writing images to `root/images`, so the staging sibling also lives under `root`.
pub fn create_test_config(server_uri: &str, root: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        output_dir: root.join("images"),
        explanation: ExplanationEndpointConfig {
            url: Url::parse(&format!("{server_uri}/phi3/generate")).unwrap(),
            api_key: "text-token".to_string(),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        image: ImageEndpointConfig {
            url: Url::parse(&format!("{server_uri}/imagine/generate")).unwrap(),
            api_key: "image-token".to_string(),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build the full application router for `config` and wrap it in an in-process test server.
pub fn create_test_server(config: Config) -> axum_test::TestServer {
    install_crypto_provider();
    crate::Application::new(config)
        .expect("Failed to create application")
        .into_test_server()
}
