//! Image-generation client. Generated images are written under the output directory with a name
//! derived from topic and style, so repeated requests for the same pair overwrite one file.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{GenerationError, IMAGE_SERVICE, ImageGenerator};
use crate::config::ImageEndpointConfig;

const FILE_SUFFIX: &str = "_educational_image.png";

#[derive(Debug, Serialize)]
struct GenerateImageRequest {
    prompt: String,
    img_size: u32,
    guidance_scale: f32,
    num_inference_steps: u32,
}

/// Builds the infographic prompt sent to the image endpoint.
pub fn image_prompt(topic: &str, style: &str) -> String {
    format!("Educational infographic about {topic}, clean design,{style} informative illustration, academic style")
}

/// File name an image for `topic` and `style` is stored under.
///
/// Topic and style are concatenated without a separator. Whitespace and path separators become
/// underscores, which keeps the file inside the output directory whatever the topic says.
pub fn output_file_name(topic: &str, style: &str) -> String {
    format!("{}{}{FILE_SUFFIX}", sanitize(topic), sanitize(style))
}

/// Directory partial writes are staged in before being renamed into `output_dir`.
///
/// A hidden sibling of the output directory, so staging files are never reachable through the
/// static route that serves `output_dir`, while staying on the same filesystem for the rename.
pub fn staging_dir_for(output_dir: &Path) -> PathBuf {
    match (output_dir.parent(), output_dir.file_name()) {
        (Some(parent), Some(name)) => parent.join(format!(".{}.staging", name.to_string_lossy())),
        // `.`, `..` or a filesystem root
        _ => output_dir.join(".staging"),
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Client for the image endpoint.
#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    url: Url,
    api_key: String,
    img_size: u32,
    guidance_scale: f32,
    num_inference_steps: u32,
    output_dir: PathBuf,
    staging_dir: PathBuf,
}

impl ImageClient {
    pub fn new(config: &ImageEndpointConfig, output_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let output_dir = output_dir.into();
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            img_size: config.img_size,
            guidance_scale: config.guidance_scale,
            num_inference_steps: config.num_inference_steps,
            staging_dir: staging_dir_for(&output_dir),
            output_dir,
        })
    }

    /// Path an image for `topic` and `style` is written to.
    pub fn output_path(&self, topic: &str, style: &str) -> PathBuf {
        self.output_dir.join(output_file_name(topic, style))
    }

    /// Generate an image at an explicit size instead of the configured one.
    #[instrument(skip(self), err)]
    pub async fn generate_image_with_size(&self, topic: &str, style: &str, img_size: u32) -> Result<PathBuf, GenerationError> {
        let request = GenerateImageRequest {
            prompt: image_prompt(topic, style),
            img_size,
            guidance_scale: self.guidance_scale,
            num_inference_steps: self.num_inference_steps,
        };

        debug!(url = %self.url, "Requesting image");

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(GenerationError::transport(IMAGE_SERVICE))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(GenerationError::transport(IMAGE_SERVICE))?;

        if !status.is_success() {
            return Err(GenerationError::upstream_status(IMAGE_SERVICE, status, &bytes));
        }

        for dir in [&self.output_dir, &self.staging_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| GenerationError::Io { path: dir.clone(), source })?;
        }

        let path = self.output_path(topic, style);
        replace_file(&self.staging_dir, &path, &bytes)
            .await
            .map_err(|source| GenerationError::Io { path: path.clone(), source })?;

        debug!(path = %path.display(), bytes = bytes.len(), "Image written");
        Ok(path)
    }
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate_image(&self, topic: &str, style: &str) -> Result<PathBuf, GenerationError> {
        self.generate_image_with_size(topic, style, self.img_size).await
    }
}

/// Replace `path` with `bytes` through a rename from `staging_dir`, so concurrent writers to the
/// same path leave exactly one complete payload behind.
async fn replace_file(staging_dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let staging = staging_dir.join(format!("{file_name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&staging, bytes).await?;
    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::install_crypto_provider;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server_uri: &str, output_dir: &Path) -> ImageClient {
        install_crypto_provider();
        let config = ImageEndpointConfig {
            url: Url::parse(&format!("{server_uri}/imagine/generate")).unwrap(),
            api_key: "image-token".to_string(),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        ImageClient::new(&config, output_dir).unwrap()
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("Beef and Parotta", "visual"),
            "Beef_and_Parottavisual_educational_image.png"
        );
        assert_eq!(output_file_name("Cell\tBiology", "hands on"), "Cell_Biologyhands_on_educational_image.png");
    }

    #[test]
    fn test_output_file_name_cannot_escape_directory() {
        let name = output_file_name("../../etc/passwd", "visual");
        assert!(!name.contains('/'));
        assert_eq!(name, ".._.._etc_passwdvisual_educational_image.png");

        let name = output_file_name("a\\b", "c");
        assert_eq!(name, "a_bc_educational_image.png");
    }

    #[test]
    fn test_staging_dir_is_outside_output_dir() {
        assert_eq!(staging_dir_for(Path::new("output")), PathBuf::from(".output.staging"));
        assert_eq!(
            staging_dir_for(Path::new("/srv/edugen/images")),
            PathBuf::from("/srv/edugen/.images.staging")
        );
        assert_eq!(staging_dir_for(Path::new(".")), PathBuf::from("./.staging"));
    }

    #[test]
    fn test_image_prompt() {
        assert_eq!(
            image_prompt("Volcanoes", "kinesthetic"),
            "Educational infographic about Volcanoes, clean design,kinesthetic informative illustration, academic style"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_writes_image_bytes() {
        let mock_server = MockServer::start().await;
        let output = TempDir::new().unwrap();
        let png = b"\x89PNG\r\n\x1a\nfake-image".to_vec();

        Mock::given(method("POST"))
            .and(path("/imagine/generate"))
            .and(header("authorization", "Bearer image-token"))
            .and(body_json(json!({
                "prompt": image_prompt("Beef and Parotta", "visual"),
                "img_size": 1024,
                "guidance_scale": 7.5,
                "num_inference_steps": 50
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        // Nested directory does not exist yet
        let output_dir = output.path().join("generated");
        let client = client_for(&mock_server.uri(), &output_dir);
        let written = client.generate_image("Beef and Parotta", "visual").await.unwrap();

        assert_eq!(written, output_dir.join("Beef_and_Parottavisual_educational_image.png"));
        assert_eq!(std::fs::read(&written).unwrap(), png);
    }

    #[tokio::test]
    async fn test_explicit_size_is_sent() {
        let mock_server = MockServer::start().await;
        let output = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(wiremock::matchers::body_partial_json(json!({ "img_size": 512 })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"small".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri(), &output.path().join("images"));
        let written = client.generate_image_with_size("Tides", "visual", 512).await.unwrap();
        assert_eq!(std::fs::read(written).unwrap(), b"small");
    }

    #[tokio::test]
    async fn test_same_topic_and_style_overwrites() {
        let mock_server = MockServer::start().await;
        let output = TempDir::new().unwrap();
        let output_dir = output.path().join("images");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"first payload, longer".to_vec()))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second".to_vec()))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri(), &output_dir);
        let first = client.generate_image("Tides", "visual").await.unwrap();
        let second = client.generate_image("Tides", "visual").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"second");

        let entries: Vec<_> = std::fs::read_dir(&output_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read_dir(staging_dir_for(&output_dir)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_one_complete_payload() {
        let mock_server = MockServer::start().await;
        let output = TempDir::new().unwrap();
        let output_dir = output.path().join("images");

        let long = vec![b'a'; 256 * 1024];
        let short = b"short payload".to_vec();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(long.clone()))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(short.clone()))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri(), &output_dir);
        let (first, second) = tokio::join!(
            client.generate_image("Tides", "visual"),
            client.generate_image("Tides", "visual"),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first, second);

        // Last rename wins; the file is never a mix of both payloads
        let written = std::fs::read(&first).unwrap();
        assert!(written == long || written == short, "torn write: {} bytes", written.len());

        let entries: Vec<_> = std::fs::read_dir(&output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("Tidesvisual_educational_image.png")]);
        assert_eq!(std::fs::read_dir(staging_dir_for(&output_dir)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_error_status_writes_nothing() {
        let mock_server = MockServer::start().await;
        let output = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri(), output.path());
        let err = client.generate_image("Tides", "visual").await.unwrap_err();

        match err {
            GenerationError::UpstreamStatus { service, status, body } => {
                assert_eq!(service, IMAGE_SERVICE);
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "CUDA out of memory");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!client.output_path("Tides", "visual").exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_is_io_error() {
        let mock_server = MockServer::start().await;
        let output = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&mock_server)
            .await;

        // A regular file where the directory should be
        let blocked = output.path().join("not-a-dir");
        std::fs::write(&blocked, b"").unwrap();

        let client = client_for(&mock_server.uri(), &blocked);
        let err = client.generate_image("Tides", "visual").await.unwrap_err();
        assert!(matches!(err, GenerationError::Io { .. }));
    }

    #[tokio::test]
    async fn test_network_error_is_transport_error() {
        let output = TempDir::new().unwrap();
        let client = client_for("http://127.0.0.1:1", output.path());

        let err = client.generate_image("Tides", "visual").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport { service: IMAGE_SERVICE, .. }));
        assert!(!client.output_path("Tides", "visual").exists());
    }
}
