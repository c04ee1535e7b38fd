//! Input resolution: turn a user-supplied path or URL into an [`ImageAsset`].
//!
//! Local files are read whole; URLs are downloaded with a bounded timeout.
//! The asset name comes from the file name or the last URL path segment, and
//! the MIME type from the extension (or the response `Content-Type` when the
//! extension says nothing). No content checks happen here; that is the
//! validator's job.

use crate::asset::ImageAsset;
use crate::error::{EnhanceError, ErrorKind, TransportError};
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load `input` (local path or HTTP/HTTPS URL) into memory.
pub async fn load_asset(input: &str, timeout: Duration) -> Result<ImageAsset, EnhanceError> {
    if is_url(input) {
        load_url(input, timeout).await
    } else {
        load_local(Path::new(input)).await
    }
}

async fn load_local(path: &Path) -> Result<ImageAsset, EnhanceError> {
    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EnhanceError::new(
            ErrorKind::Validation,
            format!("File not found: {}", path.display()),
        ),
        std::io::ErrorKind::PermissionDenied => EnhanceError::new(
            ErrorKind::Validation,
            format!("Permission denied: {}", path.display()),
        ),
        _ => EnhanceError::new(
            ErrorKind::Internal,
            format!("Failed to read {}", path.display()),
        )
        .with_cause(e),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!("Loaded {} ({} bytes)", path.display(), data.len());
    Ok(ImageAsset::new(name, data))
}

async fn load_url(url: &str, timeout: Duration) -> Result<ImageAsset, EnhanceError> {
    info!("Downloading image from: {}", url);
    let (content_type, data) = fetch(url, timeout).await?;

    let asset = ImageAsset::new(filename_from_url(url), data);
    if asset.mime_type().is_some() {
        return Ok(asset);
    }
    Ok(asset.with_mime_type(content_type))
}

/// Download `url` and return its body.
///
/// Used for URL inputs and for saving enhanced results to disk.
pub async fn fetch_bytes(url: &str, timeout: Duration) -> Result<Bytes, EnhanceError> {
    fetch(url, timeout).await.map(|(_, body)| body)
}

async fn fetch(url: &str, timeout: Duration) -> Result<(Option<String>, Bytes), EnhanceError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            EnhanceError::new(ErrorKind::Internal, "Failed to build HTTP client").with_cause(e)
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        EnhanceError::from(if e.is_timeout() {
            TransportError::Timeout {
                after_ms: Some(timeout.as_millis() as u64),
            }
        } else {
            TransportError::NoResponse {
                reason: e.to_string(),
            }
        })
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            message: format!("download of {url} failed"),
        }
        .into());
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty());

    let body = response.bytes().await.map_err(|e| {
        EnhanceError::from(TransportError::NoResponse {
            reason: e.to_string(),
        })
    })?;
    debug!("Downloaded {} bytes from {}", body.len(), url);
    Ok((content_type, body))
}

/// Last non-empty path segment of `url`, or `"download"`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.png"));
        assert!(is_url("http://example.com/a.png"));
        assert!(!is_url("/tmp/a.png"));
        assert!(!is_url("a.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_comes_from_last_segment() {
        assert_eq!(filename_from_url("https://x.com/img/cat.png?s=1"), "cat.png");
        assert_eq!(filename_from_url("https://x.com/"), "download");
    }

    #[tokio::test]
    async fn local_file_is_loaded_with_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let asset = load_asset(path.to_str().unwrap(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(asset.name(), "photo.jpg");
        assert_eq!(asset.mime_type(), Some("image/jpeg"));
        assert_eq!(asset.size_bytes(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_validation_error() {
        let err = load_asset("/definitely/not/here.png", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("File not found"));
    }

    #[tokio::test]
    async fn url_download_uses_content_type_when_extension_is_unknown() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/render")
            .with_status(200)
            .with_header("content-type", "image/webp; charset=binary")
            .with_body([7u8; 16])
            .create_async()
            .await;

        let url = format!("{}/render", server.url());
        let asset = load_asset(&url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(asset.name(), "render");
        assert_eq!(asset.mime_type(), Some("image/webp"));
        assert_eq!(asset.size_bytes(), 16);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_download_is_classified_as_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.png")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/gone.png", server.url());
        let err = fetch_bytes(&url, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Api);
        assert_eq!(err.status, Some(404));
    }
}
