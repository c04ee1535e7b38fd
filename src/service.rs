//! Transport boundary to the external super-resolution service.
//!
//! [`EnhanceService`] is the only seam through which the workflow talks to
//! the network. The orchestrator holds an `Arc<dyn EnhanceService>`, so tests
//! (and callers with their own middleware) can substitute a fake without a
//! global client.
//!
//! Implementations must report failures as tagged [`TransportError`]s; the
//! classifier never inspects reqwest types.

use crate::asset::ImageAsset;
use crate::error::{BoxError, EnhanceError, TransportError};
use crate::task::{StatusResponse, SubmitResponse};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://techhk.aoscdn.com";
pub const TASK_PATH: &str = "/api/tasks/visual/scale";
pub const API_KEY_HEADER: &str = "X-API-KEY";
pub const IMAGE_FIELD: &str = "image_file";

/// Upload and status operations of the external service.
#[async_trait]
pub trait EnhanceService: Send + Sync {
    /// Upload the image and return the raw response envelope.
    async fn submit(&self, asset: &ImageAsset) -> Result<SubmitResponse, TransportError>;

    /// Fetch the current status envelope of a task.
    async fn fetch_status(&self, task_id: &str) -> Result<StatusResponse, TransportError>;
}

/// reqwest-backed implementation of [`EnhanceService`].
#[derive(Clone)]
pub struct HttpEnhanceService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for HttpEnhanceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEnhanceService")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpEnhanceService {
    /// Build a service with its own HTTP client.
    ///
    /// A client that cannot be built (TLS backend, resolver setup) is a local
    /// fault, so it surfaces as a configuration error rather than a network one.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, EnhanceError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(client_setup_error)?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Build a service around an existing client.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn submit_url(&self) -> String {
        format!("{}{}", self.base_url, TASK_PATH)
    }

    fn status_url(&self, task_id: &str) -> String {
        format!("{}{}/{}", self.base_url, TASK_PATH, task_id)
    }
}

#[async_trait]
impl EnhanceService for HttpEnhanceService {
    async fn submit(&self, asset: &ImageAsset) -> Result<SubmitResponse, TransportError> {
        let mut part = Part::stream_with_length(asset.payload(), asset.size_bytes())
            .file_name(asset.name().to_string());
        if let Some(mime) = asset.mime_type() {
            part = part.mime_str(mime).map_err(|e| TransportError::Decode {
                reason: format!("invalid MIME type '{mime}': {e}"),
            })?;
        }
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!("POST {} ({} bytes)", self.submit_url(), asset.size_bytes());
        let response = self
            .client
            .post(self.submit_url())
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(send_error)?;

        decode_json(response).await
    }

    async fn fetch_status(&self, task_id: &str) -> Result<StatusResponse, TransportError> {
        let url = self.status_url(task_id);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(send_error)?;

        decode_json(response).await
    }
}

/// Error body some endpoints return with a non-2xx status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Turn a non-2xx response into `Status`, otherwise decode JSON.
async fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                } else {
                    text
                }
            });
        return Err(TransportError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await.map_err(body_error)?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
        reason: e.to_string(),
    })
}

fn client_setup_error(e: impl Into<BoxError>) -> EnhanceError {
    EnhanceError::config("failed to build HTTP client").with_cause(e)
}

/// Classify an error from `send()`: nothing came back.
fn send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout { after_ms: None }
    } else {
        TransportError::NoResponse {
            reason: e.to_string(),
        }
    }
}

/// Classify an error while reading a response body that had started.
fn body_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout { after_ms: None }
    } else {
        TransportError::Decode {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn service(url: String) -> HttpEnhanceService {
        HttpEnhanceService::new(url, "test-key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn client_setup_failure_is_not_a_network_error() {
        let err = client_setup_error(std::io::Error::other("no TLS backend"));
        assert_eq!(err.kind, crate::error::ErrorKind::Internal);
        assert_eq!(
            err.message,
            "Invalid configuration: failed to build HTTP client"
        );
        assert_eq!(err.detail().as_deref(), Some("no TLS backend"));
    }

    #[tokio::test]
    async fn submit_sends_multipart_with_api_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/tasks/visual/scale")
            .match_header("x-api-key", "test-key")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data; boundary=.*".into()),
            )
            .match_body(Matcher::Regex(r#"name="image_file"; filename="cat.png""#.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":200,"data":{"task_id":"task-42"}}"#)
            .create_async()
            .await;

        let svc = service(server.url());
        let asset = ImageAsset::new("cat.png", vec![1u8, 2, 3, 4]);
        let resp = svc.submit(&asset).await.expect("submit should succeed");

        mock.assert_async().await;
        assert_eq!(resp.task_id(), Some("task-42"));
    }

    #[tokio::test]
    async fn status_fetch_hits_task_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/tasks/visual/scale/task-42")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(r#"{"data":{"state":4}}"#)
            .create_async()
            .await;

        let svc = service(format!("{}/", server.url()));
        let resp = svc.fetch_status("task-42").await.unwrap();

        mock.assert_async().await;
        assert_eq!(resp.data.unwrap().state, 4);
    }

    #[tokio::test]
    async fn non_success_status_is_tagged_with_server_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/tasks/visual/scale")
            .with_status(401)
            .with_body(r#"{"status":401,"message":"Invalid API key"}"#)
            .create_async()
            .await;

        let err = service(server.url())
            .submit(&ImageAsset::new("a.png", vec![1u8]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Status {
                status: 401,
                message: "Invalid API key".into()
            }
        );
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/tasks/visual/scale/x")
            .with_status(502)
            .with_body("upstream down")
            .create_async()
            .await;

        let err = service(server.url()).fetch_status("x").await.unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 502, ref message } if message == "upstream down"));
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/tasks/visual/scale/x")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let err = service(server.url()).fetch_status("x").await.unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_no_response() {
        // Port 9 on localhost is reserved (discard) and normally closed.
        let svc = service("http://127.0.0.1:9".into());
        let err = svc.fetch_status("x").await.unwrap_err();
        assert!(
            matches!(
                err,
                TransportError::NoResponse { .. } | TransportError::Timeout { .. }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn debug_redacts_key() {
        let svc = service("http://localhost".into());
        let dbg = format!("{svc:?}");
        assert!(!dbg.contains("test-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
