//! Upload stage: send the asset, get a task id back.

use crate::asset::ImageAsset;
use crate::error::{EnhanceError, ErrorKind};
use crate::service::EnhanceService;
use crate::task::TaskId;
use tracing::info;

pub const TASK_ID_MISSING: &str = "Failed to upload image! Task ID not found.";

/// Upload `asset` and return the task id found at `data.task_id`.
///
/// Transport failures are classified (`Api`, `Network`, `Internal`,
/// `Timeout`); a well-formed response without an id is an `Upload` error.
pub async fn upload(
    service: &dyn EnhanceService,
    asset: &ImageAsset,
) -> Result<TaskId, EnhanceError> {
    let response = service.submit(asset).await?;
    let id = response
        .task_id()
        .ok_or_else(|| EnhanceError::new(ErrorKind::Upload, TASK_ID_MISSING))?;

    info!("Uploaded '{}', task id {}", asset.name(), id);
    Ok(TaskId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::ScriptedService;
    use crate::task::{SubmitData, SubmitResponse};

    fn asset() -> ImageAsset {
        ImageAsset::new("a.png", vec![1u8; 8])
    }

    #[tokio::test]
    async fn returns_task_id() {
        let svc = ScriptedService::new().submit_ok("t-1");
        let id = upload(&svc, &asset()).await.unwrap();
        assert_eq!(id.as_str(), "t-1");
        assert_eq!(svc.submits(), 1);
    }

    #[tokio::test]
    async fn missing_task_id_is_upload_error() {
        let svc = ScriptedService::new().push_submit(Ok(SubmitResponse {
            data: Some(SubmitData { task_id: None }),
        }));
        let err = upload(&svc, &asset()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upload);
        assert_eq!(err.message, TASK_ID_MISSING);
    }

    #[tokio::test]
    async fn http_404_is_api_error() {
        let svc = ScriptedService::new().push_submit(Err(TransportError::Status {
            status: 404,
            message: "Not Found".into(),
        }));
        let err = upload(&svc, &asset()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Api);
        assert_eq!(err.status, Some(404));
        assert!(err
            .message
            .starts_with("The image enhancing service couldn't be found"));
    }

    #[tokio::test]
    async fn no_response_is_network_error() {
        let svc = ScriptedService::new().push_submit(Err(TransportError::NoResponse {
            reason: "dns".into(),
        }));
        assert_eq!(
            upload(&svc, &asset()).await.unwrap_err().kind,
            ErrorKind::Network
        );
    }

    #[tokio::test]
    async fn undecodable_body_is_internal_error() {
        let svc = ScriptedService::new().push_submit(Err(TransportError::Decode {
            reason: "eof".into(),
        }));
        assert_eq!(
            upload(&svc, &asset()).await.unwrap_err().kind,
            ErrorKind::Internal
        );
    }
}
