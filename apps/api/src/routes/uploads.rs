use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::upload_key;

/// Larger than any résumé or photo we expect.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_url: String,
}

/// POST /api/v1/uploads
/// Stores the multipart `file` field and returns its public URL.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        if content.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let key = upload_key(&file_name);
        let file_url = state.files.put(&key, &content_type, content).await?;
        info!("Stored upload {file_name} as {key}");
        return Ok(Json(UploadResponse { file_url }));
    }

    Err(AppError::Validation("Missing required field: file".to_string()))
}
