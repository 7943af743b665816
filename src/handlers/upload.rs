use axum::{
    Json,
    extract::{Multipart, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::UploadResponse,
};

/// Accepted image MIME types and the extension stored with each.
pub const ALLOWED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// validate_image_upload
///
/// Checks a received file against the upload rules and returns the extension to
/// store it under.
pub fn validate_image_upload(
    content_type: Option<&str>,
    size: usize,
    max_bytes: usize,
) -> AppResult<&'static str> {
    let content_type = content_type.unwrap_or_default();
    let ext = ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported file type '{}'; allowed: JPEG, PNG, WebP, GIF",
                content_type
            ))
        })?;

    if size == 0 {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    if size > max_bytes {
        return Err(AppError::Validation(format!(
            "File exceeds the maximum size of {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(ext)
}

/// upload_image
///
/// [Authenticated Route] Stores one image from the multipart field `file` under
/// `{userId}/{uuid}.{ext}` and returns its public URL.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "Multipart form with a single `file` field"),
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing, empty, oversized or unsupported file", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_image(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let max_bytes = state.config.upload.max_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {}", e.body_text())))?;
        let ext = validate_image_upload(content_type.as_deref(), bytes.len(), max_bytes)?;

        let key = format!("{}/{}.{}", id, Uuid::new_v4(), ext);
        let url = state
            .storage
            .put_object(&key, content_type.as_deref().unwrap_or_default(), bytes.to_vec())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        tracing::info!(user_id = %id, key = %key, size = bytes.len(), "image uploaded");
        return Ok(Json(UploadResponse { url, key }));
    }

    Err(AppError::Validation("Multipart field 'file' is required".into()))
}
