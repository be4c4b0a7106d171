/*
 * Responsibility
 * - POST /api/analyze
 * - Order: quota gate → file type → file size (while streaming) → vision call → charge
 * - The quota check runs before the body is read, so rejected callers cost nothing
 */
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
};

use crate::{
    api::{dto::AnalyzeResponse, extractors::AuthCtxExtractor},
    error::AppError,
    services::analysis::{ImageUpload, UploadPolicy},
    state::AppState,
};

const FILE_FIELD: &str = "file";

pub async fn analyze(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    state.quota.admit(&ctx.user_id, ctx.tier).await?;

    // Not multipart, or no usable boundary.
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected analyze body");
        AppError::bad_request(rejection.body_text())
    })?;

    let upload = read_upload(multipart, state.analysis.upload_policy()).await?;

    let outcome = state
        .analysis
        .analyze(&ctx.user_id, ctx.tier, upload)
        .await?;

    Ok(Json(outcome.into()))
}

/// Pull the image part out of the form.
///
/// Takes the part named `file`, or failing that the first part carrying a
/// filename. The type is checked from the filename before any content is
/// read, and reading stops as soon as the size limit is crossed.
async fn read_upload(
    mut multipart: Multipart,
    policy: &UploadPolicy,
) -> Result<ImageUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, policy))?
    {
        let is_file = field.name() == Some(FILE_FIELD) || field.file_name().is_some();
        if !is_file {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        policy.check_type(&filename)?;

        let bytes = read_capped(field, policy).await?;
        return Ok(ImageUpload::new(filename, bytes));
    }

    Err(AppError::bad_request("Missing file upload."))
}

async fn read_capped(mut field: Field<'_>, policy: &UploadPolicy) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, policy))?
    {
        policy.check_size(bytes.len() + chunk.len())?;
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

fn multipart_error(err: MultipartError, policy: &UploadPolicy) -> AppError {
    // The body limit layer surfaces as a multipart error mid-stream.
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return policy.too_large().into();
    }

    tracing::debug!(error = %err, "malformed multipart body");
    AppError::bad_request(err.body_text())
}
