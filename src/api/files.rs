use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::auth::StorageIdentity;
use crate::storage::{ArtifactKind, StorageGate};

fn bad_multipart(e: MultipartError) -> ApiError {
    debug!("Rejected upload body: {}", e);
    ApiError::BadRequest(None)
}

pub(super) async fn download(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    Extension(identity): Extension<StorageIdentity>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = params
        .get(kind.field_name())
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::BadRequest(None))?;

    let path = state.gate.resolve_file(kind, &identity, file_name)?;
    let bytes = state.files.read(&path).await?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub(super) async fn upload(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    Extension(identity): Extension<StorageIdentity>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(kind.field_name()) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or(ApiError::BadRequest(None))?;

        // Reject before a single byte of the payload is read.
        StorageGate::validate_upload_extension(kind, &file_name)?;
        let path = state.gate.resolve_file(kind, &identity, &file_name)?;

        let bytes = field.bytes().await.map_err(bad_multipart)?;

        state.gate.provision(kind, &identity).await?;
        let written = state.files.write(&path, &mut &bytes[..]).await?;

        info!("Stored {} upload of {} bytes", kind, written);
        return Ok(StatusCode::OK);
    }

    Err(ApiError::BadRequest(None))
}

pub(super) async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<ArtifactKind>,
    Extension(identity): Extension<StorageIdentity>,
) -> Result<Json<Vec<String>>, ApiError> {
    let root = state.gate.resolve_namespace_root(kind, &identity)?;
    Ok(Json(state.files.list(&root).await?))
}
