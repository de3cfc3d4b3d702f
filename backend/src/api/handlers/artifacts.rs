//! Artifact handlers: history, upload, download, delete and bulk download.

use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use super::{resolve_country_id, ClientOrigin};
use crate::api::download_response::DownloadResponse;
use crate::api::dto::{empty_string_as_none, ArtifactResponse, MessageResponse};
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::audit_log::DeletedAs;
use crate::services::artifact_service::{ArtifactService, UploadRequest};
use crate::services::bulk_service::{BulkRequest, BulkService};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/history", get(artifact_history))
        .route("/upload", post(upload_artifact))
        .route("/bulk-download", get(bulk_download))
        .route("/:id", get(get_artifact).delete(delete_artifact))
        .route("/:id/download", get(download_artifact))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub product_id: Uuid,
    pub category_id: Uuid,
    /// Country code; defaults to the configured country
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub country: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub product_id: Uuid,
    pub category_id: Uuid,
    pub country_id: Option<Uuid>,
    pub history: Vec<ArtifactResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub id: Uuid,
    pub version: String,
    pub filename: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub deleted_as: DeletedAs,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BulkDownloadQuery {
    pub product_id: Uuid,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub country: Option<String>,
    /// Exact version label; all versions when omitted
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub version: Option<String>,
}

/// Multipart upload form fields
#[derive(Debug, Default)]
pub struct UploadForm {
    pub product_id: Option<String>,
    pub category_id: Option<String>,
    pub country: Option<String>,
    pub version: Option<String>,
    pub file: Option<(String, Option<String>, Bytes)>,
}

fn parse_id(value: Option<&str>, field: &str) -> Result<Uuid> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))?;
    Uuid::parse_str(value).map_err(|_| AppError::Validation(format!("Invalid {}", field)))
}

impl UploadForm {
    /// Read the form fields the upload endpoint understands.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid multipart data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("File name is missing".to_string()))?;
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                form.file = Some((filename, content_type, data));
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid form field {name}: {e}")))?;
            match name.as_str() {
                "product_id" => form.product_id = Some(value),
                "category_id" => form.category_id = Some(value),
                "country" => form.country = Some(value),
                "version" | "version_string" => form.version = Some(value),
                _ => {}
            }
        }
        Ok(form)
    }

    /// Parsed cell ids plus the requested country code.
    pub fn target(&self) -> Result<(Uuid, Uuid, Option<&str>)> {
        let product_id = parse_id(self.product_id.as_deref(), "product_id")?;
        let category_id = parse_id(self.category_id.as_deref(), "category_id")?;
        let country = self
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        Ok((product_id, category_id, country))
    }
}

/// List every version uploaded to one cell
#[utoipa::path(
    get,
    path = "/history",
    context_path = "/api/v1/artifacts",
    tag = "artifacts",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Cell history, newest first", body = HistoryResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn artifact_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let country_id = resolve_country_id(&state, query.country.as_deref()).await?;
    let service = ArtifactService::new(state.db.clone(), state.storage.clone());
    let rows = service
        .history(query.product_id, query.category_id, country_id)
        .await?;

    Ok(Json(HistoryResponse {
        product_id: query.product_id,
        category_id: query.category_id,
        country_id,
        history: rows.iter().map(ArtifactResponse::from).collect(),
    }))
}

/// Upload a new version into a cell
#[utoipa::path(
    post,
    path = "/upload",
    context_path = "/api/v1/artifacts",
    tag = "artifacts",
    request_body(content_type = "multipart/form-data", description = "product_id, category_id, country, version and file fields"),
    responses(
        (status = 200, description = "Artifact stored", body = UploadResponse),
        (status = 400, description = "Missing field, disabled cell, filename mismatch or duplicate version", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    ClientOrigin(origin): ClientOrigin,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let form = UploadForm::read(multipart).await?;
    let (product_id, category_id, country) = form.target()?;
    let country_id = resolve_country_id(&state, country).await?;
    let (filename, content_type, content) = form
        .file
        .ok_or_else(|| AppError::Validation("File is required".to_string()))?;

    let service = ArtifactService::new(state.db.clone(), state.storage.clone());
    let uploaded = service
        .upload(
            UploadRequest {
                country_id,
                product_id,
                category_id,
                version: form.version.unwrap_or_default(),
                filename,
                content_type,
                content,
                uploader_id: auth.user_id,
            },
            &origin,
        )
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        id: uploaded.id,
        version: uploaded.version,
        filename: uploaded.filename,
    }))
}

/// Get artifact details
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/artifacts",
    tag = "artifacts",
    params(("id" = Uuid, Path, description = "Artifact ID")),
    responses(
        (status = 200, description = "Artifact details", body = ArtifactResponse),
        (status = 404, description = "Artifact not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_artifact(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArtifactResponse>> {
    let service = ArtifactService::new(state.db.clone(), state.storage.clone());
    let artifact = service.get_detail(id).await?;
    Ok(Json(ArtifactResponse::from(&artifact)))
}

/// Download an artifact's file
#[utoipa::path(
    get,
    path = "/{id}/download",
    context_path = "/api/v1/artifacts",
    tag = "artifacts",
    params(("id" = Uuid, Path, description = "Artifact ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Artifact not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    ClientOrigin(origin): ClientOrigin,
    Path(id): Path<Uuid>,
) -> Result<DownloadResponse> {
    let service = ArtifactService::new(state.db.clone(), state.storage.clone());
    let (artifact, content) = service.download(id, Some(auth.user_id), &origin).await?;
    Ok(DownloadResponse::new(
        content,
        artifact.content_type.clone(),
        artifact.filename(),
    ))
}

/// Delete an artifact (staff or uploader)
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/artifacts",
    tag = "artifacts",
    params(("id" = Uuid, Path, description = "Artifact ID")),
    responses(
        (status = 200, description = "Artifact deleted", body = DeleteResponse),
        (status = 403, description = "Not staff and not the uploader", body = crate::api::openapi::ErrorResponse),
        (status = 404, description = "Artifact not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    ClientOrigin(origin): ClientOrigin,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let service = ArtifactService::new(state.db.clone(), state.storage.clone());
    let deleted_as = service.delete(id, &auth.actor(), &origin).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Artifact deleted".to_string(),
        deleted_as,
    }))
}

/// Download all of a product's documents for a country as one ZIP
#[utoipa::path(
    get,
    path = "/bulk-download",
    context_path = "/api/v1/artifacts",
    tag = "artifacts",
    params(BulkDownloadQuery),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 404, description = "Nothing to download", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn bulk_download(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    ClientOrigin(origin): ClientOrigin,
    Query(query): Query<BulkDownloadQuery>,
) -> Result<DownloadResponse> {
    let service = BulkService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.default_country_code.clone(),
    );
    let archive = service
        .package(
            &BulkRequest {
                product_id: query.product_id,
                country_code: query.country,
                version: query.version,
            },
            Some(auth.user_id),
            &origin,
        )
        .await?;

    Ok(DownloadResponse::new(
        archive.content,
        "application/zip",
        archive.filename,
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        artifact_history,
        upload_artifact,
        get_artifact,
        download_artifact,
        delete_artifact,
        bulk_download,
    ),
    components(schemas(
        ArtifactResponse,
        HistoryResponse,
        UploadResponse,
        DeleteResponse,
        DeletedAs,
        MessageResponse,
    ))
)]
pub struct ArtifactsApiDoc;
