//! Artifact service.
//!
//! Handles artifact upload, history, download and deletion against the
//! catalog and the blob store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, Result};
use crate::models::artifact::ArtifactDetail;
use crate::models::audit_log::{ActivityAction, DeleteDetails, DeletedAs, UploadDetails};
use crate::services::audit_service::{self, RequestOrigin};
use crate::services::naming;
use crate::storage::{artifact_storage_key, sanitize_filename, StorageBackend};

/// Shared projection for `ArtifactDetail` rows. Callers append the WHERE and
/// ORDER BY clauses.
pub const ARTIFACT_DETAIL_SELECT: &str = r#"
    SELECT a.id, a.country_id, co.code AS country_code,
           a.product_id, p.name AS product_name,
           a.category_id, ca.name AS category_name,
           a.version_string, a.storage_key, a.content_type, a.size_bytes,
           a.uploader_id, u.username AS uploader_username,
           u.display_name AS uploader_display_name,
           a.created_at
    FROM artifacts a
    LEFT JOIN countries co ON co.id = a.country_id
    JOIN products p ON p.id = a.product_id
    JOIN categories ca ON ca.id = a.category_id
    LEFT JOIN users u ON u.id = a.uploader_id
"#;

const CELL_VERSION_INDEX: &str = "idx_artifacts_cell_version";

/// Width of `artifacts.version_string`, in characters.
pub const MAX_VERSION_LENGTH: usize = 50;

/// Upload request for one cell
#[derive(Debug)]
pub struct UploadRequest {
    pub country_id: Option<Uuid>,
    pub product_id: Uuid,
    pub category_id: Uuid,
    pub version: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
    pub uploader_id: Uuid,
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub id: Uuid,
    pub version: String,
    pub filename: String,
}

/// Identity acting on an artifact
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_staff: bool,
}

/// Names resolved for the target cell of an upload
#[derive(Debug, sqlx::FromRow)]
struct CellNames {
    country_code: Option<String>,
    product_name: String,
    category_name: String,
}

/// Check the request-level preconditions and return the trimmed version.
pub fn check_upload_input(version: &str, content: &[u8]) -> Result<String> {
    let version = version.trim();
    if version.is_empty() {
        return Err(AppError::Validation("Version is required".to_string()));
    }
    if version.chars().count() > MAX_VERSION_LENGTH {
        return Err(AppError::Validation(format!(
            "Version must be at most {} characters",
            MAX_VERSION_LENGTH
        )));
    }
    if content.is_empty() {
        return Err(AppError::Validation("File is required".to_string()));
    }
    Ok(version.to_string())
}

/// Staff may delete anything; otherwise only the recorded uploader may.
pub fn authorize_delete(actor: &Actor, uploader_id: Option<Uuid>) -> Result<DeletedAs> {
    if actor.is_staff {
        Ok(DeletedAs::Admin)
    } else if uploader_id == Some(actor.user_id) {
        Ok(DeletedAs::Uploader)
    } else {
        Err(AppError::Authorization(
            "Only staff or the uploader can delete this artifact".to_string(),
        ))
    }
}

fn duplicate_version_error(version: &str) -> AppError {
    AppError::Validation(format!(
        "Version '{}' already exists for this cell",
        version
    ))
}

/// Artifact service
pub struct ArtifactService {
    db: PgPool,
    storage: Arc<dyn StorageBackend>,
}

impl ArtifactService {
    /// Create a new artifact service
    pub fn new(db: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        Self { db, storage }
    }

    /// Validate and store a new artifact, then record the upload activity.
    pub async fn upload(
        &self,
        req: UploadRequest,
        origin: &RequestOrigin,
    ) -> Result<UploadedArtifact> {
        let version = check_upload_input(&req.version, &req.content)?;
        let names = self
            .cell_names(req.country_id, req.product_id, req.category_id)
            .await?;

        if let Some(country_id) = req.country_id {
            if self
                .is_cell_disabled(country_id, req.product_id, req.category_id)
                .await?
            {
                return Err(AppError::NotApplicable(
                    "This document does not apply to the selected country".to_string(),
                ));
            }
        }

        let filename = sanitize_filename(&req.filename);
        naming::validate_filename(
            names.country_code.as_deref(),
            &names.product_name,
            &names.category_name,
            &version,
            &filename,
        )?;

        if self
            .version_exists(req.country_id, req.product_id, req.category_id, &version)
            .await?
        {
            return Err(duplicate_version_error(&version));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let storage_key = artifact_storage_key(now, id, &filename);
        let content_type = req
            .content_type
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            });
        let size_bytes = req.content.len() as i64;

        self.storage.put(&storage_key, req.content).await?;

        let details = UploadDetails {
            country_code: names.country_code.clone(),
            product_name: names.product_name.clone(),
            category_name: names.category_name.clone(),
            version: version.clone(),
            filename: filename.clone(),
        };

        let persisted: Result<()> = async {
            let mut tx = self.db.begin().await?;
            sqlx::query(
                r#"
                INSERT INTO artifacts (
                    id, country_id, product_id, category_id, version_string,
                    storage_key, content_type, size_bytes, uploader_id, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(id)
            .bind(req.country_id)
            .bind(req.product_id)
            .bind(req.category_id)
            .bind(&version)
            .bind(&storage_key)
            .bind(&content_type)
            .bind(size_bytes)
            .bind(req.uploader_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, CELL_VERSION_INDEX) {
                    duplicate_version_error(&version)
                } else {
                    AppError::from(e)
                }
            })?;

            audit_service::insert_activity(
                &mut *tx,
                Some(req.uploader_id),
                ActivityAction::Upload,
                Some(id),
                serde_json::to_value(&details)?,
                origin,
            )
            .await?;

            tx.commit().await?;
            Ok::<(), AppError>(())
        }
        .await;

        if let Err(e) = persisted {
            if let Err(cleanup) = self.storage.delete(&storage_key).await {
                warn!(key = %storage_key, error = %cleanup, "Failed to remove orphaned blob");
            }
            return Err(e);
        }

        info!(
            artifact_id = %id,
            country = ?names.country_code,
            product = %names.product_name,
            category = %names.category_name,
            version = %version,
            "Artifact uploaded"
        );

        Ok(UploadedArtifact {
            id,
            version,
            filename,
        })
    }

    /// Every version uploaded to one cell, newest first.
    pub async fn history(
        &self,
        product_id: Uuid,
        category_id: Uuid,
        country_id: Option<Uuid>,
    ) -> Result<Vec<ArtifactDetail>> {
        let sql = format!(
            "{} WHERE a.product_id = $1 AND a.category_id = $2 \
             AND a.country_id IS NOT DISTINCT FROM $3 \
             ORDER BY a.created_at DESC, a.id DESC",
            ARTIFACT_DETAIL_SELECT
        );
        let rows = sqlx::query_as::<_, ArtifactDetail>(&sql)
            .bind(product_id)
            .bind(category_id)
            .bind(country_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Get an artifact with its taxonomy names
    pub async fn get_detail(&self, id: Uuid) -> Result<ArtifactDetail> {
        let sql = format!("{} WHERE a.id = $1", ARTIFACT_DETAIL_SELECT);
        sqlx::query_as::<_, ArtifactDetail>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))
    }

    /// Read an artifact's content and log the download.
    pub async fn download(
        &self,
        id: Uuid,
        user_id: Option<Uuid>,
        origin: &RequestOrigin,
    ) -> Result<(ArtifactDetail, Bytes)> {
        let artifact = self.get_detail(id).await?;
        let content = self.storage.get(&artifact.storage_key).await?;

        audit_service::insert_single_download(&self.db, user_id, artifact.id, origin).await?;

        Ok((artifact, content))
    }

    /// Delete an artifact on behalf of `actor`. The catalog row and the delete
    /// log entry are written together; the blob is removed afterwards.
    pub async fn delete(
        &self,
        id: Uuid,
        actor: &Actor,
        origin: &RequestOrigin,
    ) -> Result<DeletedAs> {
        let artifact = self.get_detail(id).await?;
        let deleted_as = authorize_delete(actor, artifact.uploader_id)?;

        let details = DeleteDetails {
            snapshot: artifact.snapshot(),
            deleted_as,
        };

        let mut tx = self.db.begin().await?;
        audit_service::insert_activity(
            &mut *tx,
            Some(actor.user_id),
            ActivityAction::Delete,
            Some(artifact.id),
            serde_json::to_value(&details)?,
            origin,
        )
        .await?;

        let result = sqlx::query("DELETE FROM artifacts WHERE id = $1")
            .bind(artifact.id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Artifact not found".to_string()));
        }
        tx.commit().await?;

        if let Err(e) = self.storage.delete(&artifact.storage_key).await {
            warn!(artifact_id = %artifact.id, error = %e, "Failed to delete artifact blob");
        }

        info!(
            artifact_id = %artifact.id,
            deleted_as = ?deleted_as,
            "Artifact deleted"
        );

        Ok(deleted_as)
    }

    async fn cell_names(
        &self,
        country_id: Option<Uuid>,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<CellNames> {
        let names = sqlx::query_as::<_, CellNames>(
            r#"
            SELECT
                (SELECT code FROM countries WHERE id = $1) AS country_code,
                p.name AS product_name,
                c.name AS category_name
            FROM products p, categories c
            WHERE p.id = $2 AND c.id = $3
            "#,
        )
        .bind(country_id)
        .bind(product_id)
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product or category not found".to_string()))?;

        if country_id.is_some() && names.country_code.is_none() {
            return Err(AppError::NotFound("Country not found".to_string()));
        }
        Ok(names)
    }

    async fn is_cell_disabled(
        &self,
        country_id: Uuid,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<bool> {
        let disabled: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM disabled_cells
                WHERE country_id = $1 AND product_id = $2 AND category_id = $3
            )
            "#,
        )
        .bind(country_id)
        .bind(product_id)
        .bind(category_id)
        .fetch_one(&self.db)
        .await?;
        Ok(disabled)
    }

    async fn version_exists(
        &self,
        country_id: Option<Uuid>,
        product_id: Uuid,
        category_id: Uuid,
        version: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM artifacts
                WHERE country_id IS NOT DISTINCT FROM $1
                  AND product_id = $2 AND category_id = $3
                  AND version_string = $4
            )
            "#,
        )
        .bind(country_id)
        .bind(product_id)
        .bind(category_id)
        .bind(version)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }
}
