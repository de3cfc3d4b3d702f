//! Artifact model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Artifact entity: one versioned document bound to a cell. A null
/// `country_id` marks a global artifact.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Artifact {
    pub id: Uuid,
    pub country_id: Option<Uuid>,
    pub product_id: Uuid,
    pub category_id: Uuid,
    pub version_string: String,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploader_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Logical filename, reconstructed from the storage key's basename.
    pub fn filename(&self) -> &str {
        filename_from_key(&self.storage_key)
    }
}

/// Artifact joined with its taxonomy names and uploader.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArtifactDetail {
    pub id: Uuid,
    pub country_id: Option<Uuid>,
    pub country_code: Option<String>,
    pub product_id: Uuid,
    pub product_name: String,
    pub category_id: Uuid,
    pub category_name: String,
    pub version_string: String,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploader_id: Option<Uuid>,
    pub uploader_username: Option<String>,
    pub uploader_display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactDetail {
    pub fn filename(&self) -> &str {
        filename_from_key(&self.storage_key)
    }

    /// Uploader label: display name, falling back to the username.
    pub fn uploader_label(&self) -> Option<String> {
        match (&self.uploader_display_name, &self.uploader_username) {
            (Some(display), _) if !display.trim().is_empty() => Some(display.clone()),
            (_, Some(username)) => Some(username.clone()),
            _ => None,
        }
    }

    /// Freeze the identity fields before the row is removed.
    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            filename: self.filename().to_string(),
            country_code: self.country_code.clone(),
            product_name: self.product_name.clone(),
            category_name: self.category_name.clone(),
            version: self.version_string.clone(),
            uploader: self.uploader_label(),
        }
    }
}

/// Frozen copy of an artifact's identity, stored in activity logs so the
/// entry stays readable after the artifact row is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactSnapshot {
    pub filename: String,
    pub country_code: Option<String>,
    pub product_name: String,
    pub category_name: String,
    pub version: String,
    pub uploader: Option<String>,
}

/// Basename of a storage key (`artifacts/2024/05/<id>/file.pdf` -> `file.pdf`).
pub fn filename_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
