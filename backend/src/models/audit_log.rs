//! Audit trail models: login attempts, download logs and artifact activity,
//! plus the merged timeline entry built from all three.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::artifact::ArtifactSnapshot;

/// Login attempt row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Why a login attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    UnknownUser,
    InvalidPassword,
    InactiveUser,
}

impl LoginFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginFailure::UnknownUser => "unknown_user",
            LoginFailure::InvalidPassword => "invalid_password",
            LoginFailure::InactiveUser => "inactive_user",
        }
    }
}

/// Kind of download recorded in `download_logs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadType {
    Single,
    Bulk,
}

impl DownloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadType::Single => "single",
            DownloadType::Bulk => "bulk",
        }
    }
}

/// Artifact activity recorded in `artifact_activity_logs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    Upload,
    Delete,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Upload => "upload",
            ActivityAction::Delete => "delete",
        }
    }
}

/// How the deleter was authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeletedAs {
    Admin,
    Uploader,
}

/// Details stored with an upload activity entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadDetails {
    pub country_code: Option<String>,
    pub product_name: String,
    pub category_name: String,
    pub version: String,
    pub filename: String,
}

/// Details stored with a delete activity entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteDetails {
    #[serde(flatten)]
    pub snapshot: ArtifactSnapshot,
    pub deleted_as: DeletedAs,
}

/// Activity type filter for the merged audit feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityFilter {
    #[default]
    All,
    Login,
    Download,
    Upload,
    Delete,
}

impl ActivityFilter {
    pub fn includes_logins(&self) -> bool {
        matches!(self, ActivityFilter::All | ActivityFilter::Login)
    }

    pub fn includes_downloads(&self) -> bool {
        matches!(self, ActivityFilter::All | ActivityFilter::Download)
    }

    /// Activity-log actions selected by this filter.
    pub fn activity_actions(&self) -> &'static [&'static str] {
        match self {
            ActivityFilter::All => &["upload", "delete"],
            ActivityFilter::Upload => &["upload"],
            ActivityFilter::Delete => &["delete"],
            ActivityFilter::Login | ActivityFilter::Download => &[],
        }
    }
}

impl FromStr for ActivityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(ActivityFilter::All),
            "login" => Ok(ActivityFilter::Login),
            "download" => Ok(ActivityFilter::Download),
            "upload" => Ok(ActivityFilter::Upload),
            "delete" => Ok(ActivityFilter::Delete),
            other => Err(format!("unknown activity type '{}'", other)),
        }
    }
}

/// Artifact identity as shown in the audit feed. For deletions it comes from
/// the frozen snapshot and `deleted` is set.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactRef {
    pub artifact_id: Option<Uuid>,
    pub filename: String,
    pub country_code: Option<String>,
    pub product_name: String,
    pub category_name: String,
    pub version: String,
    pub deleted: bool,
}

/// Download payload
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "download_type", rename_all = "snake_case")]
pub enum DownloadEvent {
    Single {
        /// Missing when the artifact has since been deleted
        artifact: Option<ArtifactRef>,
    },
    Bulk {
        product_name: Option<String>,
        country_code: Option<String>,
        artifact_count: i32,
    },
}

/// Type-specific payload of a merged audit entry
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    Login {
        success: bool,
        failure_reason: Option<String>,
    },
    Download(DownloadEvent),
    Upload {
        artifact: Option<ArtifactRef>,
    },
    Delete {
        artifact: Option<ArtifactRef>,
        deleted_as: Option<DeletedAs>,
    },
}

/// One entry of the merged audit timeline
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    #[serde(flatten)]
    pub event: AuditEvent,
}
