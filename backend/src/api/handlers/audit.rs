//! Staff audit log handler.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::api::dto::{empty_string_as_none, PageMeta};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::audit_log::{ActivityFilter, AuditEntry};
use crate::services::audit_service::{AuditQuery, AuditService};

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_audit_log))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditLogParams {
    /// all, login, download, upload or delete
    #[serde(default, rename = "type", deserialize_with = "empty_string_as_none")]
    #[param(value_type = Option<String>)]
    pub activity_type: Option<ActivityFilter>,
    /// Case-insensitive username substring
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub username: Option<String>,
    /// Inclusive local date, YYYY-MM-DD
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_from: Option<NaiveDate>,
    /// Inclusive local date, YYYY-MM-DD
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_to: Option<NaiveDate>,
    /// 1-based page; out-of-range values are clamped
    pub page: Option<String>,
}

impl AuditLogParams {
    pub fn into_query(self) -> AuditQuery {
        AuditQuery {
            filter: self.activity_type.unwrap_or_default(),
            username: self.username,
            date_from: self.date_from,
            date_to: self.date_to,
            page: parse_page(self.page.as_deref()),
        }
    }
}

/// Lenient page number: anything unparsable means the first page.
fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<u32>().ok()).unwrap_or(1)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<AuditEntry>,
    #[serde(flatten)]
    pub page: PageMeta,
}

/// Merged login, download and artifact activity feed, newest first
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/audit-log",
    tag = "audit",
    params(AuditLogParams),
    responses(
        (status = 200, description = "One page of audit entries", body = AuditLogResponse),
        (status = 403, description = "Staff access required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_audit_log(
    State(state): State<SharedState>,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<AuditLogResponse>> {
    let service = AuditService::new(
        state.db.clone(),
        state.config.local_offset(),
        state.config.audit_page_size,
    );
    let page = service.query(&params.into_query()).await?;

    Ok(Json(AuditLogResponse {
        entries: page.entries,
        page: page.page.into(),
    }))
}

#[derive(OpenApi)]
#[openapi(paths(list_audit_log), components(schemas(AuditLogResponse, PageMeta)))]
pub struct AuditApiDoc;
