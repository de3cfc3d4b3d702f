//! Shared Data Transfer Objects (DTOs) for API handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::artifact::ArtifactDetail;
use crate::services::audit_service::PageInfo;

/// Page metadata for paginated responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageMeta {
    /// Current page number (1-indexed)
    pub current_page: u32,
    pub total_pages: u32,
    /// Total number of items across all pages
    pub total_count: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl From<PageInfo> for PageMeta {
    fn from(p: PageInfo) -> Self {
        Self {
            current_page: p.current_page,
            total_pages: p.total_pages,
            total_count: p.total_count,
            has_previous: p.has_previous,
            has_next: p.has_next,
        }
    }
}

/// Artifact as returned by history and detail endpoints
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArtifactResponse {
    pub id: Uuid,
    pub country_code: Option<String>,
    pub product_id: Uuid,
    pub product_name: String,
    pub category_id: Uuid,
    pub category_name: String,
    pub version: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploader_id: Option<Uuid>,
    pub uploader: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Relative URL that serves the file
    pub download_url: String,
}

impl From<&ArtifactDetail> for ArtifactResponse {
    fn from(a: &ArtifactDetail) -> Self {
        Self {
            id: a.id,
            country_code: a.country_code.clone(),
            product_id: a.product_id,
            product_name: a.product_name.clone(),
            category_id: a.category_id,
            category_name: a.category_name.clone(),
            version: a.version_string.clone(),
            filename: a.filename().to_string(),
            content_type: a.content_type.clone(),
            size_bytes: a.size_bytes,
            uploader_id: a.uploader_id,
            uploader: a.uploader_label(),
            created_at: a.created_at,
            download_url: format!("/api/v1/artifacts/{}/download", a.id),
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Deserialize a query value where an empty string means "not given".
pub fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "empty_string_as_none")]
        date: Option<NaiveDate>,
        #[serde(default, deserialize_with = "empty_string_as_none")]
        id: Option<Uuid>,
    }

    #[test]
    fn test_empty_query_values_are_none() {
        let probe: Probe = serde_json::from_str(r#"{"date": "", "id": "  "}"#).unwrap();
        assert!(probe.date.is_none());
        assert!(probe.id.is_none());
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert!(probe.date.is_none());
    }

    #[test]
    fn test_present_query_values_parse() {
        let probe: Probe =
            serde_json::from_str(r#"{"date": "2024-01-01", "id": "00000000-0000-0000-0000-000000000001"}"#)
                .unwrap();
        assert_eq!(probe.date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(probe.id, Some(Uuid::from_u128(1)));
    }

    #[test]
    fn test_malformed_query_value_is_an_error() {
        assert!(serde_json::from_str::<Probe>(r#"{"date": "01/01/2024"}"#).is_err());
    }

    #[test]
    fn test_page_meta_from_page_info() {
        let meta = PageMeta::from(PageInfo {
            current_page: 2,
            total_pages: 3,
            total_count: 120,
            has_previous: true,
            has_next: true,
        });
        assert_eq!(meta.current_page, 2);
        assert_eq!(meta.total_count, 120);
    }
}
