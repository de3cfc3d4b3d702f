//! Audit trail service.
//!
//! Writes login, download and artifact activity rows, and reads them back as
//! one merged, time-ordered and paginated timeline.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::artifact::filename_from_key;
use crate::models::audit_log::{
    ActivityAction, ActivityFilter, ArtifactRef, AuditEntry, AuditEvent, DeleteDetails,
    DownloadEvent, DownloadType, LoginAttempt, LoginFailure, UploadDetails,
};

/// Client address and agent attached to audit rows
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub async fn insert_login_attempt<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Option<Uuid>,
    username: &str,
    failure: Option<LoginFailure>,
    origin: &RequestOrigin,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO login_attempts (user_id, username, success, failure_reason, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(failure.is_none())
    .bind(failure.map(|f| f.as_str()))
    .bind(&origin.ip_address)
    .bind(&origin.user_agent)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_single_download<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Option<Uuid>,
    artifact_id: Uuid,
    origin: &RequestOrigin,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO download_logs (user_id, download_type, artifact_id, ip_address)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(DownloadType::Single.as_str())
    .bind(artifact_id)
    .bind(&origin.ip_address)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_bulk_download<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Option<Uuid>,
    product_id: Uuid,
    country_id: Option<Uuid>,
    artifact_count: i32,
    origin: &RequestOrigin,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO download_logs (user_id, download_type, product_id, country_id, artifact_count, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(DownloadType::Bulk.as_str())
    .bind(product_id)
    .bind(country_id)
    .bind(artifact_count)
    .bind(&origin.ip_address)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_activity<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Option<Uuid>,
    action: ActivityAction,
    artifact_id: Option<Uuid>,
    details: serde_json::Value,
    origin: &RequestOrigin,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artifact_activity_logs (user_id, action, artifact_id, details, ip_address)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(action.as_str())
    .bind(artifact_id)
    .bind(details)
    .bind(&origin.ip_address)
    .execute(executor)
    .await?;
    Ok(())
}

/// Filters for the merged audit feed
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub filter: ActivityFilter,
    pub username: Option<String>,
    /// Inclusive local calendar dates
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: u32,
}

/// Page metadata for the audit feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    #[serde(flatten)]
    pub page: PageInfo,
}

/// Convert inclusive local dates into a half-open UTC range:
/// `[start of date_from, start of the day after date_to)`. A `date_to` with
/// no following day leaves the upper end open.
pub fn local_day_bounds(
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    offset: FixedOffset,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start_of = |date: NaiveDate| {
        date.and_time(chrono::NaiveTime::MIN)
            .checked_sub_offset(offset)
            .map(|naive| naive.and_utc())
    };
    let from = date_from.and_then(start_of);
    let to = date_to.and_then(|d| d.succ_opt()).and_then(start_of);
    (from, to)
}

/// Escape LIKE wildcards so the username filter is a plain substring match.
pub fn like_pattern(substring: &str) -> String {
    let escaped = substring
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Newest first, ties broken by id so page boundaries are stable.
pub fn sort_entries(entries: &mut [AuditEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Slice one page out of the sorted entries. Out-of-range pages clamp to the
/// nearest valid page; an empty feed still has a single empty page.
pub fn paginate(entries: Vec<AuditEntry>, page: u32, page_size: u32) -> AuditPage {
    let page_size = page_size.max(1) as usize;
    let total_count = entries.len();
    let total_pages = total_count.div_ceil(page_size).max(1);
    let current = (page.max(1) as usize).min(total_pages);

    let entries = entries
        .into_iter()
        .skip((current - 1) * page_size)
        .take(page_size)
        .collect();

    AuditPage {
        entries,
        page: PageInfo {
            current_page: current as u32,
            total_pages: total_pages as u32,
            total_count: total_count as u64,
            has_previous: current > 1,
            has_next: current < total_pages,
        },
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DownloadRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub download_type: String,
    pub artifact_id: Option<Uuid>,
    pub artifact_storage_key: Option<String>,
    pub artifact_version: Option<String>,
    pub artifact_country_code: Option<String>,
    pub artifact_product_name: Option<String>,
    pub artifact_category_name: Option<String>,
    pub product_name: Option<String>,
    pub country_code: Option<String>,
    pub artifact_count: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub action: String,
    pub artifact_id: Option<Uuid>,
    pub details: serde_json::Value,
}

pub fn login_entry(row: LoginAttempt) -> AuditEntry {
    AuditEntry {
        id: row.id,
        created_at: row.created_at,
        user_id: row.user_id,
        username: Some(row.username),
        ip_address: row.ip_address,
        event: AuditEvent::Login {
            success: row.success,
            failure_reason: row.failure_reason,
        },
    }
}

pub fn download_entry(row: DownloadRow) -> AuditEntry {
    let event = if row.download_type == DownloadType::Bulk.as_str() {
        DownloadEvent::Bulk {
            product_name: row.product_name,
            country_code: row.country_code,
            artifact_count: row.artifact_count.unwrap_or(0),
        }
    } else {
        let artifact = match (
            row.artifact_id,
            row.artifact_storage_key,
            row.artifact_product_name,
            row.artifact_category_name,
        ) {
            (Some(id), Some(key), Some(product_name), Some(category_name)) => Some(ArtifactRef {
                artifact_id: Some(id),
                filename: filename_from_key(&key).to_string(),
                country_code: row.artifact_country_code,
                product_name,
                category_name,
                version: row.artifact_version.unwrap_or_default(),
                deleted: false,
            }),
            _ => None,
        };
        DownloadEvent::Single { artifact }
    };

    AuditEntry {
        id: row.id,
        created_at: row.created_at,
        user_id: row.user_id,
        username: row.username,
        ip_address: row.ip_address,
        event: AuditEvent::Download(event),
    }
}

pub fn activity_entry(row: ActivityRow) -> AuditEntry {
    let event = if row.action == ActivityAction::Delete.as_str() {
        match serde_json::from_value::<DeleteDetails>(row.details) {
            Ok(details) => AuditEvent::Delete {
                artifact: Some(ArtifactRef {
                    artifact_id: None,
                    filename: details.snapshot.filename,
                    country_code: details.snapshot.country_code,
                    product_name: details.snapshot.product_name,
                    category_name: details.snapshot.category_name,
                    version: details.snapshot.version,
                    deleted: true,
                }),
                deleted_as: Some(details.deleted_as),
            },
            Err(e) => {
                tracing::warn!(entry_id = %row.id, error = %e, "Unreadable delete snapshot");
                AuditEvent::Delete {
                    artifact: None,
                    deleted_as: None,
                }
            }
        }
    } else {
        let artifact = serde_json::from_value::<UploadDetails>(row.details)
            .map(|d| ArtifactRef {
                artifact_id: row.artifact_id,
                filename: d.filename,
                country_code: d.country_code,
                product_name: d.product_name,
                category_name: d.category_name,
                version: d.version,
                deleted: row.artifact_id.is_none(),
            })
            .ok();
        AuditEvent::Upload { artifact }
    };

    AuditEntry {
        id: row.id,
        created_at: row.created_at,
        user_id: row.user_id,
        username: row.username,
        ip_address: row.ip_address,
        event,
    }
}

/// Audit service
pub struct AuditService {
    db: PgPool,
    offset: FixedOffset,
    page_size: u32,
}

impl AuditService {
    pub fn new(db: PgPool, offset: FixedOffset, page_size: u32) -> Self {
        Self {
            db,
            offset,
            page_size,
        }
    }

    /// Query the merged timeline.
    pub async fn query(&self, query: &AuditQuery) -> Result<AuditPage> {
        let (from, to) = local_day_bounds(query.date_from, query.date_to, self.offset);
        let pattern = query
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(like_pattern);

        let mut entries: Vec<AuditEntry> = Vec::new();

        if query.filter.includes_logins() {
            let rows = self.logins(pattern.as_deref(), from, to).await?;
            entries.extend(rows.into_iter().map(login_entry));
        }
        if query.filter.includes_downloads() {
            let rows = self.downloads(pattern.as_deref(), from, to).await?;
            entries.extend(rows.into_iter().map(download_entry));
        }
        let actions = query.filter.activity_actions();
        if !actions.is_empty() {
            let rows = self.activities(actions, pattern.as_deref(), from, to).await?;
            entries.extend(rows.into_iter().map(activity_entry));
        }

        sort_entries(&mut entries);
        Ok(paginate(entries, query.page, self.page_size))
    }

    async fn logins(
        &self,
        pattern: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<LoginAttempt>> {
        let rows = sqlx::query_as::<_, LoginAttempt>(
            r#"
            SELECT id, user_id, username, success, failure_reason, ip_address, user_agent, created_at
            FROM login_attempts
            WHERE ($1::text IS NULL OR username ILIKE $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            "#,
        )
        .bind(pattern)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn downloads(
        &self,
        pattern: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DownloadRow>> {
        let rows = sqlx::query_as::<_, DownloadRow>(
            r#"
            SELECT d.id, d.created_at, d.user_id, u.username, d.ip_address,
                   d.download_type, a.id AS artifact_id,
                   a.storage_key AS artifact_storage_key,
                   a.version_string AS artifact_version,
                   ac.code AS artifact_country_code,
                   ap.name AS artifact_product_name,
                   acat.name AS artifact_category_name,
                   p.name AS product_name, c.code AS country_code,
                   d.artifact_count
            FROM download_logs d
            LEFT JOIN users u ON u.id = d.user_id
            LEFT JOIN artifacts a ON a.id = d.artifact_id
            LEFT JOIN countries ac ON ac.id = a.country_id
            LEFT JOIN products ap ON ap.id = a.product_id
            LEFT JOIN categories acat ON acat.id = a.category_id
            LEFT JOIN products p ON p.id = d.product_id
            LEFT JOIN countries c ON c.id = d.country_id
            WHERE ($1::text IS NULL OR u.username ILIKE $1)
              AND ($2::timestamptz IS NULL OR d.created_at >= $2)
              AND ($3::timestamptz IS NULL OR d.created_at < $3)
            "#,
        )
        .bind(pattern)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn activities(
        &self,
        actions: &[&str],
        pattern: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityRow>> {
        let actions: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT l.id, l.created_at, l.user_id, u.username, l.ip_address,
                   l.action, l.artifact_id, l.details
            FROM artifact_activity_logs l
            LEFT JOIN users u ON u.id = l.user_id
            WHERE l.action = ANY($1)
              AND ($2::text IS NULL OR u.username ILIKE $2)
              AND ($3::timestamptz IS NULL OR l.created_at >= $3)
              AND ($4::timestamptz IS NULL OR l.created_at < $4)
            "#,
        )
        .bind(actions)
        .bind(pattern)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::ArtifactSnapshot;
    use crate::models::audit_log::DeletedAs;
    use chrono::{Duration, TimeZone, Timelike};

    fn seoul() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn login_row(at: DateTime<Utc>, id: u128) -> LoginAttempt {
        LoginAttempt {
            id: Uuid::from_u128(id),
            user_id: None,
            username: "kim".to_string(),
            success: true,
            failure_reason: None,
            ip_address: None,
            user_agent: None,
            created_at: at,
        }
    }

    fn entries(n: u128) -> Vec<AuditEntry> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| login_entry(login_row(base + Duration::minutes(i as i64), i)))
            .collect()
    }

    #[test]
    fn test_single_day_range_covers_whole_local_day() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (from, to) = local_day_bounds(Some(day), Some(day), seoul());
        let from = from.unwrap();
        let to = to.unwrap();

        let local = |h, m, s| {
            seoul()
                .with_ymd_and_hms(2024, 1, 1, h, m, s)
                .unwrap()
                .with_timezone(&Utc)
        };
        let next_midnight = seoul()
            .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let within = |t: DateTime<Utc>| t >= from && t < to;
        assert!(within(local(0, 0, 0)));
        assert!(within(local(12, 30, 0)));
        assert!(within(local(23, 59, 59)));
        assert!(!within(next_midnight));
        assert_eq!(from.hour(), 15);
    }

    #[test]
    fn test_open_ended_bounds() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let (from, to) = local_day_bounds(Some(day), None, seoul());
        assert!(from.is_some());
        assert!(to.is_none());
        let (from, to) = local_day_bounds(None, Some(day), seoul());
        assert!(from.is_none());
        assert_eq!(
            to.unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 30, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_calendar_extremes_do_not_overflow() {
        let (from, to) = local_day_bounds(None, Some(NaiveDate::MAX), seoul());
        assert!(from.is_none());
        assert!(to.is_none());

        let (from, _) = local_day_bounds(Some(NaiveDate::MIN), None, seoul());
        assert!(from.is_none());

        let last_day = NaiveDate::MAX.pred_opt().unwrap();
        let (_, to) = local_day_bounds(None, Some(last_day), FixedOffset::east_opt(0).unwrap());
        assert_eq!(to.unwrap().date_naive(), NaiveDate::MAX);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("kim"), "%kim%");
        assert_eq!(like_pattern("a_b%"), "%a\\_b\\%%");
    }

    #[test]
    fn test_sort_entries_newest_first_with_id_tiebreak() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut list = vec![
            login_entry(login_row(at, 1)),
            login_entry(login_row(at + Duration::seconds(5), 2)),
            login_entry(login_row(at, 3)),
        ];
        sort_entries(&mut list);
        let ids: Vec<u128> = list.iter().map(|e| e.id.as_u128()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_paginate_first_and_last_pages() {
        let mut list = entries(120);
        sort_entries(&mut list);

        let first = paginate(list.clone(), 1, 50);
        assert_eq!(first.entries.len(), 50);
        assert_eq!(
            first.page,
            PageInfo {
                current_page: 1,
                total_pages: 3,
                total_count: 120,
                has_previous: false,
                has_next: true,
            }
        );

        let last = paginate(list, 3, 50);
        assert_eq!(last.entries.len(), 20);
        assert!(last.page.has_previous);
        assert!(!last.page.has_next);
    }

    #[test]
    fn test_paginate_clamps_out_of_range() {
        let list = entries(10);
        let page = paginate(list.clone(), 0, 4);
        assert_eq!(page.page.current_page, 1);
        let page = paginate(list, 99, 4);
        assert_eq!(page.page.current_page, 3);
        assert_eq!(page.entries.len(), 2);
    }

    #[test]
    fn test_paginate_empty_feed() {
        let page = paginate(Vec::new(), 1, 50);
        assert!(page.entries.is_empty());
        assert_eq!(page.page.total_pages, 1);
        assert_eq!(page.page.total_count, 0);
        assert!(!page.page.has_previous);
        assert!(!page.page.has_next);
    }

    #[test]
    fn test_login_entry_carries_failure_reason() {
        let mut row = login_row(Utc::now(), 1);
        row.success = false;
        row.failure_reason = Some("invalid_password".to_string());
        let entry = login_entry(row);
        assert_eq!(
            entry.event,
            AuditEvent::Login {
                success: false,
                failure_reason: Some("invalid_password".to_string()),
            }
        );
    }

    fn download_row(download_type: &str) -> DownloadRow {
        DownloadRow {
            id: Uuid::from_u128(1),
            created_at: Utc::now(),
            user_id: None,
            username: Some("lee".to_string()),
            ip_address: None,
            download_type: download_type.to_string(),
            artifact_id: None,
            artifact_storage_key: None,
            artifact_version: None,
            artifact_country_code: None,
            artifact_product_name: None,
            artifact_category_name: None,
            product_name: None,
            country_code: None,
            artifact_count: None,
        }
    }

    #[test]
    fn test_bulk_download_entry() {
        let mut row = download_row("bulk");
        row.product_name = Some("SAST".to_string());
        row.country_code = Some("KR".to_string());
        row.artifact_count = Some(4);
        match download_entry(row).event {
            AuditEvent::Download(DownloadEvent::Bulk {
                product_name,
                country_code,
                artifact_count,
            }) => {
                assert_eq!(product_name.as_deref(), Some("SAST"));
                assert_eq!(country_code.as_deref(), Some("KR"));
                assert_eq!(artifact_count, 4);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_single_download_entry_with_and_without_artifact() {
        let mut row = download_row("single");
        row.artifact_id = Some(Uuid::from_u128(9));
        row.artifact_storage_key = Some("artifacts/2024/01/x/SAST_브로슈어_v1.pdf".to_string());
        row.artifact_version = Some("1".to_string());
        row.artifact_product_name = Some("SAST".to_string());
        row.artifact_category_name = Some("브로슈어".to_string());
        match download_entry(row).event {
            AuditEvent::Download(DownloadEvent::Single { artifact: Some(a) }) => {
                assert_eq!(a.filename, "SAST_브로슈어_v1.pdf");
                assert!(!a.deleted);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let gone = download_row("single");
        assert_eq!(
            download_entry(gone).event,
            AuditEvent::Download(DownloadEvent::Single { artifact: None })
        );
    }

    #[test]
    fn test_delete_entry_uses_frozen_snapshot() {
        let details = DeleteDetails {
            snapshot: ArtifactSnapshot {
                filename: "DAST_규격서_v2.pdf".to_string(),
                country_code: Some("JP".to_string()),
                product_name: "DAST".to_string(),
                category_name: "규격서".to_string(),
                version: "2".to_string(),
                uploader: Some("park".to_string()),
            },
            deleted_as: DeletedAs::Admin,
        };
        let row = ActivityRow {
            id: Uuid::from_u128(3),
            created_at: Utc::now(),
            user_id: None,
            username: Some("admin".to_string()),
            ip_address: None,
            action: "delete".to_string(),
            artifact_id: None,
            details: serde_json::to_value(&details).unwrap(),
        };
        match activity_entry(row).event {
            AuditEvent::Delete {
                artifact: Some(a),
                deleted_as,
            } => {
                assert!(a.deleted);
                assert_eq!(a.filename, "DAST_규격서_v2.pdf");
                assert_eq!(a.country_code.as_deref(), Some("JP"));
                assert_eq!(deleted_as, Some(DeletedAs::Admin));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_upload_entry_marks_removed_artifact() {
        let details = UploadDetails {
            country_code: None,
            product_name: "MCP".to_string(),
            category_name: "인증서".to_string(),
            version: "1".to_string(),
            filename: "MCP_인증서_v1.pdf".to_string(),
        };
        let row = ActivityRow {
            id: Uuid::from_u128(4),
            created_at: Utc::now(),
            user_id: None,
            username: None,
            ip_address: None,
            action: "upload".to_string(),
            artifact_id: None,
            details: serde_json::to_value(&details).unwrap(),
        };
        match activity_entry(row).event {
            AuditEvent::Upload { artifact: Some(a) } => {
                assert!(a.deleted);
                assert_eq!(a.product_name, "MCP");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
