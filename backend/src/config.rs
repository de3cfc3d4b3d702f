//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::env;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Root directory of the filesystem blob store
    pub storage_path: String,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT access token expiry in minutes
    pub jwt_access_token_expiry_minutes: i64,

    /// Country code used when a request names no country or an unknown one
    pub default_country_code: String,

    /// Number of merged entries per audit log page
    pub audit_page_size: u32,

    /// Offset of the portal's local time from UTC, in minutes. Audit date
    /// filters are interpreted as local calendar days.
    pub local_utc_offset_minutes: i32,

    /// Maximum accepted upload body size in bytes
    pub max_upload_bytes: usize,

    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,

    /// Record the first `X-Forwarded-For` hop as the client address. Only
    /// enable behind a proxy that overwrites the header.
    pub trust_proxy_headers: bool,
}

redacted_debug!(Config {
    redact database_url,
    show bind_address,
    show storage_path,
    redact jwt_secret,
    show jwt_access_token_expiry_minutes,
    show default_country_code,
    show audit_page_size,
    show local_utc_offset_minutes,
    show max_upload_bytes,
    show log_json,
    show trust_proxy_headers,
});

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL not set".into()))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/docsparrow/media".into()),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AppError::Config("JWT_SECRET not set".into()))?,
            jwt_access_token_expiry_minutes: parse_or("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", 480),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE").unwrap_or_else(|_| "KR".into()),
            audit_page_size: parse_or("AUDIT_PAGE_SIZE", 50).max(1),
            local_utc_offset_minutes: parse_or("LOCAL_UTC_OFFSET_MINUTES", 540),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 100 * 1024 * 1024),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            trust_proxy_headers: parse_or("TRUST_PROXY_HEADERS", false),
        })
    }

    /// Local time offset used for calendar-day audit filters.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.local_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
