//! Attachment responses for artifact and archive downloads.

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

/// File body served as an attachment
pub struct DownloadResponse {
    pub data: Bytes,
    pub content_type: String,
    pub filename: String,
}

impl DownloadResponse {
    pub fn new(data: Bytes, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }
}

/// `Content-Disposition` value with an ASCII fallback name and the exact
/// UTF-8 name percent-encoded per RFC 5987.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

impl IntoResponse for DownloadResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&self.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.data.len()));
        match HeaderValue::from_str(&content_disposition(&self.filename)) {
            Ok(value) => {
                headers.insert(CONTENT_DISPOSITION, value);
            }
            Err(e) => {
                tracing::warn!(filename = %self.filename, error = %e, "Unencodable filename");
                headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
            }
        }

        (StatusCode::OK, headers, Body::from(self.data)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_filename() {
        assert_eq!(
            content_disposition("p-cloud_KR_saleskit.zip"),
            "attachment; filename=\"p-cloud_KR_saleskit.zip\"; filename*=UTF-8''p-cloud_KR_saleskit.zip"
        );
    }

    #[test]
    fn test_korean_filename_is_percent_encoded() {
        let value = content_disposition("제품소개서.pdf");
        assert!(value.contains("filename*=UTF-8''%EC%A0%9C%ED%92%88%EC%86%8C%EA%B0%9C%EC%84%9C.pdf"));
        assert!(value.contains("filename=\"_____.pdf\""));
    }

    #[test]
    fn test_quotes_do_not_break_header() {
        let value = content_disposition("a\"b.pdf");
        assert!(value.starts_with("attachment; filename=\"a_b.pdf\";"));
        assert!(value.contains("a%22b.pdf"));
    }

    #[test]
    fn test_response_headers() {
        let resp = DownloadResponse::new(
            Bytes::from_static(b"%PDF"),
            "application/pdf",
            "Enterprise_제품소개서_v1.0.0.pdf",
        )
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/pdf");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "4");
        let disposition = resp.headers()[CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.contains("filename*=UTF-8''Enterprise_"));
    }
}
