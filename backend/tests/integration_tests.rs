//! Integration tests for the DocSparrow backend.
//!
//! These tests require a running, seeded server with a staff account:
//!
//! ```sh
//! docsparrow seed
//! docsparrow create-user admin --password admin123 --staff
//! docsparrow create-user sales --password sales1234
//! export TEST_BASE_URL="http://127.0.0.1:8080"
//! cargo test --test integration_tests -- --ignored
//! ```

use std::env;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestServer {
    base_url: String,
    client: Client,
    access_token: String,
}

impl TestServer {
    async fn login_as(username: &str, password: &str) -> TestResult<Self> {
        let base_url = env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
        let client = Client::new();
        let resp = client
            .post(format!("{}/api/v1/auth/login", base_url))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(format!("login failed: {}", resp.status()).into());
        }
        let body: Value = resp.json().await?;
        let access_token = body["access_token"]
            .as_str()
            .ok_or("No access token")?
            .to_string();
        Ok(Self {
            base_url,
            client,
            access_token,
        })
    }

    async fn admin() -> TestResult<Self> {
        Self::login_as("admin", "admin123").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> TestResult<(StatusCode, Value)> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }

    async fn find_id(&self, path: &str, name: &str) -> TestResult<String> {
        let (_, items) = self.get_json(path).await?;
        items
            .as_array()
            .and_then(|items| items.iter().find(|i| i["name"] == name))
            .and_then(|i| i["id"].as_str())
            .map(String::from)
            .ok_or_else(|| format!("{} not found in {}", name, path).into())
    }

    async fn upload(
        &self,
        product_id: &str,
        category_id: &str,
        country: &str,
        version: &str,
        filename: &str,
    ) -> TestResult<reqwest::Response> {
        let form = Form::new()
            .text("product_id", product_id.to_string())
            .text("category_id", category_id.to_string())
            .text("country", country.to_string())
            .text("version", version.to_string())
            .part(
                "file",
                Part::bytes(b"%PDF-1.4 test".to_vec())
                    .file_name(filename.to_string())
                    .mime_str("application/pdf")?,
            );
        Ok(self
            .client
            .post(self.url("/api/v1/artifacts/upload"))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?)
    }

    async fn toggle_cell(
        &self,
        country: &str,
        product_id: &str,
        category_id: &str,
    ) -> TestResult<bool> {
        let resp = self
            .client
            .post(self.url("/api/v1/admin/taxonomy/disabled-cells/toggle"))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "country": country,
                "product_id": product_id,
                "category_id": category_id,
            }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await?;
        body["disabled"]
            .as_bool()
            .ok_or_else(|| "toggle response has no disabled flag".into())
    }
}

fn unique_version() -> String {
    format!("9.{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore]
async fn test_health() -> TestResult {
    let base_url = env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
    let resp = Client::new().get(format!("{}/health", base_url)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_invalid_login_rejected() -> TestResult {
    let result = TestServer::login_as("admin", "not-the-password").await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_matrix_requires_auth() -> TestResult {
    let base_url = env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".into());
    let resp = Client::new()
        .get(format!("{}/api/v1/matrix", base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_matrix_unknown_country_falls_back_to_default() -> TestResult {
    let server = TestServer::admin().await?;
    let (status, matrix) = server.get_json("/api/v1/matrix?country=ZZ").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matrix["selected_country"]["code"], "KR");
    assert_eq!(matrix["products"].as_array().map(Vec::len), Some(10));
    assert_eq!(matrix["rows"].as_array().map(Vec::len), Some(17));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_upload_history_download_delete() -> TestResult {
    let server = TestServer::admin().await?;
    let product_id = server.find_id("/api/v1/taxonomy/products", "Enterprise").await?;
    let category_id = server.find_id("/api/v1/taxonomy/categories", "제품소개서").await?;
    let version = unique_version();
    let filename = format!("Enterprise_제품소개서_v{}.pdf", version);

    let resp = server
        .upload(&product_id, &category_id, "KR", &version, &filename)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded: Value = resp.json().await?;
    let artifact_id = uploaded["id"].as_str().ok_or("no id")?.to_string();

    let (_, history) = server
        .get_json(&format!(
            "/api/v1/artifacts/history?product_id={}&category_id={}&country=KR",
            product_id, category_id
        ))
        .await?;
    assert_eq!(history["history"][0]["id"], artifact_id.as_str());

    let resp = server
        .client
        .get(server.url(&format!("/api/v1/artifacts/{}/download", artifact_id)))
        .bearer_auth(&server.access_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("filename*=UTF-8''"));
    assert_eq!(resp.bytes().await?.as_ref(), b"%PDF-1.4 test");

    let resp = server
        .upload(&product_id, &category_id, "KR", &version, &filename)
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .client
        .delete(server.url(&format!("/api/v1/artifacts/{}", artifact_id)))
        .bearer_auth(&server.access_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["deleted_as"], "admin");

    let (status, _) = server
        .get_json(&format!("/api/v1/artifacts/{}", artifact_id))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_upload_us_requires_en_prefix() -> TestResult {
    let server = TestServer::admin().await?;
    let product_id = server.find_id("/api/v1/taxonomy/products", "SAST").await?;
    let category_id = server.find_id("/api/v1/taxonomy/categories", "브로슈어").await?;
    let version = unique_version();

    let resp = server
        .upload(
            &product_id,
            &category_id,
            "US",
            &version,
            &format!("SAST_브로슈어_v{}.pdf", version),
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "FILENAME_MISMATCH");
    assert_eq!(body["expected"], format!("EN_SAST_브로슈어_v{}", version));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_bulk_download_and_audit_log() -> TestResult {
    let server = TestServer::admin().await?;
    let product_id = server.find_id("/api/v1/taxonomy/products", "SCA").await?;
    let category_id = server.find_id("/api/v1/taxonomy/categories", "규격서").await?;
    let version = unique_version();
    let resp = server
        .upload(
            &product_id,
            &category_id,
            "JP",
            &version,
            &format!("SCA_규격서_v{}.pdf", version),
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .client
        .get(server.url(&format!(
            "/api/v1/artifacts/bulk-download?product_id={}&country=JP&version={}",
            product_id, version
        )))
        .bearer_auth(&server.access_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/zip")
    );
    let zip = resp.bytes().await?;
    assert_eq!(&zip[..2], b"PK");

    let (status, page) = server.get_json("/api/v1/audit-log?type=download").await?;
    assert_eq!(status, StatusCode::OK);
    let first = &page["entries"][0];
    assert_eq!(first["type"], "download");
    assert_eq!(first["download_type"], "bulk");
    assert_eq!(first["artifact_count"], 1);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_audit_log_is_staff_only() -> TestResult {
    let server = TestServer::login_as("sales", "sales1234").await?;
    let (status, body) = server.get_json("/api/v1/audit-log").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_toggle_cell_twice_restores_and_blocks_upload_while_disabled() -> TestResult {
    let server = TestServer::admin().await?;
    let product_id = server.find_id("/api/v1/taxonomy/products", "Enterprise").await?;
    let category_id = server.find_id("/api/v1/taxonomy/categories", "브로슈어").await?;
    let version = unique_version();
    let filename = format!("Enterprise_브로슈어_v{}.pdf", version);

    let first = server.toggle_cell("JP", &product_id, &category_id).await?;
    let second = server.toggle_cell("JP", &product_id, &category_id).await?;
    assert_eq!(second, !first);

    // Leave the cell disabled for the upload attempt, then restore it.
    if !second {
        server.toggle_cell("JP", &product_id, &category_id).await?;
    }
    let resp = server
        .upload(&product_id, &category_id, "JP", &version, &filename)
        .await?;
    let status = resp.status();
    let body: Value = resp.json().await?;
    if !second {
        server.toggle_cell("JP", &product_id, &category_id).await?;
    }

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_APPLICABLE");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_bulk_download_without_matches_is_not_found() -> TestResult {
    let server = TestServer::admin().await?;
    let product_id = server.find_id("/api/v1/taxonomy/products", "SCA").await?;
    let resp = server
        .client
        .get(server.url(&format!(
            "/api/v1/artifacts/bulk-download?product_id={}&country=JP&version={}",
            product_id,
            unique_version()
        )))
        .bearer_auth(&server.access_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "NOTHING_TO_DOWNLOAD");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_delete_by_other_user_is_forbidden_and_not_audited() -> TestResult {
    let admin = TestServer::admin().await?;
    let sales = TestServer::login_as("sales", "sales1234").await?;
    let product_id = admin.find_id("/api/v1/taxonomy/products", "SAST").await?;
    let category_id = admin.find_id("/api/v1/taxonomy/categories", "규격서").await?;
    let version = unique_version();

    let resp = admin
        .upload(
            &product_id,
            &category_id,
            "KR",
            &version,
            &format!("SAST_규격서_v{}.pdf", version),
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded: Value = resp.json().await?;
    let artifact_id = uploaded["id"].as_str().ok_or("no id")?.to_string();

    let resp = sales
        .client
        .delete(sales.url(&format!("/api/v1/artifacts/{}", artifact_id)))
        .bearer_auth(&sales.access_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = admin
        .get_json(&format!("/api/v1/artifacts/{}", artifact_id))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = admin.get_json("/api/v1/audit-log?type=delete").await?;
    assert_eq!(status, StatusCode::OK);
    let entries = page["entries"].as_array().ok_or("no entries")?;
    assert!(entries
        .iter()
        .all(|e| e["artifact"]["artifact_id"] != artifact_id.as_str()));
    Ok(())
}
