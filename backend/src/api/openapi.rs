//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document for the DocSparrow API.
///
/// Each handler module contributes its own paths and schemas through a
/// per-module `#[derive(OpenApi)]` struct merged in [`build_openapi`].
#[derive(OpenApi)]
#[openapi(
    info(
        title = "DocSparrow API",
        description = "Sales-kit document portal: country x product x category matrix, versioned uploads, bulk downloads and audit trail.",
        version = "0.3.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and password management"),
        (name = "matrix", description = "Dashboard matrix resolution"),
        (name = "artifacts", description = "Upload, history, download, delete and bulk download"),
        (name = "taxonomy", description = "Countries, products, categories, versions and disabled cells"),
        (name = "audit", description = "Merged staff audit log"),
        (name = "health", description = "Health and readiness checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "FILENAME_MISMATCH")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Expected base filename, only for FILENAME_MISMATCH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Submitted base filename, only for FILENAME_MISMATCH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Adds Bearer JWT security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::matrix::MatrixApiDoc::openapi());
    doc.merge(super::handlers::artifacts::ArtifactsApiDoc::openapi());
    doc.merge(super::handlers::taxonomy::TaxonomyApiDoc::openapi());
    doc.merge(super::handlers::audit::AuditApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}
