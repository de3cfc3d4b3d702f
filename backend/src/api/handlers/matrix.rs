//! Dashboard matrix handler.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::taxonomy::Department;
use crate::services::matrix_service::{
    CellArtifact, Matrix, MatrixCell, MatrixQuery, MatrixRow, MatrixService,
    ProductVersionOptions,
};

const VERSION_PARAM_PREFIX: &str = "version_";

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_matrix))
}

/// Turn raw query parameters into a matrix query. Version filters arrive as
/// `version_<product id>=<label>`; blank values mean no filter.
pub fn parse_matrix_params(params: &HashMap<String, String>) -> Result<MatrixQuery> {
    let non_empty = |key: &str| {
        params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let department = non_empty("department")
        .map(|d| d.parse::<Department>().map_err(AppError::Validation))
        .transpose()?;

    let version_filters = params
        .iter()
        .filter_map(|(key, value)| {
            let product_id = key.strip_prefix(VERSION_PARAM_PREFIX)?;
            let product_id = Uuid::parse_str(product_id).ok()?;
            let value = value.trim();
            (!value.is_empty()).then(|| (product_id, value.to_string()))
        })
        .collect();

    Ok(MatrixQuery {
        country_code: non_empty("country").map(String::from),
        department,
        version_filters,
    })
}

/// Resolve the country x product x category grid
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/matrix",
    tag = "matrix",
    params(
        ("country" = Option<String>, Query, description = "Country code, defaults to the configured country"),
        ("department" = Option<String>, Query, description = "consulting, business or marketing"),
        ("version_<product_id>" = Option<String>, Query, description = "Exact version label to show for a product"),
    ),
    responses(
        (status = 200, description = "Resolved matrix", body = Matrix),
        (status = 400, description = "Unknown department", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_matrix(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Matrix>> {
    let query = parse_matrix_params(&params)?;
    let service = MatrixService::new(state.db.clone(), state.config.default_country_code.clone());
    Ok(Json(service.resolve(&query).await?))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_matrix),
    components(schemas(Matrix, MatrixRow, MatrixCell, CellArtifact, ProductVersionOptions))
)]
pub struct MatrixApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_country_and_department() {
        let q = parse_matrix_params(&params(&[("country", "US"), ("department", "marketing")]))
            .unwrap();
        assert_eq!(q.country_code.as_deref(), Some("US"));
        assert_eq!(q.department, Some(Department::Marketing));
        assert!(q.version_filters.is_empty());
    }

    #[test]
    fn test_parse_version_filters() {
        let id = Uuid::from_u128(5);
        let filtered = format!("version_{}", id);
        let blank = format!("version_{}", Uuid::from_u128(6));
        let q = parse_matrix_params(&params(&[
            (filtered.as_str(), "1.0.0"),
            ("version_not-a-uuid", "2.0"),
            (blank.as_str(), "  "),
        ]))
        .unwrap();
        assert_eq!(q.version_filters.len(), 1);
        assert_eq!(q.version_filters.get(&id).map(String::as_str), Some("1.0.0"));
    }

    #[test]
    fn test_blank_params_are_ignored() {
        let q = parse_matrix_params(&params(&[("country", ""), ("department", " ")])).unwrap();
        assert!(q.country_code.is_none());
        assert!(q.department.is_none());
    }

    #[test]
    fn test_unknown_department_rejected() {
        assert!(matches!(
            parse_matrix_params(&params(&[("department", "sales")])),
            Err(AppError::Validation(_))
        ));
    }
}
