//! Taxonomy handlers.
//!
//! Reads are open to any signed-in user. Product and category maintenance,
//! version management and disabled-cell toggles are mounted under the staff
//! router.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use super::resolve_country_id;
use crate::api::dto::{empty_string_as_none, MessageResponse};
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::taxonomy::{Category, Country, Department, DisabledCell, Product, ProductVersion};
use crate::services::taxonomy_service::{CategoryInput, ProductInput, TaxonomyService};

/// Read-only taxonomy routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/countries", get(list_countries))
        .route("/products", get(list_products))
        .route("/products/:id/versions", get(list_product_versions))
        .route("/categories", get(list_categories))
        .route("/disabled-cells", get(list_disabled_cells))
}

/// Staff-only taxonomy maintenance routes
pub fn admin_router() -> Router<SharedState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route("/products/:id/versions", post(create_product_version))
        .route("/product-versions/:id/activate", post(activate_product_version))
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        .route("/disabled-cells/toggle", post(toggle_disabled_cell))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub name: String,
    /// CSS class used to tint the product's matrix column
    pub color_class: String,
    #[serde(default)]
    pub display_order: i32,
}

impl From<ProductRequest> for ProductInput {
    fn from(r: ProductRequest) -> Self {
        Self {
            name: r.name,
            color_class: r.color_class,
            display_order: r.display_order,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    pub department: Department,
    #[serde(default)]
    pub display_order: i32,
}

impl From<CategoryRequest> for CategoryInput {
    fn from(r: CategoryRequest) -> Self {
        Self {
            name: r.name,
            department: r.department,
            display_order: r.display_order,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVersionRequest {
    pub version_number: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CountryParam {
    /// Country code; defaults to the configured country
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleCellRequest {
    /// Country code; defaults to the configured country
    pub country: Option<String>,
    pub product_id: Uuid,
    pub category_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleCellResponse {
    pub success: bool,
    pub country_id: Uuid,
    pub product_id: Uuid,
    pub category_id: Uuid,
    /// State of the cell after the toggle
    pub disabled: bool,
}

/// List countries in display order
#[utoipa::path(
    get,
    path = "/countries",
    context_path = "/api/v1/taxonomy",
    tag = "taxonomy",
    responses((status = 200, description = "Countries", body = Vec<Country>)),
    security(("bearer_auth" = []))
)]
pub async fn list_countries(State(state): State<SharedState>) -> Result<Json<Vec<Country>>> {
    Ok(Json(TaxonomyService::new(state.db.clone()).list_countries().await?))
}

/// List products in display order
#[utoipa::path(
    get,
    path = "/products",
    context_path = "/api/v1/taxonomy",
    tag = "taxonomy",
    responses((status = 200, description = "Products", body = Vec<Product>)),
    security(("bearer_auth" = []))
)]
pub async fn list_products(State(state): State<SharedState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(TaxonomyService::new(state.db.clone()).list_products().await?))
}

/// List categories in display order
#[utoipa::path(
    get,
    path = "/categories",
    context_path = "/api/v1/taxonomy",
    tag = "taxonomy",
    responses((status = 200, description = "Categories", body = Vec<Category>)),
    security(("bearer_auth" = []))
)]
pub async fn list_categories(State(state): State<SharedState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(TaxonomyService::new(state.db.clone()).list_categories().await?))
}

/// List a product's versions, newest first
#[utoipa::path(
    get,
    path = "/products/{id}/versions",
    context_path = "/api/v1/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses((status = 200, description = "Product versions", body = Vec<ProductVersion>)),
    security(("bearer_auth" = []))
)]
pub async fn list_product_versions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProductVersion>>> {
    Ok(Json(
        TaxonomyService::new(state.db.clone())
            .list_product_versions(id)
            .await?,
    ))
}

/// List disabled cells of a country
#[utoipa::path(
    get,
    path = "/disabled-cells",
    context_path = "/api/v1/taxonomy",
    tag = "taxonomy",
    params(CountryParam),
    responses((status = 200, description = "Disabled cells", body = Vec<DisabledCell>)),
    security(("bearer_auth" = []))
)]
pub async fn list_disabled_cells(
    State(state): State<SharedState>,
    Query(params): Query<CountryParam>,
) -> Result<Json<Vec<DisabledCell>>> {
    let Some(country_id) = resolve_country_id(&state, params.country.as_deref()).await? else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(
        TaxonomyService::new(state.db.clone())
            .list_disabled_cells(country_id)
            .await?,
    ))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/products",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product created", body = Product),
        (status = 409, description = "Name already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_product(
    State(state): State<SharedState>,
    Json(payload): Json<ProductRequest>,
) -> Result<Json<Product>> {
    let input = ProductInput::from(payload);
    Ok(Json(TaxonomyService::new(state.db.clone()).create_product(&input).await?))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/products/{id}",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductRequest>,
) -> Result<Json<Product>> {
    let input = ProductInput::from(payload);
    Ok(Json(
        TaxonomyService::new(state.db.clone())
            .update_product(id, &input)
            .await?,
    ))
}

/// Delete a product that has no artifacts
#[utoipa::path(
    delete,
    path = "/products/{id}",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 409, description = "Product still has artifacts", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_product(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    TaxonomyService::new(state.db.clone()).delete_product(id).await?;
    Ok(Json(MessageResponse::ok("Product deleted")))
}

/// Add a version to a product
#[utoipa::path(
    post,
    path = "/products/{id}/versions",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateVersionRequest,
    responses(
        (status = 200, description = "Version created", body = ProductVersion),
        (status = 404, description = "Product not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_product_version(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateVersionRequest>,
) -> Result<Json<ProductVersion>> {
    Ok(Json(
        TaxonomyService::new(state.db.clone())
            .create_product_version(id, &payload.version_number, payload.is_active)
            .await?,
    ))
}

/// Make a version its product's only active version
#[utoipa::path(
    post,
    path = "/product-versions/{id}/activate",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Product version ID")),
    responses(
        (status = 200, description = "Version activated", body = ProductVersion),
        (status = 404, description = "Version not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn activate_product_version(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductVersion>> {
    Ok(Json(
        TaxonomyService::new(state.db.clone())
            .set_active_version(id)
            .await?,
    ))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/categories",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category created", body = Category),
        (status = 409, description = "Name already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    State(state): State<SharedState>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    let input = CategoryInput::from(payload);
    Ok(Json(TaxonomyService::new(state.db.clone()).create_category(&input).await?))
}

/// Update a category
#[utoipa::path(
    put,
    path = "/categories/{id}",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    let input = CategoryInput::from(payload);
    Ok(Json(
        TaxonomyService::new(state.db.clone())
            .update_category(id, &input)
            .await?,
    ))
}

/// Delete a category that has no artifacts
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 409, description = "Category still has artifacts", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_category(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    TaxonomyService::new(state.db.clone()).delete_category(id).await?;
    Ok(Json(MessageResponse::ok("Category deleted")))
}

/// Flip a cell between applicable and not applicable
#[utoipa::path(
    post,
    path = "/disabled-cells/toggle",
    context_path = "/api/v1/admin/taxonomy",
    tag = "taxonomy",
    request_body = ToggleCellRequest,
    responses(
        (status = 200, description = "New cell state", body = ToggleCellResponse),
        (status = 400, description = "No such country", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_disabled_cell(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<ToggleCellRequest>,
) -> Result<Json<ToggleCellResponse>> {
    let country = payload
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let country_id = resolve_country_id(&state, country)
        .await?
        .ok_or_else(|| AppError::Validation("Unknown country".to_string()))?;

    let service = TaxonomyService::new(state.db.clone());
    service.get_product(payload.product_id).await?;
    service.get_category(payload.category_id).await?;
    let disabled = service
        .toggle_disabled_cell(country_id, payload.product_id, payload.category_id, auth.user_id)
        .await?;

    Ok(Json(ToggleCellResponse {
        success: true,
        country_id,
        product_id: payload.product_id,
        category_id: payload.category_id,
        disabled,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_countries,
        list_products,
        list_categories,
        list_product_versions,
        list_disabled_cells,
        create_product,
        update_product,
        delete_product,
        create_product_version,
        activate_product_version,
        create_category,
        update_category,
        delete_category,
        toggle_disabled_cell,
    ),
    components(schemas(
        Country,
        Product,
        Category,
        Department,
        ProductVersion,
        DisabledCell,
        ProductRequest,
        CategoryRequest,
        CreateVersionRequest,
        ToggleCellRequest,
        ToggleCellResponse,
    ))
)]
pub struct TaxonomyApiDoc;
