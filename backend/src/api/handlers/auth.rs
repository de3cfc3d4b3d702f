//! Authentication handlers.

use axum::{
    extract::{Extension, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use super::ClientOrigin;
use crate::api::dto::MessageResponse;
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::user::User;
use crate::services::auth_service::AuthService;

/// Create public auth routes (no auth required)
pub fn public_router() -> Router<SharedState> {
    Router::new().route("/login", post(login))
}

/// Create protected auth routes (auth required)
pub fn protected_router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/change-password", post(change_password))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub is_staff: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            display_name: u.display_name,
            is_staff: u.is_staff,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Login with credentials
#[utoipa::path(
    post,
    path = "/login",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    ClientOrigin(origin): ClientOrigin,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let auth_service = AuthService::new(state.db.clone(), state.config.clone());

    let (user, token) = auth_service
        .authenticate(&payload.username, &payload.password, &origin)
        .await?;

    Ok(Json(LoginResponse {
        access_token: token.access_token,
        token_type: token.token_type.to_string(),
        expires_in: token.expires_in,
        user: user.into(),
    }))
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/me",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<UserResponse>> {
    let auth_service = AuthService::new(state.db.clone(), state.config.clone());
    let user = auth_service.get_active_user(auth.user_id).await?;
    Ok(Json(user.into()))
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/change-password",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new password", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let auth_service = AuthService::new(state.db.clone(), state.config.clone());
    auth_service
        .change_password(auth.user_id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::ok("Password changed")))
}

#[derive(OpenApi)]
#[openapi(
    paths(login, get_current_user, change_password),
    components(schemas(LoginRequest, LoginResponse, UserResponse, ChangePasswordRequest))
)]
pub struct AuthApiDoc;
