//! Authentication middleware.
//!
//! Validates `Authorization: Bearer <jwt>`, reloads the user it names and
//! inserts an [`AuthExtension`] into the request for handlers. Staff status
//! and deactivation take effect without waiting for the token to expire.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::artifact_service::Actor;
use crate::models::user::User;
use crate::services::auth_service::AuthService;

/// Extension that holds authenticated user information
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: Uuid,
    pub username: String,
    pub is_staff: bool,
}

impl AuthExtension {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            is_staff: self.is_staff,
        }
    }
}

impl From<&User> for AuthExtension {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

/// Pull the bearer token out of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> std::result::Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Authentication("Invalid authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::Authentication("Invalid authorization header format".to_string())
        })
}

async fn authenticate(
    auth_service: &AuthService,
    headers: &HeaderMap,
) -> std::result::Result<AuthExtension, AppError> {
    let token = bearer_token(headers)?;
    let claims = auth_service.validate_access_token(token)?;
    let user = auth_service.get_active_user(claims.sub).await?;
    Ok(AuthExtension::from(&user))
}

/// Authentication middleware function - requires valid token
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&auth_service, request.headers()).await {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Staff-only middleware - requires an authenticated staff user
pub async fn admin_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = match authenticate(&auth_service, request.headers()).await {
        Ok(auth) => auth,
        Err(e) => return e.into_response(),
    };

    if !auth.is_staff {
        return AppError::Authorization("Staff access required".to_string()).into_response();
    }

    request.extensions_mut().insert(auth);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(bearer_token(&HeaderMap::new()).is_err());
        assert!(bearer_token(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&headers("Bearer   ")).is_err());
    }

    #[test]
    fn test_extension_reflects_stored_user() {
        let id = Uuid::new_v4();
        let mut user = User {
            id,
            username: "park".to_string(),
            display_name: None,
            password_hash: String::new(),
            is_staff: true,
            is_active: true,
            last_login_at: None,
            created_at: chrono::Utc::now(),
        };
        let ext = AuthExtension::from(&user);
        assert_eq!(ext.user_id, id);
        assert_eq!(ext.username, "park");
        assert!(ext.actor().is_staff);

        user.is_staff = false;
        assert!(!AuthExtension::from(&user).actor().is_staff);
    }
}
