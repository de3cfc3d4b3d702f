//! Authentication service.
//!
//! Handles password login, JWT issuance and validation, and password
//! changes. Every login attempt is written to the audit trail.

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::audit_log::LoginFailure;
use crate::models::user::User;
use crate::services::audit_service::{self, RequestOrigin};

const MIN_PASSWORD_LENGTH: usize = 8;

const USER_COLUMNS: &str =
    "id, username, display_name, password_hash, is_staff, is_active, last_login_at, created_at";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub username: String,
    pub is_staff: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issued access token
#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Reject passwords too short to be useful.
pub fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Authentication service
pub struct AuthService {
    db: PgPool,
    config: Arc<Config>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(db: PgPool, config: Arc<Config>) -> Self {
        let secret = config.jwt_secret.clone();
        Self {
            db,
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Authenticate user with username and password
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        origin: &RequestOrigin,
    ) -> Result<(User, AccessToken)> {
        let username = username.trim();
        let user = self.find_by_username(username).await?;

        let failure = match &user {
            None => Some(LoginFailure::UnknownUser),
            Some(u) if !u.is_active => Some(LoginFailure::InactiveUser),
            Some(u) => {
                let valid = verify(password, &u.password_hash).map_err(|e| {
                    AppError::Internal(format!("Password verification failed: {}", e))
                })?;
                (!valid).then_some(LoginFailure::InvalidPassword)
            }
        };

        audit_service::insert_login_attempt(
            &self.db,
            user.as_ref().map(|u| u.id),
            username,
            failure,
            origin,
        )
        .await?;

        if let Some(reason) = failure {
            tracing::info!(username = %username, reason = reason.as_str(), "Login failed");
            return Err(AppError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        let user = user.ok_or_else(|| {
            AppError::Authentication("Invalid username or password".to_string())
        })?;

        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let token = self.generate_token(&user)?;
        tracing::info!(user_id = %user.id, username = %user.username, "Login succeeded");
        Ok((user, token))
    }

    /// Issue an access token for a user
    pub fn generate_token(&self, user: &User) -> Result<AccessToken> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.jwt_access_token_expiry_minutes);

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)?;

        Ok(AccessToken {
            access_token,
            token_type: "Bearer",
            expires_in: (self.config.jwt_access_token_expiry_minutes.max(0) * 60) as u64,
        })
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;
        Ok(data.claims)
    }

    /// Get an active user by id
    pub async fn get_active_user(&self, id: Uuid) -> Result<User> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND is_active = true",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::Authentication("User not found".to_string()))
    }

    /// Change a password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.get_active_user(user_id).await?;
        let valid = verify(current_password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }
        check_password_strength(new_password)?;

        let password_hash = Self::hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Create a local account
    pub async fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        password: &str,
        is_staff: bool,
    ) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        check_password_strength(password)?;
        let password_hash = Self::hash_password(password)?;

        let sql = format!(
            "INSERT INTO users (username, display_name, password_hash, is_staff) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(display_name.map(str::trim).filter(|d| !d.is_empty()))
            .bind(password_hash)
            .bind(is_staff)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                    AppError::Conflict(format!("User '{}' already exists", username))
                }
                _ => AppError::from(e),
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, is_staff, "User created");
        Ok(user)
    }

    /// Hash a password using bcrypt
    pub fn hash_password(password: &str) -> Result<String> {
        hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}
