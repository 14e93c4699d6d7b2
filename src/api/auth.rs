//! Authentication API endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::{body, created, require, success, ApiResult};
use crate::auth::{verify_admin, verify_password};
use crate::errors::AppError;
use crate::models::{AdminLoginRequest, LoginRequest, Role, SignupRequest, User, UserPayload};
use crate::AppState;

/// Id of the built-in administrator account.
pub const ADMIN_USER_ID: &str = "admin-001";

/// POST /api/auth/signup - Register a new user.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<UserPayload> {
    let request = body(payload)?;
    require(&request.email, "Email")?;
    require(&request.name, "Name")?;
    require(&request.password, "Password")?;

    let user = state.repo.create_user(&request).await?;
    tracing::info!(user_id = %user.id, "User registered");
    created(UserPayload { user })
}

/// POST /api/auth/login - Log in with email and password.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<UserPayload> {
    let request = body(payload)?;
    require(&request.email, "Email")?;
    require(&request.password, "Password")?;

    let (user, password_hash) = state
        .repo
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&request.password, &password_hash) {
        tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
        return Err(AppError::Unauthorized("Wrong password".to_string()));
    }

    success(UserPayload { user })
}

/// POST /api/auth/admin-login - Log in as the configured administrator.
pub async fn admin_login(
    State(state): State<AppState>,
    payload: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> ApiResult<UserPayload> {
    let request = body(payload)?;
    let config = &state.config;
    if !verify_admin(
        &request.username,
        &request.password,
        &config.admin_username,
        &config.admin_password,
    ) {
        tracing::warn!("Rejected admin login attempt");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    success(UserPayload {
        user: User {
            id: ADMIN_USER_ID.to_string(),
            email: "admin@civicbridge.com".to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
            created_at: None,
        },
    })
}
