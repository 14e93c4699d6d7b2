//! Authentication helpers for the backend.
//!
//! Optional PSK layer for the `/api` routes, password hashing, and
//! constant-time credential checks to mitigate timing attacks.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // No PSK configured: open API (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|key| constant_time_compare(key, &expected));

    match provided {
        Some(true) => next.run(request).await,
        Some(false) => AppError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => AppError::Unauthorized("Missing API key".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hash a password as lowercase hex SHA-256.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Check a password against a stored hash without short-circuiting.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_password(password), stored_hash)
}

/// Check admin credentials against the configured pair.
///
/// Both comparisons always run so timing does not reveal which field was wrong.
pub fn verify_admin(
    username: &str,
    password: &str,
    expected_username: &str,
    expected_password: &str,
) -> bool {
    let user_ok = constant_time_compare(username, expected_username);
    let pass_ok = constant_time_compare(password, expected_password);
    user_ok & pass_ok
}
