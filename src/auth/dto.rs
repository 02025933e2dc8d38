use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for the verification-code-gated password change.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
    pub verification_code: String,
}

/// Response returned after login. `token` is the access token under the
/// bearer scheme, the CSRF token under the csrf scheme.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}
