//! API request/response models for registration and login.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to register a new user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Request to log in with username and password
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both register and login: a bearer token for the user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    /// Send as `Authorization: Bearer <token>`
    pub token: String,
    pub username: String,
    pub email: String,
}
