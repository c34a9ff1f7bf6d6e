//! Store models for users.

use crate::api::models::users::Role;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Store request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub roles: BTreeSet<Role>,
    pub password_hash: String,
}

/// Store response for a user. Carries the credential, so it never leaves the
/// crate through an API model.
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub roles: BTreeSet<Role>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
