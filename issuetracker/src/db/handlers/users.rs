//! User store: the trait consumed by the auth core and its in-memory backend.

use crate::api::models::users::Role;
use crate::db::{
    errors::{DbError, Result},
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::collections::{BTreeSet, HashMap};
use tracing::instrument;
use uuid::Uuid;

/// Read-mostly access to user records.
///
/// Implementations must be safe to share between concurrently running
/// requests; writes happen only at registration, admin seeding and deletion.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Create a new user. Fails with [`DbError::UniqueViolation`] if the
    /// username or email is taken.
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Get a user by ID
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Get a user by username (the token subject)
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Get a user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    /// Get lots of users by their IDs, keyed by ID. Missing IDs are skipped.
    async fn get_bulk(&self, ids: Vec<UserId>) -> Result<HashMap<UserId, UserDBResponse>>;

    /// List all users ordered by username
    async fn list(&self) -> Result<Vec<UserDBResponse>>;

    /// Replace a user's password hash and roles
    async fn set_credentials(&self, id: UserId, password_hash: &str, roles: &BTreeSet<Role>) -> Result<UserDBResponse>;

    /// Delete a user by ID
    async fn delete(&self, id: UserId) -> Result<bool>;
}

/// Process-local user store backed by concurrent maps.
#[derive(Debug, Default)]
pub struct InMemoryUsers {
    users: DashMap<UserId, UserDBResponse>,
    by_username: DashMap<String, UserId>,
    by_email: DashMap<String, UserId>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUsers {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user_id = Uuid::new_v4();

        // Reserve both unique keys before publishing the record
        match self.by_username.entry(request.username.clone()) {
            Entry::Occupied(_) => return Err(DbError::user_conflict("username")),
            Entry::Vacant(slot) => {
                slot.insert(user_id);
            }
        }
        match self.by_email.entry(request.email.clone()) {
            Entry::Occupied(_) => {
                self.by_username.remove(&request.username);
                return Err(DbError::user_conflict("email"));
            }
            Entry::Vacant(slot) => {
                slot.insert(user_id);
            }
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: user_id,
            username: request.username.clone(),
            email: request.email.clone(),
            full_name: request.full_name.clone(),
            roles: request.roles.clone(),
            password_hash: request.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user_id, user.clone());
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    #[instrument(skip(self), err)]
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.by_username.get(username).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<UserId>) -> Result<HashMap<UserId, UserDBResponse>> {
        Ok(ids
            .into_iter()
            .filter_map(|id| self.users.get(&id).map(|user| (id, user.clone())))
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<UserDBResponse>> {
        let mut users: Vec<UserDBResponse> = self.users.iter().map(|entry| entry.value().clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    #[instrument(skip(self, password_hash, roles), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn set_credentials(&self, id: UserId, password_hash: &str, roles: &BTreeSet<Role>) -> Result<UserDBResponse> {
        let mut user = self.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.roles = roles.clone();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: UserId) -> Result<bool> {
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.by_username.remove(&user.username);
                self.by_email.remove(&user.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
