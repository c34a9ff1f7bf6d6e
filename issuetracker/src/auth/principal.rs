//! The authenticated identity of a request and how it is looked up.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, trace};

use crate::api::models::users::Role;
use crate::db::{errors::DbError, handlers::UserStore, models::users::UserDBResponse};
use crate::types::{UserId, abbrev_uuid};

/// Who is making the current request.
///
/// Built fresh by the request authenticator for every request and never shared
/// between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    /// Never empty; a stored user without roles is treated as a plain user
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<UserDBResponse> for Principal {
    fn from(user: UserDBResponse) -> Self {
        let roles = if user.roles.is_empty() {
            BTreeSet::from([Role::User])
        } else {
            user.roles
        };
        Self {
            id: user.id,
            username: user.username,
            roles,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The token was valid but its subject no longer exists
    #[error("no user named by token subject")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Maps a validated token subject (a username) to the stored user.
#[derive(Clone)]
pub struct PrincipalResolver {
    users: Arc<dyn UserStore>,
}

impl PrincipalResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Roles come from the stored record, not from the token, so role changes
    /// take effect on the next request.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn resolve(&self, subject: &str) -> Result<Principal, ResolveError> {
        let user = self.users.get_by_username(subject).await?.ok_or(ResolveError::UserNotFound)?;
        trace!(user_id = %abbrev_uuid(&user.id), "Resolved token subject");
        Ok(user.into())
    }
}
