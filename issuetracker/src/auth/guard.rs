//! Authorization decisions for handlers.
//!
//! Each check is a pure function of the request context and what the caller
//! says about the resource. A check either passes or returns a [`Denial`]; there
//! is no default-allow path. Handlers call these before touching state.

use thiserror::Error;
use tracing::debug;

use crate::{
    api::models::users::Role,
    auth::{current_user::RequestContext, principal::Principal},
    errors::Error,
    types::{Requirement, UserId, abbrev_uuid},
};

/// Why an authorization check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    /// No principal on the request
    #[error("authentication required")]
    Unauthenticated,
    /// A principal is present but does not satisfy the requirement
    #[error("forbidden: {required} required")]
    Forbidden { required: Requirement },
}

impl Denial {
    /// Convert to an API error naming the resource that was being accessed.
    pub fn on(self, resource: &str) -> Error {
        self.into_error(Some(resource.to_string()))
    }

    fn into_error(self, resource: Option<String>) -> Error {
        match self {
            Denial::Unauthenticated => Error::Unauthenticated { message: None },
            Denial::Forbidden { required } => Error::Forbidden { required, resource },
        }
    }
}

/// Used when a handler propagates a denial with `?` without naming the resource.
impl From<Denial> for Error {
    fn from(denial: Denial) -> Self {
        denial.into_error(None)
    }
}

/// Pass only if the request carries a principal.
pub fn require_authenticated(ctx: &RequestContext) -> Result<&Principal, Denial> {
    ctx.current_principal().ok_or(Denial::Unauthenticated)
}

/// Pass only if the principal holds `role`.
pub fn require_role(ctx: &RequestContext, role: Role) -> Result<(), Denial> {
    let principal = require_authenticated(ctx)?;
    if principal.has_role(role) {
        return Ok(());
    }

    debug!(user_id = %abbrev_uuid(&principal.id), %role, "Denied: missing role");
    Err(Denial::Forbidden {
        required: Requirement::Role(role),
    })
}

/// Pass only if the principal is the owner of the resource.
pub fn require_ownership(ctx: &RequestContext, owner_id: UserId) -> Result<(), Denial> {
    let principal = require_authenticated(ctx)?;
    if principal.id == owner_id {
        return Ok(());
    }

    debug!(
        user_id = %abbrev_uuid(&principal.id),
        owner_id = %abbrev_uuid(&owner_id),
        "Denied: not the owner"
    );
    Err(Denial::Forbidden {
        required: Requirement::Ownership,
    })
}
