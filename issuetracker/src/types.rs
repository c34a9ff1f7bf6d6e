//! Common type definitions shared across the crate.
//!
//! # ID Types
//!
//! - [`UserId`]: User account identifier (UUID)
//! - [`IssueId`]: Issue identifier, owned by the issue collaborator
//! - [`CommentId`]: Comment identifier
//!
//! # Authorization Requirements
//!
//! [`Requirement`] names what a denied request was missing. It is carried by
//! [`crate::errors::Error::Forbidden`] and only ever used for logging and the
//! user-facing message.

use std::fmt;
use uuid::Uuid;

use crate::api::models::users::Role;

pub type UserId = Uuid;
pub type IssueId = i64;
pub type CommentId = i64;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// What an authorization check required of the current principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Principal must hold this role
    Role(Role),
    /// Principal must be the owner of the resource
    Ownership,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Role(role) => write!(f, "role {role}"),
            Requirement::Ownership => write!(f, "ownership"),
        }
    }
}
