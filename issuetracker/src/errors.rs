use crate::db::errors::DbError;
use crate::types::Requirement;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided (or the provided token did not resolve)
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Login with an unknown username or a wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Principal lacks the role or ownership required for the operation
    #[error("Forbidden: {required} required to modify {}", .resource.as_deref().unwrap_or("resource"))]
    Forbidden {
        required: Requirement,
        resource: Option<String>,
    },

    /// Registration collided with an existing username or email
    #[error("Duplicate user: {message}")]
    DuplicateUser { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Store operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::DuplicateUser { .. } => StatusCode::CONFLICT,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InvalidCredentials => "Invalid username or password".to_string(),
            Error::Forbidden { required, resource } => match (required, resource) {
                (Requirement::Ownership, Some(resource)) => format!("You can only modify your own {resource}"),
                (Requirement::Ownership, None) => "You can only modify resources you own".to_string(),
                (Requirement::Role(role), Some(resource)) => format!("Role {role} is required to access {resource}"),
                (Requirement::Role(role), None) => format!("Role {role} is required for this action"),
            },
            Error::DuplicateUser { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "An account with this email address already exists".to_string(),
                    (Some("users"), Some(c)) if c.contains("username") => "This username is already taken".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) | Error::DuplicateUser { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InvalidCredentials | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({
            "status": status.as_u16(),
            "message": self.user_message(),
        });

        (status, axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
