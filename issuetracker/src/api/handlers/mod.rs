//! HTTP request handlers for all API endpoints.
//!
//! Handlers receive the request-scoped identity through the extractors in
//! [`crate::auth::current_user`] and call [`crate::auth::guard`] before
//! mutating anything.
//!
//! # Handler Modules
//!
//! - [`auth`]: Registration and login
//! - [`comments`]: Issue comments with author-only editing
//! - [`users`]: Current user, listing and admin deletion
//!
//! # Error Handling
//!
//! All handlers return `Result<T, Error>` where [`crate::errors::Error`] maps to
//! the HTTP status code and a user-safe JSON body.

pub mod auth;
pub mod comments;
pub mod users;
