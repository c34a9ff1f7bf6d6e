//! Request and response bodies for the HTTP API.

pub mod auth;
pub mod comments;
pub mod users;
