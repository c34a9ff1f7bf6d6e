//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/api/auth/*`): Registration and login, returning bearer tokens
//! - **Users** (`/api/users/*`): The current user, user listing and admin deletion
//! - **Comments** (`/api/issues/{issue_id}/comments/*`): Issue comments, editable by their author
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;
