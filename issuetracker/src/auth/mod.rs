//! Stateless authentication and authorization.
//!
//! Nothing here keeps per-session state. A client logs in once, receives a
//! signed bearer token, and presents it on every later request:
//!
//! 1. [`password::CredentialStore`] checks the password at login and hashes it
//!    at registration.
//! 2. [`token::TokenCodec`] signs a token carrying the username, roles and
//!    validity window.
//! 3. On each request [`middleware::authenticate`] validates the token, resolves
//!    the subject through [`principal::PrincipalResolver`] and stores a
//!    [`current_user::RequestContext`] in the request extensions.
//! 4. Handlers extract the context and call the [`guard`] functions before
//!    changing anything.
//!
//! Invalid tokens never fail the request in the middleware; the request just
//! carries no principal, and the guard turns that into 401 where it matters.
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for the request-scoped principal
//! - [`guard`]: Authenticated, role and ownership checks
//! - [`middleware`]: Bearer token authentication layer
//! - [`password`]: Password hashing and verification using Argon2
//! - [`principal`]: The principal type and subject lookup
//! - [`token`]: Token issuance and validation
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use issuetracker::auth::{current_user::RequestContext, guard};
//!
//! async fn edit_comment(ctx: RequestContext, /* ... */) -> Result<Json<CommentResponse>, Error> {
//!     let comment = load_comment().await?;
//!     guard::require_ownership(&ctx, comment.author_id).map_err(|d| d.on("comments"))?;
//!     // ...
//! }
//! ```

pub mod current_user;
pub mod guard;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod token;
