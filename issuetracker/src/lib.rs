//! # issuetracker: Issue Tracker Backend
//!
//! `issuetracker` is the backend of an issue tracker. Its core is a stateless
//! authentication and authorization layer: password verification, signed bearer
//! tokens, a per-request principal, and role and ownership checks. The issue,
//! comment and user surfaces around it are thin consumers of that core.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum). User
//! and comment records live behind async store traits, with an in-memory backend
//! (the default) and a PostgreSQL backend for persistent deployments.
//!
//! ### Request Flow
//!
//! A client registers or logs in at `/api/auth/*` and receives a bearer token.
//! Every request under `/api` then passes through the
//! [`auth::middleware::authenticate`] layer, which validates the token, looks
//! up the user it names and stores the resulting
//! [`auth::current_user::RequestContext`] in the request extensions. The layer
//! never rejects a request on its own. Handlers extract the context and ask
//! [`auth::guard`] whether the caller is authenticated, holds a role, or owns
//! the resource, and only then touch state.
//!
//! No session state is kept anywhere. The only process-wide values are the
//! signing key (inside [`auth::token::TokenCodec`]), the stores, the
//! configuration and the clock, all shared through [`AppState`].
//!
//! ## Modules
//!
//! - [`api`]: HTTP handlers and request/response models
//! - [`auth`]: Credential hashing, tokens, request authentication and guards
//! - [`config`]: YAML + environment configuration
//! - [`db`]: User and comment stores
//! - [`errors`]: The API error type and its HTTP mapping
//! - [`telemetry`]: Tracing and optional OTLP export
//!
//! ## Getting Started
//!
//! ```no_run
//! use issuetracker::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = issuetracker::config::Args { config: "config.yaml".into(), validate: false };
//!     let config = Config::load(&args)?;
//!     issuetracker::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.unwrap() }).await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use crate::{
    api::models::users::Role,
    auth::{
        middleware::authenticate,
        password::CredentialStore,
        principal::PrincipalResolver,
        token::TokenCodec,
    },
    clock::{Clock, SystemClock},
    config::CorsOrigin,
    db::{Stores, models::users::UserCreateDBRequest},
    openapi::ApiDoc,
    types::abbrev_uuid,
};
use axum::http::HeaderValue;
use axum::{
    Router, http,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use bon::Builder;
pub use config::Config;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{CommentId, IssueId, UserId};

/// Application state shared across all request handlers.
///
/// Everything in here is either immutable after startup (config, token codec)
/// or safe for concurrent use (stores, credential store, clock). Nothing
/// request-specific is ever stored here.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .stores(stores.clone())
///     .token_codec(Arc::new(token_codec))
///     .credentials(Arc::new(credentials))
///     .resolver(PrincipalResolver::new(stores.users.clone()))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub token_codec: Arc<TokenCodec>,
    pub credentials: Arc<CredentialStore>,
    pub resolver: PrincipalResolver,
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the shared state for `config` over the given stores.
    pub fn from_config(config: Config, stores: Stores) -> Result<Self, errors::Error> {
        let token_codec = TokenCodec::from_config(&config)?;
        let credentials = CredentialStore::from_config(&config.auth.password)?;

        Ok(AppState::builder()
            .resolver(PrincipalResolver::new(stores.users.clone()))
            .stores(stores)
            .token_codec(Arc::new(token_codec))
            .credentials(Arc::new(credentials))
            .config(config)
            .build())
    }
}

/// Create the initial admin user, or reset its password and roles if it exists.
///
/// Does nothing when no `admin_password` is configured. The admin always ends
/// up with both the `ADMIN` and `USER` roles.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(state: &AppState) -> anyhow::Result<Option<UserId>> {
    let config = &state.config;
    let Some(password) = config.admin_password.clone() else {
        debug!("No admin_password configured; skipping admin user");
        return Ok(None);
    };

    let password_hash = state.credentials.hash(password).await?;
    let roles = BTreeSet::from([Role::Admin, Role::User]);
    let users = &state.stores.users;

    // Check if user already exists
    if let Some(existing) = users.get_by_username(&config.admin_username).await? {
        let updated = users.set_credentials(existing.id, &password_hash, &roles).await?;
        info!(user_id = %abbrev_uuid(&updated.id), "Updated initial admin user");
        return Ok(Some(updated.id));
    }

    let created = users
        .create(&UserCreateDBRequest {
            username: config.admin_username.clone(),
            email: config.admin_email.clone(),
            full_name: None,
            roles,
            password_hash,
        })
        .await?;
    info!(user_id = %abbrev_uuid(&created.id), "Created initial admin user");
    Ok(Some(created.id))
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.security.cors.allowed_origins;
    let allow_origin = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send the origin without a trailing slash
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Everything under `/api` runs behind the authenticate layer. `/healthz` does not.
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/users/me", get(api::handlers::users::get_current_user))
        .route("/users", get(api::handlers::users::list_users))
        .route("/users/{user_id}", delete(api::handlers::users::delete_user))
        .route(
            "/issues/{issue_id}/comments",
            get(api::handlers::comments::list_comments).post(api::handlers::comments::create_comment),
        )
        .route(
            "/issues/{issue_id}/comments/{comment_id}",
            put(api::handlers::comments::update_comment).delete(api::handlers::comments::delete_comment),
        )
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The running service: stores, shared state and router.
///
/// 1. **Create**: [`Application::new`] connects the stores, runs migrations for the
///    external backend, seeds the admin user and builds the router
/// 2. **Serve**: [`Application::serve`] binds and serves until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    stores: Stores,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind = %config.bind_address(), "Starting issue tracker");

        let stores = db::connect(&config.database).await?;
        let state = AppState::from_config(config.clone(), stores.clone())?;
        create_initial_admin_user(&state).await?;
        let router = build_router(&state)?;

        Ok(Self { router, config, stores })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Issue tracker listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        if let Some(pool) = self.stores.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
