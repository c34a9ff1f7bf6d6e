//! Persistence for the records the auth core reads (users) and the collaborator
//! surfaces write (comments).
//!
//! The auth core only ever sees the [`handlers::UserStore`] trait. Which backend sits
//! behind it is decided once at startup by [`connect`] from
//! [`crate::config::DatabaseConfig`].

pub mod errors;
pub mod handlers;
pub mod models;

use crate::config::DatabaseConfig;
use handlers::{CommentStore, InMemoryComments, InMemoryUsers, PgComments, PgUsers, UserStore};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tracing::info;

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// The store handles shared by all requests.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub comments: Arc<dyn CommentStore>,
    /// Present only for the external backend, so it can be closed on shutdown
    pub pool: Option<PgPool>,
}

impl Stores {
    /// Fresh process-local stores.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUsers::new()),
            comments: Arc::new(InMemoryComments::new()),
            pool: None,
        }
    }

    /// Stores backed by an existing pool. Migrations are not run here.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUsers::new(pool.clone())),
            comments: Arc::new(PgComments::new(pool.clone())),
            pool: Some(pool),
        }
    }
}

/// Build the stores described by the configuration, running migrations for the
/// external backend.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Stores> {
    match config {
        DatabaseConfig::Memory => {
            info!("Using in-memory stores; data will not survive a restart");
            Ok(Stores::in_memory())
        }
        DatabaseConfig::External { url, pool } => {
            let db = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .connect(url)
                .await?;

            migrator().run(&db).await?;
            info!("Connected to PostgreSQL and applied migrations");
            Ok(Stores::postgres(db))
        }
    }
}
