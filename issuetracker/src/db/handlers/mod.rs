//! Store traits and their backends.
//!
//! - [`users::UserStore`]: user records, read by the auth core on every authenticated request
//! - [`comments::CommentStore`]: issue comments, consumed by the comment handlers
//!
//! Each trait has an in-memory backend (the default, and what the tests use) and a PostgreSQL
//! backend in [`postgres`].

pub mod comments;
pub mod postgres;
pub mod users;

pub use comments::{CommentStore, InMemoryComments};
pub use postgres::{PgComments, PgUsers};
pub use users::{InMemoryUsers, UserStore};
