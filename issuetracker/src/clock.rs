//! Time source for token issuance and validation.
//!
//! Token checks take `now` as an argument rather than reading the wall clock, so
//! the request path asks the shared [`Clock`] once per request and tests can
//! move time forward without sleeping.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
