//! Test utilities shared by the unit and HTTP tests.

use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use chrono::{DateTime, Duration, Utc};

use crate::{
    AppState,
    api::models::users::Role,
    auth::{
        password::{self, Argon2Params},
        principal::Principal,
    },
    clock::Clock,
    config::{Config, DatabaseConfig},
    db::{
        Stores,
        models::{
            comments::{CommentCreateDBRequest, CommentDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::IssueId,
};

/// Password given to every user made by [`create_test_user`].
pub const TEST_PASSWORD: &str = "password123";

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

fn fast_argon2() -> Argon2Params {
    Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        secret_key: Some("test-secret-key-for-testing-only-0123".to_string()),
        ..Default::default()
    };

    // Fast hashing for tests
    let params = fast_argon2();
    config.auth.password.argon2_memory_kib = params.memory_kib;
    config.auth.password.argon2_iterations = params.iterations;
    config.auth.password.argon2_parallelism = params.parallelism;
    config.auth.password.max_concurrent_hashes = 4;
    config.auth.security.jwt_expiry = std::time::Duration::from_secs(3600);
    config
}

pub fn create_test_state_from_config(config: Config) -> AppState {
    let (state, _) = create_test_state_with_clock_from_config(config);
    state
}

fn create_test_state_with_clock_from_config(config: Config) -> (AppState, Arc<ManualClock>) {
    config.validate().expect("test config should be valid");
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut state = AppState::from_config(config, Stores::in_memory()).expect("Failed to build test state");
    state.clock = clock.clone() as Arc<dyn Clock>;
    (state, clock)
}

/// State over fresh in-memory stores, with a manual clock that starts at the current time.
pub fn create_test_state() -> AppState {
    create_test_state_from_config(create_test_config())
}

/// Like [`create_test_state`], also handing back the clock so the test can move time.
pub fn create_test_state_with_clock() -> (AppState, Arc<ManualClock>) {
    create_test_state_with_clock_from_config(create_test_config())
}

pub fn create_test_server(state: AppState) -> TestServer {
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Store a user with [`TEST_PASSWORD`]. `Role::Admin` users also get `Role::User`.
pub async fn create_test_user(state: &AppState, username: &str, role: Role) -> UserDBResponse {
    let mut roles = std::collections::BTreeSet::from([Role::User]);
    roles.insert(role);

    state
        .stores
        .users
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: None,
            roles,
            password_hash: password::hash_password(TEST_PASSWORD, fast_argon2()).expect("Failed to hash password"),
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_comment(state: &AppState, issue_id: IssueId, author: &UserDBResponse, content: &str) -> CommentDBResponse {
    state
        .stores
        .comments
        .create(&CommentCreateDBRequest {
            issue_id,
            author_id: author.id,
            content: content.to_string(),
        })
        .await
        .expect("Failed to create test comment")
}

/// A token for `user` issued at the state's current time.
pub fn issue_test_token(state: &AppState, user: &UserDBResponse) -> String {
    state
        .token_codec
        .issue(&Principal::from(user.clone()), state.clock.now())
        .expect("Failed to issue token")
}

/// Change one character of the signature segment.
pub fn tamper_signature(token: &str) -> String {
    let (head, last) = token.split_at(token.len() - 1);
    let replacement = if last == "A" { "B" } else { "A" };
    format!("{head}{replacement}")
}
