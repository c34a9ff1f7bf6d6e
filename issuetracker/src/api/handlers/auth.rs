use axum::{Json, extract::State};
use std::collections::BTreeSet;
use tracing::info;

use crate::{
    AppState,
    api::models::auth::{AuthResponse, LoginRequest, RegisterRequest},
    auth::principal::Principal,
    db::models::users::{UserCreateDBRequest, UserDBResponse},
    errors::Error,
    types::abbrev_uuid,
};

fn require_non_blank(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be blank"),
        });
    }
    Ok(())
}

/// Sign a token for a freshly authenticated user.
fn auth_response(state: &AppState, user: UserDBResponse) -> Result<AuthResponse, Error> {
    let username = user.username.clone();
    let email = user.email.clone();
    let token = state.token_codec.issue(&Principal::from(user), state.clock.now())?;

    Ok(AuthResponse { token, username, email })
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "Username or email already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<Json<AuthResponse>, Error> {
    // Check if registration is allowed
    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    require_non_blank("Username", &request.username)?;
    require_non_blank("Email", &request.email)?;
    require_non_blank("Password", &request.password)?;

    // Validate password length
    let password_config = &state.config.auth.password;
    let password_len = request.password.chars().count();
    if password_len < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if password_len > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }

    // Cheap duplicate checks before paying for a hash. The store still enforces uniqueness.
    let users = &state.stores.users;
    if users.get_by_username(&request.username).await?.is_some() {
        return Err(Error::DuplicateUser {
            message: "This username is already taken".to_string(),
        });
    }
    if users.get_by_email(&request.email).await?.is_some() {
        return Err(Error::DuplicateUser {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let password_hash = state.credentials.hash(request.password).await?;
    let create_request = UserCreateDBRequest {
        username: request.username,
        email: request.email,
        full_name: request.full_name.filter(|name| !name.trim().is_empty()),
        roles: state.config.auth.default_roles.iter().copied().collect::<BTreeSet<_>>(),
        password_hash,
    };

    let created_user = users.create(&create_request).await?;
    info!(user_id = %abbrev_uuid(&created_user.id), "Registered new user");

    Ok(Json(auth_response(&state, created_user)?))
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<AuthResponse>, Error> {
    let user = state.stores.users.get_by_username(&request.username).await?;

    // Unknown users are verified against a dummy hash so both failures take as long
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = state.credentials.verify(request.password, stored_hash).await?;

    match user {
        Some(user) if verified => {
            info!(user_id = %abbrev_uuid(&user.id), "User logged in");
            Ok(Json(auth_response(&state, user)?))
        }
        _ => Err(Error::InvalidCredentials),
    }
}
