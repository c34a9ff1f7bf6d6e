use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::models::users::{CurrentUserResponse, Role, UserResponse},
    auth::{
        current_user::{CurrentPrincipal, RequestContext},
        guard,
    },
    errors::{Error, Result},
    types::{UserId, abbrev_uuid},
};

/// Get the currently authenticated user
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "The authenticated user", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(CurrentPrincipal(principal): CurrentPrincipal) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse::from(&principal))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    summary = "List users",
    responses(
        (status = 200, description = "All users ordered by username", body = [UserResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, _: CurrentPrincipal) -> Result<Json<Vec<UserResponse>>> {
    let users = state.stores.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    tag = "users",
    summary = "Delete user",
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
    ),
    params(
        ("user_id" = uuid::Uuid, Path, description = "User ID")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(State(state): State<AppState>, ctx: RequestContext, Path(user_id): Path<UserId>) -> Result<StatusCode> {
    guard::require_role(&ctx, Role::Admin).map_err(|d| d.on("users"))?;

    if state.stores.users.delete(user_id).await? {
        info!(user_id = %abbrev_uuid(&user_id), "Deleted user");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use uuid::Uuid;

    #[test_log::test(tokio::test)]
    async fn test_me_requires_token() {
        let state = create_test_state();
        let server = create_test_server(state.clone());
        let alice = create_test_user(&state, "alice", Role::User).await;
        let token = issue_test_token(&state, &alice);

        let response = server.get("/api/users/me").authorization_bearer(&token).await;
        response.assert_status_ok();
        let me: CurrentUserResponse = response.json();
        assert_eq!(me.id, alice.id);
        assert_eq!(me.username, "alice");
        assert_eq!(me.roles, vec![Role::User]);

        server.get("/api/users/me").await.assert_status_unauthorized();
        server
            .get("/api/users/me")
            .authorization_bearer("garbage")
            .await
            .assert_status_unauthorized();
    }

    #[test_log::test(tokio::test)]
    async fn test_list_users() {
        let state = create_test_state();
        let server = create_test_server(state.clone());
        let bob = create_test_user(&state, "bob", Role::User).await;
        create_test_user(&state, "alice", Role::User).await;

        server.get("/api/users").await.assert_status_unauthorized();

        let response = server.get("/api/users").authorization_bearer(issue_test_token(&state, &bob)).await;
        response.assert_status_ok();
        let users: Vec<UserResponse> = response.json();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        // The credential never leaves the store
        assert!(!response.text().contains("argon2"));
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_user_requires_admin() {
        let state = create_test_state();
        let server = create_test_server(state.clone());
        let admin = create_test_user(&state, "root", Role::Admin).await;
        let alice = create_test_user(&state, "alice", Role::User).await;
        let bob = create_test_user(&state, "bob", Role::User).await;

        server
            .delete(&format!("/api/users/{}", bob.id))
            .await
            .assert_status_unauthorized();

        server
            .delete(&format!("/api/users/{}", bob.id))
            .authorization_bearer(issue_test_token(&state, &alice))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let admin_token = issue_test_token(&state, &admin);
        server
            .delete(&format!("/api/users/{}", bob.id))
            .authorization_bearer(&admin_token)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .delete(&format!("/api/users/{}", Uuid::new_v4()))
            .authorization_bearer(&admin_token)
            .await
            .assert_status_not_found();
    }

    #[test_log::test(tokio::test)]
    async fn test_deleted_user_token_stops_working() {
        let state = create_test_state();
        let server = create_test_server(state.clone());
        let admin = create_test_user(&state, "root", Role::Admin).await;
        let bob = create_test_user(&state, "bob", Role::User).await;
        let bob_token = issue_test_token(&state, &bob);

        server.get("/api/users/me").authorization_bearer(&bob_token).await.assert_status_ok();

        server
            .delete(&format!("/api/users/{}", bob.id))
            .authorization_bearer(issue_test_token(&state, &admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get("/api/users/me")
            .authorization_bearer(&bob_token)
            .await
            .assert_status_unauthorized();
    }
}
