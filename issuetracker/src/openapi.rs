//! OpenAPI documentation for the HTTP API, served at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Security scheme for bearer tokens issued by login and registration.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token returned by `/api/auth/login` or `/api/auth/register`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::users::get_current_user,
        api::handlers::users::list_users,
        api::handlers::users::delete_user,
        api::handlers::comments::list_comments,
        api::handlers::comments::create_comment,
        api::handlers::comments::update_comment,
        api::handlers::comments::delete_comment,
    ),
    components(schemas(
        api::models::auth::RegisterRequest,
        api::models::auth::LoginRequest,
        api::models::auth::AuthResponse,
        api::models::users::Role,
        api::models::users::UserResponse,
        api::models::users::CurrentUserResponse,
        api::models::comments::CommentRequest,
        api::models::comments::CommentAuthor,
        api::models::comments::CommentResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Registration and login"),
        (name = "users", description = "User accounts"),
        (name = "comments", description = "Comments on issues"),
    ),
    info(
        title = "Issue Tracker API",
        description = "Issue tracker backend with stateless bearer-token authentication",
    )
)]
pub struct ApiDoc;
