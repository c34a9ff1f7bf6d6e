//! Issue comments.
//!
//! Anyone may read comments; posting needs a principal; editing and deleting
//! are reserved for the comment's author.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::{
    AppState,
    api::models::comments::{CommentAuthor, CommentRequest, CommentResponse},
    auth::{
        current_user::{CurrentPrincipal, RequestContext},
        guard,
    },
    db::models::{
        comments::{CommentCreateDBRequest, CommentDBResponse},
        users::UserDBResponse,
    },
    errors::{Error, Result},
    types::{CommentId, IssueId, UserId, abbrev_uuid},
};

const DELETED_AUTHOR: &str = "[deleted]";

fn validate_content(request: &CommentRequest) -> Result<String> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(Error::BadRequest {
            message: "Comment content must not be blank".to_string(),
        });
    }
    Ok(content.to_string())
}

fn to_response(comment: CommentDBResponse, author: Option<&UserDBResponse>, ctx: &RequestContext) -> CommentResponse {
    let author = match author {
        Some(user) => CommentAuthor {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
        },
        None => CommentAuthor {
            id: comment.author_id,
            username: DELETED_AUTHOR.to_string(),
            full_name: None,
        },
    };

    CommentResponse {
        editable: guard::require_ownership(ctx, comment.author_id).is_ok(),
        id: comment.id,
        issue_id: comment.issue_id,
        content: comment.content,
        author,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    }
}

/// Load a comment and check it belongs to the issue in the path.
async fn load_comment(state: &AppState, issue_id: IssueId, comment_id: CommentId) -> Result<CommentDBResponse> {
    match state.stores.comments.get_by_id(comment_id).await? {
        Some(comment) if comment.issue_id == issue_id => Ok(comment),
        _ => Err(Error::NotFound {
            resource: "Comment".to_string(),
            id: comment_id.to_string(),
        }),
    }
}

async fn respond_with_author(state: &AppState, comment: CommentDBResponse, ctx: &RequestContext) -> Result<CommentResponse> {
    let author = state.stores.users.get_by_id(comment.author_id).await?;
    Ok(to_response(comment, author.as_ref(), ctx))
}

#[utoipa::path(
    get,
    path = "/api/issues/{issue_id}/comments",
    tag = "comments",
    summary = "List comments on an issue",
    responses(
        (status = 200, description = "Comments, newest first", body = [CommentResponse]),
    ),
    params(
        ("issue_id" = i64, Path, description = "Issue ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_comments(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(issue_id): Path<IssueId>,
) -> Result<Json<Vec<CommentResponse>>> {
    let comments = state.stores.comments.list_by_issue(issue_id).await?;

    let author_ids: Vec<UserId> = comments.iter().map(|c| c.author_id).collect::<HashSet<_>>().into_iter().collect();
    let authors: HashMap<UserId, UserDBResponse> = state.stores.users.get_bulk(author_ids).await?;

    let responses = comments
        .into_iter()
        .map(|comment| {
            let author = authors.get(&comment.author_id);
            to_response(comment, author, &ctx)
        })
        .collect();

    Ok(Json(responses))
}

#[utoipa::path(
    post,
    path = "/api/issues/{issue_id}/comments",
    tag = "comments",
    summary = "Comment on an issue",
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Blank content"),
        (status = 401, description = "Unauthorized"),
    ),
    params(
        ("issue_id" = i64, Path, description = "Issue ID")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(issue_id): Path<IssueId>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let content = validate_content(&request)?;

    let comment = state
        .stores
        .comments
        .create(&CommentCreateDBRequest {
            issue_id,
            author_id: principal.id,
            content,
        })
        .await?;
    info!(comment_id = comment.id, issue_id, user_id = %abbrev_uuid(&principal.id), "Created comment");

    let ctx = RequestContext::authenticated(principal);
    let response = respond_with_author(&state, comment, &ctx).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    put,
    path = "/api/issues/{issue_id}/comments/{comment_id}",
    tag = "comments",
    summary = "Edit a comment",
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Blank content"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Comment not found"),
    ),
    params(
        ("issue_id" = i64, Path, description = "Issue ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((issue_id, comment_id)): Path<(IssueId, CommentId)>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<CommentResponse>> {
    guard::require_authenticated(&ctx)?;
    let comment = load_comment(&state, issue_id, comment_id).await?;
    guard::require_ownership(&ctx, comment.author_id).map_err(|d| d.on("comments"))?;

    let content = validate_content(&request)?;
    let updated = state.stores.comments.update_content(comment.id, &content).await?;

    Ok(Json(respond_with_author(&state, updated, &ctx).await?))
}

#[utoipa::path(
    delete,
    path = "/api/issues/{issue_id}/comments/{comment_id}",
    tag = "comments",
    summary = "Delete a comment",
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Comment not found"),
    ),
    params(
        ("issue_id" = i64, Path, description = "Issue ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((issue_id, comment_id)): Path<(IssueId, CommentId)>,
) -> Result<StatusCode> {
    guard::require_authenticated(&ctx)?;
    let comment = load_comment(&state, issue_id, comment_id).await?;
    guard::require_ownership(&ctx, comment.author_id).map_err(|d| d.on("comments"))?;

    if state.stores.comments.delete(comment.id).await? {
        info!(comment_id, issue_id, "Deleted comment");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Comment".to_string(),
            id: comment_id.to_string(),
        })
    }
}
