//! PostgreSQL backends for the user and comment stores.
//!
//! Queries are checked at runtime (`sqlx::query_as` with binds) so the crate
//! builds without a live database.

use crate::api::models::users::Role;
use crate::db::{
    errors::{DbError, Result},
    handlers::{comments::CommentStore, users::UserStore},
    models::{
        comments::{CommentCreateDBRequest, CommentDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::{CommentId, IssueId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeSet, HashMap};
use tracing::instrument;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, full_name, roles, password_hash, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, issue_id, author_id, content, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub roles: Vec<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<User> for UserDBResponse {
    type Error = DbError;

    fn try_from(user: User) -> Result<Self> {
        let roles = user
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map_err(|e| DbError::Other(anyhow::anyhow!("user {}: {e}", abbrev_uuid(&user.id))))?;

        Ok(Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            roles,
            password_hash: user.password_hash,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }
}

fn role_names(roles: &BTreeSet<Role>) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

#[derive(Debug, Clone, FromRow)]
struct Comment {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentDBResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            issue_id: c.issue_id,
            author_id: c.author_id,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

pub struct PgUsers {
    db: PgPool,
}

impl PgUsers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUsers {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, full_name, roles, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.full_name)
        .bind(role_names(&request.roles))
        .bind(&request.password_hash)
        .fetch_one(&self.db)
        .await?;

        user.try_into()
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.db)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<UserId>) -> Result<HashMap<UserId, UserDBResponse>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;

        users
            .into_iter()
            .map(|u| UserDBResponse::try_from(u).map(|u| (u.id, u)))
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<UserDBResponse>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    #[instrument(skip(self, password_hash, roles), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn set_credentials(&self, id: UserId, password_hash: &str, roles: &BTreeSet<Role>) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, roles = $3, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(password_hash)
        .bind(role_names(roles))
        .fetch_one(&self.db)
        .await?;

        user.try_into()
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct PgComments {
    db: PgPool,
}

impl PgComments {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl CommentStore for PgComments {
    #[instrument(skip(self, request), fields(issue_id = request.issue_id), err)]
    async fn create(&self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (issue_id, author_id, content) VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(request.issue_id)
        .bind(request.author_id)
        .bind(&request.content)
        .fetch_one(&self.db)
        .await?;

        Ok(comment.into())
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: CommentId) -> Result<Option<CommentDBResponse>> {
        let comment = sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(comment.map(Into::into))
    }

    #[instrument(skip(self), err)]
    async fn list_by_issue(&self, issue_id: IssueId) -> Result<Vec<CommentDBResponse>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE issue_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(issue_id)
        .fetch_all(&self.db)
        .await?;

        Ok(comments.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, content), err)]
    async fn update_content(&self, id: CommentId, content: &str) -> Result<CommentDBResponse> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(content)
        .fetch_one(&self.db)
        .await?;

        Ok(comment.into())
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: CommentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}
