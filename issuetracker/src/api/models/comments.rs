//! API request/response models for issue comments.

use crate::types::{CommentId, IssueId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to add a comment, or replace a comment's content
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub content: String,
}

/// The author of a comment, as shown next to it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentAuthor {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub content: String,
    pub author: CommentAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the caller may edit or delete this comment
    pub editable: bool,
}
