//! Store models for issue comments.

use crate::types::{CommentId, IssueId, UserId};
use chrono::{DateTime, Utc};

/// Store request for creating a comment
#[derive(Debug, Clone)]
pub struct CommentCreateDBRequest {
    pub issue_id: IssueId,
    pub author_id: UserId,
    pub content: String,
}

/// Store response for a comment
#[derive(Debug, Clone)]
pub struct CommentDBResponse {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
