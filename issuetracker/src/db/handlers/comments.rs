//! Comment store used by the comment handlers.

use crate::db::{
    errors::{DbError, Result},
    models::comments::{CommentCreateDBRequest, CommentDBResponse},
};
use crate::types::{CommentId, IssueId};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::instrument;

#[async_trait::async_trait]
pub trait CommentStore: Send + Sync {
    /// Create a new comment
    async fn create(&self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: CommentId) -> Result<Option<CommentDBResponse>>;

    /// List the comments of an issue, newest first
    async fn list_by_issue(&self, issue_id: IssueId) -> Result<Vec<CommentDBResponse>>;

    /// Replace the content of a comment
    async fn update_content(&self, id: CommentId, content: &str) -> Result<CommentDBResponse>;

    /// Delete a comment by ID
    async fn delete(&self, id: CommentId) -> Result<bool>;
}

#[derive(Debug)]
pub struct InMemoryComments {
    comments: DashMap<CommentId, CommentDBResponse>,
    next_id: AtomicI64,
}

impl InMemoryComments {
    pub fn new() -> Self {
        Self {
            comments: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryComments {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommentStore for InMemoryComments {
    #[instrument(skip(self, request), fields(issue_id = request.issue_id), err)]
    async fn create(&self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let comment = CommentDBResponse {
            id,
            issue_id: request.issue_id,
            author_id: request.author_id,
            content: request.content.clone(),
            created_at: now,
            updated_at: now,
        };
        self.comments.insert(id, comment.clone());
        Ok(comment)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: CommentId) -> Result<Option<CommentDBResponse>> {
        Ok(self.comments.get(&id).map(|comment| comment.clone()))
    }

    #[instrument(skip(self), err)]
    async fn list_by_issue(&self, issue_id: IssueId) -> Result<Vec<CommentDBResponse>> {
        let mut comments: Vec<CommentDBResponse> = self
            .comments
            .iter()
            .filter(|entry| entry.issue_id == issue_id)
            .map(|entry| entry.value().clone())
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    #[instrument(skip(self, content), err)]
    async fn update_content(&self, id: CommentId, content: &str) -> Result<CommentDBResponse> {
        let mut comment = self.comments.get_mut(&id).ok_or(DbError::NotFound)?;
        comment.content = content.to_string();
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: CommentId) -> Result<bool> {
        Ok(self.comments.remove(&id).is_some())
    }
}
