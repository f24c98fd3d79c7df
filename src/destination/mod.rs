pub mod linear;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DestinationError;
use crate::model::import_result::{LabelRecord, UserRecord};

/// Issue fields sent to the destination, with label ids already translated.
/// The source URL travels as the back-link inside `description`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuePayload {
    pub team_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub label_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentPayload {
    pub issue_id: String,
    pub body: String,
    /// Destination user id; `None` posts as the owner of the API key.
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The tracker issues are imported into. Every call creates or looks up one
/// entity and returns its destination id.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Find a team by name, creating it when none matches.
    async fn resolve_team(&self, name: &str) -> Result<String, DestinationError>;
    async fn create_label(
        &self,
        team_id: &str,
        label: &LabelRecord,
    ) -> Result<String, DestinationError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<String>, DestinationError>;
    /// Register an identity for a source user with no destination account.
    async fn create_placeholder_user(&self, user: &UserRecord) -> Result<String, DestinationError>;
    /// Source ids found in provenance markers of issues already in the team.
    async fn imported_source_ids(&self, team_id: &str) -> Result<HashSet<String>, DestinationError>;
    async fn create_issue(&self, issue: &IssuePayload) -> Result<String, DestinationError>;
    async fn create_comment(&self, comment: &CommentPayload) -> Result<String, DestinationError>;
}
