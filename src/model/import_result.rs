use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-system-unique label id.
pub type LabelKey = String;
/// Source-system-unique user id.
pub type UserKey = String;

/// Prefix of the synthetic comment that records where an issue came from.
/// A later run finds these comments in the destination to skip issues it
/// already imported.
pub const PROVENANCE_PREFIX: &str = "Imported from source id:";

/// Everything one importer run extracted, normalized and ready to be created
/// in the destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub issues: Vec<IssueRecord>,
    pub labels: BTreeMap<LabelKey, LabelRecord>,
    pub users: BTreeMap<UserKey, UserRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Label keys, without duplicates, in source order.
    #[serde(default)]
    pub labels: Vec<LabelKey>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Author key in `ImportResult::users`. Absent means the comment is
    /// posted as the importing actor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A broken reference found by [`ImportResult::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    UnknownLabel { issue: usize, label: LabelKey },
    UnknownUser { issue: usize, comment: usize, user: UserKey },
    MissingProvenance { issue: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLabel { issue, label } => {
                write!(f, "issue #{issue} references unknown label {label}")
            }
            Self::UnknownUser {
                issue,
                comment,
                user,
            } => write!(
                f,
                "comment #{comment} of issue #{issue} references unknown user {user}"
            ),
            Self::MissingProvenance { issue } => {
                write!(f, "issue #{issue} has no trailing provenance marker")
            }
        }
    }
}

impl ImportResult {
    /// Record a label, replacing any earlier entry with the same key.
    pub fn upsert_label(&mut self, key: impl Into<LabelKey>, label: LabelRecord) {
        self.labels.insert(key.into(), label);
    }

    /// Record a user, replacing any earlier entry with the same key so the
    /// last occurrence wins.
    pub fn upsert_user(&mut self, key: impl Into<UserKey>, user: UserRecord) {
        self.users.insert(key.into(), user);
    }

    pub fn comment_count(&self) -> usize {
        self.issues.iter().map(|i| i.comments.len()).sum()
    }

    /// Check the referential invariants. Returns every violation, not just
    /// the first.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (idx, issue) in self.issues.iter().enumerate() {
            for label in &issue.labels {
                if !self.labels.contains_key(label) {
                    violations.push(Violation::UnknownLabel {
                        issue: idx,
                        label: label.clone(),
                    });
                }
            }
            for (cidx, comment) in issue.comments.iter().enumerate() {
                if let Some(user) = &comment.user_id {
                    if !self.users.contains_key(user) {
                        violations.push(Violation::UnknownUser {
                            issue: idx,
                            comment: cidx,
                            user: user.clone(),
                        });
                    }
                }
            }
            if issue.provenance_id().is_none() {
                violations.push(Violation::MissingProvenance { issue: idx });
            }
        }
        violations
    }
}

impl IssueRecord {
    /// Source id carried by the trailing provenance marker, if any.
    pub fn provenance_id(&self) -> Option<&str> {
        let last = self.comments.last()?;
        if last.user_id.is_some() {
            return None;
        }
        parse_provenance(&last.body)
    }

    /// Add a label key unless the issue already carries it.
    pub fn push_label(&mut self, key: impl Into<LabelKey>) {
        let key = key.into();
        if !self.labels.contains(&key) {
            self.labels.push(key);
        }
    }
}

impl CommentRecord {
    /// The marker comment appended after all source comments. It never has an
    /// author.
    pub fn provenance(source_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            body: format!("{PROVENANCE_PREFIX} {source_id}"),
            created_at,
            user_id: None,
        }
    }
}

/// Extract the source id from a provenance marker body.
pub fn parse_provenance(body: &str) -> Option<&str> {
    let id = body.trim().strip_prefix(PROVENANCE_PREFIX)?.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        None
    } else {
        Some(id)
    }
}

/// Timestamp for a provenance marker: never earlier than the issue or any of
/// its comments, so the marker sorts last on the destination.
pub fn marker_timestamp(issue_created: DateTime<Utc>, comments: &[CommentRecord]) -> DateTime<Utc> {
    comments
        .iter()
        .map(|c| c.created_at)
        .fold(issue_created, |latest, t| latest.max(t))
}
