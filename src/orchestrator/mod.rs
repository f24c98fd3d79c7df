mod summary;

pub use summary::{EntityCounts, ImportSummary, IssueOutcome, IssueStatus};

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::UnmatchedUsers;
use crate::destination::{CommentPayload, Destination, IssuePayload};
use crate::error::{DestinationError, ImportRunError, IssueImportError};
use crate::importers::Importer;
use crate::model::import_result::{ImportResult, IssueRecord, LabelKey, UserKey, UserRecord};

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Overrides the importer's default team name.
    pub team_name: Option<String>,
    pub unmatched_users: UnmatchedUsers,
    /// Upper bound on concurrent label/user calls.
    pub concurrency: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            team_name: None,
            unmatched_users: UnmatchedUsers::Placeholder,
            concurrency: 4,
        }
    }
}

/// An issue that now exists in the destination.
#[derive(Debug)]
struct CreatedIssue {
    id: String,
    failed_comments: usize,
    /// The trailing provenance marker could not be posted.
    marker_missing: bool,
}

/// Where comments by a source user end up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UserTarget {
    Destination(String),
    Importer,
}

/// Creates an [`ImportResult`] in a [`Destination`] in dependency order:
/// team, then labels and users, then issues, each followed by its comments.
pub struct ImportOrchestrator<'a> {
    destination: &'a dyn Destination,
    options: OrchestratorOptions,
}

impl<'a> ImportOrchestrator<'a> {
    pub fn new(destination: &'a dyn Destination, options: OrchestratorOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    /// Run the importer, then write its result. Nothing is written when the
    /// importer fails.
    pub async fn run(&self, importer: &dyn Importer) -> Result<ImportSummary, ImportRunError> {
        info!(importer = importer.name(), "extracting issues");
        let result = importer
            .import()
            .await
            .map_err(|source| ImportRunError::Source {
                importer: importer.name().to_string(),
                source,
            })?;
        info!(
            issues = result.issues.len(),
            labels = result.labels.len(),
            users = result.users.len(),
            "extraction finished"
        );

        let team_name = self
            .options
            .team_name
            .as_deref()
            .unwrap_or_else(|| importer.default_team_name());
        self.materialize(team_name, &result).await
    }

    /// Write an already extracted result into the team named `team_name`.
    pub async fn materialize(
        &self,
        team_name: &str,
        result: &ImportResult,
    ) -> Result<ImportSummary, ImportRunError> {
        let team_err = |source: DestinationError| ImportRunError::Team {
            team: team_name.to_string(),
            source,
        };
        let team_id = self
            .destination
            .resolve_team(team_name)
            .await
            .map_err(team_err)?;
        let already_imported = self
            .destination
            .imported_source_ids(&team_id)
            .await
            .map_err(team_err)?;

        let mut summary = ImportSummary {
            team_id: team_id.clone(),
            ..Default::default()
        };

        // Labels and users have no ordering between them; both must be done
        // before the first issue.
        let (label_ids, user_targets) = futures::join!(
            self.create_labels(&team_id, result, &mut summary.labels),
            self.resolve_users(result),
        );
        let user_targets = {
            let mut targets = HashMap::new();
            for (key, outcome) in user_targets {
                match outcome {
                    Ok(UserTarget::Importer) => {
                        summary.users.skipped += 1;
                        targets.insert(key, UserTarget::Importer);
                    }
                    Ok(target) => {
                        summary.users.created += 1;
                        targets.insert(key, target);
                    }
                    Err(err) => {
                        summary.users.failed += 1;
                        warn!(user = %key, error = %err, "failed to resolve user");
                    }
                }
            }
            targets
        };

        for issue in &result.issues {
            let source_id = issue.provenance_id().map(str::to_string);
            if source_id
                .as_ref()
                .is_some_and(|id| already_imported.contains(id))
            {
                summary.issues.skipped += 1;
                summary.comments.skipped += issue.comments.len();
                summary.outcomes.push(IssueOutcome {
                    title: issue.title.clone(),
                    source_id,
                    status: IssueStatus::Skipped,
                });
                continue;
            }

            let status = match self
                .create_issue(&team_id, issue, &label_ids, &user_targets, &mut summary.comments)
                .await
            {
                Ok(created) => {
                    summary.issues.created += 1;
                    if created.marker_missing {
                        warn!(
                            title = %issue.title,
                            id = %created.id,
                            "provenance marker not written, a re-run will import this issue again"
                        );
                    }
                    IssueStatus::Created {
                        id: created.id,
                        failed_comments: created.failed_comments,
                        marker_missing: created.marker_missing,
                    }
                }
                Err(err) => {
                    summary.issues.failed += 1;
                    warn!(title = %issue.title, error = %err, "failed to import issue");
                    IssueStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            summary.outcomes.push(IssueOutcome {
                title: issue.title.clone(),
                source_id,
                status,
            });
        }

        info!(
            created = summary.issues.created,
            failed = summary.issues.failed,
            skipped = summary.issues.skipped,
            "import finished"
        );
        Ok(summary)
    }

    async fn create_labels(
        &self,
        team_id: &str,
        result: &ImportResult,
        counts: &mut EntityCounts,
    ) -> HashMap<LabelKey, String> {
        let outcomes: Vec<_> = stream::iter(&result.labels)
            .map(|(key, label)| async move {
                (key, self.destination.create_label(team_id, label).await)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut ids = HashMap::new();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(id) => {
                    counts.created += 1;
                    ids.insert(key.clone(), id);
                }
                Err(err) => {
                    counts.failed += 1;
                    warn!(label = %key, error = %err, "failed to create label");
                }
            }
        }
        ids
    }

    async fn resolve_users(
        &self,
        result: &ImportResult,
    ) -> Vec<(UserKey, Result<UserTarget, DestinationError>)> {
        stream::iter(&result.users)
            .map(|(key, user)| async move { (key.clone(), self.resolve_user(user).await) })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    async fn resolve_user(&self, user: &UserRecord) -> Result<UserTarget, DestinationError> {
        if let Some(email) = &user.email {
            if let Some(id) = self.destination.find_user_by_email(email).await? {
                return Ok(UserTarget::Destination(id));
            }
        }
        match self.options.unmatched_users {
            UnmatchedUsers::Placeholder => Ok(UserTarget::Destination(
                self.destination.create_placeholder_user(user).await?,
            )),
            UnmatchedUsers::Importer => Ok(UserTarget::Importer),
        }
    }

    /// Create one issue and its comments. Every reference is checked first,
    /// so an unresolvable issue leaves nothing behind in the destination.
    async fn create_issue(
        &self,
        team_id: &str,
        issue: &IssueRecord,
        label_ids: &HashMap<LabelKey, String>,
        user_targets: &HashMap<UserKey, UserTarget>,
        comment_counts: &mut EntityCounts,
    ) -> Result<CreatedIssue, IssueImportError> {
        let translated_labels = issue
            .labels
            .iter()
            .map(|key| {
                label_ids
                    .get(key)
                    .cloned()
                    .ok_or_else(|| IssueImportError::UnresolvedLabel(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let comment_users = issue
            .comments
            .iter()
            .map(|comment| match &comment.user_id {
                None => Ok(None),
                Some(key) => match user_targets.get(key) {
                    Some(UserTarget::Destination(id)) => Ok(Some(id.clone())),
                    Some(UserTarget::Importer) => Ok(None),
                    None => Err(IssueImportError::UnresolvedUser(key.clone())),
                },
            })
            .collect::<Result<Vec<_>, _>>()?;

        let issue_id = self
            .destination
            .create_issue(&IssuePayload {
                team_id: team_id.to_string(),
                title: issue.title.clone(),
                description: issue.description.clone(),
                created_at: issue.created_at,
                label_ids: translated_labels,
            })
            .await?;

        // Sequential, so the provenance marker is always created last.
        let marker_index = issue
            .provenance_id()
            .map(|_| issue.comments.len() - 1);
        let mut failed = 0;
        let mut marker_missing = false;
        for (idx, (comment, user_id)) in issue.comments.iter().zip(comment_users).enumerate() {
            let payload = CommentPayload {
                issue_id: issue_id.clone(),
                body: comment.body.clone(),
                user_id,
                created_at: comment.created_at,
            };
            match self.destination.create_comment(&payload).await {
                Ok(_) => comment_counts.created += 1,
                Err(err) => {
                    failed += 1;
                    comment_counts.failed += 1;
                    marker_missing |= marker_index == Some(idx);
                    warn!(issue_id = %issue_id, error = %err, "failed to create comment");
                }
            }
        }

        Ok(CreatedIssue {
            id: issue_id,
            failed_comments: failed,
            marker_missing,
        })
    }
}
