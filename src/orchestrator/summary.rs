use std::fmt;

use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub created: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.created + self.failed + self.skipped
    }
}

impl fmt::Display for EntityCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} failed, {} skipped",
            self.created, self.failed, self.skipped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueStatus {
    Created {
        id: String,
        failed_comments: usize,
        /// No provenance marker was written, so a later run will not
        /// recognise this issue as already imported.
        marker_missing: bool,
    },
    /// A provenance marker for this source id already exists in the team.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueOutcome {
    pub title: String,
    pub source_id: Option<String>,
    #[serde(flatten)]
    pub status: IssueStatus,
}

/// What a run did, entity by entity.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub team_id: String,
    pub labels: EntityCounts,
    pub users: EntityCounts,
    pub issues: EntityCounts,
    pub comments: EntityCounts,
    pub outcomes: Vec<IssueOutcome>,
}

impl ImportSummary {
    pub fn failed_issues(&self) -> impl Iterator<Item = &IssueOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, IssueStatus::Failed { .. }))
    }

    /// Created issues a re-run would import a second time.
    pub fn unmarked_issues(&self) -> impl Iterator<Item = &IssueOutcome> {
        self.outcomes.iter().filter(|o| {
            matches!(
                o.status,
                IssueStatus::Created {
                    marker_missing: true,
                    ..
                }
            )
        })
    }

    pub fn has_failures(&self) -> bool {
        self.labels.failed + self.users.failed + self.issues.failed + self.comments.failed > 0
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Labels:   {}", self.labels)?;
        writeln!(f, "Users:    {}", self.users)?;
        writeln!(f, "Issues:   {}", self.issues)?;
        writeln!(f, "Comments: {}", self.comments)?;
        for outcome in self.failed_issues() {
            if let IssueStatus::Failed { reason } = &outcome.status {
                writeln!(f, "  failed: {} ({reason})", outcome.title)?;
            }
        }
        for outcome in self.unmarked_issues() {
            if let IssueStatus::Created { id, .. } = &outcome.status {
                writeln!(
                    f,
                    "  no import marker: {} ({id}), a re-run would duplicate it",
                    outcome.title
                )?;
            }
        }
        Ok(())
    }
}
