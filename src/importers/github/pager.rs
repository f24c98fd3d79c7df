use std::collections::HashSet;

use tracing::{debug, warn};

use super::query::{GhIssue, RepositoryData};
use crate::error::SourceError;

/// What the driver should do after a page outcome was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerStep {
    /// Fetch the next page at [`IssuePager::cursor`].
    Continue,
    /// The last fetch failed; fetch the same cursor again after a delay.
    Retry { failures: u32 },
    /// No more pages.
    Done,
}

/// Cursor-based pagination over a repository's issues, independent of any
/// transport. The driver asks for the cursor, fetches, and feeds the outcome
/// back through [`IssuePager::record`].
#[derive(Debug)]
pub struct IssuePager {
    owner: String,
    repo: String,
    cursor: Option<String>,
    has_next: bool,
    issues: Vec<GhIssue>,
    seen: HashSet<String>,
    failures: u32,
    max_failures: u32,
    pages: u32,
}

impl IssuePager {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, max_failures: u32) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            cursor: None,
            has_next: true,
            issues: Vec::new(),
            seen: HashSet::new(),
            failures: 0,
            max_failures,
            pages: 0,
        }
    }

    /// Cursor for the next request; `None` on the first page.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn is_done(&self) -> bool {
        !self.has_next
    }

    /// Number of successfully collected pages.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Feed the outcome of fetching the page at the current cursor.
    ///
    /// A missing repository is fatal straight away. Other errors leave the
    /// cursor where it is until `max_failures` consecutive failures, after
    /// which the run fails.
    pub fn record(
        &mut self,
        outcome: Result<RepositoryData, SourceError>,
    ) -> Result<PagerStep, SourceError> {
        let data = match outcome {
            Ok(data) => data,
            Err(err @ SourceError::RepositoryNotFound { .. }) => return Err(err),
            Err(err) => {
                self.failures += 1;
                warn!(
                    owner = %self.owner,
                    repo = %self.repo,
                    cursor = ?self.cursor,
                    failures = self.failures,
                    error = %err,
                    "failed to fetch issues page"
                );
                if self.failures >= self.max_failures {
                    return Err(SourceError::PageRetriesExhausted {
                        attempts: self.failures,
                        last_error: err.to_string(),
                    });
                }
                return Ok(PagerStep::Retry {
                    failures: self.failures,
                });
            }
        };

        let Some(repository) = data.repository else {
            return Err(SourceError::RepositoryNotFound {
                owner: self.owner.clone(),
                repo: self.repo.clone(),
            });
        };

        self.failures = 0;
        self.pages += 1;
        let connection = repository.issues;
        for edge in connection.edges {
            if self.seen.insert(edge.node.id.clone()) {
                self.issues.push(edge.node);
            } else {
                debug!(id = %edge.node.id, "issue already collected from an earlier page");
            }
        }

        self.has_next = connection.page_info.has_next_page;
        if let Some(end) = connection.page_info.end_cursor {
            self.cursor = Some(end);
        } else if self.has_next {
            // A next page without a cursor would refetch the same page forever.
            warn!(owner = %self.owner, repo = %self.repo, "hasNextPage without endCursor, stopping");
            self.has_next = false;
        }

        Ok(if self.has_next {
            PagerStep::Continue
        } else {
            PagerStep::Done
        })
    }

    pub fn into_issues(self) -> Vec<GhIssue> {
        self.issues
    }
}
