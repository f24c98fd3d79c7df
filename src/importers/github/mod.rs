mod client;
mod normalize;
mod pager;
mod query;

pub use client::GithubClient;
use normalize::normalize;
pub use pager::{IssuePager, PagerStep};
pub use query::{GhIssue, RepositoryData};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::info;

use super::Importer;
use crate::config::AppConfig;
use crate::error::SourceError;
use crate::model::import_result::ImportResult;
use crate::retry::RetryPolicy;

/// One page of open issues at a cursor.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<RepositoryData, SourceError>;
}

/// Imports the open issues of one GitHub repository.
pub struct GithubImporter {
    owner: String,
    repo: String,
    source: Box<dyn PageSource>,
    max_page_retries: u32,
    page_backoff: RetryPolicy,
}

impl GithubImporter {
    pub fn new(
        owner: String,
        repo: String,
        source: Box<dyn PageSource>,
        max_page_retries: u32,
        page_backoff: RetryPolicy,
    ) -> Self {
        Self {
            owner,
            repo,
            source,
            max_page_retries: max_page_retries.max(1),
            page_backoff,
        }
    }

    /// Build an importer for `slug` ("owner/repo") talking to the GitHub
    /// GraphQL API. Fails without a network call if the token is missing.
    pub fn from_config(config: &AppConfig, slug: &str) -> Result<Self> {
        let api_key = config.github_api_key()?;
        let (owner, repo) = parse_repo_slug(slug)?;
        let retry = config.import.retry_policy();
        let client = GithubClient::new(
            config.github_api_url().to_string(),
            api_key.to_string(),
            owner.clone(),
            repo.clone(),
            config.import.page_size,
            retry.clone(),
        );
        Ok(Self::new(
            owner,
            repo,
            Box::new(client),
            config.import.max_page_retries,
            retry,
        ))
    }

    /// Page through every open issue.
    pub async fn extract(&self) -> Result<Vec<GhIssue>, SourceError> {
        let mut pager = IssuePager::new(&self.owner, &self.repo, self.max_page_retries);
        while !pager.is_done() {
            let outcome = self.source.fetch_page(pager.cursor()).await;
            if let PagerStep::Retry { failures } = pager.record(outcome)? {
                sleep(self.page_backoff.backoff(failures - 1)).await;
            }
        }
        info!(
            owner = %self.owner,
            repo = %self.repo,
            pages = pager.pages(),
            "collected GitHub issues"
        );
        Ok(pager.into_issues())
    }
}

#[async_trait]
impl Importer for GithubImporter {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn default_team_name(&self) -> &str {
        &self.repo
    }

    async fn import(&self) -> Result<ImportResult, SourceError> {
        let issues = self.extract().await?;
        Ok(normalize(&issues))
    }
}

/// Split "owner/repo".
pub fn parse_repo_slug(slug: &str) -> Result<(String, String)> {
    let slug = slug.trim().trim_end_matches('/');
    let slug = slug
        .strip_prefix("https://github.com/")
        .unwrap_or(slug);
    match slug.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("Expected a repository as owner/repo (e.g. \"facebook/react\"), got \"{slug}\""),
    }
}
