use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::query::{GraphQlResponse, RepositoryData, ISSUES_QUERY};
use super::PageSource;
use crate::error::{parse_retry_after, SourceError};
use crate::retry::RetryPolicy;

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    owner: String,
    repo: String,
    page_size: u32,
    retry: RetryPolicy,
}

impl GithubClient {
    pub fn new(
        api_url: String,
        api_key: String,
        owner: String,
        repo: String,
        page_size: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            owner,
            repo,
            page_size,
            retry,
        }
    }

    async fn send(&self, cursor: Option<&str>) -> Result<RepositoryData, SourceError> {
        let body = serde_json::json!({
            "query": ISSUES_QUERY,
            "variables": {
                "owner": self.owner,
                "repo": self.repo,
                "num": self.page_size,
                "cursor": cursor,
            }
        });

        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("User-Agent", "tracker-import")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if is_rate_limited(status, resp.headers()) {
            return Err(SourceError::RateLimited {
                retry_after: parse_retry_after(resp.headers()),
            });
        }

        let text = resp.text().await?;
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let gql: GraphQlResponse<RepositoryData> = serde_json::from_str(&text)?;
        let errors = gql.errors.unwrap_or_default();
        if errors
            .iter()
            .any(|e| e.kind.as_deref() == Some("RATE_LIMITED"))
        {
            return Err(SourceError::RateLimited { retry_after: None });
        }

        match gql.data {
            // A null repository comes with a NOT_FOUND error; the pager turns
            // it into the scope hint.
            Some(data) => {
                if !errors.is_empty() {
                    debug!(errors = ?errors, "GitHub returned partial data");
                }
                Ok(data)
            }
            None => Err(SourceError::Graphql(
                errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

/// GitHub signals primary rate limits as 403 with no remaining quota, and
/// secondary limits as 429.
fn is_rate_limited(status: StatusCode, headers: &reqwest::header::HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0")
}

#[async_trait]
impl PageSource for GithubClient {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<RepositoryData, SourceError> {
        debug!(owner = %self.owner, repo = %self.repo, cursor = ?cursor, "fetching GitHub issues page");
        self.retry
            .execute("github issues page", || self.send(cursor))
            .await
    }
}
