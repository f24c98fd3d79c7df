use std::time::Duration;

use thiserror::Error;

/// Problems with credentials or the config file. Always fatal, and always
/// raised before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} not found. Set it in the environment, a .env file, or {file}")]
    MissingCredential { var: &'static str, file: String },

    #[error("Failed to read config from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Errors raised while extracting from a source tracker.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(
        "Unable to find repo {owner}/{repo}. Did you select `repo` scope for your GitHub token?"
    )]
    RepositoryNotFound { owner: String, repo: String },

    #[error("Giving up after {attempts} failed attempts to fetch a page: {last_error}")]
    PageRetriesExhausted { attempts: u32, last_error: String },

    #[error("Source API rate limit hit")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Source API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("GraphQL errors: {0}")]
    Graphql(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CSV export: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by a destination create or lookup call.
#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("Destination API rate limit hit")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Destination API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("GraphQL errors: {0}")]
    Graphql(String),

    #[error("{0} was not accepted by the destination")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single issue could not be imported. Reported per issue; never
/// aborts the run.
#[derive(Error, Debug)]
pub enum IssueImportError {
    #[error("label {0} has no destination counterpart")]
    UnresolvedLabel(String),

    #[error("comment author {0} has no destination counterpart")]
    UnresolvedUser(String),

    #[error(transparent)]
    Destination(#[from] DestinationError),
}

/// Failures that stop a whole import run.
#[derive(Error, Debug)]
pub enum ImportRunError {
    #[error("{importer} import failed: {source}")]
    Source {
        importer: String,
        #[source]
        source: SourceError,
    },

    #[error("Could not prepare destination team {team}: {source}")]
    Team {
        team: String,
        #[source]
        source: DestinationError,
    },
}

/// Whether an error is worth retrying after a delay.
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// Server-requested delay, when the response carried one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for SourceError {
    fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl Transient for DestinationError {
    fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
