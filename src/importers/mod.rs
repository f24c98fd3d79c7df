pub mod asana_csv;
mod csv_export;
pub mod github;
pub mod jira_csv;
pub mod pivotal_csv;
pub mod trello_json;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::SourceError;
use crate::model::import_result::{ImportResult, IssueRecord, LabelRecord};

/// A source tracker that can be drained into an [`ImportResult`].
///
/// Implementations own authentication, request construction and paging for
/// their source. They never touch the destination.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Display label of the source, e.g. "GitHub".
    fn name(&self) -> &str;
    /// Suggested destination team for the imported issues.
    fn default_team_name(&self) -> &str;
    async fn import(&self) -> Result<ImportResult, SourceError>;
}

#[cfg(test)]
pub mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterKind {
    Github,
    JiraCsv,
    AsanaCsv,
    PivotalCsv,
    TrelloJson,
}

impl ImporterKind {
    pub const ALL: [ImporterKind; 5] = [
        ImporterKind::Github,
        ImporterKind::JiraCsv,
        ImporterKind::AsanaCsv,
        ImporterKind::PivotalCsv,
        ImporterKind::TrelloJson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImporterKind::Github => "github",
            ImporterKind::JiraCsv => "jira-csv",
            ImporterKind::AsanaCsv => "asana-csv",
            ImporterKind::PivotalCsv => "pivotal-csv",
            ImporterKind::TrelloJson => "trello-json",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ImporterKind::Github => "GitHub",
            ImporterKind::JiraCsv => "Jira (CSV export)",
            ImporterKind::AsanaCsv => "Asana (CSV export)",
            ImporterKind::PivotalCsv => "Pivotal (CSV export)",
            ImporterKind::TrelloJson => "Trello (JSON export)",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

/// Source-specific parameters collected by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImporterArgs {
    Github { repo: String },
    JiraCsv { path: PathBuf, org: Option<String> },
    AsanaCsv { path: PathBuf },
    PivotalCsv { path: PathBuf },
    TrelloJson { path: PathBuf, include_archived: bool },
}

impl ImporterArgs {
    pub fn kind(&self) -> ImporterKind {
        match self {
            ImporterArgs::Github { .. } => ImporterKind::Github,
            ImporterArgs::JiraCsv { .. } => ImporterKind::JiraCsv,
            ImporterArgs::AsanaCsv { .. } => ImporterKind::AsanaCsv,
            ImporterArgs::PivotalCsv { .. } => ImporterKind::PivotalCsv,
            ImporterArgs::TrelloJson { .. } => ImporterKind::TrelloJson,
        }
    }
}

/// Build the importer for `args`. Source credentials are checked here, so a
/// missing token fails before any request is sent.
pub fn create_importer(config: &AppConfig, args: &ImporterArgs) -> Result<Box<dyn Importer>> {
    let importer: Box<dyn Importer> = match args {
        ImporterArgs::Github { repo } => {
            Box::new(github::GithubImporter::from_config(config, repo)?)
        }
        ImporterArgs::JiraCsv { path, org } => {
            Box::new(jira_csv::JiraCsvImporter::new(path.clone(), org.clone()))
        }
        ImporterArgs::AsanaCsv { path } => Box::new(asana_csv::AsanaCsvImporter::new(path.clone())),
        ImporterArgs::PivotalCsv { path } => {
            Box::new(pivotal_csv::PivotalCsvImporter::new(path.clone()))
        }
        ImporterArgs::TrelloJson {
            path,
            include_archived,
        } => Box::new(trello_json::TrelloJsonImporter::new(
            path.clone(),
            *include_archived,
        )),
    };
    Ok(importer)
}

/// Read an export file, mapping I/O failures to [`SourceError::Io`].
pub(crate) fn read_export(path: &std::path::Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Color for labels whose source has no color of its own.
pub(crate) const DEFAULT_LABEL_COLOR: &str = "#BEC2C8";

/// Register a label keyed by its name and attach it to `issue`.
pub(crate) fn attach_named_label(result: &mut ImportResult, issue: &mut IssueRecord, name: &str) {
    result
        .labels
        .entry(name.to_string())
        .or_insert_with(|| LabelRecord {
            name: name.to_string(),
            color: DEFAULT_LABEL_COLOR.to_string(),
            description: None,
        });
    issue.push_label(name);
}

/// Append a "View original" link to an imported description.
pub(crate) fn with_back_link(body: &str, what: &str, url: Option<&str>) -> String {
    match url {
        Some(url) if body.trim().is_empty() => format!("[View original {what}]({url})"),
        Some(url) => format!("{body}\n\n[View original {what}]({url})"),
        None => body.to_string(),
    }
}
