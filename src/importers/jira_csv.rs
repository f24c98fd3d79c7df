use std::path::PathBuf;

use async_trait::async_trait;

use super::csv_export::CsvExport;
use super::{attach_named_label, read_export, with_back_link, Importer};
use crate::error::SourceError;
use crate::model::import_result::{marker_timestamp, CommentRecord, ImportResult, IssueRecord};
use crate::util::dates::{parse_datetime, parse_or_epoch};

/// Imports a Jira "Export Excel CSV (all fields)" file.
pub struct JiraCsvImporter {
    path: PathBuf,
    /// Atlassian site name, used to link back to `https://<org>.atlassian.net`.
    org: Option<String>,
}

impl JiraCsvImporter {
    pub fn new(path: PathBuf, org: Option<String>) -> Self {
        Self { path, org }
    }

    fn issue_url(&self, key: &str) -> Option<String> {
        self.org
            .as_ref()
            .map(|org| format!("https://{org}.atlassian.net/browse/{key}"))
    }

    fn convert(&self, export: &CsvExport) -> ImportResult {
        let mut result = ImportResult::default();

        for row in export.rows() {
            let Some(key) = row.get("Issue key").or_else(|| row.get("Issue id")) else {
                continue;
            };
            let url = self.issue_url(key);
            let created_at = parse_or_epoch(row.get_or_default("Created"), key);

            // Jira writes comments as "date;author account id;body".
            let mut comments: Vec<CommentRecord> = row
                .all("Comment")
                .into_iter()
                .map(|cell| {
                    let mut parts = cell.splitn(3, ';');
                    match (parts.next(), parts.next(), parts.next()) {
                        (Some(date), Some(_author), Some(body)) if parse_datetime(date).is_some() => {
                            CommentRecord {
                                body: body.to_string(),
                                created_at: parse_or_epoch(date, key),
                                user_id: None,
                            }
                        }
                        _ => CommentRecord {
                            body: cell.to_string(),
                            created_at,
                            user_id: None,
                        },
                    }
                })
                .collect();
            let marker_at = marker_timestamp(created_at, &comments);
            comments.push(CommentRecord::provenance(key, marker_at));

            let mut issue = IssueRecord {
                title: row.get_or_default("Summary").to_string(),
                description: with_back_link(
                    row.get_or_default("Description"),
                    "issue in Jira",
                    url.as_deref(),
                ),
                url,
                created_at,
                labels: Vec::new(),
                comments,
            };

            for cell in row.all("Labels") {
                for name in cell.split_whitespace() {
                    attach_named_label(&mut result, &mut issue, name);
                }
            }
            if let Some(kind) = row.get("Issue Type") {
                attach_named_label(&mut result, &mut issue, &format!("Type: {kind}"));
            }

            result.issues.push(issue);
        }

        result
    }
}

#[async_trait]
impl Importer for JiraCsvImporter {
    fn name(&self) -> &str {
        "Jira (CSV)"
    }

    fn default_team_name(&self) -> &str {
        "Jira"
    }

    async fn import(&self) -> Result<ImportResult, SourceError> {
        let contents = read_export(&self.path)?;
        let export = CsvExport::parse(&contents)?;
        Ok(self.convert(&export))
    }
}
