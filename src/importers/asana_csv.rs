use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::csv_export::{split_list, CsvExport};
use super::{attach_named_label, read_export, with_back_link, Importer};
use crate::error::SourceError;
use crate::model::import_result::{CommentRecord, ImportResult, IssueRecord};
use crate::util::dates::parse_or_epoch;

/// Imports an Asana project CSV export. Completed tasks are left behind.
pub struct AsanaCsvImporter {
    path: PathBuf,
}

impl AsanaCsvImporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn convert(export: &CsvExport) -> ImportResult {
    let mut result = ImportResult::default();

    for row in export.rows() {
        let Some(task_id) = row.get("Task ID") else {
            continue;
        };
        if row.get("Completed At").is_some() {
            debug!(task_id, "skipping completed Asana task");
            continue;
        }

        let url = format!("https://app.asana.com/0/0/{task_id}");
        let created_at = parse_or_epoch(row.get_or_default("Created At"), task_id);
        let mut issue = IssueRecord {
            title: row.get_or_default("Name").to_string(),
            description: with_back_link(row.get_or_default("Notes"), "task in Asana", Some(&url)),
            url: Some(url),
            created_at,
            labels: Vec::new(),
            comments: vec![CommentRecord::provenance(task_id, created_at)],
        };
        for tag in split_list(row.get_or_default("Tags"), ',') {
            attach_named_label(&mut result, &mut issue, tag);
        }
        result.issues.push(issue);
    }

    result
}

#[async_trait]
impl Importer for AsanaCsvImporter {
    fn name(&self) -> &str {
        "Asana (CSV)"
    }

    fn default_team_name(&self) -> &str {
        "Asana"
    }

    async fn import(&self) -> Result<ImportResult, SourceError> {
        let contents = read_export(&self.path)?;
        Ok(convert(&CsvExport::parse(&contents)?))
    }
}
