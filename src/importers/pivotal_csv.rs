use std::path::PathBuf;

use async_trait::async_trait;

use super::csv_export::{split_list, CsvExport};
use super::{attach_named_label, read_export, with_back_link, Importer};
use crate::error::SourceError;
use crate::model::import_result::{CommentRecord, ImportResult, IssueRecord};
use crate::util::dates::parse_or_epoch;

/// Imports a Pivotal Tracker CSV export. Accepted stories are skipped.
pub struct PivotalCsvImporter {
    path: PathBuf,
}

impl PivotalCsvImporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn convert(export: &CsvExport) -> ImportResult {
    let mut result = ImportResult::default();

    for row in export.rows() {
        let Some(id) = row.get("Id") else { continue };
        if row
            .get("Current State")
            .is_some_and(|s| s.eq_ignore_ascii_case("accepted"))
        {
            continue;
        }

        let url = row.get("URL").map(str::to_string);
        let created_at = parse_or_epoch(row.get_or_default("Created at"), id);
        let mut issue = IssueRecord {
            title: row.get_or_default("Title").to_string(),
            description: with_back_link(
                row.get_or_default("Description"),
                "story in Pivotal",
                url.as_deref(),
            ),
            url,
            created_at,
            labels: Vec::new(),
            comments: vec![CommentRecord::provenance(id, created_at)],
        };
        for label in split_list(row.get_or_default("Labels"), ',') {
            attach_named_label(&mut result, &mut issue, label);
        }
        if let Some(kind) = row.get("Type") {
            attach_named_label(&mut result, &mut issue, &format!("Type: {kind}"));
        }
        result.issues.push(issue);
    }

    result
}

#[async_trait]
impl Importer for PivotalCsvImporter {
    fn name(&self) -> &str {
        "Pivotal (CSV)"
    }

    fn default_team_name(&self) -> &str {
        "Pivotal"
    }

    async fn import(&self) -> Result<ImportResult, SourceError> {
        let contents = read_export(&self.path)?;
        Ok(convert(&CsvExport::parse(&contents)?))
    }
}
