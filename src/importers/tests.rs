use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::*;
use crate::config::{AppConfig, GitHubConfig};
use crate::model::import_result::{CommentRecord, ImportResult, IssueRecord};

/// An importer that returns a fixed result and counts how often it ran.
struct MockImporter {
    importer_name: String,
    calls: AtomicU32,
    should_fail: bool,
}

impl MockImporter {
    fn new(name: &str) -> Self {
        Self {
            importer_name: name.to_string(),
            calls: AtomicU32::new(0),
            should_fail: false,
        }
    }

    fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

#[async_trait]
impl Importer for MockImporter {
    fn name(&self) -> &str {
        &self.importer_name
    }

    fn default_team_name(&self) -> &str {
        "mock"
    }

    async fn import(&self) -> Result<ImportResult, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(SourceError::Graphql("mock failure".into()));
        }
        let created_at = Utc.timestamp_opt(0, 0).unwrap();
        let mut result = ImportResult::default();
        result.issues.push(IssueRecord {
            title: format!("{} issue", self.importer_name),
            description: String::new(),
            url: None,
            created_at,
            labels: vec![],
            comments: vec![CommentRecord::provenance("M1", created_at)],
        });
        Ok(result)
    }
}

#[test]
fn importer_kind_parses_its_own_names() {
    for kind in ImporterKind::ALL {
        assert_eq!(ImporterKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(ImporterKind::parse("gitlab"), None);
    assert_eq!(ImporterKind::parse("GitHub"), None);
}

#[test]
fn importer_args_report_their_kind() {
    let args = ImporterArgs::TrelloJson {
        path: PathBuf::from("board.json"),
        include_archived: false,
    };
    assert_eq!(args.kind(), ImporterKind::TrelloJson);
    assert_eq!(args.kind().description(), "Trello (JSON export)");
}

#[test]
fn github_importer_requires_a_token() {
    let config = AppConfig::default();
    let args = ImporterArgs::Github {
        repo: "facebook/react".into(),
    };
    let err = create_importer(&config, &args).err().unwrap();
    assert!(err.to_string().contains("GITHUB_API_KEY"));
}

#[test]
fn github_importer_rejects_blank_token() {
    let config = AppConfig {
        github: GitHubConfig {
            api_key: Some("   ".into()),
            api_url: None,
        },
        ..Default::default()
    };
    let args = ImporterArgs::Github {
        repo: "facebook/react".into(),
    };
    assert!(create_importer(&config, &args).is_err());
}

#[test]
fn github_importer_defaults_team_to_repo_name() {
    let config = AppConfig {
        github: GitHubConfig {
            api_key: Some("ghp_test".into()),
            api_url: None,
        },
        ..Default::default()
    };
    let args = ImporterArgs::Github {
        repo: "facebook/react".into(),
    };
    let importer = create_importer(&config, &args).unwrap();
    assert_eq!(importer.name(), "GitHub");
    assert_eq!(importer.default_team_name(), "react");
}

#[test]
fn file_importers_need_no_credentials() {
    let config = AppConfig::default();
    let cases = [
        (
            ImporterArgs::JiraCsv {
                path: "jira.csv".into(),
                org: None,
            },
            "Jira",
        ),
        (
            ImporterArgs::AsanaCsv {
                path: "asana.csv".into(),
            },
            "Asana",
        ),
        (
            ImporterArgs::PivotalCsv {
                path: "pivotal.csv".into(),
            },
            "Pivotal",
        ),
        (
            ImporterArgs::TrelloJson {
                path: "board.json".into(),
                include_archived: true,
            },
            "Trello",
        ),
    ];
    for (args, team) in cases {
        let importer = create_importer(&config, &args).unwrap();
        assert_eq!(importer.default_team_name(), team);
    }
}

#[tokio::test]
async fn missing_export_file_is_an_io_error() {
    let importer = create_importer(
        &AppConfig::default(),
        &ImporterArgs::AsanaCsv {
            path: "/nonexistent/asana.csv".into(),
        },
    )
    .unwrap();
    let err = importer.import().await.unwrap_err();
    assert!(matches!(err, SourceError::Io { .. }));
}

#[tokio::test]
async fn importers_are_interchangeable_behind_the_trait() {
    let importers: Vec<Box<dyn Importer>> = vec![
        Box::new(MockImporter::new("first")),
        Box::new(MockImporter::new("second")),
    ];
    for importer in &importers {
        let result = importer.import().await.unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].title, format!("{} issue", importer.name()));
        assert!(result.validate().is_empty());
    }
}

#[tokio::test]
async fn failing_importer_reports_source_error() {
    let importer = MockImporter::new("broken").with_failure();
    assert!(importer.import().await.is_err());
    assert_eq!(importer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn named_labels_are_registered_once() {
    let mut result = ImportResult::default();
    let mut issue = IssueRecord {
        title: "t".into(),
        description: String::new(),
        url: None,
        created_at: Utc.timestamp_opt(0, 0).unwrap(),
        labels: vec![],
        comments: vec![],
    };
    attach_named_label(&mut result, &mut issue, "Type: Bug");
    attach_named_label(&mut result, &mut issue, "Type: Bug");
    assert_eq!(issue.labels, vec!["Type: Bug".to_string()]);
    assert_eq!(result.labels.len(), 1);
    assert_eq!(result.labels["Type: Bug"].color, DEFAULT_LABEL_COLOR);
}

#[test]
fn back_link_is_appended_after_body() {
    assert_eq!(
        with_back_link("Body", "issue in Jira", Some("https://x/1")),
        "Body\n\n[View original issue in Jira](https://x/1)"
    );
    assert_eq!(
        with_back_link("  ", "card in Trello", Some("https://x/2")),
        "[View original card in Trello](https://x/2)"
    );
    assert_eq!(with_back_link("Body", "task", None), "Body");
}
