use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::{read_export, with_back_link, Importer, DEFAULT_LABEL_COLOR};
use crate::error::SourceError;
use crate::model::import_result::{
    marker_timestamp, CommentRecord, ImportResult, IssueRecord, LabelRecord, UserRecord,
};
use crate::util::dates::parse_datetime;

/// Imports a Trello board's "Export as JSON" file.
pub struct TrelloJsonImporter {
    path: PathBuf,
    include_archived: bool,
}

impl TrelloJsonImporter {
    pub fn new(path: PathBuf, include_archived: bool) -> Self {
        Self {
            path,
            include_archived,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Board {
    #[serde(default)]
    cards: Vec<Card>,
    #[serde(default)]
    labels: Vec<TrelloLabel>,
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    checklists: Vec<Checklist>,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Card {
    id: String,
    name: String,
    #[serde(default)]
    desc: String,
    short_url: Option<String>,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    id_labels: Vec<String>,
}

#[derive(Deserialize)]
struct TrelloLabel {
    id: String,
    #[serde(default)]
    name: String,
    color: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Member {
    id: String,
    full_name: Option<String>,
    username: String,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Checklist {
    id_card: String,
    name: String,
    #[serde(default)]
    check_items: Vec<CheckItem>,
}

#[derive(Deserialize)]
struct CheckItem {
    name: String,
    state: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Action {
    #[serde(rename = "type")]
    kind: String,
    date: String,
    id_member_creator: Option<String>,
    data: ActionData,
}

#[derive(Deserialize)]
struct ActionData {
    text: Option<String>,
    card: Option<ActionCard>,
}

#[derive(Deserialize)]
struct ActionCard {
    id: String,
}

/// Trello's named label colors.
fn label_color(name: Option<&str>) -> &'static str {
    match name.unwrap_or_default() {
        "green" => "#61BD4F",
        "yellow" => "#F2D600",
        "orange" => "#FF9F1A",
        "red" => "#EB5A46",
        "purple" => "#C377E0",
        "blue" => "#0079BF",
        "sky" => "#00C2E0",
        "lime" => "#51E898",
        "pink" => "#FF78CB",
        "black" => "#344563",
        _ => DEFAULT_LABEL_COLOR,
    }
}

/// Trello object ids start with the creation time as 8 hex digits of Unix
/// seconds.
fn created_from_id(id: &str) -> Option<DateTime<Utc>> {
    let secs = i64::from_str_radix(id.get(..8)?, 16).ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn checklist_markdown(checklists: &[&Checklist]) -> String {
    let mut out = String::new();
    for checklist in checklists {
        out.push_str(&format!("\n\n### {}\n", checklist.name));
        for item in &checklist.check_items {
            let mark = if item.state == "complete" { "x" } else { " " };
            out.push_str(&format!("\n- [{mark}] {}", item.name));
        }
    }
    out
}

fn convert(board: Board, include_archived: bool) -> ImportResult {
    let mut result = ImportResult::default();

    let members: HashMap<&str, &Member> = board.members.iter().map(|m| (m.id.as_str(), m)).collect();
    let labels: HashMap<&str, &TrelloLabel> = board.labels.iter().map(|l| (l.id.as_str(), l)).collect();

    let mut comments_by_card: HashMap<&str, Vec<(DateTime<Utc>, &Action)>> = HashMap::new();
    for action in board.actions.iter().filter(|a| a.kind == "commentCard") {
        let (Some(card), Some(date)) = (&action.data.card, parse_datetime(&action.date)) else {
            continue;
        };
        comments_by_card
            .entry(card.id.as_str())
            .or_default()
            .push((date, action));
    }

    for card in &board.cards {
        if card.closed && !include_archived {
            continue;
        }
        let created_at = created_from_id(&card.id).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let card_checklists: Vec<&Checklist> = board
            .checklists
            .iter()
            .filter(|c| c.id_card == card.id)
            .collect();
        let body = format!("{}{}", card.desc, checklist_markdown(&card_checklists));

        // Exports list actions newest first.
        let mut actions = comments_by_card.remove(card.id.as_str()).unwrap_or_default();
        actions.sort_by_key(|(date, _)| *date);
        let mut comments: Vec<CommentRecord> = actions
            .into_iter()
            .map(|(date, action)| {
                let author = action
                    .id_member_creator
                    .as_deref()
                    .and_then(|id| members.get(id));
                if let Some(member) = author {
                    result.upsert_user(
                        member.id.clone(),
                        UserRecord {
                            name: member
                                .full_name
                                .clone()
                                .unwrap_or_else(|| member.username.clone()),
                            avatar_url: member.avatar_url.as_ref().map(|u| format!("{u}/170.png")),
                            email: None,
                        },
                    );
                }
                CommentRecord {
                    body: action.data.text.clone().unwrap_or_default(),
                    created_at: date,
                    user_id: author.map(|m| m.id.clone()),
                }
            })
            .collect();
        let marker_at = marker_timestamp(created_at, &comments);
        comments.push(CommentRecord::provenance(&card.id, marker_at));

        let mut issue = IssueRecord {
            title: card.name.clone(),
            description: with_back_link(&body, "card in Trello", card.short_url.as_deref()),
            url: card.short_url.clone(),
            created_at,
            labels: Vec::new(),
            comments,
        };
        for label_id in &card.id_labels {
            let Some(label) = labels.get(label_id.as_str()) else {
                continue;
            };
            let color = label_color(label.color.as_deref());
            let name = if label.name.is_empty() {
                label.color.clone().unwrap_or_else(|| "unnamed".to_string())
            } else {
                label.name.clone()
            };
            result.upsert_label(
                label.id.clone(),
                LabelRecord {
                    name,
                    color: color.to_string(),
                    description: None,
                },
            );
            issue.push_label(label.id.clone());
        }
        result.issues.push(issue);
    }

    result
}

#[async_trait]
impl Importer for TrelloJsonImporter {
    fn name(&self) -> &str {
        "Trello (JSON)"
    }

    fn default_team_name(&self) -> &str {
        "Trello"
    }

    async fn import(&self) -> Result<ImportResult, SourceError> {
        let contents = read_export(&self.path)?;
        let board: Board = serde_json::from_str(&contents)?;
        Ok(convert(board, self.include_archived))
    }
}
