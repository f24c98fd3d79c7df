use super::query::{Connection, GhIssue};
use crate::model::import_result::{
    marker_timestamp, CommentRecord, ImportResult, IssueRecord, LabelRecord, UserRecord,
};

/// Turn raw GitHub issues into an [`ImportResult`].
///
/// Pure function of its input: running it twice over the same issues gives
/// equal results.
pub fn normalize(issues: &[GhIssue]) -> ImportResult {
    let mut result = ImportResult::default();

    for issue in issues {
        let comments_raw = Connection::items(&issue.comments);
        let labels_raw = Connection::items(&issue.labels);

        let mut comments: Vec<CommentRecord> = comments_raw
            .iter()
            .filter_map(|comment| {
                let user_id = comment.author.as_ref()?.id.clone()?;
                Some(CommentRecord {
                    body: comment.body.clone(),
                    created_at: comment.created_at,
                    user_id: Some(user_id),
                })
            })
            .collect();
        let marker_at = marker_timestamp(issue.created_at, &comments);
        comments.push(CommentRecord::provenance(&issue.id, marker_at));

        let mut record = IssueRecord {
            title: issue.title.clone(),
            description: format!(
                "{}\n\n[View original issue in GitHub]({})",
                issue.body.as_deref().unwrap_or_default(),
                issue.url
            ),
            url: Some(issue.url.clone()),
            created_at: issue.created_at,
            labels: Vec::new(),
            comments,
        };
        for label in labels_raw {
            record.push_label(label.id.clone());
        }
        result.issues.push(record);

        for author in comments_raw.iter().filter_map(|c| c.author.as_ref()) {
            let Some(id) = &author.id else { continue };
            result.upsert_user(
                id.clone(),
                UserRecord {
                    name: author.login.clone(),
                    avatar_url: author.avatar_url.clone(),
                    email: author.email.clone().filter(|e| !e.is_empty()),
                },
            );
        }

        for label in labels_raw {
            result.upsert_label(
                label.id.clone(),
                LabelRecord {
                    name: label.name.clone(),
                    color: normalize_color(&label.color),
                    description: label.description.clone().filter(|d| !d.is_empty()),
                },
            );
        }
    }

    result
}

/// GitHub returns colors as bare hex (`d73a4a`); the destination wants
/// `#RRGGBB`.
pub fn normalize_color(raw: &str) -> String {
    let hex = raw.trim().trim_start_matches('#');
    format!("#{}", hex.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_issues(value: serde_json::Value) -> Vec<GhIssue> {
        serde_json::from_value(value).unwrap()
    }

    fn fixture() -> Vec<GhIssue> {
        raw_issues(json!([
            {
                "id": "I_1",
                "title": "Login fails",
                "body": "Steps to reproduce",
                "url": "https://github.com/acme/widgets/issues/1",
                "createdAt": "2023-01-01T00:00:00Z",
                "labels": { "nodes": [
                    { "id": "LA_bug", "color": "d73a4a", "name": "bug", "description": "Something is broken" },
                    { "id": "LA_ui", "color": "#a2eeef", "name": "ui", "description": "" }
                ]},
                "comments": { "nodes": [
                    {
                        "id": "C_1", "body": "Same here", "createdAt": "2023-01-02T00:00:00Z", "url": null,
                        "author": { "login": "octocat", "avatarUrl": "https://avatars/1", "id": "U_1", "name": "Octo", "email": "" }
                    },
                    {
                        "id": "C_2", "body": "bot says hi", "createdAt": "2023-01-03T00:00:00Z", "url": null,
                        "author": { "login": "dependabot", "avatarUrl": "https://avatars/bot" }
                    },
                    {
                        "id": "C_3", "body": "ghost", "createdAt": "2023-01-04T00:00:00Z", "url": null,
                        "author": null
                    }
                ]}
            },
            {
                "id": "I_2",
                "title": "No labels here",
                "body": null,
                "url": "https://github.com/acme/widgets/issues/2",
                "createdAt": "2023-02-01T00:00:00Z",
                "labels": { "nodes": [] },
                "comments": { "nodes": [
                    {
                        "id": "C_4", "body": "renamed later", "createdAt": "2023-02-02T00:00:00Z", "url": null,
                        "author": { "login": "octocat-renamed", "avatarUrl": "https://avatars/1b", "id": "U_1", "email": "octo@example.com" }
                    }
                ]}
            }
        ]))
    }

    #[test]
    fn builds_description_with_back_link() {
        let result = normalize(&fixture());
        assert_eq!(
            result.issues[0].description,
            "Steps to reproduce\n\n[View original issue in GitHub](https://github.com/acme/widgets/issues/1)"
        );
        assert!(result.issues[1]
            .description
            .ends_with("[View original issue in GitHub](https://github.com/acme/widgets/issues/2)"));
        assert_eq!(
            result.issues[0].url.as_deref(),
            Some("https://github.com/acme/widgets/issues/1")
        );
    }

    #[test]
    fn keeps_only_identified_comment_authors() {
        let result = normalize(&fixture());
        let comments = &result.issues[0].comments;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].body, "Same here");
        assert_eq!(comments[0].user_id.as_deref(), Some("U_1"));
    }

    #[test]
    fn every_issue_ends_with_provenance_marker() {
        let result = normalize(&fixture());
        for (issue, source_id) in result.issues.iter().zip(["I_1", "I_2"]) {
            let last = issue.comments.last().unwrap();
            assert!(last.body.contains(source_id));
            assert_eq!(last.user_id, None);
            assert_eq!(issue.provenance_id(), Some(source_id));
            assert!(issue.comments.iter().all(|c| c.created_at <= last.created_at));
        }
    }

    #[test]
    fn issue_without_labels_gets_empty_list() {
        let result = normalize(&fixture());
        assert!(result.issues[1].labels.is_empty());
        assert_eq!(result.issues[0].labels, vec!["LA_bug", "LA_ui"]);
    }

    #[test]
    fn labels_are_upserted_with_hex_color() {
        let result = normalize(&fixture());
        assert_eq!(result.labels.len(), 2);
        assert_eq!(result.labels["LA_bug"].color, "#D73A4A");
        assert_eq!(result.labels["LA_ui"].color, "#A2EEEF");
        assert_eq!(
            result.labels["LA_bug"].description.as_deref(),
            Some("Something is broken")
        );
        assert_eq!(result.labels["LA_ui"].description, None);
    }

    #[test]
    fn same_author_across_issues_is_one_user_last_seen_wins() {
        let result = normalize(&fixture());
        assert_eq!(result.users.len(), 1);
        let user = &result.users["U_1"];
        assert_eq!(user.name, "octocat-renamed");
        assert_eq!(user.email.as_deref(), Some("octo@example.com"));
    }

    #[test]
    fn empty_email_becomes_none() {
        let result = normalize(&fixture()[..1]);
        assert_eq!(result.users["U_1"].email, None);
    }

    #[test]
    fn references_always_resolve() {
        let result = normalize(&fixture());
        assert!(result.validate().is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let issues = fixture();
        let first = serde_json::to_string(&normalize(&issues)).unwrap();
        let second = serde_json::to_string(&normalize(&issues)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn preserves_source_timestamps() {
        let issues = fixture();
        let result = normalize(&issues);
        assert_eq!(result.issues[0].created_at, issues[0].created_at);
        assert_eq!(
            result.issues[0].comments[0].created_at.to_rfc3339(),
            "2023-01-02T00:00:00+00:00"
        );
    }

    #[test]
    fn color_normalization() {
        assert_eq!(normalize_color("ededed"), "#EDEDED");
        assert_eq!(normalize_color("#0e8a16"), "#0E8A16");
    }
}
