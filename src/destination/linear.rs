use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{CommentPayload, Destination, IssuePayload};
use crate::error::{parse_retry_after, DestinationError};
use crate::model::import_result::{parse_provenance, LabelRecord, UserRecord, PROVENANCE_PREFIX};
use crate::retry::RetryPolicy;

const TEAMS_QUERY: &str = r#"
query Teams {
  teams(first: 250) {
    nodes { id name key }
  }
}
"#;

const TEAM_CREATE_MUTATION: &str = r#"
mutation TeamCreate($input: TeamCreateInput!) {
  teamCreate(input: $input) {
    success
    team { id name key }
  }
}
"#;

const TEAM_LABELS_QUERY: &str = r#"
query TeamLabels($teamId: String!) {
  team(id: $teamId) {
    labels(first: 250) {
      nodes { id name }
    }
  }
}
"#;

const LABEL_CREATE_MUTATION: &str = r#"
mutation IssueLabelCreate($input: IssueLabelCreateInput!) {
  issueLabelCreate(input: $input) {
    success
    issueLabel { id }
  }
}
"#;

const USER_BY_EMAIL_QUERY: &str = r#"
query UserByEmail($email: String!) {
  users(filter: { email: { eq: $email } }) {
    nodes { id name displayName avatarUrl }
  }
}
"#;

const IMPORTED_MARKERS_QUERY: &str = r#"
query ImportedMarkers($teamId: ID!, $prefix: String!, $after: String) {
  comments(
    first: 100,
    after: $after,
    filter: { body: { startsWith: $prefix }, issue: { team: { id: { eq: $teamId } } } }
  ) {
    nodes { body }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

const ISSUE_CREATE_MUTATION: &str = r#"
mutation IssueCreate($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue { id identifier }
  }
}
"#;

const COMMENT_CREATE_MUTATION: &str = r#"
mutation CommentCreate($input: CommentCreateInput!) {
  commentCreate(input: $input) {
    success
    comment { id }
  }
}
"#;

#[derive(Debug, Serialize)]
struct GraphQLRequest {
    query: &'static str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
    extensions: Option<GraphQLErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedNodes<T> {
    nodes: Vec<T>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TeamNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TeamsData {
    teams: Nodes<TeamNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamCreateData {
    team_create: MutationResult<TeamNode>,
}

#[derive(Debug, Deserialize)]
struct TeamLabelsData {
    team: Option<TeamLabels>,
}

#[derive(Debug, Deserialize)]
struct TeamLabels {
    labels: Nodes<LabelNode>,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelCreateData {
    issue_label_create: LabelCreateResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelCreateResult {
    success: bool,
    issue_label: Option<IdNode>,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Nodes<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    id: String,
    name: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentsData {
    comments: PagedNodes<CommentBody>,
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateData {
    issue_create: MutationResult<IssueNode>,
}

#[derive(Debug, Deserialize)]
struct IssueNode {
    id: String,
    identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentCreateData {
    comment_create: CommentCreateResult,
}

#[derive(Debug, Deserialize)]
struct CommentCreateResult {
    success: bool,
    comment: Option<IdNode>,
}

#[derive(Debug, Deserialize)]
struct MutationResult<T> {
    success: bool,
    #[serde(alias = "team", alias = "issue")]
    entity: Option<T>,
}

/// How a comment author is shown when posting through the API key.
#[derive(Debug, Clone)]
struct Identity {
    name: String,
    avatar_url: Option<String>,
}

/// Linear as import destination.
pub struct LinearDestination {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryPolicy,
    /// Existing labels per team, lower-cased name to id, fetched once.
    team_labels: Mutex<HashMap<String, Arc<OnceCell<HashMap<String, String>>>>>,
    /// Label id per (team, lower-cased name) resolved during this run. Callers
    /// asking for the same name share one lookup-or-create.
    run_labels: Mutex<HashMap<(String, String), Arc<OnceCell<String>>>>,
    identities: Mutex<HashMap<String, Identity>>,
}

impl LinearDestination {
    pub fn new(api_url: String, api_key: String, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            retry,
            team_labels: Mutex::new(HashMap::new()),
            run_labels: Mutex::new(HashMap::new()),
            identities: Mutex::new(HashMap::new()),
        }
    }

    async fn graphql_query<T>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, DestinationError>
    where
        T: DeserializeOwned,
    {
        self.retry
            .execute("linear graphql", || self.send(query, variables.clone()))
            .await
    }

    async fn send<T>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, DestinationError>
    where
        T: DeserializeOwned,
    {
        let request = GraphQLRequest { query, variables };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DestinationError::RateLimited { retry_after });
        }
        let body_text = response.text().await?;

        // Linear reports rate limits as a GraphQL error, sometimes with a 400.
        let parsed: Option<GraphQLResponse<T>> = serde_json::from_str(&body_text).ok();
        let Some(resp) = parsed else {
            if !status.is_success() {
                return Err(DestinationError::Http {
                    status: status.as_u16(),
                    body: body_text,
                });
            }
            let resp: GraphQLResponse<T> = serde_json::from_str(&body_text)?;
            return resp
                .data
                .ok_or_else(|| DestinationError::Graphql("response missing data".into()));
        };

        if let Some(errors) = resp.errors.filter(|e| !e.is_empty()) {
            if errors.iter().any(|e| {
                e.extensions
                    .as_ref()
                    .and_then(|x| x.code.as_deref())
                    == Some("RATELIMITED")
            }) {
                return Err(DestinationError::RateLimited { retry_after });
            }
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(DestinationError::Graphql(messages.join(", ")));
        }
        if !status.is_success() {
            return Err(DestinationError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        resp.data
            .ok_or_else(|| DestinationError::Graphql("response missing data".into()))
    }

    async fn existing_labels(&self, team_id: &str) -> Result<HashMap<String, String>, DestinationError> {
        let cell = {
            let mut map = self
                .team_labels
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(team_id.to_string()).or_default().clone()
        };
        let labels = cell
            .get_or_try_init(|| async {
                let data: TeamLabelsData = self
                    .graphql_query(TEAM_LABELS_QUERY, serde_json::json!({ "teamId": team_id }))
                    .await?;
                Ok::<_, DestinationError>(
                    data.team
                        .map(|t| t.labels.nodes)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|l| (l.name.to_lowercase(), l.id))
                        .collect(),
                )
            })
            .await?;
        Ok(labels.clone())
    }

    fn label_slot(&self, team_id: &str, name: &str) -> Arc<OnceCell<String>> {
        self.run_labels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry((team_id.to_string(), name.to_lowercase()))
            .or_default()
            .clone()
    }

    async fn find_or_create_label(
        &self,
        team_id: &str,
        label: &LabelRecord,
    ) -> Result<String, DestinationError> {
        if let Some(id) = self
            .existing_labels(team_id)
            .await?
            .get(&label.name.to_lowercase())
        {
            return Ok(id.clone());
        }

        let data: LabelCreateData = self
            .graphql_query(
                LABEL_CREATE_MUTATION,
                serde_json::json!({
                    "input": {
                        "teamId": team_id,
                        "name": label.name,
                        "color": label.color,
                        "description": label.description,
                    }
                }),
            )
            .await?;
        match data.issue_label_create {
            LabelCreateResult {
                success: true,
                issue_label: Some(node),
            } => {
                debug!(label = %label.name, id = %node.id, "created Linear label");
                Ok(node.id)
            }
            _ => Err(DestinationError::Rejected(format!("label {}", label.name))),
        }
    }

    fn remember_identity(&self, id: &str, identity: Identity) {
        self.identities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.to_string(), identity);
    }

    fn identity(&self, id: &str) -> Option<Identity> {
        self.identities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }
}

/// Linear team keys are short upper-case identifiers ("ENG").
pub fn derive_team_key(name: &str) -> String {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(5)
        .collect::<String>()
        .to_ascii_uppercase();
    if key.is_empty() {
        "IMP".to_string()
    } else {
        key
    }
}

#[async_trait]
impl Destination for LinearDestination {
    async fn resolve_team(&self, name: &str) -> Result<String, DestinationError> {
        let data: TeamsData = self
            .graphql_query(TEAMS_QUERY, serde_json::json!({}))
            .await?;
        if let Some(team) = data
            .teams
            .nodes
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            debug!(team = %team.name, id = %team.id, "using existing Linear team");
            return Ok(team.id);
        }

        let data: TeamCreateData = self
            .graphql_query(
                TEAM_CREATE_MUTATION,
                serde_json::json!({ "input": { "name": name, "key": derive_team_key(name) } }),
            )
            .await?;
        if !data.team_create.success {
            return Err(DestinationError::Rejected(format!("team {name}")));
        }
        let team = data
            .team_create
            .entity
            .ok_or_else(|| DestinationError::Rejected(format!("team {name}")))?;
        info!(team = %team.name, id = %team.id, "created Linear team");
        Ok(team.id)
    }

    async fn create_label(
        &self,
        team_id: &str,
        label: &LabelRecord,
    ) -> Result<String, DestinationError> {
        // Linear rejects duplicate label names within a team, so names that
        // differ only in case, or already exist, map to one label.
        let slot = self.label_slot(team_id, &label.name);
        let id = slot
            .get_or_try_init(|| self.find_or_create_label(team_id, label))
            .await?;
        Ok(id.clone())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<String>, DestinationError> {
        let data: UsersData = self
            .graphql_query(USER_BY_EMAIL_QUERY, serde_json::json!({ "email": email }))
            .await?;
        let Some(user) = data.users.nodes.into_iter().next() else {
            return Ok(None);
        };
        self.remember_identity(
            &user.id,
            Identity {
                name: user.display_name.unwrap_or(user.name),
                avatar_url: user.avatar_url,
            },
        );
        Ok(Some(user.id))
    }

    async fn create_placeholder_user(&self, user: &UserRecord) -> Result<String, DestinationError> {
        // Linear has no API for creating members; a placeholder is a display
        // name and icon that comments are posted under.
        let id = format!("placeholder:{}", user.name);
        self.remember_identity(
            &id,
            Identity {
                name: user.name.clone(),
                avatar_url: user.avatar_url.clone(),
            },
        );
        Ok(id)
    }

    async fn imported_source_ids(&self, team_id: &str) -> Result<HashSet<String>, DestinationError> {
        let mut ids = HashSet::new();
        let mut after: Option<String> = None;
        loop {
            let data: CommentsData = self
                .graphql_query(
                    IMPORTED_MARKERS_QUERY,
                    serde_json::json!({
                        "teamId": team_id,
                        "prefix": PROVENANCE_PREFIX,
                        "after": after,
                    }),
                )
                .await?;
            ids.extend(
                data.comments
                    .nodes
                    .iter()
                    .filter_map(|c| parse_provenance(&c.body))
                    .map(str::to_string),
            );
            match data.comments.page_info {
                PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                } => after = Some(cursor),
                _ => break,
            }
        }
        debug!(team_id, count = ids.len(), "found previously imported issues");
        Ok(ids)
    }

    async fn create_issue(&self, issue: &IssuePayload) -> Result<String, DestinationError> {
        let data: IssueCreateData = self
            .graphql_query(
                ISSUE_CREATE_MUTATION,
                serde_json::json!({
                    "input": {
                        "teamId": issue.team_id,
                        "title": issue.title,
                        "description": issue.description,
                        "labelIds": issue.label_ids,
                        "createdAt": issue.created_at.to_rfc3339(),
                    }
                }),
            )
            .await?;
        if !data.issue_create.success {
            return Err(DestinationError::Rejected(format!("issue \"{}\"", issue.title)));
        }
        let created = data
            .issue_create
            .entity
            .ok_or_else(|| DestinationError::Rejected(format!("issue \"{}\"", issue.title)))?;
        debug!(identifier = %created.identifier, "created Linear issue");
        Ok(created.id)
    }

    async fn create_comment(&self, comment: &CommentPayload) -> Result<String, DestinationError> {
        let mut input = serde_json::json!({
            "issueId": comment.issue_id,
            "body": comment.body,
            "createdAt": comment.created_at.to_rfc3339(),
        });
        if let Some(identity) = comment.user_id.as_deref().and_then(|id| self.identity(id)) {
            input["createAsUser"] = serde_json::json!(identity.name);
            if let Some(avatar) = identity.avatar_url {
                input["displayIconUrl"] = serde_json::json!(avatar);
            }
        }

        let data: CommentCreateData = self
            .graphql_query(COMMENT_CREATE_MUTATION, serde_json::json!({ "input": input }))
            .await?;
        match data.comment_create {
            CommentCreateResult {
                success: true,
                comment: Some(node),
            } => Ok(node.id),
            _ => Err(DestinationError::Rejected("comment".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn destination(server: &MockServer) -> LinearDestination {
        LinearDestination::new(
            server.uri(),
            "lin_api_test".into(),
            RetryPolicy::new(3, 1, 5),
        )
    }

    #[test]
    fn team_keys() {
        assert_eq!(derive_team_key("widgets"), "WIDGE");
        assert_eq!(derive_team_key("my-app"), "MYAPP");
        assert_eq!(derive_team_key("!!!"), "IMP");
    }

    #[tokio::test]
    async fn resolves_existing_team_case_insensitively() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "lin_api_test"))
            .and(body_partial_json(json!({ "query": TEAMS_QUERY })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "teams": { "nodes": [
                    { "id": "team-1", "name": "Widgets", "key": "WID" }
                ]}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = destination(&server).resolve_team("widgets").await.unwrap();
        assert_eq!(id, "team-1");
    }

    #[tokio::test]
    async fn creates_missing_team() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "query": TEAMS_QUERY })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "teams": { "nodes": [] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "variables": { "input": { "name": "widgets", "key": "WIDGE" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "teamCreate": { "success": true, "team": { "id": "team-9", "name": "widgets", "key": "WIDGE" } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = destination(&server).resolve_team("widgets").await.unwrap();
        assert_eq!(id, "team-9");
    }

    #[tokio::test]
    async fn issue_create_sends_translated_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "variables": { "input": {
                    "teamId": "team-1",
                    "title": "Login fails",
                    "description": "desc\n\n[View original issue in GitHub](https://github.com/acme/widgets/issues/1)",
                    "labelIds": ["lbl-1"],
                    "createdAt": "2023-01-01T00:00:00+00:00"
                }}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "issueCreate": { "success": true, "issue": { "id": "iss-1", "identifier": "WID-1" } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = IssuePayload {
            team_id: "team-1".into(),
            title: "Login fails".into(),
            description: "desc\n\n[View original issue in GitHub](https://github.com/acme/widgets/issues/1)".into(),
            created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            label_ids: vec!["lbl-1".into()],
        };
        let id = destination(&server).create_issue(&payload).await.unwrap();
        assert_eq!(id, "iss-1");
    }

    #[tokio::test]
    async fn rate_limited_graphql_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{ "message": "Rate limit exceeded", "extensions": { "code": "RATELIMITED" } }]
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "commentCreate": { "success": true, "comment": { "id": "cmt-1" } } }
            })))
            .mount(&server)
            .await;

        let comment = CommentPayload {
            issue_id: "iss-1".into(),
            body: "hello".into(),
            user_id: None,
            created_at: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        };
        let id = destination(&server).create_comment(&comment).await.unwrap();
        assert_eq!(id, "cmt-1");
    }

    #[tokio::test]
    async fn placeholder_comments_post_under_source_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "variables": { "input": {
                    "createAsUser": "octocat",
                    "displayIconUrl": "https://avatars/1"
                }}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "commentCreate": { "success": true, "comment": { "id": "cmt-2" } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dest = destination(&server);
        let user_id = dest
            .create_placeholder_user(&UserRecord {
                name: "octocat".into(),
                avatar_url: Some("https://avatars/1".into()),
                email: None,
            })
            .await
            .unwrap();
        let comment = CommentPayload {
            issue_id: "iss-1".into(),
            body: "Same here".into(),
            user_id: Some(user_id),
            created_at: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        };
        assert_eq!(dest.create_comment(&comment).await.unwrap(), "cmt-2");
    }

    #[tokio::test]
    async fn collects_marker_ids_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "after": null } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "comments": {
                    "nodes": [
                        { "body": format!("{PROVENANCE_PREFIX} I_1") },
                        { "body": format!("{PROVENANCE_PREFIX} and then some words") }
                    ],
                    "pageInfo": { "hasNextPage": true, "endCursor": "next" }
                }}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "after": "next" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "comments": {
                    "nodes": [{ "body": format!("{PROVENANCE_PREFIX} I_2") }],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                }}
            })))
            .mount(&server)
            .await;

        let ids = destination(&server)
            .imported_source_ids("team-1")
            .await
            .unwrap();
        assert_eq!(ids, HashSet::from(["I_1".to_string(), "I_2".to_string()]));
    }

    #[tokio::test]
    async fn existing_label_with_same_name_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "query": TEAM_LABELS_QUERY })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "team": { "labels": { "nodes": [ { "id": "lbl-old", "name": "Bug" } ] } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dest = destination(&server);
        let label = LabelRecord {
            name: "bug".into(),
            color: "#D73A4A".into(),
            description: None,
        };
        assert_eq!(dest.create_label("team-1", &label).await.unwrap(), "lbl-old");
        assert_eq!(dest.create_label("team-1", &label).await.unwrap(), "lbl-old");
    }

    async fn mount_empty_team_with_create(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "query": TEAM_LABELS_QUERY })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "team": { "labels": { "nodes": [] } } }
            })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "query": LABEL_CREATE_MUTATION })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "issueLabelCreate": { "success": true, "issueLabel": { "id": "lbl-new" } } }
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn named(name: &str) -> LabelRecord {
        LabelRecord {
            name: name.into(),
            color: "#D73A4A".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn label_created_in_this_run_is_reused_for_same_name() {
        let server = MockServer::start().await;
        mount_empty_team_with_create(&server).await;

        let dest = destination(&server);
        assert_eq!(dest.create_label("team-1", &named("Bug")).await.unwrap(), "lbl-new");
        assert_eq!(dest.create_label("team-1", &named("bug")).await.unwrap(), "lbl-new");
    }

    #[tokio::test]
    async fn concurrent_creates_of_one_name_share_a_single_mutation() {
        let server = MockServer::start().await;
        mount_empty_team_with_create(&server).await;

        let dest = destination(&server);
        let upper_label = named("Backend");
        let lower_label = named("backend");
        let (upper, lower) = tokio::join!(
            dest.create_label("team-1", &upper_label),
            dest.create_label("team-1", &lower_label),
        );
        assert_eq!(upper.unwrap(), "lbl-new");
        assert_eq!(lower.unwrap(), "lbl-new");
    }
}
