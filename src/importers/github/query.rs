use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const ISSUES_QUERY: &str = r#"
query lastIssues($owner: String!, $repo: String!, $num: Int, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    issues(first: $num, after: $cursor, states: OPEN) {
      edges {
        node {
          id
          title
          body
          url
          createdAt
          labels(first: 100) {
            nodes {
              id
              color
              name
              description
            }
          }
          comments(first: 100) {
            nodes {
              id
              body
              createdAt
              url
              author {
                login
                avatarUrl(size: 255)
                ... on User {
                  id
                  name
                  email
                }
              }
            }
          }
        }
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: String,
}

/// `data` of one page response. `repository` is null when the repo does not
/// exist or the token cannot see it.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryData {
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub issues: IssueConnection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueConnection {
    #[serde(default)]
    pub edges: Vec<IssueEdge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueEdge {
    pub node: GhIssue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhIssue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Option<Connection<GhLabel>>,
    #[serde(default)]
    pub comments: Option<Connection<GhComment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    /// Absent or null when the connection was not selected.
    pub nodes: Option<Vec<T>>,
}

impl<T> Connection<T> {
    pub fn items(conn: &Option<Connection<T>>) -> &[T] {
        conn.as_ref()
            .and_then(|c| c.nodes.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhLabel {
    pub id: String,
    pub color: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhComment {
    pub id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub url: Option<String>,
    /// Null for deleted ("ghost") accounts.
    pub author: Option<GhAuthor>,
}

/// `id`, `name` and `email` are only present for `User` actors; bots and
/// apps come back with just a login and avatar.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhAuthor {
    pub login: String,
    pub avatar_url: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}
