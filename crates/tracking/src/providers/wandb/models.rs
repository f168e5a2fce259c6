//! Weights & Biases GraphQL models.

use serde::{Deserialize, Serialize};

// ============================================================================
// GraphQL envelope
// ============================================================================

/// GraphQL request body.
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V> {
    /// Query document.
    pub query: &'a str,
    /// Query variables.
    pub variables: V,
}

/// GraphQL response body.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    /// Result data.
    pub data: Option<T>,
    /// Errors reported alongside (or instead of) data.
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// A GraphQL error entry.
#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    /// Error message.
    pub message: String,
}

/// Relay-style connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    /// Page of edges.
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
    /// Pagination info.
    pub page_info: PageInfo,
}

/// Connection edge.
#[derive(Debug, Deserialize)]
pub struct Edge<T> {
    /// The node.
    pub node: T,
}

/// Connection pagination info.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Cursor of the last edge.
    pub end_cursor: Option<String>,
    /// Whether more pages follow.
    #[serde(default)]
    pub has_next_page: bool,
}

impl PageInfo {
    /// Cursor for the next page, if there is one.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_next_page {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Entity of the authenticated user.
pub const VIEWER_QUERY: &str = "query Viewer { viewer { entity } }";

/// Projects of an entity.
pub const PROJECTS_QUERY: &str = r"
query Projects($entity: String, $cursor: String, $perPage: Int) {
  models(entityName: $entity, after: $cursor, first: $perPage) {
    edges { node { id name entityName } cursor }
    pageInfo { endCursor hasNextPage }
  }
}";

/// Runs of a project.
pub const RUNS_QUERY: &str = r"
query Runs($project: String!, $entity: String!, $cursor: String, $perPage: Int) {
  project(name: $project, entityName: $entity) {
    runs(first: $perPage, after: $cursor) {
      edges { node { id name displayName } cursor }
      pageInfo { endCursor hasNextPage }
    }
  }
}";

/// Delete a run by storage ID.
pub const DELETE_RUN_MUTATION: &str = r"
mutation DeleteRun($id: ID!, $deleteArtifacts: Boolean) {
  deleteRun(input: {id: $id, deleteArtifacts: $deleteArtifacts}) { clientMutationId }
}";

// ============================================================================
// Variables
// ============================================================================

/// Variables of [`PROJECTS_QUERY`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsVariables<'a> {
    /// Entity name.
    pub entity: &'a str,
    /// Page cursor.
    pub cursor: Option<&'a str>,
    /// Page size.
    pub per_page: u32,
}

/// Variables of [`RUNS_QUERY`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunsVariables<'a> {
    /// Project name.
    pub project: &'a str,
    /// Entity name.
    pub entity: &'a str,
    /// Page cursor.
    pub cursor: Option<&'a str>,
    /// Page size.
    pub per_page: u32,
}

/// Variables of [`DELETE_RUN_MUTATION`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRunVariables<'a> {
    /// Run storage ID.
    pub id: &'a str,
    /// Also delete logged artifacts.
    pub delete_artifacts: bool,
}

// ============================================================================
// Results
// ============================================================================

/// Result of [`VIEWER_QUERY`].
#[derive(Debug, Deserialize)]
pub struct ViewerData {
    /// Authenticated user.
    pub viewer: Option<Viewer>,
}

/// Authenticated user.
#[derive(Debug, Deserialize)]
pub struct Viewer {
    /// Default entity.
    pub entity: Option<String>,
}

/// Result of [`PROJECTS_QUERY`].
#[derive(Debug, Deserialize)]
pub struct ProjectsData {
    /// Projects ("models" in the schema).
    pub models: Option<Connection<ProjectNode>>,
}

/// Project node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    /// Project name.
    pub name: String,
    /// Owning entity.
    pub entity_name: Option<String>,
}

/// Result of [`RUNS_QUERY`].
#[derive(Debug, Deserialize)]
pub struct RunsData {
    /// Project, `None` if it does not exist.
    pub project: Option<ProjectRuns>,
}

/// Runs of a project.
#[derive(Debug, Deserialize)]
pub struct ProjectRuns {
    /// Runs connection.
    pub runs: Option<Connection<RunNode>>,
}

/// Run node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunNode {
    /// Storage ID.
    pub id: String,
    /// Short run ID.
    pub name: String,
    /// Display name.
    pub display_name: Option<String>,
}

/// Result of [`DELETE_RUN_MUTATION`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRunData {
    /// Mutation payload, `null` when no run was deleted.
    pub delete_run: Option<serde::de::IgnoredAny>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_cursor_only_when_more_pages() {
        let more: PageInfo =
            serde_json::from_str(r#"{"endCursor": "abc", "hasNextPage": true}"#).unwrap();
        assert_eq!(more.next_cursor(), Some("abc"));

        let last: PageInfo =
            serde_json::from_str(r#"{"endCursor": "abc", "hasNextPage": false}"#).unwrap();
        assert_eq!(last.next_cursor(), None);
    }

    #[test]
    fn test_variables_are_camel_case() {
        let vars = RunsVariables {
            project: "p",
            entity: "e",
            cursor: None,
            per_page: 50,
        };
        let json = serde_json::to_value(&vars).unwrap();
        assert_eq!(json["perPage"], 50);
        assert!(json["cursor"].is_null());
    }
}
