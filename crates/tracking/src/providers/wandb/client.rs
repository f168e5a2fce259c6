//! Weights & Biases GraphQL API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::models::{
    DeleteRunData, DeleteRunVariables, GraphQlRequest, GraphQlResponse, ProjectsData,
    ProjectsVariables, RunsData, RunsVariables, ViewerData, DELETE_RUN_MUTATION, PROJECTS_QUERY,
    RUNS_QUERY, VIEWER_QUERY,
};
use crate::providers::traits::{Project, Run, TrackingError, TrackingProvider};

/// Base URL for the W&B API.
pub const API_BASE_URL: &str = "https://api.wandb.ai";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for connection queries.
const PAGE_SIZE: u32 = 50;

/// W&B API client.
#[derive(Clone)]
pub struct WandbClient {
    /// HTTP client.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// API base URL.
    base_url: String,
    /// Whether deleting a run also deletes its artifacts.
    delete_artifacts: bool,
}

impl WandbClient {
    /// Create a new W&B client.
    ///
    /// # Errors
    /// Returns error if the key is empty or the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TrackingError> {
        Self::with_base_url(api_key, API_BASE_URL)
    }

    /// Create a client for a self-hosted server.
    ///
    /// # Errors
    /// Returns error if the key is empty or the HTTP client cannot be created.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, TrackingError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TrackingError::Config("W&B API key is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            delete_artifacts: false,
        })
    }

    /// Also delete artifacts logged by deleted runs.
    #[must_use]
    pub fn with_delete_artifacts(mut self, delete_artifacts: bool) -> Self {
        self.delete_artifacts = delete_artifacts;
        self
    }

    /// Run a GraphQL operation.
    async fn graphql<T, V>(&self, query: &str, variables: V) -> Result<T, TrackingError>
    where
        T: DeserializeOwned,
        V: Serialize + Send,
    {
        let url = format!("{}/graphql", self.base_url);
        debug!(url = %url, "GraphQL request");

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(TrackingError::NotFound(text));
        }
        if !status.is_success() {
            return Err(TrackingError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body: GraphQlResponse<T> = serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse response");
            TrackingError::Serialization(e)
        })?;

        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(TrackingError::GraphQl(messages.join("; ")));
        }

        body.data
            .ok_or_else(|| TrackingError::GraphQl("response carried no data".to_string()))
    }
}

#[async_trait]
impl TrackingProvider for WandbClient {
    async fn default_entity(&self) -> Result<String, TrackingError> {
        let data: ViewerData = self.graphql(VIEWER_QUERY, serde_json::json!({})).await?;
        data.viewer
            .and_then(|v| v.entity)
            .ok_or_else(|| TrackingError::NotFound("viewer entity".to_string()))
    }

    async fn list_projects(&self, entity: &str) -> Result<Vec<Project>, TrackingError> {
        let mut projects = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data: ProjectsData = self
                .graphql(
                    PROJECTS_QUERY,
                    ProjectsVariables {
                        entity,
                        cursor: cursor.as_deref(),
                        per_page: PAGE_SIZE,
                    },
                )
                .await?;

            let Some(page) = data.models else { break };
            projects.extend(page.edges.into_iter().map(|edge| Project {
                entity: edge.node.entity_name.unwrap_or_else(|| entity.to_string()),
                name: edge.node.name,
            }));

            match page.page_info.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        debug!(entity = %entity, count = projects.len(), "Listed projects");
        Ok(projects)
    }

    async fn list_runs(&self, project: &Project) -> Result<Vec<Run>, TrackingError> {
        let mut runs = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data: RunsData = self
                .graphql(
                    RUNS_QUERY,
                    RunsVariables {
                        project: &project.name,
                        entity: &project.entity,
                        cursor: cursor.as_deref(),
                        per_page: PAGE_SIZE,
                    },
                )
                .await?;

            let page = data
                .project
                .ok_or_else(|| TrackingError::NotFound(project.full_name()))?
                .runs;
            let Some(page) = page else { break };

            runs.extend(page.edges.into_iter().map(|edge| Run {
                id: edge.node.id,
                name: edge.node.name,
                display_name: edge.node.display_name,
            }));

            match page.page_info.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        debug!(project = %project.full_name(), count = runs.len(), "Listed runs");
        Ok(runs)
    }

    async fn delete_run(&self, run: &Run) -> Result<(), TrackingError> {
        let data: DeleteRunData = self
            .graphql(
                DELETE_RUN_MUTATION,
                DeleteRunVariables {
                    id: &run.id,
                    delete_artifacts: self.delete_artifacts,
                },
            )
            .await?;

        // A null payload without errors means nothing matched the ID
        if data.delete_run.is_none() {
            return Err(TrackingError::NotFound(run.name.clone()));
        }

        info!(run = %run.name, "Run deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_requires_key() {
        assert!(matches!(
            WandbClient::new(""),
            Err(TrackingError::Config(_))
        ));
        assert!(WandbClient::new("0123456789abcdef").is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = WandbClient::with_base_url("key", "https://wandb.example.com/").unwrap();
        assert_eq!(client.base_url, "https://wandb.example.com");
        assert!(!client.delete_artifacts);
    }
}
