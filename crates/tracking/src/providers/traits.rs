//! Tracking provider trait and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tracking provider operations.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// GraphQL layer reported errors.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A project owned by an entity (user or team).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Owning entity.
    pub entity: String,
    /// Project name.
    pub name: String,
}

impl Project {
    /// `entity/name` path.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.entity, self.name)
    }
}

/// A single tracked run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Storage ID used by mutations.
    pub id: String,
    /// Short run ID shown in URLs.
    pub name: String,
    /// Human-readable name.
    pub display_name: Option<String>,
}

/// Trait for experiment-tracking backends.
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    /// Entity the credentials belong to.
    async fn default_entity(&self) -> Result<String, TrackingError>;

    /// List all projects of an entity.
    async fn list_projects(&self, entity: &str) -> Result<Vec<Project>, TrackingError>;

    /// List all runs of a project.
    async fn list_runs(&self, project: &Project) -> Result<Vec<Run>, TrackingError>;

    /// Delete a run.
    async fn delete_run(&self, run: &Run) -> Result<(), TrackingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let project = Project {
            entity: "lab".to_string(),
            name: "sweeps".to_string(),
        };
        assert_eq!(project.full_name(), "lab/sweeps");
    }
}
