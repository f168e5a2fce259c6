//! Bulk run deletion.

use tracing::{info, warn};

use crate::providers::traits::{Project, TrackingError, TrackingProvider};

/// Cleanup settings.
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// List what would be deleted without deleting.
    pub dry_run: bool,
    /// Restrict to these projects (`name` or `entity/name`). Empty means all.
    pub projects: Vec<String>,
}

impl CleanupOptions {
    fn includes(&self, project: &Project) -> bool {
        self.projects.is_empty()
            || self
                .projects
                .iter()
                .any(|p| *p == project.name || *p == project.full_name())
    }
}

/// A run that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    /// Short run ID.
    pub run: String,
    /// Error message.
    pub error: String,
}

/// What happened to one project.
#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    /// The project.
    pub project: Project,
    /// Runs found.
    pub total: usize,
    /// Runs deleted.
    pub deleted: usize,
    /// Runs that failed to delete.
    pub failures: Vec<RunFailure>,
    /// Set when the project's runs could not be listed.
    pub error: Option<String>,
}

/// Result of a cleanup pass.
#[derive(Debug, Clone)]
pub struct CleanupSummary {
    /// Entity that was cleaned.
    pub entity: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Per-project outcomes, in listing order.
    pub projects: Vec<ProjectOutcome>,
}

impl CleanupSummary {
    /// Runs found across all projects.
    #[must_use]
    pub fn total(&self) -> usize {
        self.projects.iter().map(|p| p.total).sum()
    }

    /// Runs deleted across all projects.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.projects.iter().map(|p| p.deleted).sum()
    }

    /// Whether anything failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.projects
            .iter()
            .any(|p| p.error.is_some() || !p.failures.is_empty())
    }
}

/// Delete every run of every project of `entity`.
///
/// A failure on one run or one project is recorded and the pass moves on.
///
/// # Errors
/// Returns error only if the project list itself cannot be fetched.
pub async fn delete_all_runs(
    provider: &dyn TrackingProvider,
    entity: &str,
    options: &CleanupOptions,
) -> Result<CleanupSummary, TrackingError> {
    let projects = provider.list_projects(entity).await?;
    info!(
        entity = %entity,
        count = projects.len(),
        dry_run = options.dry_run,
        "Processing projects"
    );

    let mut outcomes = Vec::new();
    for project in projects.into_iter().filter(|p| options.includes(p)) {
        outcomes.push(clean_project(provider, project, options.dry_run).await);
    }

    Ok(CleanupSummary {
        entity: entity.to_string(),
        dry_run: options.dry_run,
        projects: outcomes,
    })
}

async fn clean_project(
    provider: &dyn TrackingProvider,
    project: Project,
    dry_run: bool,
) -> ProjectOutcome {
    let full_name = project.full_name();
    info!(project = %full_name, "Processing project");

    let runs = match provider.list_runs(&project).await {
        Ok(runs) => runs,
        Err(e) => {
            warn!(project = %full_name, error = %e, "Failed to list runs");
            return ProjectOutcome {
                project,
                total: 0,
                deleted: 0,
                failures: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };

    let total = runs.len();
    let mut deleted = 0;
    let mut failures = Vec::new();

    if !dry_run {
        for run in &runs {
            match provider.delete_run(run).await {
                Ok(()) => {
                    deleted += 1;
                    info!(
                        project = %full_name,
                        run = %run.name,
                        progress = %format!("{deleted}/{total}"),
                        "Deleted run"
                    );
                }
                Err(e) => {
                    warn!(
                        project = %full_name,
                        run = %run.name,
                        error = %e,
                        "Failed to delete run"
                    );
                    failures.push(RunFailure {
                        run: run.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    ProjectOutcome {
        project,
        total,
        deleted,
        failures,
        error: None,
    }
}
