//! wandb-prune - delete every run of a Weights & Biases account.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tracking::cleanup::{delete_all_runs, CleanupOptions, CleanupSummary};
use tracking::providers::wandb::{WandbClient, API_BASE_URL};
use tracking::TrackingProvider;

/// Env file read when `--env-file` is not given.
const DEFAULT_ENV_FILE: &str = ".env";

/// Delete all runs from W&B projects.
#[derive(Parser)]
#[command(name = "wandb-prune")]
#[command(about = "Delete every run of every W&B project of an entity")]
struct Cli {
    /// W&B API key (or set `WANDB_API_KEY`, also read from the env file).
    #[arg(long, env = "WANDB_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// W&B server URL.
    #[arg(long, env = "WANDB_BASE_URL", default_value = API_BASE_URL)]
    base_url: String,

    /// Entity (user or team). Defaults to the key's own entity.
    #[arg(long, env = "WANDB_ENTITY")]
    entity: Option<String>,

    /// Only these projects (`name` or `entity/name`, comma-separated).
    #[arg(long, value_delimiter = ',')]
    projects: Vec<String>,

    /// Also delete artifacts logged by the runs.
    #[arg(long, default_value = "false")]
    delete_artifacts: bool,

    /// Show what would be deleted without deleting.
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Dotenv file with credentials and defaults, loaded before the other options.
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // The env file has to be loaded before clap reads its `env` fallbacks
    let env_file = env_file_arg(std::env::args_os());
    let env_loaded = load_env_file(&env_file)?;

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    debug!(path = %env_file.display(), loaded = env_loaded, "Env file");

    let api_key = cli.api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!(
            "WANDB_API_KEY not found. Provide --api-key or add it to {}",
            env_file.display()
        );
    }

    let client = WandbClient::with_base_url(api_key, &cli.base_url)
        .context("Failed to create W&B client")?
        .with_delete_artifacts(cli.delete_artifacts);

    let entity = match &cli.entity {
        Some(entity) if !entity.trim().is_empty() => entity.trim().to_string(),
        _ => client
            .default_entity()
            .await
            .context("Failed to look up the default entity; pass --entity")?,
    };

    let options = CleanupOptions {
        dry_run: cli.dry_run,
        projects: cli.projects,
    };

    let summary = delete_all_runs(&client, &entity, &options)
        .await
        .with_context(|| format!("Failed to list projects of {entity}"))?;

    print_summary(&summary);

    if summary.has_failures() {
        anyhow::bail!("Some runs or projects could not be processed");
    }
    Ok(())
}

/// Find `--env-file` ahead of full argument parsing.
fn env_file_arg<I, T>(args: I) -> PathBuf
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--") => break,
            Some("--env-file") => {
                if let Some(path) = args.next() {
                    return PathBuf::from(path);
                }
            }
            Some(other) => {
                if let Some(path) = other.strip_prefix("--env-file=") {
                    return PathBuf::from(path);
                }
            }
            None => {}
        }
    }
    PathBuf::from(DEFAULT_ENV_FILE)
}

/// Load a dotenv file into the process environment.
///
/// Returns whether the file existed. Variables already set win.
fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

fn print_summary(summary: &CleanupSummary) {
    for outcome in &summary.projects {
        let full_name = outcome.project.full_name();
        println!("\nProcessing project: {full_name}");

        if let Some(error) = &outcome.error {
            println!("  ✗ Failed to process {full_name}: {error}");
            continue;
        }

        if outcome.total == 0 {
            println!("  No runs found in {full_name}");
            continue;
        }

        if summary.dry_run {
            println!("  Found {} runs. Would delete them all (dry run).", outcome.total);
            continue;
        }

        for failure in &outcome.failures {
            println!("    ✗ Failed to delete run {}: {}", failure.run, failure.error);
        }
        println!(
            "  ✓ Successfully deleted {}/{} runs from {full_name}",
            outcome.deleted, outcome.total
        );
    }

    println!("\n{}", "=".repeat(50));
    println!(
        "Done. {} of {} runs deleted across {} projects of {}.",
        summary.deleted(),
        summary.total(),
        summary.projects.len(),
        summary.entity
    );
    println!("Note: Projects themselves cannot be deleted via API.");
    println!("To fully delete projects, use the W&B web interface:");
    println!("https://wandb.ai -> Project Settings -> Delete Project");
    println!("{}", "=".repeat(50));
}
