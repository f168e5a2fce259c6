//! GPU CLI - GPU instance rental tool for AI/ML workloads.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gpu::launch::{
    LaunchConfig, LaunchReport, Launcher, DEFAULT_IMAGE, DEFAULT_READY_TIMEOUT_SECS,
    DEFAULT_SHOW_TOP, DEFAULT_TEMPLATE_ID,
};
use gpu::providers::traits::{CreateInstanceRequest, GpuProvider, OfferQuery};
use gpu::providers::vast::{Vast, CONSOLE_URL};
use gpu::selection::{rank, OfferRanking};
use gpu::verify::{
    check_directory, shell_quote, DirectoryCheck, SshShell, DEFAULT_SETTLE_SECS,
    DEFAULT_WORKSPACE_DIR,
};
use gpu::{GpuInstance, GpuOffer, InstanceStatus, SshEndpoint};

/// Environment variable holding the Vast.ai API token.
const API_TOKEN_ENV: &str = "VAST_API_TOKEN";

/// Env file read when `--env-file` is not given.
const DEFAULT_ENV_FILE: &str = ".env";

/// GPU CLI - Rent GPU instances for AI/ML workloads.
#[derive(Parser)]
#[command(name = "gpu")]
#[command(about = "Search, rent and check GPU instances on Vast.ai")]
struct Cli {
    /// Vast.ai API token (or set `VAST_API_TOKEN`, also read from the env file).
    #[arg(long, env = "VAST_API_TOKEN", default_value = "", hide_env_values = true)]
    api_token: String,

    /// Dotenv file with credentials and defaults, loaded before the other options.
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Template and image for new instances.
#[derive(Args)]
struct TemplateArgs {
    /// Template ID to apply (default depends on the command and ranking).
    #[arg(long, env = "VAST_TEMPLATE_ID")]
    template_id: Option<u64>,

    /// Container image.
    #[arg(long, env = "VAST_IMAGE", default_value = DEFAULT_IMAGE)]
    image: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Search on-demand offers.
    Offers {
        /// How to rank offers.
        #[arg(long, value_enum, default_value_t = OfferRanking::FastestNetwork)]
        ranking: OfferRanking,

        /// Number of offers to show.
        #[arg(long, default_value_t = DEFAULT_SHOW_TOP)]
        limit: usize,
    },

    /// Rent an offer.
    Create {
        /// Offer ID (from `offers` command).
        #[arg(long)]
        offer: String,

        #[command(flatten)]
        template: TemplateArgs,
    },

    /// List all instances.
    List,

    /// Get details of an instance.
    Get {
        /// Instance ID.
        #[arg(long)]
        id: String,
    },

    /// Destroy an instance.
    Delete {
        /// Instance ID.
        #[arg(long)]
        id: String,

        /// Skip confirmation prompt.
        #[arg(long, short = 'y', default_value = "false")]
        yes: bool,
    },

    /// Wait for an instance to expose SSH details.
    Wait {
        /// Instance ID.
        #[arg(long)]
        id: String,

        /// Timeout in seconds.
        #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Check that a directory was cloned inside an instance.
    Check {
        /// Instance ID.
        #[arg(long)]
        id: String,

        /// Directory to look for.
        #[arg(long, default_value = DEFAULT_WORKSPACE_DIR)]
        path: String,

        /// Seconds to wait before connecting.
        #[arg(long, default_value_t = DEFAULT_SETTLE_SECS)]
        settle: u64,
    },

    /// Rent the best offer, wait for it and check the cloned directory.
    Launch {
        /// How to rank offers.
        #[arg(long, value_enum, default_value_t = OfferRanking::FastestNetwork)]
        ranking: OfferRanking,

        #[command(flatten)]
        template: TemplateArgs,

        /// Seconds to wait before the first readiness poll (default depends on ranking).
        #[arg(long)]
        initial_delay: Option<u64>,

        /// Readiness timeout in seconds.
        #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
        timeout: u64,

        /// Directory to look for inside the container (checked by default for
        /// fastest-network launches).
        #[arg(long)]
        path: Option<String>,

        /// Skip the SSH directory check.
        #[arg(long, default_value = "false", conflicts_with = "path")]
        no_verify: bool,
    },
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

    let api_token = cli.api_token.trim();
    if api_token.is_empty() {
        anyhow::bail!(
            "{API_TOKEN_ENV} not found. Provide --api-token or add it to {}",
            env_file.display()
        );
    }

    let provider = Vast::new(api_token).context("Failed to create Vast.ai provider")?;

    match cli.command {
        Commands::Offers { ranking, limit } => {
            let query = OfferQuery::default();
            let mut offers = provider.list_offers(&query).await?;
            rank(&mut offers, ranking);

            if offers.is_empty() {
                println!("\n❌ No on-demand offers found");
                return Ok(());
            }

            println!(
                "\n✅ Found {} on-demand offers (sorted by {ranking}):\n",
                offers.len()
            );
            for (i, offer) in offers.iter().take(limit).enumerate() {
                print_offer(i + 1, offer);
            }
        }

        Commands::Create { offer, template } => {
            let template_id = template.template_id.unwrap_or(DEFAULT_TEMPLATE_ID);
            info!(offer_id = %offer, template_id, "Creating instance");

            let id = provider
                .create_instance(CreateInstanceRequest::new(offer, template_id, template.image))
                .await?;

            println!("\n✅ Instance created successfully!");
            println!("   Instance ID: {id}");
            println!("\n💡 Run `gpu wait --id {id}` to wait for SSH access");
        }

        Commands::List => {
            let instances = provider.list_instances().await?;

            println!(
                "\n{:<12} {:<14} {:<45} {:<30}",
                "ID", "STATUS", "IMAGE", "SSH"
            );
            println!("{}", "-".repeat(100));

            for inst in instances {
                println!(
                    "{:<12} {} {:<11} {:<45} {:<30}",
                    inst.id,
                    status_emoji(&inst.status),
                    inst.status.to_string(),
                    inst.image.as_deref().unwrap_or("N/A"),
                    inst.ssh.as_ref().map(ToString::to_string).unwrap_or_default()
                );
            }
            println!();
        }

        Commands::Get { id } => {
            let instance = provider.get_instance(&id).await?;
            print_instance(&instance);
        }

        Commands::Delete { id, yes } => {
            if !yes {
                println!("⚠️  Are you sure you want to destroy instance {id}?");
                println!("   This action cannot be undone.");
                println!("   Use --yes to skip this prompt.");
                return Ok(());
            }

            info!(instance_id = %id, "Destroying instance");
            provider.delete_instance(&id).await?;
            println!("\n✅ Instance {id} destroyed successfully!");
        }

        Commands::Wait { id, timeout } => {
            println!("⏳ Waiting for instance {id} to expose SSH details...");
            let instance = provider.wait_ready(&id, Duration::ZERO, timeout).await?;
            println!("\n✅ Instance is ready!");
            print_instance(&instance);
        }

        Commands::Check { id, path, settle } => {
            let instance = provider.get_instance(&id).await?;
            let Some(ssh) = instance.ssh else {
                println!("\n⚠️  SSH details not available yet (instance may still be starting)");
                println!("   Check manually at: {CONSOLE_URL}");
                return Ok(());
            };

            println!("\n🔍 Checking for {path}...");
            let check =
                check_directory(&SshShell::default(), &ssh, &path, Duration::from_secs(settle))
                    .await;
            print_directory_check(&check, &ssh, &path);
        }

        Commands::Launch {
            ranking,
            template,
            initial_delay,
            timeout,
            path,
            no_verify,
        } => {
            let mut config = LaunchConfig::for_ranking(ranking);
            if let Some(template_id) = template.template_id {
                config.template_id = template_id;
            }
            config.image = template.image;
            config.ready_timeout_secs = timeout;
            if no_verify {
                config.verify_path = None;
            } else if let Some(path) = path {
                config.verify_path = Some(path);
            }
            if let Some(secs) = initial_delay {
                config.initial_delay = Duration::from_secs(secs);
            }

            println!("🚀 Creating Vast.ai instance ({ranking})");
            println!("{}", "=".repeat(50));
            println!("Template ID: {}", config.template_id);
            println!("Image: {}", config.image);
            if let Some(path) = &config.verify_path {
                println!("Check: {path}");
            }
            println!();

            let shell = SshShell::default();
            let report = Launcher::new(&provider, &shell, config).run().await?;
            print_launch_report(&report);
        }
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

fn status_emoji(status: &InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Running => "🟢",
        InstanceStatus::Created | InstanceStatus::Loading => "🟡",
        InstanceStatus::Stopped | InstanceStatus::Exited => "🔴",
        InstanceStatus::Unknown => "⚪",
    }
}

fn print_offer(position: usize, offer: &GpuOffer) {
    println!("{position}. Offer ID: {}", offer.id);
    println!("   GPU: {} x{}", offer.gpu_name, offer.gpu_count);
    println!("   Price: ${:.2}/hr", offer.price_per_hour);
    println!("   RAM: {:.1}GB", offer.ram_gb);
    println!("   Disk: {:.1}GB", offer.disk_gb);

    let score = offer.network_score();
    if offer.inet_up_mbps > 0.0 || offer.inet_down_mbps > 0.0 {
        println!(
            "   Network: ↑{:.1} Mbps / ↓{:.1} Mbps (Total: {score:.1} Mbps)",
            offer.inet_up_mbps, offer.inet_down_mbps
        );
    } else if score > 0.0 {
        println!("   Network: {score:.1} Mbps");
    }
    println!();
}

fn print_instance(instance: &GpuInstance) {
    println!("\n🖥️  Instance: {}", instance.id);
    println!("   Status:   {} {}", status_emoji(&instance.status), instance.status);
    println!("   Image:    {}", instance.image.as_deref().unwrap_or("N/A"));

    if let Some(started) = &instance.started_at {
        println!("   Started:  {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    match &instance.ssh {
        Some(ssh) => println!("\n   🔐 SSH: {}", ssh.ssh_command()),
        None => println!("\n   ⚠️  SSH details not available yet"),
    }

    if let Some(url) = &instance.jupyter_url {
        println!("   📓 Jupyter: {url}");
    }
}

fn print_directory_check(check: &DirectoryCheck, ssh: &SshEndpoint, path: &str) {
    let manual = SshShell::manual_command(ssh);
    match check {
        DirectoryCheck::Present { details } => {
            println!("   ✅ {path} EXISTS!");
            println!("\n   Details:");
            for line in details.lines() {
                println!("   {line}");
            }
            println!("   ✅ Repository is successfully cloned!");
        }
        DirectoryCheck::Missing => {
            println!("   ⚠️  {path} NOT FOUND yet");
            println!("   The container may still be initializing; its entrypoint clones it.");
            println!("\n   To check manually:");
            println!("   {manual}");
            println!("   ls -la {}", shell_quote(path));
        }
        DirectoryCheck::Unreachable { reason } => {
            println!("   ⚠️  Could not check via SSH: {reason}");
            println!("   Please check manually: {manual}");
        }
    }
}

fn print_launch_report(report: &LaunchReport) {
    println!(
        "✅ Found {} on-demand offers, top {}:\n",
        report.offers_found,
        report.candidates.len()
    );
    for (i, offer) in report.candidates.iter().enumerate() {
        print_offer(i + 1, offer);
    }
    println!("📝 Selected offer ID: {}", report.offer.id);
    println!("✅ Instance created: {}", report.instance_id);

    match &report.instance {
        Some(instance) => {
            print_instance(instance);
            if let (Some((path, check)), Some(ssh)) = (&report.directory, &instance.ssh) {
                println!("\n🔍 Checking for {path}...");
                print_directory_check(check, ssh, path);
            }
        }
        None => {
            println!("\n⚠️  Could not get instance details yet");
            println!("   Instance ID: {}", report.instance_id);
        }
    }

    println!("\n   View in browser: {CONSOLE_URL}");
    println!("\n✅ Done!");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_file_arg() {
        assert_eq!(env_file_arg(["gpu", "list"]), PathBuf::from(".env"));
        assert_eq!(
            env_file_arg(["gpu", "--env-file", "vast.env", "list"]),
            PathBuf::from("vast.env")
        );
        assert_eq!(
            env_file_arg(["gpu", "--env-file=/etc/vast.env", "list"]),
            PathBuf::from("/etc/vast.env")
        );
        assert_eq!(
            env_file_arg(["gpu", "check", "--", "--env-file", "x"]),
            PathBuf::from(".env")
        );
    }

    #[test]
    fn test_env_file_feeds_template_args() {
        let path = std::env::temp_dir().join(format!("gpu-cli-{}.env", std::process::id()));
        std::fs::write(&path, "VAST_TEMPLATE_ID=4242\nVAST_IMAGE=example/image:latest\n").unwrap();

        let loaded = load_env_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(loaded);

        let cli = Cli::try_parse_from(["gpu", "create", "--offer", "7"]).unwrap();
        let Commands::Create { offer, template } = cli.command else {
            panic!("expected create");
        };
        assert_eq!(offer, "7");
        assert_eq!(template.template_id, Some(4242));
        assert_eq!(template.image, "example/image:latest");
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        assert!(!load_env_file(Path::new("/nonexistent/gpu-cli.env")).unwrap());
    }
}
