//! GPU provider trait and common types.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during GPU provider operations.
#[derive(Error, Debug)]
pub enum GpuProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The offer search came back empty.
    #[error("No on-demand offers available for query: {0}")]
    NoOffersAvailable(String),

    /// Instance creation succeeded but the response carried no instance ID.
    #[error("Instance created on offer {0} but no instance ID was returned")]
    MissingInstanceId(String),
}

/// Instance status as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Contract accepted, container not pulled yet.
    Created,
    /// Image is being pulled or the container is starting.
    Loading,
    /// Container is running.
    Running,
    /// Container was stopped by the user.
    Stopped,
    /// Container exited on its own.
    Exited,
    /// Unknown status.
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    /// Parse the free-form status string the API returns.
    #[must_use]
    pub fn from_api(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "loading" | "starting" => Self::Loading,
            "running" => Self::Running,
            "stopped" | "offline" => Self::Stopped,
            "exited" => Self::Exited,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Loading => write!(f, "loading"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A rentable machine configuration advertised by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuOffer {
    /// Offer ID (the ask ID to accept).
    pub id: String,
    /// GPU model (e.g., "RTX 4090").
    pub gpu_name: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Total hourly price in USD.
    pub price_per_hour: f64,
    /// RAM in GB.
    pub ram_gb: f64,
    /// Disk space in GB.
    pub disk_gb: f64,
    /// Upload speed in Mbps.
    pub inet_up_mbps: f64,
    /// Download speed in Mbps.
    pub inet_down_mbps: f64,
    /// Advertised bandwidth in Mbps (0 when not reported).
    pub bandwidth_mbps: f64,
    /// Whether the offer can be rented on demand.
    pub on_demand: bool,
}

impl GpuOffer {
    /// Network throughput score, higher is better.
    ///
    /// Advertised bandwidth wins when present; otherwise upload and download
    /// speeds are summed.
    #[must_use]
    pub fn network_score(&self) -> f64 {
        if self.bandwidth_mbps > 0.0 {
            self.bandwidth_mbps
        } else {
            self.inet_up_mbps + self.inet_down_mbps
        }
    }
}

/// SSH connection details for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshEndpoint {
    /// Hostname or IP address.
    pub host: String,
    /// SSH port.
    pub port: u16,
}

impl SshEndpoint {
    /// Default SSH port when the provider does not report one.
    pub const DEFAULT_PORT: u16 = 22;

    /// Login user inside provider containers.
    pub const USER: &'static str = "root";

    /// Shell command a user can paste to connect.
    #[must_use]
    pub fn ssh_command(&self) -> String {
        format!("ssh {}@{} -p {}", Self::USER, self.host, self.port)
    }
}

impl std::fmt::Display for SshEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", Self::USER, self.host, self.port)
    }
}

/// A provisioned instance (accepted offer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInstance {
    /// Instance (contract) ID.
    pub id: String,
    /// Current status.
    pub status: InstanceStatus,
    /// Container image.
    pub image: Option<String>,
    /// SSH endpoint, once the provider has assigned one.
    pub ssh: Option<SshEndpoint>,
    /// Jupyter URL, if the template exposes one.
    pub jupyter_url: Option<String>,
    /// When the instance was started.
    pub started_at: Option<DateTime<Utc>>,
}

/// Offer search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferQuery {
    /// Free-form search query.
    pub query: String,
    /// Offer type (`ask` for machines up for rent).
    pub offer_type: String,
}

impl Default for OfferQuery {
    fn default() -> Self {
        Self {
            query: "on-demand".to_string(),
            offer_type: "ask".to_string(),
        }
    }
}

/// Request to create an instance from an offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    /// Offer to accept.
    pub offer_id: String,
    /// Provider template to apply.
    pub template_id: u64,
    /// Container image to run.
    pub image: String,
    /// Client the contract is created for.
    pub client_id: String,
}

impl CreateInstanceRequest {
    /// Create a request for the authenticated account.
    #[must_use]
    pub fn new(offer_id: impl Into<String>, template_id: u64, image: impl Into<String>) -> Self {
        Self {
            offer_id: offer_id.into(),
            template_id,
            image: image.into(),
            client_id: "me".to_string(),
        }
    }
}

/// Trait for GPU rental providers.
#[async_trait]
pub trait GpuProvider: Send + Sync {
    /// Search on-demand offers.
    async fn list_offers(&self, query: &OfferQuery) -> Result<Vec<GpuOffer>, GpuProviderError>;

    /// Accept an offer, returning the new instance ID.
    async fn create_instance(&self, req: CreateInstanceRequest)
        -> Result<String, GpuProviderError>;

    /// List all instances of the account.
    async fn list_instances(&self) -> Result<Vec<GpuInstance>, GpuProviderError>;

    /// Get an instance by ID.
    async fn get_instance(&self, id: &str) -> Result<GpuInstance, GpuProviderError>;

    /// Destroy an instance.
    async fn delete_instance(&self, id: &str) -> Result<(), GpuProviderError>;

    /// Wait until an instance is listed with SSH details.
    ///
    /// Sleeps `initial_delay` before the first poll.
    async fn wait_ready(
        &self,
        id: &str,
        initial_delay: Duration,
        timeout_secs: u64,
    ) -> Result<GpuInstance, GpuProviderError>;
}
