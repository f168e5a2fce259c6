//! Vast.ai REST API models.
//!
//! The API is loosely typed: IDs arrive as numbers or strings and most
//! numeric fields may be `null`, so everything optional is modeled as such.

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Wire helpers
// ============================================================================

/// Deserialize an ID that may be a JSON number or string.
fn flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Offer types
// ============================================================================

/// Response of `GET /offers/`.
#[derive(Debug, Deserialize)]
pub struct OffersResponse {
    /// Matching offers.
    #[serde(default)]
    pub offers: Vec<VastOffer>,
}

/// A single offer (ask) from the marketplace.
#[derive(Debug, Deserialize)]
pub struct VastOffer {
    /// Offer ID.
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    /// GPU model name.
    pub gpu_name: Option<String>,
    /// Number of GPUs.
    pub num_gpus: Option<u32>,
    /// Total price per hour in USD.
    pub dph_total: Option<f64>,
    /// RAM in MB.
    pub ram: Option<f64>,
    /// Disk space in GB.
    pub disk_space: Option<f64>,
    /// Upload speed in Mbps.
    pub inet_up: Option<f64>,
    /// Download speed in Mbps.
    pub inet_down: Option<f64>,
    /// Advertised bandwidth in Mbps.
    pub bandwidth: Option<f64>,
    /// Whether the offer is rentable on demand.
    pub on_demand: Option<bool>,
}

// ============================================================================
// Instance types
// ============================================================================

/// Request body for `PUT /asks/{id}/`.
#[derive(Debug, Serialize)]
pub struct CreateInstanceBody {
    /// Client to create the contract for (`me`).
    pub client_id: String,
    /// Template to apply.
    pub template_id: u64,
    /// Container image.
    pub image: String,
}

/// Response of `PUT /asks/{id}/`.
#[derive(Debug, Deserialize)]
pub struct CreateInstanceResponse {
    /// Whether the API reports success.
    pub success: Option<bool>,
    /// New contract (instance) ID.
    #[serde(default, deserialize_with = "flexible_id")]
    pub new_contract: Option<String>,
    /// Alternate ID field.
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    /// Alternate job ID field.
    #[serde(default, deserialize_with = "flexible_id")]
    pub job_id: Option<String>,
}

impl CreateInstanceResponse {
    /// The instance ID, checking each field the API may use.
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        self.new_contract
            .as_deref()
            .or(self.id.as_deref())
            .or(self.job_id.as_deref())
    }
}

/// Response of `GET /asks/`.
#[derive(Debug, Deserialize)]
pub struct InstancesResponse {
    /// Instances of the account.
    #[serde(default)]
    pub asks: Vec<VastInstance>,
}

/// An instance as listed by the API.
#[derive(Debug, Deserialize)]
pub struct VastInstance {
    /// Instance ID.
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    /// Job ID.
    #[serde(default, deserialize_with = "flexible_id")]
    pub job_id: Option<String>,
    /// Contract ID returned at creation.
    #[serde(default, deserialize_with = "flexible_id")]
    pub new_contract: Option<String>,
    /// Container status.
    pub actual_status: Option<String>,
    /// Legacy status field.
    pub state: Option<String>,
    /// Container image.
    pub image: Option<String>,
    /// SSH proxy host.
    pub ssh_host: Option<String>,
    /// Public IP of the machine.
    pub public_ipaddr: Option<String>,
    /// SSH port.
    pub ssh_port: Option<u16>,
    /// Jupyter URL.
    pub jupyter_url: Option<String>,
    /// Start time as Unix seconds.
    pub start_date: Option<f64>,
}

impl VastInstance {
    /// Whether any of the instance's ID fields equals `id`.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        [&self.id, &self.job_id, &self.new_contract]
            .into_iter()
            .any(|field| field.as_deref() == Some(id))
    }
}
