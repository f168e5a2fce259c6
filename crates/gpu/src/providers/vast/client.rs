//! Vast.ai API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::models::{
    CreateInstanceBody, CreateInstanceResponse, InstancesResponse, OffersResponse, VastInstance,
    VastOffer,
};
use crate::providers::traits::{
    CreateInstanceRequest, GpuInstance, GpuOffer, GpuProvider, GpuProviderError, InstanceStatus,
    OfferQuery, SshEndpoint,
};

/// Base URL for the Vast.ai API.
pub const API_BASE_URL: &str = "https://cloud.vast.ai/api/v0";

/// Web console listing the account's instances.
pub const CONSOLE_URL: &str = "https://console.vast.ai/instances";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Polling interval when waiting for an instance.
const POLL_INTERVAL_SECS: u64 = 10;

/// Error bodies are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Vast.ai GPU rental provider.
#[derive(Clone)]
pub struct Vast {
    /// HTTP client.
    client: Client,
    /// API token for authentication.
    api_token: String,
    /// API base URL.
    base_url: String,
    /// Delay between readiness polls.
    poll_interval: Duration,
}

impl Vast {
    /// Create a new Vast.ai provider.
    ///
    /// # Arguments
    /// * `api_token` - Vast.ai API token
    ///
    /// # Errors
    /// Returns error if the token is empty or the HTTP client cannot be created.
    pub fn new(api_token: impl Into<String>) -> Result<Self, GpuProviderError> {
        Self::with_base_url(api_token, API_BASE_URL)
    }

    /// Create a provider against a different API root (mirrors, tests).
    ///
    /// # Errors
    /// Returns error if the token is empty or the HTTP client cannot be created.
    pub fn with_base_url(
        api_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GpuProviderError> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(GpuProviderError::Config(
                "Vast.ai API token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
        })
    }

    /// Override the readiness polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GpuProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(query)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated PUT request.
    async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, GpuProviderError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "PUT request");

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated DELETE request.
    async fn delete(&self, path: &str) -> Result<(), GpuProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "DELETE request");

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(GpuProviderError::Api {
                status: status.as_u16(),
                message: truncate(&text),
            })
        }
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GpuProviderError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %truncate(&text), "Failed to parse response");
                GpuProviderError::Serialization(e)
            })
        } else if status == StatusCode::NOT_FOUND {
            Err(GpuProviderError::NotFound(truncate(&text)))
        } else {
            Err(GpuProviderError::Api {
                status: status.as_u16(),
                message: truncate(&text),
            })
        }
    }

    /// Fetch the raw instance list.
    async fn fetch_instances(&self) -> Result<Vec<VastInstance>, GpuProviderError> {
        let response: InstancesResponse = self.get("/asks/", &[]).await?;
        Ok(response.asks)
    }

    /// Convert an API offer to our `GpuOffer` type.
    fn to_gpu_offer(offer: &VastOffer) -> Option<GpuOffer> {
        Some(GpuOffer {
            id: offer.id.clone()?,
            gpu_name: offer
                .gpu_name
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            gpu_count: offer.num_gpus.unwrap_or(1),
            price_per_hour: offer.dph_total.unwrap_or(0.0),
            ram_gb: offer.ram.unwrap_or(0.0) / 1024.0,
            disk_gb: offer.disk_space.unwrap_or(0.0),
            inet_up_mbps: offer.inet_up.unwrap_or(0.0),
            inet_down_mbps: offer.inet_down.unwrap_or(0.0),
            bandwidth_mbps: offer.bandwidth.unwrap_or(0.0),
            on_demand: offer.on_demand.unwrap_or(false),
        })
    }

    /// Convert an API instance to our `GpuInstance` type.
    fn to_gpu_instance(instance: &VastInstance) -> GpuInstance {
        let status = instance
            .actual_status
            .as_deref()
            .or(instance.state.as_deref())
            .map_or(InstanceStatus::Unknown, InstanceStatus::from_api);

        let ssh = non_empty(instance.ssh_host.as_deref())
            .or_else(|| non_empty(instance.public_ipaddr.as_deref()))
            .map(|host| SshEndpoint {
                host: host.to_string(),
                port: instance.ssh_port.unwrap_or(SshEndpoint::DEFAULT_PORT),
            });

        GpuInstance {
            id: instance
                .id
                .clone()
                .or_else(|| instance.new_contract.clone())
                .or_else(|| instance.job_id.clone())
                .unwrap_or_default(),
            status,
            image: instance.image.clone(),
            ssh,
            jupyter_url: instance.jupyter_url.clone(),
            started_at: instance.start_date.and_then(epoch_to_utc),
        }
    }
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

fn non_empty(host: Option<&str>) -> Option<&str> {
    host.filter(|h| !h.trim().is_empty())
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl GpuProvider for Vast {
    async fn list_offers(&self, query: &OfferQuery) -> Result<Vec<GpuOffer>, GpuProviderError> {
        let response: OffersResponse = self
            .get(
                "/offers/",
                &[("q", query.query.as_str()), ("type", query.offer_type.as_str())],
            )
            .await?;

        let total = response.offers.len();
        let offers: Vec<GpuOffer> = response
            .offers
            .iter()
            .filter_map(Self::to_gpu_offer)
            .filter(|offer| offer.on_demand)
            .collect();

        debug!(total, on_demand = offers.len(), "Fetched offers");
        Ok(offers)
    }

    async fn create_instance(
        &self,
        req: CreateInstanceRequest,
    ) -> Result<String, GpuProviderError> {
        info!(
            offer_id = %req.offer_id,
            template_id = req.template_id,
            image = %req.image,
            "Creating instance"
        );

        let body = CreateInstanceBody {
            client_id: req.client_id,
            template_id: req.template_id,
            image: req.image,
        };

        let response: CreateInstanceResponse = self
            .put(&format!("/asks/{}/", req.offer_id), &body)
            .await?;

        let id = response
            .instance_id()
            .map(ToString::to_string)
            .ok_or_else(|| GpuProviderError::MissingInstanceId(req.offer_id.clone()))?;

        info!(instance_id = %id, "Instance created");
        Ok(id)
    }

    async fn list_instances(&self) -> Result<Vec<GpuInstance>, GpuProviderError> {
        let instances = self.fetch_instances().await?;
        Ok(instances.iter().map(Self::to_gpu_instance).collect())
    }

    async fn get_instance(&self, id: &str) -> Result<GpuInstance, GpuProviderError> {
        let instances = self.fetch_instances().await?;
        instances
            .iter()
            .find(|inst| inst.matches(id))
            .map(Self::to_gpu_instance)
            .ok_or_else(|| GpuProviderError::NotFound(format!("instance {id}")))
    }

    async fn delete_instance(&self, id: &str) -> Result<(), GpuProviderError> {
        info!(instance_id = %id, "Destroying instance");
        self.delete(&format!("/instances/{id}/")).await?;
        info!(instance_id = %id, "Instance destroyed");
        Ok(())
    }

    async fn wait_ready(
        &self,
        id: &str,
        initial_delay: Duration,
        timeout_secs: u64,
    ) -> Result<GpuInstance, GpuProviderError> {
        info!(
            instance_id = %id,
            initial_delay_secs = initial_delay.as_secs(),
            timeout_secs,
            "Waiting for instance to be ready"
        );

        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        tokio::time::sleep(initial_delay).await;

        loop {
            match self.get_instance(id).await {
                Ok(instance) if instance.ssh.is_some() => {
                    info!(instance_id = %id, status = %instance.status, "Instance is ready");
                    return Ok(instance);
                }
                Ok(instance) => {
                    debug!(
                        instance_id = %id,
                        status = %instance.status,
                        elapsed_secs = start.elapsed().as_secs(),
                        "SSH details not available yet"
                    );
                }
                Err(GpuProviderError::NotFound(_)) => {
                    debug!(
                        instance_id = %id,
                        elapsed_secs = start.elapsed().as_secs(),
                        "Instance not listed yet"
                    );
                }
                Err(e) => return Err(e),
            }

            if start.elapsed() > timeout {
                return Err(GpuProviderError::Timeout(timeout_secs));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_provider_requires_token() {
        assert!(matches!(
            Vast::new("  "),
            Err(GpuProviderError::Config(_))
        ));
        assert!(Vast::new("token").is_ok());
    }

    #[test]
    fn test_to_gpu_offer_converts_units() {
        let raw: VastOffer = serde_json::from_str(
            r#"{"id": 77, "gpu_name": "RTX 3090", "num_gpus": 2, "dph_total": 0.5,
                "ram": 65536, "disk_space": 120.0, "inet_up": 10.0, "inet_down": 20.0,
                "bandwidth": null, "on_demand": true}"#,
        )
        .unwrap();

        let offer = Vast::to_gpu_offer(&raw).unwrap();
        assert_eq!(offer.id, "77");
        assert_eq!(offer.gpu_count, 2);
        assert!((offer.ram_gb - 64.0).abs() < f64::EPSILON);
        assert!((offer.network_score() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_gpu_offer_skips_missing_id() {
        let raw: VastOffer = serde_json::from_str(r#"{"gpu_name": "A100"}"#).unwrap();
        assert!(Vast::to_gpu_offer(&raw).is_none());
    }

    #[test]
    fn test_to_gpu_instance_falls_back_to_public_ip() {
        let raw: VastInstance = serde_json::from_str(
            r#"{"id": 9, "state": "running", "public_ipaddr": "1.2.3.4", "start_date": 1700000000.5}"#,
        )
        .unwrap();

        let inst = Vast::to_gpu_instance(&raw);
        assert_eq!(inst.status, InstanceStatus::Running);
        let ssh = inst.ssh.unwrap();
        assert_eq!(ssh.host, "1.2.3.4");
        assert_eq!(ssh.port, 22);
        assert_eq!(inst.started_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_empty_ssh_host_uses_public_ip() {
        let raw: VastInstance = serde_json::from_str(
            r#"{"id": 9, "ssh_host": "", "ssh_port": 41022, "public_ipaddr": "1.2.3.4"}"#,
        )
        .unwrap();

        let ssh = Vast::to_gpu_instance(&raw).ssh.unwrap();
        assert_eq!(ssh.host, "1.2.3.4");
        assert_eq!(ssh.port, 41022);
    }

    #[test]
    fn test_actual_status_wins_over_state() {
        let raw: VastInstance =
            serde_json::from_str(r#"{"id": 1, "actual_status": "loading", "state": "running"}"#)
                .unwrap();
        let inst = Vast::to_gpu_instance(&raw);
        assert_eq!(inst.status, InstanceStatus::Loading);
        assert!(inst.ssh.is_none());
    }

    #[test]
    fn test_truncate_error_body() {
        let long = "x".repeat(2_000);
        assert_eq!(truncate(&long).len(), MAX_ERROR_BODY_CHARS);
    }
}
