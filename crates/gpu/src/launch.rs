//! End-to-end instance launch: search, rent, wait, verify.

use std::time::Duration;

use tracing::{info, warn};

use crate::providers::traits::{
    CreateInstanceRequest, GpuInstance, GpuOffer, GpuProvider, GpuProviderError, OfferQuery,
};
use crate::selection::{rank, OfferRanking};
use crate::verify::{check_directory, DirectoryCheck, RemoteShell, DEFAULT_SETTLE_SECS};

/// Template applied to new instances.
pub const DEFAULT_TEMPLATE_ID: u64 = 329_609;

/// Template used by cheapest-first launches.
pub const CHEAPEST_TEMPLATE_ID: u64 = 329_499;

/// Container image run on new instances.
pub const DEFAULT_IMAGE: &str = "almamoha/advance-deeplearning:torch2.8-cuda12.8-vastai";

/// Number of top offers kept in the report.
pub const DEFAULT_SHOW_TOP: usize = 5;

/// Default readiness timeout.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 600;

/// Launch settings.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Offer search parameters.
    pub query: OfferQuery,
    /// How offers are ranked.
    pub ranking: OfferRanking,
    /// Template to apply.
    pub template_id: u64,
    /// Container image.
    pub image: String,
    /// How many ranked offers to keep for display.
    pub show_top: usize,
    /// Sleep before the first readiness poll.
    pub initial_delay: Duration,
    /// Give up waiting for SSH details after this many seconds.
    pub ready_timeout_secs: u64,
    /// Directory to look for inside the container, if any.
    pub verify_path: Option<String>,
    /// Sleep before the SSH check.
    pub settle: Duration,
}

impl LaunchConfig {
    /// Defaults for a ranking.
    ///
    /// Network-ranked launches use the cloning template, get a longer head
    /// start before polling and check the cloned directory. Cheapest launches
    /// use the plain template and skip the check.
    #[must_use]
    pub fn for_ranking(ranking: OfferRanking) -> Self {
        let (template_id, initial_delay_secs, verify_path) = match ranking {
            OfferRanking::Cheapest => (CHEAPEST_TEMPLATE_ID, 10, None),
            OfferRanking::FastestNetwork => (
                DEFAULT_TEMPLATE_ID,
                45,
                Some(crate::verify::DEFAULT_WORKSPACE_DIR.to_string()),
            ),
        };

        Self {
            query: OfferQuery::default(),
            ranking,
            template_id,
            image: DEFAULT_IMAGE.to_string(),
            show_top: DEFAULT_SHOW_TOP,
            initial_delay: Duration::from_secs(initial_delay_secs),
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            verify_path,
            settle: Duration::from_secs(DEFAULT_SETTLE_SECS),
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self::for_ranking(OfferRanking::default())
    }
}

/// What a launch did.
#[derive(Debug, Clone)]
pub struct LaunchReport {
    /// Best ranked offers, the selected one first.
    pub candidates: Vec<GpuOffer>,
    /// Total on-demand offers found.
    pub offers_found: usize,
    /// The rented offer.
    pub offer: GpuOffer,
    /// ID of the new instance.
    pub instance_id: String,
    /// Instance details, `None` if SSH details never showed up.
    pub instance: Option<GpuInstance>,
    /// Checked directory and the result, `None` if skipped.
    pub directory: Option<(String, DirectoryCheck)>,
}

/// Runs a launch against a provider.
pub struct Launcher<'a> {
    provider: &'a dyn GpuProvider,
    shell: &'a dyn RemoteShell,
    config: LaunchConfig,
}

impl<'a> Launcher<'a> {
    /// Create a launcher.
    pub fn new(
        provider: &'a dyn GpuProvider,
        shell: &'a dyn RemoteShell,
        config: LaunchConfig,
    ) -> Self {
        Self {
            provider,
            shell,
            config,
        }
    }

    /// Search, rent the best offer, wait for it and check the directory.
    ///
    /// # Errors
    /// Returns error if no offer is available, the search or creation call
    /// fails, or polling fails for a reason other than the timeout.
    pub async fn run(&self) -> Result<LaunchReport, GpuProviderError> {
        let cfg = &self.config;

        info!(query = %cfg.query.query, ranking = %cfg.ranking, "Searching offers");
        let mut offers = self.provider.list_offers(&cfg.query).await?;
        if offers.is_empty() {
            return Err(GpuProviderError::NoOffersAvailable(cfg.query.query.clone()));
        }
        rank(&mut offers, cfg.ranking);

        let offers_found = offers.len();
        let offer = offers[0].clone();
        let candidates: Vec<GpuOffer> = offers.into_iter().take(cfg.show_top.max(1)).collect();
        info!(count = offers_found, "Found on-demand offers");
        for (i, candidate) in candidates.iter().enumerate() {
            info!(
                position = i + 1,
                offer_id = %candidate.id,
                gpu = %candidate.gpu_name,
                price_per_hour = candidate.price_per_hour,
                network_mbps = candidate.network_score(),
                "Candidate offer"
            );
        }
        info!(offer_id = %offer.id, gpu = %offer.gpu_name, "Selected offer");

        let instance_id = self
            .provider
            .create_instance(CreateInstanceRequest::new(
                offer.id.clone(),
                cfg.template_id,
                cfg.image.clone(),
            ))
            .await?;

        let instance = match self
            .provider
            .wait_ready(&instance_id, cfg.initial_delay, cfg.ready_timeout_secs)
            .await
        {
            Ok(instance) => Some(instance),
            Err(GpuProviderError::Timeout(secs)) => {
                warn!(instance_id = %instance_id, timeout_secs = secs, "SSH details not available yet");
                None
            }
            Err(e) => return Err(e),
        };

        let directory = match (&instance, &cfg.verify_path) {
            (Some(GpuInstance { ssh: Some(ssh), .. }), Some(path)) => {
                let check = check_directory(self.shell, ssh, path, cfg.settle).await;
                Some((path.clone(), check))
            }
            _ => None,
        };

        Ok(LaunchReport {
            candidates,
            offers_found,
            offer,
            instance_id,
            instance,
            directory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_depends_on_ranking() {
        let cheapest = LaunchConfig::for_ranking(OfferRanking::Cheapest);
        assert_eq!(cheapest.initial_delay, Duration::from_secs(10));
        assert_eq!(cheapest.template_id, 329_499);
        assert!(cheapest.verify_path.is_none());

        let fastest = LaunchConfig::default();
        assert_eq!(fastest.initial_delay, Duration::from_secs(45));
        assert_eq!(fastest.template_id, 329_609);
        assert_eq!(fastest.verify_path.as_deref(), Some("/workspace/smctm"));
    }
}
