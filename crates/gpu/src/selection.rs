//! Offer ranking.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::providers::traits::GpuOffer;

/// How to order offers when picking one to rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OfferRanking {
    /// Lowest hourly price first.
    Cheapest,
    /// Highest network throughput first.
    #[default]
    FastestNetwork,
}

impl std::fmt::Display for OfferRanking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cheapest => write!(f, "cheapest"),
            Self::FastestNetwork => write!(f, "fastest-network"),
        }
    }
}

/// Sort offers best-first. Ties keep the API's order.
pub fn rank(offers: &mut [GpuOffer], ranking: OfferRanking) {
    match ranking {
        OfferRanking::Cheapest => {
            offers.sort_by(|a, b| a.price_per_hour.total_cmp(&b.price_per_hour));
        }
        OfferRanking::FastestNetwork => {
            offers.sort_by(|a, b| b.network_score().total_cmp(&a.network_score()));
        }
    }
}

/// Pick the best offer, if any.
#[must_use]
pub fn select_best(mut offers: Vec<GpuOffer>, ranking: OfferRanking) -> Option<GpuOffer> {
    rank(&mut offers, ranking);
    offers.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: &str, price: f64, up: f64, down: f64, bandwidth: f64) -> GpuOffer {
        GpuOffer {
            id: id.to_string(),
            gpu_name: "RTX 4090".to_string(),
            gpu_count: 1,
            price_per_hour: price,
            ram_gb: 32.0,
            disk_gb: 50.0,
            inet_up_mbps: up,
            inet_down_mbps: down,
            bandwidth_mbps: bandwidth,
            on_demand: true,
        }
    }

    #[test]
    fn test_cheapest_sorts_ascending_price() {
        let mut offers = vec![
            offer("a", 0.9, 0.0, 0.0, 0.0),
            offer("b", 0.2, 0.0, 0.0, 0.0),
            offer("c", 0.5, 0.0, 0.0, 0.0),
        ];
        rank(&mut offers, OfferRanking::Cheapest);
        let ids: Vec<_> = offers.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn test_fastest_network_uses_bandwidth_then_sum() {
        let offers = vec![
            offer("slow", 0.1, 50.0, 50.0, 0.0),
            offer("wide", 0.3, 10.0, 10.0, 2_000.0),
            offer("sum", 0.2, 600.0, 900.0, 0.0),
        ];
        let best = select_best(offers.clone(), OfferRanking::FastestNetwork).unwrap();
        assert_eq!(best.id, "wide");

        let mut ranked = offers;
        rank(&mut ranked, OfferRanking::FastestNetwork);
        let ids: Vec<_> = ranked.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["wide", "sum", "slow"]);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let mut offers = vec![
            offer("first", 0.3, 0.0, 0.0, 0.0),
            offer("second", 0.3, 0.0, 0.0, 0.0),
        ];
        rank(&mut offers, OfferRanking::Cheapest);
        assert_eq!(offers[0].id, "first");
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(Vec::new(), OfferRanking::Cheapest).is_none());
    }
}
