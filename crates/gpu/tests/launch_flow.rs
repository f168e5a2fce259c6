//! End-to-end launch flow against a mock API and a scripted shell.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gpu::launch::{LaunchConfig, Launcher};
use gpu::providers::vast::Vast;
use gpu::verify::{DirectoryCheck, RemoteShell, VerifyError};
use gpu::{GpuProviderError, OfferRanking, SshEndpoint};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers every command with the same output and records the endpoints used.
struct FixedShell {
    output: String,
    endpoints: Mutex<Vec<SshEndpoint>>,
}

impl FixedShell {
    fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            endpoints: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteShell for FixedShell {
    async fn run(&self, endpoint: &SshEndpoint, _command: &str) -> Result<String, VerifyError> {
        self.endpoints.lock().unwrap().push(endpoint.clone());
        Ok(self.output.clone())
    }
}

fn fast_config(ranking: OfferRanking) -> LaunchConfig {
    let mut config = LaunchConfig::for_ranking(ranking);
    config.initial_delay = Duration::ZERO;
    config.settle = Duration::ZERO;
    config.ready_timeout_secs = 5;
    config
}

async fn mount_offers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/offers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offers": [
                {"id": 10, "gpu_name": "cheap", "dph_total": 0.10, "on_demand": true,
                 "inet_up": 20.0, "inet_down": 30.0},
                {"id": 11, "gpu_name": "fast", "dph_total": 0.90, "on_demand": true,
                 "bandwidth": 5000.0},
                {"id": 12, "gpu_name": "middle", "dph_total": 0.40, "on_demand": true,
                 "inet_up": 400.0, "inet_down": 400.0}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_instance(server: &MockServer, offer_id: &str, template_id: u64, contract: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("/asks/{offer_id}/")))
        .and(body_partial_json(json!({"template_id": template_id})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "new_contract": contract})),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/asks/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "asks": [{"id": contract, "actual_status": "running",
                      "public_ipaddr": "10.0.0.5", "ssh_port": 40022}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn launch_rents_fastest_offer_and_checks_directory() {
    let server = MockServer::start().await;
    mount_offers(&server).await;
    mount_instance(&server, "11", 329_609, 777).await;

    let vast = Vast::with_base_url("token", server.uri())
        .unwrap()
        .with_poll_interval(Duration::from_millis(10));
    let shell = FixedShell::new("drwxr-xr-x .git\n");

    let report = Launcher::new(&vast, &shell, fast_config(OfferRanking::FastestNetwork))
        .run()
        .await
        .unwrap();

    assert_eq!(report.offer.id, "11");
    assert_eq!(report.offers_found, 3);
    let order: Vec<_> = report.candidates.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(order, ["11", "12", "10"]);
    assert_eq!(report.instance_id, "777");

    let (checked, outcome) = report.directory.unwrap();
    assert_eq!(checked, "/workspace/smctm");
    assert!(matches!(outcome, DirectoryCheck::Present { .. }));

    let endpoints = shell.endpoints.lock().unwrap();
    assert_eq!(endpoints[0].host, "10.0.0.5");
    assert_eq!(endpoints[0].port, 40022);
}

#[tokio::test]
async fn launch_cheapest_skips_verification_by_default() {
    let server = MockServer::start().await;
    mount_offers(&server).await;
    mount_instance(&server, "10", 329_499, 555).await;

    let vast = Vast::with_base_url("token", server.uri()).unwrap();
    let shell = FixedShell::new("");

    let report = Launcher::new(&vast, &shell, fast_config(OfferRanking::Cheapest))
        .run()
        .await
        .unwrap();

    assert_eq!(report.offer.id, "10");
    assert!(report.instance.is_some());
    assert!(report.directory.is_none());
    assert!(shell.endpoints.lock().unwrap().is_empty());
}

#[tokio::test]
async fn launch_reports_missing_ssh_details_without_failing() {
    let server = MockServer::start().await;
    mount_offers(&server).await;
    Mock::given(method("PUT"))
        .and(path("/asks/11/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"new_contract": 888})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/asks/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "asks": [{"id": 888, "actual_status": "loading", "ssh_host": ""}]
        })))
        .expect(1..)
        .mount(&server)
        .await;

    let vast = Vast::with_base_url("token", server.uri()).unwrap();
    let shell = FixedShell::new("drwxr-xr-x .git\n");
    let mut config = fast_config(OfferRanking::FastestNetwork);
    config.ready_timeout_secs = 0;

    let report = Launcher::new(&vast, &shell, config).run().await.unwrap();

    assert_eq!(report.offer.id, "11");
    assert_eq!(report.instance_id, "888");
    assert!(report.instance.is_none());
    assert!(report.directory.is_none());
    assert!(shell.endpoints.lock().unwrap().is_empty());
}

#[tokio::test]
async fn launch_without_offers_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/offers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offers": [{"id": 1, "on_demand": false}]
        })))
        .mount(&server)
        .await;

    let vast = Vast::with_base_url("token", server.uri()).unwrap();
    let shell = FixedShell::new("");

    let err = Launcher::new(&vast, &shell, fast_config(OfferRanking::Cheapest))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, GpuProviderError::NoOffersAvailable(_)));
}
