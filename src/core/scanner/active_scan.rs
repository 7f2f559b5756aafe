// src/core/scanner/active_scan.rs

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::phase::{self, PollPolicy};
use crate::core::client::ResilientClient;
use crate::core::engine_api::EngineAction;
use crate::core::error::EngineError;
use crate::core::models::{ScanHandle, ScanTarget};

const PHASE: &str = "active scan";

/// Drives the engine's active-probe phase.
///
/// Must only be started once the crawl of the same target has reached 100%;
/// enforcing that ordering is the orchestrator's job.
#[derive(Debug, Clone)]
pub struct ActiveScanCoordinator {
    client: Arc<ResilientClient>,
    poll: PollPolicy,
}

impl ActiveScanCoordinator {
    pub fn new(client: Arc<ResilientClient>, poll: PollPolicy) -> Self {
        Self { client, poll }
    }

    pub async fn start_active_scan(
        &self,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<ScanHandle, EngineError> {
        info!(target = %target, "Starting active scan.");
        let id = phase::start_job(&self.client, EngineAction::ActiveScan, target, cancel).await?;
        info!(target = %target, scan_id = %id, "Active scan started.");
        Ok(ScanHandle::new(id))
    }

    pub async fn await_active_scan_completion(
        &self,
        handle: &ScanHandle,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        phase::await_completion(
            &self.client,
            PHASE,
            EngineAction::ActiveScanStatus,
            handle.as_str(),
            self.poll,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coordinator(server: &MockServer, poll: PollPolicy) -> ActiveScanCoordinator {
        let client = ResilientClient::new(
            Url::parse(&server.uri()).unwrap(),
            "key",
            RetryPolicy { attempts: 3, delay: Duration::from_millis(5) },
            Duration::from_secs(5),
        )
        .unwrap();
        ActiveScanCoordinator::new(Arc::new(client), poll)
    }

    fn quick_poll(max_polls: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_polls,
            deadline: Duration::from_secs(10),
        }
    }

    async fn mount_status(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/JSON/ascan/view/status/"))
            .and(query_param("scanId", "s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn start_active_scan_accepts_numeric_identifiers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/JSON/ascan/action/scan/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scan": 12 })))
            .mount(&server)
            .await;

        let target = ScanTarget::parse("https://example.test/app").unwrap();
        let handle = coordinator(&server, quick_poll(5))
            .start_active_scan(&target, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "12");
    }

    #[tokio::test]
    async fn polling_gives_up_after_the_poll_budget() {
        let server = MockServer::start().await;
        mount_status(&server, json!({ "status": "40" })).await;

        let error = coordinator(&server, quick_poll(3))
            .await_active_scan_completion(&ScanHandle::new("s1"), &CancellationToken::new())
            .await
            .unwrap_err();
        match error {
            EngineError::PollLimitExceeded { phase, polls, .. } => {
                assert_eq!(phase, "active scan");
                assert_eq!(polls, 3);
            }
            other => panic!("expected poll limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn polling_respects_the_deadline() {
        let server = MockServer::start().await;
        mount_status(&server, json!({ "status": "40" })).await;

        let poll = PollPolicy {
            interval: Duration::from_millis(50),
            max_polls: 1000,
            deadline: Duration::from_millis(120),
        };
        let error = coordinator(&server, poll)
            .await_active_scan_completion(&ScanHandle::new("s1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "poll_limit_exceeded");
    }

    #[tokio::test]
    async fn polling_stops_on_cancellation() {
        let server = MockServer::start().await;
        mount_status(&server, json!({ "status": "5" })).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let poll = PollPolicy {
            interval: Duration::from_millis(10),
            max_polls: u32::MAX,
            deadline: Duration::from_secs(600),
        };
        let error = coordinator(&server, poll)
            .await_active_scan_completion(&ScanHandle::new("s1"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::Cancelled(_)));
    }

    #[tokio::test]
    async fn a_failed_status_query_inside_the_budget_does_not_fail_the_phase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/JSON/ascan/view/status/"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_status(&server, json!({ "status": "100" })).await;

        coordinator(&server, quick_poll(5))
            .await_active_scan_completion(&ScanHandle::new("s1"), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_status_field_is_a_protocol_error() {
        let server = MockServer::start().await;
        mount_status(&server, json!({ "state": "RUNNING" })).await;

        let error = coordinator(&server, quick_poll(5))
            .await_active_scan_completion(&ScanHandle::new("s1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "engine_protocol");
    }
}
