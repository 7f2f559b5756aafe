// src/core/scanner/triage.rs

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::client::ResilientClient;
use crate::core::engine_api::EngineAction;
use crate::core::error::EngineError;
use crate::core::models::{Finding, Risk, RiskSummary, ScanHandle, ScanTarget, TriagedResult};

/// Fetches the engine's alerts for a finished scan and reduces them to the
/// list a person should actually look at.
#[derive(Debug, Clone)]
pub struct AlertTriage {
    client: Arc<ResilientClient>,
}

impl AlertTriage {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self { client }
    }

    /// Retrieves every alert the engine holds for `target`, in engine order.
    pub async fn fetch_findings(
        &self,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<Finding>, EngineError> {
        let action = EngineAction::Alerts;
        let body = self.client.call(action, Some(target.as_str()), cancel).await?;

        let alerts = match action.answer(&body) {
            Some(Value::Array(alerts)) => alerts,
            _ => {
                return Err(EngineError::EngineProtocol {
                    action: action.name(),
                    message: "response has no alerts array".to_string(),
                });
            }
        };

        let findings = alerts
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                serde_json::from_value::<Finding>(raw.clone()).map_err(|e| EngineError::EngineProtocol {
                    action: action.name(),
                    message: format!("alert #{} could not be decoded: {}", index, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(target = %target, count = findings.len(), "Fetched raw findings.");
        Ok(findings)
    }
}

/// Filters, deduplicates, and ranks raw findings.
///
/// 1. `Informational` findings are dropped.
/// 2. Findings sharing a `description` collapse to the first one seen.
/// 3. The rest are stable-sorted by descending risk, so equal-risk findings
///    keep their engine order.
///
/// The medium-risk count and the summary are taken over the triaged list.
/// Applying `normalize` to its own output yields the same result.
pub fn normalize(scan_id: ScanHandle, findings: impl IntoIterator<Item = Finding>) -> TriagedResult {
    let mut seen: HashSet<String> = HashSet::new();
    let mut alerts: Vec<Finding> = findings
        .into_iter()
        .filter(|finding| finding.risk != Risk::Informational)
        .filter(|finding| seen.insert(finding.description.clone()))
        .collect();

    // `sort_by` is stable.
    alerts.sort_by(|a, b| b.risk.cmp(&a.risk));

    let risk_summary = RiskSummary::tally(&alerts);
    debug!(scan_id = %scan_id, kept = alerts.len(), "Findings triaged.");

    TriagedResult {
        scan_id,
        moderate_issues: risk_summary.medium,
        alerts,
        risk_summary,
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

    fn f(risk: Risk, description: &str) -> Finding {
        Finding::new(risk, description)
    }

    fn tagged(risk: Risk, description: &str, tag: &str) -> Finding {
        let mut finding = Finding::new(risk, description);
        finding.extra.insert("tag".to_string(), json!(tag));
        finding
    }

    fn handle() -> ScanHandle {
        ScanHandle::new("s1")
    }

    #[test]
    fn informational_findings_are_dropped() {
        let result = normalize(
            handle(),
            vec![f(Risk::Informational, "a"), f(Risk::Low, "b"), f(Risk::Informational, "c")],
        );
        assert_eq!(result.alerts, vec![f(Risk::Low, "b")]);
        assert!(result.alerts.iter().all(|a| a.risk != Risk::Informational));
    }

    #[test]
    fn duplicates_keep_the_earliest_payload() {
        let result = normalize(
            handle(),
            vec![
                tagged(Risk::Medium, "xss", "first"),
                tagged(Risk::High, "sqli", "only"),
                tagged(Risk::Medium, "xss", "second"),
                tagged(Risk::High, "xss", "third"),
            ],
        );
        let xss: Vec<_> = result.alerts.iter().filter(|a| a.description == "xss").collect();
        assert_eq!(xss.len(), 1);
        assert_eq!(xss[0].extra["tag"], json!("first"));
        assert_eq!(xss[0].risk, Risk::Medium);
    }

    #[test]
    fn an_informational_duplicate_does_not_shadow_a_real_finding() {
        let result = normalize(handle(), vec![f(Risk::Informational, "dup"), f(Risk::Low, "dup")]);
        assert_eq!(result.alerts, vec![f(Risk::Low, "dup")]);
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let result = normalize(
            handle(),
            vec![
                f(Risk::Low, "l1"),
                f(Risk::High, "h1"),
                f(Risk::Medium, "m1"),
                f(Risk::Critical, "c1"),
                f(Risk::Low, "l2"),
                f(Risk::High, "h2"),
                f(Risk::Medium, "m2"),
            ],
        );
        let order: Vec<&str> = result.alerts.iter().map(|a| a.description.as_str()).collect();
        assert_eq!(order, vec!["c1", "h1", "h2", "m1", "m2", "l1", "l2"]);
        assert_eq!(result.moderate_issues, 2);
        assert_eq!(
            result.risk_summary,
            RiskSummary { critical: 1, high: 2, medium: 2, low: 2 }
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = vec![
            f(Risk::Medium, "y"),
            f(Risk::Informational, "x"),
            f(Risk::High, "z"),
            f(Risk::Medium, "y"),
            f(Risk::Low, "w"),
            f(Risk::High, "v"),
        ];
        let once = normalize(handle(), input);
        let twice = normalize(handle(), once.alerts.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn medium_count_is_taken_after_dedup() {
        let result = normalize(
            handle(),
            vec![f(Risk::Medium, "y"), f(Risk::Medium, "y"), f(Risk::Medium, "y2")],
        );
        assert_eq!(result.moderate_issues, 2);
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = normalize(handle(), Vec::new());
        assert!(result.alerts.is_empty());
        assert_eq!(result.moderate_issues, 0);
        assert_eq!(result.risk_summary, RiskSummary::default());
    }

    fn triage_for(server: &MockServer) -> AlertTriage {
        let client = ResilientClient::new(
            Url::parse(&server.uri()).unwrap(),
            "key",
            RetryPolicy { attempts: 2, delay: Duration::from_millis(5) },
            Duration::from_secs(5),
        )
        .unwrap();
        AlertTriage::new(Arc::new(client))
    }

    #[tokio::test]
    async fn fetch_findings_scopes_by_base_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/JSON/core/view/alerts/"))
            .and(query_param("baseurl", "http://example.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [
                    { "risk": "Low", "description": "cookie flags", "alertRef": "10010" },
                    { "risk": "High", "description": "sqli", "alertRef": "40018" }
                ]
            })))
            .mount(&server)
            .await;

        let target = ScanTarget::parse("http://example.test").unwrap();
        let findings = triage_for(&server)
            .fetch_findings(&target, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[1].risk, Risk::High);
        assert_eq!(findings[0].extra["alertRef"], json!("10010"));
    }

    #[tokio::test]
    async fn fetch_findings_without_alerts_array_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/JSON/core/view/alerts/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "alerts": "none" })))
            .mount(&server)
            .await;

        let target = ScanTarget::parse("http://example.test").unwrap();
        let error = triage_for(&server)
            .fetch_findings(&target, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "engine_protocol");
    }

    #[tokio::test]
    async fn fetch_findings_rejects_an_unknown_risk_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/JSON/core/view/alerts/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [{ "risk": "Catastrophic", "description": "?" }]
            })))
            .mount(&server)
            .await;

        let target = ScanTarget::parse("http://example.test").unwrap();
        let error = triage_for(&server)
            .fetch_findings(&target, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(error, EngineError::EngineProtocol { .. }));
    }
}
