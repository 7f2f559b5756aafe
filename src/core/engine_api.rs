//! Static, read-only description of every engine action this service uses.
//!
//! The engine exposes its JSON API as `JSON/<component>/<view|action>/<name>/`
//! with the API key and one scoping parameter in the query string. Keeping the
//! paths, parameter names, and answer fields in one table means the
//! coordinators never spell out a URL themselves.

use serde_json::Value;
use std::fmt;

/// The engine calls issued by the coordinators, the progress reporter, and
/// the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    SpiderScan,
    SpiderStatus,
    ActiveScan,
    ActiveScanStatus,
    Alerts,
    Version,
}

/// Everything needed to address one engine action and read its answer.
#[derive(Debug)]
pub struct EndpointDetail {
    /// The action this entry describes; must match the entry's table position.
    pub action: EngineAction,
    /// Path relative to the engine base URL.
    pub path: &'static str,
    /// Query parameter carrying the target URL or job identifier, if any.
    pub param: Option<&'static str>,
    /// JSON field the engine puts the answer in.
    pub answer_field: &'static str,
    /// Older engine builds name the start-call identifier differently.
    pub fallback_field: Option<&'static str>,
}

/// Indexed by `EngineAction as usize`.
static ENDPOINTS: [EndpointDetail; 6] = [
    EndpointDetail {
        action: EngineAction::SpiderScan,
        path: "JSON/spider/action/scan/",
        param: Some("url"),
        answer_field: "scan",
        fallback_field: Some("scanId"),
    },
    EndpointDetail {
        action: EngineAction::SpiderStatus,
        path: "JSON/spider/view/status/",
        param: Some("scanId"),
        answer_field: "status",
        fallback_field: None,
    },
    EndpointDetail {
        action: EngineAction::ActiveScan,
        path: "JSON/ascan/action/scan/",
        param: Some("url"),
        answer_field: "scan",
        fallback_field: Some("scanId"),
    },
    EndpointDetail {
        action: EngineAction::ActiveScanStatus,
        path: "JSON/ascan/view/status/",
        param: Some("scanId"),
        answer_field: "status",
        fallback_field: None,
    },
    EndpointDetail {
        action: EngineAction::Alerts,
        path: "JSON/core/view/alerts/",
        param: Some("baseurl"),
        answer_field: "alerts",
        fallback_field: None,
    },
    EndpointDetail {
        action: EngineAction::Version,
        path: "JSON/core/view/version/",
        param: None,
        answer_field: "version",
        fallback_field: None,
    },
];

impl EngineAction {
    pub fn detail(self) -> &'static EndpointDetail {
        &ENDPOINTS[self as usize]
    }

    /// Short name used in logs and error messages, e.g. `spider/action/scan`.
    pub fn name(self) -> &'static str {
        let path = self.detail().path;
        path.trim_start_matches("JSON/").trim_end_matches('/')
    }

    /// Picks the answer field out of a decoded response body.
    pub fn answer(self, body: &Value) -> Option<&Value> {
        let detail = self.detail();
        body.get(detail.answer_field)
            .or_else(|| detail.fallback_field.and_then(|field| body.get(field)))
            .filter(|value| !value.is_null())
    }
}

impl fmt::Display for EngineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
