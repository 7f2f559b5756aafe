// src/core/models.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use strum::{Display, EnumIter, EnumString};
use url::Url;

use crate::core::error::EngineError;

// --- Risk Levels ---

/// Risk level the engine attaches to every alert.
///
/// Variants are declared in ascending severity, so the derived `Ord` ranks
/// `Critical` highest and `Informational` lowest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
pub enum Risk {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

// --- Scan Target ---

/// The URL a single orchestration run is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget(String);

impl ScanTarget {
    /// Validates raw user input into a target.
    ///
    /// The trimmed input is kept verbatim (the engine scopes alerts by the
    /// exact base URL it was given), but it must parse as an absolute
    /// `http` or `https` URL.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidInput("URL is required".to_string()));
        }
        let parsed = Url::parse(trimmed)
            .map_err(|e| EngineError::InvalidInput(format!("'{}' is not a valid URL: {}", trimmed, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EngineError::InvalidInput(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Job Handles ---
// Crawl and active-scan identifiers live in separate engine namespaces, so
// each gets its own type and neither converts into the other.

/// Identifier of a spider (crawl) job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlHandle(String);

impl CrawlHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CrawlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an active-scan job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanHandle(String);

impl ScanHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Phase Status ---

/// Completion percentage of a running phase, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct PhaseStatus(u8);

impl PhaseStatus {
    pub const COMPLETE: PhaseStatus = PhaseStatus(100);

    pub fn new(percent: i64) -> Self {
        Self(percent.clamp(0, 100) as u8)
    }

    /// Reads the engine's `status` field, which arrives as a numeric string
    /// (`"57"`) or occasionally as a JSON number.
    pub fn from_engine_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.trim().parse::<i64>().ok().map(Self::new),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self::new),
            _ => None,
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self.0 == 100
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// --- Findings ---

/// One raw alert as reported by the engine.
///
/// Only `risk` and `description` are interpreted; every other field the
/// engine sends is kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub risk: Risk,
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Finding {
    pub fn new(risk: Risk, description: &str) -> Self {
        Self { risk, description: description.to_string(), extra: Map::new() }
    }
}

/// Per-level tally over a triaged finding list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RiskSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RiskSummary {
    pub fn tally<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Self {
        findings.into_iter().fold(Self::default(), |mut summary, finding| {
            match finding.risk {
                Risk::Critical => summary.critical += 1,
                Risk::High => summary.high += 1,
                Risk::Medium => summary.medium += 1,
                Risk::Low => summary.low += 1,
                Risk::Informational => {}
            }
            summary
        })
    }
}

// --- Main Report ---

/// Final, consolidated output of one scan run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriagedResult {
    pub scan_id: ScanHandle,
    pub alerts: Vec<Finding>,
    pub moderate_issues: usize,
    pub risk_summary: RiskSummary,
}
