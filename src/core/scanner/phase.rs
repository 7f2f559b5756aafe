// src/core/scanner/phase.rs

use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::client::ResilientClient;
use crate::core::engine_api::EngineAction;
use crate::core::error::EngineError;
use crate::core::models::{PhaseStatus, ScanTarget};

/// Bounds for one completion-polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two status queries.
    pub interval: Duration,
    /// Maximum number of status queries before giving up.
    pub max_polls: u32,
    /// Wall-clock budget for the whole loop.
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: 3600,
            deadline: Duration::from_secs(3600),
        }
    }
}

/// Issues a start action and returns the job identifier the engine assigned.
///
/// The engine sends the identifier as a string, though some builds send a
/// bare number; anything else is a protocol error and is not retried.
pub(crate) async fn start_job(
    client: &ResilientClient,
    action: EngineAction,
    target: &ScanTarget,
    cancel: &CancellationToken,
) -> Result<String, EngineError> {
    let body = client.call(action, Some(target.as_str()), cancel).await?;
    match action.answer(&body) {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(EngineError::EngineProtocol {
            action: action.name(),
            message: format!("response carries no job identifier: {}", body),
        }),
    }
}

/// Reads the status of one job, each query going through the client's retry policy.
pub(crate) async fn query_status(
    client: &ResilientClient,
    action: EngineAction,
    handle: &str,
    cancel: &CancellationToken,
) -> Result<Option<PhaseStatus>, EngineError> {
    let body = client.call(action, Some(handle), cancel).await?;
    Ok(action.answer(&body).and_then(PhaseStatus::from_engine_value))
}

/// Polls `action` for `handle` until the engine reports 100%.
///
/// A status query that fails inside the retry budget is absorbed by the
/// client; only an exhausted budget (or a missing `status` field) ends the
/// loop with an error. The loop also ends with `PollLimitExceeded` once
/// `max_polls` queries or the deadline are used up, and with `Cancelled` as
/// soon as `cancel` fires during the pause between queries.
pub(crate) async fn await_completion(
    client: &ResilientClient,
    phase: &'static str,
    action: EngineAction,
    handle: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let started = Instant::now();
    let mut last_seen = PhaseStatus::default();
    let mut polls = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled(phase));
        }
        polls += 1;

        let status = query_status(client, action, handle, cancel)
            .await?
            .ok_or_else(|| EngineError::EngineProtocol {
                action: action.name(),
                message: format!("no usable status for job {}", handle),
            })?;

        if status < last_seen {
            warn!(phase, handle, previous = %last_seen, current = %status, "Engine reported progress going backwards.");
        }
        last_seen = status;
        debug!(phase, handle, progress = %status, polls, "Polled phase status.");

        if status.is_complete() {
            info!(phase, handle, polls, elapsed_ms = started.elapsed().as_millis() as u64, "Phase complete.");
            return Ok(());
        }

        let elapsed = started.elapsed();
        if polls >= policy.max_polls.max(1) || elapsed + policy.interval > policy.deadline {
            warn!(phase, handle, polls, last = %last_seen, "Giving up on phase before completion.");
            return Err(EngineError::PollLimitExceeded { phase, polls, elapsed });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled(phase)),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}
