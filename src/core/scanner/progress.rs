// src/core/scanner/progress.rs

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::phase;
use crate::core::client::ResilientClient;
use crate::core::engine_api::EngineAction;
use crate::core::error::EngineError;
use crate::core::models::{PhaseStatus, ScanHandle};

/// Answers "how far along is active scan X?" straight from the engine.
///
/// Shares nothing with any in-flight orchestration run, so it works for
/// scans started by another request or another process.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    client: Arc<ResilientClient>,
}

impl ProgressReporter {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self { client }
    }

    /// Current completion of the active scan behind `handle`.
    ///
    /// A job the engine has no record of reads as 0 ("not started yet"): both
    /// a status-less answer and the engine's `does_not_exist` error map there.
    /// Any other failure is returned.
    pub async fn query_progress(
        &self,
        handle: &ScanHandle,
        cancel: &CancellationToken,
    ) -> Result<PhaseStatus, EngineError> {
        match phase::query_status(&self.client, EngineAction::ActiveScanStatus, handle.as_str(), cancel).await {
            Ok(Some(status)) => {
                debug!(scan_id = %handle, progress = %status, "Progress queried.");
                Ok(status)
            }
            Ok(None) => {
                info!(scan_id = %handle, "Engine returned no status; reporting 0.");
                Ok(PhaseStatus::default())
            }
            Err(e) if e.is_unknown_job() => {
                info!(scan_id = %handle, "Engine has no record of this scan; reporting 0.");
                Ok(PhaseStatus::default())
            }
            Err(e) => Err(e),
        }
    }
}
