// src/core/scanner/mod.rs

// Each phase of a scan lives in its own module; this file composes them
// into one end-to-end run.
pub mod active_scan;
pub mod crawl;
pub mod phase;
pub mod progress;
pub mod triage;

use std::sync::Arc;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use self::active_scan::ActiveScanCoordinator;
use self::crawl::CrawlCoordinator;
use self::phase::PollPolicy;
use self::triage::{normalize, AlertTriage};
use crate::core::client::ResilientClient;
use crate::core::error::EngineError;
use crate::core::models::{ScanTarget, TriagedResult};

/// Where a single scan run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScanState {
    Idle,
    CrawlInProgress,
    ActiveScanInProgress,
    Triaging,
    Done,
    Failed,
}

impl ScanState {
    /// Whether `self -> next` is an edge of the run's state machine.
    ///
    /// `Idle -> Failed` covers a crawl that could not even be started.
    pub fn can_transition_to(self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (Idle, CrawlInProgress)
                | (CrawlInProgress, ActiveScanInProgress)
                | (ActiveScanInProgress, Triaging)
                | (Triaging, Done)
                | (Idle | CrawlInProgress | ActiveScanInProgress | Triaging, Failed)
        )
    }
}

/// Stack-local bookkeeping for one run; dropped when the run returns.
struct ScanRun<'a> {
    target: &'a ScanTarget,
    state: ScanState,
}

impl<'a> ScanRun<'a> {
    fn new(target: &'a ScanTarget) -> Self {
        Self { target, state: ScanState::Idle }
    }

    fn advance(&mut self, next: ScanState) {
        debug_assert!(self.state.can_transition_to(next), "illegal transition {} -> {}", self.state, next);
        info!(target = %self.target, from = %self.state, to = %next, "Scan state changed.");
        self.state = next;
    }
}

/// Runs crawl, active scan, and triage back to back for one target.
///
/// The orchestrator never retries a failed phase (single calls are retried by
/// the client) and never rolls back a job it already started on the engine.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    crawl: CrawlCoordinator,
    active_scan: ActiveScanCoordinator,
    triage: AlertTriage,
}

impl ScanOrchestrator {
    /// Wires every coordinator to the same shared client.
    pub fn new(client: Arc<ResilientClient>, poll: PollPolicy) -> Self {
        Self {
            crawl: CrawlCoordinator::new(Arc::clone(&client), poll),
            active_scan: ActiveScanCoordinator::new(Arc::clone(&client), poll),
            triage: AlertTriage::new(client),
        }
    }

    /// Executes a full scan and returns the triaged findings.
    ///
    /// # Arguments
    ///
    /// * `raw_target` - The URL to scan, as supplied by the caller.
    /// * `cancel` - Abandons the run between polls or retry attempts.
    ///
    /// # Returns
    ///
    /// The `TriagedResult` for the completed active scan, or the first error
    /// any phase produced. Blank or malformed input fails with `InvalidInput`
    /// before anything is sent to the engine.
    pub async fn run_scan(
        &self,
        raw_target: &str,
        cancel: &CancellationToken,
    ) -> Result<TriagedResult, EngineError> {
        let target = ScanTarget::parse(raw_target)?;
        let mut run = ScanRun::new(&target);

        match self.drive(&mut run, cancel).await {
            Ok(result) => {
                run.advance(ScanState::Done);
                info!(
                    target = %target,
                    scan_id = %result.scan_id,
                    findings = result.alerts.len(),
                    moderate = result.moderate_issues,
                    "Scan finished."
                );
                Ok(result)
            }
            Err(e) => {
                let failed_in = run.state;
                run.advance(ScanState::Failed);
                error!(target = %target, phase = %failed_in, kind = e.kind(), error = %e, "Scan failed.");
                Err(e)
            }
        }
    }

    async fn drive(&self, run: &mut ScanRun<'_>, cancel: &CancellationToken) -> Result<TriagedResult, EngineError> {
        let target = run.target;

        let crawl_handle = self.crawl.start_crawl(target, cancel).await?;
        run.advance(ScanState::CrawlInProgress);
        self.crawl.await_crawl_completion(&crawl_handle, cancel).await?;

        let scan_handle = self.active_scan.start_active_scan(target, cancel).await?;
        run.advance(ScanState::ActiveScanInProgress);
        self.active_scan.await_active_scan_completion(&scan_handle, cancel).await?;

        run.advance(ScanState::Triaging);
        let findings = self.triage.fetch_findings(target, cancel).await?;
        Ok(normalize(scan_handle, findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_only_moves_forward() {
        use ScanState::*;
        assert!(Idle.can_transition_to(CrawlInProgress));
        assert!(CrawlInProgress.can_transition_to(ActiveScanInProgress));
        assert!(ActiveScanInProgress.can_transition_to(Triaging));
        assert!(Triaging.can_transition_to(Done));
        assert!(!Idle.can_transition_to(Triaging));
        assert!(!CrawlInProgress.can_transition_to(Triaging));
        assert!(!Done.can_transition_to(Failed));
    }

    #[test]
    fn every_unfinished_state_can_fail() {
        use ScanState::*;
        for state in [Idle, CrawlInProgress, ActiveScanInProgress, Triaging] {
            assert!(state.can_transition_to(Failed), "{} cannot fail", state);
        }
        assert!(!Failed.can_transition_to(Failed));
    }
}
