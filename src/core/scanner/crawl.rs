// src/core/scanner/crawl.rs

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::phase::{self, PollPolicy};
use crate::core::client::ResilientClient;
use crate::core::engine_api::EngineAction;
use crate::core::error::EngineError;
use crate::core::models::{CrawlHandle, ScanTarget};

const PHASE: &str = "crawl";

/// Drives the engine's spider (content discovery) phase.
#[derive(Debug, Clone)]
pub struct CrawlCoordinator {
    client: Arc<ResilientClient>,
    poll: PollPolicy,
}

impl CrawlCoordinator {
    pub fn new(client: Arc<ResilientClient>, poll: PollPolicy) -> Self {
        Self { client, poll }
    }

    /// Starts a spider job against `target`.
    pub async fn start_crawl(
        &self,
        target: &ScanTarget,
        cancel: &CancellationToken,
    ) -> Result<CrawlHandle, EngineError> {
        info!(target = %target, "Starting crawl.");
        let id = phase::start_job(&self.client, EngineAction::SpiderScan, target, cancel).await?;
        info!(target = %target, crawl_id = %id, "Crawl started.");
        Ok(CrawlHandle::new(id))
    }

    /// Blocks until the spider job reports 100%.
    pub async fn await_crawl_completion(
        &self,
        handle: &CrawlHandle,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        phase::await_completion(
            &self.client,
            PHASE,
            EngineAction::SpiderStatus,
            handle.as_str(),
            self.poll,
            cancel,
        )
        .await
    }
}
