// src/app.rs

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::client::ResilientClient;
use crate::core::scanner::phase::PollPolicy;
use crate::core::scanner::progress::ProgressReporter;
use crate::core::scanner::ScanOrchestrator;
use crate::settings::Settings;

/// Shared state handed to every request handler.
///
/// Everything in here is either immutable or internally synchronized; per-scan
/// state only ever lives on the stack of the request that runs the scan.
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: Arc<ResilientClient>,
    pub orchestrator: Arc<ScanOrchestrator>,
    pub progress: Arc<ProgressReporter>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Builds the engine client from `settings` and wires the pipeline to it.
    pub fn new(settings: &Settings, shutdown: CancellationToken) -> Result<Self, reqwest::Error> {
        let client = ResilientClient::new(
            settings.engine_url.clone(),
            settings.api_key.clone(),
            settings.retry,
            settings.request_timeout,
        )?;
        Ok(Self::with_client(Arc::new(client), settings.poll, shutdown))
    }

    pub fn with_client(client: Arc<ResilientClient>, poll: PollPolicy, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator: Arc::new(ScanOrchestrator::new(Arc::clone(&client), poll)),
            progress: Arc::new(ProgressReporter::new(Arc::clone(&client))),
            client,
            shutdown,
        }
    }

    /// A token for one request: cancelled on server shutdown, or by the
    /// request itself when its guard is dropped.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
