//! Run submission with observable state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use graph_engine::{BlockCatalog, GraphDocument, GraphStore, RunConfig};
use tokio::sync::watch;

use crate::error::Result;
use crate::guard::check_runnable;
use crate::service::{ExecutionService, RunRequest, RunResponse};

/// What observers see of the most recent submission
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Loading,
    Succeeded(RunResponse),
    Failed(String),
}

impl RunState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Sends graphs to an execution service
///
/// A newer submission supersedes an older one for display purposes: an
/// older run still completes, but its result is not published.
pub struct RunClient {
    service: Arc<dyn ExecutionService>,
    state: watch::Sender<RunState>,
    generation: AtomicU64,
}

impl RunClient {
    pub fn new(service: Arc<dyn ExecutionService>) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            service,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Watch the state of the latest submission
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn service(&self) -> &Arc<dyn ExecutionService> {
        &self.service
    }

    /// Check, serialize, and execute the graph
    ///
    /// A guard failure is returned without contacting the service.
    pub async fn submit(
        &self,
        store: &GraphStore,
        run_config: &RunConfig,
        headless: bool,
    ) -> Result<RunResponse> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Err(e) = check_runnable(store) {
            log::warn!("Run refused: {}", e);
            self.publish(generation, RunState::Failed(e.to_string()));
            return Err(e);
        }

        let request = RunRequest {
            graph: GraphDocument::from_store(store, run_config),
            headless,
        };
        self.publish(generation, RunState::Loading);
        log::info!(
            "Submitting run #{} ({} nodes, {} edges, headless={})",
            generation,
            request.graph.nodes.len(),
            request.graph.edges.len(),
            headless
        );

        let result = self.service.run(&request).await;
        match &result {
            Ok(response) => {
                log::info!("Run #{} finished in {}", generation, response.run_dir);
                self.publish(generation, RunState::Succeeded(response.clone()));
            }
            Err(e) => {
                log::warn!("Run #{} failed: {}", generation, e);
                self.publish(generation, RunState::Failed(e.to_string()));
            }
        }
        result
    }

    /// Fetch the service's block catalog
    pub async fn fetch_catalog(&self) -> Result<BlockCatalog> {
        let payload = self.service.catalog().await?;
        let catalog = BlockCatalog::from_catalog_response(&payload)?;
        log::info!("Fetched {} block type(s) from the service", catalog.len());
        Ok(catalog)
    }

    pub async fn health_check(&self) -> bool {
        self.service.health_check().await
    }

    /// Publish unless a newer submission has started
    fn publish(&self, generation: u64, state: RunState) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state.send_replace(state);
        } else {
            log::debug!("Dropping state of superseded run #{}", generation);
        }
    }
}
