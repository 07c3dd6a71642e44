//! Breakwater: the resilience and caching core of the game catalog
//! front end.
//!
//! Three cooperating pieces share one concern, recovering gracefully from
//! unreliable network conditions without redundant work:
//!
//! - a strategy-driven request cache over versioned generations
//!   ([`breakwater_cache`]),
//! - a classified-retry engine with cache fallbacks and an offline replay
//!   queue ([`breakwater_resilience`]),
//! - a per-resource load supervisor for embedded game content
//!   ([`breakwater_supervisor`]).
//!
//! [`Breakwater`] wires them together with explicitly injected
//! dependencies; nothing in this workspace is a process-wide singleton.

use breakwater_cache::{
    CacheEngine, CacheResult, CacheStore, ControlMessage, ControlResponse, HttpResourceFetcher,
    InMemoryCacheStore, InstallManifest,
};
pub use breakwater_core::{
    ConnectivityMonitor, ConnectivityState, HttpMethod, ReachabilityProbe, RequestHandler,
    ResilienceError, ResourceCategory, ResourceFetcher, ResourceKey, ResourceRequest,
    ResourceResponse,
};
use breakwater_resilience::{ErrorLog, ErrorRecord, InMemoryStateStore, RecoveryEngine, StateStore};
use breakwater_supervisor::LoadSupervisor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub mod config;
pub mod telemetry;

pub use breakwater_cache as cache;
pub use breakwater_resilience as resilience;
pub use breakwater_supervisor as supervision;
pub use config::BreakwaterConfig;

/// The assembled engine.
///
/// Construct with [`Breakwater::init`] (explicit dependencies) or
/// [`Breakwater::with_defaults`] (HTTP transport and in-memory stores).
/// Requests flow through the cache strategy engine first; failures are
/// handled by the recovery engine; embedded-content loads are watched by
/// the supervisor.
pub struct Breakwater {
    cache: Arc<CacheEngine>,
    recovery: Arc<RecoveryEngine>,
    supervisor: LoadSupervisor,
    connectivity: ConnectivityMonitor,
    error_log: ErrorLog,
    drain_task: Mutex<Option<JoinHandle<()>>>,
}

impl Breakwater {
    /// Assemble an engine from explicitly constructed collaborators.
    ///
    /// Must be called within a tokio runtime: the queue-drain watcher and
    /// the error-log reload are spawned here.
    pub fn init(
        config: BreakwaterConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        probe: Arc<dyn ReachabilityProbe>,
        store: Arc<dyn CacheStore>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let connectivity = ConnectivityMonitor::online();
        let cache = Arc::new(CacheEngine::new(config.cache.clone(), store, fetcher));

        let error_log = ErrorLog::new(config.error_log_capacity, state_store);
        {
            let error_log = error_log.clone();
            tokio::spawn(async move {
                if let Err(e) = error_log.load().await {
                    error!("failed to reload persisted error log: {}", e);
                }
            });
        }

        let recovery = Arc::new(RecoveryEngine::new(
            cache.clone(),
            cache.clone(),
            breakwater_resilience::OfflineQueue::new(config.offline_queue.clone()),
            connectivity.clone(),
            config.retry.clone(),
            error_log.clone(),
        ));

        let supervisor = LoadSupervisor::new(config.supervisor.clone(), probe);

        let drain_task =
            Self::spawn_drain_watcher(connectivity.clone(), recovery.clone(), cache.clone());

        info!(
            "breakwater initialized for cache generation {}",
            cache.generation()
        );
        Self {
            cache,
            recovery,
            supervisor,
            connectivity,
            error_log,
            drain_task: Mutex::new(Some(drain_task)),
        }
    }

    /// Assemble an engine over the real HTTP transport and in-memory
    /// stores.
    pub fn with_defaults(config: BreakwaterConfig) -> Self {
        let http = Arc::new(HttpResourceFetcher::new(config.request_timeout()));
        Self::init(
            config,
            http.clone(),
            http,
            Arc::new(InMemoryCacheStore::new()),
            Arc::new(InMemoryStateStore::new()),
        )
    }

    /// Replays queued requests whenever connectivity comes back.
    fn spawn_drain_watcher(
        connectivity: ConnectivityMonitor,
        recovery: Arc<RecoveryEngine>,
        handler: Arc<dyn RequestHandler>,
    ) -> JoinHandle<()> {
        let mut rx = connectivity.subscribe();
        tokio::spawn(async move {
            let mut previous = *rx.borrow();
            while rx.changed().await.is_ok() {
                let current = *rx.borrow();
                if previous == ConnectivityState::Offline && current == ConnectivityState::Online {
                    let replayed = recovery.queue().drain(handler.as_ref()).await;
                    if replayed > 0 {
                        info!("replayed {} queued request(s) after reconnect", replayed);
                    }
                }
                previous = current;
            }
        })
    }

    /// Fetch a resource with caching and full failure recovery.
    pub async fn fetch(
        &self,
        request: &ResourceRequest,
    ) -> Result<ResourceResponse, ResilienceError> {
        self.recovery.execute(request).await
    }

    /// Seed the configured cache generation from an install manifest.
    pub async fn install(&self, manifest: &InstallManifest) -> CacheResult<()> {
        self.cache.install(manifest).await
    }

    /// Promote the configured generation, deleting stale ones.
    pub async fn activate(&self) -> CacheResult<usize> {
        self.cache.activate().await
    }

    /// Handle a host control message.
    pub async fn control(&self, message: ControlMessage) -> CacheResult<ControlResponse> {
        self.cache.handle_control(message).await
    }

    /// The load supervisor for embedded game content
    pub fn supervisor(&self) -> &LoadSupervisor {
        &self.supervisor
    }

    /// The connectivity monitor host events are pushed into
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Export the diagnostics error log, oldest record first.
    pub async fn export_errors(&self) -> Vec<ErrorRecord> {
        self.error_log.export().await
    }

    /// Drop every piece of per-key state tied to a resource: its load
    /// session, retry record and queued replays.
    pub async fn abandon(&self, key: &ResourceKey) {
        self.supervisor.abandon(key).await;
        self.recovery.abandon(key).await;
    }

    /// Tear the engine down: stop the drain watcher and drop all load
    /// sessions with their timers.
    pub async fn destroy(&self) {
        if let Some(task) = self.drain_task.lock().await.take() {
            task.abort();
        }
        self.supervisor.clear().await;
        info!("breakwater destroyed");
    }
}
