//! Load supervision for resources the cache layer cannot intercept.
//!
//! One session per resource key, held in a registry keyed by identity.
//! Each session owns its timeout/retry timer; callbacks are epoch-guarded
//! so a stale timer firing after the session moved on is a no-op. Sessions
//! for distinct keys never affect each other.

use crate::session::{LoadSession, LoadState, SessionSnapshot};
use breakwater_core::{ReachabilityProbe, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// How long a load may stay in flight before it counts as timed out,
    /// in milliseconds
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Maximum number of retry attempts per load cycle
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_load_timeout_ms() -> u64 {
    15_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Notifications emitted as sessions transition.
///
/// `Exhausted` is the caller-visible failure surface; the caller is
/// expected to offer the user a retry affordance and call
/// [`LoadSupervisor::reset`] when it is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SupervisorEvent {
    LoadStarted { key: ResourceKey, attempt: u32 },
    Loaded { key: ResourceKey },
    TimedOut { key: ResourceKey },
    LoadFailed { key: ResourceKey, reason: String },
    RetryScheduled { key: ResourceKey, attempt: u32, delay_ms: u64 },
    Exhausted { key: ResourceKey },
}

/// Errors from supervisor operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("load session for {0} is exhausted; explicit reset required")]
    Exhausted(ResourceKey),

    #[error("a load for {0} is already in progress")]
    AlreadyActive(ResourceKey),
}

enum InterruptDecision {
    Stale,
    Exhaust,
    Retry {
        attempt: u32,
        delay: Duration,
        epoch: u64,
    },
}

/// Supervises load attempts per resource key.
#[derive(Clone)]
pub struct LoadSupervisor {
    config: SupervisorConfig,
    sessions: Arc<Mutex<HashMap<ResourceKey, LoadSession>>>,
    probe: Arc<dyn ReachabilityProbe>,
    events: broadcast::Sender<SupervisorEvent>,
}

impl LoadSupervisor {
    pub fn new(config: SupervisorConfig, probe: Arc<dyn ReachabilityProbe>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            probe,
            events,
        }
    }

    /// Subscribe to session transition events
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SupervisorEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Start supervising a load attempt for a key.
    ///
    /// Arms the load timeout. Fails if a load is already in flight, or if
    /// the session is exhausted and has not been reset.
    pub async fn begin_load(&self, key: &ResourceKey) -> Result<(), SupervisorError> {
        let epoch = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.entry(key.clone()).or_insert_with(LoadSession::new);
            match session.state {
                LoadState::Exhausted => return Err(SupervisorError::Exhausted(key.clone())),
                LoadState::Loading | LoadState::Retrying => {
                    return Err(SupervisorError::AlreadyActive(key.clone()))
                }
                LoadState::Idle | LoadState::Loaded | LoadState::TimedOut | LoadState::Failed => {}
            }
            session.cancel_timer();
            session.attempts = 0;
            session.state = LoadState::Loading;
            session.bump()
        };

        debug!("load started for {}", key);
        self.emit(SupervisorEvent::LoadStarted {
            key: key.clone(),
            attempt: 0,
        });
        self.arm_timeout(key.clone(), epoch).await;
        Ok(())
    }

    /// Record a successful load signal.
    ///
    /// Returns whether the signal was applied; a signal arriving after the
    /// session has already moved on is a no-op.
    pub async fn notify_loaded(&self, key: &ResourceKey) -> bool {
        let applied = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(key) {
                Some(session) if session.state == LoadState::Loading => {
                    // timer task is invalidated by the epoch bump
                    let _ = session.timer.take();
                    session.state = LoadState::Loaded;
                    session.attempts = 0;
                    session.bump();
                    true
                }
                _ => false,
            }
        };

        if applied {
            info!("load completed for {}", key);
            self.emit(SupervisorEvent::Loaded { key: key.clone() });
        }
        applied
    }

    /// Record an explicit load-error signal.
    ///
    /// Returns whether the signal was applied.
    pub async fn notify_failed(&self, key: &ResourceKey, reason: impl Into<String>) -> bool {
        let epoch = {
            let sessions = self.sessions.lock().await;
            match sessions.get(key) {
                Some(session) if session.state == LoadState::Loading => session.epoch,
                _ => return false,
            }
        };
        self.interrupt(key.clone(), epoch, LoadState::Failed, Some(reason.into()))
            .await;
        true
    }

    async fn on_timeout(&self, key: ResourceKey, epoch: u64) {
        self.interrupt(key, epoch, LoadState::TimedOut, None).await;
    }

    /// Common handling for timeouts and failure signals: retry while the
    /// budget lasts, otherwise settle in Exhausted.
    async fn interrupt(
        &self,
        key: ResourceKey,
        epoch: u64,
        into: LoadState,
        reason: Option<String>,
    ) {
        let decision = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&key) {
                Some(session) if session.epoch == epoch && session.state == LoadState::Loading => {
                    // never abort here: on the timeout path this IS the
                    // timer task; staleness is handled by the epoch bump
                    let _ = session.timer.take();
                    if session.attempts >= self.config.max_retries {
                        session.state = LoadState::Exhausted;
                        session.bump();
                        InterruptDecision::Exhaust
                    } else {
                        session.attempts += 1;
                        let attempt = session.attempts;
                        session.state = LoadState::Retrying;
                        let epoch = session.bump();
                        let delay = Duration::from_millis(
                            self.config
                                .retry_base_delay_ms
                                .saturating_mul(2_u64.saturating_pow(attempt - 1)),
                        );
                        InterruptDecision::Retry {
                            attempt,
                            delay,
                            epoch,
                        }
                    }
                }
                _ => InterruptDecision::Stale,
            }
        };

        let interruption = match into {
            LoadState::Failed => SupervisorEvent::LoadFailed {
                key: key.clone(),
                reason: reason.unwrap_or_else(|| "load error".to_string()),
            },
            _ => SupervisorEvent::TimedOut { key: key.clone() },
        };

        match decision {
            InterruptDecision::Stale => {}
            InterruptDecision::Exhaust => {
                warn!("retry budget exhausted for {}", key);
                self.emit(interruption);
                self.emit(SupervisorEvent::Exhausted { key });
            }
            InterruptDecision::Retry {
                attempt,
                delay,
                epoch,
            } => {
                debug!(
                    "scheduling retry {}/{} for {} in {:?}",
                    attempt, self.config.max_retries, key, delay
                );
                self.emit(interruption);
                self.emit(SupervisorEvent::RetryScheduled {
                    key: key.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                });
                self.schedule_retry(key, epoch, attempt, delay).await;
            }
        }
    }

    fn arm_timeout<'a>(
        &'a self,
        key: ResourceKey,
        epoch: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let supervisor = self.clone();
            let timeout = Duration::from_millis(self.config.load_timeout_ms);
            let task_key = key.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                supervisor.on_timeout(task_key, epoch).await;
            });
            self.store_timer(key, epoch, handle).await;
        })
    }

    async fn schedule_retry(&self, key: ResourceKey, epoch: u64, attempt: u32, delay: Duration) {
        let supervisor = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.run_retry(task_key, epoch, attempt).await;
        });
        self.store_timer(key, epoch, handle).await;
    }

    /// Attach a timer task to its session. If the session moved on while
    /// the task was being spawned the task is already stale; drop it.
    async fn store_timer(&self, key: ResourceKey, epoch: u64, handle: JoinHandle<()>) {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&key) {
            Some(session) if session.epoch == epoch => {
                session.timer = Some(handle);
            }
            _ => handle.abort(),
        }
    }

    async fn run_retry(&self, key: ResourceKey, epoch: u64, attempt: u32) {
        // verify the resource still exists before burning the attempt
        let reachable = self.probe.is_reachable(&key.url).await;

        let next = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&key) {
                Some(session) if session.epoch == epoch && session.state == LoadState::Retrying => {
                    let _ = session.timer.take();
                    if reachable {
                        session.state = LoadState::Loading;
                        Some(Ok(session.bump()))
                    } else {
                        session.state = LoadState::Exhausted;
                        session.bump();
                        Some(Err(()))
                    }
                }
                _ => None,
            }
        };

        match next {
            Some(Ok(new_epoch)) => {
                debug!("retry attempt {} starting for {}", attempt, key);
                self.emit(SupervisorEvent::LoadStarted {
                    key: key.clone(),
                    attempt,
                });
                self.arm_timeout(key, new_epoch).await;
            }
            Some(Err(())) => {
                warn!("{} is unreachable, abandoning retries", key);
                self.emit(SupervisorEvent::Exhausted { key });
            }
            None => {}
        }
    }

    /// Externally reset a session back to Idle.
    ///
    /// This is the only way out of Exhausted. Synchronously cancels the
    /// session's timer and clears its attempt counter.
    pub async fn reset(&self, key: &ResourceKey) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(key) {
            session.cancel_timer();
            session.state = LoadState::Idle;
            session.attempts = 0;
            session.bump();
            debug!("session for {} reset", key);
        }
    }

    /// Drop a session entirely, cancelling its timer.
    pub async fn abandon(&self, key: &ResourceKey) {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(key).is_some() {
            debug!("session for {} abandoned", key);
        }
    }

    /// Current state of a session, if one exists
    pub async fn state(&self, key: &ResourceKey) -> Option<LoadState> {
        self.sessions.lock().await.get(key).map(|s| s.state)
    }

    /// Retry attempts consumed by a session
    pub async fn attempts(&self, key: &ResourceKey) -> u32 {
        self.sessions
            .lock()
            .await
            .get(key)
            .map(|s| s.attempts)
            .unwrap_or(0)
    }

    /// Snapshot of every live session
    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|(key, session)| SessionSnapshot {
                key: key.clone(),
                state: session.state,
                attempts: session.attempts,
            })
            .collect()
    }

    /// Drop every session, cancelling all timers.
    pub async fn clear(&self) {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.len();
        sessions.clear();
        if count > 0 {
            info!("cleared {} load session(s)", count);
        }
    }
}
