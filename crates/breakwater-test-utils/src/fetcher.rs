//! Scripted fetcher and probe mocks.

use async_trait::async_trait;
use breakwater_core::{
    FetchError, ReachabilityProbe, ResourceFetcher, ResourceRequest, ResourceResponse, ResourceKey,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted fetch outcome.
pub type FetchOutcome = Result<ResourceResponse, FetchError>;

#[derive(Default)]
struct MockFetcherState {
    scripts: HashMap<ResourceKey, VecDeque<FetchOutcome>>,
    repeating: HashMap<ResourceKey, FetchOutcome>,
    calls: HashMap<ResourceKey, u32>,
    order: Vec<ResourceKey>,
}

/// Fetcher that replays scripted outcomes per resource key and records
/// every call, so tests can assert on call counts and ordering.
///
/// Keys with no remaining script fall back to their repeating outcome if
/// one was set, otherwise the fetch fails with a connection error.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockFetcherState>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for a key, consumed one per fetch in order
    pub fn script(&self, key: &ResourceKey, outcomes: Vec<FetchOutcome>) {
        let mut state = self.state.lock().unwrap();
        state
            .scripts
            .entry(key.clone())
            .or_default()
            .extend(outcomes);
    }

    /// Set the outcome returned once a key's script is exhausted
    pub fn always(&self, key: &ResourceKey, outcome: FetchOutcome) {
        self.state
            .lock()
            .unwrap()
            .repeating
            .insert(key.clone(), outcome);
    }

    /// Number of fetches issued for a key
    pub fn calls_for(&self, key: &ResourceKey) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of fetches across all keys
    pub fn total_calls(&self) -> u32 {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Keys in the order they were fetched, one element per call
    pub fn call_order(&self) -> Vec<ResourceKey> {
        self.state.lock().unwrap().order.clone()
    }
}

#[async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, FetchError> {
        let key = request.key();
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(key.clone()).or_insert(0) += 1;
        state.order.push(key.clone());

        if let Some(outcome) = state.scripts.get_mut(&key).and_then(|q| q.pop_front()) {
            return outcome;
        }
        if let Some(outcome) = state.repeating.get(&key) {
            return outcome.clone();
        }
        Err(FetchError::Connection(format!(
            "no scripted response for {}",
            key
        )))
    }
}

/// Probe with a switchable answer.
#[derive(Debug, Default)]
pub struct StaticProbe {
    reachable: AtomicBool,
}

impl StaticProbe {
    pub fn reachable() -> Self {
        Self {
            reachable: AtomicBool::new(true),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: AtomicBool::new(false),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
    async fn is_reachable(&self, _url: &str) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
