//! Short-lived memoized stats with single-flight recomputation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Operational,
    /// The vector index count could not be read.
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_documents: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub document_node_count: usize,
    pub entity_node_count: usize,
    pub status: ServiceStatus,
    pub generated_at: DateTime<Utc>,
}

/// Caches one [`StatsSnapshot`] for `ttl`.
///
/// At most one recomputation runs at a time: callers arriving during a miss
/// wait on the in-flight computation and reuse its result. A snapshot whose
/// computation overlapped an [`StatsCache::invalidate`] is returned to its
/// caller but never cached.
pub struct StatsCache {
    ttl: Duration,
    cached: Mutex<Option<(Instant, StatsSnapshot)>>,
    in_flight: Mutex<()>,
    generation: AtomicU64,
}

impl StatsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
            in_flight: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    fn fresh(&self) -> Option<StatsSnapshot> {
        let cached = self.cached.lock();
        match &*cached {
            Some((at, snapshot)) if at.elapsed() < self.ttl => Some(snapshot.clone()),
            _ => None,
        }
    }

    pub fn get_or_compute(&self, compute: impl FnOnce() -> StatsSnapshot) -> StatsSnapshot {
        if let Some(snapshot) = self.fresh() {
            return snapshot;
        }
        let _flight = self.in_flight.lock();
        // Another caller may have refreshed it while we waited.
        if let Some(snapshot) = self.fresh() {
            return snapshot;
        }
        let started = self.generation.load(Ordering::Acquire);
        let snapshot = compute();
        debug!(
            documents = snapshot.total_documents,
            nodes = snapshot.total_nodes,
            "Stats recomputed"
        );
        let mut cached = self.cached.lock();
        if self.generation.load(Ordering::Acquire) == started {
            *cached = Some((Instant::now(), snapshot.clone()));
        } else {
            debug!("Stats invalidated during recompute, not caching");
        }
        snapshot
    }

    /// Drop the cached snapshot so the next read recomputes.
    pub fn invalidate(&self) {
        let mut cached = self.cached.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *cached = None;
    }
}
