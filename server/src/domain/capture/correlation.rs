//! Execution-context correlation registry
//!
//! Maps each live execution unit to the batch id shared by every entry it
//! produces. Units are identified by [`context::current_unit`], so the same
//! calls work inside a task-local scope and on a plain thread.

use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use dashmap::DashMap;
use uuid::Uuid;

use super::context::{self, UnitContext, UnitId};
use crate::utils::time::format_entry_timestamp;

/// Concurrent `unit -> batch id` map
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    batches: DashMap<UnitId, String>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a batch for the current unit, replacing any existing one
    pub fn start(&self) -> String {
        self.start_unit(context::current_unit())
    }

    /// Drop the current unit's batch. No-op when none is open.
    pub fn close(&self) {
        self.close_unit(context::current_unit());
    }

    /// Batch id of the current unit, or a timestamp when uncorrelated
    pub fn current_batch_id(&self) -> String {
        self.batch_id_for(context::current_unit())
    }

    pub fn start_unit(&self, unit: UnitId) -> String {
        let batch_id = Uuid::new_v4().to_string();
        self.batches.insert(unit, batch_id.clone());
        batch_id
    }

    pub fn close_unit(&self, unit: UnitId) {
        self.batches.remove(&unit);
    }

    pub fn lookup(&self, unit: UnitId) -> Option<String> {
        self.batches.get(&unit).map(|entry| entry.value().clone())
    }

    pub fn batch_id_for(&self, unit: UnitId) -> String {
        self.lookup(unit).unwrap_or_else(uncorrelated_batch_id)
    }

    /// Open a batch for `unit` that closes when the guard drops
    pub fn begin(self: &Arc<Self>, unit: UnitId) -> BatchGuard {
        self.start_unit(unit);
        BatchGuard {
            registry: Arc::clone(self),
            unit,
        }
    }

    /// Run `fut` as a fresh unit with its own batch
    pub async fn scope<F: Future>(self: &Arc<Self>, fut: F) -> F::Output {
        self.scope_with(Arc::new(UnitContext::new()), fut).await
    }

    /// Run `fut` as the unit described by `ctx`, batch open for its duration
    pub async fn scope_with<F: Future>(
        self: &Arc<Self>,
        ctx: Arc<UnitContext>,
        fut: F,
    ) -> F::Output {
        let _guard = self.begin(ctx.unit());
        context::scope(ctx, fut).await
    }

    /// Number of open batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Closes a unit's batch on drop, including on cancellation
#[derive(Debug)]
pub struct BatchGuard {
    registry: Arc<CorrelationRegistry>,
    unit: UnitId,
}

impl BatchGuard {
    pub fn unit(&self) -> UnitId {
        self.unit
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.registry.close_unit(self.unit);
    }
}

/// Fallback batch id for units that never called `start`.
///
/// Second resolution, so unrelated units in the same second share it.
pub fn uncorrelated_batch_id() -> String {
    format_entry_timestamp(&Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_timestamp(value: &str) -> bool {
        chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
    }

    #[test]
    fn test_start_then_current() {
        let registry = CorrelationRegistry::new();
        let id = registry.start();
        assert_eq!(registry.current_batch_id(), id);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_close_falls_back_to_timestamp() {
        let registry = CorrelationRegistry::new();
        registry.start();
        registry.close();
        assert!(is_timestamp(&registry.current_batch_id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_without_start_is_noop() {
        let registry = CorrelationRegistry::new();
        registry.close();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_restart_overwrites() {
        let registry = CorrelationRegistry::new();
        let first = registry.start();
        let second = registry.start();
        assert_ne!(first, second);
        assert_eq!(registry.current_batch_id(), second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_threads_are_isolated() {
        let registry = Arc::new(CorrelationRegistry::new());
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = registry.start();
                    for _ in 0..100 {
                        assert_eq!(registry.current_batch_id(), id);
                        std::thread::yield_now();
                    }
                    registry.close();
                    id
                })
            })
            .collect();
        let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_ne!(ids[0], ids[1]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_scope_opens_and_closes() {
        let registry = Arc::new(CorrelationRegistry::new());
        let seen = registry
            .scope(async {
                let id = registry.current_batch_id();
                assert_eq!(registry.len(), 1);
                id
            })
            .await;
        assert!(Uuid::parse_str(&seen).is_ok());
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_scopes_are_isolated() {
        let registry = Arc::new(CorrelationRegistry::new());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let inner = Arc::clone(&registry);
                    registry
                        .scope(async move {
                            let first = inner.current_batch_id();
                            tokio::task::yield_now().await;
                            assert_eq!(inner.current_batch_id(), first);
                            first
                        })
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let registry = Arc::new(CorrelationRegistry::new());
        let ctx = UnitContext::new();
        {
            let guard = registry.begin(ctx.unit());
            assert_eq!(guard.unit(), ctx.unit());
            assert!(registry.lookup(ctx.unit()).is_some());
        }
        assert!(registry.lookup(ctx.unit()).is_none());
        assert!(is_timestamp(&registry.batch_id_for(ctx.unit())));
    }
}
