//! Chunk loader
//!
//! Performs the actual asynchronous load for registry entries:
//! - per-attempt timeout with linear-backoff retry
//! - single-flight dedup: concurrent loads of one key share one attempt
//!   sequence and observe the same terminal outcome
//! - best-effort `preload` gated by connection advice; never surfaces errors
//!
//! The attempt loop runs on a spawned driver task, so a caller that gives up
//! does not abort a load other callers may still be waiting on.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::{ConfigHandle, RouteFlowConfig};
use crate::error::LoadError;
use crate::network::ConnectionAdvisor;
use crate::registry::{ChunkRegistry, ChunkStatus, LoadOutcome};
use crate::route::{ChunkFactory, ChunkModule};

/// Loads chunks through registry handles
pub struct ChunkLoader {
    registry: Arc<ChunkRegistry>,
    config: ConfigHandle,
    advisor: Arc<dyn ConnectionAdvisor>,
}

/// How a load request joins the entry's state
enum Join {
    /// Value already cached
    Ready(ChunkModule),
    /// Outcome will arrive on the shared channel
    Wait(watch::Receiver<Option<LoadOutcome>>),
}

/// Decision taken under the entry lock
enum Decision {
    Ready(ChunkModule),
    Join(watch::Receiver<Option<LoadOutcome>>),
    Run {
        tx: watch::Sender<Option<LoadOutcome>>,
        rx: watch::Receiver<Option<LoadOutcome>>,
        factory: ChunkFactory,
    },
}

impl ChunkLoader {
    /// Create a loader over a registry
    pub fn new(
        registry: Arc<ChunkRegistry>,
        config: ConfigHandle,
        advisor: Arc<dyn ConnectionAdvisor>,
    ) -> Self {
        Self {
            registry,
            config,
            advisor,
        }
    }

    /// Load a chunk, driving the retry loop if no load is in flight.
    ///
    /// Concurrent callers for the same key all receive the identical value
    /// or the identical error. Never gated on connection advice.
    pub async fn load(&self, key: &str) -> Result<ChunkModule, LoadError> {
        match self.start(key)? {
            Join::Ready(value) => Ok(value),
            Join::Wait(rx) => Self::join(key, rx).await,
        }
    }

    /// Speculatively load a chunk. Skipped when the chunk is already loaded
    /// or loading, or when connection advice disadvises. Failures are logged
    /// and swallowed; this never surfaces an error to navigation logic.
    pub async fn preload(&self, key: &str) {
        if let Some(rx) = self.preload_start(key) {
            if let Err(error) = Self::join(key, rx).await {
                debug!("Preload of chunk '{}' failed: {}", key, error);
            }
        }
    }

    /// Synchronous variant of `preload`: gating and the Idle -> Loading
    /// transition happen on the calling thread, the attempt loop runs on the
    /// driver task. Used by the immediate strategy at registration time.
    pub fn kick_preload(&self, key: &str) {
        if let Some(rx) = self.preload_start(key) {
            let key = key.to_string();
            tokio::spawn(async move {
                if let Err(error) = Self::join(&key, rx).await {
                    debug!("Preload of chunk '{}' failed: {}", key, error);
                }
            });
        }
    }

    /// Apply preload gating and start a load if one is warranted
    fn preload_start(&self, key: &str) -> Option<watch::Receiver<Option<LoadOutcome>>> {
        match self.registry.status(key) {
            None => {
                debug!("Preload skipped: chunk '{}' is not registered", key);
                return None;
            }
            Some(ChunkStatus::Loaded) | Some(ChunkStatus::Loading) => return None,
            Some(_) => {}
        }

        if self.config.current().chunks.connection_aware {
            let advice = self.advisor.advice();
            if !advice.permits_preload() {
                debug!(
                    "Preload of chunk '{}' suppressed by connection advice ({:?})",
                    key, advice.effective_type
                );
                return None;
            }
        }

        match self.start(key) {
            Ok(Join::Ready(_)) => None,
            Ok(Join::Wait(rx)) => Some(rx),
            Err(error) => {
                debug!("Preload of chunk '{}' did not start: {}", key, error);
                None
            }
        }
    }

    /// Join or begin the entry's load under the registry handle
    fn start(&self, key: &str) -> Result<Join, LoadError> {
        self.registry.record_access(key);

        let decision = self
            .registry
            .with_entry(key, |entry| {
                match (entry.status, entry.value.clone(), entry.in_flight.clone()) {
                    (ChunkStatus::Loaded, Some(value), _) => Decision::Ready(value),
                    (ChunkStatus::Loading, _, Some(rx)) => Decision::Join(rx),
                    _ => {
                        let (tx, rx) = watch::channel(None);
                        entry.status = ChunkStatus::Loading;
                        entry.in_flight = Some(rx.clone());
                        Decision::Run {
                            tx,
                            rx,
                            factory: entry.factory.clone(),
                        }
                    }
                }
            })
            .ok_or_else(|| LoadError::UnitNotFound(key.to_string()))?;

        match decision {
            Decision::Ready(value) => Ok(Join::Ready(value)),
            Decision::Join(rx) => Ok(Join::Wait(rx)),
            Decision::Run { tx, rx, factory } => {
                let registry = self.registry.clone();
                let config = self.config.current();
                let key = key.to_string();
                tokio::spawn(drive(registry, key, factory, config, tx));
                Ok(Join::Wait(rx))
            }
        }
    }

    /// Wait for the shared outcome published by the driver task
    async fn join(
        key: &str,
        mut rx: watch::Receiver<Option<LoadOutcome>>,
    ) -> Result<ChunkModule, LoadError> {
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // driver vanished without publishing a terminal outcome
                return Err(LoadError::ChunkLoadFailed {
                    key: key.to_string(),
                    attempts: 0,
                    last_error: "load task dropped before completion".to_string(),
                });
            }
        }
    }
}

/// Retry loop for one chunk. Exactly one driver runs per key at a time; it
/// updates the registry entry before publishing the outcome so joiners never
/// observe a settled channel with a stale entry.
async fn drive(
    registry: Arc<ChunkRegistry>,
    key: String,
    factory: ChunkFactory,
    config: Arc<RouteFlowConfig>,
    tx: watch::Sender<Option<LoadOutcome>>,
) {
    let cfg = &config.chunks;
    let attempts = cfg.retry_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        debug!("Loading chunk '{}' (attempt {}/{})", key, attempt, attempts);

        match timeout(cfg.attempt_timeout(), (factory)()).await {
            Ok(Ok(module)) => {
                registry.finish_loaded(&key, module.clone());
                debug!("Chunk '{}' loaded on attempt {}", key, attempt);
                let _ = tx.send(Some(Ok(module)));
                return;
            }
            Ok(Err(error)) => {
                warn!("Chunk '{}' attempt {} failed: {}", key, attempt, error);
                last_error = error.to_string();
            }
            Err(_) => {
                let timed_out = LoadError::TimeoutExceeded {
                    key: key.clone(),
                    timeout_ms: cfg.preload_timeout_ms,
                };
                warn!("{}", timed_out);
                last_error = timed_out.to_string();
            }
        }

        if attempt < attempts {
            // linear backoff: the wait grows with the attempt number
            sleep(cfg.retry_delay() * attempt).await;
        }
    }

    registry.finish_error(&key, last_error.clone());
    let error = LoadError::ChunkLoadFailed {
        key,
        attempts,
        last_error,
    };
    let _ = tx.send(Some(Err(error)));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio_test::assert_ok;

    use super::*;
    use crate::config::{ConfigPatch, RouteFlowConfig};
    use crate::network::{ConnectionAdvice, EffectiveConnectionType, FixedAdvisor};

    fn loader_with(advice: ConnectionAdvice) -> (Arc<ChunkRegistry>, ChunkLoader) {
        let registry = Arc::new(ChunkRegistry::new());
        let loader = ChunkLoader::new(
            registry.clone(),
            ConfigHandle::new(RouteFlowConfig::default()),
            Arc::new(FixedAdvisor(advice)),
        );
        (registry, loader)
    }

    fn loader() -> (Arc<ChunkRegistry>, ChunkLoader) {
        loader_with(ConnectionAdvice::default())
    }

    fn counting_factory(calls: Arc<AtomicU32>, fail_first: u32) -> ChunkFactory {
        Arc::new(move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= fail_first {
                    anyhow::bail!("boom {}", n);
                }
                Ok(Arc::new(n) as ChunkModule)
            })
        })
    }

    fn slow_factory(calls: Arc<AtomicU32>, delay_ms: u64) -> ChunkFactory {
        Arc::new(move || {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(std::time::Duration::from_millis(delay_ms)).await;
                Ok(Arc::new(7u32) as ChunkModule)
            })
        })
    }

    #[tokio::test]
    async fn test_load_unregistered_is_fatal() {
        let (_registry, loader) = loader();

        let error = loader.load("missing").await.unwrap_err();
        assert_eq!(error, LoadError::UnitNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_load_caches_value() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), 0), None);

        let first = assert_ok!(loader.load("products").await);
        let second = assert_ok!(loader.load("products").await);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snapshot = registry.snapshot("products").unwrap();
        assert_eq!(snapshot.status, ChunkStatus::Loaded);
        assert!(snapshot.preloaded);
        assert_eq!(snapshot.access_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_dedup() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", slow_factory(calls.clone(), 100), None);

        let (a, b, c) = tokio::join!(
            loader.load("products"),
            loader.load("products"),
            loader.load("products"),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        // one underlying attempt sequence, one shared value
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_reports_last_error() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), u32::MAX), None);

        let error = loader.load("products").await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match error {
            LoadError::ChunkLoadFailed {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "boom 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let snapshot = registry.snapshot("products").unwrap();
        assert_eq!(snapshot.status, ChunkStatus::Error);
        assert_eq!(snapshot.last_error.as_deref(), Some("boom 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), 1), None);

        let started = tokio::time::Instant::now();
        assert_ok!(loader.load("products").await);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // exactly one backoff wait of retry_delay x 1 on the paused clock
        assert_eq!(started.elapsed(), std::time::Duration::from_millis(1000));
        assert_eq!(
            registry.status("products"),
            Some(ChunkStatus::Loaded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_counts_against_budget() {
        let (registry, loader) = loader();
        let hanging: ChunkFactory =
            Arc::new(|| Box::pin(std::future::pending::<anyhow::Result<ChunkModule>>()));
        registry.register("products", hanging, None);

        let error = loader.load("products").await.unwrap_err();

        match error {
            LoadError::ChunkLoadFailed {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("exceeded 5000 ms"), "{last_error}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(registry.status("products"), Some(ChunkStatus::Error));
    }

    #[tokio::test]
    async fn test_late_joiner_observes_terminal_outcome() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), 0), None);

        assert_ok!(loader.load("products").await);
        // joins the cached terminal outcome without a new attempt sequence
        assert_ok!(loader.load("products").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preload_suppressed_on_slow_connection() {
        let (registry, loader) = loader_with(ConnectionAdvice {
            effective_type: EffectiveConnectionType::Slow2g,
            downlink_mbps: 0.2,
            save_data: false,
        });
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), 0), None);

        loader.preload("products").await;

        assert_eq!(registry.status("products"), Some(ChunkStatus::Idle));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_explicit_load_is_never_gated() {
        let (registry, loader) = loader_with(ConnectionAdvice {
            effective_type: EffectiveConnectionType::Slow2g,
            downlink_mbps: 0.2,
            save_data: false,
        });
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), 0), None);

        assert_ok!(loader.load("products").await);
        assert_eq!(registry.status("products"), Some(ChunkStatus::Loaded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_swallows_failures() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), u32::MAX), None);

        // resolves cleanly even though every attempt failed
        loader.preload("products").await;

        assert_eq!(registry.status("products"), Some(ChunkStatus::Error));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_preload_skips_loaded_chunks() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), 0), None);

        assert_ok!(loader.load("products").await);
        loader.preload("products").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preload_ignores_unregistered_keys() {
        let (_registry, loader) = loader();
        // must not panic or error
        loader.preload("missing").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_preload_transitions_synchronously() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", slow_factory(calls.clone(), 50), None);

        loader.kick_preload("products");
        // before any await: the entry is already marked loading
        assert_eq!(registry.status("products"), Some(ChunkStatus::Loading));

        // and the driver finishes on its own
        loader.load("products").await.unwrap();
        assert_eq!(registry.status("products"), Some(ChunkStatus::Loaded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_uses_snapshot_at_start() {
        let (registry, loader) = loader();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register("products", counting_factory(calls.clone(), u32::MAX), None);

        // the driver captures retry_attempts = 3 at start
        loader.kick_preload("products");

        let patch = ConfigPatch::from_json(serde_json::json!({
            "chunks": { "retry_attempts": 1 }
        }))
        .unwrap();
        loader.config.update(&patch).unwrap();

        // joins the in-flight driver, which still runs under its snapshot
        let error = loader.load("products").await.unwrap_err();
        match error {
            LoadError::ChunkLoadFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
