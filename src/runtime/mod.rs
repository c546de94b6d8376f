//! RouteFlow runtime
//!
//! The facade the router embeds: route registration feeding the chunk
//! registry, explicit and speculative loads, transition submission, trigger
//! entry points, introspection, and lifecycle. Must be constructed inside a
//! tokio runtime; background work runs on spawned tasks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::{ConfigHandle, ConfigPatch, PreloadStrategy, RouteFlowConfig};
use crate::error::LoadError;
use crate::loader::ChunkLoader;
use crate::network::{ConnectionAdvisor, FixedAdvisor};
use crate::platform::{ElementHandle, HeadlessPlatform, MotionMonitor, Platform, StaticMotion};
use crate::preload::PreloadTriggers;
use crate::registry::{ChunkRegistry, ChunkSnapshot, ChunkStats};
use crate::route::{ChunkModule, RouteMatch};
use crate::transition::{
    CustomTransition, TransitionContext, TransitionExecutor, TransitionHandle, TransitionQueue,
};

/// Derives a chunk key from a route match
pub type ChunkNamer = Arc<dyn Fn(&RouteMatch) -> String + Send + Sync>;

/// Chunk key used when a route has no usable identifier
pub const DEFAULT_CHUNK_KEY: &str = "default";

fn default_namer() -> ChunkNamer {
    Arc::new(|route| {
        if route.id.is_empty() {
            DEFAULT_CHUNK_KEY.to_string()
        } else {
            route.id.clone()
        }
    })
}

/// Aggregate introspection snapshot
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    /// Chunk registry counters
    pub chunks: ChunkStats,

    /// Transitions waiting in the queue
    pub pending_transitions: usize,

    /// Whether a transition is executing right now
    pub transition_running: bool,
}

/// Builder for [`RouteFlow`]
pub struct RouteFlowBuilder {
    config: RouteFlowConfig,
    platform: Option<Arc<dyn Platform>>,
    advisor: Option<Arc<dyn ConnectionAdvisor>>,
    motion: Option<Arc<dyn MotionMonitor>>,
    namer: Option<ChunkNamer>,
    custom_transition: Option<CustomTransition>,
}

impl RouteFlowBuilder {
    fn new() -> Self {
        Self {
            config: RouteFlowConfig::default(),
            platform: None,
            advisor: None,
            motion: None,
            namer: None,
            custom_transition: None,
        }
    }

    /// Start from an explicit configuration instead of the defaults
    pub fn config(mut self, config: RouteFlowConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject the DOM/runtime platform (headless by default)
    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Inject the connection advisor (a permissive fixed advisor by default)
    pub fn connection_advisor(mut self, advisor: Arc<dyn ConnectionAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Inject the motion monitor (no reduced-motion preference by default)
    pub fn motion_monitor(mut self, motion: Arc<dyn MotionMonitor>) -> Self {
        self.motion = Some(motion);
        self
    }

    /// Override chunk key derivation
    pub fn chunk_namer(mut self, namer: ChunkNamer) -> Self {
        self.namer = Some(namer);
        self
    }

    /// Register the callback for the custom transition kind
    pub fn custom_transition(mut self, callback: CustomTransition) -> Self {
        self.custom_transition = Some(callback);
        self
    }

    /// Validate the configuration and assemble the runtime
    pub fn build(self) -> anyhow::Result<RouteFlow> {
        self.config.validate()?;

        let config = ConfigHandle::new(self.config);
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(HeadlessPlatform::new()));
        let advisor = self
            .advisor
            .unwrap_or_else(|| Arc::new(FixedAdvisor::default()));
        let motion = self.motion.unwrap_or_else(|| Arc::new(StaticMotion(false)));

        let registry = Arc::new(ChunkRegistry::new());
        let loader = Arc::new(ChunkLoader::new(
            registry.clone(),
            config.clone(),
            advisor,
        ));
        let triggers = PreloadTriggers::new(loader.clone(), config.clone(), platform.clone());

        let executor = Arc::new(TransitionExecutor::new(platform, motion, config.clone()));
        executor.set_custom(self.custom_transition);
        let queue = TransitionQueue::new(executor);

        Ok(RouteFlow {
            config,
            registry,
            loader,
            triggers,
            queue,
            namer: self.namer.unwrap_or_else(default_namer),
        })
    }
}

/// Orchestration core for a client-side router
pub struct RouteFlow {
    config: ConfigHandle,
    registry: Arc<ChunkRegistry>,
    loader: Arc<ChunkLoader>,
    triggers: PreloadTriggers,
    queue: TransitionQueue,
    namer: ChunkNamer,
}

impl RouteFlow {
    /// Start building a runtime
    pub fn builder() -> RouteFlowBuilder {
        RouteFlowBuilder::new()
    }

    /// Register a route's chunk. Idempotent per derived key; routes without
    /// lazy metadata are ignored. Under the immediate strategy this starts a
    /// gated preload, marking the chunk loading before returning. Returns
    /// the chunk key for routes that have one.
    pub fn register_route(&self, route: &RouteMatch) -> Option<String> {
        let lazy = route.lazy.as_ref()?;
        let key = (self.namer)(route);
        let inserted =
            self.registry
                .register(key.clone(), lazy.import.clone(), lazy.size_estimate);
        if inserted && self.config.current().chunks.preload == PreloadStrategy::Immediate {
            self.loader.kick_preload(&key);
        }
        Some(key)
    }

    /// Load a chunk for an actual navigation; never gated on connection
    /// advice. See [`ChunkLoader::load`] for the retry contract.
    pub async fn load_chunk(&self, key: &str) -> Result<ChunkModule, LoadError> {
        self.loader.load(key).await
    }

    /// Speculatively load a chunk; failures are logged and swallowed
    pub async fn preload_chunk(&self, key: &str) {
        self.loader.preload(key).await;
    }

    /// Point-in-time view of one chunk
    pub fn chunk_snapshot(&self, key: &str) -> Option<ChunkSnapshot> {
        self.registry.snapshot(key)
    }

    /// Submit a transition; the handle resolves with that transition's
    /// outcome once the queue reaches it
    pub fn execute_transition(&self, ctx: TransitionContext) -> TransitionHandle {
        self.queue.enqueue(ctx)
    }

    /// Reject pending transitions and cancel the running animation
    pub fn cancel_transitions(&self) {
        self.queue.cancel_all();
    }

    /// Hover intent entry point (active under the hover strategy)
    pub fn pointer_enter(&self, route: &RouteMatch) {
        self.triggers.pointer_enter(&(self.namer)(route));
    }

    /// Hover intent cancellation
    pub fn pointer_leave(&self, route: &RouteMatch) {
        self.triggers.pointer_leave(&(self.namer)(route));
    }

    /// Visibility entry point (active under the visible strategy)
    pub fn observe_element(&self, route: &RouteMatch, element: ElementHandle) {
        self.triggers.observe(&(self.namer)(route), element);
    }

    /// Stop observing a route's element
    pub fn unobserve_element(&self, route: &RouteMatch) {
        self.triggers.unobserve(&(self.namer)(route));
    }

    /// Sweep chunks that were registered but never requested and are older
    /// than the threshold. Returns the number evicted.
    pub fn evict_chunks(&self, max_age_hours: u64) -> usize {
        self.registry
            .evict_older_than(Duration::from_secs(max_age_hours * 3600))
    }

    /// Chunk registry counters
    pub fn stats(&self) -> ChunkStats {
        self.registry.stats()
    }

    /// Aggregate runtime status
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            chunks: self.registry.stats(),
            pending_transitions: self.queue.pending(),
            transition_running: self.queue.is_running(),
        }
    }

    /// Active configuration snapshot
    pub fn config(&self) -> Arc<RouteFlowConfig> {
        self.config.current()
    }

    /// Apply a partial configuration update atomically
    pub fn update_config(&self, patch: &ConfigPatch) -> anyhow::Result<()> {
        self.config.update(patch)
    }

    /// Apply a partial configuration update from JSON
    pub fn update_config_json(&self, value: serde_json::Value) -> anyhow::Result<()> {
        self.config.update(&ConfigPatch::from_json(value)?)
    }

    /// Release timers, watchers, and queued work. Outstanding transition
    /// handles resolve as cancelled; chunk state stays queryable.
    pub fn destroy(&self) {
        self.triggers.shutdown();
        self.queue.cancel_all();
        debug!("RouteFlow destroyed");
    }
}
