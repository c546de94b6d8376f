//! Preload triggers
//!
//! Three trigger mechanisms feed the loader's best-effort path: hover intent
//! (debounced), viewport proximity, and immediate-on-register. Exactly one
//! is active per configuration; calls for an inactive strategy are no-ops.
//! The immediate strategy fires inside `RouteFlow::register_route` via
//! `ChunkLoader::kick_preload`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{ConfigHandle, PreloadStrategy};
use crate::loader::ChunkLoader;
use crate::platform::{ElementHandle, Platform};

/// Opportunistic entry points wired to host UX signals
pub struct PreloadTriggers {
    loader: Arc<ChunkLoader>,
    config: ConfigHandle,
    platform: Arc<dyn Platform>,

    /// Armed hover debounce timers, by chunk key
    hover: Mutex<HashMap<String, JoinHandle<()>>>,

    /// Active visibility watchers, by chunk key
    observers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PreloadTriggers {
    /// Create the trigger set
    pub fn new(loader: Arc<ChunkLoader>, config: ConfigHandle, platform: Arc<dyn Platform>) -> Self {
        Self {
            loader,
            config,
            platform,
            hover: Mutex::new(HashMap::new()),
            observers: Mutex::new(HashMap::new()),
        }
    }

    /// Arm the hover debounce timer for a chunk. Re-entering re-arms it.
    pub fn pointer_enter(&self, key: &str) {
        let config = self.config.current();
        if config.chunks.preload != PreloadStrategy::Hover {
            return;
        }
        let delay = config.chunks.hover_delay();
        let loader = self.loader.clone();
        let owned = key.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            loader.preload(&owned).await;
        });
        if let Some(previous) = self.hover.lock().insert(key.to_string(), task) {
            previous.abort();
        }
    }

    /// Disarm the hover timer before it fires
    pub fn pointer_leave(&self, key: &str) {
        if let Some(task) = self.hover.lock().remove(key) {
            task.abort();
            debug!("Hover intent for chunk '{}' cancelled", key);
        }
    }

    /// Watch an element and preload once it nears the viewport. Without the
    /// observation capability the trigger degrades to an immediate preload.
    pub fn observe(&self, key: &str, element: ElementHandle) {
        let config = self.config.current();
        if config.chunks.preload != PreloadStrategy::Visible {
            return;
        }
        let margin = config.chunks.visibility_margin_px;
        let loader = self.loader.clone();
        let platform = self.platform.clone();
        let owned = key.to_string();
        let task = tokio::spawn(async move {
            if !platform.capabilities().intersection_observer {
                loader.preload(&owned).await;
                return;
            }
            match platform.wait_near_viewport(&element, margin).await {
                Ok(()) => loader.preload(&owned).await,
                Err(error) => {
                    debug!("Visibility observation for chunk '{}' ended: {}", owned, error)
                }
            }
        });
        if let Some(previous) = self.observers.lock().insert(key.to_string(), task) {
            previous.abort();
        }
    }

    /// Stop watching an element
    pub fn unobserve(&self, key: &str) {
        if let Some(task) = self.observers.lock().remove(key) {
            task.abort();
        }
    }

    /// Abort every armed timer and watcher
    pub fn shutdown(&self) {
        for (_, task) in self.hover.lock().drain() {
            task.abort();
        }
        for (_, task) in self.observers.lock().drain() {
            task.abort();
        }
    }
}
