//! Configuration handling for RouteFlow
//!
//! Configuration is an immutable snapshot merged from defaults at
//! construction time. Partial updates build a new snapshot and swap it in
//! atomically; operations already in flight keep the snapshot they cloned
//! at their start.

mod schema;

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};

pub use schema::*;

/// Top-level configuration snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteFlowConfig {
    /// Chunk loading settings
    #[serde(default)]
    pub chunks: ChunkConfig,

    /// Visual transition settings
    #[serde(default)]
    pub transition: TransitionConfig,
}

impl RouteFlowConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunks.retry_attempts == 0 {
            anyhow::bail!("chunks.retry_attempts must be at least 1");
        }
        if self.chunks.preload_timeout_ms == 0 {
            anyhow::bail!("chunks.preload_timeout_ms must be non-zero");
        }
        Ok(())
    }

    /// Return a copy with a patch applied
    pub fn patched(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        patch.apply(&mut next);
        next
    }
}

/// Partial update to chunk loading settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkConfigPatch {
    pub strategy: Option<SplitStrategy>,
    pub preload: Option<PreloadStrategy>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub preload_timeout_ms: Option<u64>,
    pub connection_aware: Option<bool>,
    pub hover_delay_ms: Option<u64>,
    pub visibility_margin_px: Option<u32>,
}

/// Partial update to transition settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransitionConfigPatch {
    pub enabled: Option<bool>,
    pub kind: Option<TransitionKind>,
    pub duration_ms: Option<u64>,
    pub easing: Option<String>,
    pub skip_same_route: Option<bool>,
    /// `null` clears the fallback; an absent field leaves it unchanged
    #[serde(deserialize_with = "double_option")]
    pub fallback: Option<Option<TransitionKind>>,
    pub respect_preferences: Option<bool>,
}

/// Present-but-null deserializes to `Some(None)` so a patch can clear the
/// fallback, while an absent field stays `None` via the container default.
fn double_option<'de, D>(de: D) -> Result<Option<Option<TransitionKind>>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Partial update to the full configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub chunks: ChunkConfigPatch,
    pub transition: TransitionConfigPatch,
}

impl ConfigPatch {
    /// Parse a patch from a JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Failed to parse config patch")
    }

    /// Apply this patch onto a configuration
    pub fn apply(&self, config: &mut RouteFlowConfig) {
        let c = &self.chunks;
        if let Some(v) = c.strategy {
            config.chunks.strategy = v;
        }
        if let Some(v) = c.preload {
            config.chunks.preload = v;
        }
        if let Some(v) = c.retry_attempts {
            config.chunks.retry_attempts = v;
        }
        if let Some(v) = c.retry_delay_ms {
            config.chunks.retry_delay_ms = v;
        }
        if let Some(v) = c.preload_timeout_ms {
            config.chunks.preload_timeout_ms = v;
        }
        if let Some(v) = c.connection_aware {
            config.chunks.connection_aware = v;
        }
        if let Some(v) = c.hover_delay_ms {
            config.chunks.hover_delay_ms = v;
        }
        if let Some(v) = c.visibility_margin_px {
            config.chunks.visibility_margin_px = v;
        }

        let t = &self.transition;
        if let Some(v) = t.enabled {
            config.transition.enabled = v;
        }
        if let Some(v) = t.kind {
            config.transition.kind = v;
        }
        if let Some(v) = t.duration_ms {
            config.transition.duration_ms = v;
        }
        if let Some(ref v) = t.easing {
            config.transition.easing = v.clone();
        }
        if let Some(v) = t.skip_same_route {
            config.transition.skip_same_route = v;
        }
        if let Some(v) = t.fallback {
            config.transition.fallback = v;
        }
        if let Some(v) = t.respect_preferences {
            config.transition.respect_preferences = v;
        }
    }
}

/// Shared handle to the active configuration snapshot
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<RouteFlowConfig>>>,
}

impl ConfigHandle {
    /// Wrap a configuration snapshot
    pub fn new(config: RouteFlowConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Clone the active snapshot
    pub fn current(&self) -> Arc<RouteFlowConfig> {
        self.inner.read().clone()
    }

    /// Build, validate, and atomically install a patched snapshot
    pub fn update(&self, patch: &ConfigPatch) -> Result<()> {
        let mut guard = self.inner.write();
        let next = guard.patched(patch);
        next.validate()?;
        *guard = Arc::new(next);
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(RouteFlowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouteFlowConfig::default();

        assert_eq!(config.chunks.strategy, SplitStrategy::RouteBased);
        assert_eq!(config.chunks.preload, PreloadStrategy::Hover);
        assert_eq!(config.chunks.retry_attempts, 3);
        assert_eq!(config.chunks.retry_delay_ms, 1000);
        assert_eq!(config.chunks.preload_timeout_ms, 5000);
        assert!(config.chunks.connection_aware);
        assert_eq!(config.transition.kind, TransitionKind::ViewTransition);
        assert_eq!(config.transition.fallback, Some(TransitionKind::Fade));
        assert!(config.transition.skip_same_route);
        config.validate().unwrap();
    }

    #[test]
    fn test_patch_merges_fieldwise() {
        let patch = ConfigPatch::from_json(json!({
            "chunks": { "preload": "immediate", "retry_attempts": 5 },
            "transition": { "kind": "slide", "fallback": null }
        }))
        .unwrap();

        let config = RouteFlowConfig::default().patched(&patch);

        assert_eq!(config.chunks.preload, PreloadStrategy::Immediate);
        assert_eq!(config.chunks.retry_attempts, 5);
        // untouched fields keep their defaults
        assert_eq!(config.chunks.retry_delay_ms, 1000);
        assert_eq!(config.transition.kind, TransitionKind::Slide);
        assert_eq!(config.transition.fallback, None);
        assert!(config.transition.enabled);
    }

    #[test]
    fn test_update_rejects_zero_retries() {
        let handle = ConfigHandle::default();
        let patch = ConfigPatch::from_json(json!({
            "chunks": { "retry_attempts": 0 }
        }))
        .unwrap();

        assert!(handle.update(&patch).is_err());
        // the active snapshot is untouched after a rejected update
        assert_eq!(handle.current().chunks.retry_attempts, 3);
    }

    #[test]
    fn test_in_flight_snapshot_is_stable() {
        let handle = ConfigHandle::default();
        let before = handle.current();

        let patch = ConfigPatch::from_json(json!({
            "chunks": { "retry_delay_ms": 50 }
        }))
        .unwrap();
        handle.update(&patch).unwrap();

        assert_eq!(before.chunks.retry_delay_ms, 1000);
        assert_eq!(handle.current().chunks.retry_delay_ms, 50);
    }
}
