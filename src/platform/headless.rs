//! Headless platform implementation
//!
//! Timer-driven stand-in for a real DOM platform, used by non-browser
//! embeddings and by tests. Animations run on the tokio clock, native
//! transitions signal immediately, and visibility is toggled explicitly.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{
    AnimationHandle, AnimationOutcome, AnimationSpec, ElementHandle, NativeTransition, Platform,
    PlatformCapabilities,
};

/// In-process platform with no rendering surface
#[derive(Debug)]
pub struct HeadlessPlatform {
    caps: PlatformCapabilities,

    /// Selectors that resolve to an element
    elements: DashMap<String, ()>,

    /// Per-element near-viewport flag
    visibility: DashMap<String, watch::Sender<bool>>,

    queries: AtomicUsize,
    animations: AtomicUsize,
    last_target: Mutex<Option<ElementHandle>>,
}

impl HeadlessPlatform {
    /// Platform with every capability available
    pub fn new() -> Self {
        Self::with_capabilities(PlatformCapabilities::default())
    }

    /// Platform with an explicit capability descriptor
    pub fn with_capabilities(caps: PlatformCapabilities) -> Self {
        Self {
            caps,
            elements: DashMap::new(),
            visibility: DashMap::new(),
            queries: AtomicUsize::new(0),
            animations: AtomicUsize::new(0),
            last_target: Mutex::new(None),
        }
    }

    /// Make a selector resolvable
    pub fn add_element(&self, selector: impl Into<String>) {
        self.elements.insert(selector.into(), ());
    }

    /// Mark an element as having entered the viewport margin
    pub fn set_near_viewport(&self, target: &ElementHandle) {
        let tx = self
            .visibility
            .entry(target.0.clone())
            .or_insert_with(|| watch::channel(false).0);
        let _ = tx.send(true);
    }

    /// Number of selector queries issued so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of animations started so far
    pub fn animation_count(&self) -> usize {
        self.animations.load(Ordering::SeqCst)
    }

    /// Target of the most recently started animation
    pub fn last_animation_target(&self) -> Option<ElementHandle> {
        self.last_target.lock().clone()
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for HeadlessPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.caps
    }

    fn query_selector(&self, selector: &str) -> Option<ElementHandle> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.elements
            .contains_key(selector)
            .then(|| ElementHandle::new(selector))
    }

    fn document_root(&self) -> ElementHandle {
        ElementHandle::new("document")
    }

    fn animate(&self, target: &ElementHandle, spec: AnimationSpec) -> Result<AnimationHandle> {
        if !self.caps.animations {
            anyhow::bail!("keyframe animations are not available on this platform");
        }
        self.animations.fetch_add(1, Ordering::SeqCst);
        *self.last_target.lock() = Some(target.clone());

        let (handle, mut driver) = AnimationHandle::pair();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(spec.duration) => {
                    driver.complete(AnimationOutcome::Finished);
                }
                _ = driver.wait_cancelled() => {
                    driver.complete(AnimationOutcome::Cancelled);
                }
            }
        });
        Ok(handle)
    }

    fn start_native_transition(&self) -> Result<NativeTransition> {
        if !self.caps.native_transitions {
            anyhow::bail!("native view transitions are not available on this platform");
        }
        let (transition, driver) = NativeTransition::pair();
        // No rendering surface: capture is instant, playback is instant.
        tokio::spawn(async move {
            let _ = driver.ready.send(());
            tokio::task::yield_now().await;
            let _ = driver.finished.send(());
        });
        Ok(transition)
    }

    async fn wait_near_viewport(&self, target: &ElementHandle, _margin_px: u32) -> Result<()> {
        if !self.caps.intersection_observer {
            anyhow::bail!("visibility observation is not available on this platform");
        }
        let mut rx = {
            let tx = self
                .visibility
                .entry(target.0.clone())
                .or_insert_with(|| watch::channel(false).0);
            tx.subscribe()
        };
        rx.wait_for(|near| *near)
            .await
            .map_err(|_| anyhow::anyhow!("visibility feed closed"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_animation_finishes_on_clock() {
        let platform = HeadlessPlatform::new();
        let handle = platform
            .animate(
                &platform.document_root(),
                AnimationSpec::fade(std::time::Duration::from_millis(300), "ease"),
            )
            .unwrap();

        assert_eq!(handle.finished().await, AnimationOutcome::Finished);
        assert_eq!(platform.animation_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_beats_clock() {
        let platform = HeadlessPlatform::new();
        let handle = platform
            .animate(
                &platform.document_root(),
                AnimationSpec::fade(std::time::Duration::from_secs(3600), "ease"),
            )
            .unwrap();

        handle.controller().cancel();
        assert_eq!(handle.finished().await, AnimationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_wait_near_viewport() {
        let platform = std::sync::Arc::new(HeadlessPlatform::new());
        let el = ElementHandle::new("#products-link");

        let waiter = {
            let platform = platform.clone();
            let el = el.clone();
            tokio::spawn(async move { platform.wait_near_viewport(&el, 50).await })
        };

        tokio::task::yield_now().await;
        platform.set_near_viewport(&el);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_capability_is_an_error() {
        let platform = HeadlessPlatform::with_capabilities(PlatformCapabilities {
            native_transitions: false,
            intersection_observer: false,
            animations: false,
        });

        assert!(platform.start_native_transition().is_err());
        assert!(platform
            .animate(
                &platform.document_root(),
                AnimationSpec::fade(std::time::Duration::from_millis(1), "ease")
            )
            .is_err());
    }
}
