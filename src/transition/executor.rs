//! Transition executor
//!
//! Runs one transition's algorithm: entry guards, dispatch on the configured
//! kind, and at most one fallback attempt when the primary kind fails. The
//! caller (the queue) guarantees no two executions overlap.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::{ConfigHandle, TransitionConfig, TransitionKind};
use crate::error::TransitionError;
use crate::platform::{
    AnimationController, AnimationSpec, ElementHandle, MotionMonitor, Platform,
};

use super::context::{NavigationDirection, TransitionContext};

/// User-supplied transition callback
pub type CustomTransition =
    Arc<dyn Fn(&TransitionContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Container selectors probed for built-in animations, in priority order
const CONTAINER_SELECTORS: &[&str] = &["[data-router-view]", "router-outlet", "#app", "#root", "main"];

/// Executes a single transition at a time
pub struct TransitionExecutor {
    platform: Arc<dyn Platform>,
    motion: Arc<dyn MotionMonitor>,
    config: ConfigHandle,
    custom: RwLock<Option<CustomTransition>>,

    /// Controller of the currently-playing built-in animation
    current: Mutex<Option<AnimationController>>,
}

impl TransitionExecutor {
    /// Create an executor over a platform and motion monitor
    pub fn new(
        platform: Arc<dyn Platform>,
        motion: Arc<dyn MotionMonitor>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            platform,
            motion,
            config,
            custom: RwLock::new(None),
            current: Mutex::new(None),
        }
    }

    /// Install or clear the custom transition callback
    pub fn set_custom(&self, callback: Option<CustomTransition>) {
        *self.custom.write() = callback;
    }

    /// Cancel the currently-playing animation, if any. The interrupted
    /// transition resolves as a non-error completion.
    pub fn cancel_current(&self) {
        if let Some(controller) = self.current.lock().as_ref() {
            controller.cancel();
        }
    }

    /// Run one transition to completion
    pub async fn execute(&self, ctx: TransitionContext) -> Result<(), TransitionError> {
        let cfg = self.config.current().transition.clone();

        // entry guards: short-circuit to success with no platform calls
        if !cfg.enabled {
            return Ok(());
        }
        if cfg.respect_preferences && self.motion.prefers_reduced_motion() {
            debug!("Transition skipped: reduced motion requested");
            return Ok(());
        }
        if cfg.skip_same_route && ctx.is_same_route() {
            debug!("Transition skipped: same route '{}'", ctx.to.id);
            return Ok(());
        }

        match self.dispatch(cfg.kind, &ctx, &cfg).await {
            Ok(()) => Ok(()),
            // a missing callback is a configuration error, never retried
            Err(TransitionError::CustomMisconfigured) => {
                Err(TransitionError::CustomMisconfigured)
            }
            Err(primary) => match cfg.fallback.filter(|kind| *kind != cfg.kind) {
                Some(kind) => {
                    warn!(
                        "Transition kind {:?} failed ({}); falling back to {:?}",
                        cfg.kind, primary, kind
                    );
                    match self.dispatch(kind, &ctx, &cfg).await {
                        Ok(()) => Ok(()),
                        Err(fallback_error) => {
                            debug!("Fallback transition failed: {}", fallback_error);
                            Err(primary)
                        }
                    }
                }
                None => Err(primary),
            },
        }
    }

    /// Dispatch one transition kind
    async fn dispatch(
        &self,
        kind: TransitionKind,
        ctx: &TransitionContext,
        cfg: &TransitionConfig,
    ) -> Result<(), TransitionError> {
        match kind {
            TransitionKind::None => Ok(()),
            TransitionKind::ViewTransition => self.run_native().await,
            TransitionKind::Custom => self.run_custom(ctx).await,
            TransitionKind::Fade | TransitionKind::Slide => {
                self.run_animation(kind, ctx, cfg).await
            }
        }
    }

    /// Platform-native transition: readiness, then completion
    async fn run_native(&self) -> Result<(), TransitionError> {
        if !self.platform.capabilities().native_transitions {
            return Err(TransitionError::DispatchFailed(
                "native view transitions unsupported".to_string(),
            ));
        }
        let transition = self
            .platform
            .start_native_transition()
            .map_err(|error| TransitionError::DispatchFailed(error.to_string()))?;
        transition.ready.await.map_err(|_| {
            TransitionError::DispatchFailed("native transition never became ready".to_string())
        })?;
        transition.finished.await.map_err(|_| {
            TransitionError::DispatchFailed("native transition never finished".to_string())
        })?;
        Ok(())
    }

    /// User callback; its returned future is awaited
    async fn run_custom(&self, ctx: &TransitionContext) -> Result<(), TransitionError> {
        let callback = self.custom.read().clone();
        match callback {
            None => Err(TransitionError::CustomMisconfigured),
            Some(callback) => callback(ctx)
                .await
                .map_err(|error| TransitionError::DispatchFailed(error.to_string())),
        }
    }

    /// Built-in fade or slide on the resolved container
    async fn run_animation(
        &self,
        kind: TransitionKind,
        ctx: &TransitionContext,
        cfg: &TransitionConfig,
    ) -> Result<(), TransitionError> {
        let target = self.resolve_container(ctx);
        let spec = match kind {
            TransitionKind::Slide => {
                let offset = match ctx.resolved_direction() {
                    NavigationDirection::Back => 100.0,
                    NavigationDirection::Forward | NavigationDirection::Replace => -100.0,
                };
                AnimationSpec::slide(offset, cfg.duration(), cfg.easing.clone())
            }
            _ => AnimationSpec::fade(cfg.duration(), cfg.easing.clone()),
        };

        let handle = self
            .platform
            .animate(&target, spec)
            .map_err(|error| TransitionError::DispatchFailed(error.to_string()))?;
        *self.current.lock() = Some(handle.controller());

        // cancellation settles the animation and counts as completion
        let _outcome = handle.finished().await;
        *self.current.lock() = None;
        Ok(())
    }

    /// Explicit target -> known containers in priority order -> document root
    fn resolve_container(&self, ctx: &TransitionContext) -> ElementHandle {
        if let Some(target) = &ctx.target {
            return target.clone();
        }
        for selector in CONTAINER_SELECTORS {
            if let Some(element) = self.platform.query_selector(selector) {
                return element;
            }
        }
        self.platform.document_root()
    }
}
