//! Platform capability seam
//!
//! The executor and preload triggers talk to the DOM/runtime platform
//! through this trait. Capabilities are declared up front in a descriptor
//! instead of probed ad hoc inside the logic; absence of a capability is a
//! configuration fact the dispatcher reacts to once.

mod headless;
mod motion;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

pub use headless::HeadlessPlatform;
pub use motion::{motion_channel, MotionMonitor, MotionSensor, StaticMotion, WatchMotion};

/// What the embedding platform supports
#[derive(Debug, Clone, Copy)]
pub struct PlatformCapabilities {
    /// Native view-transition primitive is available
    pub native_transitions: bool,

    /// Element visibility observation is available
    pub intersection_observer: bool,

    /// Keyframe animations are available
    pub animations: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            native_transitions: true,
            intersection_observer: true,
            animations: true,
        }
    }
}

/// Opaque platform-defined element reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// One keyframe of a built-in animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Target opacity, when animated
    pub opacity: Option<f64>,

    /// Horizontal translation in percent, when animated
    pub translate_x_pct: Option<f64>,
}

/// A complete animation description handed to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSpec {
    /// Keyframes, in order
    pub keyframes: Vec<Keyframe>,

    /// Total duration
    pub duration: Duration,

    /// Easing function name
    pub easing: String,
}

impl AnimationSpec {
    /// Three-keyframe fade: opacity 1 -> 0 -> 1
    pub fn fade(duration: Duration, easing: impl Into<String>) -> Self {
        let frame = |opacity| Keyframe {
            opacity: Some(opacity),
            translate_x_pct: None,
        };
        Self {
            keyframes: vec![frame(1.0), frame(0.0), frame(1.0)],
            duration,
            easing: easing.into(),
        }
    }

    /// Three-keyframe slide: translate 0 -> `offset_pct` -> 0
    pub fn slide(offset_pct: f64, duration: Duration, easing: impl Into<String>) -> Self {
        let frame = |x| Keyframe {
            opacity: None,
            translate_x_pct: Some(x),
        };
        Self {
            keyframes: vec![frame(0.0), frame(offset_pct), frame(0.0)],
            duration,
            easing: easing.into(),
        }
    }
}

/// Terminal state of one animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// Ran to the end
    Finished,
    /// Interrupted; treated as a non-error completion
    Cancelled,
}

/// Cancels a running animation; cheap to clone
#[derive(Debug, Clone)]
pub struct AnimationController {
    cancel: std::sync::Arc<watch::Sender<bool>>,
}

impl AnimationController {
    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Caller half of a running animation
#[derive(Debug)]
pub struct AnimationHandle {
    outcome: oneshot::Receiver<AnimationOutcome>,
    controller: AnimationController,
}

impl AnimationHandle {
    /// Create a connected handle/driver pair
    pub fn pair() -> (Self, AnimationDriver) {
        let (done_tx, done_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = Self {
            outcome: done_rx,
            controller: AnimationController {
                cancel: std::sync::Arc::new(cancel_tx),
            },
        };
        let driver = AnimationDriver {
            done: done_tx,
            cancelled: cancel_rx,
        };
        (handle, driver)
    }

    /// Controller for out-of-band cancellation
    pub fn controller(&self) -> AnimationController {
        self.controller.clone()
    }

    /// Wait for the animation to settle. A vanished driver counts as a
    /// cancellation, never an error.
    pub async fn finished(self) -> AnimationOutcome {
        self.outcome.await.unwrap_or(AnimationOutcome::Cancelled)
    }
}

/// Platform half of a running animation
#[derive(Debug)]
pub struct AnimationDriver {
    done: oneshot::Sender<AnimationOutcome>,
    cancelled: watch::Receiver<bool>,
}

impl AnimationDriver {
    /// Resolve the caller's handle
    pub fn complete(self, outcome: AnimationOutcome) {
        let _ = self.done.send(outcome);
    }

    /// Wait until cancellation is requested. Pends forever when every
    /// controller is gone, so a `select!` against the animation timer keeps
    /// working.
    pub async fn wait_cancelled(&mut self) {
        if self.cancelled.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Native transition in progress; readiness and completion are separately
/// awaitable signals
#[derive(Debug)]
pub struct NativeTransition {
    /// Resolves once the platform has captured the old state and the DOM
    /// mutation may proceed
    pub ready: oneshot::Receiver<()>,

    /// Resolves once the transition has fully played out
    pub finished: oneshot::Receiver<()>,
}

/// Platform half of a native transition
#[derive(Debug)]
pub struct NativeTransitionDriver {
    pub ready: oneshot::Sender<()>,
    pub finished: oneshot::Sender<()>,
}

impl NativeTransition {
    /// Create a connected transition/driver pair
    pub fn pair() -> (Self, NativeTransitionDriver) {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();
        (
            Self {
                ready: ready_rx,
                finished: finished_rx,
            },
            NativeTransitionDriver {
                ready: ready_tx,
                finished: finished_tx,
            },
        )
    }
}

/// The DOM/runtime platform as seen by RouteFlow
#[async_trait]
pub trait Platform: Send + Sync {
    /// Capability descriptor, fixed for the platform's lifetime
    fn capabilities(&self) -> PlatformCapabilities;

    /// First element matching a selector, if any
    fn query_selector(&self, selector: &str) -> Option<ElementHandle>;

    /// The document root, always present
    fn document_root(&self) -> ElementHandle;

    /// Start a keyframe animation on the target element
    fn animate(&self, target: &ElementHandle, spec: AnimationSpec) -> Result<AnimationHandle>;

    /// Start the native view-transition primitive
    fn start_native_transition(&self) -> Result<NativeTransition>;

    /// Resolve once the target enters the given margin of the viewport
    async fn wait_near_viewport(&self, target: &ElementHandle, margin_px: u32) -> Result<()>;
}
