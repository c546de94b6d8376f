//! Configuration schema definitions

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Code-splitting strategy for chunk key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitStrategy {
    /// One chunk per route
    RouteBased,
    /// One chunk per feature area
    FeatureBased,
    /// Route-based with feature-level sharing
    Hybrid,
}

/// Preload trigger mechanism; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreloadStrategy {
    /// Debounced pointer-enter intent
    Hover,
    /// Element enters a proximity margin of the viewport
    Visible,
    /// Load as soon as the route is registered
    Immediate,
    /// No speculative loading
    None,
}

/// Visual transition algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    /// Platform-native transition primitive
    ViewTransition,
    /// Built-in opacity animation
    Fade,
    /// Built-in translate animation, signed by navigation direction
    Slide,
    /// User-supplied callback
    Custom,
    /// Immediate completion, no visual effect
    None,
}

/// Chunk loading configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Code-splitting strategy
    #[serde(default = "default_strategy")]
    pub strategy: SplitStrategy,

    /// Active preload trigger
    #[serde(default = "default_preload")]
    pub preload: PreloadStrategy,

    /// Maximum load attempts per chunk (>= 1)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Linear backoff unit between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt time budget, in milliseconds
    #[serde(default = "default_preload_timeout_ms")]
    pub preload_timeout_ms: u64,

    /// Gate preloading on connection advice
    #[serde(default = "default_true")]
    pub connection_aware: bool,

    /// Hover-intent debounce window, in milliseconds
    #[serde(default = "default_hover_delay_ms")]
    pub hover_delay_ms: u64,

    /// Viewport proximity margin for the visible strategy, in pixels
    #[serde(default = "default_visibility_margin_px")]
    pub visibility_margin_px: u32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            preload: default_preload(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            preload_timeout_ms: default_preload_timeout_ms(),
            connection_aware: true,
            hover_delay_ms: default_hover_delay_ms(),
            visibility_margin_px: default_visibility_margin_px(),
        }
    }
}

impl ChunkConfig {
    /// Backoff unit as a `Duration`
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Per-attempt timeout as a `Duration`
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.preload_timeout_ms)
    }

    /// Hover debounce as a `Duration`
    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }
}

fn default_strategy() -> SplitStrategy {
    SplitStrategy::RouteBased
}

fn default_preload() -> PreloadStrategy {
    PreloadStrategy::Hover
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_preload_timeout_ms() -> u64 {
    5000
}

fn default_hover_delay_ms() -> u64 {
    100
}

fn default_visibility_margin_px() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

/// Visual transition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Master switch for animated transitions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Primary transition kind
    #[serde(default = "default_kind")]
    pub kind: TransitionKind,

    /// Animation duration, in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    /// Animation easing function name
    #[serde(default = "default_easing")]
    pub easing: String,

    /// Complete instantly when origin and destination routes are equal
    #[serde(default = "default_true")]
    pub skip_same_route: bool,

    /// Secondary kind attempted once when the primary fails
    #[serde(default = "default_fallback")]
    pub fallback: Option<TransitionKind>,

    /// Honor the user's reduced-motion preference
    #[serde(default = "default_true")]
    pub respect_preferences: bool,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: default_kind(),
            duration_ms: default_duration_ms(),
            easing: default_easing(),
            skip_same_route: true,
            fallback: default_fallback(),
            respect_preferences: true,
        }
    }
}

impl TransitionConfig {
    /// Animation duration as a `Duration`
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

fn default_kind() -> TransitionKind {
    TransitionKind::ViewTransition
}

fn default_duration_ms() -> u64 {
    300
}

fn default_easing() -> String {
    "ease-in-out".to_string()
}

fn default_fallback() -> Option<TransitionKind> {
    Some(TransitionKind::Fade)
}
