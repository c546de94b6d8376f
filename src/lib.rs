//! RouteFlow - navigation orchestration core for client-side routers
//!
//! Two subsystems drive a router's dynamic behavior:
//! - on-demand chunk loading with retry, timeout, single-flight dedup, and
//!   connection-aware preloading heuristics
//! - serialized visual transitions with strict FIFO ordering, cancellation,
//!   and graceful fallback
//!
//! Route matching, head-tag handling, and UI wiring live outside this crate
//! and talk to it through [`RouteFlow`] and the capability traits in
//! [`platform`] and [`network`].

pub mod config;
pub mod error;
pub mod loader;
pub mod network;
pub mod platform;
pub mod preload;
pub mod registry;
pub mod route;
pub mod runtime;
pub mod transition;

pub use config::{ConfigPatch, PreloadStrategy, RouteFlowConfig, SplitStrategy, TransitionKind};
pub use error::{LoadError, TransitionError};
pub use registry::{ChunkStats, ChunkStatus};
pub use route::{ChunkFactory, ChunkModule, LazyImport, RouteMatch};
pub use runtime::{RouteFlow, RouteFlowBuilder, RuntimeStatus};
pub use transition::{NavigationDirection, TransitionContext, TransitionHandle};
