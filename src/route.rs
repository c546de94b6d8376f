//! Route interface types
//!
//! The matching engine is an external collaborator; RouteFlow consumes its
//! resolved matches through the types in this module.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// A resolved module/value produced by a chunk factory
pub type ChunkModule = Arc<dyn Any + Send + Sync>;

/// Asynchronous factory producing a chunk's module/value
pub type ChunkFactory = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<ChunkModule>> + Send + Sync>;

/// Lazy-load metadata attached to a route by the router
#[derive(Clone)]
pub struct LazyImport {
    /// Factory invoked to load the route's chunk
    pub import: ChunkFactory,

    /// Optional size estimate in bytes, for introspection only
    pub size_estimate: Option<u64>,
}

impl LazyImport {
    /// Wrap a factory with no size estimate
    pub fn new(import: ChunkFactory) -> Self {
        Self {
            import,
            size_estimate: None,
        }
    }
}

impl fmt::Debug for LazyImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyImport")
            .field("import", &"<factory>")
            .field("size_estimate", &self.size_estimate)
            .finish()
    }
}

/// A resolved route match as exposed by the matching engine
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Stable route identifier
    pub id: String,

    /// Matched path pattern
    pub path: String,

    /// Parent link, used for route-tree depth computation
    pub parent: Option<Arc<RouteMatch>>,

    /// Lazy-load metadata, absent for eagerly-bundled routes
    pub lazy: Option<LazyImport>,
}

impl RouteMatch {
    /// Create a match with no parent and no lazy metadata
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            parent: None,
            lazy: None,
        }
    }

    /// Attach a parent match
    pub fn with_parent(mut self, parent: Arc<RouteMatch>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attach lazy-load metadata
    pub fn with_lazy(mut self, lazy: LazyImport) -> Self {
        self.lazy = Some(lazy);
        self
    }

    /// Depth in the route tree (root match = 0)
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_deref();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent.as_deref();
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth() {
        let root = Arc::new(RouteMatch::new("root", "/"));
        let child = Arc::new(RouteMatch::new("products", "/products").with_parent(root.clone()));
        let leaf = RouteMatch::new("product-detail", "/products/:id").with_parent(child.clone());

        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
        assert_eq!(leaf.depth(), 2);
    }
}
