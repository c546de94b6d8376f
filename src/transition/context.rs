//! Transition context
//!
//! The per-navigation descriptor consumed once by the executor.

use serde::{Deserialize, Serialize};

use crate::platform::ElementHandle;
use crate::route::RouteMatch;

/// Direction of a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationDirection {
    Forward,
    Back,
    Replace,
}

/// Everything the executor needs to know about one navigation change
#[derive(Debug, Clone)]
pub struct TransitionContext {
    /// Match being navigated away from; absent on the initial load
    pub from: Option<RouteMatch>,

    /// Match being navigated to
    pub to: RouteMatch,

    /// Explicit direction; derived from route-tree depth when absent
    pub direction: Option<NavigationDirection>,

    /// Whether this is the first navigation of the session
    pub is_initial: bool,

    /// Explicit animation target, overriding container resolution
    pub target: Option<ElementHandle>,
}

impl TransitionContext {
    /// Context for a navigation between two matches
    pub fn new(from: RouteMatch, to: RouteMatch) -> Self {
        Self {
            from: Some(from),
            to,
            direction: None,
            is_initial: false,
            target: None,
        }
    }

    /// Context for the initial load
    pub fn initial(to: RouteMatch) -> Self {
        Self {
            from: None,
            to,
            direction: None,
            is_initial: true,
            target: None,
        }
    }

    /// Pin an explicit direction
    pub fn with_direction(mut self, direction: NavigationDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Pin an explicit animation target
    pub fn with_target(mut self, target: ElementHandle) -> Self {
        self.target = Some(target);
        self
    }

    /// Explicit direction when supplied, otherwise derived from relative
    /// route-tree depth: shallower -> deeper is forward, deeper -> shallower
    /// is back, equal depth is replace. No previous match means forward.
    pub fn resolved_direction(&self) -> NavigationDirection {
        if let Some(direction) = self.direction {
            return direction;
        }
        match &self.from {
            None => NavigationDirection::Forward,
            Some(from) => {
                let (from_depth, to_depth) = (from.depth(), self.to.depth());
                if to_depth > from_depth {
                    NavigationDirection::Forward
                } else if to_depth < from_depth {
                    NavigationDirection::Back
                } else {
                    NavigationDirection::Replace
                }
            }
        }
    }

    /// Whether origin and destination are the same route
    pub fn is_same_route(&self) -> bool {
        self.from
            .as_ref()
            .map(|from| from.id == self.to.id)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn nested(id: &str, parent: Option<Arc<RouteMatch>>) -> RouteMatch {
        let mut route = RouteMatch::new(id, format!("/{id}"));
        route.parent = parent;
        route
    }

    #[test]
    fn test_direction_derived_from_depth() {
        let root = Arc::new(nested("root", None));
        let child = nested("child", Some(root.clone()));

        let deeper = TransitionContext::new((*root).clone(), child.clone());
        assert_eq!(deeper.resolved_direction(), NavigationDirection::Forward);

        let shallower = TransitionContext::new(child.clone(), (*root).clone());
        assert_eq!(shallower.resolved_direction(), NavigationDirection::Back);

        let sibling = TransitionContext::new(
            nested("a", Some(root.clone())),
            nested("b", Some(root.clone())),
        );
        assert_eq!(sibling.resolved_direction(), NavigationDirection::Replace);
    }

    #[test]
    fn test_explicit_direction_wins() {
        let ctx = TransitionContext::new(RouteMatch::new("a", "/a"), RouteMatch::new("b", "/b"))
            .with_direction(NavigationDirection::Back);
        assert_eq!(ctx.resolved_direction(), NavigationDirection::Back);
    }

    #[test]
    fn test_initial_load_is_forward() {
        let ctx = TransitionContext::initial(RouteMatch::new("home", "/"));
        assert!(ctx.is_initial);
        assert_eq!(ctx.resolved_direction(), NavigationDirection::Forward);
        assert!(!ctx.is_same_route());
    }

    #[test]
    fn test_same_route_detection() {
        let ctx = TransitionContext::new(
            RouteMatch::new("products", "/products"),
            RouteMatch::new("products", "/products"),
        );
        assert!(ctx.is_same_route());
    }
}
