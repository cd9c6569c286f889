//! Edge endpoints and connection kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(node, param)` pair naming one endpoint of a connection.
///
/// Equality and hashing are structural, so handles work as map keys for
/// output slots and edge indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Handle {
    /// Key of the node this endpoint belongs to.
    pub node: String,
    /// Name of the param on that node.
    pub param: String,
}

impl Handle {
    /// Build a handle from a node key and param name.
    pub fn new(node: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            param: param.into(),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.param)
    }
}

/// Propagation discipline of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Propagates whenever the source output changes.
    #[default]
    Continuous,
    /// Propagates only when the source output is truthy at the moment of
    /// change.
    OneShot,
}

/// A directed connection between two handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Upstream endpoint.
    pub source: Handle,
    /// Downstream endpoint.
    pub target: Handle,
    /// Propagation discipline.
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    /// A continuous edge from `source` to `target`.
    pub fn new(source: Handle, target: Handle) -> Self {
        Self {
            source,
            target,
            kind: EdgeKind::Continuous,
        }
    }

    /// A one-shot edge from `source` to `target`.
    pub fn one_shot(source: Handle, target: Handle) -> Self {
        Self {
            source,
            target,
            kind: EdgeKind::OneShot,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (arrow, kind) = match self.kind {
            EdgeKind::OneShot => ("=>", "oneshot"),
            EdgeKind::Continuous => ("->", "continuous"),
        };
        write!(f, "{} {} {} ({})", self.source, arrow, self.target, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        assert_eq!(Handle::new("timer", "output").to_string(), "timer.output");
    }

    #[test]
    fn test_edge_display_distinguishes_kinds() {
        let continuous = Edge::new(Handle::new("a", "x"), Handle::new("b", "y"));
        assert_eq!(continuous.to_string(), "a.x -> b.y (continuous)");

        let one_shot = Edge::one_shot(Handle::new("a", "x"), Handle::new("b", "y"));
        assert_eq!(one_shot.to_string(), "a.x => b.y (oneshot)");
    }

    #[test]
    fn test_handle_structural_equality() {
        assert_eq!(Handle::new("n", "p"), Handle::new("n", "p"));
        assert_ne!(Handle::new("n", "p"), Handle::new("n", "q"));
    }
}
