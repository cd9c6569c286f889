//! Strata, stages, and sequences.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::tree_prefix;

/// Topological layers of node keys.
///
/// Invariant (checked by [`IR::validate`](crate::IR::validate)): every
/// edge's source node sits in a stratum no later than its target node's.
/// Execution within a stratum is unordered; between strata it is strict.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strata(pub Vec<Vec<String>>);

impl Strata {
    /// Number of layers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no layers are declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Layer index of the given node, if it appears in any stratum.
    pub fn stratum_of(&self, node_key: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|stratum| stratum.iter().any(|key| key == node_key))
    }

    /// Iterate layers in topological order.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<String>> {
        self.0.iter()
    }
}

impl fmt::Display for Strata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stratum) in self.0.iter().enumerate() {
            writeln!(
                f,
                "{}[{}]: {}",
                tree_prefix(i == self.0.len() - 1),
                i,
                stratum.join(", ")
            )?;
        }
        Ok(())
    }
}

/// A named set of nodes active while the stage is current.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stage {
    /// Unique key within the sequence.
    pub key: String,
    /// Keys of the nodes active during this stage.
    pub nodes: Vec<String>,
}

impl Stage {
    /// A stage from a key and member node keys.
    pub fn new(key: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            key: key.into(),
            nodes,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}]", self.key, self.nodes.join(", "))
    }
}

/// An ordered, linear list of stages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sequence {
    /// Unique key within the IR.
    pub key: String,
    /// Stages in activation order.
    pub stages: Vec<Stage>,
}

impl Sequence {
    /// A sequence from a key and ordered stages.
    pub fn new(key: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            key: key.into(),
            stages,
        }
    }

    /// Look up a stage by key.
    pub fn find_stage(&self, stage_key: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.key == stage_key)
    }

    /// The stage defined immediately after the given one, or `None` when the
    /// given stage is last or unknown.
    pub fn next_stage(&self, stage_key: &str) -> Option<&Stage> {
        let idx = self.stages.iter().position(|s| s.key == stage_key)?;
        self.stages.get(idx + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.key)?;
        for (i, stage) in self.stages.iter().enumerate() {
            writeln!(f, "{}{}", tree_prefix(i == self.stages.len() - 1), stage)?;
        }
        Ok(())
    }
}
