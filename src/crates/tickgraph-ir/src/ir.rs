//! The immutable IR container, lookups, and structural validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::format::{tree_indent, tree_prefix};
use crate::{Edge, Function, Handle, Node, Sequence, Strata};

/// Structural validation failures for an [`IR`].
///
/// These fail fast: a graph that does not validate is rejected before any
/// node is constructed.
///
/// `Display`/`Error` are implemented by hand rather than via `thiserror`'s
/// derive because `StratumOrder::source` is a `usize`, not an error cause,
/// and `thiserror` always treats a field literally named `source` as the
/// error's source.
#[derive(Debug)]
pub enum IrError {
    /// Two nodes share a key.
    DuplicateNode {
        /// The repeated key.
        key: String,
    },

    /// An edge endpoint names a node that does not exist.
    UnknownNode {
        /// Rendered edge.
        edge: String,
        /// The missing node key.
        node: String,
    },

    /// An edge endpoint names a param its node does not declare.
    UnknownParam {
        /// Rendered edge.
        edge: String,
        /// The dangling handle.
        handle: String,
    },

    /// A stratum lists a node that does not exist.
    StratumUnknownNode {
        /// Index of the offending stratum.
        stratum: usize,
        /// The missing node key.
        node: String,
    },

    /// A node appears in more than one stratum.
    StratumDuplicateNode {
        /// The repeated node key.
        node: String,
    },

    /// Strata are declared but omit a node.
    StratumMissingNode {
        /// The uncovered node key.
        node: String,
    },

    /// An edge runs from a later stratum back into an earlier one.
    StratumOrder {
        /// Rendered edge.
        edge: String,
        /// Stratum of the edge's source node.
        source: usize,
        /// Stratum of the edge's target node.
        target: usize,
    },

    /// A stage lists a node that does not exist.
    StageUnknownNode {
        /// Key of the offending stage.
        stage: String,
        /// The missing node key.
        node: String,
    },
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::DuplicateNode { key } => write!(f, "duplicate node key '{key}'"),
            IrError::UnknownNode { edge, node } => {
                write!(f, "edge {edge} references unknown node '{node}'")
            }
            IrError::UnknownParam { edge, handle } => {
                write!(f, "edge {edge} references unknown param '{handle}'")
            }
            IrError::StratumUnknownNode { stratum, node } => {
                write!(f, "stratum {stratum} references unknown node '{node}'")
            }
            IrError::StratumDuplicateNode { node } => {
                write!(f, "node '{node}' appears in more than one stratum")
            }
            IrError::StratumMissingNode { node } => {
                write!(f, "node '{node}' is missing from the strata")
            }
            IrError::StratumOrder {
                edge,
                source,
                target,
            } => write!(
                f,
                "edge {edge} runs from stratum {source} back to stratum {target}"
            ),
            IrError::StageUnknownNode { stage, node } => {
                write!(f, "stage '{stage}' references unknown node '{node}'")
            }
        }
    }
}

impl std::error::Error for IrError {}

/// An immutable compiled graph: functions, nodes, edges, topological strata,
/// and stage sequences.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IR {
    /// Callable subgraph units.
    #[serde(default)]
    pub functions: Vec<Function>,
    /// Node definitions in declaration order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Directed connections in declaration order.
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Topological layers over the nodes.
    #[serde(default)]
    pub strata: Strata,
    /// Stage sequences.
    #[serde(default)]
    pub sequences: Vec<Sequence>,
}

impl IR {
    /// Look up a node by key.
    pub fn find_node(&self, key: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Look up a function by key.
    pub fn find_function(&self, key: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.key == key)
    }

    /// Look up a sequence by key.
    pub fn find_sequence(&self, key: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.key == key)
    }

    /// Edges whose source node is `node_key`, in declaration order.
    pub fn outgoing_edges(&self, node_key: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.source.node == node_key)
            .collect()
    }

    /// Edges whose target node is `node_key`, in declaration order.
    pub fn incoming_edges(&self, node_key: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.target.node == node_key)
            .collect()
    }

    /// The edge targeting `handle`, if one exists.
    pub fn edge_into(&self, handle: &Handle) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.target == handle)
    }

    /// Fail-fast structural validation.
    ///
    /// Checks key uniqueness, edge endpoint resolution, strata coverage and
    /// topological ordering, and stage membership. When `strata` is empty
    /// the strata checks are skipped (the runtime synthesizes a single
    /// layer).
    pub fn validate(&self) -> Result<(), IrError> {
        let mut keys = HashSet::new();
        for node in &self.nodes {
            if !keys.insert(node.key.as_str()) {
                return Err(IrError::DuplicateNode {
                    key: node.key.clone(),
                });
            }
        }

        for edge in &self.edges {
            let source = self.find_node(&edge.source.node).ok_or_else(|| {
                IrError::UnknownNode {
                    edge: edge.to_string(),
                    node: edge.source.node.clone(),
                }
            })?;
            if source.outputs.get(&edge.source.param).is_none() {
                return Err(IrError::UnknownParam {
                    edge: edge.to_string(),
                    handle: edge.source.to_string(),
                });
            }
            let target = self.find_node(&edge.target.node).ok_or_else(|| {
                IrError::UnknownNode {
                    edge: edge.to_string(),
                    node: edge.target.node.clone(),
                }
            })?;
            if target.inputs.get(&edge.target.param).is_none() {
                return Err(IrError::UnknownParam {
                    edge: edge.to_string(),
                    handle: edge.target.to_string(),
                });
            }
        }

        if !self.strata.is_empty() {
            let mut placed = HashSet::new();
            for (i, stratum) in self.strata.iter().enumerate() {
                for key in stratum {
                    if self.find_node(key).is_none() {
                        return Err(IrError::StratumUnknownNode {
                            stratum: i,
                            node: key.clone(),
                        });
                    }
                    if !placed.insert(key.as_str()) {
                        return Err(IrError::StratumDuplicateNode { node: key.clone() });
                    }
                }
            }
            for node in &self.nodes {
                if !placed.contains(node.key.as_str()) {
                    return Err(IrError::StratumMissingNode {
                        node: node.key.clone(),
                    });
                }
            }
            for edge in &self.edges {
                if let (Some(source), Some(target)) = (
                    self.strata.stratum_of(&edge.source.node),
                    self.strata.stratum_of(&edge.target.node),
                ) {
                    if source > target {
                        return Err(IrError::StratumOrder {
                            edge: edge.to_string(),
                            source,
                            target,
                        });
                    }
                }
            }
        }

        for sequence in &self.sequences {
            for stage in &sequence.stages {
                for key in &stage.nodes {
                    if self.find_node(key).is_none() {
                        return Err(IrError::StageUnknownNode {
                            stage: stage.key.clone(),
                            node: key.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

fn write_section(
    f: &mut fmt::Formatter<'_>,
    last: bool,
    title: &str,
    rendered: &[String],
) -> fmt::Result {
    writeln!(f, "{}{}", tree_prefix(last), title)?;
    let indent = tree_indent(last);
    for (i, text) in rendered.iter().enumerate() {
        let entry_last = i == rendered.len() - 1;
        let mut lines = text.lines();
        if let Some(first) = lines.next() {
            writeln!(f, "{}{}{}", indent, tree_prefix(entry_last), first)?;
            for line in lines {
                writeln!(f, "{}{}{}", indent, tree_indent(entry_last), line)?;
            }
        }
    }
    Ok(())
}

impl fmt::Display for IR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_functions = !self.functions.is_empty();
        let has_nodes = !self.nodes.is_empty();
        let has_edges = !self.edges.is_empty();
        let has_strata = !self.strata.is_empty();
        let has_sequences = !self.sequences.is_empty();

        if has_functions {
            let last = !has_nodes && !has_edges && !has_strata && !has_sequences;
            let rendered: Vec<String> = self.functions.iter().map(|x| x.to_string()).collect();
            write_section(
                f,
                last,
                &format!("Functions ({})", self.functions.len()),
                &rendered,
            )?;
        }
        if has_nodes {
            let last = !has_edges && !has_strata && !has_sequences;
            let rendered: Vec<String> = self.nodes.iter().map(|x| x.to_string()).collect();
            write_section(f, last, &format!("Nodes ({})", self.nodes.len()), &rendered)?;
        }
        if has_edges {
            let last = !has_strata && !has_sequences;
            let rendered: Vec<String> = self.edges.iter().map(|x| x.to_string()).collect();
            write_section(f, last, &format!("Edges ({})", self.edges.len()), &rendered)?;
        }
        if has_strata {
            writeln!(
                f,
                "{}Strata ({} layers)",
                tree_prefix(!has_sequences),
                self.strata.len()
            )?;
            let indent = tree_indent(!has_sequences);
            for line in self.strata.to_string().lines() {
                writeln!(f, "{}{}", indent, line)?;
            }
        }
        if has_sequences {
            let rendered: Vec<String> = self.sequences.iter().map(|x| x.to_string()).collect();
            write_section(
                f,
                true,
                &format!("Sequences ({})", self.sequences.len()),
                &rendered,
            )?;
        }
        Ok(())
    }
}
