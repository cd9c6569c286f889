//! Node and function definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::tree_prefix;
use crate::{Channels, Params};

/// A typed node definition: the unit of computation in a graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    /// Unique key within the IR.
    pub key: String,
    /// Type tag selecting the factory that builds this node.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Physical channels the node touches.
    #[serde(default)]
    pub channels: Channels,
    /// Creation-time configuration params.
    #[serde(default)]
    pub config: Params,
    /// Input params in positional order.
    #[serde(default)]
    pub inputs: Params,
    /// Output params in positional order.
    #[serde(default)]
    pub outputs: Params,
}

impl Node {
    /// A node with the given key and type tag and no params.
    pub fn new(key: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            type_tag: type_tag.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (type: {})", self.key, self.type_tag)?;
        write_detail_tree(
            f,
            "",
            &self.channels,
            &self.config,
            &self.inputs,
            &self.outputs,
        )
    }
}

/// A callable subgraph unit: shaped like a [`Node`] without a type tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Function {
    /// Unique key within the IR.
    pub key: String,
    /// Physical channels the function touches.
    #[serde(default)]
    pub channels: Channels,
    /// Creation-time configuration params.
    #[serde(default)]
    pub config: Params,
    /// Input params in positional order.
    #[serde(default)]
    pub inputs: Params,
    /// Output params in positional order.
    #[serde(default)]
    pub outputs: Params,
}

impl Function {
    /// A function with the given key and no params.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.key)?;
        write_detail_tree(
            f,
            "",
            &self.channels,
            &self.config,
            &self.inputs,
            &self.outputs,
        )
    }
}

pub(crate) fn write_detail_tree(
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    channels: &Channels,
    config: &Params,
    inputs: &Params,
    outputs: &Params,
) -> fmt::Result {
    let has_config = !config.is_empty();
    let has_inputs = !inputs.is_empty();
    let has_outputs = !outputs.is_empty();

    let last = !has_config && !has_inputs && !has_outputs;
    writeln!(f, "{}{}channels: {}", prefix, tree_prefix(last), channels)?;

    if has_config {
        let last = !has_inputs && !has_outputs;
        writeln!(f, "{}{}config: {}", prefix, tree_prefix(last), config)?;
    }
    if has_inputs {
        writeln!(f, "{}{}inputs: {}", prefix, tree_prefix(!has_outputs), inputs)?;
    }
    if has_outputs {
        writeln!(f, "{}{}outputs: {}", prefix, tree_prefix(true), outputs)?;
    }
    Ok(())
}
