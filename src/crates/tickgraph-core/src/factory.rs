//! Node factories and the type-tag registry.

use std::time::Duration;

use tickgraph_ir as ir;
use tickgraph_telem::ChannelKey;

use crate::error::{Result, RuntimeError};
use crate::node::Node;
use crate::state::NodeHandle;
use crate::timing::gcd_duration;

/// Everything a factory needs to build one node: its IR definition and a
/// state cursor already bound to it.
pub struct NodeConfig {
    /// The node's definition from the IR.
    pub node: ir::Node,
    /// State cursor scoped to the node.
    pub handle: NodeHandle,
}

/// Builds nodes for the type tags it handles.
///
/// `create` takes `&mut self` because some factories accumulate state across
/// creations (the time factory folds a GCD base interval); such factories
/// expose it through [`base_interval`](Factory::base_interval).
pub trait Factory {
    /// True when this factory can build nodes of the given type tag.
    fn handles(&self, node_type: &str) -> bool;

    /// Build a node. Only called with configs whose type tag this factory
    /// handles.
    fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>>;

    /// Smallest common timing span contributed by the nodes this factory
    /// created, if any.
    fn base_interval(&self) -> Option<Duration> {
        None
    }
}

/// Ordered composition of factories: the first whose `handles` returns true
/// wins.
#[derive(Default)]
pub struct Registry {
    factories: Vec<Box<dyn Factory>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in node kind registered.
    pub fn defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::nodes::constant::ConstantFactory));
        registry.register(Box::new(crate::nodes::channel::ChannelFactory));
        registry.register(Box::new(crate::nodes::time::TimeFactory::new()));
        registry.register(Box::new(crate::nodes::route::MatchFactory));
        registry.register(Box::new(crate::nodes::stage::StageFactory));
        registry.register(Box::new(crate::nodes::authority::AuthorityFactory));
        registry
    }

    /// Append a factory; earlier registrations take precedence.
    pub fn register(&mut self, factory: Box<dyn Factory>) {
        self.factories.push(factory);
    }

    /// Build a node with the first factory handling its type tag.
    ///
    /// Factory errors come back decorated with the node key and type tag;
    /// an unhandled type tag is `NotFound`.
    pub fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>> {
        let key = cfg.node.key.clone();
        let type_tag = cfg.node.type_tag.clone();
        for factory in &mut self.factories {
            if !factory.handles(&type_tag) {
                continue;
            }
            return factory
                .create(cfg)
                .map_err(|err| err.while_creating(&key, &type_tag));
        }
        Err(RuntimeError::not_found(format!(
            "no factory registered for node type '{}' (node: {})",
            type_tag, key
        )))
    }

    /// GCD of the base intervals contributed by member factories, or
    /// [`UNSET_BASE_INTERVAL`](crate::timing::UNSET_BASE_INTERVAL) when no
    /// timer nodes were created.
    pub fn base_interval(&self) -> Duration {
        self.factories
            .iter()
            .filter_map(|factory| factory.base_interval())
            .reduce(gcd_duration)
            .unwrap_or(crate::timing::UNSET_BASE_INTERVAL)
    }
}

pub(crate) fn require_config<'a>(node: &'a ir::Node, name: &str) -> Result<&'a serde_json::Value> {
    match node.config.get(name) {
        Some(param) if !param.value.is_null() => Ok(&param.value),
        _ => Err(RuntimeError::invalid_config(
            &node.key,
            format!("missing required config field '{}'", name),
        )),
    }
}

pub(crate) fn optional_config<'a>(node: &'a ir::Node, name: &str) -> Option<&'a serde_json::Value> {
    node.config.get(name).filter(|p| !p.value.is_null()).map(|p| &p.value)
}

pub(crate) fn config_span(node: &ir::Node, name: &str) -> Result<Duration> {
    let nanos = require_config(node, name)?.as_i64().ok_or_else(|| {
        RuntimeError::invalid_config(
            &node.key,
            format!("config field '{}' must be integer nanoseconds", name),
        )
    })?;
    if nanos < 0 {
        return Err(RuntimeError::invalid_config(
            &node.key,
            format!("config field '{}' must be non-negative", name),
        ));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

pub(crate) fn config_channel(node: &ir::Node, name: &str) -> Result<ChannelKey> {
    let key = require_config(node, name)?.as_u64().ok_or_else(|| {
        RuntimeError::invalid_config(
            &node.key,
            format!("config field '{}' must be a channel key", name),
        )
    })?;
    ChannelKey::try_from(key).map_err(|_| {
        RuntimeError::invalid_config(
            &node.key,
            format!("config field '{}' is out of range for a channel key", name),
        )
    })
}
