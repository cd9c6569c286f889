//! String-matching router node.

use std::collections::BTreeMap;

use tickgraph_telem::{Sample, TimeStamp};

use crate::error::{Result, RuntimeError};
use crate::factory::{require_config, Factory, NodeConfig};
use crate::node::{Context, Node};
use crate::state::{NodeHandle, State};

#[derive(Debug, Clone)]
struct CaseMapping {
    output_index: usize,
    output_name: String,
}

/// Routes a string input to the output slot of the matching case, firing a
/// `u8(1)` signal on it.
#[derive(Debug)]
pub struct Match {
    key: String,
    handle: NodeHandle,
    cases: BTreeMap<String, CaseMapping>,
}

impl Node for Match {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        if !self.handle.refresh_inputs(ctx.state) {
            return Ok(());
        }
        let input = self.handle.input(0);
        if input.is_empty() {
            return Ok(());
        }
        let Some(sample) = input.at(0) else {
            return Ok(());
        };
        let Some(value) = sample.as_str() else {
            return Err(RuntimeError::node_failure(
                &self.key,
                format!("match input must be a string, got {}", sample.data_type()),
            ));
        };
        if let Some(mapping) = self.cases.get(value) {
            let output = self.handle.output(ctx.state, mapping.output_index);
            output.resize(1);
            output.set(0, Sample::U8(1))?;
            let output_time = self.handle.output_time(ctx.state, mapping.output_index);
            output_time.resize(1);
            output_time.set(0, Sample::Timestamp(TimeStamp::now()))?;
            ctx.mark_changed(mapping.output_name.clone());
        }
        Ok(())
    }

    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.handle.is_output_truthy(state, param_name)
    }
}

/// Builds [`Match`] nodes for `match` type tags.
///
/// Cases are configured as `[{ "value": <string>, "output": <name> }]`; a
/// case naming an output the node does not declare is rejected at creation.
pub struct MatchFactory;

impl Factory for MatchFactory {
    fn handles(&self, node_type: &str) -> bool {
        node_type == "match"
    }

    fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>> {
        let cases_value = require_config(&cfg.node, "cases")?;
        let entries = cases_value.as_array().ok_or_else(|| {
            RuntimeError::invalid_config(&cfg.node.key, "config field 'cases' must be an array")
        })?;

        let mut cases = BTreeMap::new();
        for entry in entries {
            let value = entry.get("value").and_then(|v| v.as_str()).ok_or_else(|| {
                RuntimeError::invalid_config(&cfg.node.key, "case missing string field 'value'")
            })?;
            let output_name = entry.get("output").and_then(|v| v.as_str()).ok_or_else(|| {
                RuntimeError::invalid_config(&cfg.node.key, "case missing string field 'output'")
            })?;
            let output_index = cfg.node.outputs.index_of(output_name).ok_or_else(|| {
                RuntimeError::invalid_config(
                    &cfg.node.key,
                    format!(
                        "case '{}' routes to unknown output '{}'",
                        value, output_name
                    ),
                )
            })?;
            cases.insert(
                value.to_string(),
                CaseMapping {
                    output_index,
                    output_name: output_name.to_string(),
                },
            );
        }

        Ok(Box::new(Match {
            key: cfg.node.key,
            handle: cfg.handle,
            cases,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Effects, Reason};
    use std::sync::Arc;
    use std::time::Duration;
    use tickgraph_ir::{
        Edge, Handle, Node as NodeDef, Param, Params, DEFAULT_INPUT_PARAM, DEFAULT_OUTPUT_PARAM,
        IR,
    };
    use tickgraph_telem::{DataType, Series, TimeStamp};

    fn router_ir() -> (Arc<IR>, NodeDef) {
        let mut producer = NodeDef::new("producer", "constant");
        producer.outputs = Params(vec![Param::new(DEFAULT_OUTPUT_PARAM, DataType::String)]);

        let mut router = NodeDef::new("router", "match");
        router.inputs = Params(vec![Param::new(DEFAULT_INPUT_PARAM, DataType::String)]);
        router.outputs = Params(vec![
            Param::new("a", DataType::U8),
            Param::new("b", DataType::U8),
        ]);
        router.config = Params(vec![Param::with_value(
            "cases",
            DataType::String,
            serde_json::json!([
                { "value": "A", "output": "a" },
                { "value": "B", "output": "b" },
            ]),
        )]);

        let ir = Arc::new(IR {
            nodes: vec![producer, router.clone()],
            edges: vec![Edge::new(
                Handle::new("producer", DEFAULT_OUTPUT_PARAM),
                Handle::new("router", DEFAULT_INPUT_PARAM),
            )],
            ..IR::default()
        });
        (ir, router)
    }

    fn feed(state: &mut State, value: &str, stamp: i64) {
        let producer = state.node("producer").unwrap();
        *producer.output(state, 0) = Series::from(vec![value.to_string()]);
        *producer.output_time(state, 0) = Series::timestamps(vec![TimeStamp(stamp)]);
    }

    fn dispatch(state: &mut State, node: &mut Box<dyn Node>) -> Result<Vec<String>> {
        let mut effects = Effects::new();
        let mut ctx = Context::new(
            Duration::ZERO,
            Duration::ZERO,
            Reason::Activation,
            state,
            &mut effects,
        );
        node.next(&mut ctx)?;
        Ok(effects.take_changed())
    }

    #[test]
    fn test_routes_matching_case_only() {
        let (ir, def) = router_ir();
        let mut state = State::new(ir, Vec::new());
        let handle = state.node("router").unwrap();
        let mut node = MatchFactory.create(NodeConfig { node: def, handle }).unwrap();

        feed(&mut state, "A", 100);
        let changed = dispatch(&mut state, &mut node).unwrap();
        assert_eq!(changed, vec!["a"]);

        let a = state.output(&Handle::new("router", "a")).unwrap();
        assert_eq!(a.data.at(0), Some(Sample::U8(1)));
        let b = state.output(&Handle::new("router", "b")).unwrap();
        assert!(b.data.is_empty());
    }

    #[test]
    fn test_unmatched_value_is_silent() {
        let (ir, def) = router_ir();
        let mut state = State::new(ir, Vec::new());
        let handle = state.node("router").unwrap();
        let mut node = MatchFactory.create(NodeConfig { node: def, handle }).unwrap();

        feed(&mut state, "C", 100);
        assert!(dispatch(&mut state, &mut node).unwrap().is_empty());
    }

    #[test]
    fn test_no_new_input_is_silent() {
        let (ir, def) = router_ir();
        let mut state = State::new(ir, Vec::new());
        let handle = state.node("router").unwrap();
        let mut node = MatchFactory.create(NodeConfig { node: def, handle }).unwrap();
        assert!(dispatch(&mut state, &mut node).unwrap().is_empty());
    }

    #[test]
    fn test_non_string_input_is_a_node_failure() {
        let (ir, def) = router_ir();
        let mut state = State::new(ir, Vec::new());
        let handle = state.node("router").unwrap();
        let mut node = MatchFactory.create(NodeConfig { node: def, handle }).unwrap();

        let producer = state.node("producer").unwrap();
        *producer.output(&mut state, 0) = Series::from(vec![1i32]);
        *producer.output_time(&mut state, 0) = Series::timestamps(vec![TimeStamp(100)]);

        let err = dispatch(&mut state, &mut node).unwrap_err();
        assert!(matches!(err, RuntimeError::NodeFailure { .. }));
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_case_with_unknown_output_is_invalid_config() {
        let (ir, mut def) = router_ir();
        def.config = Params(vec![Param::with_value(
            "cases",
            DataType::String,
            serde_json::json!([{ "value": "A", "output": "ghost" }]),
        )]);
        let state = State::new(ir, Vec::new());
        let handle = state.node("router").unwrap();
        let err = MatchFactory
            .create(NodeConfig { node: def, handle })
            .unwrap_err();
        assert!(err.to_string().contains("unknown output 'ghost'"));
    }
}
