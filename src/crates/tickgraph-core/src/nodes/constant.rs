//! Constant source node.

use tickgraph_ir::DEFAULT_OUTPUT_PARAM;
use tickgraph_telem::{Sample, TimeStamp};

use crate::error::{Result, RuntimeError};
use crate::factory::{require_config, Factory, NodeConfig};
use crate::node::{Context, Node, Reason};
use crate::state::{NodeHandle, State};

/// Outputs a configured value once after construction or reset; subsequent
/// dispatches are no-ops.
#[derive(Debug)]
pub struct Constant {
    handle: NodeHandle,
    sample: Sample,
    initialized: bool,
}

impl Constant {
    fn new(handle: NodeHandle, sample: Sample) -> Self {
        Self {
            handle,
            sample,
            initialized: false,
        }
    }
}

impl Node for Constant {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        let output = self.handle.output(ctx.state, 0);
        output.resize(1);
        output.set(0, self.sample.clone())?;
        let output_time = self.handle.output_time(ctx.state, 0);
        output_time.resize(1);
        output_time.set(0, Sample::Timestamp(TimeStamp::now()))?;
        ctx.mark_changed(DEFAULT_OUTPUT_PARAM);
        Ok(())
    }

    fn reset(&mut self) {
        self.initialized = false;
    }

    fn seed_reason(&self) -> Option<Reason> {
        Some(Reason::TimerTick)
    }

    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.handle.is_output_truthy(state, param_name)
    }
}

/// Builds [`Constant`] nodes for `constant` type tags.
pub struct ConstantFactory;

impl Factory for ConstantFactory {
    fn handles(&self, node_type: &str) -> bool {
        node_type == "constant"
    }

    fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>> {
        let value = require_config(&cfg.node, "value")?;
        let output = cfg.node.outputs.iter().next().ok_or_else(|| {
            RuntimeError::invalid_config(&cfg.node.key, "missing output definition")
        })?;
        let sample = Sample::from_json(output.data_type, value)
            .map_err(|err| RuntimeError::invalid_config(&cfg.node.key, err.to_string()))?;
        Ok(Box::new(Constant::new(cfg.handle, sample)))
    }
}
