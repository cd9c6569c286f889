//! Stage-entry activation node.

use crate::error::Result;
use crate::factory::{Factory, NodeConfig};
use crate::node::{Context, Node};
use crate::state::State;

/// Entry point of a stage: requests a transition to the next stage in its
/// sequence.
///
/// Entry nodes only execute when edge propagation adds them to the changed
/// set; for one-shot edges the scheduler has already checked the upstream
/// output's truthiness, so no input check is needed here.
#[derive(Debug)]
pub struct StageEntry;

impl Node for StageEntry {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        ctx.activate_stage();
        Ok(())
    }

    fn is_output_truthy(&self, _state: &State, _param_name: &str) -> bool {
        false
    }
}

/// Builds [`StageEntry`] nodes for `stage_entry` type tags.
pub struct StageFactory;

impl Factory for StageFactory {
    fn handles(&self, node_type: &str) -> bool {
        node_type == "stage_entry"
    }

    fn create(&mut self, _cfg: NodeConfig) -> Result<Box<dyn Node>> {
        Ok(Box::new(StageEntry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Effects, Reason};
    use std::sync::Arc;
    use std::time::Duration;
    use tickgraph_ir::IR;

    #[test]
    fn test_next_requests_stage_activation() {
        let mut state = State::new(Arc::new(IR::default()), Vec::new());
        let mut effects = Effects::new();
        let mut ctx = Context::new(
            Duration::from_secs(1),
            Duration::ZERO,
            Reason::Activation,
            &mut state,
            &mut effects,
        );
        StageEntry.next(&mut ctx).unwrap();
        assert!(effects.take_stage_request());
    }

    #[test]
    fn test_output_is_never_truthy() {
        let state = State::new(Arc::new(IR::default()), Vec::new());
        let entry = StageEntry;
        assert!(!entry.is_output_truthy(&state, "output"));
        assert!(!entry.is_output_truthy(&state, "anything"));
        assert!(!entry.is_output_truthy(&state, ""));
    }

    #[test]
    fn test_factory_handles_only_stage_entry() {
        let factory = StageFactory;
        assert!(factory.handles("stage_entry"));
        assert!(!factory.handles("constant"));
        assert!(!factory.handles(""));
    }
}
