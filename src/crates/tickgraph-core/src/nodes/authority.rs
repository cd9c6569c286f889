//! Channel authority control node.

use tickgraph_telem::ChannelKey;

use crate::error::{Result, RuntimeError};
use crate::factory::{optional_config, require_config, Factory, NodeConfig};
use crate::node::{Context, Node};
use crate::state::State;

/// Buffers an authority change request in the runtime state; the host
/// drains the queue after each tick. Emits no output.
#[derive(Debug)]
pub struct SetAuthority {
    authority: u8,
    channel: Option<ChannelKey>,
}

impl Node for SetAuthority {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        ctx.state.set_authority(self.channel, self.authority);
        Ok(())
    }

    fn is_output_truthy(&self, _state: &State, _param_name: &str) -> bool {
        false
    }
}

/// Builds [`SetAuthority`] nodes for `set_authority` type tags.
///
/// Config: `value` (required authority level), `channel` (absent or zero
/// means the change applies globally).
pub struct AuthorityFactory;

impl Factory for AuthorityFactory {
    fn handles(&self, node_type: &str) -> bool {
        node_type == "set_authority"
    }

    fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>> {
        let authority = require_config(&cfg.node, "value")?
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| {
                RuntimeError::invalid_config(
                    &cfg.node.key,
                    "config field 'value' must be an authority level (0-255)",
                )
            })?;
        let channel = match optional_config(&cfg.node, "channel") {
            None => None,
            Some(value) => {
                let key = value.as_u64().and_then(|v| ChannelKey::try_from(v).ok()).ok_or_else(
                    || {
                        RuntimeError::invalid_config(
                            &cfg.node.key,
                            "config field 'channel' must be a channel key",
                        )
                    },
                )?;
                (key != 0).then_some(key)
            }
        };
        Ok(Box::new(SetAuthority { authority, channel }))
    }
}
