//! Channel source and sink nodes.

use std::time::Duration;

use tickgraph_ir::DEFAULT_OUTPUT_PARAM;
use tickgraph_telem::{Alignment, ChannelKey, Series, TimeStamp};

use crate::error::Result;
use crate::factory::{config_channel, Factory, NodeConfig};
use crate::node::{Context, Node, Reason};
use crate::state::{NodeHandle, State};

/// Span of the synthetic time ramp attached to sink writes.
const WRITE_SPAN: Duration = Duration::from_micros(100);

/// Source node that reads from a channel and outputs the data.
///
/// Tracks a high-water mark over series alignment to avoid delivering the
/// same samples twice.
#[derive(Debug)]
pub struct On {
    handle: NodeHandle,
    channel: ChannelKey,
    high_water_mark: Alignment,
}

impl On {
    fn new(handle: NodeHandle, channel: ChannelKey) -> Self {
        Self {
            handle,
            channel,
            high_water_mark: Alignment(0),
        }
    }
}

impl Node for On {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        let (data, time, ok) = self.handle.read_chan(ctx.state, self.channel);
        if !ok {
            return Ok(());
        }
        for (i, series) in data.iter().enumerate() {
            let lower = series.alignment;
            if lower < self.high_water_mark {
                continue;
            }
            let upper = lower.0 + series.len().saturating_sub(1) as u64;

            // A data series without a paired, equally-aligned index series
            // cannot be delivered coherently.
            let Some(time_series) = time.get(i) else {
                return Ok(());
            };
            if time_series.alignment != series.alignment {
                return Ok(());
            }

            *self.handle.output(ctx.state, 0) = series.clone();
            *self.handle.output_time(ctx.state, 0) = time_series.clone();
            self.high_water_mark = Alignment(upper + 1);
            ctx.mark_changed(DEFAULT_OUTPUT_PARAM);
            return Ok(());
        }
        Ok(())
    }

    fn seed_reason(&self) -> Option<Reason> {
        Some(Reason::ChannelInput)
    }

    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.handle.is_output_truthy(state, param_name)
    }
}

/// Sink node that writes its input to a channel with a synthetic time ramp.
#[derive(Debug)]
pub struct Write {
    handle: NodeHandle,
    channel: ChannelKey,
}

impl Write {
    fn new(handle: NodeHandle, channel: ChannelKey) -> Self {
        Self { handle, channel }
    }
}

impl Node for Write {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        if !self.handle.refresh_inputs(ctx.state) {
            return Ok(());
        }
        let data = self.handle.input(0).clone();
        if data.is_empty() {
            return Ok(());
        }
        let start = TimeStamp::now();
        let time = Series::linspace(start, start + WRITE_SPAN, data.len());
        self.handle.write_chan(ctx.state, self.channel, &data, &time)
    }

    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.handle.is_output_truthy(state, param_name)
    }
}

/// Builds [`On`] and [`Write`] nodes for `on`/`write` type tags.
pub struct ChannelFactory;

impl Factory for ChannelFactory {
    fn handles(&self, node_type: &str) -> bool {
        node_type == "on" || node_type == "write"
    }

    fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>> {
        let channel = config_channel(&cfg.node, "channel")?;
        if cfg.node.type_tag == "on" {
            Ok(Box::new(On::new(cfg.handle, channel)))
        } else {
            Ok(Box::new(Write::new(cfg.handle, channel)))
        }
    }
}
