//! Periodic and one-shot timer nodes.

use std::time::Duration;

use tickgraph_ir::DEFAULT_OUTPUT_PARAM;
use tickgraph_telem::{Sample, TimeStamp};

use crate::error::{Result, RuntimeError};
use crate::factory::{config_span, Factory, NodeConfig};
use crate::node::{Context, Node, Reason};
use crate::state::{NodeHandle, State};
use crate::timing::gcd_duration;

fn fire(handle: &NodeHandle, ctx: &mut Context<'_, '_>) -> Result<()> {
    let output = handle.output(ctx.state, 0);
    output.resize(1);
    output.set(0, Sample::U8(1))?;
    let output_time = handle.output_time(ctx.state, 0);
    output_time.resize(1);
    output_time.set(
        0,
        Sample::Timestamp(TimeStamp(ctx.elapsed.as_nanos() as i64)),
    )?;
    ctx.mark_changed(DEFAULT_OUTPUT_PARAM);
    Ok(())
}

/// Periodic timer: fires whenever a full period (less the tick tolerance)
/// has elapsed since the last firing.
///
/// An unfired timer fires on its first tick after construction or reset.
#[derive(Debug)]
pub struct Interval {
    handle: NodeHandle,
    period: Duration,
    last_fired: Option<Duration>,
}

impl Interval {
    fn new(handle: NodeHandle, period: Duration) -> Self {
        Self {
            handle,
            period,
            last_fired: None,
        }
    }
}

impl Node for Interval {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        if ctx.reason != Reason::TimerTick {
            return Ok(());
        }
        let due = match self.last_fired {
            None => true,
            Some(last) => {
                ctx.elapsed.saturating_sub(last) >= self.period.saturating_sub(ctx.tolerance)
            }
        };
        if !due {
            return Ok(());
        }
        self.last_fired = Some(ctx.elapsed);
        fire(&self.handle, ctx)
    }

    fn reset(&mut self) {
        self.last_fired = None;
    }

    fn seed_reason(&self) -> Option<Reason> {
        Some(Reason::TimerTick)
    }

    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.handle.is_output_truthy(state, param_name)
    }
}

/// One-shot timer: measures from its first dispatch after reset and fires
/// exactly once per armed period.
#[derive(Debug)]
pub struct Wait {
    handle: NodeHandle,
    duration: Duration,
    start: Option<Duration>,
    fired: bool,
}

impl Wait {
    fn new(handle: NodeHandle, duration: Duration) -> Self {
        Self {
            handle,
            duration,
            start: None,
            fired: false,
        }
    }
}

impl Node for Wait {
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()> {
        if ctx.reason != Reason::TimerTick {
            return Ok(());
        }
        if self.fired {
            return Ok(());
        }
        let start = *self.start.get_or_insert(ctx.elapsed);
        if ctx.elapsed.saturating_sub(start) < self.duration.saturating_sub(ctx.tolerance) {
            return Ok(());
        }
        self.fired = true;
        fire(&self.handle, ctx)
    }

    fn reset(&mut self) {
        self.start = None;
        self.fired = false;
    }

    fn seed_reason(&self) -> Option<Reason> {
        Some(Reason::TimerTick)
    }

    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.handle.is_output_truthy(state, param_name)
    }
}

/// Builds [`Interval`] and [`Wait`] nodes, folding every configured span
/// into the GCD base interval the tolerance calculation runs on.
pub struct TimeFactory {
    base: Option<Duration>,
}

impl TimeFactory {
    /// A factory with no contributed spans yet.
    pub fn new() -> Self {
        Self { base: None }
    }

    fn fold(&mut self, span: Duration) {
        self.base = Some(match self.base {
            None => span,
            Some(base) => gcd_duration(base, span),
        });
    }
}

impl Default for TimeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory for TimeFactory {
    fn handles(&self, node_type: &str) -> bool {
        node_type == "interval" || node_type == "wait"
    }

    fn create(&mut self, cfg: NodeConfig) -> Result<Box<dyn Node>> {
        match cfg.node.type_tag.as_str() {
            "interval" => {
                let period = config_span(&cfg.node, "period")?;
                self.fold(period);
                Ok(Box::new(Interval::new(cfg.handle, period)))
            }
            "wait" => {
                let duration = config_span(&cfg.node, "duration")?;
                self.fold(duration);
                Ok(Box::new(Wait::new(cfg.handle, duration)))
            }
            other => Err(RuntimeError::not_found(format!("node type '{}'", other))),
        }
    }

    fn base_interval(&self) -> Option<Duration> {
        self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Effects;
    use std::sync::Arc;
    use tickgraph_ir::{Handle, Node as NodeDef, Param, Params, IR};
    use tickgraph_telem::DataType;

    fn timer_def(key: &str, type_tag: &str, field: &str, nanos: i64) -> NodeDef {
        let mut def = NodeDef::new(key, type_tag);
        def.config = Params(vec![Param::with_value(
            field,
            DataType::I64,
            serde_json::json!(nanos),
        )]);
        def.outputs = Params(vec![Param::new(DEFAULT_OUTPUT_PARAM, DataType::U8)]);
        def
    }

    fn build(def: NodeDef) -> (State, Box<dyn Node>, TimeFactory) {
        let ir = Arc::new(IR {
            nodes: vec![def.clone()],
            ..IR::default()
        });
        let state = State::new(ir, Vec::new());
        let handle = state.node(&def.key).unwrap();
        let mut factory = TimeFactory::new();
        let node = factory.create(NodeConfig { node: def, handle }).unwrap();
        (state, node, factory)
    }

    fn tick_at(
        state: &mut State,
        node: &mut Box<dyn Node>,
        elapsed: Duration,
        reason: Reason,
    ) -> bool {
        let mut effects = Effects::new();
        let mut ctx = Context::new(
            elapsed,
            Duration::from_millis(5),
            reason,
            state,
            &mut effects,
        );
        node.next(&mut ctx).unwrap();
        !effects.take_changed().is_empty()
    }

    fn output_len(state: &State, key: &str) -> usize {
        state
            .output(&Handle::new(key, DEFAULT_OUTPUT_PARAM))
            .map_or(0, |v| v.data.len())
    }

    #[test]
    fn test_interval_fires_immediately_then_respects_period() {
        let def = timer_def("timer", "interval", "period", 1_000_000_000);
        let (mut state, mut node, _) = build(def);

        assert!(tick_at(&mut state, &mut node, Duration::ZERO, Reason::TimerTick));
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_millis(500),
            Reason::TimerTick
        ));
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(1),
            Reason::TimerTick
        ));
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(2),
            Reason::TimerTick
        ));
        assert_eq!(output_len(&state, "timer"), 1);
    }

    #[test]
    fn test_interval_stamps_elapsed_on_fire() {
        let def = timer_def("timer", "interval", "period", 1_000_000_000);
        let (mut state, mut node, _) = build(def);
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(5),
            Reason::TimerTick
        ));
        let value = state
            .output(&Handle::new("timer", DEFAULT_OUTPUT_PARAM))
            .unwrap();
        assert_eq!(
            value.time.at(0),
            Some(Sample::Timestamp(TimeStamp(5_000_000_000)))
        );
    }

    #[test]
    fn test_interval_ignores_non_timer_reasons() {
        let def = timer_def("timer", "interval", "period", 1_000_000_000);
        let (mut state, mut node, _) = build(def);
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(5),
            Reason::Activation
        ));
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(5),
            Reason::ChannelInput
        ));
    }

    #[test]
    fn test_interval_reset_allows_immediate_refire() {
        let def = timer_def("timer", "interval", "period", 1_000_000_000);
        let (mut state, mut node, _) = build(def);
        assert!(tick_at(&mut state, &mut node, Duration::ZERO, Reason::TimerTick));
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_millis(100),
            Reason::TimerTick
        ));
        node.reset();
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_millis(200),
            Reason::TimerTick
        ));
    }

    #[test]
    fn test_wait_fires_once_measured_from_first_dispatch() {
        let def = timer_def("delay", "wait", "duration", 1_000_000_000);
        let (mut state, mut node, _) = build(def);

        // First dispatch at 2 s arms the timer; it fires a full duration
        // later, not at absolute elapsed 1 s.
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(2),
            Reason::TimerTick
        ));
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_millis(2500),
            Reason::TimerTick
        ));
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(3),
            Reason::TimerTick
        ));
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(10),
            Reason::TimerTick
        ));
    }

    #[test]
    fn test_wait_reset_rearms() {
        let def = timer_def("delay", "wait", "duration", 1_000_000_000);
        let (mut state, mut node, _) = build(def);

        assert!(!tick_at(&mut state, &mut node, Duration::ZERO, Reason::TimerTick));
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(1),
            Reason::TimerTick
        ));

        node.reset();
        assert!(!tick_at(
            &mut state,
            &mut node,
            Duration::from_millis(5500),
            Reason::TimerTick
        ));
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_millis(6500),
            Reason::TimerTick
        ));
    }

    #[test]
    fn test_wait_with_zero_duration_fires_on_first_tick() {
        let def = timer_def("delay", "wait", "duration", 0);
        let (mut state, mut node, _) = build(def);
        assert!(tick_at(&mut state, &mut node, Duration::ZERO, Reason::TimerTick));
    }

    #[test]
    fn test_double_reset_is_idempotent() {
        let def = timer_def("delay", "wait", "duration", 1_000_000_000);
        let (mut state, mut node, _) = build(def);
        node.reset();
        node.reset();
        assert!(!tick_at(&mut state, &mut node, Duration::ZERO, Reason::TimerTick));
        assert!(tick_at(
            &mut state,
            &mut node,
            Duration::from_secs(1),
            Reason::TimerTick
        ));
    }

    #[test]
    fn test_factory_folds_gcd_base_interval() {
        let mut factory = TimeFactory::new();
        assert_eq!(factory.base_interval(), None);

        for (key, type_tag, field, nanos) in [
            ("a", "interval", "period", 500_000_000i64),
            ("b", "wait", "duration", 200_000_000),
        ] {
            let def = timer_def(key, type_tag, field, nanos);
            let ir = Arc::new(IR {
                nodes: vec![def.clone()],
                ..IR::default()
            });
            let state = State::new(ir, Vec::new());
            let handle = state.node(key).unwrap();
            factory.create(NodeConfig { node: def, handle }).unwrap();
        }
        assert_eq!(factory.base_interval(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_negative_period_is_invalid_config() {
        let def = timer_def("timer", "interval", "period", -5);
        let ir = Arc::new(IR {
            nodes: vec![def.clone()],
            ..IR::default()
        });
        let state = State::new(ir, Vec::new());
        let handle = state.node("timer").unwrap();
        let err = TimeFactory::new()
            .create(NodeConfig { node: def, handle })
            .unwrap_err();
        assert!(err.to_string().contains("must be non-negative"));
    }
}
