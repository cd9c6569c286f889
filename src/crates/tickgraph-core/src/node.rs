//! The polymorphic node execution interface.
//!
//! Every node kind implements [`Node`] and is dispatched exactly one
//! [`next`](Node::next) call at a time by the scheduler. The per-dispatch
//! [`Context`] carries the tick's timing, the mutable state store, and a
//! capability surface (`mark_changed`, `report_error`, `activate_stage`)
//! backed by a scheduler-owned [`Effects`] buffer.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, RuntimeError};
use crate::state::State;

/// Why a node is being dispatched this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Seeded by the tick clock (timers, constants).
    TimerTick,
    /// Seeded because channel data may have arrived (channel sources).
    ChannelInput,
    /// Activated by an upstream edge during this or the previous tick.
    Activation,
}

/// Scheduler-owned buffer collecting the effects of one dispatch.
///
/// The scheduler drains it after every `next()` call, before the next node
/// in the execution order is dispatched.
#[derive(Debug, Default)]
pub struct Effects {
    changed: Vec<String>,
    errors: Vec<RuntimeError>,
    stage_requested: bool,
}

impl Effects {
    /// An empty effects buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the output params marked changed during the dispatch.
    pub fn take_changed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changed)
    }

    /// Take the non-fatal errors reported during the dispatch.
    pub fn take_errors(&mut self) -> Vec<RuntimeError> {
        std::mem::take(&mut self.errors)
    }

    /// True when the dispatch requested a stage transition; resets the flag.
    pub fn take_stage_request(&mut self) -> bool {
        std::mem::replace(&mut self.stage_requested, false)
    }
}

/// Per-dispatch execution context handed to [`Node::next`].
pub struct Context<'s, 'e> {
    /// Monotonic time since run start.
    pub elapsed: Duration,
    /// Timing slack for the current execution mode.
    pub tolerance: Duration,
    /// Why the node is being invoked.
    pub reason: Reason,
    /// The state store; all series mutation flows through it.
    pub state: &'s mut State,
    effects: &'e mut Effects,
}

impl<'s, 'e> Context<'s, 'e> {
    /// Bind a context over the tick's state and effects buffer.
    pub fn new(
        elapsed: Duration,
        tolerance: Duration,
        reason: Reason,
        state: &'s mut State,
        effects: &'e mut Effects,
    ) -> Self {
        Self {
            elapsed,
            tolerance,
            reason,
            state,
            effects,
        }
    }

    /// Report that the named output has new data; the scheduler turns this
    /// into downstream edge activations.
    pub fn mark_changed(&mut self, output_param: impl Into<String>) {
        self.effects.changed.push(output_param.into());
    }

    /// Surface a non-fatal error for this tick.
    pub fn report_error(&mut self, err: RuntimeError) {
        self.effects.errors.push(err);
    }

    /// Request a transition to the next stage in the node's sequence.
    pub fn activate_stage(&mut self) {
        self.effects.stage_requested = true;
    }
}

/// A unit of computation dispatched once per activation.
pub trait Node: fmt::Debug {
    /// One dispatch step. Must be synchronous and non-blocking.
    fn next(&mut self, ctx: &mut Context<'_, '_>) -> Result<()>;

    /// Called when a stage containing this node is activated. Nodes override
    /// to restore their initial state (timers, one-shot flags).
    fn reset(&mut self) {}

    /// How the scheduler seeds this node into each tick's changed set.
    ///
    /// `Some(reason)` nodes are invoked every tick with that reason;
    /// `None` nodes run only when activated by an incoming edge.
    fn seed_reason(&self) -> Option<Reason> {
        None
    }

    /// Truthiness of the named output, used by the scheduler to gate
    /// one-shot edges. Nodes with outputs delegate to their handle's check;
    /// pure sinks return false.
    fn is_output_truthy(&self, state: &State, param_name: &str) -> bool;
}
