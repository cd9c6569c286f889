//! Per-tick dispatch: changed-set propagation, stratum ordering, and stage
//! activation.
//!
//! Each tick proceeds in fixed phases:
//!
//! ```text
//! ingest frame ─▶ seed changed set ─▶ run strata in order ─▶ advance stages
//!                 (timers, channel      (propagating marks      (reset newly
//!                  sources, carryover)   along edges)            entered stage)
//!                                                  │
//!                                                  ▼
//!                                  flush writes + authority ─▶ TickResult
//! ```
//!
//! Within a stratum nodes run in IR declaration order, and the stratum is
//! re-scanned until no activated node remains, so a node activated during
//! its own stratum still runs within it. Activations that land on a node
//! which already ran, or on an earlier stratum, carry over to the next tick.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use tickgraph_ir::{Edge, EdgeKind, Handle, IR};
use tickgraph_telem::{ChannelKey, Frame, Series};

use crate::error::{Result, RuntimeError};
use crate::factory::{NodeConfig, Registry};
use crate::node::{Context, Effects, Node, Reason};
use crate::state::{AuthorityChange, ChannelDigest, State};

/// Aggregate outcome of one tick, handed back to the host.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Channel write buffers accumulated during the tick, ordered by key.
    pub writes: Vec<(ChannelKey, Series)>,
    /// Authority changes requested during the tick, in request order.
    pub authority_changes: Vec<AuthorityChange>,
    /// Non-fatal node errors; the tick always runs to completion.
    pub errors: Vec<RuntimeError>,
}

impl TickResult {
    /// True when the tick produced no writes, authority changes, or errors.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.authority_changes.is_empty() && self.errors.is_empty()
    }
}

#[derive(Debug)]
struct SequenceCursor {
    key: String,
    current: usize,
}

/// Tick-local bookkeeping: which nodes are queued, why, and what they asked
/// for.
#[derive(Default)]
struct TickCursor {
    pending: HashSet<String>,
    reasons: HashMap<String, Reason>,
    ran: HashSet<String>,
    stage_requests: BTreeSet<usize>,
    errors: Vec<RuntimeError>,
}

/// Owns the node set and drives the per-tick execution discipline.
#[derive(Debug)]
pub struct Scheduler {
    ir: Arc<IR>,
    state: State,
    nodes: HashMap<String, Box<dyn Node>>,
    strata: Vec<Vec<String>>,
    stratum_of: HashMap<String, usize>,
    edges_from: HashMap<Handle, Vec<Edge>>,
    sequences: Vec<SequenceCursor>,
    memberships: HashMap<String, Vec<(usize, usize)>>,
    carryover: BTreeSet<String>,
}

impl Scheduler {
    /// Validate the IR, build the state store, and create every node through
    /// the registry. Fails fast on the first structural or creation error.
    ///
    /// Each sequence starts in its first stage, with that stage's nodes
    /// reset.
    pub fn new(
        ir: IR,
        channels: impl IntoIterator<Item = ChannelDigest>,
        registry: &mut Registry,
    ) -> Result<Self> {
        ir.validate()?;
        let ir = Arc::new(ir);
        let state = State::new(Arc::clone(&ir), channels);

        let mut nodes: HashMap<String, Box<dyn Node>> = HashMap::new();
        for def in &ir.nodes {
            let handle = state.node(&def.key)?;
            let node = registry.create(NodeConfig {
                node: def.clone(),
                handle,
            })?;
            nodes.insert(def.key.clone(), node);
        }

        // Graphs compiled without strata run as a single layer in IR order.
        let strata: Vec<Vec<String>> = if ir.strata.is_empty() {
            if ir.nodes.is_empty() {
                Vec::new()
            } else {
                vec![ir.nodes.iter().map(|n| n.key.clone()).collect()]
            }
        } else {
            ir.strata.0.clone()
        };
        let mut stratum_of = HashMap::new();
        for (index, layer) in strata.iter().enumerate() {
            for key in layer {
                stratum_of.insert(key.clone(), index);
            }
        }

        let mut edges_from: HashMap<Handle, Vec<Edge>> = HashMap::new();
        for edge in &ir.edges {
            edges_from
                .entry(edge.source.clone())
                .or_default()
                .push(edge.clone());
        }

        let sequences = ir
            .sequences
            .iter()
            .map(|sequence| SequenceCursor {
                key: sequence.key.clone(),
                current: 0,
            })
            .collect();
        let mut memberships: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
        for (seq_idx, sequence) in ir.sequences.iter().enumerate() {
            for (stage_idx, stage) in sequence.stages.iter().enumerate() {
                for key in &stage.nodes {
                    memberships
                        .entry(key.clone())
                        .or_default()
                        .push((seq_idx, stage_idx));
                }
            }
        }

        let mut scheduler = Self {
            ir,
            state,
            nodes,
            strata,
            stratum_of,
            edges_from,
            sequences,
            memberships,
            carryover: BTreeSet::new(),
        };
        for seq_idx in 0..scheduler.sequences.len() {
            scheduler.reset_stage_nodes(seq_idx, 0);
        }
        Ok(scheduler)
    }

    /// Execute one tick: ingest `frame`, run the active node set, advance
    /// requested stage transitions, and flush outputs to the host.
    pub fn tick(
        &mut self,
        elapsed: Duration,
        tolerance: Duration,
        frame: Option<Frame>,
    ) -> TickResult {
        if let Some(frame) = frame {
            self.state.ingest(frame);
        }

        let mut cursor = TickCursor::default();
        for key in std::mem::take(&mut self.carryover) {
            if self.is_active(&key) {
                cursor.pending.insert(key.clone());
                cursor.reasons.insert(key, Reason::Activation);
            }
        }
        for (key, node) in &self.nodes {
            if !self.is_active(key) {
                continue;
            }
            if let Some(reason) = node.seed_reason() {
                cursor.pending.insert(key.clone());
                cursor.reasons.insert(key.clone(), reason);
            }
        }

        let mut effects = Effects::new();
        for stratum_idx in 0..self.strata.len() {
            loop {
                let runnable: Vec<String> = self.strata[stratum_idx]
                    .iter()
                    .filter(|key| cursor.pending.contains(*key) && !cursor.ran.contains(*key))
                    .cloned()
                    .collect();
                if runnable.is_empty() {
                    break;
                }
                for key in runnable {
                    cursor.pending.remove(&key);
                    cursor.ran.insert(key.clone());
                    let reason = cursor
                        .reasons
                        .get(&key)
                        .copied()
                        .unwrap_or(Reason::Activation);
                    self.dispatch(&key, elapsed, tolerance, reason, &mut effects, &mut cursor, stratum_idx);
                }
            }
        }

        let stage_requests = std::mem::take(&mut cursor.stage_requests);
        for seq_idx in stage_requests {
            let next = self.sequences[seq_idx].current + 1;
            if next < self.ir.sequences[seq_idx].stages.len() {
                self.sequences[seq_idx].current = next;
                self.reset_stage_nodes(seq_idx, next);
            }
        }

        self.state.clear_reads();
        TickResult {
            writes: self.state.flush_writes(),
            authority_changes: self.state.flush_authority_changes(),
            errors: cursor.errors,
        }
    }

    /// The state store, for host/test introspection.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable access to the state store for the host side of the tick
    /// boundary.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Key of the named sequence's current stage.
    pub fn current_stage(&self, sequence_key: &str) -> Option<&str> {
        let idx = self
            .sequences
            .iter()
            .position(|cursor| cursor.key == sequence_key)?;
        self.ir.sequences[idx]
            .stages
            .get(self.sequences[idx].current)
            .map(|stage| stage.key.as_str())
    }

    fn dispatch(
        &mut self,
        key: &str,
        elapsed: Duration,
        tolerance: Duration,
        reason: Reason,
        effects: &mut Effects,
        cursor: &mut TickCursor,
        stratum_idx: usize,
    ) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        let mut ctx = Context::new(elapsed, tolerance, reason, &mut self.state, effects);
        if let Err(err) = node.next(&mut ctx) {
            warn!(node = key, error = %err, "node dispatch failed");
            let err = match err {
                failure @ RuntimeError::NodeFailure { .. } => failure,
                other => RuntimeError::node_failure(key, other.to_string()),
            };
            cursor.errors.push(err);
        }
        for err in effects.take_errors() {
            warn!(node = key, error = %err, "node reported error");
            cursor.errors.push(err);
        }
        if effects.take_stage_request() {
            if let Some(seq_idx) = self.active_sequence_of(key) {
                cursor.stage_requests.insert(seq_idx);
            }
        }

        for param in effects.take_changed() {
            let source = Handle::new(key.to_string(), param.clone());
            let Some(edges) = self.edges_from.get(&source) else {
                continue;
            };
            for edge in edges {
                let target = &edge.target.node;
                if !self.is_active(target) {
                    continue;
                }
                let fires = match edge.kind {
                    EdgeKind::Continuous => true,
                    // One-shot edges fire only when the source output is
                    // truthy at the moment of change.
                    EdgeKind::OneShot => self
                        .nodes
                        .get(key)
                        .map_or(false, |n| n.is_output_truthy(&self.state, &param)),
                };
                if !fires {
                    continue;
                }
                let behind = self
                    .stratum_of
                    .get(target)
                    .map_or(true, |s| *s < stratum_idx);
                if cursor.ran.contains(target) || behind {
                    debug!(source = %edge.source, target = %edge.target, "activation deferred to next tick");
                    self.carryover.insert(target.clone());
                } else {
                    cursor.pending.insert(target.clone());
                    cursor
                        .reasons
                        .entry(target.clone())
                        .or_insert(Reason::Activation);
                }
            }
        }
    }

    fn reset_stage_nodes(&mut self, seq_idx: usize, stage_idx: usize) {
        let ir = Arc::clone(&self.ir);
        let Some(sequence) = ir.sequences.get(seq_idx) else {
            return;
        };
        let Some(stage) = sequence.stages.get(stage_idx) else {
            return;
        };
        debug!(sequence = %sequence.key, stage = %stage.key, "stage activated");
        for key in &stage.nodes {
            if let Some(node) = self.nodes.get_mut(key) {
                node.reset();
            }
        }
    }

    /// A node in no stage is always active; a staged node is active when any
    /// containing stage is its sequence's current one.
    fn is_active(&self, key: &str) -> bool {
        match self.memberships.get(key) {
            None => true,
            Some(memberships) => memberships
                .iter()
                .any(|(seq_idx, stage_idx)| self.sequences[*seq_idx].current == *stage_idx),
        }
    }

    fn active_sequence_of(&self, key: &str) -> Option<usize> {
        self.memberships
            .get(key)?
            .iter()
            .find(|(seq_idx, stage_idx)| self.sequences[*seq_idx].current == *stage_idx)
            .map(|(seq_idx, _)| *seq_idx)
    }
}
