//! The runtime state store.
//!
//! [`State`] owns every node's output slots in a dense arena, the per-tick
//! channel read buffers, the accumulated channel write buffers, and the
//! pending authority-change queue. All of it lives on the tick thread;
//! [`NodeHandle`] cursors address slots by arena index and every mutation
//! flows through an explicit `&mut State`.

mod handle;

pub use handle::NodeHandle;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use tickgraph_ir::{Handle, IR};
use tickgraph_telem::{ChannelKey, DataType, Frame, Series};

use crate::error::{Result, RuntimeError};

pub(crate) type SlotId = usize;

/// One node output slot: a data series plus its aligned timestamps.
///
/// Invariant: after any `next()` call returns, `data` and `time` have equal
/// lengths for slots the node wrote through its handle.
#[derive(Debug, Clone)]
pub struct Value {
    /// Output samples.
    pub data: Series,
    /// Timestamps aligned with `data`.
    pub time: Series,
}

/// Host-provided description of a physical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDigest {
    /// Channel key.
    pub key: ChannelKey,
    /// Element type of the channel's samples.
    pub data_type: DataType,
    /// The index channel carrying this channel's timestamps, if any.
    pub index: Option<ChannelKey>,
}

impl ChannelDigest {
    /// A digest for an indexed channel.
    pub fn new(key: ChannelKey, data_type: DataType, index: ChannelKey) -> Self {
        Self {
            key,
            data_type,
            index: Some(index),
        }
    }

    /// A digest for a channel without an index.
    pub fn unindexed(key: ChannelKey, data_type: DataType) -> Self {
        Self {
            key,
            data_type,
            index: None,
        }
    }
}

/// A pending authority change, drained by the host after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityChange {
    /// Target channel; `None` applies globally.
    pub channel: Option<ChannelKey>,
    /// Requested authority level.
    pub authority: u8,
}

/// Per-run mutable state: output slots, channel buffers, authority queue.
#[derive(Debug)]
pub struct State {
    ir: Arc<IR>,
    slots: Vec<Value>,
    outputs: HashMap<Handle, SlotId>,
    indexes: HashMap<ChannelKey, ChannelKey>,
    reads: HashMap<ChannelKey, Vec<Series>>,
    writes: HashMap<ChannelKey, Series>,
    authority: Vec<AuthorityChange>,
}

impl State {
    /// Allocate one [`Value`] per `(node, output param)` handle across the
    /// IR, and record channel index pairings from the digests.
    pub fn new(ir: Arc<IR>, channels: impl IntoIterator<Item = ChannelDigest>) -> Self {
        let mut slots = Vec::new();
        let mut outputs = HashMap::new();
        for node in &ir.nodes {
            for param in node.outputs.iter() {
                let id = slots.len();
                slots.push(Value {
                    data: Series::new(param.data_type),
                    time: Series::new(DataType::Timestamp),
                });
                outputs.insert(Handle::new(node.key.clone(), param.name.clone()), id);
            }
        }
        let indexes = channels
            .into_iter()
            .filter_map(|digest| digest.index.map(|index| (digest.key, index)))
            .collect();
        Self {
            ir,
            slots,
            outputs,
            indexes,
            reads: HashMap::new(),
            writes: HashMap::new(),
            authority: Vec::new(),
        }
    }

    /// Obtain a [`NodeHandle`] bound to this state, or `NotFound` for an
    /// unknown key.
    pub fn node(&self, key: &str) -> Result<NodeHandle> {
        let node = self
            .ir
            .find_node(key)
            .ok_or_else(|| RuntimeError::not_found(format!("node '{}'", key)))?;
        Ok(NodeHandle::bind(self, node))
    }

    /// Replace the channel read buffers with the contents of `frame`.
    pub fn ingest(&mut self, frame: Frame) {
        self.reads.clear();
        let entries = frame.len();
        for (key, series) in frame {
            self.reads.entry(key).or_default().push(series);
        }
        debug!(entries, channels = self.reads.len(), "ingested frame");
    }

    /// Drop the channel read buffers; reads are valid for one tick only.
    pub fn clear_reads(&mut self) {
        self.reads.clear();
    }

    /// Remove and return all accumulated write buffers, ordered by channel.
    pub fn flush_writes(&mut self) -> Vec<(ChannelKey, Series)> {
        let mut flushed: Vec<(ChannelKey, Series)> = self.writes.drain().collect();
        flushed.sort_by_key(|(key, _)| *key);
        flushed
    }

    /// Remove and return the pending authority queue.
    pub fn flush_authority_changes(&mut self) -> Vec<AuthorityChange> {
        std::mem::take(&mut self.authority)
    }

    /// Append an authority change for the host to drain after this tick.
    pub fn set_authority(&mut self, channel: Option<ChannelKey>, authority: u8) {
        self.authority.push(AuthorityChange { channel, authority });
    }

    /// Host/test introspection of a node output slot.
    pub fn output(&self, handle: &Handle) -> Option<&Value> {
        self.outputs.get(handle).map(|id| &self.slots[*id])
    }

    pub(crate) fn ir(&self) -> &IR {
        &self.ir
    }

    pub(crate) fn slot(&self, id: SlotId) -> &Value {
        &self.slots[id]
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> &mut Value {
        &mut self.slots[id]
    }

    pub(crate) fn slot_of(&self, handle: &Handle) -> Option<SlotId> {
        self.outputs.get(handle).copied()
    }

    pub(crate) fn reads_for(&self, key: ChannelKey) -> Option<&Vec<Series>> {
        self.reads.get(&key)
    }

    pub(crate) fn index_of(&self, key: ChannelKey) -> Option<ChannelKey> {
        self.indexes.get(&key).copied()
    }

    /// Append `data` to the channel's write buffer; when the channel has an
    /// index, `time` is appended to the index channel's buffer so the host
    /// drains aligned pairs.
    pub(crate) fn write_channel(
        &mut self,
        key: ChannelKey,
        data: &Series,
        time: &Series,
    ) -> Result<()> {
        self.writes
            .entry(key)
            .or_insert_with(|| Series::new(data.data_type()))
            .extend_from(data)?;
        if let Some(index) = self.index_of(key) {
            self.writes
                .entry(index)
                .or_insert_with(|| Series::new(time.data_type()))
                .extend_from(time)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickgraph_ir::{Node, Param, Params, DEFAULT_OUTPUT_PARAM};
    use tickgraph_telem::Sample;

    fn one_node_ir() -> Arc<IR> {
        let mut node = Node::new("producer", "constant");
        node.outputs = Params(vec![Param::new(DEFAULT_OUTPUT_PARAM, DataType::F32)]);
        Arc::new(IR {
            nodes: vec![node],
            ..IR::default()
        })
    }

    #[test]
    fn test_allocates_value_per_output_param() {
        let state = State::new(one_node_ir(), Vec::new());
        let value = state
            .output(&Handle::new("producer", DEFAULT_OUTPUT_PARAM))
            .unwrap();
        assert_eq!(value.data.data_type(), DataType::F32);
        assert_eq!(value.time.data_type(), DataType::Timestamp);
        assert!(value.data.is_empty());
    }

    #[test]
    fn test_node_returns_not_found_for_unknown_key() {
        let state = State::new(one_node_ir(), Vec::new());
        let err = state.node("ghost").unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound(_)));
    }

    #[test]
    fn test_ingest_then_flush_writes_is_empty() {
        let mut state = State::new(one_node_ir(), vec![ChannelDigest::new(10, DataType::F32, 11)]);
        state.ingest(Frame::new().with(10, Series::from(vec![1.0f32])));
        assert!(state.flush_writes().is_empty());
    }

    #[test]
    fn test_ingest_replaces_prior_reads() {
        let mut state = State::new(one_node_ir(), Vec::new());
        state.ingest(Frame::new().with(10, Series::from(vec![1.0f32])));
        state.ingest(Frame::new().with(20, Series::from(vec![2.0f32])));
        assert!(state.reads_for(10).is_none());
        assert!(state.reads_for(20).is_some());
    }

    #[test]
    fn test_write_channel_appends_and_pairs_index() {
        let mut state = State::new(one_node_ir(), vec![ChannelDigest::new(10, DataType::F32, 11)]);
        let data = Series::from(vec![1.0f32, 2.0]);
        let time = Series::timestamps(vec![
            tickgraph_telem::TimeStamp(100),
            tickgraph_telem::TimeStamp(101),
        ]);
        state.write_channel(10, &data, &time).unwrap();
        state.write_channel(10, &data, &time).unwrap();

        let writes = state.flush_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, 10);
        assert_eq!(writes[0].1.len(), 4);
        assert_eq!(writes[1].0, 11);
        assert_eq!(writes[1].1.len(), 4);
        assert!(state.flush_writes().is_empty());
    }

    #[test]
    fn test_authority_queue_drains_in_order() {
        let mut state = State::new(one_node_ir(), Vec::new());
        state.set_authority(None, 200);
        state.set_authority(Some(7), 120);
        let changes = state.flush_authority_changes();
        assert_eq!(
            changes,
            vec![
                AuthorityChange {
                    channel: None,
                    authority: 200
                },
                AuthorityChange {
                    channel: Some(7),
                    authority: 120
                },
            ]
        );
        assert!(state.flush_authority_changes().is_empty());
    }

    #[test]
    fn test_output_slot_mutation_round_trips() {
        let mut state = State::new(one_node_ir(), Vec::new());
        let handle = Handle::new("producer", DEFAULT_OUTPUT_PARAM);
        let id = state.slot_of(&handle).unwrap();
        state.slot_mut(id).data.push(Sample::F32(3.5)).unwrap();
        assert_eq!(
            state.output(&handle).unwrap().data.at(0),
            Some(Sample::F32(3.5))
        );
    }
}
