//! Per-node cursors over the state store.

use tickgraph_ir::{Edge, Handle, Node as NodeDef};
use tickgraph_telem::{ChannelKey, DataType, Sample, Series, TimeStamp};

use super::{SlotId, State};
use crate::error::Result;

/// Per-input accumulation record used to detect new data since the last
/// refresh.
#[derive(Debug, Clone)]
struct InputEntry {
    last_timestamp: i64,
    last_len: usize,
}

impl Default for InputEntry {
    fn default() -> Self {
        Self {
            // Below any real timestamp, including a timer firing at elapsed 0.
            last_timestamp: i64::MIN,
            last_len: 0,
        }
    }
}

/// A cursor over [`State`] scoped to one node.
///
/// Holds the node's incoming edges and output handles in param order, arena
/// indices for the source and output slots, and per-input aligned snapshots.
/// Methods that touch slots take the state explicitly; the handle itself
/// never outlives its state's arena layout (the IR is immutable).
#[derive(Debug)]
pub struct NodeHandle {
    key: String,
    inputs: Vec<Edge>,
    outputs: Vec<Handle>,
    input_slots: Vec<Option<SlotId>>,
    output_slots: Vec<SlotId>,
    accumulated: Vec<InputEntry>,
    aligned_data: Vec<Series>,
    aligned_time: Vec<Series>,
}

impl NodeHandle {
    /// Derive a handle for `node` from the state's edge and slot indexes.
    pub(crate) fn bind(state: &State, node: &NodeDef) -> Self {
        let mut inputs = Vec::with_capacity(node.inputs.len());
        let mut input_slots = Vec::with_capacity(node.inputs.len());
        let mut accumulated = Vec::with_capacity(node.inputs.len());
        let mut aligned_data = Vec::with_capacity(node.inputs.len());
        let mut aligned_time = Vec::with_capacity(node.inputs.len());
        for param in node.inputs.iter() {
            let target = Handle::new(node.key.clone(), param.name.clone());
            match state.ir().edge_into(&target) {
                Some(edge) => {
                    input_slots.push(state.slot_of(&edge.source));
                    inputs.push(edge.clone());
                }
                None => {
                    // Unwired input: keep positional alignment with an empty
                    // placeholder so param indices stay stable.
                    input_slots.push(None);
                    inputs.push(Edge::new(Handle::default(), target));
                }
            }
            accumulated.push(InputEntry::default());
            aligned_data.push(Series::new(param.data_type));
            aligned_time.push(Series::new(DataType::Timestamp));
        }

        let mut outputs = Vec::with_capacity(node.outputs.len());
        let mut output_slots = Vec::with_capacity(node.outputs.len());
        for param in node.outputs.iter() {
            let handle = Handle::new(node.key.clone(), param.name.clone());
            let slot = state
                .slot_of(&handle)
                .expect("output slot allocated at state construction");
            outputs.push(handle);
            output_slots.push(slot);
        }

        Self {
            key: node.key.clone(),
            inputs,
            outputs,
            input_slots,
            output_slots,
            accumulated,
            aligned_data,
            aligned_time,
        }
    }

    /// Key of the node this handle is scoped to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Incoming edges in input-param order (placeholder edges for unwired
    /// inputs).
    pub fn inputs(&self) -> &[Edge] {
        &self.inputs
    }

    /// Output handles in output-param order.
    pub fn outputs(&self) -> &[Handle] {
        &self.outputs
    }

    /// Re-read all input source series into the aligned slots.
    ///
    /// Returns true iff any input advanced: its source's last timestamp is
    /// newer than the recorded high-water mark, or — for sources that emit
    /// data without timestamps — its data length changed.
    pub fn refresh_inputs(&mut self, state: &State) -> bool {
        let mut any = false;
        for i in 0..self.input_slots.len() {
            let Some(slot) = self.input_slots[i] else {
                continue;
            };
            let value = state.slot(slot);
            let entry = &mut self.accumulated[i];
            let advanced = match value.time.last() {
                Some(Sample::Timestamp(ts)) => ts.nanoseconds() > entry.last_timestamp,
                _ => !value.data.is_empty() && value.data.len() != entry.last_len,
            };
            if !advanced {
                continue;
            }
            self.aligned_data[i] = value.data.clone();
            self.aligned_time[i] = value.time.clone();
            if let Some(Sample::Timestamp(ts)) = value.time.last() {
                entry.last_timestamp = ts.nanoseconds();
            }
            entry.last_len = value.data.len();
            any = true;
        }
        any
    }

    /// Aligned snapshot of input `param_index`'s data.
    pub fn input(&self, param_index: usize) -> &Series {
        &self.aligned_data[param_index]
    }

    /// Aligned snapshot of input `param_index`'s timestamps.
    pub fn input_time(&self, param_index: usize) -> &Series {
        &self.aligned_time[param_index]
    }

    /// Mutable access to output `param_index`'s data series.
    pub fn output<'a>(&self, state: &'a mut State, param_index: usize) -> &'a mut Series {
        &mut state.slot_mut(self.output_slots[param_index]).data
    }

    /// Mutable access to output `param_index`'s time series.
    pub fn output_time<'a>(&self, state: &'a mut State, param_index: usize) -> &'a mut Series {
        &mut state.slot_mut(self.output_slots[param_index]).time
    }

    /// Read buffered series for a channel.
    ///
    /// Returns `(data, time, ok)`: the channel's series for this tick, the
    /// paired index series, and whether the channel had data at all. For a
    /// channel without an index, the time series is synthesized as a
    /// monotonic ramp from the wall clock, one nanosecond per sample, with
    /// the data series' alignment.
    pub fn read_chan(&self, state: &State, key: ChannelKey) -> (Vec<Series>, Vec<Series>, bool) {
        let Some(data) = state.reads_for(key) else {
            return (Vec::new(), Vec::new(), false);
        };
        if data.is_empty() {
            return (Vec::new(), Vec::new(), false);
        }
        let data = data.clone();
        let time = match state.index_of(key) {
            Some(index) => state.reads_for(index).cloned().unwrap_or_default(),
            None => data
                .iter()
                .map(|series| {
                    let now = TimeStamp::now();
                    let stamps = (0..series.len() as i64)
                        .map(|j| TimeStamp(now.nanoseconds() + j))
                        .collect();
                    Series::timestamps(stamps).with_alignment(series.alignment)
                })
                .collect(),
        };
        (data, time, true)
    }

    /// Append a write buffer for a channel.
    pub fn write_chan(
        &self,
        state: &mut State,
        key: ChannelKey,
        data: &Series,
        time: &Series,
    ) -> Result<()> {
        state.write_channel(key, data, time)
    }

    /// Truthiness of the named output: false for unknown params and empty
    /// series, the last element's truthiness otherwise.
    pub fn is_output_truthy(&self, state: &State, param_name: &str) -> bool {
        self.outputs
            .iter()
            .position(|handle| handle.param == param_name)
            .map_or(false, |i| {
                state.slot(self.output_slots[i]).data.is_truthy()
            })
    }
}
