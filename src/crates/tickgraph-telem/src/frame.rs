//! Per-tick frames of sampled channel data.

use crate::{ChannelKey, Series};

/// One tick's worth of sampled channel data, exchanged with the host at tick
/// boundaries.
///
/// A frame is an ordered list of `(channel, series)` pairs. A channel key
/// may appear more than once when several series arrived for it within a
/// single tick.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    entries: Vec<(ChannelKey, Series)>,
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a series for `key`.
    pub fn push(&mut self, key: ChannelKey, series: Series) {
        self.entries.push((key, series));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, key: ChannelKey, series: Series) -> Self {
        self.push(key, series);
        self
    }

    /// Number of `(channel, series)` entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the frame carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &(ChannelKey, Series)> {
        self.entries.iter()
    }
}

impl IntoIterator for Frame {
    type Item = (ChannelKey, Series);
    type IntoIter = std::vec::IntoIter<(ChannelKey, Series)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
