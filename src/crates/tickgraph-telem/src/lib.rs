//! Telemetry value layer for the tickgraph runtime.
//!
//! Everything the execution core moves around at runtime is expressed in the
//! types defined here: typed [`Series`] buffers with aligned sample
//! positions, [`Frame`]s of per-channel series exchanged with the host once
//! per tick, and the nanosecond [`TimeStamp`]/[`Alignment`] primitives the
//! high-water-mark logic is built on.

mod frame;
mod series;
mod time;

pub use frame::Frame;
pub use series::{DataType, Sample, Series, TelemError};
pub use time::{Alignment, TimeStamp};

/// Identifier of an external telemetry channel.
pub type ChannelKey = u32;
