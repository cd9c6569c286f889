//! Graph execution runtime for tick-driven data acquisition graphs.
//!
//! The core executes a compiled [`tickgraph_ir::IR`] cyclically on a single
//! thread: each tick ingests sampled channel data, seeds timer and channel
//! nodes into a changed set, propagates values along continuous and
//! one-shot edges in strict stratum order, fires stage transitions, and
//! hands channel writes plus authority changes back to the host.
//!
//! # Example
//!
//! ```rust
//! use tickgraph_core::{Registry, Scheduler};
//! use tickgraph_ir::IR;
//! use std::time::Duration;
//!
//! let mut registry = Registry::defaults();
//! let mut scheduler = Scheduler::new(IR::default(), Vec::new(), &mut registry).unwrap();
//! let result = scheduler.tick(Duration::from_secs(1), Duration::ZERO, None);
//! assert!(result.is_empty());
//! ```

pub mod error;
pub mod factory;
pub mod node;
pub mod nodes;
pub mod scheduler;
pub mod state;
pub mod timing;

pub use error::{Result, RuntimeError};
pub use factory::{Factory, NodeConfig, Registry};
pub use node::{Context, Effects, Node, Reason};
pub use scheduler::{Scheduler, TickResult};
pub use state::{AuthorityChange, ChannelDigest, NodeHandle, State, Value};
pub use timing::{tolerance, ExecutionMode, FrameMailbox, Runner, UNSET_BASE_INTERVAL};
