//! Execution modes, tolerance calculation, and the tick-loop driver.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info_span};
use uuid::Uuid;

use tickgraph_telem::Frame;

use crate::scheduler::{Scheduler, TickResult};

/// How the tick loop paces itself and how much timing slack timers receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Pick pacing automatically.
    #[default]
    Auto,
    /// Sleep until external events or the next deadline.
    EventDriven,
    /// Mix of event-driven and periodic pacing.
    Hybrid,
    /// Tight periodic pacing for fast graphs.
    HighRate,
    /// Spin without sleeping.
    BusyWait,
    /// Real-time event pacing.
    RtEvent,
}

/// Sentinel meaning no timer node contributed a base interval.
pub const UNSET_BASE_INTERVAL: Duration = Duration::MAX;

const DEFAULT_TOLERANCE: Duration = Duration::from_millis(5);
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Timing slack subtracted from timer deadlines, chosen per execution mode.
///
/// With no base interval the default 5 ms applies. Otherwise the slack is
/// half the base interval, capped per mode: 100 µs for the real-time modes,
/// 1 ms for high-rate, 5 ms for everything else.
pub fn tolerance(mode: ExecutionMode, base_interval: Duration) -> Duration {
    if base_interval == UNSET_BASE_INTERVAL {
        return DEFAULT_TOLERANCE;
    }
    let half = base_interval / 2;
    match mode {
        ExecutionMode::RtEvent | ExecutionMode::BusyWait => half.min(Duration::from_micros(100)),
        ExecutionMode::HighRate => half.min(Duration::from_millis(1)),
        ExecutionMode::EventDriven | ExecutionMode::Hybrid | ExecutionMode::Auto => {
            half.min(DEFAULT_TOLERANCE)
        }
    }
}

pub(crate) fn gcd_duration(a: Duration, b: Duration) -> Duration {
    let (mut a, mut b) = (a.as_nanos(), b.as_nanos());
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    Duration::from_nanos(a as u64)
}

/// Thread-safe frame queue exchanged between the host and the tick thread.
///
/// The host pushes frames from its own thread; the runner pops at most one
/// frame per tick. This is the only cross-thread surface of the core; the
/// scheduler itself never synchronizes.
#[derive(Clone, Default)]
pub struct FrameMailbox {
    queue: Arc<Mutex<VecDeque<Frame>>>,
}

impl FrameMailbox {
    /// An empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a frame for the next tick.
    pub fn push(&self, frame: Frame) {
        self.queue.lock().push_back(frame);
    }

    /// Dequeue the oldest pending frame.
    pub fn pop(&self) -> Option<Frame> {
        self.queue.lock().pop_front()
    }

    /// Number of pending frames.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when no frames are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Drives a scheduler's tick loop at the graph's base interval.
pub struct Runner {
    scheduler: Scheduler,
    mode: ExecutionMode,
    base_interval: Duration,
    mailbox: FrameMailbox,
}

impl Runner {
    /// Wrap a scheduler with a mode and the base interval folded by the
    /// registry during node creation.
    pub fn new(scheduler: Scheduler, mode: ExecutionMode, base_interval: Duration) -> Self {
        Self {
            scheduler,
            mode,
            base_interval,
            mailbox: FrameMailbox::new(),
        }
    }

    /// Handle for host threads to enqueue frames.
    pub fn mailbox(&self) -> FrameMailbox {
        self.mailbox.clone()
    }

    /// The wrapped scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access to the wrapped scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Interval between ticks: the base interval, or 5 ms when no timer
    /// node contributed one.
    pub fn tick_interval(&self) -> Duration {
        if self.base_interval == UNSET_BASE_INTERVAL {
            DEFAULT_TICK_INTERVAL
        } else {
            self.base_interval
        }
    }

    /// One tick at the given elapsed time: compute the mode tolerance, pop
    /// at most one pending frame, and dispatch.
    pub fn step(&mut self, elapsed: Duration) -> TickResult {
        let tolerance = tolerance(self.mode, self.base_interval);
        let frame = self.mailbox.pop();
        self.scheduler.tick(elapsed, tolerance, frame)
    }

    /// Drive wall-clock ticks until `stop` is set, handing every tick's
    /// result to `sink`.
    pub fn run(&mut self, stop: &AtomicBool, mut sink: impl FnMut(TickResult)) {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, mode = ?self.mode);
        let _guard = span.enter();
        let interval = self.tick_interval();
        debug!(interval_us = interval.as_micros() as u64, "tick loop started");

        let started = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            sink(self.step(started.elapsed()));
            std::thread::sleep(interval);
        }
        debug!("tick loop stopped");
    }
}
