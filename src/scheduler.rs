//! The shared tick.
//!
//! One [`Scheduler`] serves every bar of a [`BarManager`](crate::BarManager).
//! It is idle until the first bar starts, fires every `period` while active,
//! and goes idle again as soon as the manager has no bars left.
//!
//! The recurring timer is a chain of `bubbletea_rs::tick` commands: each
//! [`TickMsg`] handled by [`BarManager::update`](crate::BarManager::update)
//! arms the next one. Every activation gets a fresh tag, so a tick armed
//! before the scheduler went idle is recognised as stale and dropped instead
//! of doubling the tick rate.
//!
//! Elapsed time is measured, not assumed: each tick advances bars by the
//! clock delta since the previous tick. Only the first tick after activation,
//! which has nothing to measure against, uses the nominal period.

use bubbletea_rs::{tick as bubbletea_tick, Cmd, Msg};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Nominal interval between ticks.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

// Internal ID management for scheduler instances
static LAST_ID: AtomicI64 = AtomicI64::new(0);

fn next_id() -> i64 {
    LAST_ID.fetch_add(1, Ordering::SeqCst) + 1
}

/// Message delivered once per tick period while the scheduler is active.
///
/// Feed it to [`BarManager::update`](crate::BarManager::update); messages
/// for other managers or from an earlier activation are ignored.
#[derive(Debug, Clone)]
pub struct TickMsg {
    /// Identifier of the scheduler that armed this tick.
    pub id: i64,
    // Activation the tick belongs to.
    tag: i64,
}

/// Tick bookkeeping for one manager.
#[derive(Debug, Clone)]
pub struct Scheduler {
    id: i64,
    tag: i64,
    period: Duration,
    active: bool,
    last_tick: Option<Duration>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD)
    }
}

impl Scheduler {
    /// An idle scheduler firing every `period` once activated.
    pub fn new(period: Duration) -> Self {
        Self {
            id: next_id(),
            tag: 0,
            period,
            active: false,
            last_tick: None,
        }
    }

    /// Identifier carried by this scheduler's [`TickMsg`]s.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Nominal interval between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the recurring tick is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Clock reading of the last processed tick, `None` before the first
    /// tick of an activation.
    pub fn last_tick(&self) -> Option<Duration> {
        self.last_tick
    }

    /// Starts the recurring tick. Returns the first tick command, or `None`
    /// when already active.
    pub(crate) fn activate(&mut self) -> Option<Cmd> {
        if self.active {
            return None;
        }
        self.active = true;
        self.tag += 1;
        debug!(scheduler = self.id, period = ?self.period, "scheduler started");
        Some(self.next_tick())
    }

    /// Stops the recurring tick and forgets the last timestamp so the next
    /// activation estimates its first delta instead of measuring a stale one.
    pub(crate) fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.last_tick = None;
        debug!(scheduler = self.id, "scheduler stopped");
    }

    /// How far to advance bars on a tick observed at `now`.
    pub(crate) fn delta(&self, now: Duration) -> Duration {
        match self.last_tick {
            Some(previous) => now.saturating_sub(previous),
            None => self.period,
        }
    }

    pub(crate) fn record(&mut self, now: Duration) {
        self.last_tick = Some(now);
    }

    /// Whether `msg` belongs to this scheduler's current activation.
    pub(crate) fn accepts(&self, msg: &TickMsg) -> bool {
        self.active && msg.id == self.id && msg.tag == self.tag
    }

    /// The tick message the current activation expects.
    pub(crate) fn current_tick(&self) -> TickMsg {
        TickMsg {
            id: self.id,
            tag: self.tag,
        }
    }

    /// Command delivering the next [`TickMsg`] after one period.
    pub(crate) fn next_tick(&self) -> Cmd {
        let id = self.id;
        let tag = self.tag;
        bubbletea_tick(self.period, move |_| Box::new(TickMsg { id, tag }) as Msg)
    }
}
