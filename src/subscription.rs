//! Update and finish notifications.
//!
//! Handlers are plain closures. They receive the manager itself, so a handler
//! may look up, restyle, start, stop or create bars while it runs, plus a
//! [`BarStatus`] snapshot of the bar that triggered it. Whatever context the
//! caller needs is captured by the closure.

use crate::bar::BarStatus;
use crate::host::Host;
use crate::manager::BarManager;
use std::fmt;

/// Which notification a handler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarEvent {
    /// Fired once per tick for every bar still running after the tick's
    /// advance.
    Update,
    /// Fired exactly once when the bar stops, explicitly or on completion.
    Finish,
}

/// Handle returned by [`BarManager::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// A boxed bar handler.
pub type Handler<H> = Box<dyn FnMut(&mut BarManager<H>, &BarStatus)>;

pub(crate) struct Subscriber<H: Host> {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: Handler<H>,
}

impl<H: Host> fmt::Debug for Subscriber<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
