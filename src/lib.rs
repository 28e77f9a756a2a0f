#![warn(missing_docs)]

//! # bubbletea-timerbars
//!
//! Timed progress bars for [bubbletea-rs](https://github.com/joshka/bubbletea-rs)
//! applications: cast bars, cooldowns, buffs and anything else that counts
//! down (or up) over a fixed number of seconds.
//!
//! ## Overview
//!
//! A [`BarManager`] keeps a registry of [`Bar`]s keyed by caller-chosen ids
//! and drives all of them from one shared tick. Bars are drawn by a [`Host`],
//! which builds one widget per bar from a [`BarTemplate`]. The crate ships a
//! terminal host in [`term`] that renders each bar as a styled line.
//!
//! - **One bar per id**: creating a bar under a live id replaces the old one.
//! - **Measured time**: bars advance by the real clock delta between ticks.
//! - **Callbacks**: update callbacks every tick, finish callbacks exactly once.
//! - **Idle when empty**: the tick only runs while bars exist.
//!
//! ## Quick Start
//!
//! ```rust
//! use bubbletea_timerbars::prelude::*;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut bars = BarManager::new(TerminalHost::with_clock(clock.clone()));
//!
//! let bar = bars.create_bar("hearth", &Pane::default(), None, None).unwrap();
//! bar.set_text("Hearthstone");
//! bar.set_duration(1.0);
//! bars.add_on_finish_callback("hearth", |_, status| {
//!     assert!(!status.running);
//! });
//! bars.start("hearth");
//!
//! while !bars.is_empty() {
//!     clock.advance(Duration::from_millis(100));
//!     bars.tick();
//! }
//! assert!(!bars.scheduler().is_active());
//! ```
//!
//! Inside a bubbletea program, return the command from
//! [`BarManager::start`] and route messages through [`BarManager::update`];
//! see the [`manager`] module.

pub mod bar;
pub mod error;
pub mod host;
pub mod manager;
pub mod scheduler;
pub mod subscription;
pub mod template;
pub mod term;

pub use bar::{format_remaining, Bar, BarId, BarStatus};
pub use error::{Error, Result};
pub use host::{BarWidget, Host};
pub use manager::{
    with_default_size, with_template, with_tick_period, BarManager, ManagerOption,
};
pub use scheduler::{Scheduler, TickMsg, DEFAULT_TICK_PERIOD};
pub use subscription::{BarEvent, Handler, SubscriptionId};
pub use template::{BarTemplate, ElementTemplate, Offsets, Part, DEFAULT_TEMPLATE};

/// Prelude module for convenient imports.
///
/// ```rust
/// use bubbletea_timerbars::prelude::*;
///
/// let bars: BarManager<TerminalHost> = BarManager::with_options(
///     TerminalHost::new(),
///     &[with_default_size(200.0, 20.0)],
/// );
/// assert!(bars.is_empty());
/// ```
pub mod prelude {
    pub use crate::bar::{Bar, BarId, BarStatus};
    pub use crate::error::{Error, Result};
    pub use crate::host::{BarWidget, Host};
    pub use crate::manager::{
        with_default_size, with_template, with_tick_period, BarManager, ManagerOption,
    };
    pub use crate::scheduler::TickMsg;
    pub use crate::subscription::{BarEvent, SubscriptionId};
    pub use crate::template::{BarTemplate, Part};
    pub use crate::term::{ManualClock, Pane, TerminalBar, TerminalHost};
}
