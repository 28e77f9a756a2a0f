//! Bar registry and lifecycle.
//!
//! A [`BarManager`] owns every bar of one host, keyed by [`BarId`], together
//! with the [`Scheduler`] that animates them. It enforces one bar per id:
//! creating a bar under a live id stops the old one first, firing its finish
//! callbacks.
//!
//! # Ticking
//!
//! On every tick the manager measures the clock delta since the previous
//! tick and walks the running bars in creation order. A bar whose remaining
//! time does not exceed the delta is stopped right away, without rendering an
//! empty bar first. Every other bar advances by the delta and then notifies
//! its update subscribers. Once no bars are left the scheduler goes idle.
//!
//! # bubbletea-rs Integration
//!
//! ```rust
//! use bubbletea_rs::{Cmd, Msg};
//! use bubbletea_timerbars::term::{self, Pane, TerminalHost};
//! use bubbletea_timerbars::BarManager;
//!
//! struct App {
//!     bars: BarManager<TerminalHost>,
//! }
//!
//! impl App {
//!     fn cast(&mut self, spell: &str, seconds: f64) -> Option<Cmd> {
//!         let bar = self.bars.create_bar(spell, &Pane::default(), None, None).ok()?;
//!         bar.set_text(spell);
//!         bar.set_duration(seconds);
//!         self.bars.start(spell)
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Option<Cmd> {
//!         // Tick messages re-arm themselves until the last bar is gone.
//!         self.bars.update(msg)
//!     }
//!
//!     fn view(&self) -> String {
//!         term::view(&self.bars)
//!     }
//! }
//!
//! let mut app = App { bars: BarManager::new(TerminalHost::new()) };
//! assert!(app.cast("Fireball", 2.5).is_some());
//! assert!(app.view().contains("Fireball"));
//! ```
//!
//! # Callbacks
//!
//! Handlers receive the manager and a [`BarStatus`] snapshot, so they can act
//! on any bar, including starting new ones from a finish handler:
//!
//! ```rust
//! use bubbletea_timerbars::term::{Pane, TerminalHost};
//! use bubbletea_timerbars::BarManager;
//! use std::time::Duration;
//!
//! let mut bars = BarManager::new(TerminalHost::new());
//! bars.create_bar("cast", &Pane::default(), None, None).unwrap().set_duration(0.05);
//! bars.add_on_finish_callback("cast", |bars, status| {
//!     let pane = Pane::default();
//!     if let Ok(cooldown) = bars.create_bar("cooldown", &pane, None, None) {
//!         cooldown.set_duration(status.duration * 10.0);
//!     }
//!     bars.start("cooldown");
//! });
//! bars.start("cast");
//!
//! bars.tick_at(Duration::from_secs(1));
//! assert!(bars.bar("cast").is_none());
//! assert!(bars.bar("cooldown").map_or(false, |b| b.is_running()));
//! ```

use crate::bar::{Bar, BarId, BarStatus};
use crate::error::Result;
use crate::host::{BarWidget, Host};
use crate::scheduler::{Scheduler, TickMsg, DEFAULT_TICK_PERIOD};
use crate::subscription::{BarEvent, Handler, Subscriber, SubscriptionId};
use crate::template::BarTemplate;
use bubbletea_rs::{Cmd, Msg};
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Configuration options for a [`BarManager`], applied in order by
/// [`BarManager::with_options`].
///
/// ```rust
/// use bubbletea_timerbars::manager::{with_default_size, with_tick_period};
/// use bubbletea_timerbars::term::TerminalHost;
/// use bubbletea_timerbars::BarManager;
/// use std::time::Duration;
///
/// let bars = BarManager::with_options(
///     TerminalHost::new(),
///     &[with_tick_period(Duration::from_millis(50)), with_default_size(180.0, 20.0)],
/// );
/// assert_eq!(bars.scheduler().period(), Duration::from_millis(50));
/// assert_eq!(bars.template().width, 180.0);
/// ```
#[derive(Debug, Clone)]
pub enum ManagerOption {
    /// Nominal interval between ticks.
    WithTickPeriod(Duration),
    /// Template every new bar is built from.
    WithTemplate(BarTemplate),
    /// Overrides the template's frame width and height.
    WithDefaultSize(f64, f64),
}

impl ManagerOption {
    fn apply(&self, period: &mut Duration, template: &mut BarTemplate) {
        match self {
            ManagerOption::WithTickPeriod(p) => *period = *p,
            ManagerOption::WithTemplate(t) => *template = t.clone(),
            ManagerOption::WithDefaultSize(width, height) => {
                template.width = *width;
                template.height = *height;
            }
        }
    }
}

/// Sets the nominal tick period (default 100ms).
pub fn with_tick_period(period: Duration) -> ManagerOption {
    ManagerOption::WithTickPeriod(period)
}

/// Builds new bars from `template` instead of the stock one.
pub fn with_template(template: BarTemplate) -> ManagerOption {
    ManagerOption::WithTemplate(template)
}

/// Sets the default frame size of new bars.
pub fn with_default_size(width: f64, height: f64) -> ManagerOption {
    ManagerOption::WithDefaultSize(width, height)
}

/// Registry of bars plus the scheduler animating them.
pub struct BarManager<H: Host> {
    host: H,
    template: BarTemplate,
    scheduler: Scheduler,
    bars: HashMap<BarId, Bar<H>>,
    // Creation order; ticks and views walk bars in this order.
    order: Vec<BarId>,
    next_serial: u64,
    next_subscription: u64,
    // Subscribers currently taken out of their bar for dispatch.
    dispatching: HashSet<SubscriptionId>,
    // Dispatching subscribers unsubscribed mid-dispatch.
    detached: HashSet<SubscriptionId>,
}

impl<H: Host> fmt::Debug for BarManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarManager")
            .field("scheduler", &self.scheduler)
            .field("bars", &self.order)
            .finish()
    }
}

impl<H: Host> BarManager<H> {
    /// A manager with the stock template and a 100ms tick.
    pub fn new(host: H) -> Self {
        Self::with_options(host, &[])
    }

    /// A manager configured by `opts`.
    pub fn with_options(host: H, opts: &[ManagerOption]) -> Self {
        let mut period = DEFAULT_TICK_PERIOD;
        let mut template = BarTemplate::default();
        for opt in opts {
            opt.apply(&mut period, &mut template);
        }

        Self {
            host,
            template,
            scheduler: Scheduler::new(period),
            bars: HashMap::new(),
            order: Vec::new(),
            next_serial: 0,
            next_subscription: 0,
            dispatching: HashSet::new(),
            detached: HashSet::new(),
        }
    }

    /// The host windowing system.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Template new bars are built from.
    pub fn template(&self) -> &BarTemplate {
        &self.template
    }

    /// Mutable access to the template. Changes apply to bars created
    /// afterwards.
    pub fn template_mut(&mut self) -> &mut BarTemplate {
        &mut self.template
    }

    /// The shared tick.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of live bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether no bars are live.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Ids of the live bars in creation order.
    pub fn ids(&self) -> impl Iterator<Item = &BarId> {
        self.order.iter()
    }

    /// Live bars in creation order.
    pub fn bars(&self) -> impl Iterator<Item = &Bar<H>> {
        self.order.iter().filter_map(move |id| self.bars.get(id))
    }

    /// Looks up a bar. Unknown ids yield `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// bars.create_bar(3, &Pane::default(), None, None).unwrap();
    ///
    /// assert!(bars.bar(3).is_some());
    /// assert!(bars.bar("3").is_some());
    /// assert!(bars.bar(4).is_none());
    /// ```
    pub fn bar(&self, id: impl Into<BarId>) -> Option<&Bar<H>> {
        self.bars.get(&id.into())
    }

    /// Looks up a bar for modification.
    pub fn bar_mut(&mut self, id: impl Into<BarId>) -> Option<&mut Bar<H>> {
        self.bars.get_mut(&id.into())
    }

    /// Creates a bar under `id`, parented to `parent`.
    ///
    /// A bar already registered under `id` is stopped, which fires its
    /// finish callbacks, and the new bar takes its place. A bar those
    /// callbacks register under the same `id` is discarded without
    /// notifications. The new bar is idle with zero duration until
    /// configured and started.
    ///
    /// # Arguments
    ///
    /// * `id` - Key of the bar; any string or integer.
    /// * `parent` - Host window the bar's widget is built under.
    /// * `width` - Frame width in pixels, or `None` for the template's.
    /// * `height` - Frame height in pixels, or `None` for the template's.
    ///
    /// # Errors
    ///
    /// Fails when the template lacks one of the bar's sub-elements or the
    /// host cannot build the widget tree. On failure a bar already
    /// registered under `id` is left untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// bars.create_bar(7, &Pane::default(), Some(300.0), None).unwrap();
    /// bars.add_on_finish_callback(7, |_, status| println!("{} replaced", status.id));
    ///
    /// // Re-creating the id stops the first bar and fires its callbacks.
    /// let bar = bars.create_bar(7, &Pane::default(), None, None).unwrap();
    /// assert_eq!(bar.width(), 250.0);
    /// assert_eq!(bars.len(), 1);
    /// ```
    pub fn create_bar(
        &mut self,
        id: impl Into<BarId>,
        parent: &H::Window,
        width: Option<f64>,
        height: Option<f64>,
    ) -> Result<&mut Bar<H>> {
        let id = id.into();
        self.template.validate()?;
        let widget = self.host.create_widget(&self.template, parent, &id)?;
        if self.bars.contains_key(&id) {
            debug!(bar = %id, "replacing existing bar");
            self.stop(&id);
        }

        self.next_serial += 1;
        let mut bar = Bar::new(id.clone(), self.next_serial, widget, &self.template);
        if let Some(width) = width {
            bar.set_width(width);
        }
        if height.is_some() {
            bar.set_height(height);
        }

        debug!(bar = %id, width = bar.width(), height = bar.height(), "bar created");
        Ok(match self.bars.entry(id) {
            // Registered by the replaced bar's finish callbacks; already in `order`.
            Entry::Occupied(mut slot) => {
                let discarded = slot.insert(bar);
                debug!(bar = %slot.key(), "discarding bar registered during replace");
                discarded.into_widget().destroy();
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                self.order.push(slot.key().clone());
                slot.insert(bar)
            }
        })
    }

    /// Marks a bar as running and makes sure the scheduler is ticking.
    ///
    /// Returns the first tick command when this start activated the
    /// scheduler; hand it to the bubbletea runtime. Unknown ids are ignored.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// bars.create_bar("a", &Pane::default(), None, None).unwrap();
    /// bars.create_bar("b", &Pane::default(), None, None).unwrap();
    ///
    /// assert!(bars.start("a").is_some()); // wakes the scheduler
    /// assert!(bars.start("b").is_none()); // already ticking
    /// assert!(bars.start("missing").is_none());
    /// ```
    pub fn start(&mut self, id: impl Into<BarId>) -> Option<Cmd> {
        let id = id.into();
        let bar = self.bars.get_mut(&id)?;
        bar.running = true;
        debug!(bar = %id, duration = bar.duration(), "bar started");
        self.scheduler.activate()
    }

    /// Stops a bar: removes it from the registry, runs its finish callbacks
    /// in registration order, then destroys its widget.
    ///
    /// Returns `false` when no bar is registered under `id`. Stopping the
    /// last bar puts the scheduler to sleep.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// bars.create_bar("buff", &Pane::default(), None, None).unwrap();
    /// let finished = Rc::new(Cell::new(false));
    /// let flag = Rc::clone(&finished);
    /// bars.add_on_finish_callback("buff", move |_, _| flag.set(true));
    /// bars.start("buff");
    ///
    /// assert!(bars.stop("buff"));
    /// assert!(finished.get());
    /// assert!(!bars.scheduler().is_active());
    /// assert!(!bars.stop("buff"));
    /// ```
    pub fn stop(&mut self, id: impl Into<BarId>) -> bool {
        let id = id.into();
        let Some(mut bar) = self.bars.remove(&id) else {
            return false;
        };
        self.order.retain(|live| live != &id);
        bar.running = false;
        debug!(bar = %id, elapsed = bar.elapsed(), "bar stopped");

        let status = bar.status();
        let subscribers = std::mem::take(&mut bar.on_finish);
        self.dispatch(subscribers, &status, BarEvent::Finish);
        bar.into_widget().destroy();

        if self.bars.is_empty() {
            self.scheduler.deactivate();
        }
        true
    }

    /// Subscribes `handler` to `event` on the bar under `id`.
    ///
    /// Handlers run in subscription order as `handler(manager, status)`.
    /// Returns `None` when no such bar exists.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::{BarEvent, BarManager};
    /// use std::time::Duration;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// bars.create_bar("dot", &Pane::default(), None, None)
    ///     .unwrap()
    ///     .set_duration(12.0);
    /// let sub = bars
    ///     .subscribe("dot", BarEvent::Update, |_, status| {
    ///         assert!(status.remaining < 12.0);
    ///     })
    ///     .unwrap();
    /// bars.start("dot");
    /// bars.tick_at(Duration::from_secs(1));
    ///
    /// assert!(bars.unsubscribe(sub));
    /// assert!(!bars.unsubscribe(sub));
    /// ```
    pub fn subscribe<F>(
        &mut self,
        id: impl Into<BarId>,
        event: BarEvent,
        handler: F,
    ) -> Option<SubscriptionId>
    where
        F: FnMut(&mut BarManager<H>, &BarStatus) + 'static,
    {
        let bar = self.bars.get_mut(&id.into())?;
        self.next_subscription += 1;
        let sub = SubscriptionId(self.next_subscription);
        let subscriber = Subscriber {
            id: sub,
            handler: Box::new(handler) as Handler<H>,
        };
        match event {
            BarEvent::Update => bar.on_update.push(subscriber),
            BarEvent::Finish => bar.on_finish.push(subscriber),
        }
        Some(sub)
    }

    /// Removes a subscription. Returns whether it was live.
    ///
    /// Unsubscribing from inside a handler takes effect immediately: a
    /// handler later in the same batch is skipped.
    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        if self.dispatching.contains(&sub) {
            return self.detached.insert(sub);
        }
        for bar in self.bars.values_mut() {
            for list in [&mut bar.on_update, &mut bar.on_finish] {
                if let Some(pos) = list.iter().position(|s| s.id == sub) {
                    list.remove(pos);
                    return true;
                }
            }
        }
        false
    }

    /// Appends an update callback. See [`subscribe`](Self::subscribe).
    pub fn add_on_update_callback<F>(&mut self, id: impl Into<BarId>, handler: F) -> Option<SubscriptionId>
    where
        F: FnMut(&mut BarManager<H>, &BarStatus) + 'static,
    {
        self.subscribe(id, BarEvent::Update, handler)
    }

    /// Appends a finish callback. See [`subscribe`](Self::subscribe).
    pub fn add_on_finish_callback<F>(&mut self, id: impl Into<BarId>, handler: F) -> Option<SubscriptionId>
    where
        F: FnMut(&mut BarManager<H>, &BarStatus) + 'static,
    {
        self.subscribe(id, BarEvent::Finish, handler)
    }

    /// Runs one tick at the host's current time.
    pub fn tick(&mut self) {
        let now = self.host.now();
        self.tick_at(now);
    }

    /// Runs one tick as if observed at `now`. Does nothing while the
    /// scheduler is idle.
    ///
    /// The first tick after the scheduler wakes advances bars by one period;
    /// later ticks advance them by the time since the previous tick.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    /// use std::time::Duration;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// bars.create_bar(1, &Pane::default(), None, None)
    ///     .unwrap()
    ///     .set_duration(5.0);
    /// bars.start(1);
    ///
    /// bars.tick_at(Duration::from_secs(20)); // first tick: one period
    /// bars.tick_at(Duration::from_millis(20_500)); // measured: 0.5s
    /// assert_eq!(bars.bar(1).unwrap().elapsed(), 0.6);
    /// ```
    pub fn tick_at(&mut self, now: Duration) {
        if !self.scheduler.is_active() {
            return;
        }
        let delta = self.scheduler.delta(now);
        trace!(delta = ?delta, bars = self.bars.len(), "tick");

        // Bars created by callbacks during this tick wait for the next one.
        let due: Vec<(BarId, u64)> = self
            .order
            .iter()
            .filter_map(|id| self.bars.get(id).map(|bar| (id.clone(), bar.serial())))
            .collect();

        for (id, serial) in due {
            let Some(bar) = self.bars.get_mut(&id) else {
                continue;
            };
            if bar.serial() != serial || !bar.is_running() {
                continue;
            }
            if bar.remaining_time() <= delta {
                self.stop(&id);
                continue;
            }
            bar.advance(delta);
            self.notify_update(&id, serial);
        }

        if self.bars.is_empty() {
            self.scheduler.deactivate();
        } else if self.scheduler.is_active() {
            self.scheduler.record(now);
        }
    }

    /// Handles a [`TickMsg`] and returns the command arming the next one.
    ///
    /// Any other message, a tick meant for another manager, or a tick left
    /// over from an earlier activation yields `None`.
    pub fn update(&mut self, msg: Msg) -> Option<Cmd> {
        let tick = msg.downcast_ref::<TickMsg>()?;
        if !self.scheduler.accepts(tick) {
            if tick.id == self.scheduler.id() {
                warn!(scheduler = tick.id, "dropping stale tick");
            }
            return None;
        }

        self.tick();
        if self.scheduler.is_active() {
            Some(self.scheduler.next_tick())
        } else {
            None
        }
    }

    fn notify_update(&mut self, id: &BarId, serial: u64) {
        let Some(bar) = self.bars.get_mut(id) else {
            return;
        };
        let status = bar.status();
        let subscribers = std::mem::take(&mut bar.on_update);
        let subscribers = self.dispatch(subscribers, &status, BarEvent::Update);

        let detached = &mut self.detached;
        match self.bars.get_mut(id) {
            Some(bar) if bar.serial() == serial => {
                // Keep the original order ahead of anything subscribed mid-dispatch.
                let added = std::mem::replace(&mut bar.on_update, subscribers);
                bar.on_update.extend(added);
                bar.on_update.retain(|s| !detached.remove(&s.id));
            }
            _ => {
                for s in &subscribers {
                    detached.remove(&s.id);
                }
            }
        }
    }

    /// Invokes each subscriber with panic isolation and hands the list back.
    fn dispatch(
        &mut self,
        mut subscribers: Vec<Subscriber<H>>,
        status: &BarStatus,
        event: BarEvent,
    ) -> Vec<Subscriber<H>> {
        self.dispatching.extend(subscribers.iter().map(|s| s.id));
        for subscriber in subscribers.iter_mut() {
            if self.detached.contains(&subscriber.id) {
                continue;
            }
            let handler = &mut subscriber.handler;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(self, status)));
            if let Err(payload) = outcome {
                error!(
                    bar = %status.id,
                    ?event,
                    reason = panic_message(payload.as_ref()),
                    "bar callback panicked"
                );
            }
        }
        for s in &subscribers {
            self.dispatching.remove(&s.id);
        }
        if event == BarEvent::Finish {
            for s in &subscribers {
                self.detached.remove(&s.id);
            }
        }
        subscribers
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{ManualClock, Pane, TerminalHost};
    use crate::template::Part;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn manager() -> BarManager<TerminalHost> {
        BarManager::new(TerminalHost::new())
    }

    fn add_bar(bars: &mut BarManager<TerminalHost>, id: impl Into<BarId>, duration: f64) {
        let bar = bars
            .create_bar(id, &Pane::default(), None, None)
            .expect("default template builds");
        bar.set_duration(duration);
    }

    /// Records `"<event>:<id>"` for every callback fired.
    fn recorder() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn record_update(bars: &mut BarManager<TerminalHost>, id: &str, log: &Rc<RefCell<Vec<String>>>) {
        let log = Rc::clone(log);
        bars.add_on_update_callback(id, move |_, status| {
            log.borrow_mut().push(format!("update:{}", status.id));
        });
    }

    fn record_finish(bars: &mut BarManager<TerminalHost>, id: &str, log: &Rc<RefCell<Vec<String>>>) {
        let log = Rc::clone(log);
        bars.add_on_finish_callback(id, move |_, status| {
            log.borrow_mut().push(format!("finish:{}", status.id));
        });
    }

    #[test]
    fn test_create_and_get_bar() {
        let mut bars = manager();
        assert!(bars.bar(1).is_none());

        add_bar(&mut bars, 1, 5.0);
        let bar = bars.bar(1).expect("bar registered");
        assert_eq!(bar.duration(), 5.0);
        assert_eq!(bar.elapsed(), 0.0);
        assert!(!bar.is_running());
        assert!(!bar.fill());
        assert!(bar.shows_remaining_time());
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_create_applies_size_overrides() {
        let mut bars = manager();
        let bar = bars
            .create_bar("sized", &Pane::default(), Some(120.0), Some(30.0))
            .unwrap();
        assert_eq!(bar.width(), 120.0);
        assert_eq!(bar.height(), 30.0);
        assert_eq!(bar.widget().offsets(Part::Frame).width(), 120.0);
        assert_eq!(bar.widget().offsets(Part::Frame).height(), 30.0);
    }

    #[test]
    fn test_create_fails_on_incomplete_template() {
        let mut template = BarTemplate::default();
        template.elements.retain(|e| e.part != Part::Time);
        let mut bars = BarManager::with_options(TerminalHost::new(), &[with_template(template)]);

        let result = bars.create_bar(1, &Pane::default(), None, None);
        assert!(matches!(result, Err(crate::Error::MissingElement(Part::Time))));
        assert!(bars.is_empty());
    }

    #[test]
    fn test_failed_recreate_keeps_live_bar() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 1, 5.0);
        record_finish(&mut bars, "1", &log);
        bars.start(1);
        bars.template_mut().elements.retain(|e| e.part != Part::Label);

        let result = bars.create_bar(1, &Pane::default(), None, None);
        assert!(matches!(result, Err(crate::Error::MissingElement(Part::Label))));
        assert!(log.borrow().is_empty());

        let bar = bars.bar(1).expect("old bar kept");
        assert!(bar.is_running());
        assert_eq!(bar.duration(), 5.0);
        assert_eq!(bars.host().live_widgets(), 1);
        assert!(bars.scheduler().is_active());
    }

    #[test]
    fn test_start_unknown_bar_is_noop() {
        let mut bars = manager();
        assert!(bars.start(42).is_none());
        assert!(!bars.scheduler().is_active());
    }

    #[test]
    fn test_start_activates_scheduler_once() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        add_bar(&mut bars, 2, 5.0);

        assert!(bars.start(1).is_some());
        assert!(bars.scheduler().is_active());
        assert!(bars.start(2).is_none());
        assert!(bars.start(1).is_none());
    }

    #[test]
    fn test_single_tick_advances_running_bar() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 1, 5.0);
        record_update(&mut bars, "1", &log);
        bars.start(1);

        bars.tick_at(secs(10.0));

        let bar = bars.bar(1).expect("still registered");
        assert!((bar.elapsed() - 0.1).abs() < 1e-9);
        assert!((bar.remaining() - 4.9).abs() < 1e-9);
        assert_eq!(bar.widget().text(Part::Time), "4.9s");
        assert_eq!(*log.borrow(), vec!["update:1".to_string()]);
        assert_eq!(bars.scheduler().last_tick(), Some(secs(10.0)));
    }

    #[test]
    fn test_measured_delta_drives_advance() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        bars.start(1);

        bars.tick_at(secs(10.0));
        bars.tick_at(secs(10.35));
        bars.tick_at(secs(11.0));

        let elapsed = bars.bar(1).unwrap().elapsed();
        assert!((elapsed - 1.1).abs() < 1e-9, "elapsed was {}", elapsed);
    }

    #[test]
    fn test_short_bar_stops_on_first_tick() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 1, 0.05);
        record_update(&mut bars, "1", &log);
        record_finish(&mut bars, "1", &log);
        bars.start(1);

        bars.tick_at(secs(3.0));

        assert!(bars.bar(1).is_none());
        assert_eq!(*log.borrow(), vec!["finish:1".to_string()]);
        assert!(!bars.scheduler().is_active());
        assert_eq!(bars.scheduler().last_tick(), None);
        assert_eq!(bars.host().live_widgets(), 0);
    }

    #[test]
    fn test_zero_duration_bar_stops_on_first_tick() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, "instant", 0.0);
        record_finish(&mut bars, "instant", &log);
        bars.start("instant");

        bars.tick_at(secs(1.0));
        assert!(bars.is_empty());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_bar_stops_on_tick_reaching_duration() {
        let mut bars = manager();
        let finished = Rc::new(RefCell::new(0));
        add_bar(&mut bars, 1, 1.0);
        let counter = Rc::clone(&finished);
        bars.add_on_finish_callback(1, move |_, _| *counter.borrow_mut() += 1);
        bars.start(1);

        // 0.1 (estimated) + 0.4 + 0.4 = 0.9 elapsed, 0.1 remaining.
        bars.tick_at(secs(0.0));
        bars.tick_at(secs(0.4));
        bars.tick_at(secs(0.8));
        assert!(bars.bar(1).is_some());
        assert_eq!(*finished.borrow(), 0);

        // Remaining is never rendered as zero before the bar disappears.
        let bar = bars.bar(1).unwrap();
        assert_ne!(bar.widget().text(Part::Time), "0.0s");

        bars.tick_at(secs(1.2));
        assert!(bars.bar(1).is_none());
        assert_eq!(*finished.borrow(), 1);

        bars.tick_at(secs(1.6));
        assert_eq!(*finished.borrow(), 1);
    }

    #[test]
    fn test_period_ticks_stop_bar_exactly_at_duration() {
        let clock = ManualClock::new();
        let mut bars = BarManager::new(TerminalHost::with_clock(clock.clone()));
        let log = recorder();
        add_bar(&mut bars, "hearth", 1.0);
        record_finish(&mut bars, "hearth", &log);
        bars.start("hearth");
        let period = bars.scheduler().period();

        // Nine ticks of one period each leave exactly one period remaining.
        for tick in 1..10 {
            bars.tick();
            clock.advance(period);
            let bar = bars.bar("hearth").expect("still running");
            assert_ne!(bar.widget().text(Part::Time), "0.0s", "tick {}", tick);
            assert!(log.borrow().is_empty());
        }
        assert_eq!(bars.bar("hearth").unwrap().remaining_time(), period);

        bars.tick();
        assert!(bars.bar("hearth").is_none());
        assert_eq!(*log.borrow(), vec!["finish:hearth".to_string()]);
    }

    #[test]
    fn test_idle_bars_are_not_advanced() {
        let mut bars = manager();
        add_bar(&mut bars, "running", 5.0);
        add_bar(&mut bars, "idle", 5.0);
        bars.start("running");

        bars.tick_at(secs(1.0));
        assert_eq!(bars.bar("idle").unwrap().elapsed(), 0.0);
        assert!(bars.bar("running").unwrap().elapsed() > 0.0);
        assert!(bars.scheduler().is_active());
    }

    #[test]
    fn test_tick_while_idle_is_ignored() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        bars.tick_at(secs(1.0));
        assert_eq!(bars.bar(1).unwrap().elapsed(), 0.0);
        assert_eq!(bars.scheduler().last_tick(), None);
    }

    #[test]
    fn test_stopping_last_bar_stops_scheduler() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        add_bar(&mut bars, 2, 5.0);
        bars.start(1);
        bars.tick_at(secs(1.0));

        assert!(bars.stop(1));
        assert!(bars.scheduler().is_active());
        assert!(bars.stop(2));
        assert!(!bars.scheduler().is_active());
        assert_eq!(bars.scheduler().last_tick(), None);
        assert!(!bars.stop(2));
    }

    #[test]
    fn test_restart_estimates_first_delta_again() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        bars.start(1);
        bars.tick_at(secs(1.0));
        bars.stop(1);

        add_bar(&mut bars, 2, 5.0);
        bars.start(2);
        bars.tick_at(secs(500.0));
        assert!((bars.bar(2).unwrap().elapsed() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_stop_idle_bar_fires_finish_and_releases_widget() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, "idle", 5.0);
        record_finish(&mut bars, "idle", &log);
        assert_eq!(bars.host().live_widgets(), 1);

        assert!(bars.stop("idle"));
        assert_eq!(*log.borrow(), vec!["finish:idle".to_string()]);
        assert_eq!(bars.host().live_widgets(), 0);
    }

    #[test]
    fn test_recreate_replaces_previous_bar() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 7, 5.0);
        record_finish(&mut bars, "7", &log);

        add_bar(&mut bars, 7, 9.0);
        assert_eq!(*log.borrow(), vec!["finish:7".to_string()]);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars.bar(7).unwrap().duration(), 9.0);
        assert_eq!(bars.host().live_widgets(), 1);

        // The replacement starts with no callbacks of its own.
        bars.stop(7);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 1, 5.0);
        for n in 0..3 {
            let log = Rc::clone(&log);
            bars.add_on_update_callback(1, move |_, _| log.borrow_mut().push(format!("u{}", n)));
        }
        for n in 0..2 {
            let log = Rc::clone(&log);
            bars.add_on_finish_callback(1, move |_, _| log.borrow_mut().push(format!("f{}", n)));
        }
        bars.start(1);
        bars.tick_at(secs(0.0));
        bars.stop(1);

        assert_eq!(*log.borrow(), vec!["u0", "u1", "u2", "f0", "f1"]);
    }

    #[test]
    fn test_callbacks_receive_post_advance_status() {
        let mut bars = manager();
        let seen = Rc::new(RefCell::new(None));
        add_bar(&mut bars, 1, 2.0);
        let slot = Rc::clone(&seen);
        bars.add_on_update_callback(1, move |_, status| *slot.borrow_mut() = Some(status.clone()));
        bars.start(1);
        bars.tick_at(secs(0.0));

        let status = seen.borrow().clone().expect("update fired");
        assert!((status.elapsed - 0.1).abs() < 1e-9);
        assert!((status.remaining - 1.9).abs() < 1e-9);
        assert!(status.running);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 1, 5.0);
        let log_a = Rc::clone(&log);
        let a = bars
            .add_on_update_callback(1, move |_, _| log_a.borrow_mut().push("a".into()))
            .unwrap();
        record_update(&mut bars, "1", &log);
        bars.start(1);

        assert!(bars.unsubscribe(a));
        assert!(!bars.unsubscribe(a));
        bars.tick_at(secs(0.0));
        assert_eq!(*log.borrow(), vec!["update:1".to_string()]);
    }

    #[test]
    fn test_unsubscribe_from_inside_handler() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, 1, 5.0);
        let target = Rc::new(RefCell::new(None));

        let cancel = Rc::clone(&target);
        bars.add_on_update_callback(1, move |bars, _| {
            if let Some(sub) = cancel.borrow_mut().take() {
                bars.unsubscribe(sub);
            }
        });
        let log_b = Rc::clone(&log);
        let b = bars
            .add_on_update_callback(1, move |_, _| log_b.borrow_mut().push("b".into()))
            .unwrap();
        *target.borrow_mut() = Some(b);
        bars.start(1);

        bars.tick_at(secs(0.0));
        bars.tick_at(secs(0.1));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_subscribe_to_unknown_bar() {
        let mut bars = manager();
        assert!(bars.add_on_update_callback(1, |_, _| {}).is_none());
    }

    #[test]
    fn test_panicking_callback_does_not_block_other_bars() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, "a", 5.0);
        add_bar(&mut bars, "b", 5.0);
        bars.add_on_update_callback("a", |_, _| panic!("handler exploded"));
        record_update(&mut bars, "a", &log);
        record_update(&mut bars, "b", &log);
        bars.start("a");
        bars.start("b");

        bars.tick_at(secs(0.0));
        assert_eq!(*log.borrow(), vec!["update:a".to_string(), "update:b".to_string()]);
        assert!(bars.bar("a").unwrap().is_running());
    }

    #[test]
    fn test_panicking_finish_callback_does_not_block_tick() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, "a", 0.05);
        add_bar(&mut bars, "b", 5.0);
        bars.add_on_finish_callback("a", |_, _| panic!("finish handler exploded"));
        record_finish(&mut bars, "a", &log);
        record_update(&mut bars, "b", &log);
        bars.start("a");
        bars.start("b");
        assert_eq!(bars.host().live_widgets(), 2);

        bars.tick_at(secs(0.0));
        assert_eq!(*log.borrow(), vec!["finish:a".to_string(), "update:b".to_string()]);
        assert!(bars.bar("a").is_none());
        assert_eq!(bars.host().live_widgets(), 1);
        assert_eq!(bars.bar("b").unwrap().elapsed(), 0.1);
    }

    /// Creates "pet" with a finish callback that creates it again.
    fn respawn(bars: &mut BarManager<TerminalHost>, respawns: Rc<Cell<u32>>) {
        if bars.create_bar("pet", &Pane::default(), None, None).is_ok() {
            bars.add_on_finish_callback("pet", move |bars, _| {
                respawns.set(respawns.get() + 1);
                respawn(bars, Rc::clone(&respawns));
            });
        }
    }

    #[test]
    fn test_replace_discards_bar_registered_by_finish_callback() {
        let mut bars = manager();
        let respawns = Rc::new(Cell::new(0));
        respawn(&mut bars, Rc::clone(&respawns));

        let bar = bars.create_bar("pet", &Pane::default(), None, None).unwrap();
        bar.set_duration(2.0);
        assert_eq!(respawns.get(), 1);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars.ids().collect::<Vec<_>>(), vec![&BarId::from("pet")]);
        assert_eq!(bars.host().live_widgets(), 1);
        assert_eq!(bars.bar("pet").unwrap().duration(), 2.0);

        // The replacement carries none of the discarded bar's callbacks.
        assert!(bars.stop("pet"));
        assert_eq!(respawns.get(), 1);
        assert!(bars.is_empty());
        assert_eq!(bars.host().live_widgets(), 0);
    }

    #[test]
    fn test_finish_callback_can_start_new_bar() {
        let mut bars = manager();
        add_bar(&mut bars, "cast", 0.05);
        bars.add_on_finish_callback("cast", |bars, _| {
            if let Ok(bar) = bars.create_bar("cooldown", &Pane::default(), None, None) {
                bar.set_duration(3.0);
            }
            bars.start("cooldown");
        });
        bars.start("cast");

        bars.tick_at(secs(0.0));
        assert!(bars.bar("cast").is_none());
        let cooldown = bars.bar("cooldown").expect("created by finish handler");
        assert!(cooldown.is_running());
        // Created during the tick, so it waits for the next one.
        assert_eq!(cooldown.elapsed(), 0.0);
        assert!(bars.scheduler().is_active());

        bars.tick_at(secs(0.25));
        assert!(bars.bar("cooldown").unwrap().elapsed() > 0.0);
    }

    #[test]
    fn test_finish_callback_recreating_same_id() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 0.05);
        bars.add_on_finish_callback(1, |bars, _| {
            if let Ok(bar) = bars.create_bar(1, &Pane::default(), None, None) {
                bar.set_duration(10.0);
            }
            bars.start(1);
        });
        bars.start(1);

        bars.tick_at(secs(0.0));
        let bar = bars.bar(1).expect("replacement registered");
        assert_eq!(bar.duration(), 10.0);
        assert_eq!(bar.elapsed(), 0.0);
        assert_eq!(bars.host().live_widgets(), 1);
    }

    #[test]
    fn test_update_callback_can_stop_other_bar() {
        let mut bars = manager();
        let log = recorder();
        add_bar(&mut bars, "first", 5.0);
        add_bar(&mut bars, "second", 5.0);
        bars.add_on_update_callback("first", |bars, _| {
            bars.stop("second");
        });
        record_update(&mut bars, "second", &log);
        record_finish(&mut bars, "second", &log);
        bars.start("first");
        bars.start("second");

        bars.tick_at(secs(0.0));
        assert_eq!(*log.borrow(), vec!["finish:second".to_string()]);
        assert!(bars.bar("first").is_some());
    }

    #[test]
    fn test_update_drives_ticks_and_rearms() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        assert!(bars.start(1).is_some());

        let tick = bars.scheduler().current_tick();
        assert!(bars.update(Box::new(tick)).is_some());
        assert!(bars.bar(1).unwrap().elapsed() > 0.0);
    }

    #[test]
    fn test_update_stops_rearming_when_empty() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 0.01);
        bars.start(1);

        let tick = bars.scheduler().current_tick();
        assert!(bars.update(Box::new(tick)).is_none());
        assert!(bars.is_empty());
    }

    #[test]
    fn test_update_rejects_stale_and_foreign_ticks() {
        let mut bars = manager();
        add_bar(&mut bars, 1, 5.0);
        bars.start(1);
        let stale = bars.scheduler().current_tick();
        bars.stop(1);

        add_bar(&mut bars, 2, 5.0);
        bars.start(2);
        assert!(bars.update(Box::new(stale)).is_none());
        assert_eq!(bars.bar(2).unwrap().elapsed(), 0.0);

        let mut other = manager();
        add_bar(&mut other, 1, 5.0);
        other.start(1);
        let foreign = other.scheduler().current_tick();
        assert!(bars.update(Box::new(foreign)).is_none());

        assert!(bars.update(Box::new("not a tick")).is_none());
    }

    #[test]
    fn test_tick_reads_host_clock() {
        let clock = ManualClock::new();
        let mut bars = BarManager::new(TerminalHost::with_clock(clock.clone()));
        add_bar(&mut bars, 1, 5.0);
        bars.start(1);

        clock.set(secs(2.0));
        bars.tick();
        clock.advance(secs(0.5));
        bars.tick();

        assert!((bars.bar(1).unwrap().elapsed() - 0.6).abs() < 1e-9);
        assert_eq!(bars.scheduler().last_tick(), Some(secs(2.5)));
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let mut bars = manager();
        add_bar(&mut bars, "b", 1.0);
        add_bar(&mut bars, "a", 1.0);
        add_bar(&mut bars, "c", 1.0);
        bars.stop("a");

        let ids: Vec<&str> = bars.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(bars.bars().count(), 2);
    }

    #[test]
    fn test_options_apply_in_order() {
        let mut template = BarTemplate::default();
        template.width = 90.0;
        let bars = BarManager::with_options(
            TerminalHost::new(),
            &[
                with_default_size(300.0, 40.0),
                with_template(template),
                with_tick_period(Duration::from_millis(20)),
            ],
        );
        assert_eq!(bars.template().width, 90.0);
        assert_eq!(bars.template().height, 25.0);
        assert_eq!(bars.scheduler().period(), Duration::from_millis(20));
    }
}
