//! A single timed bar.
//!
//! A [`Bar`] tracks how long it should run (`duration`), how long it has run
//! (`elapsed`) and how it presents that: either as a countdown, where the
//! progress indicator drains with the remaining time, or in fill mode, where
//! it grows with the elapsed time. Bars are created, started and stopped by
//! the [`BarManager`](crate::BarManager); everything on this type is either a
//! read-only accessor or a setter that immediately pushes the change to the
//! bar's widget.
//!
//! ```rust
//! use bubbletea_timerbars::term::{Pane, TerminalHost};
//! use bubbletea_timerbars::BarManager;
//!
//! let mut bars = BarManager::new(TerminalHost::new());
//! let bar = bars.create_bar("potion", &Pane::default(), None, None).unwrap();
//! bar.set_duration(30.0);
//! bar.set_value(12.5);
//! assert_eq!(bar.remaining(), 17.5);
//!
//! bar.set_fill(true);
//! assert_eq!(bar.widget().progress(), 12.5);
//! ```

use crate::host::{BarWidget, Host};
use crate::subscription::Subscriber;
use crate::template::{BarTemplate, Offsets, Part};
use std::fmt;
use std::time::Duration;

/// Caller-supplied key of a bar.
///
/// Any string or integer converts into a `BarId`, so both `create_bar(7, ..)`
/// and `create_bar("cast", ..)` work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BarId(String);

impl BarId {
    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BarId {
    fn from(id: &str) -> Self {
        BarId(id.to_string())
    }
}

impl From<String> for BarId {
    fn from(id: String) -> Self {
        BarId(id)
    }
}

impl From<&BarId> for BarId {
    fn from(id: &BarId) -> Self {
        id.clone()
    }
}

macro_rules! bar_id_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for BarId {
            fn from(id: $t) -> Self {
                BarId(id.to_string())
            }
        })*
    };
}

bar_id_from_int!(i32, i64, u32, u64, usize);

/// Point-in-time copy of a bar's timing state, handed to callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct BarStatus {
    /// The bar's key.
    pub id: BarId,
    /// Total duration in seconds.
    pub duration: f64,
    /// Seconds elapsed so far.
    pub elapsed: f64,
    /// Seconds left, never negative.
    pub remaining: f64,
    /// Whether the scheduler advances this bar.
    pub running: bool,
    /// Whether progress is shown as elapsed rather than remaining time.
    pub fill: bool,
}

/// Formats a remaining-time label: one decimal place and an `s` suffix.
///
/// ```rust
/// use bubbletea_timerbars::bar::format_remaining;
///
/// assert_eq!(format_remaining(4.9), "4.9s");
/// assert_eq!(format_remaining(0.0), "0.0s");
/// assert_eq!(format_remaining(12.345), "12.3s");
/// ```
pub fn format_remaining(seconds: f64) -> String {
    format!("{:.1}s", seconds)
}

// Negative and NaN inputs clamp to zero, overflowing ones to `Duration::MAX`.
fn from_secs(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

/// A timed countdown/count-up widget.
pub struct Bar<H: Host> {
    id: BarId,
    // Distinguishes a bar from a later one registered under the same id.
    serial: u64,
    widget: H::Widget,
    duration: Duration,
    elapsed: Duration,
    pub(crate) running: bool,
    fill: bool,
    show_remaining_time: bool,
    width: f64,
    height: f64,
    time_width: f64,
    text_padding: f64,
    pub(crate) on_update: Vec<Subscriber<H>>,
    pub(crate) on_finish: Vec<Subscriber<H>>,
}

impl<H: Host> fmt::Debug for Bar<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bar")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("elapsed", &self.elapsed)
            .field("running", &self.running)
            .field("fill", &self.fill)
            .field("show_remaining_time", &self.show_remaining_time)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("on_update", &self.on_update.len())
            .field("on_finish", &self.on_finish.len())
            .finish()
    }
}

impl<H: Host> Bar<H> {
    pub(crate) fn new(id: BarId, serial: u64, widget: H::Widget, template: &BarTemplate) -> Self {
        let mut bar = Self {
            id,
            serial,
            widget,
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            running: false,
            fill: false,
            show_remaining_time: true,
            width: template.width,
            height: template.height,
            time_width: template.time_width,
            text_padding: template.text_padding,
            on_update: Vec::new(),
            on_finish: Vec::new(),
        };
        bar.widget.set_max(0.0);
        bar.layout();
        bar.render();
        bar
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn into_widget(self) -> H::Widget {
        self.widget
    }

    /// The bar's key.
    pub fn id(&self) -> &BarId {
        &self.id
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Seconds elapsed so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Seconds left: `max(0, duration - elapsed)`.
    pub fn remaining(&self) -> f64 {
        self.remaining_time().as_secs_f64()
    }

    /// Time left, at clock precision.
    pub fn remaining_time(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed)
    }

    /// Whether the scheduler is advancing this bar.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether progress is shown as elapsed time.
    pub fn fill(&self) -> bool {
        self.fill
    }

    /// Whether the remaining-time label is shown and kept up to date.
    pub fn shows_remaining_time(&self) -> bool {
        self.show_remaining_time
    }

    /// Frame width in pixels.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// The bar's widget tree.
    pub fn widget(&self) -> &H::Widget {
        &self.widget
    }

    /// Mutable access to the widget tree, for styling the core does not
    /// cover.
    pub fn widget_mut(&mut self) -> &mut H::Widget {
        &mut self.widget
    }

    /// Snapshot of the timing state.
    pub fn status(&self) -> BarStatus {
        BarStatus {
            id: self.id.clone(),
            duration: self.duration(),
            elapsed: self.elapsed(),
            remaining: self.remaining(),
            running: self.running,
            fill: self.fill,
        }
    }

    /// Sets the total duration in seconds without resetting elapsed time.
    ///
    /// Negative durations are treated as zero. The progress indicator's
    /// maximum follows the new duration and the bar re-renders at its
    /// current elapsed time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// let bar = bars.create_bar("mount", &Pane::default(), None, None).unwrap();
    /// bar.set_value(1.5);
    /// bar.set_duration(3.0);
    ///
    /// assert_eq!(bar.elapsed(), 1.5);
    /// assert_eq!(bar.widget().max(), 3.0);
    /// assert_eq!(bar.remaining(), 1.5);
    /// ```
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = from_secs(seconds);
        self.widget.set_max(self.duration());
        self.render();
    }

    /// Sets the elapsed time in seconds and re-renders the progress
    /// indicator and, unless hidden, the remaining-time label.
    ///
    /// # Arguments
    ///
    /// * `elapsed` - Seconds since the bar started. Values past the duration
    ///   leave `remaining()` at zero; negative values count as zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::{BarManager, Part};
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// let bar = bars.create_bar("drink", &Pane::default(), None, None).unwrap();
    /// bar.set_duration(10.0);
    /// bar.set_value(2.5);
    ///
    /// assert_eq!(bar.widget().progress(), 7.5);
    /// assert_eq!(bar.widget().text(Part::Time), "7.5s");
    /// ```
    pub fn set_value(&mut self, elapsed: f64) {
        self.elapsed = from_secs(elapsed);
        self.render();
    }

    pub(crate) fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.render();
    }

    /// Switches between showing elapsed (`true`) and remaining (`false`)
    /// time on the progress indicator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::BarManager;
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// let bar = bars.create_bar("channel", &Pane::default(), None, None).unwrap();
    /// bar.set_duration(4.0);
    /// bar.set_value(1.0);
    /// assert_eq!(bar.widget().progress(), 3.0);
    ///
    /// bar.set_fill(true);
    /// assert_eq!(bar.widget().progress(), 1.0);
    /// ```
    pub fn set_fill(&mut self, fill: bool) {
        self.fill = fill;
        self.render();
    }

    /// Shows or hides the remaining-time label. While hidden the label is not
    /// updated; showing it again re-renders the current remaining time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::{BarManager, Part};
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// let bar = bars.create_bar("aura", &Pane::default(), None, None).unwrap();
    /// bar.set_duration(6.0);
    /// bar.set_time_visibility(false);
    /// bar.set_value(2.0);
    /// assert_eq!(bar.widget().text(Part::Time), "6.0s");
    ///
    /// bar.set_time_visibility(true);
    /// assert_eq!(bar.widget().text(Part::Time), "4.0s");
    /// ```
    pub fn set_time_visibility(&mut self, visible: bool) {
        self.show_remaining_time = visible;
        self.widget.set_visible(Part::Time, visible);
        if visible {
            self.render();
        }
    }

    /// Resizes the frame horizontally and re-flows its children.
    pub fn set_width(&mut self, width: f64) {
        self.width = width;
        self.layout();
    }

    /// Resizes the frame vertically and re-flows its children.
    ///
    /// With `None` the height is taken from the icon's current size, which is
    /// how the layout is refreshed after the icon changes.
    pub fn set_height(&mut self, height: Option<f64>) {
        self.height = height.unwrap_or_else(|| self.widget.offsets(Part::Icon).height());
        self.layout();
    }

    /// Sets or clears the icon. A bar without an icon image gives the icon's
    /// slot back to the progress indicator and labels.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bubbletea_timerbars::term::{Pane, TerminalHost};
    /// use bubbletea_timerbars::{BarManager, BarWidget, Part};
    ///
    /// let mut bars = BarManager::new(TerminalHost::new());
    /// let bar = bars.create_bar("shield", &Pane::default(), None, None).unwrap();
    /// assert_eq!(bar.widget().offsets(Part::Progress).left, 0.0);
    ///
    /// bar.set_icon(Some("🛡"));
    /// assert_eq!(bar.widget().offsets(Part::Progress).left, bar.height());
    /// ```
    pub fn set_icon(&mut self, sprite: Option<&str>) {
        self.widget.set_sprite(Part::Icon, sprite);
        self.set_height(None);
    }

    /// Sets the name label's text.
    pub fn set_text(&mut self, text: &str) {
        self.widget.set_text(Part::Label, text);
    }

    /// Sets the name label's color.
    pub fn set_text_color(&mut self, color: &str) {
        self.widget.set_text_color(Part::Label, color);
    }

    /// Sets the name label's font.
    pub fn set_font(&mut self, font: &str) {
        self.widget.set_font(Part::Label, font);
    }

    /// Sets the remaining-time label's color.
    pub fn set_time_color(&mut self, color: &str) {
        self.widget.set_text_color(Part::Time, color);
    }

    /// Sets the remaining-time label's font.
    pub fn set_time_font(&mut self, font: &str) {
        self.widget.set_font(Part::Time, font);
    }

    /// Sets the progress indicator's fill color.
    pub fn set_bar_color(&mut self, color: &str) {
        self.widget.set_bar_color(color);
    }

    /// Sets the progress indicator's fill sprite.
    pub fn set_bar_sprite(&mut self, sprite: &str) {
        self.widget.set_bar_sprite(sprite);
    }

    /// Sets the frame's background color.
    pub fn set_background_color(&mut self, color: &str) {
        self.widget.set_background_color(Part::Frame, color);
    }

    // Pushes progress and, unless hidden, the time label to the widget.
    fn render(&mut self) {
        let remaining = self.remaining();
        let shown = if self.fill { self.elapsed() } else { remaining };
        self.widget.set_progress(shown);
        if self.show_remaining_time {
            self.widget.set_text(Part::Time, &format_remaining(remaining));
        }
    }

    fn layout(&mut self) {
        let (w, h) = (self.width, self.height);
        let icon_w = if self.widget.sprite(Part::Icon).is_some() {
            h
        } else {
            0.0
        };
        let pad = self.text_padding;
        let time_left = (w - self.time_width).max(icon_w);

        let frame = self.widget.offsets(Part::Frame);
        self.widget.set_offsets(
            Part::Frame,
            Offsets::new(frame.left, frame.top, frame.left + w, frame.top + h),
        );
        self.widget
            .set_offsets(Part::Icon, Offsets::new(0.0, 0.0, icon_w, h));
        self.widget
            .set_offsets(Part::Progress, Offsets::new(icon_w, 0.0, w, h));
        self.widget.set_offsets(
            Part::Label,
            Offsets::new(icon_w + pad, 0.0, (time_left - pad).max(icon_w + pad), h),
        );
        self.widget.set_offsets(
            Part::Time,
            Offsets::new(time_left, 0.0, (w - pad).max(time_left), h),
        );
    }
}
