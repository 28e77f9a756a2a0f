//! Terminal host.
//!
//! [`TerminalHost`] implements [`Host`] without any real windowing system:
//! each bar becomes a [`TerminalBar`] that keeps the state the bar pushes to
//! it and renders as a single styled line,
//!
//! ```text
//! ◆ Fireball                  ███████████████████░░░░░░░░░░░░ 1.9s
//! ```
//!
//! Pixel geometry maps to terminal cells through a fixed cell width (8px by
//! default), so resizing a bar resizes its line.
//!
//! ```rust
//! use bubbletea_timerbars::term::{self, ManualClock, Pane, TerminalHost};
//! use bubbletea_timerbars::BarManager;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut bars = BarManager::new(TerminalHost::with_clock(clock.clone()));
//! let bar = bars.create_bar(1, &Pane::default(), None, None).unwrap();
//! bar.set_text("Hearthstone");
//! bar.set_duration(10.0);
//! bars.start(1);
//!
//! clock.advance(Duration::from_millis(100));
//! bars.tick();
//! assert!(term::view(&bars).contains("9.9s"));
//! ```

use crate::bar::BarId;
use crate::error::{Error, Result};
use crate::host::{BarWidget, Host};
use crate::manager::BarManager;
use crate::template::{BarTemplate, Offsets, Part};
use lipgloss_extras::lipgloss::{Color, Style};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::trace;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Pixels per terminal cell.
pub const DEFAULT_CELL_WIDTH: f64 = 8.0;

const FULL: char = '█';
const EMPTY: char = '░';
const ICON_FALLBACK: &str = "◆";

/// A named region of the terminal bars can be parented to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pane(String);

impl Pane {
    /// A pane called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Pane(name.into())
    }

    /// The pane's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Pane {
    fn default() -> Self {
        Pane::new("main")
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    /// A clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current reading.
    pub fn now(&self) -> Duration {
        self.0.get()
    }

    /// Jumps to `now`.
    pub fn set(&self, now: Duration) {
        self.0.set(now);
    }

    /// Moves forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

#[derive(Debug, Clone)]
enum Clock {
    System(Instant),
    Manual(ManualClock),
}

/// [`Host`] rendering bars as terminal lines.
#[derive(Debug, Clone)]
pub struct TerminalHost {
    clock: Clock,
    cell_width: f64,
    live: Rc<Cell<usize>>,
}

impl Default for TerminalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalHost {
    /// A host whose clock is the system's monotonic clock.
    pub fn new() -> Self {
        Self {
            clock: Clock::System(Instant::now()),
            cell_width: DEFAULT_CELL_WIDTH,
            live: Rc::new(Cell::new(0)),
        }
    }

    /// A host reading time from `clock`.
    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            clock: Clock::Manual(clock),
            ..Self::new()
        }
    }

    /// Changes how many pixels make up one terminal cell.
    pub fn with_cell_width(mut self, px: f64) -> Self {
        self.cell_width = px.max(1.0);
        self
    }

    /// Number of widgets built and not yet destroyed.
    pub fn live_widgets(&self) -> usize {
        self.live.get()
    }
}

impl Host for TerminalHost {
    type Window = Pane;
    type Widget = TerminalBar;

    fn create_widget(
        &mut self,
        template: &BarTemplate,
        parent: &Pane,
        id: &BarId,
    ) -> Result<TerminalBar> {
        let mut parts = HashMap::new();
        for part in Part::ALL {
            let element = template.element(part).ok_or(Error::MissingElement(part))?;
            parts.insert(
                part,
                PartState {
                    text: String::new(),
                    font: element.font.clone(),
                    text_color: element.text_color.clone(),
                    background: element.background.clone(),
                    sprite: element.sprite.clone(),
                    visible: element.visible,
                    offsets: element.offsets,
                },
            );
        }

        self.live.set(self.live.get() + 1);
        trace!(bar = %id, pane = parent.name(), "terminal widget created");
        Ok(TerminalBar {
            id: id.clone(),
            pane: parent.clone(),
            cell_width: self.cell_width,
            live: Rc::clone(&self.live),
            parts,
            max: 0.0,
            progress: 0.0,
            bar_color: template.bar_color.clone(),
            bar_sprite: template.bar_sprite.clone(),
        })
    }

    fn now(&self) -> Duration {
        match &self.clock {
            Clock::System(epoch) => epoch.elapsed(),
            Clock::Manual(clock) => clock.now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PartState {
    text: String,
    font: Option<String>,
    text_color: Option<String>,
    background: Option<String>,
    sprite: Option<String>,
    visible: bool,
    offsets: Offsets,
}

/// One bar's widget state, renderable with [`TerminalBar::view`].
#[derive(Debug)]
pub struct TerminalBar {
    id: BarId,
    pane: Pane,
    cell_width: f64,
    live: Rc<Cell<usize>>,
    parts: HashMap<Part, PartState>,
    max: f64,
    progress: f64,
    bar_color: String,
    bar_sprite: String,
}

impl TerminalBar {
    /// The bar this widget belongs to.
    pub fn id(&self) -> &BarId {
        &self.id
    }

    /// The pane the widget was created in.
    pub fn pane(&self) -> &Pane {
        &self.pane
    }

    /// Text of `part`.
    pub fn text(&self, part: Part) -> &str {
        self.parts.get(&part).map_or("", |p| p.text.as_str())
    }

    /// Font of `part`.
    pub fn font(&self, part: Part) -> Option<&str> {
        self.parts.get(&part).and_then(|p| p.font.as_deref())
    }

    /// Text color of `part`.
    pub fn text_color(&self, part: Part) -> Option<&str> {
        self.parts.get(&part).and_then(|p| p.text_color.as_deref())
    }

    /// Background color of `part`.
    pub fn background_color(&self, part: Part) -> Option<&str> {
        self.parts.get(&part).and_then(|p| p.background.as_deref())
    }

    /// Whether `part` is shown.
    pub fn is_visible(&self, part: Part) -> bool {
        self.parts.get(&part).map_or(false, |p| p.visible)
    }

    /// Progress indicator maximum.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Progress indicator value.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Progress indicator fill color.
    pub fn bar_color(&self) -> &str {
        &self.bar_color
    }

    /// Progress indicator fill sprite.
    pub fn bar_sprite(&self) -> &str {
        &self.bar_sprite
    }

    /// Renders the bar as one line: icon, label, progress cells and
    /// remaining time. Hidden frames render as an empty string.
    pub fn view(&self) -> String {
        if !self.is_visible(Part::Frame) {
            return String::new();
        }
        let frame_bg = self.background_color(Part::Frame);
        let mut segments = Vec::new();

        if let Some(icon) = self.parts.get(&Part::Icon) {
            if icon.visible && icon.offsets.width() > 0.0 {
                if let Some(sprite) = &icon.sprite {
                    segments.push(icon_glyph(sprite).to_string());
                }
            }
        }

        if let Some(label) = self.parts.get(&Part::Label) {
            if label.visible {
                let cells = self.cells(label.offsets.width());
                let style = text_style(label.text_color.as_deref(), frame_bg);
                segments.push(style.render(&fit(&label.text, cells)));
            }
        }

        if self.is_visible(Part::Progress) {
            segments.push(self.bar_view());
        }

        if let Some(time) = self.parts.get(&Part::Time) {
            if time.visible && !time.text.is_empty() {
                let style = text_style(time.text_color.as_deref(), frame_bg);
                segments.push(style.render(&time.text));
            }
        }

        segments.join(" ")
    }

    fn bar_view(&self) -> String {
        let total = self.parts.get(&Part::Progress).map_or(0, |p| self.cells(p.offsets.width()));
        let ratio = if self.max > 0.0 {
            (self.progress / self.max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let filled = ((total as f64) * ratio).round() as usize;
        let filled = filled.min(total);

        let full = Style::new()
            .foreground(Color::from(self.bar_color.as_str()))
            .render(&FULL.to_string());
        let empty_color = self
            .background_color(Part::Progress)
            .unwrap_or("#606060");
        let empty = Style::new()
            .foreground(Color::from(empty_color))
            .render(&EMPTY.to_string());

        let mut out = full.repeat(filled);
        out.push_str(&empty.repeat(total - filled));
        out
    }

    fn cells(&self, px: f64) -> usize {
        (px / self.cell_width).round().max(0.0) as usize
    }

    fn part_mut(&mut self, part: Part) -> &mut PartState {
        self.parts.entry(part).or_default()
    }
}

impl BarWidget for TerminalBar {
    fn set_text(&mut self, part: Part, text: &str) {
        self.part_mut(part).text = text.to_string();
    }

    fn set_font(&mut self, part: Part, font: &str) {
        self.part_mut(part).font = Some(font.to_string());
    }

    fn set_text_color(&mut self, part: Part, color: &str) {
        self.part_mut(part).text_color = Some(color.to_string());
    }

    fn set_background_color(&mut self, part: Part, color: &str) {
        self.part_mut(part).background = Some(color.to_string());
    }

    fn set_sprite(&mut self, part: Part, sprite: Option<&str>) {
        self.part_mut(part).sprite = sprite.map(str::to_string);
    }

    fn sprite(&self, part: Part) -> Option<&str> {
        self.parts.get(&part).and_then(|p| p.sprite.as_deref())
    }

    fn set_visible(&mut self, part: Part, visible: bool) {
        self.part_mut(part).visible = visible;
    }

    fn offsets(&self, part: Part) -> Offsets {
        self.parts.get(&part).map(|p| p.offsets).unwrap_or_default()
    }

    fn set_offsets(&mut self, part: Part, offsets: Offsets) {
        self.part_mut(part).offsets = offsets;
    }

    fn set_max(&mut self, max: f64) {
        self.max = max;
    }

    fn set_progress(&mut self, value: f64) {
        self.progress = value;
    }

    fn set_bar_color(&mut self, color: &str) {
        self.bar_color = color.to_string();
    }

    fn set_bar_sprite(&mut self, sprite: &str) {
        self.bar_sprite = sprite.to_string();
    }

    fn destroy(self) {
        self.live.set(self.live.get().saturating_sub(1));
        trace!(bar = %self.id, "terminal widget destroyed");
    }
}

/// Renders every bar of `bars`, one line each, in creation order.
pub fn view(bars: &BarManager<TerminalHost>) -> String {
    bars.bars()
        .map(|bar| bar.widget().view())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the bars created in `pane`.
pub fn view_pane(bars: &BarManager<TerminalHost>, pane: &Pane) -> String {
    bars.bars()
        .filter(|bar| bar.widget().pane() == pane)
        .map(|bar| bar.widget().view())
        .collect::<Vec<_>>()
        .join("\n")
}

fn text_style(color: Option<&str>, background: Option<&str>) -> Style {
    let mut style = Style::new();
    if let Some(color) = color {
        style = style.foreground(Color::from(color));
    }
    if let Some(background) = background {
        style = style.background(Color::from(background));
    }
    style
}

// Short sprites (emoji, single glyphs) are drawn as-is; sprite names are not.
fn icon_glyph(sprite: &str) -> &str {
    if !sprite.is_empty() && sprite.width() <= 2 {
        sprite
    } else {
        ICON_FALLBACK
    }
}

/// Pads or truncates `text` to exactly `cells` columns.
fn fit(text: &str, cells: usize) -> String {
    let width = text.width();
    if width <= cells {
        return format!("{}{}", text, " ".repeat(cells - width));
    }
    if cells == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > cells {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(cells - used));
    out
}
