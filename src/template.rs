//! Declarative description of a bar's widget tree.
//!
//! Every bar is built from a [`BarTemplate`]: a frame holding an icon, a
//! progress indicator, a name label and a remaining-time label. Hosts turn the
//! template into real widgets; the bar itself only ever talks to those widgets
//! through the [`Part`] names declared here.
//!
//! ```rust
//! use bubbletea_timerbars::template::{BarTemplate, Part, DEFAULT_TEMPLATE};
//!
//! let template = DEFAULT_TEMPLATE.clone();
//! assert!(template.validate().is_ok());
//! assert_eq!(template.element(Part::Time).map(|e| e.name.as_str()), Some("Time"));
//!
//! let mut broken = BarTemplate::default();
//! broken.elements.retain(|e| e.part != Part::Icon);
//! assert!(broken.validate().is_err());
//! ```

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::fmt;

/// Default frame width in pixels.
pub const DEFAULT_WIDTH: f64 = 250.0;
/// Default frame height in pixels.
pub const DEFAULT_HEIGHT: f64 = 25.0;
/// Width reserved for the remaining-time label, in pixels.
pub const DEFAULT_TIME_WIDTH: f64 = 40.0;
/// Horizontal padding between text labels and their neighbours, in pixels.
pub const DEFAULT_TEXT_PADDING: f64 = 4.0;

/// Named sub-elements of a bar's widget tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    /// The outer frame every other element is parented to.
    Frame,
    /// Square icon on the left edge; collapses when it has no image.
    Icon,
    /// The progress indicator filling the rest of the frame.
    Progress,
    /// Name label drawn over the progress indicator.
    Label,
    /// Remaining-time label on the right edge.
    Time,
}

impl Part {
    /// Every part a usable template must declare.
    pub const ALL: [Part; 5] = [Part::Frame, Part::Icon, Part::Progress, Part::Label, Part::Time];

    /// Lower-case name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Part::Frame => "frame",
            Part::Icon => "icon",
            Part::Progress => "progress",
            Part::Label => "label",
            Part::Time => "time",
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel rectangle of an element relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offsets {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Right edge.
    pub right: f64,
    /// Bottom edge.
    pub bottom: f64,
}

impl Offsets {
    /// Builds a rectangle from its four edges.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Horizontal extent, never negative.
    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    /// Vertical extent, never negative.
    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }
}

/// Initial state of one sub-element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementTemplate {
    /// Which part of the bar this element plays.
    pub part: Part,
    /// Host-facing element name.
    pub name: String,
    /// Initial geometry.
    pub offsets: Offsets,
    /// Font name, for text elements.
    pub font: Option<String>,
    /// Text color (hex or named).
    pub text_color: Option<String>,
    /// Background color (hex or named).
    pub background: Option<String>,
    /// Sprite shown by the element.
    pub sprite: Option<String>,
    /// Whether the element starts visible.
    pub visible: bool,
}

impl ElementTemplate {
    /// A visible element with no styling.
    pub fn new(part: Part, name: impl Into<String>, offsets: Offsets) -> Self {
        Self {
            part,
            name: name.into(),
            offsets,
            font: None,
            text_color: None,
            background: None,
            sprite: None,
            visible: true,
        }
    }

    /// Sets the font.
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    /// Sets the text color.
    pub fn with_text_color(mut self, color: impl Into<String>) -> Self {
        self.text_color = Some(color.into());
        self
    }

    /// Sets the background color.
    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background = Some(color.into());
        self
    }

    /// Sets the sprite.
    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = Some(sprite.into());
        self
    }
}

/// Full description of a bar's widget tree plus the layout constants the bar
/// needs when it re-flows its children.
#[derive(Debug, Clone, PartialEq)]
pub struct BarTemplate {
    /// Initial frame width in pixels.
    pub width: f64,
    /// Initial frame height in pixels.
    pub height: f64,
    /// Space reserved for the remaining-time label.
    pub time_width: f64,
    /// Padding around text labels.
    pub text_padding: f64,
    /// Fill color of the progress indicator.
    pub bar_color: String,
    /// Fill sprite of the progress indicator.
    pub bar_sprite: String,
    /// The sub-elements, in draw order.
    pub elements: Vec<ElementTemplate>,
}

/// The stock bar: dark frame, purple fill, white text.
pub static DEFAULT_TEMPLATE: Lazy<BarTemplate> = Lazy::new(|| {
    let w = DEFAULT_WIDTH;
    let h = DEFAULT_HEIGHT;
    BarTemplate {
        width: w,
        height: h,
        time_width: DEFAULT_TIME_WIDTH,
        text_padding: DEFAULT_TEXT_PADDING,
        bar_color: "#7571F9".to_string(),
        bar_sprite: "WhiteFill".to_string(),
        elements: vec![
            ElementTemplate::new(Part::Frame, "TimerBar", Offsets::new(0.0, 0.0, w, h))
                .with_background("#1E1E1E"),
            ElementTemplate::new(Part::Icon, "Icon", Offsets::new(0.0, 0.0, 0.0, h)),
            ElementTemplate::new(Part::Progress, "Progress", Offsets::new(0.0, 0.0, w, h))
                .with_background("#606060"),
            ElementTemplate::new(
                Part::Label,
                "Label",
                Offsets::new(
                    DEFAULT_TEXT_PADDING,
                    0.0,
                    w - DEFAULT_TIME_WIDTH - DEFAULT_TEXT_PADDING,
                    h,
                ),
            )
            .with_font("InterfaceMedium")
            .with_text_color("#FFFFFF"),
            ElementTemplate::new(
                Part::Time,
                "Time",
                Offsets::new(w - DEFAULT_TIME_WIDTH, 0.0, w - DEFAULT_TEXT_PADDING, h),
            )
            .with_font("InterfaceMedium")
            .with_text_color("#FFFFFF"),
        ],
    }
});

impl Default for BarTemplate {
    fn default() -> Self {
        DEFAULT_TEMPLATE.clone()
    }
}

impl BarTemplate {
    /// Looks up the element playing `part`.
    pub fn element(&self, part: Part) -> Option<&ElementTemplate> {
        self.elements.iter().find(|e| e.part == part)
    }

    /// Mutable lookup of the element playing `part`.
    pub fn element_mut(&mut self, part: Part) -> Option<&mut ElementTemplate> {
        self.elements.iter_mut().find(|e| e.part == part)
    }

    /// Checks that every [`Part`] is declared.
    pub fn validate(&self) -> Result<()> {
        match Part::ALL.iter().find(|p| self.element(**p).is_none()) {
            Some(part) => Err(Error::MissingElement(*part)),
            None => Ok(()),
        }
    }
}
