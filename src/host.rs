//! The windowing collaborator.
//!
//! The bar manager never draws anything itself. It asks a [`Host`] to build a
//! widget tree from a [`BarTemplate`](crate::template::BarTemplate) and then
//! drives the resulting [`BarWidget`] through the handful of operations a
//! timer bar needs: text, colors, sprites, visibility, geometry and the
//! progress indicator's value. The host also supplies the monotonic clock the
//! scheduler measures tick deltas against.
//!
//! [`crate::term::TerminalHost`] is a ready-made implementation that renders
//! bars as styled terminal lines.

use crate::bar::BarId;
use crate::error::Result;
use crate::template::{BarTemplate, Offsets, Part};
use std::time::Duration;

/// A live widget tree belonging to exactly one bar.
///
/// Every method addresses a sub-element by [`Part`]. The host guarantees at
/// construction time that all parts exist, so none of these calls can fail.
pub trait BarWidget {
    /// Sets the text shown by `part`.
    fn set_text(&mut self, part: Part, text: &str);

    /// Sets the font of `part`.
    fn set_font(&mut self, part: Part, font: &str);

    /// Sets the text color of `part`.
    fn set_text_color(&mut self, part: Part, color: &str);

    /// Sets the background color of `part`.
    fn set_background_color(&mut self, part: Part, color: &str);

    /// Sets or clears the sprite shown by `part`.
    fn set_sprite(&mut self, part: Part, sprite: Option<&str>);

    /// Sprite currently shown by `part`.
    fn sprite(&self, part: Part) -> Option<&str>;

    /// Shows or hides `part`.
    fn set_visible(&mut self, part: Part, visible: bool);

    /// Current geometry of `part`.
    fn offsets(&self, part: Part) -> Offsets;

    /// Moves and resizes `part`.
    fn set_offsets(&mut self, part: Part, offsets: Offsets);

    /// Sets the progress indicator's maximum value.
    fn set_max(&mut self, max: f64);

    /// Sets the progress indicator's current value.
    fn set_progress(&mut self, value: f64);

    /// Sets the progress indicator's fill color.
    fn set_bar_color(&mut self, color: &str);

    /// Sets the progress indicator's fill sprite.
    fn set_bar_sprite(&mut self, sprite: &str);

    /// Tears the widget tree down and releases its resources.
    fn destroy(self);
}

/// The host windowing system.
pub trait Host {
    /// Handle of a window bars can be parented to.
    type Window;

    /// Widget tree type produced for each bar.
    type Widget: BarWidget;

    /// Builds a widget tree from `template` under `parent`, tagged with `id`.
    ///
    /// Implementations must return
    /// [`Error::MissingElement`](crate::Error::MissingElement) when the
    /// template lacks a part, since every bar operation assumes all parts
    /// exist.
    fn create_widget(
        &mut self,
        template: &BarTemplate,
        parent: &Self::Window,
        id: &BarId,
    ) -> Result<Self::Widget>;

    /// Monotonic game time.
    fn now(&self) -> Duration;
}
