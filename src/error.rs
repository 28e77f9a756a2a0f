//! Error type shared by the bar manager and its hosts.

use crate::template::Part;

/// Errors raised while building a bar's widget tree.
///
/// Everything else in the crate is infallible: unknown ids resolve to `None`
/// and setters clamp rather than reject.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bar template does not declare one of the sub-elements every bar
    /// relies on.
    #[error("bar template has no `{0}` element")]
    MissingElement(Part),

    /// The host could not build the widget tree.
    #[error("host failed to build bar widget: {0}")]
    Host(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
