//! Error types shared by the window, scheduler, synchronizer and capture.

use thiserror::Error;

/// Result alias used across the crate
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Failure reported by a scene renderer implementation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A render target or pixel buffer could not be allocated
    #[error("out of memory: {0}")]
    OutOfMemory(String),
    #[error("{0}")]
    Failed(String),
}

/// Errors returned at the window call boundary.
///
/// None of these are fatal: the window stays usable after any of them.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("pane {pane} is out of range ({count} active pane(s))")]
    PaneOutOfRange { pane: usize, count: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("degenerate camera on pane {pane}: {reason}")]
    DegenerateCamera { pane: usize, reason: &'static str },

    #[error("pane {pane} has no render target")]
    MissingRenderTarget { pane: usize },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The request is well formed but not allowed in the current layout
    #[error("{0}")]
    PolicyViolation(String),

    #[error("render failed on pane {pane}: {source}")]
    Render {
        pane: usize,
        #[source]
        source: RenderError,
    },

    /// Propagation stopped part way; `updated` tied panes keep their new cameras
    #[error("propagation stopped after {updated} tied pane(s): {source}")]
    PartialPropagation {
        updated: usize,
        #[source]
        source: Box<ViewerError>,
    },
}

impl ViewerError {
    /// Map a renderer failure for `pane`, turning allocation failures into
    /// resource exhaustion.
    pub fn from_render(pane: usize, err: RenderError) -> Self {
        match err {
            RenderError::OutOfMemory(msg) => ViewerError::ResourceExhausted(msg),
            other => ViewerError::Render { pane, source: other },
        }
    }
}
