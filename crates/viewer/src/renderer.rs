//! Interface to the opaque scene renderer.
//!
//! The core never knows how a scene is drawn. It hands the renderer a fully
//! resolved [`RenderView`] and reads pixels back for captures.

use glam::DMat4;
use shared::{CameraParams, ProjectionMode, ViewVolume};

use crate::error::RenderError;

/// Everything a renderer needs to draw one pane
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    pub pane: usize,
    /// Target size in pixels
    pub width: u32,
    pub height: u32,
    pub projection_mode: ProjectionMode,
    /// Viewing volume after fitting to the target (see `ViewportMode`)
    pub volume: ViewVolume,
    pub camera: CameraParams,
    /// World -> camera, column-major
    pub modelview: DMat4,
    /// Camera -> clip including NDC placement, column-major
    pub projection: DMat4,
}

/// Per-call quality overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub antialias: u32,
    pub transparency_layers: u32,
    /// Clear color RGB
    pub background: [u8; 3],
    /// Render into the offscreen target rather than the pane's window buffer
    pub offscreen: bool,
}

/// Scene renderer collaborator
pub trait SceneRenderer {
    /// Draw the scene for `view` into the current target (back buffer or
    /// offscreen target)
    fn render(&mut self, view: &RenderView, options: &RenderOptions) -> Result<(), RenderError>;

    /// Present the back buffer of `pane`
    fn swap_buffers(&mut self, pane: usize);

    /// Read the lower-left `width` x `height` pixels of the last render as
    /// RGBA8, rows bottom to top
    fn read_pixels(&mut self, width: u32, height: u32) -> Result<Vec<u8>, RenderError>;

    fn create_offscreen_target(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    fn release_offscreen_target(&mut self);

    /// Largest offscreen target the platform supports
    fn max_offscreen_size(&self) -> (u32, u32);
}
