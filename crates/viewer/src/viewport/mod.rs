//! Viewport: one pane's camera, projection and render-target state

mod camera;
pub mod picking;

pub use camera::{projection_matrix, Camera, CameraFrame};

use glam::{DMat4, DVec3};
use shared::{CameraParams, NdcPlacement, ProjectionMode, ViewVolume, ViewportMode};

use crate::error::{ViewerError, ViewerResult};
use crate::renderer::{RenderOptions, RenderView};

/// Pixel size of the surface a viewport renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
}

/// View-plane to pixel mapping, used by `ViewportMode::Absolute`.
///
/// `left`/`top` are the view-plane coordinates of the target's top-left
/// corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapping {
    pub left: f64,
    pub top: f64,
    pub pixels_per_unit_x: f64,
    pub pixels_per_unit_y: f64,
}

impl Default for PixelMapping {
    fn default() -> Self {
        Self {
            left: -1.0,
            top: 1.0,
            pixels_per_unit_x: 100.0,
            pixels_per_unit_y: 100.0,
        }
    }
}

/// Inertial rotation state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TumbleState {
    pub active: bool,
    /// Unit rotation axis in world space
    pub axis: DVec3,
    /// Rotation per redraw (radians)
    pub angle: f64,
}

impl Default for TumbleState {
    fn default() -> Self {
        Self {
            active: false,
            axis: DVec3::Z,
            angle: 0.0,
        }
    }
}

/// Mouse interaction rates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionRates {
    /// Multiplier on the world-per-pixel pan distance
    pub translate: f64,
    /// Radians per target width of drag
    pub tumble: f64,
    /// Log zoom factor per target height of drag
    pub zoom: f64,
}

impl Default for InteractionRates {
    fn default() -> Self {
        Self {
            translate: 1.0,
            tumble: 1.5,
            zoom: 2.0,
        }
    }
}

/// The parts of a viewport a tiled capture overrides and must restore
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ViewState {
    volume: ViewVolume,
    ndc: NdcPlacement,
    viewport_mode: ViewportMode,
    pixel_mapping: PixelMapping,
    target: Option<RenderTarget>,
}

/// Camera + projection state of one pane
#[derive(Debug, Clone)]
pub struct Viewport {
    camera: Camera,
    volume: ViewVolume,
    projection: ProjectionMode,
    custom_projection: DMat4,
    ndc: NdcPlacement,
    viewport_mode: ViewportMode,
    pixel_mapping: PixelMapping,
    target: Option<RenderTarget>,
    awake: bool,
    tumble: TumbleState,
    rates: InteractionRates,
    antialias: u32,
    transparency_layers: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            camera: Camera::default(),
            volume: ViewVolume::default(),
            projection: ProjectionMode::Parallel,
            custom_projection: DMat4::IDENTITY,
            ndc: NdcPlacement::default(),
            viewport_mode: ViewportMode::default(),
            pixel_mapping: PixelMapping::default(),
            target: Some(RenderTarget { width, height }),
            awake: true,
            tumble: TumbleState::default(),
            rates: InteractionRates::default(),
            antialias: 0,
            transparency_layers: 0,
        }
    }

    /// Copy of this viewport suitable for a newly created pane: same camera
    /// and render settings, awake, no tumble.
    pub fn clone_for_new_pane(&self) -> Self {
        let mut vp = self.clone();
        vp.awake = true;
        vp.tumble = TumbleState::default();
        vp
    }

    // ── Camera ────────────────────────────────────────────────

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_params(&self) -> CameraParams {
        self.camera.into()
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Camera of a viewport that can currently be rendered
    pub fn read_camera(&self, pane: usize) -> ViewerResult<Camera> {
        self.target_or_err(pane)?;
        Ok(self.camera)
    }

    pub fn frame(&self, pane: usize) -> ViewerResult<CameraFrame> {
        self.camera
            .frame()
            .map_err(|reason| ViewerError::DegenerateCamera { pane, reason })
    }

    // ── Projection ────────────────────────────────────────────

    pub fn volume(&self) -> &ViewVolume {
        &self.volume
    }

    pub fn set_volume(&mut self, volume: ViewVolume) {
        self.volume = volume;
    }

    pub fn projection(&self) -> ProjectionMode {
        self.projection
    }

    pub fn set_projection(&mut self, projection: ProjectionMode) {
        self.projection = projection;
    }

    pub fn custom_projection(&self) -> &DMat4 {
        &self.custom_projection
    }

    pub fn set_custom_projection(&mut self, matrix: DMat4) {
        self.custom_projection = matrix;
    }

    pub fn ndc(&self) -> &NdcPlacement {
        &self.ndc
    }

    pub fn set_ndc(&mut self, ndc: NdcPlacement) {
        self.ndc = ndc;
    }

    pub fn viewport_mode(&self) -> ViewportMode {
        self.viewport_mode
    }

    pub fn set_viewport_mode(&mut self, mode: ViewportMode) {
        self.viewport_mode = mode;
    }

    pub fn pixel_mapping(&self) -> &PixelMapping {
        &self.pixel_mapping
    }

    pub fn set_pixel_mapping(&mut self, mapping: PixelMapping) {
        self.pixel_mapping = mapping;
    }

    // ── Render target / sleep ─────────────────────────────────

    pub fn render_target(&self) -> Option<RenderTarget> {
        self.target
    }

    pub fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.target = target;
    }

    fn target_or_err(&self, pane: usize) -> ViewerResult<RenderTarget> {
        self.target.ok_or(ViewerError::MissingRenderTarget { pane })
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn sleep(&mut self) {
        self.awake = false;
        self.tumble = TumbleState::default();
    }

    pub fn wake(&mut self) {
        self.awake = true;
    }

    // ── Tumble ────────────────────────────────────────────────

    pub fn tumble(&self) -> &TumbleState {
        &self.tumble
    }

    pub fn start_tumble(&mut self, axis: DVec3, angle: f64) {
        let axis = axis.normalize_or_zero();
        if axis == DVec3::ZERO || angle == 0.0 {
            return;
        }
        self.tumble = TumbleState {
            active: true,
            axis,
            angle,
        };
    }

    pub fn stop_tumble(&mut self) {
        self.tumble.active = false;
        self.tumble.angle = 0.0;
    }

    // ── Quality ───────────────────────────────────────────────

    pub fn rates(&self) -> &InteractionRates {
        &self.rates
    }

    pub fn set_rates(&mut self, rates: InteractionRates) {
        self.rates = rates;
    }

    pub fn set_quality(&mut self, antialias: u32, transparency_layers: u32) {
        self.antialias = antialias;
        self.transparency_layers = transparency_layers;
    }

    /// Options used for interactive (non-capture) renders
    pub fn interactive_options(&self) -> RenderOptions {
        RenderOptions {
            antialias: self.antialias,
            transparency_layers: self.transparency_layers,
            ..Default::default()
        }
    }

    // ── Derived matrices ──────────────────────────────────────

    /// Viewing volume actually shown in a `width` x `height` target
    pub fn effective_volume(&self, width: u32, height: u32) -> ViewVolume {
        let v = self.volume;
        if width == 0 || height == 0 {
            return v;
        }
        match self.viewport_mode {
            ViewportMode::DistortingRelative => v,
            ViewportMode::Relative => {
                let aspect = width as f64 / height as f64;
                let (cx, cy) = v.center();
                let (w, h) = (v.width(), v.height());
                let mut out = v;
                if w / h < aspect {
                    let half = 0.5 * h * aspect;
                    out.left = cx - half;
                    out.right = cx + half;
                } else {
                    let half = 0.5 * w / aspect;
                    out.bottom = cy - half;
                    out.top = cy + half;
                }
                out
            }
            ViewportMode::Absolute => {
                let m = &self.pixel_mapping;
                ViewVolume {
                    left: m.left,
                    right: m.left + width as f64 / m.pixels_per_unit_x,
                    bottom: m.top - height as f64 / m.pixels_per_unit_y,
                    top: m.top,
                    near: v.near,
                    far: v.far,
                }
            }
        }
    }

    pub fn modelview_matrix(&self, pane: usize) -> ViewerResult<DMat4> {
        self.camera
            .view_matrix()
            .map_err(|reason| ViewerError::DegenerateCamera { pane, reason })
    }

    pub fn projection_matrix(&self, width: u32, height: u32) -> DMat4 {
        projection_matrix(
            self.projection,
            &self.effective_volume(width, height),
            self.camera.eye_distance(),
            &self.ndc,
            &self.custom_projection,
        )
    }

    /// Resolve everything the renderer needs for this pane
    pub fn render_view(&self, pane: usize) -> ViewerResult<RenderView> {
        let target = self.target_or_err(pane)?;
        Ok(RenderView {
            pane,
            width: target.width,
            height: target.height,
            projection_mode: self.projection,
            volume: self.effective_volume(target.width, target.height),
            camera: self.camera_params(),
            modelview: self.modelview_matrix(pane)?,
            projection: self.projection_matrix(target.width, target.height),
        })
    }

    // ── Capture overrides ─────────────────────────────────────

    pub(crate) fn view_state(&self) -> ViewState {
        ViewState {
            volume: self.volume,
            ndc: self.ndc,
            viewport_mode: self.viewport_mode,
            pixel_mapping: self.pixel_mapping,
            target: self.target,
        }
    }

    pub(crate) fn restore_view_state(&mut self, state: ViewState) {
        self.volume = state.volume;
        self.ndc = state.ndc;
        self.viewport_mode = state.viewport_mode;
        self.pixel_mapping = state.pixel_mapping;
        self.target = state.target;
    }

    /// Render exactly `volume` into a `width` x `height` target
    pub(crate) fn override_for_tile(&mut self, volume: ViewVolume, width: u32, height: u32) {
        self.viewport_mode = ViewportMode::DistortingRelative;
        self.volume = volume;
        self.ndc = NdcPlacement::default();
        self.pixel_mapping = PixelMapping {
            left: volume.left,
            top: volume.top,
            pixels_per_unit_x: width as f64 / volume.width(),
            pixels_per_unit_y: height as f64 / volume.height(),
        };
        self.target = Some(RenderTarget { width, height });
    }

    // ── Mouse-driven camera steps ─────────────────────────────

    /// Orbit by a pointer drag of (`dx`, `dy`) pixels (y down). Returns the
    /// applied (axis, angle) so it can be continued as a tumble.
    pub fn tumble_by_drag(&mut self, pane: usize, dx: f64, dy: f64) -> ViewerResult<Option<(DVec3, f64)>> {
        let target = self.target_or_err(pane)?;
        let frame = self.frame(pane)?;
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            return Ok(None);
        }
        // screen right is -left, screen y grows downwards
        let drag = frame.left * -dx + frame.up * -dy;
        let axis = frame.view.cross(drag).normalize_or_zero();
        if axis == DVec3::ZERO {
            return Ok(None);
        }
        let angle = -self.rates.tumble * len / target.width.max(1) as f64;
        self.camera.rotate_about_lookat(axis, angle);
        Ok(Some((axis, angle)))
    }

    /// Pan so the scene follows the pointer
    pub fn translate_by_drag(&mut self, pane: usize, dx: f64, dy: f64) -> ViewerResult<()> {
        let target = self.target_or_err(pane)?;
        let frame = self.frame(pane)?;
        let volume = self.effective_volume(target.width, target.height);
        let per_px_x = volume.width() / target.width.max(1) as f64;
        let per_px_y = volume.height() / target.height.max(1) as f64;
        let right = -frame.left;
        let offset = right * (-dx * per_px_x) + frame.up * (dy * per_px_y);
        self.camera.translate(offset * self.rates.translate);
        Ok(())
    }

    /// Zoom by a vertical drag; dragging down zooms out. Returns the scale
    /// factor applied.
    pub fn zoom_by_drag(&mut self, pane: usize, dy: f64) -> ViewerResult<f64> {
        let target = self.target_or_err(pane)?;
        let factor = (self.rates.zoom * dy / target.height.max(1) as f64).exp();
        match self.projection {
            ProjectionMode::Perspective => self.camera.dolly(factor),
            ProjectionMode::Parallel | ProjectionMode::Custom => {
                let (cx, cy) = self.volume.center();
                let half_w = 0.5 * self.volume.width() * factor;
                let half_h = 0.5 * self.volume.height() * factor;
                self.volume.left = cx - half_w;
                self.volume.right = cx + half_w;
                self.volume.bottom = cy - half_h;
                self.volume.top = cy + half_h;
            }
        }
        Ok(factor)
    }
}
