//! Scene window: owns the panes of one layout and routes every camera
//! change through the synchronizer and the render scheduler.

use glam::{DMat4, DVec3};
use shared::{CameraParams, LayoutMode, NdcPlacement, PixelRect, ProjectionMode, ViewVolume, ViewportMode};

use crate::error::{ViewerError, ViewerResult};
use crate::input::{DragState, InteractiveMode};
use crate::layout;
use crate::renderer::{RenderOptions, SceneRenderer};
use crate::scheduler::{IdleHandle, IdleQueue, IdleScheduler, RedrawState, RenderScheduler};
use crate::settings::ViewerSettings;
use crate::sync;
use crate::viewport::picking::InteractionVolume;
use crate::viewport::{Camera, PixelMapping, RenderTarget, TumbleState, Viewport};

/// Callback fired whenever a pane's camera changes
pub type ViewListener = Box<dyn FnMut(usize, &CameraParams)>;

/// Unit vector for an orthographic axis code (1..6 = +X,+Y,+Z,-X,-Y,-Z)
pub fn axis_vector(code: u8) -> Option<DVec3> {
    match code {
        1 => Some(DVec3::X),
        2 => Some(DVec3::Y),
        3 => Some(DVec3::Z),
        4 => Some(DVec3::NEG_X),
        5 => Some(DVec3::NEG_Y),
        6 => Some(DVec3::NEG_Z),
        _ => None,
    }
}

/// Advance `front` to the next axis code while it is parallel to `up`
fn non_parallel_front(up: u8, front: u8) -> u8 {
    if up % 3 == front % 3 {
        front % 6 + 1
    } else {
        front
    }
}

pub struct Window<R: SceneRenderer, S: IdleScheduler> {
    name: String,
    pub(crate) viewports: Vec<Viewport>,
    pub(crate) layout_mode: LayoutMode,
    pub(crate) current_pane: usize,
    ortho_up_axis: u8,
    ortho_front_axis: u8,
    pub(crate) eye_spacing: f64,
    std_view_angle: f64,
    pub(crate) interactive_mode: InteractiveMode,
    pub(crate) settings: ViewerSettings,
    pub(crate) scheduler: RenderScheduler<R, S>,
    view_listeners: Vec<ViewListener>,
    pub(crate) drag: Option<DragState>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) pane_rects: Vec<PixelRect>,
}

impl<R: SceneRenderer, S: IdleScheduler> Window<R, S> {
    /// Create a window of `width` x `height` pixels and enter the layout
    /// named in `settings`.
    pub fn new(name: &str, width: u32, height: u32, renderer: R, idle: S, settings: &ViewerSettings) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut first = Viewport::new(width, height);
        first.set_rates(settings.interaction.rates());
        first.set_viewport_mode(settings.viewport.mode);

        let mut up = settings.layout.ortho_up_axis;
        let mut front = settings.layout.ortho_front_axis;
        if axis_vector(up).is_none() || axis_vector(front).is_none() {
            tracing::warn!(up, front, "invalid orthographic axes in settings, using +Z / -Y");
            up = 3;
            front = 5;
        }
        let front = non_parallel_front(up, front);

        let mut scheduler = RenderScheduler::new(renderer, idle);
        scheduler.ensure_panes(1);
        let mut window = Self {
            name: name.to_string(),
            viewports: vec![first],
            layout_mode: LayoutMode::Simple,
            current_pane: 0,
            ortho_up_axis: up,
            ortho_front_axis: front,
            eye_spacing: settings.layout.eye_spacing.max(0.0),
            std_view_angle: settings.layout.std_view_angle.clamp(1.0, 179.0),
            interactive_mode: InteractiveMode::Transform,
            settings: settings.clone(),
            scheduler,
            view_listeners: Vec::new(),
            drag: None,
            width,
            height,
            pane_rects: vec![PixelRect::new(0, 0, width, height)],
        };
        if let Err(e) = window.set_layout_mode(settings.layout.mode) {
            tracing::warn!(window = %window.name, "initial layout: {e}");
        }
        window
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    /// Tear down every pane and cancel all outstanding idle registrations
    pub fn destroy(mut self) {
        self.scheduler.cancel_all();
        self.viewports.clear();
        tracing::info!(window = %self.name, "window destroyed");
    }

    // ── Layout ────────────────────────────────────────────────

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout_mode
    }

    /// Panes shown by the current layout
    pub fn pane_count(&self) -> usize {
        layout::pane_count(self.layout_mode)
    }

    /// Panes ever created, including sleeping ones
    pub fn number_of_scene_viewers(&self) -> usize {
        self.viewports.len()
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) -> ViewerResult<()> {
        let count = layout::pane_count(mode);
        while self.viewports.len() < count {
            let vp = self.viewports[0].clone_for_new_pane();
            self.viewports.push(vp);
        }
        self.scheduler.ensure_panes(self.viewports.len());

        for pane in 0..self.viewports.len() {
            if pane < count {
                let vp = &mut self.viewports[pane];
                vp.wake();
                if !layout::is_projection_valid(mode, pane, vp.projection()) {
                    tracing::debug!(pane, from = ?vp.projection(), "projection not allowed, using parallel");
                    vp.set_projection(ProjectionMode::Parallel);
                }
            } else {
                self.viewports[pane].sleep();
                self.scheduler.cancel_pending(pane);
            }
        }

        self.layout_mode = mode;
        self.current_pane = 0;
        self.drag = None;
        self.layout_panes();
        tracing::info!(window = %self.name, mode = mode.name(), panes = count, "layout changed");

        let result = sync::propagate(self, layout::driving_pane(mode));
        self.request_redraw_all();
        result.map(|_| ())
    }

    /// Pane rectangles in window pixels (bottom-left origin)
    pub fn pane_rects(&self) -> &[PixelRect] {
        &self.pane_rects
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> ViewerResult<()> {
        if width == 0 || height == 0 {
            return Err(ViewerError::InvalidArgument(format!(
                "window size must be positive, got {width}x{height}"
            )));
        }
        self.width = width;
        self.height = height;
        self.layout_panes();
        self.request_redraw_all();
        Ok(())
    }

    /// Recompute pane rectangles and resize attached render targets
    fn layout_panes(&mut self) {
        let border = self.settings.capture.pane_border;
        let Some(rects) = layout::pane_rects(self.layout_mode, self.width, self.height, border) else {
            tracing::warn!(
                width = self.width,
                height = self.height,
                "window too small for layout, pane sizes unchanged"
            );
            return;
        };
        for (pane, rect) in rects.iter().enumerate() {
            let vp = &mut self.viewports[pane];
            if vp.render_target().is_some() {
                vp.set_render_target(Some(RenderTarget {
                    width: rect.width,
                    height: rect.height,
                }));
            }
        }
        self.pane_rects = rects;
    }

    pub fn attach_render_target(&mut self, pane: usize) -> ViewerResult<()> {
        self.check_pane(pane)?;
        let rect = self.pane_rects.get(pane).copied().unwrap_or_default();
        self.viewports[pane].set_render_target(Some(RenderTarget {
            width: rect.width.max(1),
            height: rect.height.max(1),
        }));
        self.request_redraw(pane)?;
        Ok(())
    }

    pub fn detach_render_target(&mut self, pane: usize) -> ViewerResult<()> {
        self.check_pane(pane)?;
        self.scheduler.cancel_pending(pane);
        self.viewports[pane].set_render_target(None);
        Ok(())
    }

    // ── Current pane / window settings ────────────────────────

    /// Current pane, 1-based
    pub fn current_pane_number(&self) -> usize {
        self.current_pane + 1
    }

    /// Select the current pane, 1-based
    pub fn set_current_pane_number(&mut self, number: usize) -> ViewerResult<()> {
        let count = self.pane_count();
        if number == 0 || number > count {
            return Err(ViewerError::InvalidArgument(format!(
                "pane number {number} outside 1..={count}"
            )));
        }
        self.current_pane = number - 1;
        Ok(())
    }

    pub fn orthographic_axes(&self) -> (u8, u8) {
        (self.ortho_up_axis, self.ortho_front_axis)
    }

    /// Set the orthographic up and front axes (1..6 = +X,+Y,+Z,-X,-Y,-Z).
    /// A front axis parallel to `up` is advanced to the next code.
    pub fn set_orthographic_axes(&mut self, up: u8, front: u8) -> ViewerResult<()> {
        if axis_vector(up).is_none() || axis_vector(front).is_none() {
            return Err(ViewerError::InvalidArgument(format!(
                "orthographic axes must be in 1..=6, got up {up} front {front}"
            )));
        }
        let front = non_parallel_front(up, front);
        self.ortho_up_axis = up;
        self.ortho_front_axis = front;
        Ok(())
    }

    pub fn eye_spacing(&self) -> f64 {
        self.eye_spacing
    }

    pub fn set_eye_spacing(&mut self, spacing: f64) -> ViewerResult<()> {
        if !spacing.is_finite() || spacing < 0.0 {
            return Err(ViewerError::InvalidArgument(format!(
                "eye spacing must be finite and non-negative, got {spacing}"
            )));
        }
        self.eye_spacing = spacing;
        if self.layout_mode == LayoutMode::Pseudo3D {
            self.propagate(self.current_pane)?;
        }
        Ok(())
    }

    pub fn std_view_angle(&self) -> f64 {
        self.std_view_angle
    }

    pub fn set_std_view_angle(&mut self, degrees: f64) -> ViewerResult<()> {
        if !(1.0..=179.0).contains(&degrees) {
            return Err(ViewerError::InvalidArgument(format!(
                "standard view angle must be within 1..=179 degrees, got {degrees}"
            )));
        }
        self.std_view_angle = degrees;
        Ok(())
    }

    pub fn interactive_mode(&self) -> InteractiveMode {
        self.interactive_mode
    }

    pub fn set_interactive_mode(&mut self, mode: InteractiveMode) {
        self.interactive_mode = mode;
        self.drag = None;
    }

    pub fn set_automatic_tumble(&mut self, enabled: bool) {
        self.settings.interaction.automatic_tumble = enabled;
    }

    // ── Listeners ─────────────────────────────────────────────

    pub fn add_view_listener(&mut self, listener: ViewListener) {
        self.view_listeners.push(listener);
    }

    pub(crate) fn notify_view_changed(&mut self, pane: usize) {
        let params = self.viewports[pane].camera_params();
        for listener in &mut self.view_listeners {
            listener(pane, &params);
        }
    }

    // ── Pane access ───────────────────────────────────────────

    pub(crate) fn check_pane(&self, pane: usize) -> ViewerResult<()> {
        let count = self.pane_count();
        if pane >= count {
            return Err(ViewerError::PaneOutOfRange { pane, count });
        }
        Ok(())
    }

    /// Any pane ever created, awake or not
    pub fn viewport(&self, pane: usize) -> Option<&Viewport> {
        self.viewports.get(pane)
    }

    pub fn camera(&self, pane: usize) -> ViewerResult<CameraParams> {
        self.check_pane(pane)?;
        Ok(self.viewports[pane].camera_params())
    }

    pub fn renderer(&self) -> &R {
        self.scheduler.renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        self.scheduler.renderer_mut()
    }

    pub fn idle_scheduler(&self) -> &S {
        self.scheduler.idle()
    }

    pub fn idle_scheduler_mut(&mut self) -> &mut S {
        self.scheduler.idle_mut()
    }

    // ── Camera commands ───────────────────────────────────────

    /// Notify listeners, update tied panes and queue a redraw after the
    /// camera of `pane` changed
    pub(crate) fn camera_changed(&mut self, pane: usize) -> ViewerResult<()> {
        self.notify_view_changed(pane);
        let result = sync::propagate(self, pane);
        self.scheduler.request_redraw(pane);
        result.map(|_| ())
    }

    pub fn set_camera(&mut self, pane: usize, params: CameraParams) -> ViewerResult<()> {
        self.check_pane(pane)?;
        let finite = params
            .eye
            .iter()
            .chain(&params.lookat)
            .chain(&params.up)
            .all(|v| v.is_finite());
        if !finite {
            return Err(ViewerError::InvalidArgument(format!(
                "camera for pane {pane} has non-finite components"
            )));
        }
        let camera = Camera::from(params);
        camera
            .check_up()
            .map_err(|reason| ViewerError::DegenerateCamera { pane, reason })?;
        if camera.is_skew() {
            tracing::debug!(pane, "camera up vector is skew");
        }
        self.viewports[pane].set_camera(camera);
        self.camera_changed(pane)
    }

    pub fn set_view_volume(&mut self, pane: usize, volume: ViewVolume) -> ViewerResult<()> {
        self.check_pane(pane)?;
        let finite = [volume.left, volume.right, volume.bottom, volume.top, volume.near, volume.far]
            .iter()
            .all(|v| v.is_finite());
        if !finite || !volume.is_valid() {
            return Err(ViewerError::InvalidArgument(format!(
                "invalid view volume for pane {pane}: {volume:?}"
            )));
        }
        self.viewports[pane].set_volume(volume);
        self.camera_changed(pane)
    }

    pub fn set_projection_mode(&mut self, pane: usize, projection: ProjectionMode) -> ViewerResult<()> {
        self.check_pane(pane)?;
        if !layout::is_projection_valid(self.layout_mode, pane, projection) {
            let msg = format!(
                "{projection:?} projection is not allowed on pane {pane} in the {} layout",
                self.layout_mode.name()
            );
            tracing::warn!("{msg}");
            return Err(ViewerError::PolicyViolation(msg));
        }
        self.viewports[pane].set_projection(projection);
        self.request_redraw(pane)?;
        Ok(())
    }

    /// Column-major matrix used by `ProjectionMode::Custom`
    pub fn set_custom_projection(&mut self, pane: usize, matrix: DMat4) -> ViewerResult<()> {
        self.check_pane(pane)?;
        if !matrix.is_finite() {
            return Err(ViewerError::InvalidArgument(
                "custom projection has non-finite entries".into(),
            ));
        }
        self.viewports[pane].set_custom_projection(matrix);
        self.request_redraw(pane)?;
        Ok(())
    }

    pub fn set_viewport_mode(&mut self, pane: usize, mode: ViewportMode) -> ViewerResult<()> {
        self.check_pane(pane)?;
        self.viewports[pane].set_viewport_mode(mode);
        self.request_redraw(pane)?;
        Ok(())
    }

    pub fn set_pixel_mapping(&mut self, pane: usize, mapping: PixelMapping) -> ViewerResult<()> {
        self.check_pane(pane)?;
        if !(mapping.pixels_per_unit_x > 0.0 && mapping.pixels_per_unit_y > 0.0) {
            return Err(ViewerError::InvalidArgument(
                "pixels per unit must be positive".into(),
            ));
        }
        self.viewports[pane].set_pixel_mapping(mapping);
        self.request_redraw(pane)?;
        Ok(())
    }

    pub fn set_ndc_placement(&mut self, pane: usize, ndc: NdcPlacement) -> ViewerResult<()> {
        self.check_pane(pane)?;
        if !(ndc.width > 0.0 && ndc.height > 0.0) {
            return Err(ViewerError::InvalidArgument(
                "NDC placement must have a positive size".into(),
            ));
        }
        self.viewports[pane].set_ndc(ndc);
        self.request_redraw(pane)?;
        Ok(())
    }

    pub fn background_color(&self) -> [u8; 3] {
        self.settings.viewport.background_color
    }

    pub fn set_background_color(&mut self, rgb: [u8; 3]) {
        self.settings.viewport.background_color = rgb;
        self.request_redraw_all();
    }

    pub fn set_quality(&mut self, pane: usize, antialias: u32, transparency_layers: u32) -> ViewerResult<()> {
        self.check_pane(pane)?;
        self.viewports[pane].set_quality(antialias, transparency_layers);
        self.request_redraw(pane)?;
        Ok(())
    }

    /// Frame a sphere in the current pane, keeping the view direction.
    /// The eye distance fits the sphere into the standard view angle.
    pub fn view_sphere(&mut self, center: [f64; 3], radius: f64) -> ViewerResult<()> {
        if !(radius.is_finite() && radius > 0.0) || !center.iter().all(|v| v.is_finite()) {
            return Err(ViewerError::InvalidArgument(format!(
                "cannot frame sphere of radius {radius}"
            )));
        }
        let pane = self.current_pane;
        let vp = &mut self.viewports[pane];
        let (view, up) = match vp.camera().frame() {
            Ok(frame) => (frame.view, frame.up),
            Err(_) => (DVec3::Z, DVec3::Y),
        };
        let half = 0.5 * self.std_view_angle.to_radians();
        let distance = radius / half.sin();
        let center = DVec3::from(center);
        vp.set_camera(Camera::new(center + view * distance, center, up));

        let extent = match vp.projection() {
            ProjectionMode::Perspective => distance * half.tan(),
            ProjectionMode::Parallel | ProjectionMode::Custom => radius,
        };
        vp.set_volume(ViewVolume {
            left: -extent,
            right: extent,
            bottom: -extent,
            top: extent,
            near: (distance - radius).max(1e-3 * distance),
            far: distance + radius,
        });
        tracing::debug!(pane, radius, distance, "framed sphere");
        self.camera_changed(pane)
    }

    /// Point the driving pane along the orthographic front axis with the
    /// orthographic up axis. In the orthographic layouts pane 0 gets the
    /// matching isometric view.
    pub fn set_standard_orthographic_view(&mut self) -> ViewerResult<()> {
        let (Some(up), Some(front)) = (axis_vector(self.ortho_up_axis), axis_vector(self.ortho_front_axis)) else {
            return Err(ViewerError::InvalidArgument("orthographic axes unset".into()));
        };
        let ortho = matches!(self.layout_mode, LayoutMode::Orthographic | LayoutMode::FreeOrtho);
        let pane = if ortho { 1 } else { self.current_pane };

        let camera = *self.viewports[pane].camera();
        let distance = match camera.eye_distance() {
            d if d > 0.0 && d.is_finite() => d,
            _ => 10.0,
        };
        self.viewports[pane].set_camera(Camera::new(camera.lookat + front * distance, camera.lookat, up));

        if ortho {
            // screen right of the front view is up x front
            let iso = (front + up.cross(front) + up).normalize();
            self.viewports[0].set_camera(Camera::new(camera.lookat + iso * distance, camera.lookat, up));
            self.notify_view_changed(0);
            self.scheduler.request_redraw(0);
        }
        tracing::debug!(pane, up = self.ortho_up_axis, front = self.ortho_front_axis, "standard view");
        self.camera_changed(pane)
    }

    // ── Redraw ────────────────────────────────────────────────

    /// Recompute every pane tied to `pane` from its camera
    pub fn propagate(&mut self, pane: usize) -> ViewerResult<usize> {
        sync::propagate(self, pane)
    }

    /// Queue an idle-time redraw. Returns false if coalesced or the pane is
    /// asleep.
    pub fn request_redraw(&mut self, pane: usize) -> ViewerResult<bool> {
        self.check_pane(pane)?;
        if !self.viewports[pane].is_awake() {
            return Ok(false);
        }
        Ok(self.scheduler.request_redraw(pane))
    }

    pub fn request_redraw_all(&mut self) {
        for pane in 0..self.pane_count() {
            if self.viewports[pane].is_awake() {
                self.scheduler.request_redraw(pane);
            }
        }
    }

    pub fn redraw_now(&mut self, pane: usize) -> ViewerResult<()> {
        self.redraw(pane, true)
    }

    /// Render without presenting, for callers reading the back buffer
    pub fn redraw_now_without_swap(&mut self, pane: usize) -> ViewerResult<()> {
        self.redraw(pane, false)
    }

    /// Redraw every visible pane, returning the first failure
    pub fn redraw_all_now(&mut self) -> ViewerResult<()> {
        let mut first_err = None;
        for pane in 0..self.pane_count() {
            if let Err(e) = self.redraw(pane, true) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn redraw(&mut self, pane: usize, swap: bool) -> ViewerResult<()> {
        self.check_pane(pane)?;
        let tumble = *self.viewports[pane].tumble();
        if !tumble.active {
            self.viewports[pane].stop_tumble();
            return self.render_pane(pane, swap);
        }

        match self.advance_tumble(pane, &tumble, swap) {
            Ok(()) => {
                self.scheduler.request_redraw(pane);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(pane, "tumble stopped: {e}");
                self.viewports[pane].stop_tumble();
                Err(e)
            }
        }
    }

    /// Rotate one tumble step and render. The camera only moves when the
    /// pane can be drawn.
    fn advance_tumble(&mut self, pane: usize, tumble: &TumbleState, swap: bool) -> ViewerResult<()> {
        self.viewports[pane].render_view(pane)?;
        let mut camera = *self.viewports[pane].camera();
        camera.rotate_about_lookat(tumble.axis, tumble.angle);
        self.viewports[pane].set_camera(camera);
        self.notify_view_changed(pane);
        if let Err(e) = sync::propagate(self, pane) {
            tracing::warn!(pane, "tumble propagation: {e}");
        }
        self.render_pane(pane, swap)
    }

    fn render_pane(&mut self, pane: usize, swap: bool) -> ViewerResult<()> {
        let vp = &self.viewports[pane];
        let options = RenderOptions {
            background: self.settings.viewport.background_color,
            ..vp.interactive_options()
        };
        self.scheduler.render(pane, vp, &options, swap)
    }

    /// Service a fired idle registration
    pub fn on_idle(&mut self, handle: IdleHandle) -> ViewerResult<()> {
        let Some(pane) = self.scheduler.take_fired(handle) else {
            tracing::trace!(?handle, "stale idle handle ignored");
            return Ok(());
        };
        if pane >= self.pane_count() || !self.viewports[pane].is_awake() {
            return Ok(());
        }
        self.redraw(pane, true)
    }

    pub fn redraw_state(&self, pane: usize) -> RedrawState {
        self.scheduler.state(pane)
    }

    // ── Tumble ────────────────────────────────────────────────

    pub fn start_tumble(&mut self, pane: usize, axis: [f64; 3], angle: f64) -> ViewerResult<()> {
        self.check_pane(pane)?;
        if !angle.is_finite() || !axis.iter().all(|v| v.is_finite()) {
            return Err(ViewerError::InvalidArgument("tumble axis and angle must be finite".into()));
        }
        self.viewports[pane].start_tumble(DVec3::from(axis), angle);
        self.request_redraw(pane)?;
        Ok(())
    }

    pub fn stop_tumble(&mut self, pane: usize) -> ViewerResult<()> {
        self.check_pane(pane)?;
        self.viewports[pane].stop_tumble();
        Ok(())
    }

    pub fn tumble_state(&self, pane: usize) -> Option<TumbleState> {
        self.viewports.get(pane).map(|vp| *vp.tumble())
    }

    // ── Picking ───────────────────────────────────────────────

    /// Interaction volume for a pointer at (`x`, `y`) pixels from the
    /// top-left corner of `pane`
    pub fn interaction_volume(&self, pane: usize, x: f64, y: f64) -> ViewerResult<InteractionVolume> {
        self.check_pane(pane)?;
        let view = self.viewports[pane].render_view(pane)?;
        let rect = self.pane_rects.get(pane).copied().unwrap_or_default();
        // glam matrices are column-major, the builder takes rows
        let modelview = view.modelview.transpose().to_cols_array();
        let projection = view.projection.transpose().to_cols_array();
        let tolerance = self.settings.interaction.pick_tolerance;
        InteractionVolume::build(
            &modelview,
            &projection,
            PixelRect::new(rect.left, rect.bottom, view.width, view.height),
            (x, y),
            (tolerance, tolerance),
        )
    }
}

impl<R: SceneRenderer> Window<R, IdleQueue> {
    /// Run one idle slot of the in-memory queue. Returns the number of
    /// registrations that fired.
    pub fn run_idle_slot(&mut self) -> usize {
        let due = self.scheduler.idle_mut().take_due();
        for handle in &due {
            if let Err(e) = self.on_idle(*handle) {
                tracing::warn!(?handle, "idle redraw failed: {e}");
            }
        }
        due.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::PatternRenderer;

    fn window(mode: LayoutMode) -> Window<PatternRenderer, IdleQueue> {
        let mut settings = ViewerSettings::default();
        settings.layout.mode = mode;
        Window::new("test", 200, 100, PatternRenderer::new(), IdleQueue::new(), &settings)
    }

    #[test]
    fn test_coalesced_requests_render_once() {
        let mut w = window(LayoutMode::Simple);
        w.run_idle_slot();
        let before = w.renderer().render_count();
        for _ in 0..5 {
            w.request_redraw(0).unwrap();
        }
        assert_eq!(w.run_idle_slot(), 1);
        assert_eq!(w.renderer().render_count(), before + 1);
        assert_eq!(w.redraw_state(0), RedrawState::Idle);
    }

    #[test]
    fn test_redraw_without_tumble_keeps_camera() {
        let mut w = window(LayoutMode::Simple);
        let before = w.camera(0).unwrap();
        for _ in 0..10 {
            w.redraw_now(0).unwrap();
        }
        assert_eq!(w.camera(0).unwrap(), before);
        assert_eq!(w.tumble_state(0).unwrap().angle, 0.0);
    }

    #[test]
    fn test_tumble_rearms_until_stopped() {
        let mut w = window(LayoutMode::Simple);
        w.run_idle_slot();
        w.start_tumble(0, [0.0, 1.0, 0.0], 0.1).unwrap();
        let start = w.camera(0).unwrap();
        for _ in 0..3 {
            assert_eq!(w.run_idle_slot(), 1);
        }
        let moved = w.camera(0).unwrap();
        assert_ne!(moved, start);
        let eye = DVec3::from(moved.eye);
        assert!((eye.length() - 10.0).abs() < 1e-9);
        assert!((eye.x - 10.0 * (0.3f64).sin()).abs() < 1e-9);

        w.stop_tumble(0).unwrap();
        w.run_idle_slot();
        assert_eq!(w.run_idle_slot(), 0);
        assert_eq!(w.camera(0).unwrap(), moved);
    }

    #[test]
    fn test_failed_tumble_render_stops_spin() {
        let mut w = window(LayoutMode::Simple);
        w.run_idle_slot();
        w.start_tumble(0, [0.0, 1.0, 0.0], 0.1).unwrap();
        w.renderer_mut().fail_renders(true);
        assert_eq!(w.run_idle_slot(), 1);
        assert!(!w.tumble_state(0).unwrap().active);
        assert!(w.idle_scheduler().is_empty());

        w.renderer_mut().fail_renders(false);
        let camera = w.camera(0).unwrap();
        w.redraw_now(0).unwrap();
        assert_eq!(w.camera(0).unwrap(), camera);
    }

    #[test]
    fn test_tumble_without_target_keeps_camera() {
        let mut w = window(LayoutMode::Simple);
        w.start_tumble(0, [0.0, 1.0, 0.0], 0.1).unwrap();
        w.detach_render_target(0).unwrap();
        let before = w.camera(0).unwrap();
        assert!(matches!(
            w.redraw_now(0),
            Err(ViewerError::MissingRenderTarget { pane: 0 })
        ));
        assert_eq!(w.camera(0).unwrap(), before);
        assert!(!w.tumble_state(0).unwrap().active);
    }

    #[test]
    fn test_redraw_all_continues_past_failure() {
        let mut w = window(LayoutMode::TwoFree);
        w.detach_render_target(0).unwrap();
        let before = w.renderer().render_count();
        assert!(matches!(
            w.redraw_all_now(),
            Err(ViewerError::MissingRenderTarget { pane: 0 })
        ));
        assert_eq!(w.renderer().render_count(), before + 1);
    }

    #[test]
    fn test_degenerate_camera_leaves_pane_unchanged() {
        let mut w = window(LayoutMode::Simple);
        let before = w.camera(0).unwrap();
        let err = w
            .set_camera(
                0,
                CameraParams {
                    eye: [0.0, 5.0, 0.0],
                    lookat: [0.0; 3],
                    up: [0.0, 1.0, 0.0],
                },
            )
            .unwrap_err();
        assert!(matches!(err, ViewerError::DegenerateCamera { pane: 0, .. }));
        assert_eq!(w.camera(0).unwrap(), before);
        w.redraw_now(0).unwrap();
    }

    #[test]
    fn test_background_color_reaches_renderer() {
        let mut w = window(LayoutMode::Simple);
        w.redraw_now(0).unwrap();
        assert_eq!(w.renderer().last_options().unwrap().background, [30, 30, 35]);
        w.set_background_color([200, 10, 0]);
        w.redraw_now(0).unwrap();
        assert_eq!(w.renderer().last_options().unwrap().background, [200, 10, 0]);
    }

    #[test]
    fn test_layout_grows_and_sleeps_panes() {
        let mut w = window(LayoutMode::Simple);
        w.set_layout_mode(LayoutMode::Orthographic).unwrap();
        assert_eq!(w.number_of_scene_viewers(), 4);
        assert_eq!(w.pane_count(), 4);
        w.set_current_pane_number(3).unwrap();

        w.set_layout_mode(LayoutMode::FrontBack).unwrap();
        assert_eq!(w.number_of_scene_viewers(), 4);
        assert_eq!(w.current_pane_number(), 1);
        assert!(w.viewport(1).unwrap().is_awake());
        assert!(!w.viewport(2).unwrap().is_awake());
        assert!(!w.viewport(3).unwrap().is_awake());
        assert_eq!(w.idle_scheduler().pending_for(2), 0);
        assert_eq!(w.idle_scheduler().pending_for(3), 0);
        assert!(matches!(w.request_redraw(2), Err(ViewerError::PaneOutOfRange { pane: 2, count: 2 })));
    }

    #[test]
    fn test_layout_coerces_invalid_projection() {
        let mut w = window(LayoutMode::Simple);
        w.set_projection_mode(0, ProjectionMode::Custom).unwrap();
        w.set_layout_mode(LayoutMode::TwoD).unwrap();
        assert_eq!(w.viewport(0).unwrap().projection(), ProjectionMode::Parallel);
        assert!(matches!(
            w.set_projection_mode(0, ProjectionMode::Perspective),
            Err(ViewerError::PolicyViolation(_))
        ));
    }

    #[test]
    fn test_orthographic_axes_never_parallel() {
        let mut w = window(LayoutMode::Simple);
        for up in 1..=6u8 {
            for front in 1..=6u8 {
                w.set_orthographic_axes(up, front).unwrap();
                let (u, f) = w.orthographic_axes();
                assert_eq!(u, up);
                assert_ne!(u % 3, f % 3);
                if up % 3 == front % 3 {
                    assert_eq!(f, front % 6 + 1);
                } else {
                    assert_eq!(f, front);
                }
            }
        }
        assert!(w.set_orthographic_axes(0, 2).is_err());
        assert!(w.set_orthographic_axes(2, 7).is_err());
    }

    #[test]
    fn test_pane_numbers_are_one_based() {
        let mut w = window(LayoutMode::TwoFree);
        assert_eq!(w.current_pane_number(), 1);
        w.set_current_pane_number(2).unwrap();
        assert_eq!(w.current_pane_number(), 2);
        assert!(w.set_current_pane_number(0).is_err());
        assert!(w.set_current_pane_number(3).is_err());
    }

    #[test]
    fn test_std_view_angle_and_eye_spacing_bounds() {
        let mut w = window(LayoutMode::Simple);
        assert!(w.set_std_view_angle(0.5).is_err());
        assert!(w.set_std_view_angle(180.0).is_err());
        w.set_std_view_angle(90.0).unwrap();
        assert!(w.set_eye_spacing(-1.0).is_err());
        assert!(w.set_eye_spacing(f64::NAN).is_err());
        w.set_eye_spacing(0.0).unwrap();
    }

    #[test]
    fn test_view_sphere_fits_radius() {
        let mut w = window(LayoutMode::Simple);
        w.set_std_view_angle(60.0).unwrap();
        w.view_sphere([1.0, 2.0, 3.0], 2.0).unwrap();
        let cam = w.camera(0).unwrap();
        assert_eq!(cam.lookat, [1.0, 2.0, 3.0]);
        // sin(30 deg) = 0.5
        assert!((DVec3::from(cam.eye) - DVec3::new(1.0, 2.0, 7.0)).length() < 1e-9);
        assert!(w.view_sphere([0.0; 3], 0.0).is_err());
    }

    #[test]
    fn test_listeners_see_camera_changes() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut w = window(LayoutMode::FrontBack);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        w.add_view_listener(Box::new(move |pane, _params| sink.borrow_mut().push(pane)));
        let mut cam = w.camera(0).unwrap();
        cam.eye = [3.0, 0.0, 4.0];
        w.set_camera(0, cam).unwrap();
        assert_eq!(*seen.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_resize_updates_pane_targets() {
        let mut w = window(LayoutMode::FrontSide);
        assert_eq!(
            w.viewport(0).unwrap().render_target(),
            Some(RenderTarget { width: 99, height: 100 })
        );
        w.resize(302, 50).unwrap();
        assert_eq!(
            w.viewport(1).unwrap().render_target(),
            Some(RenderTarget { width: 150, height: 50 })
        );
        assert!(w.resize(0, 10).is_err());
    }

    #[test]
    fn test_detached_pane_cannot_render() {
        let mut w = window(LayoutMode::Simple);
        w.detach_render_target(0).unwrap();
        assert!(matches!(
            w.redraw_now(0),
            Err(ViewerError::MissingRenderTarget { pane: 0 })
        ));
        w.attach_render_target(0).unwrap();
        w.redraw_now(0).unwrap();
    }

    struct CountingIdle {
        inner: IdleQueue,
        cancelled: std::rc::Rc<std::cell::Cell<u64>>,
    }

    impl IdleScheduler for CountingIdle {
        fn register_idle_once(&mut self, pane: usize) -> IdleHandle {
            self.inner.register_idle_once(pane)
        }

        fn cancel_idle(&mut self, handle: IdleHandle) {
            self.cancelled.set(self.cancelled.get() + 1);
            self.inner.cancel_idle(handle);
        }
    }

    #[test]
    fn test_destroy_cancels_idle_registrations() {
        let cancelled = std::rc::Rc::new(std::cell::Cell::new(0));
        let idle = CountingIdle {
            inner: IdleQueue::new(),
            cancelled: cancelled.clone(),
        };
        let mut settings = ViewerSettings::default();
        settings.layout.mode = LayoutMode::FrontBack;
        let w = Window::new("test", 200, 100, PatternRenderer::new(), idle, &settings);
        assert_eq!(w.idle_scheduler().inner.len(), 2);
        let before = cancelled.get();
        w.destroy();
        assert_eq!(cancelled.get(), before + 2);
    }
}
