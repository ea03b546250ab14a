//! Headless harness: a deterministic renderer and an idle-queue driven window.
//!
//! `PatternRenderer` paints a checker pattern whose colour depends only on
//! the view-plane position of each pixel centre, so a capture rendered in
//! one tile and the same capture rendered in many tiles agree pixel for
//! pixel.

use shared::LayoutMode;

use crate::error::RenderError;
use crate::input::{InputEvent, InteractiveTool};
use crate::renderer::{RenderOptions, RenderView, SceneRenderer};
use crate::scheduler::IdleQueue;
use crate::settings::ViewerSettings;
use crate::window::Window;

/// Side of one checker cell in view-plane units
const CELL: f64 = 0.07;

/// Colour of the view-plane point (`x`, `y`)
pub fn pattern_color(x: f64, y: f64) -> [u8; 4] {
    let cx = (x / CELL).floor() as i64;
    let cy = (y / CELL).floor() as i64;
    [
        (cx.rem_euclid(16) * 16) as u8,
        (cy.rem_euclid(16) * 16) as u8,
        ((cx + cy).rem_euclid(2) * 255) as u8,
        255,
    ]
}

/// Scene renderer that draws a checker pattern into memory
#[derive(Debug)]
pub struct PatternRenderer {
    /// Last rendered frame, RGBA rows bottom to top
    frame: Vec<u8>,
    frame_size: (u32, u32),
    offscreen: Option<(u32, u32)>,
    max_offscreen: (u32, u32),
    last_view: Option<RenderView>,
    last_options: Option<RenderOptions>,
    renders: u64,
    offscreen_renders: u64,
    swaps: u64,
    readbacks: u64,
    fail_renders: bool,
    fail_offscreen: bool,
}

impl Default for PatternRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRenderer {
    pub fn new() -> Self {
        Self {
            frame: Vec::new(),
            frame_size: (0, 0),
            offscreen: None,
            max_offscreen: (4096, 4096),
            last_view: None,
            last_options: None,
            renders: 0,
            offscreen_renders: 0,
            swaps: 0,
            readbacks: 0,
            fail_renders: false,
            fail_offscreen: false,
        }
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn offscreen_render_count(&self) -> u64 {
        self.offscreen_renders
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn readback_count(&self) -> u64 {
        self.readbacks
    }

    pub fn last_view(&self) -> Option<&RenderView> {
        self.last_view.as_ref()
    }

    pub fn last_options(&self) -> Option<&RenderOptions> {
        self.last_options.as_ref()
    }

    pub fn has_offscreen_target(&self) -> bool {
        self.offscreen.is_some()
    }

    /// Make every render call fail
    pub fn fail_renders(&mut self, fail: bool) {
        self.fail_renders = fail;
    }

    /// Make offscreen target creation fail with out-of-memory
    pub fn fail_offscreen(&mut self, fail: bool) {
        self.fail_offscreen = fail;
    }

    pub fn set_max_offscreen_size(&mut self, width: u32, height: u32) {
        self.max_offscreen = (width, height);
    }

    fn paint(&mut self, view: &RenderView) {
        let (w, h) = (view.width, view.height);
        let v = &view.volume;
        let dx = v.width() / w as f64;
        let dy = v.height() / h as f64;
        self.frame.clear();
        self.frame.reserve(w as usize * h as usize * 4);
        for py in 0..h {
            let y = v.bottom + dy * (py as f64 + 0.5);
            for px in 0..w {
                let x = v.left + dx * (px as f64 + 0.5);
                self.frame.extend_from_slice(&pattern_color(x, y));
            }
        }
        self.frame_size = (w, h);
    }
}

impl SceneRenderer for PatternRenderer {
    fn render(&mut self, view: &RenderView, options: &RenderOptions) -> Result<(), RenderError> {
        self.renders += 1;
        if self.fail_renders {
            return Err(RenderError::Failed(format!("pane {} refused to render", view.pane)));
        }
        if options.offscreen {
            let Some((tw, th)) = self.offscreen else {
                return Err(RenderError::Failed("no offscreen target".into()));
            };
            if view.width > tw || view.height > th {
                return Err(RenderError::Failed(format!(
                    "{}x{} does not fit the {tw}x{th} offscreen target",
                    view.width, view.height
                )));
            }
            self.offscreen_renders += 1;
        }
        self.paint(view);
        self.last_view = Some(view.clone());
        self.last_options = Some(*options);
        Ok(())
    }

    fn swap_buffers(&mut self, _pane: usize) {
        self.swaps += 1;
    }

    fn read_pixels(&mut self, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        self.readbacks += 1;
        let (fw, fh) = self.frame_size;
        if width > fw || height > fh {
            return Err(RenderError::Failed(format!(
                "cannot read {width}x{height} from a {fw}x{fh} frame"
            )));
        }
        let stride = fw as usize * 4;
        let mut out = Vec::with_capacity(width as usize * height as usize * 4);
        for row in 0..height as usize {
            let start = row * stride;
            out.extend_from_slice(&self.frame[start..start + width as usize * 4]);
        }
        Ok(out)
    }

    fn create_offscreen_target(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if self.fail_offscreen || width > self.max_offscreen.0 || height > self.max_offscreen.1 {
            return Err(RenderError::OutOfMemory(format!(
                "offscreen target {width}x{height}"
            )));
        }
        self.offscreen = Some((width, height));
        Ok(())
    }

    fn release_offscreen_target(&mut self) {
        self.offscreen = None;
    }

    fn max_offscreen_size(&self) -> (u32, u32) {
        self.max_offscreen
    }
}

/// Window on the pattern renderer, stepped one idle slot at a time
pub struct ViewerHarness {
    pub window: Window<PatternRenderer, IdleQueue>,
}

impl ViewerHarness {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_settings(width, height, &ViewerSettings::default())
    }

    pub fn with_layout(mode: LayoutMode, width: u32, height: u32) -> Self {
        let mut settings = ViewerSettings::default();
        settings.layout.mode = mode;
        Self::with_settings(width, height, &settings)
    }

    pub fn with_settings(width: u32, height: u32, settings: &ViewerSettings) -> Self {
        Self {
            window: Window::new(
                "harness",
                width,
                height,
                PatternRenderer::new(),
                IdleQueue::new(),
                settings,
            ),
        }
    }

    pub fn renderer(&self) -> &PatternRenderer {
        self.window.renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut PatternRenderer {
        self.window.renderer_mut()
    }

    pub fn idle(&self) -> &IdleQueue {
        self.window.idle_scheduler()
    }

    /// Run one idle slot; returns the number of callbacks serviced
    pub fn step(&mut self) -> usize {
        self.window.run_idle_slot()
    }

    /// Run idle slots until the queue drains or `max_slots` have run.
    /// Returns the number of slots run.
    pub fn run_until_idle(&mut self, max_slots: usize) -> usize {
        let mut slots = 0;
        while slots < max_slots && !self.idle().is_empty() {
            self.step();
            slots += 1;
        }
        slots
    }

    // ── Input ─────────────────────────────────────────────────

    /// Press `button` at `from`, move to `to` and release
    pub fn drag(&mut self, button: u8, from: (f64, f64), to: (f64, f64)) {
        self.send(&InputEvent::press(button, from.0, from.1));
        self.send(&InputEvent::motion(to.0, to.1));
        self.send(&InputEvent::release(button, to.0, to.1));
    }

    /// Deliver an event without a tool, logging any error
    pub fn send(&mut self, event: &InputEvent) -> bool {
        self.send_to(event, None)
    }

    pub fn send_to(&mut self, event: &InputEvent, tool: Option<&mut dyn InteractiveTool>) -> bool {
        match self.window.handle_input(event, tool) {
            Ok(consumed) => consumed,
            Err(e) => {
                tracing::warn!(?event, "input rejected: {e}");
                false
            }
        }
    }
}
