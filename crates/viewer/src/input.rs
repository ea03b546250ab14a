//! Pointer and key input dispatch.
//!
//! In transform mode drags move the current pane's camera; in select mode
//! events are turned into interaction volumes for an external tool.

use bitflags::bitflags;
use glam::DVec3;
use shared::ViewportMode;

use crate::error::ViewerResult;
use crate::renderer::SceneRenderer;
use crate::scheduler::IdleScheduler;
use crate::viewport::picking::InteractionVolume;
use crate::window::Window;

bitflags! {
    /// Toolkit modifier bits carried by input events
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierMask: u32 {
        const SHIFT = 1;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// Modifiers as seen by interactive tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionModifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
}

impl From<ModifierMask> for InteractionModifiers {
    fn from(mask: ModifierMask) -> Self {
        Self {
            shift: mask.contains(ModifierMask::SHIFT),
            control: mask.contains(ModifierMask::CONTROL),
            alt: mask.contains(ModifierMask::ALT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEventKind {
    ButtonPress,
    ButtonRelease,
    Motion,
    KeyPress,
    KeyRelease,
}

/// One toolkit input record. Coordinates are window pixels from the
/// top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub x: f64,
    pub y: f64,
    /// 1 = left, 2 = middle, 3 = right; 0 for motion and keys
    pub button: u8,
    pub modifiers: ModifierMask,
    pub key: Option<char>,
}

impl InputEvent {
    pub fn press(button: u8, x: f64, y: f64) -> Self {
        Self {
            kind: InputEventKind::ButtonPress,
            x,
            y,
            button,
            modifiers: ModifierMask::empty(),
            key: None,
        }
    }

    pub fn release(button: u8, x: f64, y: f64) -> Self {
        Self {
            kind: InputEventKind::ButtonRelease,
            ..Self::press(button, x, y)
        }
    }

    pub fn motion(x: f64, y: f64) -> Self {
        Self {
            kind: InputEventKind::Motion,
            ..Self::press(0, x, y)
        }
    }

    pub fn key(key: char, x: f64, y: f64) -> Self {
        Self {
            kind: InputEventKind::KeyPress,
            key: Some(key),
            ..Self::press(0, x, y)
        }
    }

    pub fn with_modifiers(mut self, modifiers: ModifierMask) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractiveMode {
    /// Drags move the camera
    #[default]
    Transform,
    /// Events go to the interactive tool
    Select,
}

/// What an interactive tool receives for one event
#[derive(Debug, Clone)]
pub struct InteractiveEvent {
    pub pane: usize,
    pub kind: InputEventKind,
    pub button: u8,
    pub modifiers: InteractionModifiers,
    pub key: Option<char>,
    pub volume: InteractionVolume,
}

/// External picking / editing tool
pub trait InteractiveTool {
    /// Handle one event; return true if it was consumed
    fn handle_event(&mut self, event: InteractiveEvent) -> bool;
}

/// Camera drag in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DragState {
    pane: usize,
    button: u8,
    last: (f64, f64),
    /// Most recent non-zero tumble increment of this drag
    last_tumble: Option<(DVec3, f64)>,
}

impl<R: SceneRenderer, S: IdleScheduler> Window<R, S> {
    /// Pane under a window pointer position and the pointer relative to
    /// that pane's top-left corner
    pub fn pane_at(&self, x: f64, y: f64) -> Option<(usize, f64, f64)> {
        let flipped = self.height as f64 - y - 1.0;
        self.pane_rects
            .iter()
            .take(self.pane_count())
            .enumerate()
            .find(|(_, r)| {
                x >= r.left as f64
                    && x < r.left as f64 + r.width as f64
                    && flipped >= r.bottom as f64
                    && flipped < r.bottom as f64 + r.height as f64
            })
            .map(|(pane, r)| {
                let top = self.height as f64 - (r.bottom as f64 + r.height as f64);
                (pane, x - r.left as f64, y - top)
            })
    }

    /// Dispatch one input event. Returns true if it was consumed.
    pub fn handle_input(
        &mut self,
        event: &InputEvent,
        tool: Option<&mut dyn InteractiveTool>,
    ) -> ViewerResult<bool> {
        match event.kind {
            InputEventKind::ButtonPress => self.button_press(event, tool),
            InputEventKind::Motion => {
                if self.drag.is_some() {
                    self.drag_motion(event)
                } else {
                    self.forward_to_tool(event, tool)
                }
            }
            InputEventKind::ButtonRelease => {
                if self.drag.is_some_and(|d| d.button == event.button) {
                    self.button_release()
                } else {
                    self.forward_to_tool(event, tool)
                }
            }
            InputEventKind::KeyPress | InputEventKind::KeyRelease => self.forward_to_tool(event, tool),
        }
    }

    fn button_press(
        &mut self,
        event: &InputEvent,
        tool: Option<&mut dyn InteractiveTool>,
    ) -> ViewerResult<bool> {
        if let Some((pane, _, _)) = self.pane_at(event.x, event.y) {
            self.current_pane = pane;
        }
        let pane = self.current_pane;
        if self.viewports[pane].tumble().active {
            tracing::debug!(pane, "button press stops tumble");
            self.viewports[pane].stop_tumble();
        }

        let control = event.modifiers.contains(ModifierMask::CONTROL);
        let transform = match self.interactive_mode {
            InteractiveMode::Transform => true,
            InteractiveMode::Select => control && self.viewports[pane].viewport_mode() != ViewportMode::Absolute,
        };
        if transform && (1..=3).contains(&event.button) {
            self.drag = Some(DragState {
                pane,
                button: event.button,
                last: (event.x, event.y),
                last_tumble: None,
            });
            return Ok(true);
        }
        self.forward_to_tool(event, tool)
    }

    fn drag_motion(&mut self, event: &InputEvent) -> ViewerResult<bool> {
        let Some(mut drag) = self.drag else {
            return Ok(false);
        };
        let dx = event.x - drag.last.0;
        let dy = event.y - drag.last.1;
        drag.last = (event.x, event.y);
        if dx == 0.0 && dy == 0.0 {
            self.drag = Some(drag);
            return Ok(true);
        }

        let pane = drag.pane;
        let vp = &mut self.viewports[pane];
        match drag.button {
            1 => drag.last_tumble = vp.tumble_by_drag(pane, dx, dy)?,
            2 => vp.translate_by_drag(pane, dx, dy)?,
            _ => {
                vp.zoom_by_drag(pane, dy)?;
            }
        }
        self.drag = Some(drag);
        self.camera_changed(pane)?;
        Ok(true)
    }

    fn button_release(&mut self) -> ViewerResult<bool> {
        let Some(drag) = self.drag.take() else {
            return Ok(false);
        };
        if drag.button == 1 && self.settings.interaction.automatic_tumble {
            if let Some((axis, angle)) = drag.last_tumble {
                tracing::debug!(pane = drag.pane, angle, "automatic tumble started");
                self.viewports[drag.pane].start_tumble(axis, angle);
                self.request_redraw(drag.pane)?;
            }
        }
        Ok(true)
    }

    fn forward_to_tool(
        &mut self,
        event: &InputEvent,
        tool: Option<&mut dyn InteractiveTool>,
    ) -> ViewerResult<bool> {
        if self.interactive_mode != InteractiveMode::Select {
            return Ok(false);
        }
        let Some(tool) = tool else {
            return Ok(false);
        };
        let (pane, x, y) = match self.pane_at(event.x, event.y) {
            Some(hit) => hit,
            None => return Ok(false),
        };
        let volume = self.interaction_volume(pane, x, y)?;
        Ok(tool.handle_event(InteractiveEvent {
            pane,
            kind: event.kind,
            button: event.button,
            modifiers: event.modifiers.into(),
            key: event.key,
            volume,
        }))
    }
}
