//! Render scheduler: per-pane redraw coalescing on top of a toolkit idle
//! scheduler.
//!
//! Everything runs on the toolkit thread. "Idle" is a priority class of the
//! same event loop, so there is no locking; the invariant kept here is at
//! most one pending idle registration per pane.

use std::collections::VecDeque;

use crate::error::{ViewerError, ViewerResult};
use crate::renderer::{RenderOptions, SceneRenderer};
use crate::viewport::Viewport;

/// Handle of one idle-time registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdleHandle(pub u64);

/// Toolkit idle scheduler collaborator.
///
/// A registration fires at most once. When it fires, the host loop calls
/// [`crate::window::Window::on_idle`] with the handle.
pub trait IdleScheduler {
    fn register_idle_once(&mut self, pane: usize) -> IdleHandle;
    fn cancel_idle(&mut self, handle: IdleHandle);
}

/// In-memory idle scheduler for headless hosts and tests
#[derive(Debug, Default)]
pub struct IdleQueue {
    next_id: u64,
    pending: VecDeque<(IdleHandle, usize)>,
    registered: u64,
    cancelled: u64,
}

impl IdleScheduler for IdleQueue {
    fn register_idle_once(&mut self, pane: usize) -> IdleHandle {
        self.next_id += 1;
        self.registered += 1;
        let handle = IdleHandle(self.next_id);
        self.pending.push_back((handle, pane));
        handle
    }

    fn cancel_idle(&mut self, handle: IdleHandle) {
        let before = self.pending.len();
        self.pending.retain(|(h, _)| *h != handle);
        if self.pending.len() != before {
            self.cancelled += 1;
        }
    }
}

impl IdleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every registration due in this idle slot. Registrations made
    /// while servicing them wait for the next slot.
    pub fn take_due(&mut self) -> Vec<IdleHandle> {
        self.pending.drain(..).map(|(h, _)| h).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of pending registrations for `pane`
    pub fn pending_for(&self, pane: usize) -> usize {
        self.pending.iter().filter(|(_, p)| *p == pane).count()
    }

    /// Total registrations ever made
    pub fn registered(&self) -> u64 {
        self.registered
    }

    /// Total registrations cancelled before firing
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

/// Redraw state of one pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawState {
    Idle,
    PendingIdle,
    Rendering,
}

#[derive(Debug, Default, Clone, Copy)]
struct PaneSchedule {
    pending: Option<IdleHandle>,
    rendering: bool,
}

/// Owns the renderer and idle scheduler and tracks per-pane redraw state
pub struct RenderScheduler<R: SceneRenderer, S: IdleScheduler> {
    renderer: R,
    idle: S,
    panes: Vec<PaneSchedule>,
    renders: u64,
}

impl<R: SceneRenderer, S: IdleScheduler> RenderScheduler<R, S> {
    pub fn new(renderer: R, idle: S) -> Self {
        Self {
            renderer,
            idle,
            panes: Vec::new(),
            renders: 0,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn idle(&self) -> &S {
        &self.idle
    }

    pub fn idle_mut(&mut self) -> &mut S {
        &mut self.idle
    }

    /// Renders issued through this scheduler
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub(crate) fn ensure_panes(&mut self, count: usize) {
        if self.panes.len() < count {
            self.panes.resize(count, PaneSchedule::default());
        }
    }

    pub fn state(&self, pane: usize) -> RedrawState {
        match self.panes.get(pane) {
            Some(s) if s.rendering => RedrawState::Rendering,
            Some(s) if s.pending.is_some() => RedrawState::PendingIdle,
            _ => RedrawState::Idle,
        }
    }

    /// Register an idle redraw unless one is already pending. Returns true
    /// if a new registration was made.
    pub fn request_redraw(&mut self, pane: usize) -> bool {
        self.ensure_panes(pane + 1);
        if self.panes[pane].pending.is_some() {
            tracing::trace!(pane, "redraw already pending, coalesced");
            return false;
        }
        let handle = self.idle.register_idle_once(pane);
        tracing::trace!(pane, ?handle, "idle redraw registered");
        self.panes[pane].pending = Some(handle);
        true
    }

    pub fn cancel_pending(&mut self, pane: usize) {
        if let Some(handle) = self.panes.get_mut(pane).and_then(|s| s.pending.take()) {
            self.idle.cancel_idle(handle);
        }
    }

    pub fn cancel_all(&mut self) {
        for pane in 0..self.panes.len() {
            self.cancel_pending(pane);
        }
    }

    /// Consume a fired registration, returning its pane. Stale or unknown
    /// handles return `None`.
    pub(crate) fn take_fired(&mut self, handle: IdleHandle) -> Option<usize> {
        let pane = self.panes.iter().position(|s| s.pending == Some(handle))?;
        self.panes[pane].pending = None;
        Some(pane)
    }

    /// Cancel any pending idle redraw of `pane` and render it now. A pane
    /// whose view cannot be resolved keeps its pending registration.
    pub(crate) fn render(
        &mut self,
        pane: usize,
        viewport: &Viewport,
        options: &RenderOptions,
        swap: bool,
    ) -> ViewerResult<()> {
        self.ensure_panes(pane + 1);
        let view = viewport.render_view(pane)?;
        self.cancel_pending(pane);

        self.panes[pane].rendering = true;
        self.renders += 1;
        let result = self.renderer.render(&view, options);
        if result.is_ok() && swap {
            self.renderer.swap_buffers(pane);
        }
        self.panes[pane].rendering = false;

        result.map_err(|e| {
            tracing::error!(pane, "render failed: {e}");
            ViewerError::from_render(pane, e)
        })
    }
}

impl<R: SceneRenderer, S: IdleScheduler> Drop for RenderScheduler<R, S> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::PatternRenderer;

    fn scheduler() -> RenderScheduler<PatternRenderer, IdleQueue> {
        RenderScheduler::new(PatternRenderer::new(), IdleQueue::new())
    }

    #[test]
    fn test_requests_coalesce() {
        let mut s = scheduler();
        assert!(s.request_redraw(0));
        for _ in 0..4 {
            assert!(!s.request_redraw(0));
        }
        assert_eq!(s.state(0), RedrawState::PendingIdle);
        assert_eq!(s.idle().len(), 1);
    }

    #[test]
    fn test_render_cancels_pending() {
        let mut s = scheduler();
        let vp = Viewport::new(8, 8);
        s.request_redraw(0);
        s.render(0, &vp, &vp.interactive_options(), true).unwrap();
        assert_eq!(s.state(0), RedrawState::Idle);
        assert!(s.idle().is_empty());
        assert_eq!(s.idle().cancelled(), 1);
        assert_eq!(s.renderer().swap_count(), 1);
        assert_eq!(s.render_count(), 1);
    }

    #[test]
    fn test_render_without_swap() {
        let mut s = scheduler();
        let vp = Viewport::new(8, 8);
        s.render(0, &vp, &vp.interactive_options(), false).unwrap();
        assert_eq!(s.renderer().swap_count(), 0);
        assert_eq!(s.renderer().render_count(), 1);
    }

    #[test]
    fn test_take_fired_ignores_stale_handles() {
        let mut s = scheduler();
        s.request_redraw(1);
        let due = s.idle_mut().take_due();
        assert_eq!(due.len(), 1);
        assert_eq!(s.take_fired(due[0]), Some(1));
        assert_eq!(s.take_fired(due[0]), None);
        assert_eq!(s.take_fired(IdleHandle(999)), None);
    }

    #[test]
    fn test_failed_render_leaves_rendering_state() {
        let mut s = scheduler();
        s.renderer_mut().fail_renders(true);
        let vp = Viewport::new(8, 8);
        let err = s.render(0, &vp, &vp.interactive_options(), true).unwrap_err();
        assert!(matches!(err, ViewerError::Render { pane: 0, .. }));
        assert_eq!(s.state(0), RedrawState::Idle);
        assert_eq!(s.renderer().swap_count(), 0);
    }

    #[test]
    fn test_unresolved_view_keeps_pending_redraw() {
        let mut s = scheduler();
        let mut vp = Viewport::new(8, 8);
        vp.set_render_target(None);
        s.request_redraw(0);
        let err = s.render(0, &vp, &vp.interactive_options(), true).unwrap_err();
        assert!(matches!(err, ViewerError::MissingRenderTarget { pane: 0 }));
        assert_eq!(s.state(0), RedrawState::PendingIdle);
        assert_eq!(s.idle().len(), 1);
        assert_eq!(s.idle().cancelled(), 0);
        assert_eq!(s.render_count(), 0);
    }

    #[test]
    fn test_cancel_all_clears_registrations() {
        let mut s = scheduler();
        s.request_redraw(0);
        s.request_redraw(1);
        s.cancel_all();
        assert!(s.idle().is_empty());
        assert_eq!(s.idle().cancelled(), 2);
    }
}
