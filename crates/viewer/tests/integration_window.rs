//! Integration tests for the window: layouts, redraw scheduling, tumble and
//! picking through the public API.

use glam::DVec3;
use scene_viewer_lib::harness::ViewerHarness;
use scene_viewer_lib::input::InteractionModifiers;
use scene_viewer_lib::{
    InputEvent, InteractiveEvent, InteractiveMode, InteractiveTool, ModifierMask, RedrawState, ViewerSettings,
};
use shared::{LayoutMode, ProjectionMode};

#[test]
fn test_five_requests_one_render() {
    let mut h = ViewerHarness::new(120, 80);
    h.run_until_idle(4);
    let before = h.renderer().render_count();
    let swaps = h.renderer().swap_count();
    for _ in 0..5 {
        h.window.request_redraw(0).unwrap();
    }
    assert_eq!(h.window.redraw_state(0), RedrawState::PendingIdle);
    assert_eq!(h.idle().len(), 1);
    h.step();
    assert_eq!(h.renderer().render_count(), before + 1);
    assert_eq!(h.renderer().swap_count(), swaps + 1);
}

#[test]
fn test_tumble_terminates_without_activation() {
    let mut h = ViewerHarness::with_layout(LayoutMode::FrontBack, 200, 100);
    let cameras = (h.window.camera(0).unwrap(), h.window.camera(1).unwrap());
    for _ in 0..20 {
        h.window.redraw_all_now().unwrap();
        h.step();
    }
    assert_eq!((h.window.camera(0).unwrap(), h.window.camera(1).unwrap()), cameras);
}

#[test]
fn test_automatic_tumble_spins_tied_panes() {
    let mut h = ViewerHarness::with_layout(LayoutMode::FrontBack, 202, 100);
    h.run_until_idle(4);
    h.drag(1, (50.0, 50.0), (60.0, 50.0));
    assert!(h.window.tumble_state(0).unwrap().active);

    let before = h.window.camera(1).unwrap();
    for _ in 0..3 {
        h.step();
        assert!(!h.idle().is_empty(), "tumble re-arms itself");
    }
    let after = h.window.camera(1).unwrap();
    assert_ne!(before, after);

    // front and back stay opposite while spinning
    let front = DVec3::from(h.window.camera(0).unwrap().eye);
    let back = DVec3::from(after.eye);
    assert!((front + back).length() < 1e-9);

    h.window.stop_tumble(0).unwrap();
    assert!(h.run_until_idle(10) <= 2);
    assert!(h.idle().is_empty());
}

#[test]
fn test_layout_round_trip_keeps_sleeping_panes() {
    let mut h = ViewerHarness::new(400, 300);
    for mode in LayoutMode::all() {
        h.window.set_layout_mode(*mode).unwrap();
        assert_eq!(h.window.pane_count(), scene_viewer_lib::layout::pane_count(*mode));
        for pane in 0..h.window.pane_count() {
            let projection = h.window.viewport(pane).unwrap().projection();
            assert!(scene_viewer_lib::layout::is_projection_valid(*mode, pane, projection));
        }
        h.run_until_idle(4);
    }
    assert_eq!(h.window.number_of_scene_viewers(), 4);
    h.window.set_layout_mode(LayoutMode::Simple).unwrap();
    assert_eq!(h.window.number_of_scene_viewers(), 4);
    assert!(!h.window.viewport(3).unwrap().is_awake());
}

#[test]
fn test_projection_policy_per_layout() {
    let mut h = ViewerHarness::with_layout(LayoutMode::Orthographic, 400, 400);
    h.window.set_projection_mode(0, ProjectionMode::Perspective).unwrap();
    assert!(h.window.set_projection_mode(2, ProjectionMode::Perspective).is_err());
    assert!(h.window.set_projection_mode(0, ProjectionMode::Custom).is_err());
    h.window.set_layout_mode(LayoutMode::TwoFree).unwrap();
    h.window.set_projection_mode(1, ProjectionMode::Custom).unwrap();
}

#[test]
fn test_standard_orthographic_view() {
    let mut h = ViewerHarness::with_layout(LayoutMode::Orthographic, 400, 400);
    h.window.set_orthographic_axes(3, 5).unwrap();
    h.window.set_standard_orthographic_view().unwrap();

    let front = h.window.camera(1).unwrap();
    let view = (DVec3::from(front.eye) - DVec3::from(front.lookat)).normalize();
    assert!((view - DVec3::NEG_Y).length() < 1e-12);
    assert!((DVec3::from(front.up) - DVec3::Z).length() < 1e-12);

    let iso = h.window.camera(0).unwrap();
    let iso_view = (DVec3::from(iso.eye) - DVec3::from(iso.lookat)).normalize();
    assert!((iso_view - DVec3::new(1.0, -1.0, 1.0).normalize()).length() < 1e-12);

    // side panes are orthogonal to the front view
    for pane in [2, 3] {
        let c = h.window.camera(pane).unwrap();
        let v = (DVec3::from(c.eye) - DVec3::from(c.lookat)).normalize();
        assert!(v.dot(view).abs() < 1e-9, "pane {pane}");
    }
}

#[test]
fn test_settings_drive_new_window() {
    let settings = ViewerSettings::from_json(
        r#"{ "layout": { "mode": "front_side", "ortho_up_axis": 2, "ortho_front_axis": 5 },
             "capture": { "pane_border": 6 } }"#,
    )
    .unwrap();
    let h = ViewerHarness::with_settings(206, 100, &settings);
    assert_eq!(h.window.layout_mode(), LayoutMode::FrontSide);
    // +Y up with -Y front is parallel; front advances to -Z
    assert_eq!(h.window.orthographic_axes(), (2, 6));
    let rects = h.window.pane_rects();
    assert_eq!(rects[1].left - (rects[0].left + rects[0].width as i32), 6);
}

struct PickTool {
    hits: Vec<(usize, InteractionModifiers, bool)>,
}

impl InteractiveTool for PickTool {
    fn handle_event(&mut self, event: InteractiveEvent) -> bool {
        let hit = event.volume.contains(DVec3::ZERO);
        self.hits.push((event.pane, event.modifiers, hit));
        true
    }
}

#[test]
fn test_select_mode_picks_through_interaction_volume() {
    let mut h = ViewerHarness::new(101, 101);
    h.window.set_interactive_mode(InteractiveMode::Select);
    let mut tool = PickTool { hits: Vec::new() };

    let centre = InputEvent::press(1, 50.0, 50.0).with_modifiers(ModifierMask::ALT);
    assert!(h.send_to(&centre, Some(&mut tool)));
    let corner = InputEvent::press(1, 2.0, 2.0);
    h.send_to(&corner, Some(&mut tool));

    assert_eq!(tool.hits.len(), 2);
    let (pane, modifiers, hit) = tool.hits[0];
    assert_eq!(pane, 0);
    assert!(modifiers.alt && !modifiers.shift && !modifiers.control);
    assert!(hit);
    assert!(!tool.hits[1].2);
}

#[test]
fn test_destroy_after_activity() {
    let mut h = ViewerHarness::with_layout(LayoutMode::Orthographic, 200, 200);
    h.window.start_tumble(1, [0.0, 1.0, 0.0], 0.1).unwrap();
    h.step();
    assert!(!h.idle().is_empty());
    h.window.destroy();
}
