//! View synchronizer: keeps tied panes consistent with the pane whose camera
//! just changed.
//!
//! The per-layout behaviour is a pure table ([`tied_updates`]); [`propagate`]
//! reads every camera it needs first, then applies the table pane by pane.

use std::f64::consts::{FRAC_PI_2, PI};

use glam::DVec3;
use shared::{LayoutMode, ViewVolume};

use crate::error::{ViewerError, ViewerResult};
use crate::layout;
use crate::renderer::SceneRenderer;
use crate::scheduler::IdleScheduler;
use crate::viewport::{Camera, CameraFrame};
use crate::window::Window;

/// Axis of the changed pane's orthonormal frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAxis {
    View,
    Up,
    Left,
}

impl FrameAxis {
    pub fn vector(&self, frame: &CameraFrame) -> DVec3 {
        match self {
            FrameAxis::View => frame.view,
            FrameAxis::Up => frame.up,
            FrameAxis::Left => frame.left,
        }
    }
}

/// One rotation about the look-at point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationStep {
    pub axis: FrameAxis,
    /// Radians, right-hand rule
    pub angle: f64,
}

const fn step(axis: FrameAxis, angle: f64) -> RotationStep {
    RotationStep { axis, angle }
}

/// How a tied pane follows the changed pane
#[derive(Debug, Clone, PartialEq)]
pub enum Tie {
    /// Take the changed pane's look-at parameters and volume, then apply the
    /// rotations in order. All axes come from the changed pane's frame.
    Orient(Vec<RotationStep>),
    /// Move to the changed pane's look-at point and volume, keeping the
    /// pane's own orientation
    Follow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiedUpdate {
    pub pane: usize,
    pub tie: Tie,
}

/// Third-angle table for panes 1-3: (changed, target, steps)
const ORTHO_TABLE: [(usize, usize, [RotationStep; 2]); 6] = [
    (1, 2, [step(FrameAxis::Left, -FRAC_PI_2), step(FrameAxis::View, -FRAC_PI_2)]),
    (1, 3, [step(FrameAxis::Left, -FRAC_PI_2), step(FrameAxis::View, FRAC_PI_2)]),
    (2, 1, [step(FrameAxis::View, FRAC_PI_2), step(FrameAxis::Left, FRAC_PI_2)]),
    (2, 3, [step(FrameAxis::Up, FRAC_PI_2), step(FrameAxis::Up, FRAC_PI_2)]),
    (3, 1, [step(FrameAxis::View, -FRAC_PI_2), step(FrameAxis::Left, FRAC_PI_2)]),
    (3, 2, [step(FrameAxis::Up, FRAC_PI_2), step(FrameAxis::Up, FRAC_PI_2)]),
];

/// Stereo rotation between the two eyes, or `None` when the eye sits on the
/// look-at point
pub fn stereo_angle(eye_spacing: f64, eye_distance: f64) -> Option<f64> {
    if eye_distance == 0.0 {
        return None;
    }
    Some(2.0 * (0.5 * eye_spacing / eye_distance).atan())
}

fn single(pane: usize, axis: FrameAxis, angle: f64) -> Vec<TiedUpdate> {
    vec![TiedUpdate {
        pane,
        tie: Tie::Orient(vec![step(axis, angle)]),
    }]
}

/// Panes tied to `changed` under `mode` and how each follows it.
/// `stereo` is the Pseudo3D eye angle (ignored by other layouts).
pub fn tied_updates(mode: LayoutMode, changed: usize, stereo: f64) -> Vec<TiedUpdate> {
    if changed >= layout::pane_count(mode) {
        return Vec::new();
    }
    match mode {
        LayoutMode::Simple | LayoutMode::TwoD | LayoutMode::TwoFree => Vec::new(),
        LayoutMode::Orthographic | LayoutMode::FreeOrtho => {
            if changed == 0 {
                if mode == LayoutMode::FreeOrtho {
                    return Vec::new();
                }
                return (1..4)
                    .map(|pane| TiedUpdate {
                        pane,
                        tie: Tie::Follow,
                    })
                    .collect();
            }
            ORTHO_TABLE
                .iter()
                .filter(|(c, _, _)| *c == changed)
                .map(|(_, target, steps)| TiedUpdate {
                    pane: *target,
                    tie: Tie::Orient(steps.to_vec()),
                })
                .collect()
        }
        LayoutMode::FrontBack => single(1 - changed, FrameAxis::Up, PI),
        LayoutMode::FrontSide => {
            if changed == 0 {
                single(1, FrameAxis::Up, FRAC_PI_2)
            } else {
                single(0, FrameAxis::Up, -FRAC_PI_2)
            }
        }
        LayoutMode::Pseudo3D => {
            // pane 0 is the left eye, pane 1 the right eye
            if changed == 0 {
                single(1, FrameAxis::Up, stereo)
            } else {
                single(0, FrameAxis::Up, -stereo)
            }
        }
    }
}

/// Camera and volume of a tied pane after following `source`
pub fn apply_tie(
    tie: &Tie,
    source: &Camera,
    source_volume: &ViewVolume,
    frame: &CameraFrame,
    target: &Camera,
    target_volume: &ViewVolume,
) -> (Camera, ViewVolume) {
    let volume = ViewVolume {
        left: source_volume.left,
        right: source_volume.right,
        bottom: source_volume.bottom,
        top: source_volume.top,
        near: target_volume.near,
        far: target_volume.far,
    };
    let camera = match tie {
        Tie::Orient(steps) => {
            let mut camera = Camera::new(source.eye, source.lookat, frame.up);
            for s in steps {
                camera.rotate_about_lookat(s.axis.vector(frame), s.angle);
            }
            camera
        }
        Tie::Follow => {
            let delta = source.lookat - target.lookat;
            Camera::new(target.eye + delta, source.lookat, target.up)
        }
    };
    (camera, volume)
}

/// Recompute every pane tied to `changed` and redraw each one immediately.
/// `changed` itself is neither modified nor redrawn. Returns the number of
/// panes updated.
pub fn propagate<R: SceneRenderer, S: IdleScheduler>(
    window: &mut Window<R, S>,
    changed: usize,
) -> ViewerResult<usize> {
    let mode = window.layout_mode;
    let count = layout::pane_count(mode);
    if changed >= count {
        return Err(ViewerError::PaneOutOfRange {
            pane: changed,
            count,
        });
    }

    let source_vp = &window.viewports[changed];
    let source = source_vp.read_camera(changed)?;
    let source_volume = *source_vp.volume();

    let mut stereo = 0.0;
    if mode == LayoutMode::Pseudo3D {
        match stereo_angle(window.eye_spacing, source.eye_distance()) {
            Some(angle) => stereo = angle,
            None => {
                tracing::debug!(pane = changed, "eye on look-at point, stereo propagation skipped");
                return Ok(0);
            }
        }
    }

    let updates = tied_updates(mode, changed, stereo);
    if updates.is_empty() {
        return Ok(0);
    }
    let frame = source_vp.frame(changed)?;

    // Read every tied pane before touching any of them
    let mut planned = Vec::with_capacity(updates.len());
    for update in &updates {
        let vp = &window.viewports[update.pane];
        let camera = vp.read_camera(update.pane)?;
        planned.push(apply_tie(
            &update.tie,
            &source,
            &source_volume,
            &frame,
            &camera,
            vp.volume(),
        ));
    }

    for (updated, (update, (camera, volume))) in updates.iter().zip(planned).enumerate() {
        let pane = update.pane;
        let vp = &mut window.viewports[pane];
        vp.set_camera(camera);
        vp.set_volume(volume);
        window.notify_view_changed(pane);

        let vp = &window.viewports[pane];
        let options = vp.interactive_options();
        if let Err(e) = window.scheduler.render(pane, vp, &options, true) {
            tracing::warn!(changed, pane, updated, "propagation stopped: {e}");
            return Err(ViewerError::PartialPropagation {
                updated: updated + 1,
                source: Box::new(e),
            });
        }
    }
    tracing::debug!(?mode, changed, panes = updates.len(), "views propagated");
    Ok(updates.len())
}
