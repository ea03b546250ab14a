//! Layout mode table: pane counts, valid projections and pane arrangement.
//!
//! Everything here is pure; the window consults it on every mode change and
//! projection request.

use shared::{LayoutMode, PixelRect, ProjectionMode};

/// Maximum number of panes any layout uses
pub const MAX_PANES: usize = 4;

/// Number of panes a layout shows
pub fn pane_count(mode: LayoutMode) -> usize {
    match mode {
        LayoutMode::Simple | LayoutMode::TwoD => 1,
        LayoutMode::Orthographic | LayoutMode::FreeOrtho => 4,
        LayoutMode::FrontBack
        | LayoutMode::FrontSide
        | LayoutMode::Pseudo3D
        | LayoutMode::TwoFree => 2,
    }
}

/// Whether `projection` may be used by pane `pane` under `mode`
pub fn is_projection_valid(mode: LayoutMode, pane: usize, projection: ProjectionMode) -> bool {
    if pane >= pane_count(mode) {
        return false;
    }
    use ProjectionMode::*;
    match mode {
        LayoutMode::Simple | LayoutMode::TwoFree => true,
        LayoutMode::TwoD => projection == Parallel,
        LayoutMode::Orthographic | LayoutMode::FreeOrtho => {
            if pane == 0 {
                matches!(projection, Parallel | Perspective)
            } else {
                projection == Parallel
            }
        }
        LayoutMode::FrontBack | LayoutMode::FrontSide | LayoutMode::Pseudo3D => {
            matches!(projection, Parallel | Perspective)
        }
    }
}

/// Projections valid for a pane, in declaration order
pub fn valid_projections(mode: LayoutMode, pane: usize) -> Vec<ProjectionMode> {
    ProjectionMode::all()
        .iter()
        .copied()
        .filter(|p| is_projection_valid(mode, pane, *p))
        .collect()
}

/// Pane arrangement as (columns, rows)
pub fn grid(mode: LayoutMode) -> (u32, u32) {
    match pane_count(mode) {
        1 => (1, 1),
        2 => (2, 1),
        _ => (2, 2),
    }
}

/// The pane whose camera defines the layout when it is first entered
pub fn driving_pane(mode: LayoutMode) -> usize {
    match mode {
        LayoutMode::Orthographic | LayoutMode::FreeOrtho => 1,
        _ => 0,
    }
}

/// Split a `width` x `height` area into pane rectangles separated by
/// `border` pixels. Panes are numbered left to right, top to bottom; the
/// returned rectangles use a bottom-left origin. The last column and row
/// absorb any remainder. Returns `None` if a pane would be empty.
pub fn pane_rects(mode: LayoutMode, width: u32, height: u32, border: u32) -> Option<Vec<PixelRect>> {
    let (cols, rows) = grid(mode);
    let usable_w = width.checked_sub(border * (cols - 1))?;
    let usable_h = height.checked_sub(border * (rows - 1))?;
    let base_w = usable_w / cols;
    let base_h = usable_h / rows;
    if base_w == 0 || base_h == 0 {
        return None;
    }

    let mut rects = Vec::with_capacity(pane_count(mode));
    for pane in 0..pane_count(mode) as u32 {
        let col = pane % cols;
        let row = pane / cols;
        let w = if col + 1 == cols {
            usable_w - base_w * (cols - 1)
        } else {
            base_w
        };
        let h = if row + 1 == rows {
            usable_h - base_h * (rows - 1)
        } else {
            base_h
        };
        let x = col * (base_w + border);
        let y_from_top = row * (base_h + border);
        let bottom = height - y_from_top - h;
        rects.push(PixelRect::new(x as i32, bottom as i32, w, h));
    }
    Some(rects)
}
