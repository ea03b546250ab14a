use glam::{DMat4, DVec2, DVec3, DVec4};
use shared::PixelRect;

use crate::error::{ViewerError, ViewerResult};

/// A ray in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Closest distance from `point` to the infinite line of the ray
    pub fn distance_to_point(&self, point: DVec3) -> f64 {
        let d = point - self.origin;
        d.cross(self.direction).length()
    }
}

/// Picking frustum around a pointer position.
///
/// Built from row-major model-view and projection matrices, the pixel
/// rectangle of the viewport, the pick centre in window coordinates
/// (bottom-left origin) and a pick box of `tolerance` pixels. It is handed
/// once to an interactive tool and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionVolume {
    modelview: DMat4,
    projection: DMat4,
    viewport: PixelRect,
    centre: DVec2,
    tolerance: DVec2,
    inverse: DMat4,
}

impl InteractionVolume {
    /// Build a volume for a pointer at (`pointer_x`, `pointer_y`) measured
    /// from the top-left of the viewport, as input events report it.
    pub fn build(
        modelview: &[f64; 16],
        projection: &[f64; 16],
        viewport: PixelRect,
        pointer: (f64, f64),
        tolerance: (f64, f64),
    ) -> ViewerResult<Self> {
        if viewport.is_empty() {
            return Err(ViewerError::InvalidArgument(
                "interaction volume needs a non-empty viewport".into(),
            ));
        }
        if !(tolerance.0 > 0.0 && tolerance.1 > 0.0) {
            return Err(ViewerError::InvalidArgument(format!(
                "pick tolerance must be positive, got {}x{}",
                tolerance.0, tolerance.1
            )));
        }

        // Arrays are row-major; glam stores columns
        let modelview = DMat4::from_cols_array(modelview).transpose();
        let projection = DMat4::from_cols_array(projection).transpose();
        let combined = projection * modelview;
        let det = combined.determinant();
        if !det.is_finite() || det.abs() < 1e-300 {
            return Err(ViewerError::InvalidArgument(
                "interaction volume matrices are singular".into(),
            ));
        }

        // input origin is top-left, render target origin is bottom-left
        let flipped_y = viewport.height as f64 - pointer.1 - 1.0;
        let centre = DVec2::new(
            viewport.left as f64 + pointer.0,
            viewport.bottom as f64 + flipped_y,
        );

        Ok(Self {
            modelview,
            projection,
            viewport,
            centre,
            tolerance: DVec2::new(tolerance.0, tolerance.1),
            inverse: combined.inverse(),
        })
    }

    /// Pick centre in window coordinates (bottom-left origin)
    pub fn centre(&self) -> DVec2 {
        self.centre
    }

    pub fn tolerance(&self) -> DVec2 {
        self.tolerance
    }

    pub fn viewport(&self) -> PixelRect {
        self.viewport
    }

    pub fn modelview(&self) -> &DMat4 {
        &self.modelview
    }

    pub fn projection(&self) -> &DMat4 {
        &self.projection
    }

    fn window_to_ndc(&self, window: DVec2) -> DVec2 {
        DVec2::new(
            2.0 * (window.x - self.viewport.left as f64) / self.viewport.width as f64 - 1.0,
            2.0 * (window.y - self.viewport.bottom as f64) / self.viewport.height as f64 - 1.0,
        )
    }

    fn unproject(&self, ndc: DVec2, depth: f64) -> DVec3 {
        let p = self.inverse * DVec4::new(ndc.x, ndc.y, depth, 1.0);
        p.truncate() / p.w
    }

    /// Ray from the near to the far clip plane through the pick centre
    pub fn ray(&self) -> Ray {
        let ndc = self.window_to_ndc(self.centre);
        let near = self.unproject(ndc, -1.0);
        let far = self.unproject(ndc, 1.0);
        Ray {
            origin: near,
            direction: (far - near).normalize_or_zero(),
        }
    }

    /// Project a world point to window coordinates; z is NDC depth.
    /// Returns `None` for points behind a perspective eye.
    pub fn project(&self, point: DVec3) -> Option<DVec3> {
        let clip = self.projection * self.modelview * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(DVec3::new(
            self.viewport.left as f64 + 0.5 * (ndc.x + 1.0) * self.viewport.width as f64,
            self.viewport.bottom as f64 + 0.5 * (ndc.y + 1.0) * self.viewport.height as f64,
            ndc.z,
        ))
    }

    /// Distance from the pick centre in units of the half tolerance box
    /// (1.0 is the box edge). `None` if the point cannot be projected.
    pub fn normalised_distance(&self, point: DVec3) -> Option<f64> {
        let w = self.project(point)?;
        let dx = (w.x - self.centre.x).abs() / (0.5 * self.tolerance.x);
        let dy = (w.y - self.centre.y).abs() / (0.5 * self.tolerance.y);
        Some(dx.max(dy))
    }

    /// True if `point` lies inside the pick box and between the clip planes
    pub fn contains(&self, point: DVec3) -> bool {
        match self.project(point) {
            Some(w) if (-1.0..=1.0).contains(&w.z) => self
                .normalised_distance(point)
                .is_some_and(|d| d <= 1.0),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Camera;

    fn row_major(m: &DMat4) -> [f64; 16] {
        m.transpose().to_cols_array()
    }

    fn setup() -> (DMat4, DMat4) {
        let cam = Camera::new(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y);
        let mv = cam.view_matrix().unwrap();
        let proj = DMat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 1.0, 20.0);
        (mv, proj)
    }

    #[test]
    fn test_centre_ray_hits_lookat() {
        let (mv, proj) = setup();
        let vol = InteractionVolume::build(
            &row_major(&mv),
            &row_major(&proj),
            PixelRect::new(0, 0, 64, 64),
            (32.0, 31.0),
            (4.0, 4.0),
        )
        .unwrap();
        assert_eq!(vol.centre(), DVec2::new(32.0, 32.0));
        let ray = vol.ray();
        assert!(ray.distance_to_point(DVec3::ZERO) < 1e-9);
        assert!((ray.direction - DVec3::NEG_Z).length() < 1e-9);
        assert!(vol.contains(DVec3::ZERO));
        assert!(!vol.contains(DVec3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_pointer_y_is_flipped() {
        let (mv, proj) = setup();
        // top-left pixel of the viewport sees the top-left of the volume
        let vol = InteractionVolume::build(
            &row_major(&mv),
            &row_major(&proj),
            PixelRect::new(0, 0, 64, 64),
            (0.0, 0.0),
            (2.0, 2.0),
        )
        .unwrap();
        assert_eq!(vol.centre(), DVec2::new(0.0, 63.0));
        let w = vol.project(DVec3::new(-1.0, 1.0, 0.0)).unwrap();
        assert!((w.y - 64.0).abs() < 1e-9);
        assert!(vol.normalised_distance(DVec3::new(-1.0, 1.0, 0.0)).unwrap() <= 1.0);
    }

    #[test]
    fn test_untransposed_matrices_give_wrong_ray() {
        let (mv, proj) = setup();
        // passing column-major data where row-major is expected moves the
        // translation into the bottom row and breaks the projection
        let translated = mv * DMat4::from_translation(DVec3::new(0.3, 0.0, 0.0));
        let wrong = InteractionVolume::build(
            &translated.to_cols_array(),
            &proj.to_cols_array(),
            PixelRect::new(0, 0, 64, 64),
            (32.0, 31.0),
            (4.0, 4.0),
        );
        let right = InteractionVolume::build(
            &row_major(&translated),
            &row_major(&proj),
            PixelRect::new(0, 0, 64, 64),
            (32.0, 31.0),
            (4.0, 4.0),
        )
        .unwrap();
        let target = DVec3::new(-0.3, 0.0, 0.0);
        assert!(right.ray().distance_to_point(target) < 1e-9);
        if let Ok(wrong) = wrong {
            assert!(wrong.ray().distance_to_point(target) > 1e-3);
        }
    }

    #[test]
    fn test_rejects_bad_tolerance_and_viewport() {
        let (mv, proj) = setup();
        let mv = row_major(&mv);
        let proj = row_major(&proj);
        assert!(InteractionVolume::build(&mv, &proj, PixelRect::new(0, 0, 64, 64), (1.0, 1.0), (0.0, 3.0)).is_err());
        assert!(InteractionVolume::build(&mv, &proj, PixelRect::new(0, 0, 0, 64), (1.0, 1.0), (3.0, 3.0)).is_err());
        let zero = [0.0; 16];
        assert!(InteractionVolume::build(&zero, &proj, PixelRect::new(0, 0, 64, 64), (1.0, 1.0), (3.0, 3.0)).is_err());
    }
}
