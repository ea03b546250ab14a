use glam::{DMat4, DQuat, DVec3, DVec4};
use shared::{CameraParams, NdcPlacement, ProjectionMode, ViewVolume};

/// Relative length below which a vector is treated as zero
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Look-at camera: eye point, target point and up vector.
///
/// `up` may be skew (not perpendicular to the view direction); it is
/// re-orthogonalized whenever a frame is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: DVec3,
    pub lookat: DVec3,
    pub up: DVec3,
}

/// Orthonormal camera frame.
///
/// `view` points from the look-at point towards the eye, `left` is
/// `view x up`, and `up` is the corrected up vector `left x view`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub view: DVec3,
    pub up: DVec3,
    pub left: DVec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from(CameraParams::default())
    }
}

impl From<CameraParams> for Camera {
    fn from(p: CameraParams) -> Self {
        Self {
            eye: DVec3::from(p.eye),
            lookat: DVec3::from(p.lookat),
            up: DVec3::from(p.up),
        }
    }
}

impl From<Camera> for CameraParams {
    fn from(c: Camera) -> Self {
        Self {
            eye: c.eye.to_array(),
            lookat: c.lookat.to_array(),
            up: c.up.to_array(),
        }
    }
}

impl Camera {
    pub fn new(eye: DVec3, lookat: DVec3, up: DVec3) -> Self {
        Self { eye, lookat, up }
    }

    /// Distance from the eye to the look-at point
    pub fn eye_distance(&self) -> f64 {
        (self.eye - self.lookat).length()
    }

    /// Build the orthonormal frame, or explain why it cannot be built.
    pub fn frame(&self) -> Result<CameraFrame, &'static str> {
        let offset = self.eye - self.lookat;
        let distance = offset.length();
        if !distance.is_finite() || distance <= DEGENERATE_EPSILON {
            return Err("eye and look-at point coincide");
        }
        let view = offset / distance;

        let up_len = self.up.length();
        if !up_len.is_finite() || up_len <= DEGENERATE_EPSILON {
            return Err("up vector has zero length");
        }
        let left = view.cross(self.up);
        let left_len = left.length();
        if left_len <= DEGENERATE_EPSILON * up_len {
            return Err("up vector is colinear with the view direction");
        }
        let left = left / left_len;
        let up = left.cross(view);
        Ok(CameraFrame { view, up, left })
    }

    /// Check that `up` can orient the camera. An eye on the look-at point
    /// has no view direction yet and passes.
    pub fn check_up(&self) -> Result<(), &'static str> {
        let up_len = self.up.length();
        if !up_len.is_finite() || up_len <= DEGENERATE_EPSILON {
            return Err("up vector has zero length");
        }
        if self.eye_distance() <= DEGENERATE_EPSILON {
            return Ok(());
        }
        self.frame().map(|_| ())
    }

    /// True if `up` is not perpendicular to the view direction
    pub fn is_skew(&self) -> bool {
        match self.frame() {
            Ok(frame) => self.up.normalize_or_zero().dot(frame.view).abs() > 1e-9,
            Err(_) => true,
        }
    }

    /// Rotate the eye and up vector about `axis` through the look-at point.
    /// `axis` does not need to be normalized; a zero axis is ignored.
    pub fn rotate_about_lookat(&mut self, axis: DVec3, angle: f64) {
        let axis = axis.normalize_or_zero();
        if axis == DVec3::ZERO || angle == 0.0 {
            return;
        }
        let q = DQuat::from_axis_angle(axis, angle);
        self.eye = self.lookat + q * (self.eye - self.lookat);
        self.up = q * self.up;
    }

    /// Move eye and look-at point together
    pub fn translate(&mut self, offset: DVec3) {
        self.eye += offset;
        self.lookat += offset;
    }

    /// Scale the eye distance by `factor`, keeping the look-at point
    pub fn dolly(&mut self, factor: f64) {
        self.eye = self.lookat + (self.eye - self.lookat) * factor;
    }

    /// View matrix (world -> camera), column-major
    pub fn view_matrix(&self) -> Result<DMat4, &'static str> {
        let frame = self.frame()?;
        Ok(DMat4::look_at_rh(self.eye, self.lookat, frame.up))
    }
}

/// Off-axis perspective frustum in OpenGL clip conventions
fn frustum_rh_gl(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> DMat4 {
    let w = right - left;
    let h = top - bottom;
    let d = far - near;
    DMat4::from_cols(
        DVec4::new(2.0 * near / w, 0.0, 0.0, 0.0),
        DVec4::new(0.0, 2.0 * near / h, 0.0, 0.0),
        DVec4::new((right + left) / w, (top + bottom) / h, -(far + near) / d, -1.0),
        DVec4::new(0.0, 0.0, -2.0 * far * near / d, 0.0),
    )
}

/// Maps the default NDC square onto `ndc`
fn ndc_matrix(ndc: &NdcPlacement) -> DMat4 {
    let sx = 0.5 * ndc.width;
    let sy = 0.5 * ndc.height;
    DMat4::from_cols(
        DVec4::new(sx, 0.0, 0.0, 0.0),
        DVec4::new(0.0, sy, 0.0, 0.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
        DVec4::new(ndc.left + sx, ndc.top - sy, 0.0, 1.0),
    )
}

/// Projection matrix (camera -> clip), column-major.
///
/// For perspective projection the volume's left/right/bottom/top are given in
/// the look-at plane and are scaled back to the near plane.
pub fn projection_matrix(
    projection: ProjectionMode,
    volume: &ViewVolume,
    eye_distance: f64,
    ndc: &NdcPlacement,
    custom: &DMat4,
) -> DMat4 {
    let base = match projection {
        ProjectionMode::Parallel => DMat4::orthographic_rh_gl(
            volume.left,
            volume.right,
            volume.bottom,
            volume.top,
            volume.near,
            volume.far,
        ),
        ProjectionMode::Perspective => {
            let scale = volume.near / eye_distance.max(f64::EPSILON);
            frustum_rh_gl(
                volume.left * scale,
                volume.right * scale,
                volume.bottom * scale,
                volume.top * scale,
                volume.near,
                volume.far,
            )
        }
        ProjectionMode::Custom => *custom,
    };
    ndc_matrix(ndc) * base
}
