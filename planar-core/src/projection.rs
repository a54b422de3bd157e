/// Per-plane perspective camera
use nalgebra::{Matrix4, Point3};

pub const DEFAULT_FOV: f32 = 50.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 150.0;

/// Perspective camera looking down -Z from `position`.
///
/// The projection matrix is only rebuilt when one of its inputs changes;
/// `should_update` tells the owning plane to upload it again.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    /// Vertical field of view in degrees.
    fov: f32,
    near: f32,
    far: f32,
    width: f32,
    height: f32,
    pixel_ratio: f32,
    css_perspective: f32,
    projection: Matrix4<f32>,
    should_update: bool,
}

impl Camera {
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        let mut camera = Self {
            position: Point3::new(0.0, 0.0, 1.0),
            fov: DEFAULT_FOV,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            width: width.max(1.0),
            height: height.max(1.0),
            pixel_ratio: pixel_ratio.max(f32::EPSILON),
            css_perspective: 0.0,
            projection: Matrix4::identity(),
            should_update: true,
        };
        camera.update_css_perspective();
        camera.update_projection_matrix();
        camera
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_perspective(&mut self, fov: f32, near: f32, far: f32) {
        self.set_fov(fov);
        self.set_near(near);
        self.set_far(far);
        if self.should_update {
            self.update_projection_matrix();
        }
    }

    /// Clamped to 1..=179 degrees; NaN is ignored.
    pub fn set_fov(&mut self, fov: f32) {
        if fov.is_nan() {
            return;
        }
        let fov = fov.clamp(1.0, 179.0);
        if fov != self.fov {
            self.fov = fov;
            self.update_css_perspective();
            self.should_update = true;
        }
    }

    pub fn set_near(&mut self, near: f32) {
        if near.is_nan() {
            return;
        }
        let near = near.max(0.01);
        if near != self.near {
            self.near = near;
            self.should_update = true;
        }
    }

    pub fn set_far(&mut self, far: f32) {
        if far.is_nan() {
            return;
        }
        let far = far.max(50.0);
        if far != self.far {
            self.far = far;
            self.should_update = true;
        }
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        let (width, height) = (width.max(1.0), height.max(1.0));
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.update_css_perspective();
            self.should_update = true;
        }
        if self.should_update {
            self.update_projection_matrix();
        }
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        if pixel_ratio > 0.0 && pixel_ratio != self.pixel_ratio {
            self.pixel_ratio = pixel_ratio;
            self.update_css_perspective();
            self.should_update = true;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    pub fn css_perspective(&self) -> f32 {
        self.css_perspective
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&-self.position.coords)
    }

    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Acknowledges the projection matrix upload.
    pub fn cancel_update(&mut self) {
        self.should_update = false;
    }

    /// Forces the next frame to upload the projection matrix again.
    pub fn force_update(&mut self) {
        self.should_update = true;
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Matrix4::new_perspective(
            self.aspect(),
            self.fov.to_radians(),
            self.near,
            self.far,
        );
    }

    fn update_css_perspective(&mut self) {
        let half_width = self.width / (2.0 * self.pixel_ratio);
        let half_height = self.height / (2.0 * self.pixel_ratio);
        self.css_perspective =
            (half_width * half_width + half_height * half_height).sqrt() / (self.fov.to_radians() * 0.5).tan();
    }

    /// Visible world width and height at `depth`.
    pub fn screen_ratios(&self, depth: f32) -> (f32, f32) {
        let offset = self.position.z;
        let depth = if depth < offset { depth - offset } else { depth + offset };
        let height = 2.0 * (self.fov.to_radians() * 0.5).tan() * depth.abs();
        (height * self.aspect(), height)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800.0, 600.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(800.0, 600.0, 1.0);
        assert!((camera.aspect() - 800.0 / 600.0).abs() < 1e-6);
        assert!(camera.should_update());
        assert_eq!(camera.fov(), DEFAULT_FOV);
    }

    #[test]
    fn test_clamps() {
        let mut camera = Camera::default();
        camera.set_perspective(500.0, 0.0, 10.0);
        assert_eq!(camera.fov(), 179.0);
        assert_eq!(camera.near(), 0.01);
        assert_eq!(camera.far(), 50.0);
    }

    #[test]
    fn test_dirty_flag() {
        let mut camera = Camera::default();
        camera.cancel_update();
        camera.set_perspective(DEFAULT_FOV, DEFAULT_NEAR, DEFAULT_FAR);
        assert!(!camera.should_update());
        camera.set_fov(70.0);
        assert!(camera.should_update());
    }

    #[test]
    fn test_screen_ratios_at_plane_depth() {
        let camera = Camera::new(1000.0, 500.0, 1.0);
        let (width, height) = camera.screen_ratios(0.0);
        let expected = 2.0 * (25.0f32).to_radians().tan();
        assert!((height - expected).abs() < 1e-5);
        assert!((width - expected * 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_css_perspective() {
        let camera = Camera::new(600.0, 800.0, 2.0);
        let expected = (150.0f32 * 150.0 + 200.0 * 200.0).sqrt() / 25.0f32.to_radians().tan();
        assert!((camera.css_perspective() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_view_matrix_moves_world_back() {
        let camera = Camera::default();
        let point = camera.view_matrix().transform_point(&Point3::origin());
        assert_eq!(point.z, -1.0);
    }
}
