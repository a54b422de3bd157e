/// Plane transforms: rotation, scale, translation and pivot
use nalgebra::{Matrix4, UnitQuaternion, Vector3};

/// Euler rotation around three axes (in radians), applied in XYZ order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        let qx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.x);
        let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.y);
        let qz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.z);
        qx * qy * qz
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Transform state of a plane.
///
/// `translation` is in CSS pixels, `origin` is relative to the plane box
/// (0,0 top left, 1,1 bottom right, z in world units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: RotationState,
    pub scale: Vector3<f32>,
    pub translation: Vector3<f32>,
    pub origin: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotation: RotationState::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            translation: Vector3::zeros(),
            origin: Vector3::new(0.5, 0.5, 0.0),
        }
    }
}

impl Transform {
    /// `T(translation) * T(origin) * R * S * T(-origin)`
    pub fn compose_from_origin(
        translation: &Vector3<f32>,
        rotation: &UnitQuaternion<f32>,
        scale: &Vector3<f32>,
        origin: &Vector3<f32>,
    ) -> Matrix4<f32> {
        Matrix4::new_translation(translation)
            * Matrix4::new_translation(origin)
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(scale)
            * Matrix4::new_translation(&-origin)
    }

    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_order_is_xyz() {
        let state = RotationState::new(std::f32::consts::FRAC_PI_2, 0.0, std::f32::consts::FRAC_PI_2);
        // z turns x onto y first, then x turns y onto z
        let turned = state.quaternion() * Vector3::x();
        assert!((turned - Vector3::z()).norm() < 1e-5);
    }

    #[test]
    fn test_identity_rotation() {
        let matrix = RotationState::zero().quaternion().to_homogeneous();
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_rotation_about_origin_keeps_pivot() {
        let origin = Vector3::new(1.0, 1.0, 0.0);
        let rotation = RotationState::new(0.0, 0.0, std::f32::consts::FRAC_PI_2).quaternion();
        let matrix = Transform::compose_from_origin(
            &Vector3::zeros(),
            &rotation,
            &Vector3::new(2.0, 2.0, 1.0),
            &origin,
        );
        let pivot = matrix.transform_point(&origin.into());
        assert!((pivot.coords - origin).norm() < 1e-5);

        let moved = matrix.transform_point(&nalgebra::Point3::new(2.0, 1.0, 0.0));
        // (1,0) from the pivot, scaled by 2 then turned a quarter
        assert!((moved.x - 1.0).abs() < 1e-5);
        assert!((moved.y - 3.0).abs() < 1e-5);
    }
}
