/// Screen space bounds of a transformed plane, for draw checks
///
/// Corners behind the near plane project to garbage X/Y, so they are pulled
/// back along the plane edges until they sit on the near plane again.
use nalgebra::{Matrix4, Vector3};

use crate::dom::{DomBounds, DrawCheckMargins};

/// Unit quad corners: top left, top right, bottom right, bottom left.
pub const PLANE_CORNERS: [[f32; 3]; 4] = [
    [-1.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
];

/// Steps taken at most while walking towards the near plane.
const MAX_STEPS: usize = 1000;

/// Coordinate given to every corner when the whole plane is behind the camera.
const OFF_SCREEN: f32 = 10000.0;

/// Applies `matrix` with the perspective divide; `w == 0` is treated as 1.
pub fn project(matrix: &Matrix4<f32>, point: &Vector3<f32>) -> Vector3<f32> {
    let v = matrix * point.push(1.0);
    let w = if v.w == 0.0 { 1.0 } else { v.w };
    Vector3::new(v.x / w, v.y / w, v.z / w)
}

fn corner(x: f32, y: f32) -> Vector3<f32> {
    Vector3::new(x, y, 0.0)
}

/// Walks from `reference` in steps of `second - reference` until crossing
/// the near plane.
fn intersection(reference: &Vector3<f32>, second: &Vector3<f32>) -> Vector3<f32> {
    let direction = second - reference;
    let mut point = *reference;
    if direction.z >= 0.0 {
        return point;
    }
    let mut steps = 0;
    while point.z > -1.0 && steps < MAX_STEPS {
        point += direction;
        steps += 1;
    }
    point
}

/// Replaces clipped corners with points on the near plane.
///
/// `clipped` lists corner indices in increasing order.
pub fn near_plane_intersections(
    mvp: &Matrix4<f32>,
    corners: &[Vector3<f32>; 4],
    clipped: &[usize],
) -> Vec<Vector3<f32>> {
    let towards = |x: f32, y: f32| project(mvp, &corner(x, y));
    let mut points = corners.to_vec();

    match clipped {
        [0] => {
            points[0] = intersection(&corners[1], &towards(0.95, 1.0));
            points.push(intersection(&corners[3], &towards(-1.0, -0.95)));
        }
        [1] => {
            points[1] = intersection(&corners[0], &towards(-0.95, 1.0));
            points.push(intersection(&corners[2], &towards(1.0, -0.95)));
        }
        [2] => {
            points[2] = intersection(&corners[3], &towards(-0.95, -1.0));
            points.push(intersection(&corners[1], &towards(1.0, 0.95)));
        }
        [3] => {
            points[3] = intersection(&corners[2], &towards(0.95, -1.0));
            points.push(intersection(&corners[0], &towards(-1.0, 0.95)));
        }
        [0, 1] => {
            points[0] = intersection(&corners[3], &towards(-1.0, -0.95));
            points[1] = intersection(&corners[2], &towards(1.0, -0.95));
        }
        [1, 2] => {
            points[1] = intersection(&corners[0], &towards(-0.95, 1.0));
            points[2] = intersection(&corners[3], &towards(-0.95, -1.0));
        }
        [2, 3] => {
            points[2] = intersection(&corners[1], &towards(1.0, 0.95));
            points[3] = intersection(&corners[0], &towards(-1.0, 0.95));
        }
        [0, 3] => {
            points[0] = intersection(&corners[1], &towards(0.95, 1.0));
            points[3] = intersection(&corners[2], &towards(0.95, -1.0));
        }
        [_, _, _] => {
            let visible = (0..4).find(|index| !clipped.contains(index)).unwrap_or(0);
            let origin = corners[visible];
            let (first, second) = match visible {
                0 => (towards(-0.95, 1.0), towards(-1.0, 0.95)),
                1 => (towards(0.95, 1.0), towards(1.0, 0.95)),
                2 => (towards(0.95, -1.0), towards(1.0, -0.95)),
                _ => (towards(-0.95, -1.0), towards(-1.0, -0.95)),
            };
            points = vec![origin, intersection(&origin, &first), intersection(&origin, &second)];
        }
        [_, _, _, _] => {
            for point in &mut points {
                point.x = OFF_SCREEN;
                point.y = OFF_SCREEN;
            }
        }
        _ => {}
    }
    points
}

/// Clip space box of the plane: (top, right, bottom, left).
pub fn clip_space_bounds(mvp: &Matrix4<f32>) -> (f32, f32, f32, f32) {
    let mut corners = [Vector3::zeros(); 4];
    let mut clipped = Vec::new();
    for (index, [x, y, z]) in PLANE_CORNERS.iter().enumerate() {
        corners[index] = project(mvp, &Vector3::new(*x, *y, *z));
        if corners[index].z.abs() > 1.0 {
            clipped.push(index);
        }
    }

    let points = if clipped.is_empty() {
        corners.to_vec()
    } else {
        near_plane_intersections(mvp, &corners, &clipped)
    };

    let mut top = f32::NEG_INFINITY;
    let mut right = f32::NEG_INFINITY;
    let mut bottom = f32::INFINITY;
    let mut left = f32::INFINITY;
    for point in points {
        top = top.max(point.y);
        right = right.max(point.x);
        bottom = bottom.min(point.y);
        left = left.min(point.x);
    }
    (top, right, bottom, left)
}

/// Where the drawn plane lands in the document, in the canvas' pixel space.
pub fn webgl_bounding_rect(mvp: &Matrix4<f32>, canvas: DomBounds) -> DomBounds {
    let (top, right, bottom, left) = clip_space_bounds(mvp);
    let screen_top = 1.0 - (top + 1.0) / 2.0;
    let screen_right = (right + 1.0) / 2.0;
    let screen_bottom = 1.0 - (bottom + 1.0) / 2.0;
    let screen_left = (left + 1.0) / 2.0;

    DomBounds {
        top: screen_top * canvas.height + canvas.top,
        left: screen_left * canvas.width + canvas.left,
        width: (screen_right - screen_left) * canvas.width,
        height: (screen_bottom - screen_top) * canvas.height,
    }
}

/// `rect` grown by the margins.
pub fn draw_rect(rect: DomBounds, margins: &DrawCheckMargins) -> DomBounds {
    DomBounds {
        top: rect.top - margins.top,
        left: rect.left - margins.left,
        width: rect.width + margins.left + margins.right,
        height: rect.height + margins.top + margins.bottom,
    }
}

/// True when the rounded rect does not overlap the canvas at all.
pub fn is_outside(rect: DomBounds, canvas: DomBounds) -> bool {
    rect.right().round() <= canvas.left
        || rect.left.round() >= canvas.right()
        || rect.bottom().round() <= canvas.top
        || rect.top.round() >= canvas.bottom()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Camera;
    use crate::transform::Transform;

    fn full_screen_mvp(camera: &Camera) -> Matrix4<f32> {
        let (width, height) = camera.screen_ratios(0.0);
        camera.projection_matrix()
            * camera.view_matrix()
            * Transform::scale_matrix(width / 2.0, height / 2.0, 1.0)
    }

    #[test]
    fn test_full_screen_plane_covers_canvas() {
        let camera = Camera::new(800.0, 600.0, 1.0);
        let canvas = DomBounds::new(0.0, 0.0, 800.0, 600.0);
        let rect = webgl_bounding_rect(&full_screen_mvp(&camera), canvas);
        assert!(rect.top.abs() < 0.5);
        assert!(rect.left.abs() < 0.5);
        assert!((rect.width - 800.0).abs() < 0.5);
        assert!((rect.height - 600.0).abs() < 0.5);
        assert!(!is_outside(rect, canvas));
    }

    #[test]
    fn test_canvas_offset_applies() {
        let camera = Camera::new(800.0, 600.0, 1.0);
        let canvas = DomBounds::new(100.0, 50.0, 800.0, 600.0);
        let rect = webgl_bounding_rect(&full_screen_mvp(&camera), canvas);
        assert!((rect.top - 100.0).abs() < 0.5);
        assert!((rect.left - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_plane_behind_camera_is_outside() {
        let camera = Camera::new(800.0, 600.0, 1.0);
        let behind = full_screen_mvp(&camera) * Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0));
        let canvas = DomBounds::new(0.0, 0.0, 800.0, 600.0);
        let rect = webgl_bounding_rect(&behind, canvas);
        assert!(is_outside(rect, canvas));
    }

    #[test]
    fn test_margins_bring_plane_back() {
        let canvas = DomBounds::new(0.0, 0.0, 800.0, 600.0);
        let below = DomBounds::new(650.0, 0.0, 100.0, 100.0);
        assert!(is_outside(below, canvas));
        let rect = draw_rect(below, &DrawCheckMargins::uniform(100.0));
        assert!(!is_outside(rect, canvas));
    }

    #[test]
    fn test_single_clipped_corner_adds_point() {
        let camera = Camera::new(800.0, 600.0, 1.0);
        let rotation = nalgebra::UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.2);
        // tilt so the right edge swings towards the camera, past the near plane
        let mvp = full_screen_mvp(&camera)
            * Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.5))
            * rotation.to_homogeneous();
        let mut corners = [Vector3::zeros(); 4];
        for (index, [x, y, z]) in PLANE_CORNERS.iter().enumerate() {
            corners[index] = project(&mvp, &Vector3::new(*x, *y, *z));
        }
        let points = near_plane_intersections(&mvp, &corners, &[1]);
        assert_eq!(points.len(), 5);
        let points = near_plane_intersections(&mvp, &corners, &[0, 1, 2, 3]);
        assert!(points.iter().all(|point| point.x == OFF_SCREEN));
    }
}
