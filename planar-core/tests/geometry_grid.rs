mod common;

use planar_core::gl::GlCall;
use planar_core::PlaneParams;

#[test]
fn test_two_by_two_grid() {
    let (mut renderer, gl) = common::renderer();
    let params = PlaneParams {
        width_segments: 2,
        height_segments: 2,
        ..PlaneParams::default()
    };
    let id = renderer.add_plane(common::element(0.0, 0.0), &params).unwrap();
    let geometry = renderer.plane(id).unwrap().mesh().geometry();
    assert_eq!(geometry.vertex_count(), 2 * 2 * 2 * 3);
    assert_eq!(geometry.data().positions.len(), 24 * 3);

    gl.clear_calls();
    renderer.render();
    assert_eq!(gl.count_calls(|call| matches!(call, GlCall::DrawArrays { count: 24, .. })), 1);
}

#[test]
fn test_equal_grids_share_data() {
    let (mut renderer, _gl) = common::renderer();
    let params = PlaneParams {
        width_segments: 3,
        height_segments: 5,
        ..PlaneParams::default()
    };
    let first = renderer.add_plane(common::element(0.0, 0.0), &params).unwrap();
    let second = renderer.add_plane(common::element(0.0, 0.0), &params).unwrap();
    let first = renderer.plane(first).unwrap().mesh().geometry().data();
    let second = renderer.plane(second).unwrap().mesh().geometry().data();
    assert!(std::rc::Rc::ptr_eq(first, second));
}
