mod common;

use std::cell::Cell;
use std::rc::Rc;

use planar_core::{DrawCheckMargins, PlaneParams};

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    (Rc::clone(&count), count)
}

#[test]
fn test_scrolling_into_view_fires_once() {
    let (mut renderer, gl) = common::renderer();
    let id = renderer.add_plane(common::element(2000.0, 100.0), &PlaneParams::default()).unwrap();
    let (entered, seen_enter) = counter();
    let (left, seen_leave) = counter();
    renderer
        .plane_mut(id)
        .unwrap()
        .on_re_enter_view(move |_| seen_enter.set(seen_enter.get() + 1))
        .on_leave_view(move |_| seen_leave.set(seen_leave.get() + 1));

    gl.clear_calls();
    renderer.render();
    renderer.render();
    assert!(!renderer.plane(id).unwrap().is_drawn());
    assert!(gl.draw_order().is_empty());
    assert_eq!(left.get(), 1);

    // page scrolled down by 1500 css pixels, the element moved up as much
    renderer.update_scroll_values(0.0, 1500.0);
    renderer.render();
    assert!(renderer.plane(id).unwrap().is_drawn());
    renderer.render();
    renderer.render();
    assert_eq!(entered.get(), 1);
    assert_eq!(left.get(), 1);
    assert_eq!(gl.draw_order().len(), 3);
}

#[test]
fn test_margins_keep_plane_drawn() {
    let (mut renderer, _gl) = common::renderer();
    let params = PlaneParams {
        draw_check_margins: DrawCheckMargins {
            top: 100.0,
            ..DrawCheckMargins::default()
        },
        ..PlaneParams::default()
    };
    // 50 pixels below the canvas
    let id = renderer.add_plane(common::element(650.0, 100.0), &params).unwrap();
    renderer.render();
    assert!(renderer.plane(id).unwrap().is_drawn());

    let plain = renderer
        .add_plane(common::element(650.0, 100.0), &PlaneParams::default())
        .unwrap();
    renderer.render();
    assert!(!renderer.plane(plain).unwrap().is_drawn());
}

#[test]
fn test_always_drawn_plane_skips_culling() {
    let (mut renderer, _gl) = common::renderer();
    let params = PlaneParams {
        always_draw: true,
        ..PlaneParams::default()
    };
    let id = renderer.add_plane(common::element(5000.0, 100.0), &params).unwrap();
    renderer.render();
    assert!(renderer.plane(id).unwrap().is_drawn());
}

#[test]
fn test_unwatched_plane_ignores_scroll() {
    let (mut renderer, _gl) = common::renderer();
    let params = PlaneParams {
        watch_scroll: Some(false),
        ..PlaneParams::default()
    };
    let id = renderer.add_plane(common::element(100.0, 100.0), &params).unwrap();
    let before = renderer.plane(id).unwrap().get_bounding_rect();
    renderer.update_scroll_values(0.0, 50.0);
    assert_eq!(renderer.plane(id).unwrap().get_bounding_rect(), before);
    assert_eq!(renderer.scroll_values(), (0.0, 50.0));
}
