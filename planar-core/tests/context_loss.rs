mod common;

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use planar_core::geometry::GeometryId;
use planar_core::gl::GlContext;
use planar_core::{PixelSource, PlaneParams, ShaderPassParams};

#[test]
fn test_loss_and_restore_round_trip() {
    let (mut renderer, gl) = common::renderer();
    let params = PlaneParams {
        share_program: true,
        ..PlaneParams::default()
    };
    let plane = renderer.add_plane(common::element(0.0, 0.0), &params).unwrap();
    let pass = renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
    let (owner, ctx) = renderer.plane_context(plane).unwrap();
    let texture = owner
        .load_source(ctx, Rc::new(PixelSource::image("https://example.com/a.png", 16, 16)), None, None)
        .unwrap();
    renderer.render();
    renderer.render();

    let cache = renderer.context().unwrap().cache();
    let programs_before: HashSet<_> = cache.program_handles().into_iter().collect();
    let textures_before: HashSet<_> = cache.texture_handles().into_iter().collect();
    assert!(!programs_before.is_empty());
    assert_eq!(textures_before.len(), 1);
    let geometries = cache.geometry_count();

    let lost = Rc::new(Cell::new(0));
    let restored = Rc::new(Cell::new(0));
    let (seen_lost, seen_restored) = (Rc::clone(&lost), Rc::clone(&restored));
    renderer
        .on_context_lost(move |_| seen_lost.set(seen_lost.get() + 1))
        .on_context_restored(move |_| seen_restored.set(seen_restored.get() + 1));

    assert!(renderer.lose_context());
    assert!(gl.is_context_lost());
    assert!(renderer.is_context_lost());
    // a second loss notification is ignored
    assert!(!renderer.context_lost());
    renderer.render();
    assert_eq!(lost.get(), 1);

    gl.clear_calls();
    renderer.render();
    assert!(gl.draw_order().is_empty());

    assert!(renderer.restore_context());
    assert!(renderer.is_context_lost());
    // the backend's restored event
    renderer.context_restored();
    assert!(renderer.is_context_lost());
    let cache = renderer.context().unwrap().cache();
    let programs_after: HashSet<_> = cache.program_handles().into_iter().collect();
    let textures_after: HashSet<_> = cache.texture_handles().into_iter().collect();
    assert!(programs_before.is_disjoint(&programs_after));
    assert!(textures_before.is_disjoint(&textures_after));
    assert_eq!(cache.geometry_count(), geometries);
    assert!(cache.has_geometry(GeometryId::from_segments(1, 1)));

    renderer.render();
    assert_eq!(restored.get(), 1);
    assert!(!renderer.is_context_lost());

    let plane = renderer.plane(plane).unwrap();
    assert!(plane.can_draw());
    assert!(plane.texture(texture).unwrap().can_draw());
    assert!(renderer.shader_pass(pass).unwrap().can_draw());
    assert!(renderer.render_targets().iter().all(|target| target.can_draw()));

    gl.clear_calls();
    renderer.render();
    assert_eq!(gl.draw_order().len(), 2);
    assert_eq!(restored.get(), 1);
}

#[test]
fn test_restored_event_waits_for_the_backend() {
    let (mut renderer, gl) = common::renderer();
    let params = PlaneParams {
        share_program: true,
        ..PlaneParams::default()
    };
    renderer.add_plane(common::element(0.0, 0.0), &params).unwrap();
    renderer.render();
    let programs_before: HashSet<_> = renderer.context().unwrap().cache().program_handles().into_iter().collect();

    let restored = Rc::new(Cell::new(0));
    let seen_restored = Rc::clone(&restored);
    renderer.on_context_restored(move |_| seen_restored.set(seen_restored.get() + 1));

    gl.lose_context();
    assert!(renderer.context_lost());
    // an early restored notification leaves everything lost
    renderer.context_restored();
    assert!(renderer.is_context_lost());
    let programs_waiting: HashSet<_> = renderer.context().unwrap().cache().program_handles().into_iter().collect();
    assert_eq!(programs_waiting, programs_before);
    renderer.render();
    assert_eq!(restored.get(), 0);

    assert!(gl.restore_context());
    renderer.context_restored();
    renderer.render();
    assert_eq!(restored.get(), 1);
    assert!(!renderer.is_context_lost());

    let programs_after: HashSet<_> = renderer.context().unwrap().cache().program_handles().into_iter().collect();
    assert!(!programs_after.is_empty());
    assert!(programs_before.is_disjoint(&programs_after));

    gl.clear_calls();
    renderer.render();
    let drawn = gl.draw_order();
    assert_eq!(drawn.len(), 1);
    for program in drawn {
        let program = program.unwrap();
        assert!(programs_after.contains(&program));
        assert!(gl.is_program_live(program));
    }
}

#[test]
fn test_loss_while_disposing_is_ignored() {
    let (mut renderer, _gl) = common::renderer();
    renderer.add_plane(common::element(0.0, 0.0), &PlaneParams::default()).unwrap();
    renderer.dispose();
    assert!(!renderer.context_lost());
    assert!(!renderer.is_context_lost());
}
