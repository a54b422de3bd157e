mod common;

use planar_core::gl::{FramebufferHandle, GlCall, HeadlessGl, ProgramHandle};
use planar_core::{PlaneParams, RenderTargetParams, Renderer, ShaderPassId, ShaderPassParams};

fn shared() -> PlaneParams {
    PlaneParams {
        share_program: true,
        ..PlaneParams::default()
    }
}

fn transparent() -> PlaneParams {
    PlaneParams {
        transparent: true,
        ..shared()
    }
}

#[derive(Debug, PartialEq)]
enum Step {
    Bind(Option<FramebufferHandle>),
    Draw(ProgramHandle),
}

fn steps(gl: &HeadlessGl) -> Vec<Step> {
    gl.calls()
        .into_iter()
        .filter_map(|call| match call {
            GlCall::BindFramebuffer(framebuffer) => Some(Step::Bind(framebuffer)),
            GlCall::DrawArrays { program, .. } => program.map(Step::Draw),
            _ => None,
        })
        .collect()
}

fn pass_program(renderer: &Renderer, id: ShaderPassId) -> ProgramHandle {
    renderer.shader_pass(id).unwrap().mesh().program().compiled().handle()
}

#[test]
fn test_scene_pass_chain() {
    let (mut renderer, gl) = common::renderer();
    let target = renderer.add_render_target(RenderTargetParams::default()).unwrap();
    let onscreen = renderer.add_plane(common::element(0.0, 0.0), &PlaneParams::default()).unwrap();
    let offscreen = PlaneParams {
        render_target: Some(target),
        ..PlaneParams::default()
    };
    let offscreen = renderer.add_plane(common::element(0.0, 0.0), &offscreen).unwrap();
    let first = renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
    let second = renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
    let reader = ShaderPassParams {
        render_target: Some(target),
        ..ShaderPassParams::default()
    };
    let reader = renderer.add_shader_pass(&reader).unwrap();

    assert_eq!(renderer.scene().scene_passes(), &[0, 1]);
    assert_eq!(renderer.scene().render_passes(), &[2]);

    let framebuffer = |id| renderer.render_target(id).unwrap().framebuffer();
    let first_target = framebuffer(renderer.shader_pass(first).unwrap().target_id());
    let second_target = framebuffer(renderer.shader_pass(second).unwrap().target_id());
    let user_target = framebuffer(target);
    assert!(first_target.is_some() && second_target.is_some() && user_target.is_some());
    let plane_program = |id| renderer.plane(id).unwrap().mesh().program().compiled().handle();
    let expected = vec![
        Step::Draw(plane_program(onscreen)),
        Step::Bind(user_target),
        Step::Draw(plane_program(offscreen)),
        // render passes draw into the head of the chain
        Step::Bind(first_target),
        Step::Draw(pass_program(&renderer, reader)),
        Step::Bind(second_target),
        Step::Draw(pass_program(&renderer, first)),
        Step::Bind(None),
        Step::Draw(pass_program(&renderer, second)),
    ];

    renderer.render();
    gl.clear_calls();
    renderer.render();
    assert_eq!(steps(&gl), expected);
}

#[test]
fn test_scene_passes_without_render_passes() {
    let (mut renderer, gl) = common::renderer();
    let plane = renderer.add_plane(common::element(0.0, 0.0), &PlaneParams::default()).unwrap();
    let first = renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
    let second = renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
    let framebuffer = |id| renderer.render_target(id).unwrap().framebuffer();
    let first_target = framebuffer(renderer.shader_pass(first).unwrap().target_id());
    let second_target = framebuffer(renderer.shader_pass(second).unwrap().target_id());
    let expected = vec![
        Step::Bind(first_target),
        Step::Draw(renderer.plane(plane).unwrap().mesh().program().compiled().handle()),
        Step::Bind(second_target),
        Step::Draw(pass_program(&renderer, first)),
        Step::Bind(None),
        Step::Draw(pass_program(&renderer, second)),
    ];

    renderer.render();
    gl.clear_calls();
    renderer.render();
    assert_eq!(steps(&gl), expected);
}

#[test]
fn test_same_program_draw_order() {
    let (mut renderer, _gl) = common::renderer();
    let opaque: Vec<_> = (0..3)
        .map(|_| renderer.add_plane(common::element(0.0, 0.0), &shared()).unwrap())
        .collect();
    let clear: Vec<_> = (0..3)
        .map(|_| renderer.add_plane(common::element(0.0, 0.0), &transparent()).unwrap())
        .collect();

    // registry indices follow creation order
    assert_eq!(renderer.scene().opaque().draw_order(), vec![0, 1, 2]);
    assert_eq!(renderer.scene().transparent().draw_order(), vec![5, 4, 3]);

    renderer.remove_plane(opaque[1]).unwrap();
    renderer.remove_plane(clear[0]).unwrap();
    assert_eq!(renderer.scene().opaque().draw_order(), vec![0, 1]);
    assert_eq!(renderer.scene().transparent().draw_order(), vec![3, 2]);
    let ids: Vec<_> = renderer.planes().map(|plane| plane.id()).collect();
    assert_eq!(ids, vec![opaque[0], opaque[2], clear[1], clear[2]]);
}

#[test]
fn test_move_to_front_draws_last() {
    let (mut renderer, gl) = common::renderer();
    let ids: Vec<_> = (0..3)
        .map(|_| renderer.add_plane(common::element(0.0, 0.0), &transparent()).unwrap())
        .collect();

    renderer.move_plane_to_front(ids[2]).unwrap();
    let once = renderer.scene().transparent().draw_order();
    assert_eq!(once.last(), Some(&2));
    assert!(!renderer.plane(ids[2]).unwrap().depth_test());

    renderer.move_plane_to_front(ids[2]).unwrap();
    assert_eq!(renderer.scene().transparent().draw_order(), once);

    gl.clear_calls();
    renderer.render();
    assert_eq!(gl.draw_order().len(), 3);
}

#[test]
fn test_programs_are_grouped() {
    let (mut renderer, gl) = common::renderer();
    let tinted = PlaneParams {
        fragment_shader: Some(
            "precision mediump float;\nvoid main() {\n    gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0);\n}\n".into(),
        ),
        share_program: true,
        ..PlaneParams::default()
    };
    renderer.add_plane(common::element(0.0, 0.0), &shared()).unwrap();
    renderer.add_plane(common::element(0.0, 0.0), &tinted).unwrap();
    renderer.add_plane(common::element(0.0, 0.0), &shared()).unwrap();
    assert_eq!(renderer.scene().opaque().draw_order(), vec![0, 2, 1]);

    gl.clear_calls();
    renderer.render();
    let programs = gl.draw_order();
    assert_eq!(programs.len(), 3);
    assert_eq!(programs[0], programs[1]);
    assert_ne!(programs[1], programs[2]);
}

#[test]
fn test_transparency_switch_moves_stack() {
    let (mut renderer, _gl) = common::renderer();
    let id = renderer.add_plane(common::element(0.0, 0.0), &PlaneParams::default()).unwrap();
    renderer.set_plane_transparent(id, true).unwrap();
    assert!(renderer.scene().opaque().is_empty());
    assert_eq!(renderer.scene().transparent().draw_order(), vec![0]);
}

#[test]
fn test_rebuild_forgets_move_to_front() {
    let (mut renderer, _gl) = common::renderer();
    let ids: Vec<_> = (0..3)
        .map(|_| renderer.add_plane(common::element(0.0, 0.0), &transparent()).unwrap())
        .collect();
    let extra = renderer.add_plane(common::element(0.0, 0.0), &PlaneParams::default()).unwrap();

    renderer.move_plane_to_front(ids[2]).unwrap();
    assert_eq!(renderer.scene().transparent().draw_order(), vec![1, 0, 2]);

    renderer.remove_plane(extra).unwrap();
    assert_eq!(renderer.scene().transparent().draw_order(), vec![2, 1, 0]);
}
