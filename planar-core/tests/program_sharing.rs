mod common;

use planar_core::gl::GlCall;
use planar_core::PlaneParams;

const VERTEX: &str = "precision mediump float;
attribute vec3 aVertexPosition;
attribute vec2 aTextureCoord;
uniform mat4 uMVMatrix;
uniform mat4 uPMatrix;
varying vec2 vTextureCoord;
void main() {
    gl_Position = uPMatrix * uMVMatrix * vec4(aVertexPosition, 1.0);
    vTextureCoord = aTextureCoord;
}
";

const FRAGMENT: &str = "precision mediump float;
varying vec2 vTextureCoord;
uniform float uTime;
void main() {
    gl_FragColor = vec4(vTextureCoord, sin(uTime), 1.0);
}
";

fn params(share_program: bool) -> PlaneParams {
    PlaneParams {
        vertex_shader: Some(VERTEX.into()),
        fragment_shader: Some(FRAGMENT.into()),
        share_program,
        ..PlaneParams::default()
    }
}

#[test]
fn test_shared_program_has_one_id() {
    let (mut renderer, _gl) = common::renderer();
    let first = renderer.add_plane(common::element(0.0, 0.0), &params(true)).unwrap();
    let second = renderer.add_plane(common::element(0.0, 0.0), &params(true)).unwrap();
    let first = renderer.plane(first).unwrap().mesh().program_id();
    let second = renderer.plane(second).unwrap().mesh().program_id();
    assert_eq!(first, second);
    assert_eq!(renderer.scene().opaque().order().len(), 1);
}

#[test]
fn test_unshared_program_reuses_shaders() {
    let (mut renderer, gl) = common::renderer();
    gl.clear_calls();
    let first = renderer.add_plane(common::element(0.0, 0.0), &params(false)).unwrap();
    let second = renderer.add_plane(common::element(0.0, 0.0), &params(false)).unwrap();
    let first = renderer.plane(first).unwrap().mesh().program_id();
    let second = renderer.plane(second).unwrap().mesh().program_id();
    assert_ne!(first, second);
    assert_eq!(gl.count_calls(|call| matches!(call, GlCall::CompileShader(_))), 2);
    assert_eq!(gl.count_calls(|call| matches!(call, GlCall::LinkProgram(_))), 2);
}

#[test]
fn test_shared_uniforms_upload_per_plane() {
    let (mut renderer, gl) = common::renderer();
    let first = renderer.add_plane(common::element(0.0, 0.0), &params(true)).unwrap();
    let second = renderer.add_plane(common::element(0.0, 0.0), &params(true)).unwrap();
    for id in [first, second] {
        let plane = renderer.plane_mut(id).unwrap();
        plane.mesh_mut().uniforms.insert(
            "time",
            planar_core::UniformDef::new("uTime", 0.0f32),
            &planar_core::Diagnostics::default(),
        );
    }
    renderer.render();
    gl.clear_calls();
    renderer.render();
    // values did not change, but the program is shared by both planes
    assert_eq!(gl.uniform_uploads("uTime"), 2);
}
