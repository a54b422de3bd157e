/// The drawable core shared by planes and shader passes
///
/// A mesh owns a program, a grid geometry, its textures and uniforms. The
/// higher level objects wrap it and decide where and when it gets drawn.
use std::rc::Rc;

use crate::context::{CullMode, RenderContext};
use crate::error::Result;
use crate::geometry::Geometry;
use crate::program::{Program, ProgramId};
use crate::render_target::RenderTargetId;
use crate::source::MediaSource;
use crate::texture::{SourceEvent, Texture, TextureId, TextureParams};
use crate::uniforms::{UniformDef, Uniforms};

pub const PLANE_VERTEX_SHADER: &str = "precision mediump float;
attribute vec3 aVertexPosition;
attribute vec2 aTextureCoord;
uniform mat4 uMVMatrix;
uniform mat4 uPMatrix;
varying vec3 vVertexPosition;
varying vec2 vTextureCoord;
void main() {
    vTextureCoord = aTextureCoord;
    vVertexPosition = aVertexPosition;
    gl_Position = uPMatrix * uMVMatrix * vec4(aVertexPosition, 1.0);
}
";

pub const PLANE_FRAGMENT_SHADER: &str = "precision mediump float;
varying vec3 vVertexPosition;
varying vec2 vTextureCoord;
void main() {
    gl_FragColor = vec4(0.0, 0.0, 0.0, 1.0);
}
";

pub const PASS_VERTEX_SHADER: &str = "precision mediump float;
attribute vec3 aVertexPosition;
attribute vec2 aTextureCoord;
varying vec3 vVertexPosition;
varying vec2 vTextureCoord;
void main() {
    vTextureCoord = aTextureCoord;
    vVertexPosition = aVertexPosition;
    gl_Position = vec4(aVertexPosition, 1.0);
}
";

pub const PASS_FRAGMENT_SHADER: &str = "precision mediump float;
varying vec3 vVertexPosition;
varying vec2 vTextureCoord;
uniform sampler2D uRenderTexture;
void main() {
    gl_FragColor = texture2D(uRenderTexture, vTextureCoord);
}
";

#[derive(Debug, Clone)]
pub struct MeshParams<'a> {
    pub vertex_shader: &'a str,
    pub fragment_shader: &'a str,
    pub width_segments: u32,
    pub height_segments: u32,
    pub share_program: bool,
    pub uniforms: &'a [(String, UniformDef)],
    pub depth_test: bool,
    pub cull_face: CullMode,
    pub transparent: bool,
    pub visible: bool,
    pub render_target: Option<RenderTargetId>,
}

#[derive(Debug)]
pub struct Mesh {
    program: Program,
    geometry: Geometry,
    textures: Vec<Texture>,
    pub uniforms: Uniforms,
    pub depth_test: bool,
    pub cull_face: CullMode,
    pub visible: bool,
    transparent: bool,
    render_target: Option<RenderTargetId>,
}

impl Mesh {
    pub fn new(ctx: &mut RenderContext, params: &MeshParams<'_>) -> Result<Self> {
        let program = Program::new(
            ctx,
            params.vertex_shader,
            params.fragment_shader,
            params.share_program,
        )?;
        let data = ctx.cache.geometry(params.width_segments, params.height_segments);
        let mut geometry = Geometry::new(data);
        if program.is_compiled() {
            geometry.upload(ctx.gl(), program.compiled().handle())?;
        }

        let mut uniforms = Uniforms::new();
        for (key, def) in params.uniforms {
            uniforms.insert(key.clone(), def.clone(), ctx.diagnostics());
        }

        Ok(Self {
            program,
            geometry,
            textures: Vec::new(),
            uniforms,
            depth_test: params.depth_test,
            cull_face: params.cull_face,
            visible: params.visible,
            transparent: params.transparent,
            render_target: params.render_target,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_id(&self) -> ProgramId {
        self.program.id()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut [Texture] {
        &mut self.textures
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.iter().find(|texture| texture.id() == id)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.iter_mut().find(|texture| texture.id() == id)
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Changing the class moves the mesh between stacks; go through the
    /// renderer so they get rebuilt.
    pub(crate) fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    pub fn render_target(&self) -> Option<RenderTargetId> {
        self.render_target
    }

    pub(crate) fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.render_target = target;
    }

    /// Program linked and buffers uploaded.
    pub fn can_draw(&self) -> bool {
        self.program.is_compiled() && self.geometry.is_uploaded()
    }

    /// Every texture has a valid handle.
    pub fn textures_can_draw(&self) -> bool {
        self.textures.iter().all(Texture::can_draw)
    }

    pub fn is_loading(&self) -> bool {
        self.textures.iter().any(Texture::is_loading)
    }

    /// Next free texture unit.
    pub fn next_unit(&self) -> u32 {
        self.textures.len() as u32
    }

    /// New empty media texture bound to the next unit.
    pub fn create_texture(&mut self, ctx: &mut RenderContext, params: &TextureParams) -> Result<TextureId> {
        let texture = Texture::new(ctx, params, self.next_unit())?;
        let id = texture.id();
        self.textures.push(texture);
        Ok(id)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = texture.id();
        self.textures.push(texture);
        id
    }

    /// Creates a texture and starts waiting for `source`.
    pub fn load_source(
        &mut self,
        ctx: &mut RenderContext,
        source: Rc<dyn MediaSource>,
        params: &TextureParams,
        on_success: Option<Box<dyn FnOnce(&Texture)>>,
        on_error: Option<Box<dyn FnOnce(&crate::error::PlanarError)>>,
    ) -> Result<TextureId> {
        let id = self.create_texture(ctx, params)?;
        if let Some(texture) = self.texture_mut(id) {
            texture.load_source(source, on_success, on_error);
        }
        Ok(id)
    }

    pub fn poll_sources(&mut self, ctx: &mut RenderContext) -> Vec<SourceEvent> {
        self.textures
            .iter_mut()
            .filter_map(|texture| texture.poll_source(ctx))
            .collect()
    }

    pub fn resize_textures(&mut self, width: f32, height: f32) {
        for texture in &mut self.textures {
            texture.resize(width, height);
        }
    }

    /// Sets the global state, uploads uniforms, binds the buffers and every
    /// sampled texture, then draws. Nothing is drawn when a sampled texture
    /// cannot be bound.
    pub fn draw(&mut self, ctx: &RenderContext) -> bool {
        if !self.can_draw() {
            return false;
        }
        ctx.set_blending(self.transparent);
        ctx.set_depth_test(self.depth_test);
        ctx.set_face_culling(self.cull_face);

        let program = self.program.compiled();
        ctx.use_program(program.handle());
        self.uniforms.update(ctx.gl(), program, ctx.diagnostics());
        self.geometry.bind(ctx.gl());

        for texture in &mut self.textures {
            if program.uses_sampler(texture.sampler_name()) && !texture.draw(ctx, program) {
                return false;
            }
        }

        self.geometry.draw(ctx.gl());
        true
    }

    /// Links the program again, rebuilds the buffers and the textures.
    ///
    /// Every part is attempted even when an earlier one fails; the first
    /// error is returned.
    pub fn restore(&mut self, ctx: &mut RenderContext) -> Result<()> {
        let mut result = self.program.restore(ctx);
        if self.program.is_compiled() {
            let handle = self.program.compiled().handle();
            result = result.and(self.geometry.restore(ctx.gl(), handle));
        }
        for texture in &mut self.textures {
            result = result.and(texture.restore(ctx));
        }
        self.uniforms.invalidate();
        result
    }

    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        if !ctx.is_lost() {
            self.geometry.dispose(ctx.gl());
        }
        for texture in &mut self.textures {
            texture.dispose(ctx, false);
        }
        self.textures.clear();
        self.program.dispose(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::error::PlanarError;
    use crate::gl::{GlCall, GlContext, GlVersion, HeadlessGl};
    use crate::source::PixelSource;
    use crate::uniforms::UniformValue;

    const TEXTURED_FRAGMENT: &str = "precision mediump float;
varying vec2 vTextureCoord;
uniform sampler2D uSampler0;
uniform float uTime;
void main() {
    gl_FragColor = texture2D(uSampler0, vTextureCoord);
}
";

    fn params<'a>(fragment: &'a str, uniforms: &'a [(String, UniformDef)]) -> MeshParams<'a> {
        MeshParams {
            vertex_shader: PLANE_VERTEX_SHADER,
            fragment_shader: fragment,
            width_segments: 1,
            height_segments: 1,
            share_program: false,
            uniforms,
            depth_test: true,
            cull_face: CullMode::Back,
            transparent: false,
            visible: true,
            render_target: None,
        }
    }

    #[test]
    fn test_draw_uploads_uniforms_once() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        let uniforms = vec![("time".to_string(), UniformDef::new("uTime", 0.0f32))];
        let mut mesh = Mesh::new(&mut ctx, &params(TEXTURED_FRAGMENT, &uniforms)).unwrap();
        mesh.create_texture(&mut ctx, &TextureParams::default()).unwrap();
        assert!(mesh.can_draw());

        assert!(mesh.draw(&ctx));
        assert!(mesh.draw(&ctx));
        assert_eq!(gl.uniform_uploads("uTime"), 1);

        mesh.uniforms.set("time", 1.5f32);
        assert!(mesh.draw(&ctx));
        assert_eq!(gl.uniform_uploads("uTime"), 2);
        assert_eq!(mesh.uniforms.get("time"), Some(&UniformValue::Float(1.5)));
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::DrawArrays { count: 6, .. })), 3);
    }

    #[test]
    fn test_broken_shader_cannot_draw() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        let mut mesh = Mesh::new(&mut ctx, &params("#error nope\n", &[])).unwrap();
        assert!(!mesh.can_draw());
        assert!(!mesh.draw(&ctx));
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::DrawArrays { .. })), 0);
    }

    #[test]
    fn test_invalid_sampled_texture_skips_draw() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        let mut mesh = Mesh::new(&mut ctx, &params(TEXTURED_FRAGMENT, &[])).unwrap();
        let origin = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        let copy = Texture::new_copy(&mut ctx, &origin, &TextureParams::default(), 0);
        mesh.add_texture(copy);
        let mut origin = origin;
        origin.dispose(&mut ctx, true);
        assert!(!mesh.draw(&ctx));
        assert!(!mesh.textures_can_draw());
    }

    #[test]
    fn test_restore_continues_past_failed_texture() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        let mut mesh = Mesh::new(&mut ctx, &params(TEXTURED_FRAGMENT, &[])).unwrap();
        mesh.create_texture(&mut ctx, &TextureParams::default()).unwrap();
        mesh.create_texture(&mut ctx, &TextureParams::default()).unwrap();

        gl.lose_context();
        ctx.mark_lost();
        gl.restore_context();
        ctx.restore();
        gl.fail_next_textures(1);

        assert!(matches!(
            mesh.restore(&mut ctx),
            Err(PlanarError::ResourceCreation("texture"))
        ));
        assert!(mesh.program().is_compiled());
        assert!(mesh.textures()[0].handle().is_none());
        let second = mesh.textures()[1].handle().unwrap();
        assert!(gl.is_texture_live(second));
    }

    #[test]
    fn test_load_source_resolves_on_poll() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl, RendererConfig::default());
        let mut mesh = Mesh::new(&mut ctx, &params(TEXTURED_FRAGMENT, &[])).unwrap();
        let source = Rc::new(PixelSource::image("cat.png", 16, 16).loading());
        let id = mesh
            .load_source(&mut ctx, source.clone(), &TextureParams::default(), None, None)
            .unwrap();
        assert!(mesh.is_loading());
        assert!(mesh.poll_sources(&mut ctx).is_empty());

        source.finish_loading();
        assert_eq!(mesh.poll_sources(&mut ctx), vec![SourceEvent::Loaded(id)]);
        assert!(!mesh.is_loading());
        assert_eq!(mesh.texture(id).map(Texture::size), Some((16, 16)));
    }
}
