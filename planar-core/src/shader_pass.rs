/// Full screen post processing passes
///
/// A pass samples its render target through `uRenderTexture`. Scene passes
/// own a target the planes draw into and chain into each other, the last one
/// drawing to the canvas. Render passes read a target chosen by the caller.
use std::fmt;
use std::rc::Rc;

use crate::context::{CullMode, RenderContext};
use crate::drawable::{DrawContext, Drawable};
use crate::error::{PlanarError, Result};
use crate::mesh::{Mesh, MeshParams, PASS_FRAGMENT_SHADER, PASS_VERTEX_SHADER};
use crate::plane::PlaneEvent;
use crate::render_target::{RenderTarget, RenderTargetId};
use crate::source::MediaSource;
use crate::texture::{SourceEvent, Texture, TextureId, TextureParams};
use crate::uniforms::UniformDef;

pub const RENDER_TEXTURE_SAMPLER: &str = "uRenderTexture";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderPassId(pub u32);

impl fmt::Display for ShaderPassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderPass: {}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ShaderPassParams {
    pub vertex_shader: Option<String>,
    pub fragment_shader: Option<String>,
    pub uniforms: Vec<(String, UniformDef)>,
    /// Read this target instead of creating one; makes it a render pass.
    pub render_target: Option<RenderTargetId>,
    /// Depth buffer on the target created for a scene pass.
    pub depth: bool,
    pub depth_test: bool,
    pub visible: bool,
    /// Used for textures the pass creates.
    pub texture: TextureParams,
}

impl Default for ShaderPassParams {
    fn default() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            uniforms: Vec::new(),
            render_target: None,
            depth: false,
            depth_test: false,
            visible: true,
            texture: TextureParams::default(),
        }
    }
}

type PassCallback = Box<dyn FnMut(&mut ShaderPass)>;

#[derive(Default)]
struct PassHandlers {
    ready: Option<PassCallback>,
    render: Option<PassCallback>,
    after_render: Option<PassCallback>,
    error: Option<Box<dyn FnMut(&mut ShaderPass, &PlanarError)>>,
}

pub struct ShaderPass {
    id: ShaderPassId,
    mesh: Mesh,
    target: RenderTargetId,
    scene_pass: bool,
    render_texture: TextureId,
    texture_params: TextureParams,
    ready_fired: bool,
    handlers: PassHandlers,
}

impl fmt::Debug for ShaderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderPass")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("scene_pass", &self.scene_pass)
            .field("mesh", &self.mesh)
            .finish()
    }
}

impl ShaderPass {
    /// `scene_pass` is true when `target` was created for this pass.
    pub fn new(
        ctx: &mut RenderContext,
        target: &RenderTarget,
        scene_pass: bool,
        params: &ShaderPassParams,
    ) -> Result<Self> {
        let id = ShaderPassId(ctx.next_id());
        let mesh_params = MeshParams {
            vertex_shader: params.vertex_shader.as_deref().unwrap_or(PASS_VERTEX_SHADER),
            fragment_shader: params
                .fragment_shader
                .as_deref()
                .unwrap_or(PASS_FRAGMENT_SHADER),
            width_segments: 1,
            height_segments: 1,
            share_program: false,
            uniforms: &params.uniforms,
            depth_test: params.depth_test,
            cull_face: CullMode::Back,
            transparent: false,
            visible: params.visible,
            render_target: None,
        };
        let mut mesh = Mesh::new(ctx, &mesh_params)?;
        if let Some(error) = mesh.program().compiled().error() {
            ctx.push_event(id, PlaneEvent::Error(error.clone()));
        }

        let copy_params = params.texture.clone().with_sampler(RENDER_TEXTURE_SAMPLER);
        let render_texture = Texture::new_copy(ctx, target.texture(), &copy_params, mesh.next_unit());
        let render_texture = mesh.add_texture(render_texture);

        log::debug!("{id} reads {}", target.id());
        Ok(Self {
            id,
            mesh,
            target: target.id(),
            scene_pass,
            render_texture,
            texture_params: params.texture.clone(),
            ready_fired: false,
            handlers: PassHandlers::default(),
        })
    }

    pub fn id(&self) -> ShaderPassId {
        self.id
    }

    /// Target this pass samples from.
    pub fn target_id(&self) -> RenderTargetId {
        self.target
    }

    pub fn is_scene_pass(&self) -> bool {
        self.scene_pass
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    /// The copy of the target texture bound to `uRenderTexture`.
    pub fn render_texture(&self) -> Option<&Texture> {
        self.mesh.texture(self.render_texture)
    }

    pub fn can_draw(&self) -> bool {
        self.mesh.can_draw()
    }

    pub fn is_drawn(&self) -> bool {
        self.can_draw() && self.mesh.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.mesh.visible = visible;
    }

    pub fn load_source(
        &mut self,
        ctx: &mut RenderContext,
        source: Rc<dyn MediaSource>,
        on_success: Option<Box<dyn FnOnce(&Texture)>>,
        on_error: Option<Box<dyn FnOnce(&PlanarError)>>,
    ) -> Result<TextureId> {
        let params = self.texture_params.clone();
        self.mesh.load_source(ctx, source, &params, on_success, on_error)
    }

    pub fn poll_sources(&mut self, ctx: &mut RenderContext) {
        for event in self.mesh.poll_sources(ctx) {
            let event = match event {
                SourceEvent::Loaded(texture) => PlaneEvent::Loading(texture),
                SourceEvent::Failed(_, error) => PlaneEvent::Error(error),
            };
            ctx.push_event(self.id, event);
        }
        if !self.ready_fired && self.can_draw() && !self.mesh.is_loading() {
            self.ready_fired = true;
            ctx.push_event(self.id, PlaneEvent::Ready);
        }
    }

    /// Size of the target after a canvas resize.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.mesh.resize_textures(width, height);
    }

    pub fn on_ready(&mut self, callback: impl FnMut(&mut ShaderPass) + 'static) -> &mut Self {
        self.handlers.ready = Some(Box::new(callback));
        self
    }

    pub fn on_render(&mut self, callback: impl FnMut(&mut ShaderPass) + 'static) -> &mut Self {
        self.handlers.render = Some(Box::new(callback));
        self
    }

    pub fn on_after_render(&mut self, callback: impl FnMut(&mut ShaderPass) + 'static) -> &mut Self {
        self.handlers.after_render = Some(Box::new(callback));
        self
    }

    pub fn on_error(&mut self, callback: impl FnMut(&mut ShaderPass, &PlanarError) + 'static) -> &mut Self {
        self.handlers.error = Some(Box::new(callback));
        self
    }

    fn run(&mut self, slot: fn(&mut PassHandlers) -> &mut Option<PassCallback>) {
        if let Some(mut callback) = slot(&mut self.handlers).take() {
            callback(self);
            let current = slot(&mut self.handlers);
            if current.is_none() {
                *current = Some(callback);
            }
        }
    }

    /// Passes have no view events; those are ignored.
    pub fn fire(&mut self, event: &PlaneEvent) {
        match event {
            PlaneEvent::Ready => self.run(|handlers| &mut handlers.ready),
            PlaneEvent::Error(error) => {
                if let Some(mut callback) = self.handlers.error.take() {
                    callback(self, error);
                    if self.handlers.error.is_none() {
                        self.handlers.error = Some(callback);
                    }
                }
            }
            PlaneEvent::Loading(_) | PlaneEvent::ReEnterView | PlaneEvent::LeaveView => {}
        }
    }

    pub fn restore(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.mesh.restore(ctx)
    }

    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        self.mesh.dispose(ctx);
    }
}

impl Drawable for ShaderPass {
    fn can_draw(&self) -> bool {
        ShaderPass::can_draw(self)
    }

    fn is_drawn(&self) -> bool {
        ShaderPass::is_drawn(self)
    }

    /// Scene passes write into the next pass of the chain, the last one into
    /// the canvas. Render passes outside the chain write into the canvas.
    fn start_drawing(&mut self, frame: &mut DrawContext<'_>) {
        if self.scene_pass {
            let index = frame.ctx.scene_pass_index().unwrap_or(0);
            let next = frame
                .scene_targets
                .get(index + 1)
                .and_then(|id| frame.target(*id));
            match next {
                Some(target) => frame.ctx.bind_frame_buffer(Some(target), false),
                None => frame.ctx.bind_frame_buffer(None, false),
            }
        } else if frame.ctx.scene_pass_index().is_none() {
            frame.ctx.bind_frame_buffer(None, false);
        }
        self.run(|handlers| &mut handlers.render);
    }

    fn draw(&mut self, frame: &mut DrawContext<'_>) {
        self.mesh.draw(frame.ctx);
        self.run(|handlers| &mut handlers.after_render);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::context::FrameBufferBinding;
    use crate::dom::DomBounds;
    use crate::drawable::render;
    use crate::gl::{GlVersion, HeadlessGl};
    use crate::render_target::RenderTargetParams;

    fn context() -> RenderContext {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl, RendererConfig::default());
        ctx.set_bounds(DomBounds::new(0.0, 0.0, 320.0, 240.0));
        ctx
    }

    #[test]
    fn test_samples_target_through_copy() {
        let mut ctx = context();
        let target = RenderTarget::new(&mut ctx, RenderTargetParams::default()).unwrap();
        let pass = ShaderPass::new(&mut ctx, &target, true, &ShaderPassParams::default()).unwrap();
        let texture = pass.render_texture().unwrap();
        assert_eq!(texture.sampler_name(), RENDER_TEXTURE_SAMPLER);
        assert_eq!(texture.copied_from(), Some(target.texture().id()));
        assert_eq!(texture.size(), (320, 240));
        assert!(pass.can_draw());
        assert!(pass.is_scene_pass());
    }

    #[test]
    fn test_scene_chain_ends_on_canvas() {
        let mut ctx = context();
        let first_target = RenderTarget::new(&mut ctx, RenderTargetParams::default()).unwrap();
        let second_target = RenderTarget::new(&mut ctx, RenderTargetParams::default()).unwrap();
        let mut first = ShaderPass::new(&mut ctx, &first_target, true, &ShaderPassParams::default()).unwrap();
        let mut second = ShaderPass::new(&mut ctx, &second_target, true, &ShaderPassParams::default()).unwrap();
        let targets = [first_target, second_target];
        let chain = [targets[0].id(), targets[1].id()];
        let mut frame = DrawContext {
            ctx: &mut ctx,
            targets: &targets,
            scene_targets: &chain,
        };

        frame.ctx.set_scene_pass_index(Some(0));
        render(&mut first, &mut frame);
        assert_eq!(frame.ctx.frame_buffer(), FrameBufferBinding::Target(chain[1]));

        frame.ctx.set_scene_pass_index(Some(1));
        render(&mut second, &mut frame);
        assert_eq!(frame.ctx.frame_buffer(), FrameBufferBinding::Canvas);
    }

    #[test]
    fn test_render_pass_draws_to_canvas_outside_chain() {
        let mut ctx = context();
        let target = RenderTarget::new(&mut ctx, RenderTargetParams::default()).unwrap();
        let mut pass = ShaderPass::new(&mut ctx, &target, false, &ShaderPassParams::default()).unwrap();
        let targets = [target];
        let mut frame = DrawContext {
            ctx: &mut ctx,
            targets: &targets,
            scene_targets: &[],
        };
        render(&mut pass, &mut frame);
        assert_eq!(frame.ctx.frame_buffer(), FrameBufferBinding::Canvas);
    }
}
