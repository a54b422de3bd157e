/// The live GPU context and its cached global state
///
/// Every drawable receives a [`RenderContext`] instead of a pointer back to the
/// renderer. State setters compare against the cache first so redundant GPU
/// calls never leave the process.
use std::cell::Cell;
use std::rc::Rc;

use crate::cache::CacheManager;
use crate::config::RendererConfig;
use crate::diagnostics::Diagnostics;
use crate::dom::DomBounds;
use crate::gl::{
    BlendFactor, Capability, ClearMask, DepthFunc, Extensions, Face, GlContext, GlVersion,
    ProgramHandle, TextureHandle,
};
use crate::drawable::DrawableId;
use crate::plane::PlaneEvent;
use crate::render_target::{RenderTarget, RenderTargetId};

/// Faces dropped before rasterization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    Back,
    Front,
    None,
}

/// Frame buffer the context currently draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameBufferBinding {
    Unknown,
    Canvas,
    Target(RenderTargetId),
}

#[derive(Debug)]
struct GlState {
    program: Cell<Option<ProgramHandle>>,
    active_texture: Cell<Option<u32>>,
    depth_test: Cell<Option<bool>>,
    depth_func: Cell<Option<DepthFunc>>,
    blending: Cell<Option<bool>>,
    cull_face: Cell<Option<CullMode>>,
    frame_buffer: Cell<FrameBufferBinding>,
    scene_pass_index: Cell<Option<usize>>,
}

impl Default for GlState {
    fn default() -> Self {
        Self {
            program: Cell::new(None),
            active_texture: Cell::new(None),
            depth_test: Cell::new(None),
            depth_func: Cell::new(None),
            blending: Cell::new(None),
            cull_face: Cell::new(None),
            frame_buffer: Cell::new(FrameBufferBinding::Unknown),
            scene_pass_index: Cell::new(None),
        }
    }
}

pub struct RenderContext {
    gl: Box<dyn GlContext>,
    version: GlVersion,
    extensions: Extensions,
    state: GlState,
    pub(crate) cache: CacheManager,
    diagnostics: Rc<Diagnostics>,
    premultiplied_alpha: bool,
    production: bool,
    depth: bool,
    pixel_ratio: f32,
    bounds: DomBounds,
    lost: bool,
    active: bool,
    epoch: u32,
    next_id: u32,
    pub(crate) events: Vec<(DrawableId, PlaneEvent)>,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("version", &self.version)
            .field("extensions", &self.extensions)
            .field("state", &self.state)
            .field("cache", &self.cache)
            .field("lost", &self.lost)
            .field("active", &self.active)
            .finish()
    }
}

impl RenderContext {
    pub fn new(gl: Box<dyn GlContext>, config: &RendererConfig, diagnostics: Rc<Diagnostics>) -> Self {
        let version = gl.version();
        let extensions = Extensions::query(gl.as_ref(), version);
        log::debug!("{} context with {:?}", version.context_id(), extensions.names());
        let context = Self {
            gl,
            version,
            extensions,
            state: GlState::default(),
            cache: CacheManager::new(),
            diagnostics,
            premultiplied_alpha: config.premultiplied_alpha,
            production: config.production,
            depth: config.depth,
            pixel_ratio: config.effective_pixel_ratio(),
            bounds: DomBounds::default(),
            lost: false,
            active: true,
            epoch: 0,
            next_id: 0,
            events: Vec::new(),
        };
        context.init_state();
        context
    }

    #[cfg(test)]
    pub(crate) fn for_tests(gl: crate::gl::HeadlessGl, config: RendererConfig) -> Self {
        Self::new(Box::new(gl), &config, Rc::new(Diagnostics::default()))
    }

    fn init_state(&self) {
        self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
        let (src, dst) = if self.premultiplied_alpha {
            (BlendFactor::One, BlendFactor::OneMinusSrcAlpha)
        } else {
            (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
        };
        self.gl
            .blend_func_separate(src, dst, BlendFactor::One, BlendFactor::OneMinusSrcAlpha);
        self.set_depth_function(DepthFunc::LessEqual);
        self.set_depth_test(true);
    }

    pub fn gl(&self) -> &dyn GlContext {
        self.gl.as_ref()
    }

    pub fn version(&self) -> GlVersion {
        self.version
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// False once disposal started.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Bumped by every restore; GPU objects created before it are stale.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub(crate) fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub(crate) fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
    }

    /// Canvas box in device pixels.
    pub fn bounds(&self) -> DomBounds {
        self.bounds
    }

    pub(crate) fn set_bounds(&mut self, bounds: DomBounds) {
        self.bounds = bounds;
        self.gl.set_drawing_buffer_size(
            bounds.width.round().max(1.0) as u32,
            bounds.height.round().max(1.0) as u32,
        );
        if self.state.frame_buffer.get() == FrameBufferBinding::Canvas {
            self.state.frame_buffer.set(FrameBufferBinding::Unknown);
        }
    }

    /// Queues an event for its handler; the renderer delivers it next frame.
    pub(crate) fn push_event(&mut self, target: impl Into<DrawableId>, event: PlaneEvent) {
        self.events.push((target.into(), event));
    }

    pub fn set_blending(&self, enabled: bool) {
        if self.state.blending.get() == Some(enabled) {
            return;
        }
        if enabled {
            self.gl.enable(Capability::Blend);
        } else {
            self.gl.disable(Capability::Blend);
        }
        self.state.blending.set(Some(enabled));
    }

    pub fn set_depth_test(&self, enabled: bool) {
        if self.state.depth_test.get() == Some(enabled) {
            return;
        }
        if enabled {
            self.gl.enable(Capability::DepthTest);
        } else {
            self.gl.disable(Capability::DepthTest);
        }
        self.state.depth_test.set(Some(enabled));
    }

    pub fn set_depth_function(&self, func: DepthFunc) {
        if self.state.depth_func.get() == Some(func) {
            return;
        }
        self.gl.depth_func(func);
        self.state.depth_func.set(Some(func));
    }

    pub fn set_face_culling(&self, mode: CullMode) {
        if self.state.cull_face.get() == Some(mode) {
            return;
        }
        match mode {
            CullMode::None => self.gl.disable(Capability::CullFace),
            CullMode::Front | CullMode::Back => {
                self.gl.enable(Capability::CullFace);
                self.gl.cull_face(if mode == CullMode::Front {
                    Face::Front
                } else {
                    Face::Back
                });
            }
        }
        self.state.cull_face.set(Some(mode));
    }

    pub fn use_program(&self, program: ProgramHandle) {
        if self.state.program.get() == Some(program) {
            return;
        }
        self.gl.use_program(Some(program));
        self.state.program.set(Some(program));
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.state.program.get()
    }

    /// Activates `unit` if needed and binds the texture to it.
    pub fn bind_texture(&self, unit: u32, texture: TextureHandle) {
        if self.state.active_texture.get() != Some(unit) {
            self.gl.active_texture(unit);
            self.state.active_texture.set(Some(unit));
        }
        self.gl.bind_texture(Some(texture));
    }

    pub fn clear(&self) {
        let mask = if self.depth {
            ClearMask::COLOR_DEPTH
        } else {
            ClearMask {
                color: true,
                depth: false,
            }
        };
        self.gl.clear(mask);
    }

    pub fn clear_depth(&self) {
        self.gl.clear(ClearMask::DEPTH);
    }

    pub fn frame_buffer(&self) -> FrameBufferBinding {
        self.state.frame_buffer.get()
    }

    /// Binds a render target, or the canvas for `None`. Nothing happens when
    /// it is already bound; a newly bound target is cleared unless it opted
    /// out or the caller cancels it.
    pub fn bind_frame_buffer(&self, target: Option<&RenderTarget>, cancel_clear: bool) {
        match target {
            Some(target) => {
                let binding = FrameBufferBinding::Target(target.id());
                if self.state.frame_buffer.get() == binding {
                    return;
                }
                let Some(framebuffer) = target.framebuffer() else {
                    return;
                };
                self.gl.bind_framebuffer(Some(framebuffer));
                let (width, height) = target.size();
                self.gl.viewport(0, 0, width as i32, height as i32);
                self.state.frame_buffer.set(binding);
                if target.should_clear() && !cancel_clear {
                    self.clear();
                }
            }
            None => {
                if self.state.frame_buffer.get() == FrameBufferBinding::Canvas {
                    return;
                }
                self.gl.bind_framebuffer(None);
                let (width, height) = self.gl.drawing_buffer_size();
                self.gl.viewport(0, 0, width as i32, height as i32);
                self.state.frame_buffer.set(FrameBufferBinding::Canvas);
            }
        }
    }

    /// Records that a frame buffer was bound behind the cache's back.
    pub(crate) fn invalidate_frame_buffer(&self) {
        self.state.frame_buffer.set(FrameBufferBinding::Unknown);
    }

    pub fn scene_pass_index(&self) -> Option<usize> {
        self.state.scene_pass_index.get()
    }

    pub fn set_scene_pass_index(&self, index: Option<usize>) {
        self.state.scene_pass_index.set(index);
    }

    /// Forgets the cached state so the next setters reach the GPU.
    pub fn reset_state(&self) {
        self.state.program.set(None);
        self.state.active_texture.set(None);
        self.state.depth_test.set(None);
        self.state.depth_func.set(None);
        self.state.blending.set(None);
        self.state.cull_face.set(None);
        self.state.frame_buffer.set(FrameBufferBinding::Unknown);
        self.state.scene_pass_index.set(None);
    }

    /// Frees the cached shaders and shared programs for good.
    pub(crate) fn delete_cached_programs(&mut self) {
        log::debug!("deleting {} cached programs", self.cache.program_count());
        self.cache.delete_programs(self.gl.as_ref());
    }

    pub(crate) fn mark_lost(&mut self) {
        self.lost = true;
        self.reset_state();
    }

    /// Queries extensions again, resets the global state and empties the
    /// program and texture caches. Geometries survive.
    pub(crate) fn restore(&mut self) {
        self.lost = false;
        self.epoch += 1;
        self.gl.forget_objects();
        self.extensions = Extensions::query(self.gl.as_ref(), self.version);
        self.reset_state();
        self.init_state();
        self.cache.clear_programs();
        self.cache.clear_textures();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCall, HeadlessGl};

    #[test]
    fn test_redundant_state_skipped() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        gl.clear_calls();
        ctx.set_blending(true);
        ctx.set_blending(true);
        ctx.set_depth_test(true);
        assert_eq!(gl.calls(), vec![GlCall::Enable(Capability::Blend)]);
    }

    #[test]
    fn test_premultiplied_blend_func() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let config = RendererConfig {
            premultiplied_alpha: true,
            ..RendererConfig::default()
        };
        let _ctx = RenderContext::for_tests(gl.clone(), config);
        assert!(gl
            .calls()
            .contains(&GlCall::BlendFunc(BlendFactor::One, BlendFactor::OneMinusSrcAlpha)));
    }

    #[test]
    fn test_canvas_binding_not_repeated() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        ctx.bind_frame_buffer(None, false);
        ctx.bind_frame_buffer(None, false);
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::BindFramebuffer(None))), 1);
        assert_eq!(ctx.frame_buffer(), FrameBufferBinding::Canvas);
        // the canvas is never cleared by a bind
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::Clear(_))), 0);
    }

    #[test]
    fn test_restore_bumps_epoch() {
        let gl = HeadlessGl::new(GlVersion::WebGl1);
        let mut ctx = RenderContext::for_tests(gl, RendererConfig::default());
        ctx.cache.geometry(1, 1);
        ctx.mark_lost();
        ctx.restore();
        assert_eq!(ctx.epoch(), 1);
        assert!(!ctx.is_lost());
        assert_eq!(ctx.cache().geometry_count(), 1);
    }
}
