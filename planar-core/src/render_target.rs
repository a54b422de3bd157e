/// Off-screen frame buffers
use std::fmt;

use crate::context::RenderContext;
use crate::error::{PlanarError, Result};
use crate::gl::{FramebufferHandle, RenderbufferHandle};
use crate::texture::{Texture, TextureParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u32);

impl fmt::Display for RenderTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderTarget: {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetParams {
    /// Attach a depth render buffer.
    pub depth: bool,
    /// Clear whenever the target gets bound.
    pub clear: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub texture: TextureParams,
}

impl Default for RenderTargetParams {
    fn default() -> Self {
        Self {
            depth: false,
            clear: true,
            min_width: 1,
            min_height: 1,
            max_width: None,
            max_height: None,
            texture: TextureParams {
                flip_y: Some(false),
                ..TextureParams::default()
            },
        }
    }
}

#[derive(Debug)]
pub struct RenderTarget {
    id: RenderTargetId,
    params: RenderTargetParams,
    framebuffer: Option<FramebufferHandle>,
    depth_buffer: Option<RenderbufferHandle>,
    texture: Texture,
    size: (u32, u32),
}

impl RenderTarget {
    pub fn new(ctx: &mut RenderContext, params: RenderTargetParams) -> Result<Self> {
        let id = RenderTargetId(ctx.next_id());
        let size = Self::size_for(ctx, &params);
        let texture = Texture::for_render_target(ctx, &params.texture, size)?;
        let mut target = Self {
            id,
            params,
            framebuffer: None,
            depth_buffer: None,
            texture,
            size,
        };
        target.create_buffers(ctx)?;
        log::debug!("{id} created at {}x{}", size.0, size.1);
        Ok(target)
    }

    fn size_for(ctx: &RenderContext, params: &RenderTargetParams) -> (u32, u32) {
        let bounds = ctx.bounds();
        let mut width = bounds.width.round().max(0.0) as u32;
        let mut height = bounds.height.round().max(0.0) as u32;
        if let Some(max) = params.max_width {
            width = width.min(max);
        }
        if let Some(max) = params.max_height {
            height = height.min(max);
        }
        (width.max(params.min_width.max(1)), height.max(params.min_height.max(1)))
    }

    fn create_buffers(&mut self, ctx: &RenderContext) -> Result<()> {
        let gl = ctx.gl();
        let framebuffer = gl
            .create_framebuffer()
            .ok_or(PlanarError::ResourceCreation("frame buffer"))?;
        let texture = self
            .texture
            .handle()
            .ok_or(PlanarError::ResourceCreation("render target texture"))?;
        gl.bind_framebuffer(Some(framebuffer));
        gl.framebuffer_texture(texture);
        if self.params.depth {
            let depth = gl
                .create_renderbuffer()
                .ok_or(PlanarError::ResourceCreation("depth buffer"))?;
            gl.bind_renderbuffer(Some(depth));
            gl.renderbuffer_depth_storage(self.size.0, self.size.1);
            gl.framebuffer_depth_renderbuffer(depth);
            self.depth_buffer = Some(depth);
        }
        gl.bind_framebuffer(None);
        ctx.invalidate_frame_buffer();
        self.framebuffer = Some(framebuffer);
        Ok(())
    }

    pub fn id(&self) -> RenderTargetId {
        self.id
    }

    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn should_clear(&self) -> bool {
        self.params.clear
    }

    pub fn params(&self) -> &RenderTargetParams {
        &self.params
    }

    /// Color attachment; sample it through a copy.
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn can_draw(&self) -> bool {
        self.framebuffer.is_some() && self.texture.can_draw()
    }

    /// Follows the canvas size. Copies of the texture see the new size.
    pub fn resize(&mut self, ctx: &RenderContext) {
        let size = Self::size_for(ctx, &self.params);
        if size == self.size {
            return;
        }
        self.size = size;
        self.texture.resize_storage(ctx, size.0, size.1);
        if let Some(depth) = self.depth_buffer {
            let gl = ctx.gl();
            gl.bind_renderbuffer(Some(depth));
            gl.renderbuffer_depth_storage(size.0, size.1);
        }
    }

    pub fn restore(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.framebuffer = None;
        self.depth_buffer = None;
        self.size = Self::size_for(ctx, &self.params);
        self.texture.restore(ctx)?;
        self.texture.resize_storage(ctx, self.size.0, self.size.1);
        self.create_buffers(ctx)
    }

    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        self.texture.dispose(ctx, true);
        if ctx.is_lost() {
            self.framebuffer = None;
            self.depth_buffer = None;
            return;
        }
        let gl = ctx.gl();
        if let Some(framebuffer) = self.framebuffer.take() {
            gl.delete_framebuffer(framebuffer);
        }
        if let Some(depth) = self.depth_buffer.take() {
            gl.delete_renderbuffer(depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::dom::DomBounds;
    use crate::gl::{GlCall, GlVersion, HeadlessGl};

    fn context() -> (HeadlessGl, RenderContext) {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let mut ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        ctx.set_bounds(DomBounds::new(0.0, 0.0, 400.0, 300.0));
        (gl, ctx)
    }

    #[test]
    fn test_follows_canvas_size() {
        let (_gl, mut ctx) = context();
        let params = RenderTargetParams {
            max_width: Some(256),
            ..RenderTargetParams::default()
        };
        let mut target = RenderTarget::new(&mut ctx, params).unwrap();
        assert_eq!(target.size(), (256, 300));
        assert!(target.can_draw());

        ctx.set_bounds(DomBounds::new(0.0, 0.0, 100.0, 50.0));
        target.resize(&ctx);
        assert_eq!(target.size(), (100, 50));
        assert_eq!(target.texture().size(), (100, 50));
    }

    #[test]
    fn test_bind_clears_unless_cancelled() {
        let (gl, mut ctx) = context();
        let target = RenderTarget::new(&mut ctx, RenderTargetParams::default()).unwrap();
        gl.clear_calls();
        ctx.bind_frame_buffer(Some(&target), true);
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::Clear(_))), 0);

        ctx.bind_frame_buffer(None, false);
        ctx.bind_frame_buffer(Some(&target), false);
        ctx.bind_frame_buffer(Some(&target), false);
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::Clear(_))), 1);
    }

    #[test]
    fn test_no_clear_target() {
        let (gl, mut ctx) = context();
        let params = RenderTargetParams {
            clear: false,
            ..RenderTargetParams::default()
        };
        let target = RenderTarget::new(&mut ctx, params).unwrap();
        gl.clear_calls();
        ctx.bind_frame_buffer(Some(&target), false);
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::Clear(_))), 0);
    }
}
