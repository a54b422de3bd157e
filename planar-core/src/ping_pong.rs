/// Feedback planes drawing into one target while reading the other
use crate::context::RenderContext;
use crate::dom::ElementBounds;
use crate::drawable::{DrawContext, Drawable};
use crate::error::Result;
use crate::plane::{Plane, PlaneId, PlaneParams};
use crate::render_target::{RenderTarget, RenderTargetId, RenderTargetParams};
use crate::texture::{Texture, TextureId};

pub const PING_PONG_SAMPLER: &str = "uPingPongTexture";

#[derive(Debug, Clone)]
pub struct PingPongParams {
    pub plane: PlaneParams,
    /// Sampler of the texture holding the previous frame.
    pub sampler: String,
    /// Both targets keep their content between frames.
    pub target: RenderTargetParams,
}

impl Default for PingPongParams {
    fn default() -> Self {
        Self {
            plane: PlaneParams {
                depth_test: false,
                ..PlaneParams::default()
            },
            sampler: PING_PONG_SAMPLER.to_string(),
            target: RenderTargetParams {
                clear: false,
                ..RenderTargetParams::default()
            },
        }
    }
}

/// A plane whose output becomes its own input on the next frame
#[derive(Debug)]
pub struct PingPongPlane {
    plane: Plane,
    read: RenderTargetId,
    write: RenderTargetId,
    texture: TextureId,
}

impl PingPongPlane {
    /// `read` and `write` must not clear on bind.
    pub fn new(
        ctx: &mut RenderContext,
        element: Box<dyn ElementBounds>,
        params: &PingPongParams,
        read: &RenderTarget,
        write: &RenderTarget,
    ) -> Result<Self> {
        let mut plane = Plane::new(ctx, element, &params.plane)?;
        let texture_params = params.plane.texture.clone().with_sampler(params.sampler.clone());
        let unit = plane.mesh().next_unit();
        let texture = plane.add_texture(Texture::new_copy(ctx, read.texture(), &texture_params, unit));
        plane.set_render_target(Some(write.id()));
        Ok(Self {
            plane,
            read: read.id(),
            write: write.id(),
            texture,
        })
    }

    pub fn id(&self) -> PlaneId {
        self.plane.id()
    }

    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    pub fn plane_mut(&mut self) -> &mut Plane {
        &mut self.plane
    }

    /// Target holding the previous frame.
    pub fn read_target(&self) -> RenderTargetId {
        self.read
    }

    /// Target drawn into this frame.
    pub fn write_target(&self) -> RenderTargetId {
        self.write
    }

    /// The previous frame, as sampled by the plane.
    pub fn texture(&self) -> Option<&Texture> {
        self.plane.texture(self.texture)
    }

    /// Reads what was just written and writes over the older frame.
    pub fn swap(&mut self, ctx: &RenderContext, targets: &[RenderTarget]) {
        std::mem::swap(&mut self.read, &mut self.write);
        self.plane.set_render_target(Some(self.write));
        let source = targets.iter().find(|target| target.id() == self.read);
        if let (Some(source), Some(texture)) = (source, self.plane.texture_mut(self.texture)) {
            texture.copy(ctx, source.texture());
        }
    }
}

impl Drawable for PingPongPlane {
    fn can_draw(&self) -> bool {
        self.plane.can_draw()
    }

    fn is_drawn(&self) -> bool {
        self.plane.is_drawn()
    }

    fn start_drawing(&mut self, frame: &mut DrawContext<'_>) {
        self.plane.start_drawing(frame);
    }

    fn draw(&mut self, frame: &mut DrawContext<'_>) {
        self.plane.draw(frame);
        self.swap(frame.ctx, frame.targets);
    }
}
