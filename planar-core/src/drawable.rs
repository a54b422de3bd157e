/// What the scene needs from anything it draws
use std::fmt;

use crate::context::RenderContext;
use crate::plane::PlaneId;
use crate::render_target::{RenderTarget, RenderTargetId};
use crate::shader_pass::ShaderPassId;

/// Addressee of a queued event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawableId {
    Plane(PlaneId),
    ShaderPass(ShaderPassId),
}

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawableId::Plane(id) => id.fmt(f),
            DrawableId::ShaderPass(id) => id.fmt(f),
        }
    }
}

impl From<PlaneId> for DrawableId {
    fn from(id: PlaneId) -> Self {
        DrawableId::Plane(id)
    }
}

impl From<ShaderPassId> for DrawableId {
    fn from(id: ShaderPassId) -> Self {
        DrawableId::ShaderPass(id)
    }
}

/// Borrowed frame state handed to drawables
pub struct DrawContext<'a> {
    pub ctx: &'a mut RenderContext,
    /// Every live render target.
    pub targets: &'a [RenderTarget],
    /// Targets of the scene passes, in chain order.
    pub scene_targets: &'a [RenderTargetId],
}

impl DrawContext<'_> {
    pub fn target(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.targets.iter().find(|target| target.id() == id)
    }
}

pub trait Drawable {
    /// GPU resources are in place.
    fn can_draw(&self) -> bool;

    /// Ready, visible and not culled.
    fn is_drawn(&self) -> bool;

    /// Per frame bookkeeping before the draw: frame buffer, matrices, culling.
    fn start_drawing(&mut self, frame: &mut DrawContext<'_>);

    fn draw(&mut self, frame: &mut DrawContext<'_>);
}

/// One frame of a drawable.
pub fn render(drawable: &mut dyn Drawable, frame: &mut DrawContext<'_>) {
    if !drawable.can_draw() {
        return;
    }
    drawable.start_drawing(frame);
    if drawable.is_drawn() {
        drawable.draw(frame);
    }
}
