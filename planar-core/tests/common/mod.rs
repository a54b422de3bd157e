#![allow(dead_code)]

use planar_core::gl::{HeadlessFactory, HeadlessGl};
use planar_core::{DomBounds, ElementBounds, Renderer, RendererConfig};

pub const CANVAS: DomBounds = DomBounds {
    top: 0.0,
    left: 0.0,
    width: 800.0,
    height: 600.0,
};

pub fn element(top: f32, left: f32) -> Box<dyn ElementBounds> {
    Box::new(DomBounds::new(top, left, 200.0, 150.0))
}

/// Renderer over a headless WebGL2 context, plus a handle on that context.
pub fn renderer() -> (Renderer, HeadlessGl) {
    renderer_with(RendererConfig::default())
}

pub fn renderer_with(config: RendererConfig) -> (Renderer, HeadlessGl) {
    let factory = HeadlessFactory::new();
    let renderer = Renderer::new(config, &factory, Box::new(CANVAS));
    let gl = factory.last().expect("headless context");
    (renderer, gl)
}
