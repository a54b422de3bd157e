/// Planar Core Library - DOM-bound planes drawn into one shared WebGL canvas
///
/// This library holds everything that does not need a browser: the draw order
/// of planes and passes, shared program, geometry and texture caches, the
/// DOM-to-clip-space transforms with culling, and the context loss protocol.
/// GPU calls go through the [`gl::GlContext`] trait.

pub mod cache;
pub mod config;
pub mod context;
pub mod culling;
pub mod diagnostics;
pub mod dom;
pub mod drawable;
pub mod error;
pub mod geometry;
pub mod gl;
pub mod mesh;
pub mod ping_pong;
pub mod plane;
pub mod program;
pub mod projection;
pub mod queue;
pub mod render_target;
pub mod renderer;
pub mod scene;
pub mod shader_pass;
pub mod source;
pub mod texture;
pub mod transform;
pub mod uniforms;

// Re-export commonly used types
pub use config::RendererConfig;
pub use context::{CullMode, RenderContext};
pub use diagnostics::{DiagnosticSink, Diagnostics, LogSink, MemorySink};
pub use dom::{DomBounds, DrawCheckMargins, ElementBounds};
pub use error::{PlanarError, Result};
pub use ping_pong::{PingPongParams, PingPongPlane};
pub use plane::{Plane, PlaneEvent, PlaneId, PlaneParams};
pub use projection::Camera;
pub use queue::{CallbackHandle, CallbackQueue};
pub use render_target::{RenderTarget, RenderTargetId, RenderTargetParams};
pub use renderer::Renderer;
pub use scene::Scene;
pub use shader_pass::{ShaderPass, ShaderPassId, ShaderPassParams};
pub use source::{LoadState, MediaSource, PixelSource, SourceKind};
pub use texture::{Texture, TextureId, TextureParams};
pub use transform::{RotationState, Transform};
pub use uniforms::{UniformDef, UniformType, UniformValue};
