/// GPU context abstraction
///
/// Every GPU call the renderer issues goes through [`GlContext`]. Resources are
/// addressed with small `Copy` handles so the trait stays object safe and a
/// backend is free to map them onto its own native objects.
use std::fmt;

use crate::source::MediaSource;

mod headless;

pub use headless::{GlCall, HeadlessFactory, HeadlessGl};

macro_rules! gl_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

gl_handle!(
    /// Compiled shader object
    ShaderHandle,
    /// Linked program object
    ProgramHandle,
    /// Vertex buffer object
    BufferHandle,
    /// Vertex array object
    VertexArrayHandle,
    /// 2D texture object
    TextureHandle,
    /// Frame buffer object
    FramebufferHandle,
    /// Depth render buffer object
    RenderbufferHandle,
    /// Uniform location inside a linked program
    UniformLocation,
);

/// WebGL flavour backing a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlVersion {
    WebGl1,
    WebGl2,
}

impl GlVersion {
    /// Extensions queried right after the context is created or restored.
    pub fn extension_names(self) -> &'static [&'static str] {
        match self {
            GlVersion::WebGl2 => &[
                "EXT_color_buffer_float",
                "OES_texture_float_linear",
                "EXT_texture_filter_anisotropic",
                "WEBGL_lose_context",
            ],
            GlVersion::WebGl1 => &[
                "OES_vertex_array_object",
                "OES_texture_float",
                "OES_texture_float_linear",
                "OES_texture_half_float",
                "OES_texture_half_float_linear",
                "OES_element_index_uint",
                "EXT_texture_filter_anisotropic",
                "WEBGL_lose_context",
            ],
        }
    }

    /// Context id passed to `canvas.getContext`.
    pub fn context_id(self) -> &'static str {
        match self {
            GlVersion::WebGl2 => "webgl2",
            GlVersion::WebGl1 => "webgl",
        }
    }
}

/// Extension availability recorded for the current context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    available: Vec<&'static str>,
}

impl Extensions {
    pub fn query(gl: &dyn GlContext, version: GlVersion) -> Self {
        let available = version
            .extension_names()
            .iter()
            .copied()
            .filter(|name| gl.has_extension(name))
            .collect();
        Self { available }
    }

    pub fn has(&self, name: &str) -> bool {
        self.available.iter().any(|ext| *ext == name)
    }

    pub fn names(&self) -> &[&'static str] {
        &self.available
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    CullFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

/// Buffers cleared by [`GlContext::clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_DEPTH: ClearMask = ClearMask {
        color: true,
        depth: true,
    };
    pub const DEPTH: ClearMask = ClearMask {
        color: false,
        depth: true,
    };
}

/// Unpack flags applied before a texture upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelStore {
    pub flip_y: bool,
    pub premultiply_alpha: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl Filter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }
}

/// Storage format of a texture allocated without a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Rgba16F,
    Rgba32F,
}

/// Uniform declared by a linked program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub is_sampler: bool,
}

/// Typed payload for a uniform upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData<'a> {
    /// `uniform{components}iv`
    Int { components: u8, data: &'a [i32] },
    /// `uniform{components}fv`
    Float { components: u8, data: &'a [f32] },
    /// `uniformMatrix{dim}fv`, column major
    Matrix { dim: u8, data: &'a [f32] },
}

/// Attributes requested when creating the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextAttributes {
    pub alpha: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub depth: bool,
    pub fail_if_major_performance_caveat: bool,
    pub preserve_drawing_buffer: bool,
    pub stencil: bool,
}

/// Creates contexts for a canvas, one version at a time
pub trait ContextFactory {
    fn create(
        &self,
        version: GlVersion,
        attributes: &ContextAttributes,
    ) -> Option<Box<dyn GlContext>>;
}

/// The GPU calls the renderer relies on.
///
/// Methods take `&self`; backends keep their object tables behind interior
/// mutability the same way a browser context does. Creation methods return
/// `None` when the context is lost.
pub trait GlContext {
    fn version(&self) -> GlVersion;
    fn is_context_lost(&self) -> bool;
    fn has_extension(&self, name: &str) -> bool;
    fn max_anisotropy(&self) -> f32;
    fn drawing_buffer_size(&self) -> (u32, u32);
    fn set_drawing_buffer_size(&self, width: u32, height: u32);
    /// Forces a context loss through `WEBGL_lose_context`.
    fn lose_context(&self) -> bool;
    /// Restores a context lost through [`GlContext::lose_context`].
    fn restore_context(&self) -> bool;
    /// Drops every object table entry; objects of a lost context are dead.
    fn forget_objects(&self) {}

    // global state
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: ClearMask);
    fn enable(&self, capability: Capability);
    fn disable(&self, capability: Capability);
    fn blend_func_separate(
        &self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn depth_func(&self, func: DepthFunc);
    fn depth_mask(&self, write: bool);
    fn cull_face(&self, face: Face);
    fn pixel_store(&self, store: PixelStore);

    // shaders and programs
    fn create_shader(&self, kind: ShaderKind) -> Option<ShaderHandle>;
    fn shader_source(&self, shader: ShaderHandle, source: &str);
    fn compile_shader(&self, shader: ShaderHandle);
    fn shader_compile_status(&self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&self, shader: ShaderHandle);
    fn create_program(&self) -> Option<ProgramHandle>;
    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&self, program: ProgramHandle);
    fn program_link_status(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn use_program(&self, program: Option<ProgramHandle>);
    fn delete_program(&self, program: ProgramHandle);
    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform>;
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;
    fn uniform(&self, location: UniformLocation, data: UniformData<'_>);

    // vertex data
    fn create_buffer(&self) -> Option<BufferHandle>;
    fn bind_array_buffer(&self, buffer: Option<BufferHandle>);
    fn array_buffer_data(&self, data: &[u8]);
    fn delete_buffer(&self, buffer: BufferHandle);
    /// Float attribute, not normalized.
    fn vertex_attrib_pointer(&self, index: u32, size: i32, stride: i32, offset: i32);
    fn enable_vertex_attrib_array(&self, index: u32);
    /// `None` when vertex array objects are unavailable.
    fn create_vertex_array(&self) -> Option<VertexArrayHandle>;
    fn bind_vertex_array(&self, vao: Option<VertexArrayHandle>);
    fn delete_vertex_array(&self, vao: VertexArrayHandle);
    /// Draws triangles.
    fn draw_arrays(&self, first: i32, count: i32);

    // textures
    fn create_texture(&self) -> Option<TextureHandle>;
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<TextureHandle>);
    fn tex_wrap(&self, s: WrapMode, t: WrapMode);
    fn tex_filter(&self, min: Filter, mag: Filter);
    fn tex_anisotropy(&self, value: f32);
    fn tex_image_pixels(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<&[u8]>,
    );
    fn tex_image_source(&self, source: &dyn MediaSource) -> Result<(), String>;
    fn generate_mipmap(&self);
    fn delete_texture(&self, texture: TextureHandle);

    // frame buffers
    fn create_framebuffer(&self) -> Option<FramebufferHandle>;
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>);
    fn framebuffer_texture(&self, texture: TextureHandle);
    fn create_renderbuffer(&self) -> Option<RenderbufferHandle>;
    fn bind_renderbuffer(&self, renderbuffer: Option<RenderbufferHandle>);
    fn renderbuffer_depth_storage(&self, width: u32, height: u32);
    fn framebuffer_depth_renderbuffer(&self, renderbuffer: RenderbufferHandle);
    fn delete_framebuffer(&self, framebuffer: FramebufferHandle);
    fn delete_renderbuffer(&self, renderbuffer: RenderbufferHandle);
}

/// True when `value` is a power of two (WebGL1 mipmap and wrap restrictions).
pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}
