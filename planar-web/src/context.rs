/// WebGL backend for the core renderer
///
/// Maps the numeric handles used by `planar-core` onto `web_sys` objects.
/// WebGL 1 and WebGL 2 share most of their entry points, so both contexts
/// are driven through the same `with_gl!` dispatch.
use std::cell::RefCell;
use std::collections::HashMap;

use planar_core::gl::{
    ActiveUniform, BlendFactor, BufferHandle, Capability, ClearMask, DepthFunc, Face, Filter,
    FramebufferHandle, GlContext, GlVersion, PixelStore, ProgramHandle, RenderbufferHandle,
    ShaderHandle, ShaderKind, TextureFormat, TextureHandle, UniformData, UniformLocation,
    VertexArrayHandle, WrapMode,
};
use planar_core::MediaSource;
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, OesVertexArrayObject, WebGl2RenderingContext as Gl, WebGlBuffer,
    WebGlFramebuffer, WebGlProgram, WebGlRenderbuffer, WebGlRenderingContext, WebGlShader,
    WebGlTexture, WebGlUniformLocation, WebGlVertexArrayObject, WebglLoseContext,
};

use crate::source::{CanvasSource, ImageSource, VideoSource};

const TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FE;
const MAX_TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FF;
const HALF_FLOAT_OES: u32 = 0x8D61;

enum Backend {
    WebGl2(Gl),
    WebGl1 {
        gl: WebGlRenderingContext,
        vertex_arrays: Option<OesVertexArrayObject>,
    },
}

/// Runs `$body` against whichever context backs `$self`.
macro_rules! with_gl {
    ($self:expr, $gl:ident => $body:expr) => {
        match &$self.backend {
            Backend::WebGl2($gl) => $body,
            Backend::WebGl1 { gl: $gl, .. } => $body,
        }
    };
}

#[derive(Default)]
struct Objects {
    next_id: u32,
    shaders: HashMap<u32, WebGlShader>,
    programs: HashMap<u32, WebGlProgram>,
    buffers: HashMap<u32, WebGlBuffer>,
    vertex_arrays: HashMap<u32, WebGlVertexArrayObject>,
    textures: HashMap<u32, WebGlTexture>,
    framebuffers: HashMap<u32, WebGlFramebuffer>,
    renderbuffers: HashMap<u32, WebGlRenderbuffer>,
    /// Locations are owned by their program.
    locations: HashMap<u32, (u32, WebGlUniformLocation)>,
}

impl Objects {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Inserts `value` under a fresh id.
macro_rules! track {
    ($self:expr, $table:ident, $value:expr) => {{
        let value = $value?;
        let mut objects = $self.objects.borrow_mut();
        let id = objects.next();
        objects.$table.insert(id, value);
        Some(id)
    }};
}

/// A browser WebGL context bound to its canvas
pub struct WebGlBackend {
    backend: Backend,
    canvas: HtmlCanvasElement,
    lose: Option<WebglLoseContext>,
    objects: RefCell<Objects>,
}

impl WebGlBackend {
    pub fn webgl2(canvas: HtmlCanvasElement, gl: Gl) -> Self {
        let lose = lose_extension(gl.get_extension("WEBGL_lose_context").ok().flatten());
        Self {
            backend: Backend::WebGl2(gl),
            canvas,
            lose,
            objects: RefCell::default(),
        }
    }

    pub fn webgl1(canvas: HtmlCanvasElement, gl: WebGlRenderingContext) -> Self {
        let vertex_arrays = gl
            .get_extension("OES_vertex_array_object")
            .ok()
            .flatten()
            .and_then(|ext| ext.dyn_into::<OesVertexArrayObject>().ok());
        let lose = lose_extension(gl.get_extension("WEBGL_lose_context").ok().flatten());
        Self {
            backend: Backend::WebGl1 { gl, vertex_arrays },
            canvas,
            lose,
            objects: RefCell::default(),
        }
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn shader(&self, handle: ShaderHandle) -> Option<WebGlShader> {
        self.objects.borrow().shaders.get(&handle.0).cloned()
    }

    fn program(&self, handle: ProgramHandle) -> Option<WebGlProgram> {
        self.objects.borrow().programs.get(&handle.0).cloned()
    }

    fn texture(&self, handle: TextureHandle) -> Option<WebGlTexture> {
        self.objects.borrow().textures.get(&handle.0).cloned()
    }

    fn renderbuffer(&self, handle: RenderbufferHandle) -> Option<WebGlRenderbuffer> {
        self.objects.borrow().renderbuffers.get(&handle.0).cloned()
    }

    /// (internal format, format, type)
    fn texture_format(&self, format: TextureFormat) -> (i32, u32, u32) {
        match (&self.backend, format) {
            (Backend::WebGl2(_), TextureFormat::Rgba8) => (Gl::RGBA8 as i32, Gl::RGBA, Gl::UNSIGNED_BYTE),
            (Backend::WebGl2(_), TextureFormat::Rgba16F) => (Gl::RGBA16F as i32, Gl::RGBA, Gl::HALF_FLOAT),
            (Backend::WebGl2(_), TextureFormat::Rgba32F) => (Gl::RGBA32F as i32, Gl::RGBA, Gl::FLOAT),
            (Backend::WebGl1 { .. }, TextureFormat::Rgba8) => (Gl::RGBA as i32, Gl::RGBA, Gl::UNSIGNED_BYTE),
            (Backend::WebGl1 { .. }, TextureFormat::Rgba16F) => (Gl::RGBA as i32, Gl::RGBA, HALF_FLOAT_OES),
            (Backend::WebGl1 { .. }, TextureFormat::Rgba32F) => (Gl::RGBA as i32, Gl::RGBA, Gl::FLOAT),
        }
    }
}

fn lose_extension(ext: Option<js_sys::Object>) -> Option<WebglLoseContext> {
    ext.and_then(|ext| ext.dyn_into::<WebglLoseContext>().ok())
}

fn capability(capability: Capability) -> u32 {
    match capability {
        Capability::Blend => Gl::BLEND,
        Capability::DepthTest => Gl::DEPTH_TEST,
        Capability::CullFace => Gl::CULL_FACE,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => Gl::ZERO,
        BlendFactor::One => Gl::ONE,
        BlendFactor::SrcAlpha => Gl::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => Gl::ONE_MINUS_SRC_ALPHA,
    }
}

fn depth_func(func: DepthFunc) -> u32 {
    match func {
        DepthFunc::Never => Gl::NEVER,
        DepthFunc::Less => Gl::LESS,
        DepthFunc::Equal => Gl::EQUAL,
        DepthFunc::LessEqual => Gl::LEQUAL,
        DepthFunc::Greater => Gl::GREATER,
        DepthFunc::NotEqual => Gl::NOTEQUAL,
        DepthFunc::GreaterEqual => Gl::GEQUAL,
        DepthFunc::Always => Gl::ALWAYS,
    }
}

fn wrap_mode(mode: WrapMode) -> i32 {
    (match mode {
        WrapMode::ClampToEdge => Gl::CLAMP_TO_EDGE,
        WrapMode::Repeat => Gl::REPEAT,
        WrapMode::MirroredRepeat => Gl::MIRRORED_REPEAT,
    }) as i32
}

fn filter(filter: Filter) -> i32 {
    (match filter {
        Filter::Nearest => Gl::NEAREST,
        Filter::Linear => Gl::LINEAR,
        Filter::NearestMipmapNearest => Gl::NEAREST_MIPMAP_NEAREST,
        Filter::LinearMipmapNearest => Gl::LINEAR_MIPMAP_NEAREST,
        Filter::NearestMipmapLinear => Gl::NEAREST_MIPMAP_LINEAR,
        Filter::LinearMipmapLinear => Gl::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

impl GlContext for WebGlBackend {
    fn version(&self) -> GlVersion {
        match self.backend {
            Backend::WebGl2(_) => GlVersion::WebGl2,
            Backend::WebGl1 { .. } => GlVersion::WebGl1,
        }
    }

    fn is_context_lost(&self) -> bool {
        with_gl!(self, gl => gl.is_context_lost())
    }

    fn has_extension(&self, name: &str) -> bool {
        // getExtension also enables the extension on WebGL 1
        with_gl!(self, gl => matches!(gl.get_extension(name), Ok(Some(_))))
    }

    fn max_anisotropy(&self) -> f32 {
        let value = with_gl!(self, gl => gl.get_parameter(MAX_TEXTURE_MAX_ANISOTROPY_EXT));
        value.ok().and_then(|value| value.as_f64()).unwrap_or(1.0) as f32
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        let (width, height) = with_gl!(self, gl => (gl.drawing_buffer_width(), gl.drawing_buffer_height()));
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn set_drawing_buffer_size(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn lose_context(&self) -> bool {
        match &self.lose {
            Some(ext) => {
                ext.lose_context();
                true
            }
            None => false,
        }
    }

    fn restore_context(&self) -> bool {
        match &self.lose {
            Some(ext) if self.is_context_lost() => {
                ext.restore_context();
                true
            }
            _ => false,
        }
    }

    fn forget_objects(&self) {
        let next_id = self.objects.borrow().next_id;
        // ids keep growing so stale handles never alias new objects
        *self.objects.borrow_mut() = Objects {
            next_id,
            ..Objects::default()
        };
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        with_gl!(self, gl => gl.viewport(x, y, width, height));
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        with_gl!(self, gl => gl.clear_color(r, g, b, a));
    }

    fn clear(&self, mask: ClearMask) {
        let mut bits = 0;
        if mask.color {
            bits |= Gl::COLOR_BUFFER_BIT;
        }
        if mask.depth {
            bits |= Gl::DEPTH_BUFFER_BIT;
        }
        with_gl!(self, gl => gl.clear(bits));
    }

    fn enable(&self, cap: Capability) {
        with_gl!(self, gl => gl.enable(capability(cap)));
    }

    fn disable(&self, cap: Capability) {
        with_gl!(self, gl => gl.disable(capability(cap)));
    }

    fn blend_func_separate(
        &self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        with_gl!(self, gl => gl.blend_func_separate(
            blend_factor(src_rgb),
            blend_factor(dst_rgb),
            blend_factor(src_alpha),
            blend_factor(dst_alpha),
        ));
    }

    fn depth_func(&self, func: DepthFunc) {
        with_gl!(self, gl => gl.depth_func(depth_func(func)));
    }

    fn depth_mask(&self, write: bool) {
        with_gl!(self, gl => gl.depth_mask(write));
    }

    fn cull_face(&self, face: Face) {
        let face = match face {
            Face::Front => Gl::FRONT,
            Face::Back => Gl::BACK,
        };
        with_gl!(self, gl => gl.cull_face(face));
    }

    fn pixel_store(&self, store: PixelStore) {
        with_gl!(self, gl => {
            gl.pixel_storei(Gl::UNPACK_FLIP_Y_WEBGL, store.flip_y as i32);
            gl.pixel_storei(Gl::UNPACK_PREMULTIPLY_ALPHA_WEBGL, store.premultiply_alpha as i32);
        });
    }

    fn create_shader(&self, kind: ShaderKind) -> Option<ShaderHandle> {
        let kind = match kind {
            ShaderKind::Vertex => Gl::VERTEX_SHADER,
            ShaderKind::Fragment => Gl::FRAGMENT_SHADER,
        };
        track!(self, shaders, with_gl!(self, gl => gl.create_shader(kind))).map(ShaderHandle)
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        if let Some(shader) = self.shader(shader) {
            with_gl!(self, gl => gl.shader_source(&shader, source));
        }
    }

    fn compile_shader(&self, shader: ShaderHandle) {
        if let Some(shader) = self.shader(shader) {
            with_gl!(self, gl => gl.compile_shader(&shader));
        }
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> bool {
        self.shader(shader)
            .map(|shader| {
                with_gl!(self, gl => gl.get_shader_parameter(&shader, Gl::COMPILE_STATUS))
                    .as_bool()
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.shader(shader)
            .and_then(|shader| with_gl!(self, gl => gl.get_shader_info_log(&shader)))
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        let removed = self.objects.borrow_mut().shaders.remove(&shader.0);
        if let Some(shader) = removed {
            with_gl!(self, gl => gl.delete_shader(Some(&shader)));
        }
    }

    fn create_program(&self) -> Option<ProgramHandle> {
        track!(self, programs, with_gl!(self, gl => gl.create_program())).map(ProgramHandle)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        if let (Some(program), Some(shader)) = (self.program(program), self.shader(shader)) {
            with_gl!(self, gl => gl.attach_shader(&program, &shader));
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        if let Some(program) = self.program(program) {
            with_gl!(self, gl => gl.link_program(&program));
        }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        self.program(program)
            .map(|program| {
                with_gl!(self, gl => gl.get_program_parameter(&program, Gl::LINK_STATUS))
                    .as_bool()
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.program(program)
            .and_then(|program| with_gl!(self, gl => gl.get_program_info_log(&program)))
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let program = program.and_then(|program| self.program(program));
        with_gl!(self, gl => gl.use_program(program.as_ref()));
    }

    fn delete_program(&self, program: ProgramHandle) {
        let removed = {
            let mut objects = self.objects.borrow_mut();
            objects.locations.retain(|_, (owner, _)| *owner != program.0);
            objects.programs.remove(&program.0)
        };
        if let Some(program) = removed {
            with_gl!(self, gl => gl.delete_program(Some(&program)));
        }
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform> {
        let Some(program) = self.program(program) else {
            return Vec::new();
        };
        let count = with_gl!(self, gl => gl.get_program_parameter(&program, Gl::ACTIVE_UNIFORMS))
            .as_f64()
            .unwrap_or(0.0) as u32;
        (0..count)
            .filter_map(|index| with_gl!(self, gl => gl.get_active_uniform(&program, index)))
            .map(|info| {
                let name = info.name();
                ActiveUniform {
                    // arrays report their first element
                    name: name.strip_suffix("[0]").unwrap_or(&name).to_string(),
                    is_sampler: info.type_() == Gl::SAMPLER_2D,
                }
            })
            .collect()
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let owner = program.0;
        let program = self.program(program)?;
        let location = with_gl!(self, gl => gl.get_uniform_location(&program, name))
            .map(|location| (owner, location));
        track!(self, locations, location).map(UniformLocation)
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let program = self.program(program)?;
        let location = with_gl!(self, gl => gl.get_attrib_location(&program, name));
        u32::try_from(location).ok()
    }

    fn uniform(&self, location: UniformLocation, data: UniformData<'_>) {
        let objects = self.objects.borrow();
        let Some((_, location)) = objects.locations.get(&location.0) else {
            return;
        };
        let location = Some(location);
        with_gl!(self, gl => match data {
            UniformData::Int { components: 1, data } => gl.uniform1iv_with_i32_array(location, data),
            UniformData::Int { components: 2, data } => gl.uniform2iv_with_i32_array(location, data),
            UniformData::Int { components: 3, data } => gl.uniform3iv_with_i32_array(location, data),
            UniformData::Int { data, .. } => gl.uniform4iv_with_i32_array(location, data),
            UniformData::Float { components: 1, data } => gl.uniform1fv_with_f32_array(location, data),
            UniformData::Float { components: 2, data } => gl.uniform2fv_with_f32_array(location, data),
            UniformData::Float { components: 3, data } => gl.uniform3fv_with_f32_array(location, data),
            UniformData::Float { data, .. } => gl.uniform4fv_with_f32_array(location, data),
            UniformData::Matrix { dim: 2, data } => gl.uniform_matrix2fv_with_f32_array(location, false, data),
            UniformData::Matrix { dim: 3, data } => gl.uniform_matrix3fv_with_f32_array(location, false, data),
            UniformData::Matrix { data, .. } => gl.uniform_matrix4fv_with_f32_array(location, false, data),
        });
    }

    fn create_buffer(&self) -> Option<BufferHandle> {
        track!(self, buffers, with_gl!(self, gl => gl.create_buffer())).map(BufferHandle)
    }

    fn bind_array_buffer(&self, buffer: Option<BufferHandle>) {
        let buffer = buffer.and_then(|buffer| self.objects.borrow().buffers.get(&buffer.0).cloned());
        with_gl!(self, gl => gl.bind_buffer(Gl::ARRAY_BUFFER, buffer.as_ref()));
    }

    fn array_buffer_data(&self, data: &[u8]) {
        with_gl!(self, gl => gl.buffer_data_with_u8_array(Gl::ARRAY_BUFFER, data, Gl::STATIC_DRAW));
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        let removed = self.objects.borrow_mut().buffers.remove(&buffer.0);
        if let Some(buffer) = removed {
            with_gl!(self, gl => gl.delete_buffer(Some(&buffer)));
        }
    }

    fn vertex_attrib_pointer(&self, index: u32, size: i32, stride: i32, offset: i32) {
        with_gl!(self, gl => gl.vertex_attrib_pointer_with_i32(index, size, Gl::FLOAT, false, stride, offset));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        with_gl!(self, gl => gl.enable_vertex_attrib_array(index));
    }

    fn create_vertex_array(&self) -> Option<VertexArrayHandle> {
        let vao = match &self.backend {
            Backend::WebGl2(gl) => gl.create_vertex_array(),
            Backend::WebGl1 { vertex_arrays, .. } => {
                vertex_arrays.as_ref().and_then(|ext| ext.create_vertex_array_oes())
            }
        };
        track!(self, vertex_arrays, vao).map(VertexArrayHandle)
    }

    fn bind_vertex_array(&self, vao: Option<VertexArrayHandle>) {
        let vao = vao.and_then(|vao| self.objects.borrow().vertex_arrays.get(&vao.0).cloned());
        match &self.backend {
            Backend::WebGl2(gl) => gl.bind_vertex_array(vao.as_ref()),
            Backend::WebGl1 { vertex_arrays, .. } => {
                if let Some(ext) = vertex_arrays {
                    ext.bind_vertex_array_oes(vao.as_ref());
                }
            }
        }
    }

    fn delete_vertex_array(&self, vao: VertexArrayHandle) {
        let Some(vao) = self.objects.borrow_mut().vertex_arrays.remove(&vao.0) else {
            return;
        };
        match &self.backend {
            Backend::WebGl2(gl) => gl.delete_vertex_array(Some(&vao)),
            Backend::WebGl1 { vertex_arrays, .. } => {
                if let Some(ext) = vertex_arrays {
                    ext.delete_vertex_array_oes(Some(&vao));
                }
            }
        }
    }

    fn draw_arrays(&self, first: i32, count: i32) {
        with_gl!(self, gl => gl.draw_arrays(Gl::TRIANGLES, first, count));
    }

    fn create_texture(&self) -> Option<TextureHandle> {
        track!(self, textures, with_gl!(self, gl => gl.create_texture())).map(TextureHandle)
    }

    fn active_texture(&self, unit: u32) {
        with_gl!(self, gl => gl.active_texture(Gl::TEXTURE0 + unit));
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        let texture = texture.and_then(|texture| self.texture(texture));
        with_gl!(self, gl => gl.bind_texture(Gl::TEXTURE_2D, texture.as_ref()));
    }

    fn tex_wrap(&self, s: WrapMode, t: WrapMode) {
        with_gl!(self, gl => {
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_S, wrap_mode(s));
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_T, wrap_mode(t));
        });
    }

    fn tex_filter(&self, min: Filter, mag: Filter) {
        with_gl!(self, gl => {
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, filter(min));
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, filter(mag));
        });
    }

    fn tex_anisotropy(&self, value: f32) {
        with_gl!(self, gl => gl.tex_parameterf(Gl::TEXTURE_2D, TEXTURE_MAX_ANISOTROPY_EXT, value));
    }

    fn tex_image_pixels(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<&[u8]>,
    ) {
        let (internal, format, kind) = self.texture_format(format);
        let result = with_gl!(self, gl => gl
            .tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
                Gl::TEXTURE_2D,
                0,
                internal,
                width as i32,
                height as i32,
                0,
                format,
                kind,
                pixels,
            ));
        if let Err(error) = result {
            log::warn!("texImage2D failed: {error:?}");
        }
    }

    fn tex_image_source(&self, source: &dyn MediaSource) -> Result<(), String> {
        let any = source.as_any();
        let internal = Gl::RGBA as i32;
        let result = if let Some(image) = any.downcast_ref::<ImageSource>() {
            match &self.backend {
                Backend::WebGl2(gl) => gl.tex_image_2d_with_u32_and_u32_and_html_image_element(
                    Gl::TEXTURE_2D, 0, internal, Gl::RGBA, Gl::UNSIGNED_BYTE, image.element(),
                ),
                Backend::WebGl1 { gl, .. } => gl.tex_image_2d_with_u32_and_u32_and_image(
                    Gl::TEXTURE_2D, 0, internal, Gl::RGBA, Gl::UNSIGNED_BYTE, image.element(),
                ),
            }
        } else if let Some(video) = any.downcast_ref::<VideoSource>() {
            match &self.backend {
                Backend::WebGl2(gl) => gl.tex_image_2d_with_u32_and_u32_and_html_video_element(
                    Gl::TEXTURE_2D, 0, internal, Gl::RGBA, Gl::UNSIGNED_BYTE, video.element(),
                ),
                Backend::WebGl1 { gl, .. } => gl.tex_image_2d_with_u32_and_u32_and_video(
                    Gl::TEXTURE_2D, 0, internal, Gl::RGBA, Gl::UNSIGNED_BYTE, video.element(),
                ),
            }
        } else if let Some(canvas) = any.downcast_ref::<CanvasSource>() {
            match &self.backend {
                Backend::WebGl2(gl) => gl.tex_image_2d_with_u32_and_u32_and_html_canvas_element(
                    Gl::TEXTURE_2D, 0, internal, Gl::RGBA, Gl::UNSIGNED_BYTE, canvas.element(),
                ),
                Backend::WebGl1 { gl, .. } => gl.tex_image_2d_with_u32_and_u32_and_canvas(
                    Gl::TEXTURE_2D, 0, internal, Gl::RGBA, Gl::UNSIGNED_BYTE, canvas.element(),
                ),
            }
        } else {
            return Err(format!("{} source is not backed by a DOM element", source.kind()));
        };
        result.map_err(|error| format!("{error:?}"))
    }

    fn generate_mipmap(&self) {
        with_gl!(self, gl => gl.generate_mipmap(Gl::TEXTURE_2D));
    }

    fn delete_texture(&self, texture: TextureHandle) {
        let removed = self.objects.borrow_mut().textures.remove(&texture.0);
        if let Some(texture) = removed {
            with_gl!(self, gl => gl.delete_texture(Some(&texture)));
        }
    }

    fn create_framebuffer(&self) -> Option<FramebufferHandle> {
        track!(self, framebuffers, with_gl!(self, gl => gl.create_framebuffer())).map(FramebufferHandle)
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        let framebuffer = framebuffer
            .and_then(|framebuffer| self.objects.borrow().framebuffers.get(&framebuffer.0).cloned());
        with_gl!(self, gl => gl.bind_framebuffer(Gl::FRAMEBUFFER, framebuffer.as_ref()));
    }

    fn framebuffer_texture(&self, texture: TextureHandle) {
        let texture = self.texture(texture);
        with_gl!(self, gl => gl.framebuffer_texture_2d(
            Gl::FRAMEBUFFER,
            Gl::COLOR_ATTACHMENT0,
            Gl::TEXTURE_2D,
            texture.as_ref(),
            0,
        ));
    }

    fn create_renderbuffer(&self) -> Option<RenderbufferHandle> {
        track!(self, renderbuffers, with_gl!(self, gl => gl.create_renderbuffer())).map(RenderbufferHandle)
    }

    fn bind_renderbuffer(&self, renderbuffer: Option<RenderbufferHandle>) {
        let renderbuffer = renderbuffer.and_then(|renderbuffer| self.renderbuffer(renderbuffer));
        with_gl!(self, gl => gl.bind_renderbuffer(Gl::RENDERBUFFER, renderbuffer.as_ref()));
    }

    fn renderbuffer_depth_storage(&self, width: u32, height: u32) {
        with_gl!(self, gl => gl.renderbuffer_storage(
            Gl::RENDERBUFFER,
            Gl::DEPTH_COMPONENT16,
            width as i32,
            height as i32,
        ));
    }

    fn framebuffer_depth_renderbuffer(&self, renderbuffer: RenderbufferHandle) {
        let renderbuffer = self.renderbuffer(renderbuffer);
        with_gl!(self, gl => gl.framebuffer_renderbuffer(
            Gl::FRAMEBUFFER,
            Gl::DEPTH_ATTACHMENT,
            Gl::RENDERBUFFER,
            renderbuffer.as_ref(),
        ));
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferHandle) {
        let removed = self.objects.borrow_mut().framebuffers.remove(&framebuffer.0);
        if let Some(framebuffer) = removed {
            with_gl!(self, gl => gl.delete_framebuffer(Some(&framebuffer)));
        }
    }

    fn delete_renderbuffer(&self, renderbuffer: RenderbufferHandle) {
        let removed = self.objects.borrow_mut().renderbuffers.remove(&renderbuffer.0);
        if let Some(renderbuffer) = removed {
            with_gl!(self, gl => gl.delete_renderbuffer(Some(&renderbuffer)));
        }
    }
}
