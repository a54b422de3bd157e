/// Recording context without a GPU
///
/// Keeps an object table the way a browser context does, validates handles,
/// emulates compile and link failures, and records every state changing call
/// so tests and native tools can inspect what a frame did.
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::*;

/// One recorded context call
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    Viewport(i32, i32, i32, i32),
    Clear(ClearMask),
    Enable(Capability),
    Disable(Capability),
    BlendFunc(BlendFactor, BlendFactor),
    DepthFunc(DepthFunc),
    DepthMask(bool),
    CullFace(Face),
    PixelStore(PixelStore),
    CompileShader(ShaderHandle),
    LinkProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    Uniform { program: ProgramHandle, name: String },
    BindVertexArray(Option<VertexArrayHandle>),
    BindTexture { unit: u32, texture: Option<TextureHandle> },
    TexImage { texture: TextureHandle, width: u32, height: u32 },
    GenerateMipmap(TextureHandle),
    BindFramebuffer(Option<FramebufferHandle>),
    DrawArrays { program: Option<ProgramHandle>, count: i32 },
    DeleteShader(ShaderHandle),
    DeleteProgram(ProgramHandle),
    DeleteTexture(TextureHandle),
    DeleteFramebuffer(FramebufferHandle),
}

#[derive(Debug)]
struct ShaderObject {
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<u32>,
    linked: bool,
    log: String,
    uniforms: Vec<ActiveUniform>,
    attributes: Vec<String>,
}

#[derive(Debug)]
struct State {
    version: GlVersion,
    extensions: Vec<String>,
    lost: bool,
    fail_uploads: bool,
    failing_textures: usize,
    buffer_size: (u32, u32),
    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    locations: HashMap<u32, (u32, String)>,
    buffers: HashSet<u32>,
    vertex_arrays: HashSet<u32>,
    textures: HashMap<u32, (u32, u32)>,
    framebuffers: HashSet<u32>,
    renderbuffers: HashSet<u32>,
    current_program: Option<ProgramHandle>,
    active_unit: u32,
    bound_texture: Option<u32>,
    calls: Vec<GlCall>,
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: GlCall) {
        if !self.lost {
            self.calls.push(call);
        }
    }
}

/// Shared handle onto a recording context. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct HeadlessGl {
    state: Rc<RefCell<State>>,
}

impl HeadlessGl {
    /// New context exposing every extension queried for `version`.
    pub fn new(version: GlVersion) -> Self {
        let extensions = version
            .extension_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        Self {
            state: Rc::new(RefCell::new(State {
                version,
                extensions,
                lost: false,
                fail_uploads: false,
                failing_textures: 0,
                buffer_size: (300, 150),
                next_id: 0,
                shaders: HashMap::new(),
                programs: HashMap::new(),
                locations: HashMap::new(),
                buffers: HashSet::new(),
                vertex_arrays: HashSet::new(),
                textures: HashMap::new(),
                framebuffers: HashSet::new(),
                renderbuffers: HashSet::new(),
                current_program: None,
                active_unit: 0,
                bound_texture: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Replaces the advertised extensions.
    pub fn with_extensions(self, names: &[&str]) -> Self {
        self.state.borrow_mut().extensions = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Makes every media upload fail, as a tainted cross-origin image would.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.state.borrow_mut().fail_uploads = fail;
    }

    /// Makes the next `count` texture creations fail.
    pub fn fail_next_textures(&self, count: usize) {
        self.state.borrow_mut().failing_textures = count;
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count_calls(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Program bound for each recorded draw, in order.
    pub fn draw_order(&self) -> Vec<Option<ProgramHandle>> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                GlCall::DrawArrays { program, .. } => Some(*program),
                _ => None,
            })
            .collect()
    }

    /// Number of uploads recorded for a uniform name, across programs.
    pub fn uniform_uploads(&self, name: &str) -> usize {
        self.count_calls(|call| matches!(call, GlCall::Uniform { name: n, .. } if n == name))
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn is_texture_live(&self, texture: TextureHandle) -> bool {
        self.state.borrow().textures.contains_key(&texture.0)
    }

    pub fn is_program_live(&self, program: ProgramHandle) -> bool {
        self.state.borrow().programs.contains_key(&program.0)
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.state.borrow().textures.get(&texture.0).copied()
    }

    fn vertex_arrays_supported(state: &State) -> bool {
        state.version == GlVersion::WebGl2
            || state.extensions.iter().any(|ext| ext == "OES_vertex_array_object")
    }
}

/// Uniform and attribute declarations found in GLSL source.
fn parse_declarations(source: &str, uniforms: &mut Vec<ActiveUniform>, attributes: &mut Vec<String>) {
    let code: Vec<&str> = source
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect();
    let code = code.join("\n");
    for statement in code.split([';', '{', '}']) {
        let statement = statement.trim_start();
        let statement = match statement.strip_prefix("layout") {
            Some(rest) => rest.rsplit(')').next().unwrap_or(rest),
            None => statement,
        };
        let mut tokens = statement.split_whitespace();
        let Some(qualifier) = tokens.next() else {
            continue;
        };
        let mut rest = tokens.skip_while(|token| matches!(*token, "lowp" | "mediump" | "highp"));
        let (Some(kind), Some(name)) = (rest.next(), rest.next()) else {
            continue;
        };
        let name = name.split('[').next().unwrap_or(name).to_string();
        match qualifier {
            "uniform" => {
                if !uniforms.iter().any(|uniform| uniform.name == name) {
                    uniforms.push(ActiveUniform {
                        name,
                        is_sampler: kind.starts_with("sampler"),
                    });
                }
            }
            "attribute" | "in" => {
                if !attributes.contains(&name) {
                    attributes.push(name);
                }
            }
            _ => {}
        }
    }
}

impl GlContext for HeadlessGl {
    fn version(&self) -> GlVersion {
        self.state.borrow().version
    }

    fn is_context_lost(&self) -> bool {
        self.state.borrow().lost
    }

    fn has_extension(&self, name: &str) -> bool {
        self.state.borrow().extensions.iter().any(|ext| ext == name)
    }

    fn max_anisotropy(&self) -> f32 {
        if self.has_extension("EXT_texture_filter_anisotropic") {
            16.0
        } else {
            1.0
        }
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.state.borrow().buffer_size
    }

    fn set_drawing_buffer_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().buffer_size = (width, height);
    }

    fn lose_context(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return false;
        }
        state.lost = true;
        state.shaders.clear();
        state.programs.clear();
        state.locations.clear();
        state.buffers.clear();
        state.vertex_arrays.clear();
        state.textures.clear();
        state.framebuffers.clear();
        state.renderbuffers.clear();
        state.current_program = None;
        state.bound_texture = None;
        true
    }

    fn restore_context(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let was_lost = state.lost;
        state.lost = false;
        was_lost
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state.borrow_mut().record(GlCall::Viewport(x, y, width, height));
    }

    fn clear_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {}

    fn clear(&self, mask: ClearMask) {
        self.state.borrow_mut().record(GlCall::Clear(mask));
    }

    fn enable(&self, capability: Capability) {
        self.state.borrow_mut().record(GlCall::Enable(capability));
    }

    fn disable(&self, capability: Capability) {
        self.state.borrow_mut().record(GlCall::Disable(capability));
    }

    fn blend_func_separate(
        &self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        _src_alpha: BlendFactor,
        _dst_alpha: BlendFactor,
    ) {
        self.state.borrow_mut().record(GlCall::BlendFunc(src_rgb, dst_rgb));
    }

    fn depth_func(&self, func: DepthFunc) {
        self.state.borrow_mut().record(GlCall::DepthFunc(func));
    }

    fn depth_mask(&self, write: bool) {
        self.state.borrow_mut().record(GlCall::DepthMask(write));
    }

    fn cull_face(&self, face: Face) {
        self.state.borrow_mut().record(GlCall::CullFace(face));
    }

    fn pixel_store(&self, store: PixelStore) {
        self.state.borrow_mut().record(GlCall::PixelStore(store));
    }

    fn create_shader(&self, _kind: ShaderKind) -> Option<ShaderHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return None;
        }
        let id = state.next();
        state.shaders.insert(
            id,
            ShaderObject {
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Some(ShaderHandle(id))
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        if let Some(object) = self.state.borrow_mut().shaders.get_mut(&shader.0) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        state.record(GlCall::CompileShader(shader));
        if let Some(object) = state.shaders.get_mut(&shader.0) {
            if object.source.trim().is_empty() {
                object.compiled = false;
                object.log = "ERROR: 0:0: empty shader source".to_string();
            } else if let Some(line) = object.source.lines().position(|l| l.trim_start().starts_with("#error")) {
                object.compiled = false;
                object.log = format!("ERROR: 0:{}: '#error' : user defined error", line + 1);
            } else {
                object.compiled = true;
                object.log.clear();
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader.0)
            .is_some_and(|object| object.compiled)
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader.0)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader.0).is_some() {
            state.record(GlCall::DeleteShader(shader));
        }
    }

    fn create_program(&self) -> Option<ProgramHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return None;
        }
        let id = state.next();
        state.programs.insert(id, ProgramObject::default());
        Some(ProgramHandle(id))
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        let mut state = self.state.borrow_mut();
        if !state.shaders.contains_key(&shader.0) {
            return;
        }
        if let Some(object) = state.programs.get_mut(&program.0) {
            object.shaders.push(shader.0);
        }
    }

    fn link_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        state.record(GlCall::LinkProgram(program));
        let Some(attached) = state.programs.get(&program.0).map(|object| object.shaders.clone()) else {
            return;
        };
        let mut uniforms = Vec::new();
        let mut attributes = Vec::new();
        let mut compiled = attached.len() >= 2;
        for id in &attached {
            match state.shaders.get(id) {
                Some(shader) if shader.compiled => {
                    parse_declarations(&shader.source, &mut uniforms, &mut attributes)
                }
                _ => compiled = false,
            }
        }
        if let Some(object) = state.programs.get_mut(&program.0) {
            object.linked = compiled;
            if compiled {
                object.log.clear();
                object.uniforms = uniforms;
                object.attributes = attributes;
            } else {
                object.log = "ERROR: attached shaders did not compile".to_string();
            }
        }
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .is_some_and(|object| object.linked)
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.borrow_mut();
        state.current_program = program;
        state.record(GlCall::UseProgram(program));
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.borrow_mut();
        if state.programs.remove(&program.0).is_some() {
            state.locations.retain(|_, (owner, _)| *owner != program.0);
            state.record(GlCall::DeleteProgram(program));
        }
    }

    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform> {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .map(|object| object.uniforms.clone())
            .unwrap_or_default()
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();
        let declared = state
            .programs
            .get(&program.0)
            .is_some_and(|object| object.linked && object.uniforms.iter().any(|u| u.name == name));
        if !declared {
            return None;
        }
        let existing = state
            .locations
            .iter()
            .find(|(_, (owner, n))| *owner == program.0 && n == name)
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = state.next();
                state.locations.insert(id, (program.0, name.to_string()));
                id
            }
        };
        Some(UniformLocation(id))
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .and_then(|object| object.attributes.iter().position(|a| a == name))
            .map(|index| index as u32)
    }

    fn uniform(&self, location: UniformLocation, _data: UniformData<'_>) {
        let mut state = self.state.borrow_mut();
        if let Some((program, name)) = state.locations.get(&location.0).cloned() {
            state.record(GlCall::Uniform {
                program: ProgramHandle(program),
                name,
            });
        }
    }

    fn create_buffer(&self) -> Option<BufferHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return None;
        }
        let id = state.next();
        state.buffers.insert(id);
        Some(BufferHandle(id))
    }

    fn bind_array_buffer(&self, _buffer: Option<BufferHandle>) {}

    fn array_buffer_data(&self, _data: &[u8]) {}

    fn delete_buffer(&self, buffer: BufferHandle) {
        self.state.borrow_mut().buffers.remove(&buffer.0);
    }

    fn vertex_attrib_pointer(&self, _index: u32, _size: i32, _stride: i32, _offset: i32) {}

    fn enable_vertex_attrib_array(&self, _index: u32) {}

    fn create_vertex_array(&self) -> Option<VertexArrayHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost || !Self::vertex_arrays_supported(&state) {
            return None;
        }
        let id = state.next();
        state.vertex_arrays.insert(id);
        Some(VertexArrayHandle(id))
    }

    fn bind_vertex_array(&self, vao: Option<VertexArrayHandle>) {
        self.state.borrow_mut().record(GlCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: VertexArrayHandle) {
        self.state.borrow_mut().vertex_arrays.remove(&vao.0);
    }

    fn draw_arrays(&self, _first: i32, count: i32) {
        let mut state = self.state.borrow_mut();
        let program = state.current_program;
        state.record(GlCall::DrawArrays { program, count });
    }

    fn create_texture(&self) -> Option<TextureHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return None;
        }
        if state.failing_textures > 0 {
            state.failing_textures -= 1;
            return None;
        }
        let id = state.next();
        state.textures.insert(id, (0, 0));
        Some(TextureHandle(id))
    }

    fn active_texture(&self, unit: u32) {
        self.state.borrow_mut().active_unit = unit;
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        let mut state = self.state.borrow_mut();
        state.bound_texture = texture.map(|t| t.0);
        let unit = state.active_unit;
        state.record(GlCall::BindTexture { unit, texture });
    }

    fn tex_wrap(&self, _s: WrapMode, _t: WrapMode) {}

    fn tex_filter(&self, _min: Filter, _mag: Filter) {}

    fn tex_anisotropy(&self, _value: f32) {}

    fn tex_image_pixels(
        &self,
        width: u32,
        height: u32,
        _format: TextureFormat,
        _pixels: Option<&[u8]>,
    ) {
        let mut state = self.state.borrow_mut();
        let Some(id) = state.bound_texture else {
            return;
        };
        if let Some(size) = state.textures.get_mut(&id) {
            *size = (width, height);
            state.record(GlCall::TexImage {
                texture: TextureHandle(id),
                width,
                height,
            });
        }
    }

    fn tex_image_source(&self, source: &dyn MediaSource) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        if state.fail_uploads {
            return Err("the source is not allowed to be uploaded".to_string());
        }
        let Some(id) = state.bound_texture else {
            return Err("no texture bound".to_string());
        };
        let (width, height) = source.size();
        if let Some(size) = state.textures.get_mut(&id) {
            *size = (width, height);
            state.record(GlCall::TexImage {
                texture: TextureHandle(id),
                width,
                height,
            });
        }
        Ok(())
    }

    fn generate_mipmap(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.bound_texture {
            state.record(GlCall::GenerateMipmap(TextureHandle(id)));
        }
    }

    fn delete_texture(&self, texture: TextureHandle) {
        let mut state = self.state.borrow_mut();
        if state.textures.remove(&texture.0).is_some() {
            state.record(GlCall::DeleteTexture(texture));
        }
    }

    fn create_framebuffer(&self) -> Option<FramebufferHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return None;
        }
        let id = state.next();
        state.framebuffers.insert(id);
        Some(FramebufferHandle(id))
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        self.state.borrow_mut().record(GlCall::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture(&self, _texture: TextureHandle) {}

    fn create_renderbuffer(&self) -> Option<RenderbufferHandle> {
        let mut state = self.state.borrow_mut();
        if state.lost {
            return None;
        }
        let id = state.next();
        state.renderbuffers.insert(id);
        Some(RenderbufferHandle(id))
    }

    fn bind_renderbuffer(&self, _renderbuffer: Option<RenderbufferHandle>) {}

    fn renderbuffer_depth_storage(&self, _width: u32, _height: u32) {}

    fn framebuffer_depth_renderbuffer(&self, _renderbuffer: RenderbufferHandle) {}

    fn delete_framebuffer(&self, framebuffer: FramebufferHandle) {
        let mut state = self.state.borrow_mut();
        if state.framebuffers.remove(&framebuffer.0) {
            state.record(GlCall::DeleteFramebuffer(framebuffer));
        }
    }

    fn delete_renderbuffer(&self, renderbuffer: RenderbufferHandle) {
        self.state.borrow_mut().renderbuffers.remove(&renderbuffer.0);
    }
}

/// Hands out [`HeadlessGl`] contexts and keeps a clone of the last one.
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    disabled: Vec<GlVersion>,
    extensions: Option<Vec<String>>,
    last: RefCell<Option<HeadlessGl>>,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that refuses WebGL2, forcing the WebGL1 fallback.
    pub fn webgl1_only() -> Self {
        Self {
            disabled: vec![GlVersion::WebGl2],
            ..Self::default()
        }
    }

    /// Factory that refuses every context.
    pub fn unavailable() -> Self {
        Self {
            disabled: vec![GlVersion::WebGl2, GlVersion::WebGl1],
            ..Self::default()
        }
    }

    pub fn with_extensions(mut self, names: &[&str]) -> Self {
        self.extensions = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    /// Last context created, sharing state with the renderer's copy.
    pub fn last(&self) -> Option<HeadlessGl> {
        self.last.borrow().clone()
    }
}

impl ContextFactory for HeadlessFactory {
    fn create(
        &self,
        version: GlVersion,
        _attributes: &ContextAttributes,
    ) -> Option<Box<dyn GlContext>> {
        if self.disabled.contains(&version) {
            return None;
        }
        let gl = HeadlessGl::new(version);
        if let Some(extensions) = &self.extensions {
            gl.state.borrow_mut().extensions = extensions.clone();
        }
        *self.last.borrow_mut() = Some(gl.clone());
        Some(Box::new(gl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "attribute vec3 aVertexPosition;\nuniform mat4 uMVMatrix;\nvoid main() {}";
    const FS: &str = "precision mediump float;\nuniform highp float uTime;\nuniform sampler2D uSampler0;\nvoid main() {}";

    fn link(gl: &HeadlessGl, vs: &str, fs: &str) -> ProgramHandle {
        let program = gl.create_program().unwrap();
        for (kind, source) in [(ShaderKind::Vertex, vs), (ShaderKind::Fragment, fs)] {
            let shader = gl.create_shader(kind).unwrap();
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        program
    }

    #[test]
    fn test_link_introspects_uniforms() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let program = link(&gl, VS, FS);
        assert!(gl.program_link_status(program));

        let uniforms = gl.active_uniforms(program);
        let names: Vec<_> = uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["uMVMatrix", "uTime", "uSampler0"]);
        assert!(uniforms[2].is_sampler);
        assert_eq!(gl.attrib_location(program, "aVertexPosition"), Some(0));
        assert!(gl.uniform_location(program, "uMissing").is_none());
    }

    #[test]
    fn test_error_directive_fails_compile() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let shader = gl.create_shader(ShaderKind::Fragment).unwrap();
        gl.shader_source(shader, "void main() {}\n#error broken");
        gl.compile_shader(shader);
        assert!(!gl.shader_compile_status(shader));
        assert!(gl.shader_info_log(shader).contains("0:2"));
    }

    #[test]
    fn test_loss_invalidates_objects() {
        let gl = HeadlessGl::new(GlVersion::WebGl2);
        let texture = gl.create_texture().unwrap();
        assert!(gl.lose_context());
        assert!(!gl.is_texture_live(texture));
        assert!(gl.create_texture().is_none());
        assert!(gl.restore_context());
        assert!(gl.create_texture().is_some());
    }

    #[test]
    fn test_webgl1_vertex_arrays_need_extension() {
        let gl = HeadlessGl::new(GlVersion::WebGl1).with_extensions(&[]);
        assert!(gl.create_vertex_array().is_none());
    }

    #[test]
    fn test_factory_fallback() {
        let factory = HeadlessFactory::webgl1_only();
        let attributes = ContextAttributes {
            alpha: true,
            antialias: true,
            premultiplied_alpha: false,
            depth: true,
            fail_if_major_performance_caveat: true,
            preserve_drawing_buffer: false,
            stencil: false,
        };
        assert!(factory.create(GlVersion::WebGl2, &attributes).is_none());
        let gl = factory.create(GlVersion::WebGl1, &attributes).unwrap();
        assert_eq!(gl.version(), GlVersion::WebGl1);
        assert!(factory.last().is_some());
    }
}
