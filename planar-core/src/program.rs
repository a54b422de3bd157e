/// Shader programs, compiled once per source pair
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::cache::CachedProgram;
use crate::context::RenderContext;
use crate::error::{PlanarError, Result};
use crate::gl::{ProgramHandle, ShaderHandle, ShaderKind, UniformLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program: {}", self.0)
    }
}

/// A linked program and what it exposes
#[derive(Debug)]
pub struct CompiledProgram {
    id: ProgramId,
    handle: ProgramHandle,
    shared: bool,
    compiled: bool,
    error: Option<PlanarError>,
    samplers: Vec<String>,
    locations: HashMap<String, UniformLocation>,
}

impl CompiledProgram {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Why compiling or linking failed.
    pub fn error(&self) -> Option<&PlanarError> {
        self.error.as_ref()
    }

    /// Sampler uniforms the linked program actually reads.
    pub fn samplers(&self) -> &[String] {
        &self.samplers
    }

    pub fn uses_sampler(&self, name: &str) -> bool {
        self.samplers.iter().any(|sampler| sampler == name)
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.locations.get(name).copied()
    }
}

/// Program used by a mesh. Several meshes may hold the same compiled program.
#[derive(Debug)]
pub struct Program {
    vertex_code: String,
    fragment_code: String,
    share: bool,
    compiled: Rc<CompiledProgram>,
}

impl Program {
    pub fn new(ctx: &mut RenderContext, vertex_code: &str, fragment_code: &str, share: bool) -> Result<Self> {
        let compiled = build(ctx, vertex_code, fragment_code, share)?;
        Ok(Self {
            vertex_code: vertex_code.to_string(),
            fragment_code: fragment_code.to_string(),
            share,
            compiled,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.compiled.id
    }

    pub fn compiled(&self) -> &CompiledProgram {
        &self.compiled
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.compiled
    }

    pub fn is_shared(&self) -> bool {
        self.compiled.shared
    }

    pub fn vertex_code(&self) -> &str {
        &self.vertex_code
    }

    pub fn fragment_code(&self) -> &str {
        &self.fragment_code
    }

    /// Links again after a context restore, going through the emptied cache so
    /// meshes that shared a program share the new one.
    pub fn restore(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.compiled = build(ctx, &self.vertex_code, &self.fragment_code, self.share)?;
        Ok(())
    }

    /// Deletes an unshared program. Shared ones live until the cache goes.
    pub fn dispose(&self, ctx: &RenderContext) {
        if !self.compiled.shared && !ctx.is_lost() {
            ctx.gl().delete_program(self.compiled.handle);
        }
    }
}

fn build(
    ctx: &mut RenderContext,
    vertex_code: &str,
    fragment_code: &str,
    share: bool,
) -> Result<Rc<CompiledProgram>> {
    let cached = ctx
        .cache
        .program(vertex_code, fragment_code)
        .map(|entry| (entry.vertex_shader, entry.fragment_shader, entry.shared.clone()));

    if let Some((vertex_shader, fragment_shader, shared)) = cached {
        if share {
            if let Some(program) = shared {
                return Ok(program);
            }
        }
        let program = Rc::new(link(ctx, vertex_shader, fragment_shader, share, None)?);
        if share {
            if let Some(entry) = ctx.cache.program_mut(vertex_code, fragment_code) {
                entry.shared = Some(Rc::clone(&program));
            }
        }
        return Ok(program);
    }

    let (vertex_shader, vertex_error) = compile(ctx, ShaderKind::Vertex, vertex_code)?;
    let (fragment_shader, fragment_error) = match compile(ctx, ShaderKind::Fragment, fragment_code) {
        Ok(compiled) => compiled,
        Err(error) => {
            ctx.gl().delete_shader(vertex_shader);
            return Err(error);
        }
    };
    let linked = link(
        ctx,
        vertex_shader,
        fragment_shader,
        share,
        vertex_error.or(fragment_error),
    );
    // only compiled programs keep their shaders in the cache
    if !linked.as_ref().is_ok_and(|program| program.compiled) {
        ctx.gl().delete_shader(vertex_shader);
        ctx.gl().delete_shader(fragment_shader);
    }
    let program = Rc::new(linked?);

    if program.compiled {
        ctx.cache.add_program(CachedProgram {
            vertex_code: vertex_code.to_string(),
            fragment_code: fragment_code.to_string(),
            vertex_shader,
            fragment_shader,
            shared: share.then(|| Rc::clone(&program)),
        });
    }
    Ok(program)
}

fn compile(
    ctx: &RenderContext,
    kind: ShaderKind,
    source: &str,
) -> Result<(ShaderHandle, Option<PlanarError>)> {
    let gl = ctx.gl();
    let shader = gl
        .create_shader(kind)
        .ok_or(PlanarError::ResourceCreation("shader"))?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);

    if ctx.is_production() || gl.shader_compile_status(shader) {
        return Ok((shader, None));
    }

    let error = PlanarError::ShaderCompile {
        kind,
        log: gl.shader_info_log(shader),
    };
    ctx.diagnostics().error("Program", error.to_string());
    for (index, line) in source.lines().enumerate() {
        log::debug!("{:>4}: {line}", index + 1);
    }
    Ok((shader, Some(error)))
}

fn link(
    ctx: &mut RenderContext,
    vertex_shader: ShaderHandle,
    fragment_shader: ShaderHandle,
    shared: bool,
    shader_error: Option<PlanarError>,
) -> Result<CompiledProgram> {
    let id = ProgramId(ctx.next_id());
    let gl = ctx.gl();
    let handle = gl
        .create_program()
        .ok_or(PlanarError::ResourceCreation("program"))?;
    gl.attach_shader(handle, vertex_shader);
    gl.attach_shader(handle, fragment_shader);
    gl.link_program(handle);

    let mut error = shader_error;
    if error.is_none() && !ctx.is_production() && !gl.program_link_status(handle) {
        let link_error = PlanarError::ProgramLink(gl.program_info_log(handle));
        ctx.diagnostics().error(id, link_error.to_string());
        error = Some(link_error);
    }

    let mut samplers = Vec::new();
    let mut locations = HashMap::new();
    for uniform in gl.active_uniforms(handle) {
        if let Some(location) = gl.uniform_location(handle, &uniform.name) {
            locations.insert(uniform.name.clone(), location);
        }
        if uniform.is_sampler {
            samplers.push(uniform.name);
        }
    }

    log::trace!("linked {id} with {} samplers", samplers.len());
    Ok(CompiledProgram {
        id,
        handle,
        shared,
        compiled: error.is_none(),
        error,
        samplers,
        locations,
    })
}
