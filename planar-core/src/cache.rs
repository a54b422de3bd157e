/// Shared GPU resources: geometries, programs and image textures
use std::collections::HashMap;
use std::rc::Rc;

use crate::geometry::{clamp_segments, GeometryData, GeometryId};
use crate::gl::{GlContext, ProgramHandle, ShaderHandle, TextureHandle};
use crate::program::CompiledProgram;
use crate::source::{MediaSource, SourceKind};
use crate::texture::SharedTexture;

/// Compiled shader pair, plus the program linked from it when its creator
/// asked for sharing
#[derive(Debug)]
pub struct CachedProgram {
    pub vertex_code: String,
    pub fragment_code: String,
    pub vertex_shader: ShaderHandle,
    pub fragment_shader: ShaderHandle,
    pub shared: Option<Rc<CompiledProgram>>,
}

#[derive(Debug)]
struct CachedTexture {
    url: String,
    texture: SharedTexture,
}

#[derive(Debug, Default)]
pub struct CacheManager {
    geometries: HashMap<GeometryId, Rc<GeometryData>>,
    programs: Vec<CachedProgram>,
    textures: Vec<CachedTexture>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid data for the given segments, built on first request.
    pub fn geometry(&mut self, width_segments: u32, height_segments: u32) -> Rc<GeometryData> {
        let width = clamp_segments(width_segments);
        let height = clamp_segments(height_segments);
        let id = GeometryId::from_segments(width, height);
        Rc::clone(
            self.geometries
                .entry(id)
                .or_insert_with(|| Rc::new(GeometryData::plane(width, height))),
        )
    }

    pub fn has_geometry(&self, id: GeometryId) -> bool {
        self.geometries.contains_key(&id)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Entry whose sources match both shaders exactly.
    pub fn program(&self, vertex_code: &str, fragment_code: &str) -> Option<&CachedProgram> {
        self.programs
            .iter()
            .find(|entry| entry.vertex_code == vertex_code && entry.fragment_code == fragment_code)
    }

    pub fn program_mut(&mut self, vertex_code: &str, fragment_code: &str) -> Option<&mut CachedProgram> {
        self.programs
            .iter_mut()
            .find(|entry| entry.vertex_code == vertex_code && entry.fragment_code == fragment_code)
    }

    pub fn add_program(&mut self, program: CachedProgram) {
        self.programs.push(program);
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Handles of the shared programs currently cached.
    pub fn program_handles(&self) -> Vec<ProgramHandle> {
        self.programs
            .iter()
            .filter_map(|entry| entry.shared.as_ref().map(|program| program.handle()))
            .collect()
    }

    /// Cached texture for an image source with the same URL.
    ///
    /// Only images are looked up; video and canvas sources never hit the
    /// cache.
    pub fn texture_from_source(&self, source: &dyn MediaSource) -> Option<SharedTexture> {
        if source.kind() != SourceKind::Image {
            return None;
        }
        let url = source.url()?;
        self.textures
            .iter()
            .find(|entry| entry.url == url && entry.texture.borrow().is_valid())
            .map(|entry| Rc::clone(&entry.texture))
    }

    pub fn add_texture(&mut self, url: String, texture: SharedTexture) {
        if self.textures.iter().any(|entry| Rc::ptr_eq(&entry.texture, &texture)) {
            return;
        }
        self.textures.push(CachedTexture { url, texture });
    }

    pub fn remove_texture(&mut self, texture: &SharedTexture) {
        self.textures.retain(|entry| !Rc::ptr_eq(&entry.texture, texture));
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_handles(&self) -> Vec<TextureHandle> {
        self.textures
            .iter()
            .filter_map(|entry| entry.texture.borrow().handle())
            .collect()
    }

    /// Forgets programs without touching the GPU; used once the context is lost.
    pub fn clear_programs(&mut self) {
        self.programs.clear();
    }

    pub fn clear_textures(&mut self) {
        self.textures.clear();
    }

    /// Deletes cached shaders and shared programs, then forgets them.
    pub fn delete_programs(&mut self, gl: &dyn GlContext) {
        for entry in self.programs.drain(..) {
            if let Some(program) = entry.shared {
                gl.delete_program(program.handle());
            }
            gl.delete_shader(entry.vertex_shader);
            gl.delete_shader(entry.fragment_shader);
        }
    }
}
