/// Textures: upload, parameters, texture matrix and sharing
///
/// The GPU side of a texture lives in a [`SharedTexture`]. A copy holds the
/// same shared state as its origin, so it sees every resize and re-upload of
/// the origin without owning the handle.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use nalgebra::{Matrix4, UnitQuaternion, Vector2, Vector3};

use crate::context::RenderContext;
use crate::error::{PlanarError, Result};
use crate::gl::{
    is_power_of_two, Filter, GlVersion, PixelStore, TextureFormat, TextureHandle, UniformData,
    WrapMode,
};
use crate::program::{CompiledProgram, ProgramId};
use crate::source::{LoadState, MediaSource, SourceKind};
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Texture: {}", self.0)
    }
}

/// Storage requested for render target textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FloatingPoint {
    #[default]
    None,
    HalfFloat,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureParams {
    /// Sampler uniform name, `uSampler{unit}` when omitted.
    pub sampler: Option<String>,
    pub premultiply_alpha: bool,
    /// Defaults to true for media, false for render targets.
    pub flip_y: Option<bool>,
    pub anisotropy: f32,
    /// Defaults to true for images only.
    pub generate_mipmap: Option<bool>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    /// Defaults to `LinearMipmapNearest` with mipmaps, `Linear` without.
    pub min_filter: Option<Filter>,
    pub mag_filter: Filter,
    pub floating_point: FloatingPoint,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            sampler: None,
            premultiply_alpha: false,
            flip_y: None,
            anisotropy: 1.0,
            generate_mipmap: None,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            min_filter: None,
            mag_filter: Filter::Linear,
            floating_point: FloatingPoint::None,
        }
    }
}

impl TextureParams {
    pub fn with_sampler(mut self, sampler: impl Into<String>) -> Self {
        self.sampler = Some(sampler.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureState {
    /// Holds the placeholder pixel.
    Empty,
    /// Waiting for its source.
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Media,
    RenderTarget,
}

/// GPU state shared by an origin texture and its copies
pub struct GpuTexture {
    origin: TextureId,
    kind: TextureKind,
    handle: Option<TextureHandle>,
    source: Option<Rc<dyn MediaSource>>,
    size: (u32, u32),
    params: TextureParams,
    format: TextureFormat,
    state: TextureState,
    valid: bool,
    params_dirty: bool,
    epoch: u32,
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTexture")
            .field("origin", &self.origin)
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .field("source", &self.source.as_ref().map(|s| s.kind()))
            .field("size", &self.size)
            .field("state", &self.state)
            .field("valid", &self.valid)
            .finish()
    }
}

impl GpuTexture {
    pub fn origin(&self) -> TextureId {
        self.origin
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

pub type SharedTexture = Rc<RefCell<GpuTexture>>;

type TextureCallback = Box<dyn FnMut(&Texture)>;

struct PendingSource {
    source: Rc<dyn MediaSource>,
    on_success: Option<Box<dyn FnOnce(&Texture)>>,
    on_error: Option<Box<dyn FnOnce(&PlanarError)>>,
}

/// Outcome of polling a source handed to [`Texture::load_source`]
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Loaded(TextureId),
    Failed(TextureId, PlanarError),
}

pub struct Texture {
    id: TextureId,
    unit: u32,
    sampler: String,
    matrix_name: String,
    gpu: SharedTexture,
    copied_from: Option<TextureId>,
    scale: Vector2<f32>,
    offset: Vector2<f32>,
    parent_size: (f32, f32),
    matrix: Matrix4<f32>,
    /// Program the sampler and matrix uniforms were last sent to.
    uniforms_sent_to: Option<ProgramId>,
    /// Canvas textures upload on every draw while set.
    pub should_update: bool,
    pending: Option<PendingSource>,
    uploaded_notified: bool,
    on_source_loaded: Option<TextureCallback>,
    on_source_uploaded: Option<TextureCallback>,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("unit", &self.unit)
            .field("sampler", &self.sampler)
            .field("copied_from", &self.copied_from)
            .field("gpu", &self.gpu)
            .finish()
    }
}

impl Texture {
    /// Media texture holding one opaque black pixel until a source arrives.
    pub fn new(ctx: &mut RenderContext, params: &TextureParams, unit: u32) -> Result<Self> {
        let id = TextureId(ctx.next_id());
        let gpu = Rc::new(RefCell::new(GpuTexture {
            origin: id,
            kind: TextureKind::Media,
            handle: None,
            source: None,
            size: (1, 1),
            params: params.clone(),
            format: TextureFormat::Rgba8,
            state: TextureState::Empty,
            valid: true,
            params_dirty: false,
            epoch: ctx.epoch(),
        }));
        let texture = Self::with_gpu(id, params, unit, gpu, None);
        texture.create_handle(ctx)?;
        Ok(texture)
    }

    /// Color attachment of a render target, allocated at `size`.
    pub fn for_render_target(
        ctx: &mut RenderContext,
        params: &TextureParams,
        size: (u32, u32),
    ) -> Result<Self> {
        let id = TextureId(ctx.next_id());
        let format = resolve_format(ctx, params.floating_point);
        let gpu = Rc::new(RefCell::new(GpuTexture {
            origin: id,
            kind: TextureKind::RenderTarget,
            handle: None,
            source: None,
            size,
            params: params.clone(),
            format,
            state: TextureState::Ready,
            valid: true,
            params_dirty: false,
            epoch: ctx.epoch(),
        }));
        let mut texture = Self::with_gpu(id, params, 0, gpu, None);
        texture.parent_size = (size.0 as f32, size.1 as f32);
        texture.create_handle(ctx)?;
        texture.update_matrix();
        Ok(texture)
    }

    /// Logical texture sharing `other`'s GPU state from the start.
    pub fn new_copy(ctx: &mut RenderContext, other: &Texture, params: &TextureParams, unit: u32) -> Self {
        let id = TextureId(ctx.next_id());
        let mut texture = Self::with_gpu(id, params, unit, Rc::clone(&other.gpu), Some(other.origin()));
        texture.parent_size = other.parent_size;
        texture.update_matrix();
        texture
    }

    fn with_gpu(
        id: TextureId,
        params: &TextureParams,
        unit: u32,
        gpu: SharedTexture,
        copied_from: Option<TextureId>,
    ) -> Self {
        let sampler = params
            .sampler
            .clone()
            .unwrap_or_else(|| format!("uSampler{unit}"));
        Self {
            id,
            unit,
            matrix_name: format!("{sampler}Matrix"),
            sampler,
            gpu,
            copied_from,
            scale: Vector2::new(1.0, 1.0),
            offset: Vector2::zeros(),
            parent_size: (1.0, 1.0),
            matrix: Matrix4::identity(),
            uniforms_sent_to: None,
            should_update: true,
            pending: None,
            uploaded_notified: false,
            on_source_loaded: None,
            on_source_uploaded: None,
        }
    }

    fn create_handle(&self, ctx: &RenderContext) -> Result<()> {
        let gl = ctx.gl();
        let handle = gl
            .create_texture()
            .ok_or(PlanarError::ResourceCreation("texture"))?;
        let mut gpu = self.gpu.borrow_mut();
        gpu.handle = Some(handle);
        gpu.valid = true;
        gpu.epoch = ctx.epoch();
        ctx.bind_texture(self.unit, handle);
        match gpu.kind {
            TextureKind::Media => {
                gl.tex_image_pixels(1, 1, TextureFormat::Rgba8, Some(&[0, 0, 0, 255]));
            }
            TextureKind::RenderTarget => {
                let (width, height) = gpu.size;
                gl.pixel_store(PixelStore::default());
                gl.tex_image_pixels(width, height, gpu.format, None);
                apply_parameters(ctx, &mut gpu, self.id);
            }
        }
        Ok(())
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn sampler_name(&self) -> &str {
        &self.sampler
    }

    pub fn matrix_name(&self) -> &str {
        &self.matrix_name
    }

    pub fn kind(&self) -> TextureKind {
        self.gpu.borrow().kind
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.gpu.borrow().source.as_ref().map(|source| source.kind())
    }

    pub fn state(&self) -> TextureState {
        if self.pending.is_some() {
            return TextureState::Loading;
        }
        self.gpu.borrow().state
    }

    pub fn size(&self) -> (u32, u32) {
        self.gpu.borrow().size
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.gpu.borrow().handle
    }

    pub fn shared(&self) -> &SharedTexture {
        &self.gpu
    }

    pub fn is_copy(&self) -> bool {
        self.copied_from.is_some()
    }

    pub fn copied_from(&self) -> Option<TextureId> {
        self.copied_from
    }

    /// Id of the texture owning the GPU handle.
    pub fn origin(&self) -> TextureId {
        self.gpu.borrow().origin
    }

    pub fn can_draw(&self) -> bool {
        let gpu = self.gpu.borrow();
        gpu.valid && gpu.handle.is_some()
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    pub fn on_source_loaded(&mut self, callback: impl FnMut(&Texture) + 'static) {
        self.on_source_loaded = Some(Box::new(callback));
    }

    pub fn on_source_uploaded(&mut self, callback: impl FnMut(&Texture) + 'static) {
        self.on_source_uploaded = Some(Box::new(callback));
    }

    fn notify_loaded(&mut self) {
        if let Some(mut callback) = self.on_source_loaded.take() {
            callback(self);
            self.on_source_loaded = Some(callback);
        }
    }

    fn notify_uploaded(&mut self) {
        if self.uploaded_notified {
            return;
        }
        self.uploaded_notified = true;
        if let Some(mut callback) = self.on_source_uploaded.take() {
            callback(self);
            self.on_source_uploaded = Some(callback);
        }
    }

    /// Aliases `other`: same handle, size, parameters and load state.
    ///
    /// A handle this texture owned alone is released first.
    pub fn copy(&mut self, ctx: &RenderContext, other: &Texture) {
        if Rc::ptr_eq(&self.gpu, &other.gpu) {
            return;
        }
        if !self.is_copy() && Rc::strong_count(&self.gpu) == 1 {
            self.delete_gpu(ctx);
        }
        self.gpu = Rc::clone(&other.gpu);
        self.copied_from = Some(other.origin());
        self.uniforms_sent_to = None;
        self.update_matrix();
    }

    /// Starts waiting for `source`; [`Texture::poll_source`] finishes the job.
    pub fn load_source(
        &mut self,
        source: Rc<dyn MediaSource>,
        on_success: Option<Box<dyn FnOnce(&Texture)>>,
        on_error: Option<Box<dyn FnOnce(&PlanarError)>>,
    ) {
        self.pending = Some(PendingSource {
            source,
            on_success,
            on_error,
        });
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Checks a pending source once; called every frame before drawing.
    pub fn poll_source(&mut self, ctx: &mut RenderContext) -> Option<SourceEvent> {
        let state = self.pending.as_ref()?.source.load_state();
        match state {
            LoadState::Loading => None,
            LoadState::Loaded => {
                let pending = self.pending.take()?;
                self.set_source(ctx, pending.source);
                if let Some(on_success) = pending.on_success {
                    on_success(self);
                }
                Some(SourceEvent::Loaded(self.id))
            }
            LoadState::Failed(reason) => {
                let pending = self.pending.take()?;
                let error = PlanarError::SourceLoad {
                    url: pending.source.url().unwrap_or_default(),
                    reason,
                };
                ctx.diagnostics().error(self.id, error.to_string());
                if let Some(on_error) = pending.on_error {
                    on_error(&error);
                }
                Some(SourceEvent::Failed(self.id, error))
            }
        }
    }

    /// Binds a loaded source. Images already in the cache are shared instead
    /// of uploaded again; other images upload right away.
    pub fn set_source(&mut self, ctx: &mut RenderContext, source: Rc<dyn MediaSource>) {
        let kind = source.kind();
        if kind == SourceKind::Image {
            if let Some(cached) = ctx.cache.texture_from_source(source.as_ref()) {
                if !Rc::ptr_eq(&cached, &self.gpu) {
                    if !self.is_copy() && Rc::strong_count(&self.gpu) == 1 {
                        self.delete_gpu(ctx);
                    }
                    self.copied_from = Some(cached.borrow().origin);
                    self.gpu = cached;
                    self.uniforms_sent_to = None;
                }
                self.update_matrix();
                self.notify_loaded();
                self.notify_uploaded();
                return;
            }
        }

        if self.is_copy() {
            // stop sharing: this texture gets a handle of its own
            let params = self.gpu.borrow().params.clone();
            self.gpu = Rc::new(RefCell::new(GpuTexture {
                origin: self.id,
                kind: TextureKind::Media,
                handle: None,
                source: None,
                size: (1, 1),
                params,
                format: TextureFormat::Rgba8,
                state: TextureState::Empty,
                valid: true,
                params_dirty: false,
                epoch: ctx.epoch(),
            }));
            self.copied_from = None;
            if let Err(error) = self.create_handle(ctx) {
                ctx.diagnostics().error(self.id, error.to_string());
                return;
            }
        }

        {
            let mut gpu = self.gpu.borrow_mut();
            gpu.size = source.size();
            gpu.source = Some(Rc::clone(&source));
            gpu.state = TextureState::Loading;
            gpu.params_dirty = true;
        }
        self.uploaded_notified = false;
        self.update_matrix();
        self.notify_loaded();

        if kind == SourceKind::Image && self.upload(ctx) {
            if let Some(url) = source.url() {
                ctx.cache.add_texture(url, Rc::clone(&self.gpu));
            }
        }
    }

    /// Uploads the current source into the handle. Returns false on failure.
    fn upload(&mut self, ctx: &RenderContext) -> bool {
        let uploaded = {
            let mut gpu = self.gpu.borrow_mut();
            let (Some(handle), Some(source)) = (gpu.handle, gpu.source.clone()) else {
                return false;
            };
            let gl = ctx.gl();
            ctx.bind_texture(self.unit, handle);
            gl.pixel_store(PixelStore {
                flip_y: gpu.params.flip_y.unwrap_or(true),
                premultiply_alpha: gpu.params.premultiply_alpha,
            });
            match gl.tex_image_source(source.as_ref()) {
                Ok(()) => {
                    let size = source.size();
                    if size != gpu.size {
                        gpu.size = size;
                    }
                    gpu.state = TextureState::Ready;
                    apply_parameters(ctx, &mut gpu, self.id);
                    true
                }
                Err(reason) => {
                    ctx.diagnostics()
                        .error(self.id, format!("could not upload {} source: {reason}", source.kind()));
                    false
                }
            }
        };
        if uploaded {
            self.update_matrix();
            self.notify_uploaded();
        }
        uploaded
    }

    pub fn set_wrap(&mut self, wrap_s: WrapMode, wrap_t: WrapMode) {
        let mut gpu = self.gpu.borrow_mut();
        gpu.params.wrap_s = wrap_s;
        gpu.params.wrap_t = wrap_t;
        gpu.params_dirty = true;
    }

    pub fn set_min_filter(&mut self, filter: Filter) {
        let mut gpu = self.gpu.borrow_mut();
        gpu.params.min_filter = Some(filter);
        gpu.params_dirty = true;
    }

    pub fn set_mag_filter(&mut self, filter: Filter) {
        let mut gpu = self.gpu.borrow_mut();
        gpu.params.mag_filter = filter;
        gpu.params_dirty = true;
    }

    pub fn set_anisotropy(&mut self, anisotropy: f32) {
        let mut gpu = self.gpu.borrow_mut();
        gpu.params.anisotropy = anisotropy;
        gpu.params_dirty = true;
    }

    pub fn set_generate_mipmap(&mut self, generate: bool) {
        let mut gpu = self.gpu.borrow_mut();
        gpu.params.generate_mipmap = Some(generate);
        gpu.params_dirty = true;
    }

    pub fn params(&self) -> TextureParams {
        self.gpu.borrow().params.clone()
    }

    pub fn scale(&self) -> Vector2<f32> {
        self.scale
    }

    pub fn offset(&self) -> Vector2<f32> {
        self.offset
    }

    /// Zooms the source inside its parent; non positive values are ignored.
    pub fn set_scale(&mut self, x: f32, y: f32) {
        if x <= 0.0 || y <= 0.0 {
            return;
        }
        self.scale = Vector2::new(x, y);
        self.update_matrix();
    }

    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.offset = Vector2::new(x, y);
        self.update_matrix();
    }

    /// New parent box size, in any unit as long as it is consistent.
    pub fn resize(&mut self, parent_width: f32, parent_height: f32) {
        self.parent_size = (parent_width.max(1.0), parent_height.max(1.0));
        self.update_matrix();
    }

    /// Resizes the storage of a render target texture; copies follow.
    pub fn resize_storage(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        {
            let mut gpu = self.gpu.borrow_mut();
            if gpu.kind != TextureKind::RenderTarget || gpu.size == (width, height) {
                return;
            }
            gpu.size = (width, height);
            if let Some(handle) = gpu.handle {
                ctx.bind_texture(self.unit, handle);
                ctx.gl().tex_image_pixels(width, height, gpu.format, None);
            }
        }
        self.parent_size = (width as f32, height as f32);
        self.update_matrix();
    }

    /// Object-fit cover of the source in its parent, then user scale and offset.
    fn update_matrix(&mut self) {
        let (parent_width, parent_height) = self.parent_size;
        let (source_width, source_height) = {
            let gpu = self.gpu.borrow();
            if gpu.kind == TextureKind::RenderTarget || gpu.source.is_none() {
                (parent_width, parent_height)
            } else {
                (gpu.size.0.max(1) as f32, gpu.size.1.max(1) as f32)
            }
        };

        let source_ratio = source_width / source_height;
        let parent_ratio = parent_width / parent_height;
        let (mut x_offset, mut y_offset) = (0.0f32, 0.0f32);
        if parent_ratio > source_ratio {
            y_offset = (parent_height - parent_width / source_ratio).min(0.0);
        } else if parent_ratio < source_ratio {
            x_offset = (parent_width - parent_height * source_ratio).min(0.0);
        }

        let scale = Vector3::new(
            parent_width / (parent_width - x_offset) / self.scale.x,
            parent_height / (parent_height - y_offset) / self.scale.y,
            1.0,
        );
        self.matrix = Transform::compose_from_origin(
            &Vector3::new(self.offset.x, self.offset.y, 0.0),
            &UnitQuaternion::identity(),
            &scale,
            &Vector3::new(0.5, 0.5, 0.0),
        );
        self.uniforms_sent_to = None;
    }

    /// Binds the texture for a draw, uploading new video or canvas frames.
    /// Returns false when there is nothing valid to bind.
    pub fn draw(&mut self, ctx: &RenderContext, program: &CompiledProgram) -> bool {
        let (handle, media) = {
            let gpu = self.gpu.borrow();
            if !gpu.valid {
                return false;
            }
            let Some(handle) = gpu.handle else {
                return false;
            };
            (handle, gpu.source.clone())
        };

        ctx.bind_texture(self.unit, handle);

        if let Some(source) = media {
            let needs_upload = match source.kind() {
                SourceKind::Video => {
                    source.load_state() == LoadState::Loaded && source.has_new_frame()
                }
                SourceKind::Canvas => self.should_update,
                SourceKind::Image => false,
            };
            if needs_upload {
                self.upload(ctx);
            }
        }

        {
            let mut gpu = self.gpu.borrow_mut();
            if gpu.params_dirty && (gpu.state == TextureState::Ready || gpu.kind == TextureKind::RenderTarget) {
                apply_parameters(ctx, &mut gpu, self.id);
            }
        }

        if program.is_shared() || self.uniforms_sent_to != Some(program.id()) {
            let gl = ctx.gl();
            if let Some(location) = program.location(&self.sampler) {
                gl.uniform(
                    location,
                    UniformData::Int {
                        components: 1,
                        data: &[self.unit as i32],
                    },
                );
            }
            if let Some(location) = program.location(&self.matrix_name) {
                gl.uniform(
                    location,
                    UniformData::Matrix {
                        dim: 4,
                        data: self.matrix.as_slice(),
                    },
                );
            }
            self.uniforms_sent_to = Some(program.id());
        }
        true
    }

    /// Recreates the shared GPU state once per restore, whoever gets there first.
    pub fn restore(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.uniforms_sent_to = None;
        let stale = {
            let gpu = self.gpu.borrow();
            gpu.epoch != ctx.epoch()
        };
        if !stale {
            return Ok(());
        }
        {
            let mut gpu = self.gpu.borrow_mut();
            gpu.handle = None;
            gpu.params_dirty = true;
            if gpu.kind == TextureKind::RenderTarget {
                gpu.format = resolve_format(ctx, gpu.params.floating_point);
            }
        }
        self.create_handle(ctx)?;
        let reupload = {
            let gpu = self.gpu.borrow();
            gpu.source.is_some() && gpu.state != TextureState::Loading
        };
        if reupload {
            self.uploaded_notified = true;
            if self.upload(ctx) {
                let url = self.gpu.borrow().source.as_ref().and_then(|source| {
                    (source.kind() == SourceKind::Image).then(|| source.url()).flatten()
                });
                if let Some(url) = url {
                    ctx.cache.add_texture(url, Rc::clone(&self.gpu));
                }
            }
        }
        Ok(())
    }

    fn delete_gpu(&self, ctx: &RenderContext) {
        let mut gpu = self.gpu.borrow_mut();
        if let Some(handle) = gpu.handle.take() {
            if !ctx.is_lost() {
                ctx.gl().delete_texture(handle);
            }
        }
        gpu.valid = false;
    }

    /// Releases the texture. Copies never delete the handle; unforced
    /// disposal of a cached image keeps it alive while the context is.
    pub fn dispose(&mut self, ctx: &mut RenderContext, force: bool) {
        self.pending = None;
        if self.is_copy() {
            return;
        }
        let cached_image = self.gpu.borrow().source.as_ref().is_some_and(|source| source.kind() == SourceKind::Image);
        if !force && !ctx.is_lost() && ctx.is_active() && cached_image {
            return;
        }
        ctx.cache.remove_texture(&self.gpu);
        self.delete_gpu(ctx);
    }
}

/// Format a render target can use, falling back to 8 bit when the float
/// extensions are missing.
fn resolve_format(ctx: &RenderContext, floating_point: FloatingPoint) -> TextureFormat {
    let webgl2 = ctx.version() == GlVersion::WebGl2;
    let extensions = ctx.extensions();
    let (format, supported, needed) = match floating_point {
        FloatingPoint::None => return TextureFormat::Rgba8,
        FloatingPoint::HalfFloat => (
            TextureFormat::Rgba16F,
            if webgl2 {
                extensions.has("EXT_color_buffer_float")
            } else {
                extensions.has("OES_texture_half_float")
            },
            if webgl2 { "EXT_color_buffer_float" } else { "OES_texture_half_float" },
        ),
        FloatingPoint::Float => (
            TextureFormat::Rgba32F,
            if webgl2 {
                extensions.has("EXT_color_buffer_float")
            } else {
                extensions.has("OES_texture_float")
            },
            if webgl2 { "EXT_color_buffer_float" } else { "OES_texture_float" },
        ),
    };
    if supported {
        format
    } else {
        ctx.diagnostics()
            .warn("Texture", format!("{needed} is not available, using an 8 bit texture"));
        TextureFormat::Rgba8
    }
}

/// Applies wrap, filter, anisotropy and mipmaps to the bound texture.
fn apply_parameters(ctx: &RenderContext, gpu: &mut GpuTexture, id: TextureId) {
    let gl = ctx.gl();
    let is_image = gpu
        .source
        .as_ref()
        .is_some_and(|source| source.kind() == SourceKind::Image);
    let mut params = gpu.params.clone();
    let mut mipmaps = params.generate_mipmap.unwrap_or(is_image);

    let (width, height) = gpu.size;
    if ctx.version() == GlVersion::WebGl1 && !(is_power_of_two(width) && is_power_of_two(height)) {
        if mipmaps && params.generate_mipmap == Some(true) {
            ctx.diagnostics()
                .warn(id, "cannot generate mipmaps for a non power of two source on WebGL1");
        }
        mipmaps = false;
        if params.wrap_s != WrapMode::ClampToEdge || params.wrap_t != WrapMode::ClampToEdge {
            ctx.diagnostics()
                .warn(id, "non power of two sources must clamp to edge on WebGL1");
            params.wrap_s = WrapMode::ClampToEdge;
            params.wrap_t = WrapMode::ClampToEdge;
        }
    }

    let mut min_filter = params.min_filter.unwrap_or(if mipmaps {
        Filter::LinearMipmapNearest
    } else {
        Filter::Linear
    });
    let mut mag_filter = params.mag_filter;
    if !mipmaps && min_filter.uses_mipmaps() {
        min_filter = Filter::Linear;
    }
    let float_linear = ctx.extensions().has("OES_texture_float_linear");
    if gpu.format == TextureFormat::Rgba32F && !float_linear {
        min_filter = Filter::Nearest;
        mag_filter = Filter::Nearest;
    }

    gl.tex_wrap(params.wrap_s, params.wrap_t);
    gl.tex_filter(min_filter, mag_filter);

    if params.anisotropy > 1.0 {
        if ctx.extensions().has("EXT_texture_filter_anisotropic") {
            gl.tex_anisotropy(params.anisotropy.min(gl.max_anisotropy()));
        } else {
            ctx.diagnostics()
                .warn(id, "anisotropic filtering is not supported, ignoring anisotropy");
        }
    }

    if mipmaps && gpu.kind == TextureKind::Media && gpu.state == TextureState::Ready {
        gl.generate_mipmap();
    }
    gpu.params_dirty = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::gl::{GlCall, GlVersion, HeadlessGl};
    use crate::source::PixelSource;

    fn context(version: GlVersion) -> (HeadlessGl, RenderContext) {
        let gl = HeadlessGl::new(version);
        let ctx = RenderContext::for_tests(gl.clone(), RendererConfig::default());
        (gl, ctx)
    }

    #[test]
    fn test_empty_texture_holds_black_pixel() {
        let (gl, mut ctx) = context(GlVersion::WebGl2);
        let texture = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        assert_eq!(texture.state(), TextureState::Empty);
        assert_eq!(gl.texture_size(texture.handle().unwrap()), Some((1, 1)));
        assert_eq!(texture.sampler_name(), "uSampler0");
        assert_eq!(texture.matrix_name(), "uSampler0Matrix");
        assert!(texture.can_draw());
    }

    #[test]
    fn test_image_source_uploads_and_caches() {
        let (gl, mut ctx) = context(GlVersion::WebGl2);
        let mut first = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        first.set_source(&mut ctx, Rc::new(PixelSource::image("cat.png", 64, 32)));
        assert_eq!(first.state(), TextureState::Ready);
        assert_eq!(first.size(), (64, 32));

        let uploads = gl.count_calls(|call| matches!(call, GlCall::TexImage { width: 64, .. }));
        let mut second = Texture::new(&mut ctx, &TextureParams::default(), 1).unwrap();
        second.set_source(&mut ctx, Rc::new(PixelSource::image("cat.png", 64, 32)));
        assert!(second.is_copy());
        assert_eq!(second.handle(), first.handle());
        assert_eq!(
            gl.count_calls(|call| matches!(call, GlCall::TexImage { width: 64, .. })),
            uploads
        );
    }

    #[test]
    fn test_video_source_is_not_cached() {
        let (_gl, mut ctx) = context(GlVersion::WebGl2);
        let mut texture = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        let video = PixelSource::with_kind(SourceKind::Video, Some("clip.mp4".into()), 8, 8);
        texture.set_source(&mut ctx, Rc::new(video));
        assert_eq!(texture.state(), TextureState::Loading);
        assert!(ctx.cache.texture_from_source(&PixelSource::image("clip.mp4", 8, 8)).is_none());
    }

    #[test]
    fn test_cover_matrix_crops_wider_source() {
        let (_gl, mut ctx) = context(GlVersion::WebGl2);
        let mut texture = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        texture.set_source(&mut ctx, Rc::new(PixelSource::image("wide.png", 200, 100)));
        texture.resize(100.0, 100.0);
        // the source is twice as wide, so only half of it shows horizontally
        let matrix = texture.matrix();
        assert!((matrix[(0, 0)] - 0.5).abs() < 1e-6);
        assert!((matrix[(1, 1)] - 1.0).abs() < 1e-6);

        texture.set_scale(2.0, 2.0);
        assert!((texture.matrix()[(0, 0)] - 0.25).abs() < 1e-6);
        texture.set_scale(0.0, 1.0);
        assert_eq!(texture.scale(), Vector2::new(2.0, 2.0));
    }

    #[test]
    fn test_copy_never_deletes_handle() {
        let (gl, mut ctx) = context(GlVersion::WebGl2);
        let origin = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        let mut copy = Texture::new_copy(&mut ctx, &origin, &TextureParams::default(), 1);
        assert_eq!(copy.copied_from(), Some(origin.id()));
        copy.dispose(&mut ctx, true);
        assert!(gl.is_texture_live(origin.handle().unwrap()));
    }

    #[test]
    fn test_disposing_origin_invalidates_copies() {
        let (gl, mut ctx) = context(GlVersion::WebGl2);
        let mut origin = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        let copy = Texture::new_copy(&mut ctx, &origin, &TextureParams::default(), 1);
        let handle = origin.handle().unwrap();
        origin.dispose(&mut ctx, false);
        assert!(!gl.is_texture_live(handle));
        assert!(!copy.can_draw());
    }

    #[test]
    fn test_webgl1_npot_disables_mipmaps() {
        let (gl, mut ctx) = context(GlVersion::WebGl1);
        let params = TextureParams {
            generate_mipmap: Some(true),
            ..TextureParams::default()
        };
        let mut texture = Texture::new(&mut ctx, &params, 0).unwrap();
        texture.set_source(&mut ctx, Rc::new(PixelSource::image("npot.png", 300, 200)));
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::GenerateMipmap(_))), 0);

        let mut pot = Texture::new(&mut ctx, &params, 1).unwrap();
        pot.set_source(&mut ctx, Rc::new(PixelSource::image("pot.png", 256, 256)));
        assert_eq!(gl.count_calls(|call| matches!(call, GlCall::GenerateMipmap(_))), 1);
    }

    #[test]
    fn test_poll_reports_failure() {
        let (_gl, mut ctx) = context(GlVersion::WebGl2);
        let mut texture = Texture::new(&mut ctx, &TextureParams::default(), 0).unwrap();
        let failed = Rc::new(std::cell::Cell::new(false));
        let flag = failed.clone();
        texture.load_source(
            Rc::new(PixelSource::image("missing.png", 1, 1).failing("404")),
            None,
            Some(Box::new(move |_| flag.set(true))),
        );
        assert_eq!(texture.state(), TextureState::Loading);
        let event = texture.poll_source(&mut ctx);
        assert!(matches!(event, Some(SourceEvent::Failed(_, PlanarError::SourceLoad { .. }))));
        assert!(failed.get());
        assert_eq!(texture.state(), TextureState::Empty);
    }

    #[test]
    fn test_render_target_float_falls_back() {
        let gl = HeadlessGl::new(GlVersion::WebGl2).with_extensions(&[]);
        let mut ctx = RenderContext::for_tests(gl, RendererConfig::default());
        let params = TextureParams {
            floating_point: FloatingPoint::Float,
            ..TextureParams::default()
        };
        let texture = Texture::for_render_target(&mut ctx, &params, (32, 16)).unwrap();
        assert_eq!(texture.shared().borrow().format, TextureFormat::Rgba8);
        assert_eq!(texture.state(), TextureState::Ready);
    }
}
