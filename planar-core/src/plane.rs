/// Planes: meshes that follow an element of the page
///
/// A plane reads its element's box, converts it to world units for its own
/// camera, and rebuilds its matrices only when something moved. Planes that
/// leave the viewport (plus margins) stop drawing until they come back.
use std::fmt;
use std::rc::Rc;

use nalgebra::{Matrix4, Vector3};

use crate::context::{CullMode, RenderContext};
use crate::culling;
use crate::dom::{DomBounds, DrawCheckMargins, ElementBounds};
use crate::drawable::{DrawContext, Drawable};
use crate::error::{PlanarError, Result};
use crate::mesh::{Mesh, MeshParams, PLANE_FRAGMENT_SHADER, PLANE_VERTEX_SHADER};
use crate::projection::{Camera, DEFAULT_FOV};
use crate::render_target::RenderTargetId;
use crate::source::MediaSource;
use crate::texture::{SourceEvent, Texture, TextureId, TextureParams};
use crate::transform::{RotationState, Transform};
use crate::uniforms::{UniformDef, UniformType};

pub const MODEL_VIEW_UNIFORM: &str = "uMVMatrix";
pub const PROJECTION_UNIFORM: &str = "uPMatrix";

const MODEL_VIEW_KEY: &str = "modelViewMatrix";
const PROJECTION_KEY: &str = "projectionMatrix";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub u32);

impl fmt::Display for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plane: {}", self.0)
    }
}

/// Raised while drawing; delivered to the plane's handlers on a later frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaneEvent {
    /// Program linked and every pending source settled.
    Ready,
    /// A source finished loading into the texture.
    Loading(TextureId),
    Error(PlanarError),
    ReEnterView,
    LeaveView,
}

#[derive(Debug, Clone)]
pub struct PlaneParams {
    /// Falls back to a plain vertex shader feeding `uMVMatrix` and `uPMatrix`.
    pub vertex_shader: Option<String>,
    pub fragment_shader: Option<String>,
    pub width_segments: u32,
    pub height_segments: u32,
    pub share_program: bool,
    pub uniforms: Vec<(String, UniformDef)>,
    pub depth_test: bool,
    pub cull_face: CullMode,
    pub transparent: bool,
    pub visible: bool,
    pub always_draw: bool,
    pub draw_check_margins: DrawCheckMargins,
    /// Follow page scrolls; the renderer's setting when omitted.
    pub watch_scroll: Option<bool>,
    pub fov: f32,
    pub render_target: Option<RenderTargetId>,
    /// Used for every texture the plane creates.
    pub texture: TextureParams,
}

impl Default for PlaneParams {
    fn default() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            width_segments: 1,
            height_segments: 1,
            share_program: false,
            uniforms: Vec::new(),
            depth_test: true,
            cull_face: CullMode::Back,
            transparent: false,
            visible: true,
            always_draw: false,
            draw_check_margins: DrawCheckMargins::default(),
            watch_scroll: None,
            fov: DEFAULT_FOV,
            render_target: None,
            texture: TextureParams::default(),
        }
    }
}

type PlaneCallback = Box<dyn FnMut(&mut Plane)>;
type LoadingCallback = Box<dyn FnMut(&mut Plane, TextureId)>;
type ErrorCallback = Box<dyn FnMut(&mut Plane, &PlanarError)>;

/// One handler per event; registering again replaces the previous one.
#[derive(Default)]
struct PlaneHandlers {
    ready: Option<PlaneCallback>,
    loading: Option<LoadingCallback>,
    render: Option<PlaneCallback>,
    after_render: Option<PlaneCallback>,
    re_enter_view: Option<PlaneCallback>,
    leave_view: Option<PlaneCallback>,
    error: Option<ErrorCallback>,
}

/// Plane box in world units, centered on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WorldRect {
    width: f32,
    height: f32,
    top: f32,
    left: f32,
    origin: Vector3<f32>,
}

impl Default for WorldRect {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            top: 0.0,
            left: 0.0,
            origin: Vector3::zeros(),
        }
    }
}

pub struct Plane {
    id: PlaneId,
    mesh: Mesh,
    element: Box<dyn ElementBounds>,
    camera: Camera,
    transform: Transform,
    texture_params: TextureParams,
    /// Element box in device pixels, relative to the viewport.
    document_rect: DomBounds,
    world: WorldRect,
    world_translation: Vector3<f32>,
    model_view: Matrix4<f32>,
    mvp: Matrix4<f32>,
    update_mv: bool,
    update_world: bool,
    should_draw: bool,
    ready_fired: bool,
    pub always_draw: bool,
    pub draw_check_margins: DrawCheckMargins,
    pub watch_scroll: bool,
    handlers: PlaneHandlers,
}

impl fmt::Debug for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plane")
            .field("id", &self.id)
            .field("mesh", &self.mesh)
            .field("document_rect", &self.document_rect)
            .field("transform", &self.transform)
            .field("should_draw", &self.should_draw)
            .finish()
    }
}

impl Plane {
    /// A broken shader does not fail creation: the plane never draws and an
    /// error event is raised instead.
    pub fn new(
        ctx: &mut RenderContext,
        element: Box<dyn ElementBounds>,
        params: &PlaneParams,
    ) -> Result<Self> {
        let id = PlaneId(ctx.next_id());
        let mesh_params = MeshParams {
            vertex_shader: params.vertex_shader.as_deref().unwrap_or(PLANE_VERTEX_SHADER),
            fragment_shader: params
                .fragment_shader
                .as_deref()
                .unwrap_or(PLANE_FRAGMENT_SHADER),
            width_segments: params.width_segments,
            height_segments: params.height_segments,
            share_program: params.share_program,
            uniforms: &params.uniforms,
            depth_test: params.depth_test,
            cull_face: params.cull_face,
            transparent: params.transparent,
            visible: params.visible,
            render_target: params.render_target,
        };
        let mut mesh = Mesh::new(ctx, &mesh_params)?;
        mesh.uniforms.insert(
            MODEL_VIEW_KEY,
            UniformDef::new(MODEL_VIEW_UNIFORM, Matrix4::identity()).with_type(UniformType::Mat4),
            ctx.diagnostics(),
        );
        mesh.uniforms.insert(
            PROJECTION_KEY,
            UniformDef::new(PROJECTION_UNIFORM, Matrix4::identity()).with_type(UniformType::Mat4),
            ctx.diagnostics(),
        );

        if !mesh.program().is_compiled() {
            let error = mesh
                .program()
                .compiled()
                .error()
                .cloned()
                .unwrap_or_else(|| PlanarError::ProgramLink("program is not usable".into()));
            ctx.push_event(id, PlaneEvent::Error(error));
        }

        let canvas = ctx.bounds();
        let mut camera = Camera::new(canvas.width, canvas.height, ctx.pixel_ratio());
        camera.set_fov(params.fov);

        let mut plane = Self {
            id,
            mesh,
            element,
            camera,
            transform: Transform::default(),
            texture_params: params.texture.clone(),
            document_rect: DomBounds::default(),
            world: WorldRect::default(),
            world_translation: Vector3::zeros(),
            model_view: Matrix4::identity(),
            mvp: Matrix4::identity(),
            update_mv: true,
            update_world: false,
            should_draw: true,
            ready_fired: false,
            always_draw: params.always_draw,
            draw_check_margins: params.draw_check_margins,
            watch_scroll: params.watch_scroll.unwrap_or(true),
            handlers: PlaneHandlers::default(),
        };
        plane.resize(ctx);
        log::debug!("{id} created, program {}", plane.mesh.program_id());
        Ok(plane)
    }

    pub fn id(&self) -> PlaneId {
        self.id
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn textures(&self) -> &[Texture] {
        self.mesh.textures()
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.mesh.texture(id)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.mesh.texture_mut(id)
    }

    pub fn can_draw(&self) -> bool {
        self.mesh.can_draw()
    }

    /// Ready, visible, and either inside the viewport or always drawn.
    pub fn is_drawn(&self) -> bool {
        self.can_draw() && self.mesh.visible && (self.should_draw || self.always_draw)
    }

    /// Result of the last draw check.
    pub fn is_in_view(&self) -> bool {
        self.should_draw
    }

    pub fn is_ready(&self) -> bool {
        self.ready_fired
    }

    pub fn visible(&self) -> bool {
        self.mesh.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.mesh.visible = visible;
    }

    pub fn is_transparent(&self) -> bool {
        self.mesh.is_transparent()
    }

    pub fn depth_test(&self) -> bool {
        self.mesh.depth_test
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.mesh.depth_test = enabled;
    }

    pub fn cull_face(&self) -> CullMode {
        self.mesh.cull_face
    }

    pub fn set_cull_face(&mut self, mode: CullMode) {
        self.mesh.cull_face = mode;
    }

    pub fn render_target(&self) -> Option<RenderTargetId> {
        self.mesh.render_target()
    }

    /// Draws into `target` instead of the canvas or the scene pass chain.
    pub fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.mesh.set_render_target(target);
    }

    // Transforms

    pub fn rotation(&self) -> RotationState {
        self.transform.rotation
    }

    pub fn set_rotation(&mut self, x: f32, y: f32, z: f32) {
        let rotation = RotationState::new(x, y, z);
        if rotation != self.transform.rotation {
            self.transform.rotation = rotation;
            self.update_mv = true;
        }
    }

    pub fn scale(&self) -> (f32, f32) {
        (self.transform.scale.x, self.transform.scale.y)
    }

    /// Textures are resized too, so the cover crop follows the scaled box.
    pub fn set_scale(&mut self, x: f32, y: f32) {
        let scale = Vector3::new(x.max(0.001), y.max(0.001), 1.0);
        if scale != self.transform.scale {
            self.transform.scale = scale;
            self.update_mv = true;
            self.resize_textures();
        }
    }

    /// Offset from the element position, in CSS pixels.
    pub fn relative_translation(&self) -> Vector3<f32> {
        self.transform.translation
    }

    pub fn set_relative_translation(&mut self, x: f32, y: f32, z: f32) {
        let translation = Vector3::new(x, y, z);
        if translation != self.transform.translation {
            self.transform.translation = translation;
            self.update_world = true;
        }
    }

    pub fn transform_origin(&self) -> Vector3<f32> {
        self.transform.origin
    }

    /// Pivot relative to the plane box: (0, 0) top left, (1, 1) bottom right.
    pub fn set_transform_origin(&mut self, x: f32, y: f32, z: f32) {
        let origin = Vector3::new(x, y, z);
        if origin != self.transform.origin {
            self.transform.origin = origin;
            self.update_world = true;
        }
    }

    pub fn set_perspective(&mut self, fov: f32, near: f32, far: f32) {
        self.camera.set_perspective(fov, near, far);
        if self.camera.should_update() {
            self.update_world = true;
        }
    }

    // Layout

    /// Element box in device pixels.
    pub fn get_bounding_rect(&self) -> DomBounds {
        self.document_rect
    }

    /// Where the plane is actually drawn, in device pixels.
    pub fn get_webgl_bounding_rect(&self, ctx: &RenderContext) -> DomBounds {
        culling::webgl_bounding_rect(&self.mvp, ctx.bounds())
    }

    /// Follows a new canvas size or pixel ratio, then reads the element again.
    pub fn resize(&mut self, ctx: &RenderContext) {
        let canvas = ctx.bounds();
        self.camera.set_size(canvas.width, canvas.height);
        self.camera.set_pixel_ratio(ctx.pixel_ratio());
        self.read_element(ctx);
        self.resize_textures();
        self.apply_world_positions(ctx);
    }

    /// Reads the element box again, e.g. after a layout change.
    pub fn update_position(&mut self, ctx: &RenderContext) {
        self.read_element(ctx);
        self.apply_world_positions(ctx);
    }

    /// Moves the plane by the amount the page scrolled, in CSS pixels,
    /// without reading the element again.
    pub fn update_scroll_position(&mut self, ctx: &RenderContext, delta_x: f32, delta_y: f32) {
        if delta_x == 0.0 && delta_y == 0.0 {
            return;
        }
        let ratio = ctx.pixel_ratio();
        self.document_rect.left += delta_x * ratio;
        self.document_rect.top += delta_y * ratio;
        self.apply_world_positions(ctx);
    }

    fn read_element(&mut self, ctx: &RenderContext) {
        self.document_rect = self.element.bounds().scaled(ctx.pixel_ratio());
    }

    fn resize_textures(&mut self) {
        let width = self.document_rect.width * self.transform.scale.x;
        let height = self.document_rect.height * self.transform.scale.y;
        self.mesh.resize_textures(width, height);
    }

    /// World size, position and pivot from the document box and the camera.
    fn apply_world_positions(&mut self, ctx: &RenderContext) {
        self.update_world = false;
        let canvas = ctx.bounds();
        if canvas.width <= 0.0 || canvas.height <= 0.0 {
            return;
        }
        let (ratio_width, ratio_height) = self.camera.screen_ratios(0.0);
        let doc = self.document_rect;

        let center_x = doc.left + doc.width / 2.0 - canvas.left;
        let center_y = doc.top + doc.height / 2.0 - canvas.top;
        let width = doc.width / canvas.width * ratio_width / 2.0;
        let height = doc.height / canvas.height * ratio_height / 2.0;
        let origin = self.transform.origin;

        self.world = WorldRect {
            width,
            height,
            left: (center_x - canvas.width / 2.0) / canvas.width * ratio_width,
            top: (canvas.height / 2.0 - center_y) / canvas.height * ratio_height,
            origin: Vector3::new(
                (origin.x * 2.0 - 1.0) * width,
                -(origin.y * 2.0 - 1.0) * height,
                origin.z,
            ),
        };

        let pixel_ratio = ctx.pixel_ratio();
        let relative = self.transform.translation;
        self.world_translation = Vector3::new(
            self.world.left + relative.x * pixel_ratio / canvas.width * ratio_width,
            self.world.top - relative.y * pixel_ratio / canvas.height * ratio_height,
            relative.z / self.camera.css_perspective(),
        );
        self.update_mv = true;
        self.update_matrices();
    }

    fn update_matrices(&mut self) {
        let model = Transform::compose_from_origin(
            &self.world_translation,
            &self.transform.rotation.quaternion(),
            &self.transform.scale,
            &self.world.origin,
        ) * Transform::scale_matrix(self.world.width, self.world.height, 1.0);
        self.model_view = self.camera.view_matrix() * model;
        self.mvp = self.camera.projection_matrix() * self.model_view;
        self.mesh.uniforms.set(MODEL_VIEW_KEY, self.model_view);
    }

    /// Edge triggered: an event is raised only when the state flips.
    fn check_draw(&mut self, ctx: &mut RenderContext) {
        let canvas = ctx.bounds();
        let rect = culling::draw_rect(
            culling::webgl_bounding_rect(&self.mvp, canvas),
            &self.draw_check_margins,
        );
        if culling::is_outside(rect, canvas) {
            if self.should_draw {
                self.should_draw = false;
                ctx.push_event(self.id, PlaneEvent::LeaveView);
            }
        } else {
            if !self.should_draw {
                ctx.push_event(self.id, PlaneEvent::ReEnterView);
            }
            self.should_draw = true;
        }
    }

    // Textures

    pub fn create_texture(&mut self, ctx: &mut RenderContext) -> Result<TextureId> {
        let params = self.texture_params.clone();
        self.create_texture_with(ctx, &params)
    }

    pub fn create_texture_with(&mut self, ctx: &mut RenderContext, params: &TextureParams) -> Result<TextureId> {
        let id = self.mesh.create_texture(ctx, params)?;
        self.resize_textures();
        Ok(id)
    }

    /// Adds an existing texture, e.g. a copy of a render target texture.
    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = self.mesh.add_texture(texture);
        self.resize_textures();
        id
    }

    /// New texture waiting for `source`; settles during a later frame.
    pub fn load_source(
        &mut self,
        ctx: &mut RenderContext,
        source: Rc<dyn MediaSource>,
        on_success: Option<Box<dyn FnOnce(&Texture)>>,
        on_error: Option<Box<dyn FnOnce(&PlanarError)>>,
    ) -> Result<TextureId> {
        let params = self.texture_params.clone();
        let id = self.mesh.load_source(ctx, source, &params, on_success, on_error)?;
        self.resize_textures();
        Ok(id)
    }

    /// Settles pending sources and raises loading, error and ready events.
    pub fn poll_sources(&mut self, ctx: &mut RenderContext) {
        let events = self.mesh.poll_sources(ctx);
        if !events.is_empty() {
            self.resize_textures();
        }
        for event in events {
            let event = match event {
                SourceEvent::Loaded(texture) => PlaneEvent::Loading(texture),
                SourceEvent::Failed(_, error) => PlaneEvent::Error(error),
            };
            ctx.push_event(self.id, event);
        }
        if !self.ready_fired && self.can_draw() && !self.mesh.is_loading() {
            self.ready_fired = true;
            ctx.push_event(self.id, PlaneEvent::Ready);
        }
    }

    // Events

    pub fn on_ready(&mut self, callback: impl FnMut(&mut Plane) + 'static) -> &mut Self {
        self.handlers.ready = Some(Box::new(callback));
        self
    }

    /// Called with each texture whose source finished loading.
    pub fn on_loading(&mut self, callback: impl FnMut(&mut Plane, TextureId) + 'static) -> &mut Self {
        self.handlers.loading = Some(Box::new(callback));
        self
    }

    /// Called every frame before drawing.
    pub fn on_render(&mut self, callback: impl FnMut(&mut Plane) + 'static) -> &mut Self {
        self.handlers.render = Some(Box::new(callback));
        self
    }

    pub fn on_after_render(&mut self, callback: impl FnMut(&mut Plane) + 'static) -> &mut Self {
        self.handlers.after_render = Some(Box::new(callback));
        self
    }

    pub fn on_re_enter_view(&mut self, callback: impl FnMut(&mut Plane) + 'static) -> &mut Self {
        self.handlers.re_enter_view = Some(Box::new(callback));
        self
    }

    pub fn on_leave_view(&mut self, callback: impl FnMut(&mut Plane) + 'static) -> &mut Self {
        self.handlers.leave_view = Some(Box::new(callback));
        self
    }

    pub fn on_error(&mut self, callback: impl FnMut(&mut Plane, &PlanarError) + 'static) -> &mut Self {
        self.handlers.error = Some(Box::new(callback));
        self
    }

    fn run(&mut self, slot: fn(&mut PlaneHandlers) -> &mut Option<PlaneCallback>) {
        if let Some(mut callback) = slot(&mut self.handlers).take() {
            callback(self);
            // keep a handler registered from inside the callback
            let current = slot(&mut self.handlers);
            if current.is_none() {
                *current = Some(callback);
            }
        }
    }

    /// Delivers a queued event to its handler.
    pub fn fire(&mut self, event: &PlaneEvent) {
        match event {
            PlaneEvent::Ready => self.run(|handlers| &mut handlers.ready),
            PlaneEvent::ReEnterView => self.run(|handlers| &mut handlers.re_enter_view),
            PlaneEvent::LeaveView => self.run(|handlers| &mut handlers.leave_view),
            PlaneEvent::Loading(texture) => {
                if let Some(mut callback) = self.handlers.loading.take() {
                    callback(self, *texture);
                    if self.handlers.loading.is_none() {
                        self.handlers.loading = Some(callback);
                    }
                }
            }
            PlaneEvent::Error(error) => {
                if let Some(mut callback) = self.handlers.error.take() {
                    callback(self, error);
                    if self.handlers.error.is_none() {
                        self.handlers.error = Some(callback);
                    }
                }
            }
        }
    }

    // Lifecycle

    pub fn restore(&mut self, ctx: &mut RenderContext) -> Result<()> {
        let restored = self.mesh.restore(ctx);
        self.camera.force_update();
        self.update_mv = true;
        self.resize_textures();
        restored
    }

    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        self.mesh.dispose(ctx);
    }
}

impl Drawable for Plane {
    fn can_draw(&self) -> bool {
        Plane::can_draw(self)
    }

    fn is_drawn(&self) -> bool {
        Plane::is_drawn(self)
    }

    fn start_drawing(&mut self, frame: &mut DrawContext<'_>) {
        match self.mesh.render_target() {
            Some(id) => {
                if let Some(target) = frame.target(id) {
                    frame.ctx.bind_frame_buffer(Some(target), false);
                }
            }
            None => match frame.ctx.scene_pass_index() {
                None => frame.ctx.bind_frame_buffer(None, false),
                Some(index) => {
                    let target = frame
                        .scene_targets
                        .get(index)
                        .and_then(|id| frame.target(*id));
                    frame.ctx.bind_frame_buffer(target, false);
                }
            },
        }

        self.run(|handlers| &mut handlers.render);

        if self.update_world {
            self.apply_world_positions(frame.ctx);
        }
        if self.camera.should_update() {
            self.camera.update_projection_matrix();
            self.mesh
                .uniforms
                .set(PROJECTION_KEY, *self.camera.projection_matrix());
            self.camera.cancel_update();
            self.update_mv = true;
        }
        if self.update_mv {
            self.update_matrices();
            self.update_mv = false;
            if !self.always_draw {
                self.check_draw(frame.ctx);
            }
        }
    }

    fn draw(&mut self, frame: &mut DrawContext<'_>) {
        self.mesh.draw(frame.ctx);
        self.run(|handlers| &mut handlers.after_render);
    }
}
