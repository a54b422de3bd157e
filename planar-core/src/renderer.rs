/// Owner of the GPU context and of every plane, pass and target
///
/// Objects live in flat registries addressed by stable ids; the scene only
/// stores registry indices and is rebuilt after every removal.
use std::fmt;
use std::rc::Rc;

use crate::config::RendererConfig;
use crate::context::RenderContext;
use crate::diagnostics::{DiagnosticSink, Diagnostics, LogSink};
use crate::dom::ElementBounds;
use crate::drawable::{DrawContext, Drawable, DrawableId};
use crate::error::{PlanarError, Result};
use crate::gl::{ContextFactory, GlVersion};
use crate::ping_pong::{PingPongParams, PingPongPlane};
use crate::plane::{Plane, PlaneEvent, PlaneId, PlaneParams};
use crate::queue::{CallbackHandle, CallbackQueue};
use crate::render_target::{RenderTarget, RenderTargetId, RenderTargetParams};
use crate::scene::{Scene, StackEntry};
use crate::shader_pass::{ShaderPass, ShaderPassId, ShaderPassParams};

/// A registered plane
#[derive(Debug)]
pub enum PlaneEntry {
    Plane(Plane),
    PingPong(PingPongPlane),
}

impl PlaneEntry {
    pub fn id(&self) -> PlaneId {
        self.plane().id()
    }

    pub fn plane(&self) -> &Plane {
        match self {
            PlaneEntry::Plane(plane) => plane,
            PlaneEntry::PingPong(ping_pong) => ping_pong.plane(),
        }
    }

    pub fn plane_mut(&mut self) -> &mut Plane {
        match self {
            PlaneEntry::Plane(plane) => plane,
            PlaneEntry::PingPong(ping_pong) => ping_pong.plane_mut(),
        }
    }

    fn stack_entry(&self, index: usize) -> StackEntry {
        StackEntry {
            index,
            program: self.plane().mesh().program_id(),
            transparent: self.plane().is_transparent(),
        }
    }
}

impl Drawable for PlaneEntry {
    fn can_draw(&self) -> bool {
        self.plane().can_draw()
    }

    fn is_drawn(&self) -> bool {
        self.plane().is_drawn()
    }

    fn start_drawing(&mut self, frame: &mut DrawContext<'_>) {
        match self {
            PlaneEntry::Plane(plane) => plane.start_drawing(frame),
            PlaneEntry::PingPong(ping_pong) => ping_pong.start_drawing(frame),
        }
    }

    fn draw(&mut self, frame: &mut DrawContext<'_>) {
        match self {
            PlaneEntry::Plane(plane) => plane.draw(frame),
            PlaneEntry::PingPong(ping_pong) => ping_pong.draw(frame),
        }
    }
}

type RendererCallback = Box<dyn FnMut(&mut Renderer)>;
type RendererErrorCallback = Box<dyn FnMut(&mut Renderer, &PlanarError)>;

#[derive(Default)]
struct RendererHandlers {
    error: Option<RendererErrorCallback>,
    context_lost: Option<RendererCallback>,
    context_restored: Option<RendererCallback>,
    render: Option<RendererCallback>,
    after_resize: Option<RendererCallback>,
    scroll: Option<RendererCallback>,
}

pub struct Renderer {
    config: RendererConfig,
    diagnostics: Rc<Diagnostics>,
    ctx: Option<RenderContext>,
    container: Box<dyn ElementBounds>,
    scene: Scene,
    planes: Vec<PlaneEntry>,
    passes: Vec<ShaderPass>,
    targets: Vec<RenderTarget>,
    next_render: CallbackQueue<Renderer>,
    handlers: RendererHandlers,
    scroll: (f32, f32),
    drawing_enabled: bool,
    force_render: bool,
    context_lost: bool,
    disposing: bool,
    restoring: Option<CallbackHandle>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("ctx", &self.ctx)
            .field("scene", &self.scene)
            .field("planes", &self.planes.len())
            .field("passes", &self.passes.len())
            .field("targets", &self.targets.len())
            .field("next_render", &self.next_render)
            .field("context_lost", &self.context_lost)
            .finish()
    }
}

impl Renderer {
    pub fn new(
        config: RendererConfig,
        factory: &dyn ContextFactory,
        container: Box<dyn ElementBounds>,
    ) -> Self {
        Self::with_sink(config, factory, container, Box::new(LogSink))
    }

    /// Creates the renderer with diagnostics going to `sink`.
    ///
    /// A missing context does not fail: the renderer stays inactive and
    /// reports [`PlanarError::ContextUnavailable`] on the next frame.
    pub fn with_sink(
        mut config: RendererConfig,
        factory: &dyn ContextFactory,
        container: Box<dyn ElementBounds>,
        sink: Box<dyn DiagnosticSink>,
    ) -> Self {
        let diagnostics = Rc::new(Diagnostics::new(sink, config.production));
        for fix in config.sanitize() {
            diagnostics.warn("Renderer", fix);
        }

        let attributes = config.context_attributes();
        let ctx = [GlVersion::WebGl2, GlVersion::WebGl1]
            .into_iter()
            .find_map(|version| factory.create(version, &attributes))
            .map(|gl| RenderContext::new(gl, &config, Rc::clone(&diagnostics)));

        let mut renderer = Self {
            config,
            diagnostics,
            ctx,
            container,
            scene: Scene::new(),
            planes: Vec::new(),
            passes: Vec::new(),
            targets: Vec::new(),
            next_render: CallbackQueue::new(),
            handlers: RendererHandlers::default(),
            scroll: (0.0, 0.0),
            drawing_enabled: true,
            force_render: false,
            context_lost: false,
            disposing: false,
            restoring: None,
        };

        if renderer.ctx.is_none() {
            renderer
                .diagnostics
                .error("Renderer", PlanarError::ContextUnavailable.to_string());
            renderer.next_render.add(false, |renderer, _| {
                renderer.fire_error(&PlanarError::ContextUnavailable);
            });
        } else {
            renderer.resize();
        }
        renderer
    }

    // Accessors

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The GPU context and its state helpers, if one could be created.
    pub fn context(&self) -> Option<&RenderContext> {
        self.ctx.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn is_active(&self) -> bool {
        self.ctx.as_ref().is_some_and(RenderContext::is_active)
    }

    /// True from a loss until every object can draw again.
    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    pub fn scroll_values(&self) -> (f32, f32) {
        self.scroll
    }

    /// Callbacks run at the start of a later frame.
    pub fn next_render(&mut self) -> &mut CallbackQueue<Renderer> {
        &mut self.next_render
    }

    fn active_context(ctx: &mut Option<RenderContext>) -> Result<&mut RenderContext> {
        ctx.as_mut()
            .filter(|ctx| ctx.is_active())
            .ok_or(PlanarError::RendererInactive)
    }

    // Registries

    pub fn planes(&self) -> impl Iterator<Item = &Plane> {
        self.planes.iter().map(PlaneEntry::plane)
    }

    pub fn plane(&self, id: PlaneId) -> Option<&Plane> {
        self.planes.iter().find(|entry| entry.id() == id).map(PlaneEntry::plane)
    }

    pub fn plane_mut(&mut self, id: PlaneId) -> Option<&mut Plane> {
        self.planes
            .iter_mut()
            .find(|entry| entry.id() == id)
            .map(PlaneEntry::plane_mut)
    }

    /// A plane together with the context its GPU calls need.
    pub fn plane_context(&mut self, id: PlaneId) -> Option<(&mut Plane, &mut RenderContext)> {
        let ctx = self.ctx.as_mut()?;
        let plane = self
            .planes
            .iter_mut()
            .find(|entry| entry.id() == id)
            .map(PlaneEntry::plane_mut)?;
        Some((plane, ctx))
    }

    pub fn ping_pong_plane(&self, id: PlaneId) -> Option<&PingPongPlane> {
        self.planes.iter().find_map(|entry| match entry {
            PlaneEntry::PingPong(ping_pong) if ping_pong.id() == id => Some(ping_pong),
            _ => None,
        })
    }

    pub fn shader_passes(&self) -> &[ShaderPass] {
        &self.passes
    }

    pub fn shader_pass(&self, id: ShaderPassId) -> Option<&ShaderPass> {
        self.passes.iter().find(|pass| pass.id() == id)
    }

    pub fn shader_pass_mut(&mut self, id: ShaderPassId) -> Option<&mut ShaderPass> {
        self.passes.iter_mut().find(|pass| pass.id() == id)
    }

    pub fn shader_pass_context(
        &mut self,
        id: ShaderPassId,
    ) -> Option<(&mut ShaderPass, &mut RenderContext)> {
        let ctx = self.ctx.as_mut()?;
        let pass = self.passes.iter_mut().find(|pass| pass.id() == id)?;
        Some((pass, ctx))
    }

    pub fn render_targets(&self) -> &[RenderTarget] {
        &self.targets
    }

    pub fn render_target(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.targets.iter().find(|target| target.id() == id)
    }

    pub fn add_plane(
        &mut self,
        element: Box<dyn ElementBounds>,
        params: &PlaneParams,
    ) -> Result<PlaneId> {
        let ctx = Self::active_context(&mut self.ctx)?;
        let mut plane = Plane::new(ctx, element, params)?;
        plane.watch_scroll = params.watch_scroll.unwrap_or(self.config.watch_scroll);
        Ok(self.push_plane(PlaneEntry::Plane(plane)))
    }

    /// Adds a feedback plane and the two targets it alternates between.
    pub fn add_ping_pong_plane(
        &mut self,
        element: Box<dyn ElementBounds>,
        params: &PingPongParams,
    ) -> Result<PlaneId> {
        let ctx = Self::active_context(&mut self.ctx)?;
        let read = RenderTarget::new(ctx, params.target.clone())?;
        let write = RenderTarget::new(ctx, params.target.clone())?;
        let mut ping_pong = PingPongPlane::new(ctx, element, params, &read, &write)?;
        ping_pong.plane_mut().watch_scroll =
            params.plane.watch_scroll.unwrap_or(self.config.watch_scroll);
        self.targets.push(read);
        self.targets.push(write);
        Ok(self.push_plane(PlaneEntry::PingPong(ping_pong)))
    }

    fn push_plane(&mut self, entry: PlaneEntry) -> PlaneId {
        let id = entry.id();
        let index = self.planes.len();
        self.scene.add_plane(entry.stack_entry(index));
        self.planes.push(entry);
        id
    }

    /// Disposes the plane and drops it from the scene. The targets of a
    /// feedback plane go with it.
    pub fn remove_plane(&mut self, id: PlaneId) -> Result<()> {
        let index = self
            .planes
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or(PlanarError::UnknownObject { kind: "plane", id: id.0 })?;
        let mut entry = self.planes.remove(index);
        if let Some(ctx) = self.ctx.as_mut() {
            entry.plane_mut().dispose(ctx);
            if let PlaneEntry::PingPong(ping_pong) = &entry {
                for target_id in [ping_pong.read_target(), ping_pong.write_target()] {
                    if let Some(position) = self.targets.iter().position(|target| target.id() == target_id) {
                        self.targets.remove(position).dispose(ctx);
                    }
                }
            }
        }
        log::debug!("{id} removed");
        self.reset_plane_stacks();
        Ok(())
    }

    pub fn add_render_target(&mut self, params: RenderTargetParams) -> Result<RenderTargetId> {
        let ctx = Self::active_context(&mut self.ctx)?;
        let target = RenderTarget::new(ctx, params)?;
        let id = target.id();
        self.targets.push(target);
        Ok(id)
    }

    /// Targets still sampled by a shader pass stay; remove the pass instead.
    /// Planes drawing into the target fall back to the scene.
    pub fn remove_render_target(&mut self, id: RenderTargetId) -> Result<()> {
        let position = self
            .targets
            .iter()
            .position(|target| target.id() == id)
            .ok_or(PlanarError::UnknownObject {
                kind: "render target",
                id: id.0,
            })?;
        if self.passes.iter().any(|pass| pass.target_id() == id) {
            self.diagnostics.warn(
                id,
                "render target is attached to a shader pass, remove the shader pass instead",
            );
            return Ok(());
        }
        let mut target = self.targets.remove(position);
        if let Some(ctx) = self.ctx.as_mut() {
            target.dispose(ctx);
        }
        for entry in &mut self.planes {
            if entry.plane().render_target() == Some(id) {
                entry.plane_mut().set_render_target(None);
            }
        }
        Ok(())
    }

    /// A pass without a target gets one of its own and joins the scene
    /// chain; a pass reading an existing target is a render pass.
    pub fn add_shader_pass(&mut self, params: &ShaderPassParams) -> Result<ShaderPassId> {
        let ctx = Self::active_context(&mut self.ctx)?;
        let (target_index, scene_pass) = match params.render_target {
            Some(id) => {
                let index = self
                    .targets
                    .iter()
                    .position(|target| target.id() == id)
                    .ok_or(PlanarError::UnknownObject {
                        kind: "render target",
                        id: id.0,
                    })?;
                (index, false)
            }
            None => {
                let target = RenderTarget::new(
                    ctx,
                    RenderTargetParams {
                        depth: params.depth,
                        ..RenderTargetParams::default()
                    },
                )?;
                self.targets.push(target);
                (self.targets.len() - 1, true)
            }
        };

        let pass = match ShaderPass::new(ctx, &self.targets[target_index], scene_pass, params) {
            Ok(pass) => pass,
            Err(error) => {
                if scene_pass {
                    self.targets.remove(target_index).dispose(ctx);
                }
                return Err(error);
            }
        };
        let id = pass.id();
        self.scene.add_shader_pass(self.passes.len(), scene_pass);
        self.passes.push(pass);
        Ok(id)
    }

    /// Disposes the pass, and its target when the pass created it.
    pub fn remove_shader_pass(&mut self, id: ShaderPassId) -> Result<()> {
        let index = self
            .passes
            .iter()
            .position(|pass| pass.id() == id)
            .ok_or(PlanarError::UnknownObject {
                kind: "shader pass",
                id: id.0,
            })?;
        let mut pass = self.passes.remove(index);
        if let Some(ctx) = self.ctx.as_mut() {
            pass.dispose(ctx);
            if pass.is_scene_pass() {
                let target_id = pass.target_id();
                if let Some(position) = self.targets.iter().position(|target| target.id() == target_id) {
                    self.targets.remove(position).dispose(ctx);
                }
            }
        }
        log::debug!("{id} removed");
        self.reset_shader_pass_stacks();
        Ok(())
    }

    fn reset_plane_stacks(&mut self) {
        let entries: Vec<StackEntry> = self
            .planes
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.stack_entry(index))
            .collect();
        self.scene.reset_plane_stacks(entries);
    }

    fn reset_shader_pass_stacks(&mut self) {
        let passes: Vec<(usize, bool)> = self
            .passes
            .iter()
            .enumerate()
            .map(|(index, pass)| (index, pass.is_scene_pass()))
            .collect();
        self.scene.reset_shader_pass_stacks(passes);
    }

    /// Moves the plane between the opaque and transparent stacks.
    pub fn set_plane_transparent(&mut self, id: PlaneId, transparent: bool) -> Result<()> {
        let plane = self
            .plane_mut(id)
            .ok_or(PlanarError::UnknownObject { kind: "plane", id: id.0 })?;
        if plane.is_transparent() == transparent {
            return Ok(());
        }
        plane.mesh_mut().set_transparent(transparent);
        self.reset_plane_stacks();
        Ok(())
    }

    /// Draws the plane after every plane of its program and class, with
    /// depth testing off so it ends up on top.
    pub fn move_plane_to_front(&mut self, id: PlaneId) -> Result<()> {
        let index = self
            .planes
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or(PlanarError::UnknownObject { kind: "plane", id: id.0 })?;
        let entry = &mut self.planes[index];
        entry.plane_mut().set_depth_test(false);
        let stack_entry = entry.stack_entry(index);
        self.scene.move_plane_to_front(stack_entry);
        Ok(())
    }

    // Frame

    /// Resumes drawing after [`Renderer::disable_drawing`].
    pub fn enable_drawing(&mut self) {
        self.drawing_enabled = true;
    }

    /// Stops drawing; queued callbacks still run every frame.
    pub fn disable_drawing(&mut self) {
        self.drawing_enabled = false;
    }

    /// Draws the next frame even while drawing is disabled.
    pub fn need_render(&mut self) {
        self.force_render = true;
    }

    /// Runs one frame: deferred callbacks first, then the scene.
    pub fn render(&mut self) {
        self.run_next_render();
        if !self.drawing_enabled && !self.force_render {
            return;
        }
        self.force_render = false;
        self.run(|handlers| &mut handlers.render);

        if self.context_lost {
            return;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        if !ctx.is_active() || ctx.is_lost() {
            return;
        }

        ctx.bind_frame_buffer(None, false);
        ctx.clear();
        for entry in &mut self.planes {
            entry.plane_mut().poll_sources(ctx);
        }
        for pass in &mut self.passes {
            pass.poll_sources(ctx);
        }
        self.scene.draw(ctx, &mut self.planes, &mut self.passes, &self.targets);
    }

    /// Turns pending object events into callbacks, then runs the queue.
    fn run_next_render(&mut self) {
        if let Some(ctx) = self.ctx.as_mut() {
            for (target, event) in std::mem::take(&mut ctx.events) {
                self.next_render
                    .add(false, move |renderer, _| renderer.dispatch(target, &event));
            }
        }
        let mut queue = std::mem::take(&mut self.next_render);
        queue.tick();
        queue.execute(self);
        queue.merge(std::mem::take(&mut self.next_render));
        self.next_render = queue;
    }

    fn dispatch(&mut self, target: DrawableId, event: &PlaneEvent) {
        match target {
            DrawableId::Plane(id) => {
                if let Some(plane) = self.plane_mut(id) {
                    plane.fire(event);
                }
            }
            DrawableId::ShaderPass(id) => {
                if let Some(pass) = self.shader_pass_mut(id) {
                    pass.fire(event);
                }
            }
        }
    }

    // Layout

    /// Reads the container again and resizes everything that follows the
    /// canvas size.
    pub fn resize(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let bounds = self.container.bounds().scaled(ctx.pixel_ratio());
        ctx.set_bounds(bounds);
        for target in &mut self.targets {
            target.resize(ctx);
        }
        for entry in &mut self.planes {
            entry.plane_mut().resize(ctx);
        }
        for pass in &mut self.passes {
            pass.resize(bounds.width, bounds.height);
        }
        log::trace!("canvas resized to {}x{}", bounds.width, bounds.height);
        self.run(|handlers| &mut handlers.after_resize);
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.config.pixel_ratio = pixel_ratio;
        for fix in self.config.sanitize() {
            self.diagnostics.warn("Renderer", fix);
        }
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.set_pixel_ratio(self.config.effective_pixel_ratio());
        }
        self.resize();
    }

    /// Records the page scroll and moves the planes that follow it.
    pub fn update_scroll_values(&mut self, x: f32, y: f32) {
        let (last_x, last_y) = self.scroll;
        self.scroll = (x, y);
        let (delta_x, delta_y) = (last_x - x, last_y - y);
        if let Some(ctx) = self.ctx.as_ref() {
            for entry in &mut self.planes {
                let plane = entry.plane_mut();
                if plane.watch_scroll {
                    plane.update_scroll_position(ctx, delta_x, delta_y);
                }
            }
        }
        self.run(|handlers| &mut handlers.scroll);
    }

    // Context loss

    /// Handles a lost context. Returns false when the loss is ignored,
    /// otherwise the caller must let the browser restore the context.
    pub fn context_lost(&mut self) -> bool {
        if self.disposing || self.context_lost {
            return false;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return false;
        };
        ctx.mark_lost();
        self.context_lost = true;
        log::warn!("WebGL context lost");
        self.next_render.add(false, |renderer, _| {
            renderer.run(|handlers| &mut handlers.context_lost);
        });
        true
    }

    /// Rebuilds every GPU object, targets first, then waits for all of them
    /// to draw again before reporting the restore.
    pub fn context_restored(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        if !ctx.is_lost() {
            return;
        }
        if ctx.gl().is_context_lost() {
            log::debug!("context still lost, waiting for the backend");
            return;
        }
        ctx.restore();

        let mut failures = Vec::new();
        for target in &mut self.targets {
            if let Err(error) = target.restore(ctx) {
                failures.push((target.id().to_string(), error));
            }
        }
        for entry in &mut self.planes {
            let plane = entry.plane_mut();
            if let Err(error) = plane.restore(ctx) {
                failures.push((plane.id().to_string(), error));
            }
        }
        for pass in &mut self.passes {
            if let Err(error) = pass.restore(ctx) {
                failures.push((pass.id().to_string(), error));
            }
        }
        for (origin, error) in failures {
            self.diagnostics.error(origin, error.to_string());
        }

        self.reset_plane_stacks();
        self.reset_shader_pass_stacks();

        if let Some(handle) = self.restoring.take() {
            handle.stop();
        }
        let handle = self.next_render.add(true, |renderer, handle| {
            if renderer.is_restored() {
                handle.stop();
                renderer.restoring = None;
                renderer.context_lost = false;
                log::debug!("WebGL context restored");
                renderer.run(|handlers| &mut handlers.context_restored);
            }
        });
        self.restoring = Some(handle);
    }

    fn is_restored(&self) -> bool {
        self.targets.iter().all(RenderTarget::can_draw)
            && self
                .planes
                .iter()
                .all(|entry| entry.plane().can_draw() && entry.plane().mesh().textures_can_draw())
            && self
                .passes
                .iter()
                .all(|pass| pass.can_draw() && pass.mesh().textures_can_draw())
    }

    /// Forces a loss through the context, as a browser would.
    pub fn lose_context(&mut self) -> bool {
        let lost = self.ctx.as_ref().is_some_and(|ctx| ctx.gl().lose_context());
        if lost {
            self.context_lost();
        }
        lost
    }

    /// Asks the backend to restore a context lost through
    /// [`Renderer::lose_context`]. The objects are rebuilt when the backend
    /// reports the restore through [`Renderer::context_restored`].
    pub fn restore_context(&mut self) -> bool {
        self.ctx.as_ref().is_some_and(|ctx| ctx.gl().restore_context())
    }

    // Teardown

    /// Removes every object, then frees the shared programs once the
    /// registries are empty.
    pub fn dispose(&mut self) {
        if self.disposing {
            return;
        }
        self.disposing = true;
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.deactivate();
        }

        let planes: Vec<PlaneId> = self.planes.iter().map(PlaneEntry::id).collect();
        for id in planes {
            let _ = self.remove_plane(id);
        }
        let passes: Vec<ShaderPassId> = self.passes.iter().map(ShaderPass::id).collect();
        for id in passes {
            let _ = self.remove_shader_pass(id);
        }
        let targets: Vec<RenderTargetId> = self.targets.iter().map(RenderTarget::id).collect();
        for id in targets {
            let _ = self.remove_render_target(id);
        }

        self.next_render.add(true, |renderer, handle| {
            if renderer.planes.is_empty() && renderer.passes.is_empty() && renderer.targets.is_empty() {
                handle.stop();
                if let Some(ctx) = renderer.ctx.as_mut() {
                    ctx.delete_cached_programs();
                }
                renderer.handlers = RendererHandlers::default();
            }
        });
    }

    pub fn is_disposing(&self) -> bool {
        self.disposing
    }

    // Events

    pub fn on_error(&mut self, callback: impl FnMut(&mut Renderer, &PlanarError) + 'static) -> &mut Self {
        self.handlers.error = Some(Box::new(callback));
        self
    }

    pub fn on_context_lost(&mut self, callback: impl FnMut(&mut Renderer) + 'static) -> &mut Self {
        self.handlers.context_lost = Some(Box::new(callback));
        self
    }

    pub fn on_context_restored(&mut self, callback: impl FnMut(&mut Renderer) + 'static) -> &mut Self {
        self.handlers.context_restored = Some(Box::new(callback));
        self
    }

    pub fn on_render(&mut self, callback: impl FnMut(&mut Renderer) + 'static) -> &mut Self {
        self.handlers.render = Some(Box::new(callback));
        self
    }

    pub fn on_after_resize(&mut self, callback: impl FnMut(&mut Renderer) + 'static) -> &mut Self {
        self.handlers.after_resize = Some(Box::new(callback));
        self
    }

    pub fn on_scroll(&mut self, callback: impl FnMut(&mut Renderer) + 'static) -> &mut Self {
        self.handlers.scroll = Some(Box::new(callback));
        self
    }

    fn run(&mut self, slot: fn(&mut RendererHandlers) -> &mut Option<RendererCallback>) {
        if let Some(mut callback) = slot(&mut self.handlers).take() {
            callback(self);
            let current = slot(&mut self.handlers);
            if current.is_none() {
                *current = Some(callback);
            }
        }
    }

    fn fire_error(&mut self, error: &PlanarError) {
        if let Some(mut callback) = self.handlers.error.take() {
            callback(self, error);
            if self.handlers.error.is_none() {
                self.handlers.error = Some(callback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::dom::DomBounds;
    use crate::gl::{GlCall, GlContext, HeadlessFactory};
    use std::cell::Cell;

    fn container() -> Box<dyn ElementBounds> {
        Box::new(DomBounds::new(0.0, 0.0, 800.0, 600.0))
    }

    fn element() -> Box<dyn ElementBounds> {
        Box::new(DomBounds::new(100.0, 100.0, 200.0, 150.0))
    }

    #[test]
    fn test_falls_back_to_webgl1() {
        let factory = HeadlessFactory::webgl1_only();
        let renderer = Renderer::new(RendererConfig::default(), &factory, container());
        assert!(renderer.is_active());
        assert_eq!(renderer.context().map(RenderContext::version), Some(GlVersion::WebGl1));
    }

    #[test]
    fn test_missing_context_reports_next_frame() {
        let factory = HeadlessFactory::unavailable();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        assert!(!renderer.is_active());

        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        renderer.on_error(move |_, error| {
            assert_eq!(error, &PlanarError::ContextUnavailable);
            seen.set(seen.get() + 1);
        });
        assert_eq!(errors.get(), 0);
        renderer.render();
        assert_eq!(errors.get(), 1);
        renderer.render();
        assert_eq!(errors.get(), 1);

        assert_eq!(
            renderer.add_plane(element(), &PlaneParams::default()),
            Err(PlanarError::RendererInactive)
        );
    }

    #[test]
    fn test_invalid_config_is_warned() {
        let sink = MemorySink::default();
        let config = RendererConfig {
            rendering_scale: 4.0,
            ..RendererConfig::default()
        };
        let renderer = Renderer::with_sink(config, &HeadlessFactory::new(), container(), Box::new(sink.clone()));
        assert_eq!(renderer.config().rendering_scale, 1.0);
        assert_eq!(sink.warnings(), 1);
    }

    #[test]
    fn test_canvas_follows_pixel_ratio() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        let resized = Rc::new(Cell::new(0));
        let seen = Rc::clone(&resized);
        renderer.on_after_resize(move |_| seen.set(seen.get() + 1));

        renderer.set_pixel_ratio(2.0);
        let gl = factory.last().unwrap();
        assert_eq!(gl.drawing_buffer_size(), (1600, 1200));
        assert_eq!(resized.get(), 1);
    }

    #[test]
    fn test_shader_pass_owns_its_target() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        let pass = renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
        assert_eq!(renderer.render_targets().len(), 1);
        assert!(renderer.shader_pass(pass).unwrap().is_scene_pass());
        assert_eq!(renderer.scene().scene_passes(), &[0]);

        renderer.remove_shader_pass(pass).unwrap();
        assert!(renderer.render_targets().is_empty());
        assert!(renderer.scene().scene_passes().is_empty());
    }

    #[test]
    fn test_attached_target_is_kept() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        let target = renderer.add_render_target(RenderTargetParams::default()).unwrap();
        let pass = renderer
            .add_shader_pass(&ShaderPassParams {
                render_target: Some(target),
                ..ShaderPassParams::default()
            })
            .unwrap();
        assert!(!renderer.shader_pass(pass).unwrap().is_scene_pass());
        assert_eq!(renderer.scene().render_passes(), &[0]);

        renderer.remove_render_target(target).unwrap();
        assert!(renderer.render_target(target).is_some());
    }

    #[test]
    fn test_scene_pass_receives_planes() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        renderer.add_plane(element(), &PlaneParams::default()).unwrap();
        renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
        let gl = factory.last().unwrap();
        let framebuffer = renderer.render_targets()[0].framebuffer();

        gl.clear_calls();
        renderer.render();
        let binds: Vec<GlCall> = gl
            .calls()
            .into_iter()
            .filter(|call| matches!(call, GlCall::BindFramebuffer(_)))
            .collect();
        assert_eq!(
            binds,
            vec![
                GlCall::BindFramebuffer(None),
                GlCall::BindFramebuffer(framebuffer),
                GlCall::BindFramebuffer(None),
            ]
        );
        assert_eq!(gl.draw_order().len(), 2);
    }

    #[test]
    fn test_disabled_drawing_still_runs_queue() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        renderer.add_plane(element(), &PlaneParams::default()).unwrap();
        let gl = factory.last().unwrap();
        renderer.disable_drawing();

        let ran = Rc::new(Cell::new(false));
        let seen = Rc::clone(&ran);
        renderer.next_render().add(false, move |_, _| seen.set(true));

        gl.clear_calls();
        renderer.render();
        assert!(ran.get());
        assert!(gl.draw_order().is_empty());

        renderer.need_render();
        renderer.render();
        assert_eq!(gl.draw_order().len(), 1);
        renderer.render();
        assert_eq!(gl.draw_order().len(), 1);
    }

    #[test]
    fn test_error_event_reaches_plane() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        let params = PlaneParams {
            fragment_shader: Some("#error broken".into()),
            ..PlaneParams::default()
        };
        let id = renderer.add_plane(element(), &params).unwrap();
        let errors = Rc::new(Cell::new(0));
        let seen = Rc::clone(&errors);
        renderer.plane_mut(id).unwrap().on_error(move |_, _| seen.set(seen.get() + 1));

        renderer.render();
        assert_eq!(errors.get(), 1);
        assert!(!renderer.plane(id).unwrap().can_draw());
    }

    #[test]
    fn test_dispose_frees_programs() {
        let factory = HeadlessFactory::new();
        let mut renderer = Renderer::new(RendererConfig::default(), &factory, container());
        renderer.add_plane(element(), &PlaneParams::default()).unwrap();
        renderer.add_shader_pass(&ShaderPassParams::default()).unwrap();
        let gl = factory.last().unwrap();

        renderer.dispose();
        assert!(renderer.planes().next().is_none());
        assert!(renderer.render_targets().is_empty());
        assert!(!renderer.is_active());
        assert!(!renderer.context_lost());

        renderer.render();
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_textures(), 0);
    }
}
