/// Draw order of planes and shader passes
///
/// Planes are grouped by transparency class, then by program, so consecutive
/// draws share as much GPU state as possible.
use std::collections::HashMap;

use crate::context::RenderContext;
use crate::drawable::{render, DrawContext, Drawable};
use crate::program::ProgramId;
use crate::render_target::{RenderTarget, RenderTargetId};
use crate::shader_pass::ShaderPass;

/// Plane indices bucketed by program, plus the order programs are visited in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneStack {
    programs: HashMap<ProgramId, Vec<usize>>,
    order: Vec<ProgramId>,
}

impl PlaneStack {
    pub fn is_empty(&self) -> bool {
        self.programs.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.programs.values().map(Vec::len).sum()
    }

    pub fn order(&self) -> &[ProgramId] {
        &self.order
    }

    pub fn bucket(&self, program: ProgramId) -> &[usize] {
        self.programs.get(&program).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Plane indices in the order they get drawn.
    pub fn draw_order(&self) -> Vec<usize> {
        self.order
            .iter()
            .flat_map(|program| self.bucket(*program).iter().copied())
            .collect()
    }

    fn visit(&mut self, program: ProgramId) {
        if !self.order.contains(&program) {
            self.order.push(program);
        }
    }

    fn remove(&mut self, index: usize) -> bool {
        let mut removed = false;
        for bucket in self.programs.values_mut() {
            let before = bucket.len();
            bucket.retain(|entry| *entry != index);
            removed |= bucket.len() != before;
        }
        removed
    }
}

/// Where a plane sits in the stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEntry {
    pub index: usize,
    pub program: ProgramId,
    pub transparent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    opaque: PlaneStack,
    transparent: PlaneStack,
    render_passes: Vec<usize>,
    scene_passes: Vec<usize>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opaque(&self) -> &PlaneStack {
        &self.opaque
    }

    pub fn transparent(&self) -> &PlaneStack {
        &self.transparent
    }

    pub fn render_passes(&self) -> &[usize] {
        &self.render_passes
    }

    pub fn scene_passes(&self) -> &[usize] {
        &self.scene_passes
    }

    /// Opaque planes append, transparent ones prepend.
    pub fn add_plane(&mut self, entry: StackEntry) {
        for stack in [&mut self.opaque, &mut self.transparent] {
            stack.programs.entry(entry.program).or_default();
        }
        if entry.transparent {
            self.transparent.visit(entry.program);
            if let Some(bucket) = self.transparent.programs.get_mut(&entry.program) {
                bucket.insert(0, entry.index);
            }
        } else {
            self.opaque.visit(entry.program);
            if let Some(bucket) = self.opaque.programs.get_mut(&entry.program) {
                bucket.push(entry.index);
            }
        }
    }

    /// Makes the plane the last one drawn among planes of its program and
    /// class, and its program the last one visited.
    pub fn move_plane_to_front(&mut self, entry: StackEntry) {
        let stack = if entry.transparent {
            &mut self.transparent
        } else {
            &mut self.opaque
        };
        stack.remove(entry.index);
        stack.programs.entry(entry.program).or_default().push(entry.index);
        stack.order.retain(|program| *program != entry.program);
        stack.order.push(entry.program);
    }

    /// Rebuilds both plane stacks from the live registry.
    pub fn reset_plane_stacks(&mut self, entries: impl IntoIterator<Item = StackEntry>) {
        self.opaque = PlaneStack::default();
        self.transparent = PlaneStack::default();
        for entry in entries {
            self.add_plane(entry);
        }
    }

    pub fn add_shader_pass(&mut self, index: usize, scene_pass: bool) {
        if scene_pass {
            self.scene_passes.push(index);
        } else {
            self.render_passes.push(index);
        }
    }

    /// Rebuilds the pass stacks from `(index, is_scene_pass)` pairs.
    pub fn reset_shader_pass_stacks(&mut self, passes: impl IntoIterator<Item = (usize, bool)>) {
        self.render_passes.clear();
        self.scene_passes.clear();
        for (index, scene_pass) in passes {
            self.add_shader_pass(index, scene_pass);
        }
    }

    /// Draws one frame: opaque planes, transparent planes over a cleared
    /// depth buffer, render passes, then the scene pass chain.
    pub fn draw<P: Drawable>(
        &self,
        ctx: &mut RenderContext,
        planes: &mut [P],
        passes: &mut [ShaderPass],
        targets: &[RenderTarget],
    ) {
        let scene_targets: Vec<RenderTargetId> = self
            .scene_passes
            .iter()
            .filter_map(|index| passes.get(*index).map(ShaderPass::target_id))
            .collect();

        ctx.set_scene_pass_index(None);
        if !scene_targets.is_empty() && self.render_passes.is_empty() && !planes.is_empty() {
            ctx.set_scene_pass_index(Some(0));
            let first = targets.iter().find(|target| target.id() == scene_targets[0]);
            ctx.bind_frame_buffer(first, false);
        }

        let mut frame = DrawContext {
            ctx,
            targets,
            scene_targets: &scene_targets,
        };

        for index in self.opaque.draw_order() {
            if let Some(plane) = planes.get_mut(index) {
                render(plane, &mut frame);
            }
        }

        if !self.transparent.is_empty() {
            frame.ctx.clear_depth();
            for index in self.transparent.draw_order() {
                if let Some(plane) = planes.get_mut(index) {
                    render(plane, &mut frame);
                }
            }
        }

        if !scene_targets.is_empty() && !self.render_passes.is_empty() {
            frame.ctx.set_scene_pass_index(Some(0));
            let first = targets.iter().find(|target| target.id() == scene_targets[0]);
            frame.ctx.bind_frame_buffer(first, false);
        }

        for index in &self.render_passes {
            if let Some(pass) = passes.get_mut(*index) {
                render(pass, &mut frame);
            }
        }

        for (position, index) in self.scene_passes.iter().enumerate() {
            frame.ctx.set_scene_pass_index(Some(position));
            if let Some(pass) = passes.get_mut(*index) {
                render(pass, &mut frame);
            }
        }
    }
}
