/// Grid geometry for planes
use std::rc::Rc;

use crate::error::{PlanarError, Result};
use crate::gl::{BufferHandle, GlContext, ProgramHandle, VertexArrayHandle};

pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const TEXTURE_COORD_ATTRIBUTE: &str = "aTextureCoord";

/// Floats per vertex for both attributes.
const COMPONENTS: usize = 3;

/// Largest segment count per side; ids pack each side in 16 bits.
pub const MAX_SEGMENTS: u32 = 0xffff;

/// Keeps a segment count between one and [`MAX_SEGMENTS`].
pub fn clamp_segments(segments: u32) -> u32 {
    segments.clamp(1, MAX_SEGMENTS)
}

/// Cache key of a grid, derived from its segment counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

impl GeometryId {
    /// Segment counts are packed in separate halves so no two grids collide.
    pub fn from_segments(width: u32, height: u32) -> Self {
        Self(((width & 0xffff) << 16) | (height & 0xffff))
    }
}

/// CPU side vertex data of a grid
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryData {
    pub id: GeometryId,
    pub width_segments: u32,
    pub height_segments: u32,
    /// xyz triplets in -1..1
    pub positions: Vec<f32>,
    /// uv triplets in 0..1, z unused
    pub texture_coords: Vec<f32>,
}

impl GeometryData {
    /// Two triangles per cell, six vertices each.
    pub fn plane(width_segments: u32, height_segments: u32) -> Self {
        let width = clamp_segments(width_segments);
        let height = clamp_segments(height_segments);
        let cells = width as usize * height as usize;
        let mut positions = Vec::with_capacity(cells * 6 * COMPONENTS);
        let mut texture_coords = Vec::with_capacity(cells * 6 * COMPONENTS);

        let step_u = 1.0 / width as f32;
        let step_v = 1.0 / height as f32;
        for y in 0..height {
            let v = y as f32 * step_v;
            for x in 0..width {
                let u = x as f32 * step_u;
                let corners = [
                    (u, v),
                    (u + step_u, v),
                    (u, v + step_v),
                    (u, v + step_v),
                    (u + step_u, v),
                    (u + step_u, v + step_v),
                ];
                for (cu, cv) in corners {
                    texture_coords.extend_from_slice(&[cu, cv, 0.0]);
                    positions.extend_from_slice(&[(cu - 0.5) * 2.0, (cv - 0.5) * 2.0, 0.0]);
                }
            }
        }

        Self {
            id: GeometryId::from_segments(width, height),
            width_segments: width,
            height_segments: height,
            positions,
            texture_coords,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / COMPONENTS
    }
}

#[derive(Debug, Clone, Copy)]
struct Attribute {
    buffer: BufferHandle,
    location: u32,
}

/// Vertex buffers of one mesh, built from shared [`GeometryData`]
#[derive(Debug)]
pub struct Geometry {
    data: Rc<GeometryData>,
    vao: Option<VertexArrayHandle>,
    attributes: Vec<Attribute>,
}

impl Geometry {
    pub fn new(data: Rc<GeometryData>) -> Self {
        Self {
            data,
            vao: None,
            attributes: Vec::new(),
        }
    }

    pub fn data(&self) -> &Rc<GeometryData> {
        &self.data
    }

    pub fn id(&self) -> GeometryId {
        self.data.id
    }

    pub fn vertex_count(&self) -> usize {
        self.data.vertex_count()
    }

    pub fn is_uploaded(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Creates the buffers and the vertex array, if the context has them.
    pub fn upload(&mut self, gl: &dyn GlContext, program: ProgramHandle) -> Result<()> {
        self.vao = gl.create_vertex_array();
        if self.vao.is_some() {
            gl.bind_vertex_array(self.vao);
        }
        self.attributes.clear();
        let data = Rc::clone(&self.data);
        for (name, values) in [
            (POSITION_ATTRIBUTE, &data.positions),
            (TEXTURE_COORD_ATTRIBUTE, &data.texture_coords),
        ] {
            let Some(location) = gl.attrib_location(program, name) else {
                log::debug!("attribute {name} is not used by program {}", program.0);
                continue;
            };
            let buffer = gl
                .create_buffer()
                .ok_or(PlanarError::ResourceCreation("vertex buffer"))?;
            gl.bind_array_buffer(Some(buffer));
            gl.array_buffer_data(bytemuck::cast_slice(values.as_slice()));
            gl.vertex_attrib_pointer(location, COMPONENTS as i32, 0, 0);
            gl.enable_vertex_attrib_array(location);
            self.attributes.push(Attribute { buffer, location });
        }
        Ok(())
    }

    pub fn bind(&self, gl: &dyn GlContext) {
        if self.vao.is_some() {
            gl.bind_vertex_array(self.vao);
            return;
        }
        for attribute in &self.attributes {
            gl.bind_array_buffer(Some(attribute.buffer));
            gl.vertex_attrib_pointer(attribute.location, COMPONENTS as i32, 0, 0);
            gl.enable_vertex_attrib_array(attribute.location);
        }
    }

    pub fn draw(&self, gl: &dyn GlContext) {
        gl.draw_arrays(0, self.vertex_count() as i32);
    }

    /// Rebuilds the GPU objects after a context restore, reusing the CPU data.
    pub fn restore(&mut self, gl: &dyn GlContext, program: ProgramHandle) -> Result<()> {
        self.vao = None;
        self.attributes.clear();
        self.upload(gl, program)
    }

    pub fn dispose(&mut self, gl: &dyn GlContext) {
        if let Some(vao) = self.vao.take() {
            gl.delete_vertex_array(vao);
        }
        for attribute in self.attributes.drain(..) {
            gl.delete_buffer(attribute.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_vertex_count() {
        let data = GeometryData::plane(2, 2);
        assert_eq!(data.vertex_count(), 24);
        assert_eq!(data.positions.len(), 72);
        assert_eq!(data.texture_coords.len(), 72);
    }

    #[test]
    fn test_single_cell_corners() {
        let data = GeometryData::plane(1, 1);
        assert_eq!(&data.positions[0..3], &[-1.0, -1.0, 0.0]);
        assert_eq!(&data.positions[15..18], &[1.0, 1.0, 0.0]);
        assert_eq!(&data.texture_coords[15..18], &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_ids_do_not_collide() {
        // w * h + w is 4 for both
        assert_ne!(GeometryId::from_segments(1, 3), GeometryId::from_segments(2, 1));
        assert_eq!(GeometryId::from_segments(4, 4), GeometryId::from_segments(4, 4));
    }

    #[test]
    fn test_huge_segments_are_clamped() {
        let data = GeometryData::plane(100_000, 1);
        assert_eq!(data.width_segments, MAX_SEGMENTS);
        assert_eq!(data.vertex_count(), MAX_SEGMENTS as usize * 6);
        assert_eq!(data.id, GeometryId::from_segments(MAX_SEGMENTS, 1));
        assert_ne!(data.id, GeometryId::from_segments(100_000, 1));
    }

    #[test]
    fn test_zero_segments_fall_back_to_one() {
        let data = GeometryData::plane(0, 0);
        assert_eq!(data.vertex_count(), 6);
    }
}
