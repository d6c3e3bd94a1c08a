// Most exporters can write tangents, but not every asset has them and the procedural cube
// never does. Missing tangents are generated here.

use anyhow::bail;
use bevy_mikktspace::{generate_tangents, Geometry};

use crate::mesh::Mesh;

impl Mesh {
    fn vertex_index(&self, face: usize, vert: usize) -> usize {
        self.indices[face * 3 + vert] as usize
    }

    /// Generate tangents for this mesh using mikktspace algorithm
    pub fn generate_tangents(&mut self) -> anyhow::Result<()> {
        if self.tangents.len() != self.positions.len() {
            self.tangents = vec![glam::Vec4::ZERO; self.positions.len()];
        }

        let success = generate_tangents(self);

        if !success {
            bail!("Failed to generate tangents for {}", self.name)
        }

        Ok(())
    }
}

impl Geometry for Mesh {
    fn num_faces(&self) -> usize {
        self.indices.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.positions[self.vertex_index(face, vert)].to_array()
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.normals[self.vertex_index(face, vert)].to_array()
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.uvs[self.vertex_index(face, vert)].to_array()
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        let index = self.vertex_index(face, vert);
        self.tangents[index] = glam::Vec4::from_array(tangent);
    }
}
