use std::path::Path;

use anyhow::Context;
use glam::{Vec2, Vec3, Vec4};

/// Source geometry for instancing: an index list plus per-vertex attribute streams.
/// Attribute `i` of every stream belongs to vertex `i`.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub indices: Vec<u32>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub tangents: Vec<Vec4>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Loads the first primitive of the first mesh in a glTF file.
    pub fn from_gltf_file(path: impl AsRef<Path>) -> anyhow::Result<Mesh> {
        let path = path.as_ref();
        let (document, buffers, _images) = gltf::import(path)
            .with_context(|| format!("Failed to import glTF file {}", path.display()))?;

        let gltf_mesh = document
            .meshes()
            .next()
            .with_context(|| format!("No meshes in {}", path.display()))?;

        let name = gltf_mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        Self::from_gltf(name, gltf_mesh, &buffers)
    }

    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: &[gltf::buffer::Data],
    ) -> anyhow::Result<Mesh> {
        let name = name.into();

        let primitive = mesh
            .primitives()
            .next()
            .with_context(|| format!("Mesh without primitives: {}", name))?;

        if primitive.mode() != gltf::mesh::Mode::Triangles {
            anyhow::bail!("Unsupported primitive mode: {:?}", primitive.mode());
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions = reader
            .read_positions()
            .context("Failed to read positions")?
            .map(Vec3::from)
            .collect::<Vec<_>>();
        let normals = reader
            .read_normals()
            .context("Failed to read normals")?
            .map(Vec3::from)
            .collect::<Vec<_>>();
        let uvs = reader
            .read_tex_coords(0)
            .context("Failed to read tex coords")?
            .into_f32()
            .map(Vec2::from)
            .collect::<Vec<_>>();
        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect::<Vec<_>>(),
            None => (0..positions.len() as u32).collect(),
        };

        let tangents = reader
            .read_tangents()
            .map(|tangents| tangents.map(Vec4::from).collect::<Vec<_>>());

        let mut mesh = Mesh {
            name,
            indices,
            tangents: vec![Vec4::ZERO; positions.len()],
            positions,
            normals,
            uvs,
        };

        match tangents {
            Some(tangents) => mesh.tangents = tangents,
            None => mesh.generate_tangents()?,
        }

        Ok(mesh)
    }

    /// Unit cube centered on the origin, four vertices per face so normals stay flat.
    pub fn cube(name: impl Into<String>) -> anyhow::Result<Mesh> {
        const FACES: [(Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (Vec3::NEG_Y, Vec3::Z),
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
        ];

        let mut mesh = Mesh {
            name: name.into(),
            ..Default::default()
        };

        for (normal, up) in FACES {
            let right = up.cross(normal);
            let base = mesh.positions.len() as u32;

            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let offset = right * (u - 0.5) + up * (v - 0.5);
                mesh.positions.push(normal * 0.5 + offset);
                mesh.normals.push(normal);
                mesh.uvs.push(Vec2::new(u, v));
                mesh.tangents.push(Vec4::ZERO);
            }

            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh.generate_tangents()?;

        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_flat_faces() {
        let cube = Mesh::cube("cube").unwrap();

        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.normals.len(), 24);
        assert_eq!(cube.uvs.len(), 24);
        assert_eq!(cube.tangents.len(), 24);
        assert!(cube.indices.iter().all(|&index| (index as usize) < cube.vertex_count()));

        for (position, normal) in cube.positions.iter().zip(&cube.normals) {
            assert!((position.dot(*normal) - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn cube_tangents_are_perpendicular_to_normals() {
        let cube = Mesh::cube("cube").unwrap();

        for (tangent, normal) in cube.tangents.iter().zip(&cube.normals) {
            assert!((tangent.truncate().length() - 1.0).abs() < 1e-4);
            assert!(tangent.truncate().dot(*normal).abs() < 1e-4);
            assert!(tangent.w == 1.0 || tangent.w == -1.0);
        }
    }
}
