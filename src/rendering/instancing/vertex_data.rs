use glam::{Vec2, Vec3, Vec4};
use itertools::izip;

use crate::mesh::Mesh;

/// This should match the same structure defined in WGSL (shaders/shared/common.wgsl)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexData {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

/// Interleaves the mesh attribute streams, keeping vertex order.
pub fn pack_vertices(mesh: &Mesh) -> Vec<VertexData> {
    izip!(&mesh.positions, &mesh.normals, &mesh.uvs, &mesh.tangents)
        .map(|(&position, &normal, &uv, &tangent)| VertexData {
            position,
            normal,
            uv,
            tangent,
        })
        .collect()
}
