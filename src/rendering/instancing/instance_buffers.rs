use wgpu::util::DeviceExt;

use crate::rendering::instancing::{instance_data::InstanceData, vertex_data::VertexData};

/// The three GPU buffers backing one instanced mesh. Each is sized exactly to its contents
/// and never resized; `release` destroys them and is safe to call repeatedly.
pub struct InstanceBuffers {
    indices: Option<wgpu::Buffer>,
    vertices: Option<wgpu::Buffer>,
    instances: Option<wgpu::Buffer>,
}

impl InstanceBuffers {
    pub fn empty() -> Self {
        Self {
            indices: None,
            vertices: None,
            instances: None,
        }
    }

    pub fn upload(
        device: &wgpu::Device,
        name: &str,
        indices: &[u32],
        vertices: &[VertexData],
        instances: &[InstanceData],
    ) -> Self {
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Mesh indices ({})", name)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Mesh vertex data ({})", name)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Instance data ({})", name)),
            contents: bytemuck::cast_slice(instances),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            indices: Some(indices),
            vertices: Some(vertices),
            instances: Some(instances),
        }
    }

    pub fn indices(&self) -> Option<&wgpu::Buffer> {
        self.indices.as_ref()
    }

    pub fn vertices(&self) -> Option<&wgpu::Buffer> {
        self.vertices.as_ref()
    }

    pub fn instances(&self) -> Option<&wgpu::Buffer> {
        self.instances.as_ref()
    }

    pub fn index_count(&self) -> u64 {
        element_count::<u32>(self.indices.as_ref())
    }

    pub fn vertex_count(&self) -> u64 {
        element_count::<VertexData>(self.vertices.as_ref())
    }

    pub fn instance_count(&self) -> u64 {
        element_count::<InstanceData>(self.instances.as_ref())
    }

    pub fn is_allocated(&self) -> bool {
        self.indices.is_some() || self.vertices.is_some() || self.instances.is_some()
    }

    pub fn release(&mut self) {
        for buffer in [
            self.indices.take(),
            self.vertices.take(),
            self.instances.take(),
        ]
        .into_iter()
        .flatten()
        {
            log::debug!("Releasing {} byte buffer", buffer.size());
            buffer.destroy();
        }
    }
}

impl Drop for InstanceBuffers {
    fn drop(&mut self) {
        self.release();
    }
}

fn element_count<T>(buffer: Option<&wgpu::Buffer>) -> u64 {
    buffer.map_or(0, |buffer| buffer.size() / std::mem::size_of::<T>() as u64)
}
