use std::sync::Arc;

use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::{
    camera::Camera,
    rendering::command_buffer::{
        CameraCommandBuffers, CameraEvent, CameraId, CommandBufferTarget, DrawCommand,
    },
};

/// This should match `CameraUniform` in shaders/shared/common.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    position: Vec4,
}

impl CameraUniform {
    pub fn update(&mut self, resolution: PhysicalSize<u32>, camera: &Camera) {
        self.view_proj = camera.get_vp_matrix(camera.viewport_resolution(resolution));
        self.position = camera.eye.extend(1.0);
    }
}

/// GPU side of a camera: uniforms plus the command buffers other components attached to it.
pub struct RenderCamera {
    id: CameraId,
    pub camera: Camera,
    uniform: CameraUniform,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pub command_buffers: CameraCommandBuffers,
}

impl RenderCamera {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        id: CameraId,
        camera: Camera,
        resolution: PhysicalSize<u32>,
    ) -> Self {
        let mut uniform = CameraUniform::default();
        uniform.update(resolution, &camera);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera uniform buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            id,
            camera,
            uniform,
            uniform_buffer,
            bind_group,
            command_buffers: CameraCommandBuffers::default(),
        }
    }

    pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        })
    }

    pub fn update_camera(&mut self, camera: &Camera) {
        self.camera = camera.clone();
    }

    pub fn update_uniform_buffer(&mut self, queue: &wgpu::Queue, resolution: PhysicalSize<u32>) {
        self.uniform.update(resolution, &self.camera);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

impl CommandBufferTarget for RenderCamera {
    fn camera_id(&self) -> CameraId {
        self.id
    }

    fn add_command_buffer(&mut self, event: CameraEvent, command: Arc<DrawCommand>) {
        self.command_buffers.add(event, command);
    }
}
