use anyhow::Context;
use serde::Deserialize;
use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, ShaderSource,
    StencilState,
};

use crate::rendering::{
    bindings::{BufferSlot, NamedBufferBindings},
    shader_loader::{PipelineCacheBuilder, RenderPipelineId, ShaderDefinition},
    texture::DepthTexture,
};

pub const INDICES_SLOT: &str = "_Indices";
pub const VERTEX_DATA_SLOT: &str = "_vData";
pub const INSTANCE_DATA_SLOT: &str = "_iData";

const MATERIAL_SLOTS: &[BufferSlot] = &[
    BufferSlot::read_only(INDICES_SLOT, 0),
    BufferSlot::read_only(VERTEX_DATA_SLOT, 1),
    BufferSlot::read_only(INSTANCE_DATA_SLOT, 2),
];

const INSTANCED_MESH_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Instanced mesh shader",
    path: "instanced_mesh.wgsl",
};

struct MaterialPass {
    name: &'static str,
    fragment_entry: &'static str,
    depth_compare: wgpu::CompareFunction,
}

const MATERIAL_PASSES: &[MaterialPass] = &[
    MaterialPass {
        name: "Lit",
        fragment_entry: "fs_lit",
        depth_compare: wgpu::CompareFunction::Less,
    },
    MaterialPass {
        name: "Normals",
        fragment_entry: "fs_normals",
        depth_compare: wgpu::CompareFunction::LessEqual,
    },
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshTopology {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl MeshTopology {
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            MeshTopology::Triangles => wgpu::PrimitiveTopology::TriangleList,
            MeshTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            MeshTopology::Lines => wgpu::PrimitiveTopology::LineList,
            MeshTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            MeshTopology::Points => wgpu::PrimitiveTopology::PointList,
        }
    }
}

/// Material for procedurally drawn instanced meshes. Geometry and instance transforms are
/// read from named storage buffers instead of vertex buffers.
pub struct InstancingMaterial {
    bindings: NamedBufferBindings,
    topology: MeshTopology,
    pass_pipelines: Vec<RenderPipelineId>,
}

impl InstancingMaterial {
    pub fn create(
        device: &wgpu::Device,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        cache_builder: &mut PipelineCacheBuilder<wgpu::RenderPipeline>,
        color_format: wgpu::TextureFormat,
        topology: MeshTopology,
    ) -> Self {
        let bindings = NamedBufferBindings::new(
            device,
            "Instancing material",
            MATERIAL_SLOTS,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Instancing material pipeline layout"),
            bind_group_layouts: &[camera_bind_group_layout, bindings.layout()],
            push_constant_ranges: &[],
        });

        let pass_pipelines = MATERIAL_PASSES
            .iter()
            .map(|pass| {
                let pipeline_layout = pipeline_layout.clone();
                let pass_name = pass.name;
                let fragment_entry = pass.fragment_entry;
                let depth_compare = pass.depth_compare;

                cache_builder.add_shader(
                    INSTANCED_MESH_SHADER,
                    Box::new(
                        move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                            let shader =
                                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                                    label: Some(shader_def.name),
                                    source: ShaderSource::Wgsl(source.into()),
                                });

                            let label = format!("Instancing material pipeline ({})", pass_name);

                            let pipeline =
                                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                                    label: Some(&label),
                                    layout: Some(&pipeline_layout),
                                    vertex: wgpu::VertexState {
                                        module: &shader,
                                        entry_point: Some("vs_main"),
                                        buffers: &[],
                                        compilation_options: PipelineCompilationOptions::default(),
                                    },
                                    fragment: Some(wgpu::FragmentState {
                                        module: &shader,
                                        entry_point: Some(fragment_entry),
                                        targets: &[Some(wgpu::ColorTargetState {
                                            format: color_format,
                                            blend: Some(wgpu::BlendState::REPLACE),
                                            write_mask: wgpu::ColorWrites::ALL,
                                        })],
                                        compilation_options: PipelineCompilationOptions::default(),
                                    }),
                                    primitive: wgpu::PrimitiveState {
                                        topology: topology.to_wgpu(),
                                        strip_index_format: None,
                                        front_face: wgpu::FrontFace::Ccw,
                                        cull_mode: None,
                                        polygon_mode: wgpu::PolygonMode::Fill,
                                        unclipped_depth: false,
                                        conservative: false,
                                    },
                                    depth_stencil: Some(wgpu::DepthStencilState {
                                        format: DepthTexture::DEPTH_FORMAT,
                                        depth_write_enabled: true,
                                        depth_compare,
                                        stencil: StencilState::default(),
                                        bias: DepthBiasState::default(),
                                    }),
                                    multisample: MultisampleState::default(),
                                    multiview: None,
                                    cache: None,
                                });

                            Ok(pipeline)
                        },
                    ),
                )
            })
            .collect();

        Self {
            bindings,
            topology,
            pass_pipelines,
        }
    }

    pub fn set_buffer(&mut self, name: &str, buffer: &wgpu::Buffer) -> anyhow::Result<()> {
        self.bindings.set_buffer(name, buffer)
    }

    pub fn clear_buffers(&mut self) {
        self.bindings.clear();
    }

    pub fn bind_group(&self, device: &wgpu::Device) -> anyhow::Result<wgpu::BindGroup> {
        self.bindings.create_bind_group(device)
    }

    #[cfg(test)]
    pub fn pass_count(&self) -> usize {
        self.pass_pipelines.len()
    }

    /// Pipelines are compiled for a single topology, so asking for another one is an error.
    pub fn pass_pipeline(
        &self,
        pass_index: usize,
        topology: MeshTopology,
    ) -> anyhow::Result<RenderPipelineId> {
        if topology != self.topology {
            anyhow::bail!(
                "Material was built for {:?} topology, not {:?}",
                self.topology,
                topology
            );
        }

        self.pass_pipelines
            .get(pass_index)
            .copied()
            .with_context(|| format!("Material has no shader pass {}", pass_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::{render_camera::RenderCamera, test_support::test_device};

    #[test]
    fn topology_maps_to_wgpu_primitives() {
        assert_eq!(
            MeshTopology::Triangles.to_wgpu(),
            wgpu::PrimitiveTopology::TriangleList
        );
        assert_eq!(
            MeshTopology::LineStrip.to_wgpu(),
            wgpu::PrimitiveTopology::LineStrip
        );
        assert_eq!(
            MeshTopology::Points.to_wgpu(),
            wgpu::PrimitiveTopology::PointList
        );
    }

    #[test]
    fn registers_one_pipeline_per_pass() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let camera_layout = RenderCamera::create_bind_group_layout(&device);
        let mut builder = PipelineCacheBuilder::new();
        let material = InstancingMaterial::create(
            &device,
            &camera_layout,
            &mut builder,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            MeshTopology::Lines,
        );

        assert_eq!(material.pass_count(), MATERIAL_PASSES.len());
        assert_eq!(builder.len(), MATERIAL_PASSES.len());

        assert!(material.pass_pipeline(1, MeshTopology::Lines).is_ok());
        assert!(material.pass_pipeline(2, MeshTopology::Lines).is_err());
        assert!(material.pass_pipeline(0, MeshTopology::Triangles).is_err());
    }
}
