use anyhow::Context;
use wgpu::{Device, PipelineCompilationOptions, ShaderSource};

use crate::rendering::{
    bindings::{BufferSlot, NamedBufferBindings},
    shader_loader::{
        self, ComputePipelineCache, ComputePipelineId, PipelineCacheBuilder, ShaderDefinition,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelId(usize);

struct Kernel {
    name: String,
    pipeline_id: ComputePipelineId,
    bindings: NamedBufferBindings,
}

/// A WGSL file whose `@compute` entry points are exposed as kernels looked up by name.
/// Group 0 holds the named storage buffers, group 1 the global uniform.
pub struct ComputeProgram {
    name: &'static str,
    kernels: Vec<Kernel>,
}

impl ComputeProgram {
    pub fn load(
        device: &wgpu::Device,
        shader: ShaderDefinition,
        slots: &'static [BufferSlot],
        globals_layout: &wgpu::BindGroupLayout,
        cache_builder: &mut PipelineCacheBuilder<wgpu::ComputePipeline>,
    ) -> anyhow::Result<Self> {
        let module = shader_loader::parse_shader(&shader)
            .with_context(|| format!("Failed to parse compute program {}", shader.name))?;

        let kernel_names = module
            .entry_points
            .iter()
            .filter(|entry| entry.stage == naga::ShaderStage::Compute)
            .map(|entry| entry.name.clone())
            .collect::<Vec<_>>();

        let kernels = kernel_names
            .into_iter()
            .map(|kernel_name| {
                let bindings = NamedBufferBindings::new(
                    device,
                    "Compute program buffers",
                    slots,
                    wgpu::ShaderStages::COMPUTE,
                );

                let pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("Compute program pipeline layout"),
                        bind_group_layouts: &[bindings.layout(), globals_layout],
                        push_constant_ranges: &[],
                    });

                let entry_point = kernel_name.clone();
                let pipeline_id = cache_builder.add_shader(
                    shader.clone(),
                    Box::new(
                        move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                            let module =
                                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                                    label: Some(shader_def.name),
                                    source: ShaderSource::Wgsl(source.into()),
                                });

                            let label = format!("{} ({})", shader_def.name, entry_point);

                            Ok(device.create_compute_pipeline(
                                &wgpu::ComputePipelineDescriptor {
                                    label: Some(&label),
                                    layout: Some(&pipeline_layout),
                                    module: &module,
                                    entry_point: Some(&entry_point),
                                    compilation_options: PipelineCompilationOptions::default(),
                                    cache: None,
                                },
                            ))
                        },
                    ),
                );

                Kernel {
                    name: kernel_name,
                    pipeline_id,
                    bindings,
                }
            })
            .collect();

        Ok(Self {
            name: shader.name,
            kernels,
        })
    }

    #[cfg(test)]
    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(|kernel| kernel.name.as_str())
    }

    pub fn find_kernel(&self, name: &str) -> anyhow::Result<KernelId> {
        self.kernels
            .iter()
            .position(|kernel| kernel.name == name)
            .map(KernelId)
            .with_context(|| format!("Compute program {} has no kernel {}", self.name, name))
    }

    fn kernel_mut(&mut self, kernel: KernelId) -> anyhow::Result<&mut Kernel> {
        self.kernels
            .get_mut(kernel.0)
            .with_context(|| format!("Invalid kernel id {:?}", kernel))
    }

    pub fn set_buffer(
        &mut self,
        kernel: KernelId,
        name: &str,
        buffer: &wgpu::Buffer,
    ) -> anyhow::Result<()> {
        self.kernel_mut(kernel)?.bindings.set_buffer(name, buffer)
    }

    pub fn clear_buffers(&mut self) {
        for kernel in &mut self.kernels {
            kernel.bindings.clear();
        }
    }

    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &ComputePipelineCache,
        globals_bind_group: &wgpu::BindGroup,
        kernel: KernelId,
        workgroups: [u32; 3],
    ) -> anyhow::Result<()> {
        let kernel = self
            .kernels
            .get(kernel.0)
            .with_context(|| format!("Invalid kernel id {:?}", kernel))?;

        let bind_group = kernel.bindings.create_bind_group(device)?;

        let Some(pipeline) = pipeline_cache.get(kernel.pipeline_id) else {
            log::debug!("Kernel {} is not compiled yet, skipping dispatch", kernel.name);
            return Ok(());
        };

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&kernel.name),
            timestamp_writes: None,
        });

        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.set_bind_group(1, globals_bind_group, &[]);
        let [x, y, z] = workgroups;
        compute_pass.dispatch_workgroups(x, y, z);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::{
        global_uniform::GlobalUniform, instancing::UPDATER_SLOTS, test_support::test_device,
    };

    const INSTANCE_UPDATE: ShaderDefinition = ShaderDefinition {
        name: "Instance update",
        path: "instance_update.wgsl",
    };

    #[test]
    fn finds_kernels_by_entry_point_name() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let globals_layout = GlobalUniform::create_bind_group_layout(&device);
        let mut builder = PipelineCacheBuilder::new();
        let program = ComputeProgram::load(
            &device,
            INSTANCE_UPDATE,
            UPDATER_SLOTS,
            &globals_layout,
            &mut builder,
        )
        .unwrap();

        assert!(program.kernel_names().any(|name| name == "CSMain"));
        assert_eq!(builder.len(), program.kernel_names().count());
        assert!(program.find_kernel("CSMain").is_ok());
        assert!(program.find_kernel("csmain").is_err());
    }
}
