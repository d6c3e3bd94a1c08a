use std::sync::Arc;

use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::InstancingConfig,
    mesh::Mesh,
    rendering::{
        command_buffer::{CommandBufferTarget, DrawCommand, ProceduralDraw},
        compute_program::ComputeProgram,
        instancing::{
            dispatch_group_count, generate_instances, pack_vertices, CameraRegistrar,
            InstanceBuffers, KERNEL_NAME,
        },
        material::{InstancingMaterial, INDICES_SLOT, INSTANCE_DATA_SLOT, VERTEX_DATA_SLOT},
        shader_loader::ComputePipelineCache,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Released,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstancingStats {
    pub instance_count: u64,
    pub index_count: u64,
    pub vertex_count: u64,
    pub dispatch_groups: u32,
    pub draws: usize,
    pub registered_cameras: usize,
    pub allocated: bool,
}

/// A population of mesh instances whose transforms live on the GPU. A compute kernel moves
/// them every frame and a single procedural draw per shader pass renders all of them.
///
/// Lifecycle: `initialize` once, then `update` and `on_render_pass` in any order for as long
/// as needed, then `release`. Calls outside that window return an error.
pub struct InstancedMesh {
    name: String,
    config: InstancingConfig,
    lifecycle: Lifecycle,
    buffers: InstanceBuffers,
    command: Option<Arc<DrawCommand>>,
    registrar: CameraRegistrar,
}

impl InstancedMesh {
    pub fn new(name: impl Into<String>, config: InstancingConfig) -> Self {
        let registrar = CameraRegistrar::new(config.command_at);

        Self {
            name: name.into(),
            config,
            lifecycle: Lifecycle::Uninitialized,
            buffers: InstanceBuffers::empty(),
            command: None,
            registrar,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initialize(
        &mut self,
        device: &wgpu::Device,
        material: &mut InstancingMaterial,
        mesh: &Mesh,
    ) -> anyhow::Result<()> {
        if self.lifecycle != Lifecycle::Uninitialized {
            anyhow::bail!("{} was already initialized", self.name);
        }

        let vertices = pack_vertices(mesh);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let instances = generate_instances(
            &mut rng,
            self.config.instance_count,
            self.config.init_pos_range,
        );

        let buffers =
            InstanceBuffers::upload(device, &self.name, &mesh.indices, &vertices, &instances);

        material.set_buffer(INDICES_SLOT, buffers.indices().context("Index buffer missing")?)?;
        material.set_buffer(
            VERTEX_DATA_SLOT,
            buffers.vertices().context("Vertex buffer missing")?,
        )?;
        material.set_buffer(
            INSTANCE_DATA_SLOT,
            buffers.instances().context("Instance buffer missing")?,
        )?;

        let bind_group = material.bind_group(device)?;

        let mut command = DrawCommand::new(format!("{}.instancingMesh", self.name));
        for &pass_index in &self.config.shader_passes {
            let pipeline_id = material.pass_pipeline(pass_index, self.config.topology)?;

            command.draw_procedural(ProceduralDraw {
                pass_index,
                pipeline_id,
                bind_group: bind_group.clone(),
                topology: self.config.topology,
                vertex_count: mesh.index_count() as u32,
                instance_count: self.config.instance_count,
            });
        }

        log::info!(
            "Initialized {}: {} ({} vertices, {} indices) x {} instances",
            self.name,
            mesh.name,
            mesh.vertex_count(),
            mesh.index_count(),
            self.config.instance_count
        );

        self.buffers = buffers;
        self.command = Some(Arc::new(command));
        self.lifecycle = Lifecycle::Initialized;

        Ok(())
    }

    fn ensure_initialized(&self) -> anyhow::Result<()> {
        match self.lifecycle {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Uninitialized => anyhow::bail!("{} is not initialized", self.name),
            Lifecycle::Released => anyhow::bail!("{} has been released", self.name),
        }
    }

    /// Records the per-frame instance update dispatch.
    pub fn update(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        updater: &mut ComputeProgram,
        pipeline_cache: &ComputePipelineCache,
        globals_bind_group: &wgpu::BindGroup,
    ) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let instances = self
            .buffers
            .instances()
            .context("Instance buffer missing")?;

        let kernel = updater.find_kernel(KERNEL_NAME)?;
        updater.set_buffer(kernel, INSTANCE_DATA_SLOT, instances)?;
        updater.dispatch(
            device,
            encoder,
            pipeline_cache,
            globals_bind_group,
            kernel,
            [dispatch_group_count(self.config.instance_count), 1, 1],
        )
    }

    /// Called for every camera before it renders. Attaches the draw command the first time a
    /// camera shows up; the camera replays it on its own from then on.
    pub fn on_render_pass(
        &mut self,
        camera: &mut impl CommandBufferTarget,
    ) -> anyhow::Result<bool> {
        self.ensure_initialized()?;

        let command = self.command.as_ref().context("Draw command missing")?;
        Ok(self.registrar.register(camera, command))
    }

    pub fn release(&mut self) {
        self.buffers.release();
        self.command = None;
        self.registrar.clear();

        if self.lifecycle == Lifecycle::Initialized {
            log::info!("Released {}", self.name);
            self.lifecycle = Lifecycle::Released;
        }
    }

    #[cfg(test)]
    pub fn buffers(&self) -> &InstanceBuffers {
        &self.buffers
    }

    #[cfg(test)]
    pub fn draw_command(&self) -> Option<&Arc<DrawCommand>> {
        self.command.as_ref()
    }

    pub fn stats(&self) -> InstancingStats {
        InstancingStats {
            instance_count: self.buffers.instance_count(),
            index_count: self.buffers.index_count(),
            vertex_count: self.buffers.vertex_count(),
            dispatch_groups: dispatch_group_count(self.config.instance_count),
            draws: self.command.as_ref().map_or(0, |command| command.draws().len()),
            registered_cameras: self.registrar.registered_count(),
            allocated: self.buffers.is_allocated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    use crate::rendering::{
        command_buffer::CameraEvent,
        global_uniform::{GlobalUniform, GlobalUniformState},
        instancing::{registrar::tests::FakeCamera, INSTANCE_UPDATE_SHADER, UPDATER_SLOTS},
        material::MeshTopology,
        render_camera::RenderCamera,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        test_support::test_device,
    };

    fn test_config(instance_count: u32, shader_passes: Vec<usize>) -> InstancingConfig {
        InstancingConfig {
            instance_count,
            shader_passes,
            init_pos_range: 10.0,
            seed: Some(99),
            ..Default::default()
        }
    }

    fn test_material(device: &wgpu::Device, topology: MeshTopology) -> InstancingMaterial {
        let camera_layout = RenderCamera::create_bind_group_layout(device);
        let mut builder = PipelineCacheBuilder::new();
        InstancingMaterial::create(
            device,
            &camera_layout,
            &mut builder,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            topology,
        )
    }

    struct TestUpdater {
        program: ComputeProgram,
        loader: ShaderLoader,
        globals: GlobalUniform,
    }

    /// Loads and compiles the update kernel the same way the renderer does.
    fn test_updater(device: &wgpu::Device) -> TestUpdater {
        let globals = GlobalUniform::new(
            device,
            GlobalUniformState::new(PhysicalSize::new(640, 480), 1.0, 1.0 / 60.0),
        );

        let mut compute_builder = PipelineCacheBuilder::new();
        let program = ComputeProgram::load(
            device,
            INSTANCE_UPDATE_SHADER,
            UPDATER_SLOTS,
            &globals.bind_group_layout,
            &mut compute_builder,
        )
        .unwrap();

        let loader = ShaderLoader::new(
            device.clone(),
            PipelineCacheBuilder::<wgpu::RenderPipeline>::new(),
            compute_builder,
        )
        .unwrap();

        TestUpdater {
            program,
            loader,
            globals,
        }
    }

    fn record_update(
        mesh: &InstancedMesh,
        device: &wgpu::Device,
        updater: &mut TestUpdater,
    ) -> (wgpu::CommandEncoder, anyhow::Result<()>) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Instance update test encoder"),
        });

        let result = mesh.update(
            device,
            &mut encoder,
            &mut updater.program,
            &updater.loader.compute_cache,
            &updater.globals.bind_group,
        );

        (encoder, result)
    }

    #[test]
    fn update_dispatches_only_while_initialized() {
        let Some((device, queue)) = test_device() else {
            return;
        };

        let cube = Mesh::cube("cube").unwrap();
        let mut material = test_material(&device, MeshTopology::Triangles);
        let mut updater = test_updater(&device);
        let mut mesh = InstancedMesh::new("cubes", test_config(2048, vec![0]));

        let (_, before) = record_update(&mesh, &device, &mut updater);
        assert!(before.is_err());

        mesh.initialize(&device, &mut material, &cube).unwrap();

        for _frame in 0..2 {
            let (encoder, result) = record_update(&mesh, &device, &mut updater);
            result.unwrap();
            queue.submit([encoder.finish()]);
        }
        device.poll(wgpu::PollType::Wait).unwrap();

        mesh.release();

        let (_, after) = record_update(&mesh, &device, &mut updater);
        assert!(after.is_err());
    }

    #[test]
    fn render_pass_before_initialize_is_rejected() {
        let mut mesh = InstancedMesh::new("cubes", test_config(100, vec![0]));
        let mut camera = FakeCamera::new(0);

        assert!(mesh.on_render_pass(&mut camera).is_err());
        assert_eq!(camera.commands.len(), 0);
    }

    #[test]
    fn release_without_initialize_is_harmless() {
        let mut mesh = InstancedMesh::new("cubes", InstancingConfig::default());

        mesh.release();
        mesh.release();

        assert!(!mesh.buffers().is_allocated());
        assert!(mesh.draw_command().is_none());
    }

    #[test]
    fn initialize_uploads_mesh_and_population() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let cube = Mesh::cube("cube").unwrap();
        let mut material = test_material(&device, MeshTopology::Triangles);
        let mut mesh = InstancedMesh::new("cubes", test_config(100, vec![0]));

        mesh.initialize(&device, &mut material, &cube).unwrap();

        let stats = mesh.stats();
        assert_eq!(stats.vertex_count, cube.vertex_count() as u64);
        assert_eq!(stats.index_count, cube.index_count() as u64);
        assert_eq!(stats.instance_count, 100);
        assert_eq!(stats.dispatch_groups, 1);
        assert_eq!(stats.draws, 1);
        assert!(stats.allocated);

        let command = mesh.draw_command().unwrap();
        assert_eq!(command.name(), "cubes.instancingMesh");
        assert_eq!(command.draws().len(), 1);

        let draw = &command.draws()[0];
        assert_eq!(draw.pass_index, 0);
        assert_eq!(draw.instance_count, 100);
        assert_eq!(draw.vertex_count, 36);
        assert_eq!(draw.topology, MeshTopology::Triangles);
    }

    #[test]
    fn one_draw_per_configured_pass() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let cube = Mesh::cube("cube").unwrap();
        let mut material = test_material(&device, MeshTopology::Triangles);
        let mut mesh = InstancedMesh::new("cubes", test_config(2048, vec![0, 1]));

        mesh.initialize(&device, &mut material, &cube).unwrap();

        let draws = mesh.draw_command().unwrap().draws();
        assert_eq!(
            draws.iter().map(|draw| draw.pass_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(draws.iter().all(|draw| draw.instance_count == 2048));
        assert_eq!(mesh.stats().dispatch_groups, 3);
    }

    #[test]
    fn unknown_shader_pass_fails_initialize() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let cube = Mesh::cube("cube").unwrap();
        let mut material = test_material(&device, MeshTopology::Triangles);
        let mut mesh = InstancedMesh::new("cubes", test_config(10, vec![7]));

        assert!(mesh.initialize(&device, &mut material, &cube).is_err());
    }

    #[test]
    fn registers_each_camera_once_until_released() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let cube = Mesh::cube("cube").unwrap();
        let mut material = test_material(&device, MeshTopology::Triangles);
        let mut mesh = InstancedMesh::new("cubes", test_config(100, vec![0]));
        mesh.initialize(&device, &mut material, &cube).unwrap();

        let mut main_camera = FakeCamera::new(0);
        let mut overview_camera = FakeCamera::new(1);

        assert!(mesh.on_render_pass(&mut main_camera).unwrap());
        assert!(!mesh.on_render_pass(&mut main_camera).unwrap());
        assert!(mesh.on_render_pass(&mut overview_camera).unwrap());

        assert_eq!(main_camera.commands.at(CameraEvent::AfterForwardOpaque).len(), 1);
        assert_eq!(mesh.stats().registered_cameras, 2);

        mesh.release();
        mesh.release();

        assert!(!mesh.buffers().is_allocated());
        assert_eq!(mesh.stats().registered_cameras, 0);
        assert!(mesh.on_render_pass(&mut main_camera).is_err());
        assert!(mesh.initialize(&device, &mut material, &cube).is_err());
    }
}
