use std::sync::Arc;

use anyhow::Context;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    demo::DemoState,
    rendering::{
        command_buffer::{CameraEvent, CameraId},
        compute_program::ComputeProgram,
        global_uniform::GlobalUniformState,
        imgui_renderer::{stats_window, ImguiRendererState},
        instancing::{InstancedMesh, INSTANCE_UPDATE_SHADER, UPDATER_SLOTS, WORKGROUP_SIZE},
        material::InstancingMaterial,
        passes::{BackgroundPass, GroundPass},
        render_camera::RenderCamera,
        render_common::RenderCommon,
        shader_loader::{PipelineCacheBuilder, RenderPipelineCache, ShaderLoader},
        texture::DepthTexture,
    },
};

const INSTANCED_MESH_NAME: &str = "Instanced mesh";

/// A frame whose scene has been recorded but not yet submitted.
pub struct PendingFrame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: RenderCommon,
    depth_texture: DepthTexture,

    cameras: Vec<RenderCamera>,

    shader_loader: ShaderLoader,

    background_pass: BackgroundPass,
    ground_pass: GroundPass,

    material: InstancingMaterial,
    updater: ComputeProgram,
    instanced_mesh: InstancedMesh,

    imgui_renderer: ImguiRendererState,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        demo_state: &DemoState,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        let adapter_limits = adapter.limits();
        if adapter_limits.max_compute_invocations_per_workgroup < WORKGROUP_SIZE
            || adapter_limits.max_compute_workgroup_size_x < WORKGROUP_SIZE
        {
            anyhow::bail!(
                "Adapter {} does not support {} invocations per workgroup",
                adapter.get_info().name,
                WORKGROUP_SIZE
            );
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_compute_invocations_per_workgroup: WORKGROUP_SIZE,
                    max_compute_workgroup_size_x: WORKGROUP_SIZE,
                    ..wgpu::Limits::default()
                },
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let common = RenderCommon::new(&device, &adapter, &surface, size)?;

        let depth_texture = DepthTexture::new(&device, size, "Depth Texture");

        let camera_bind_group_layout = RenderCamera::create_bind_group_layout(&device);

        let cameras = demo_state
            .cameras
            .iter()
            .enumerate()
            .map(|(i, camera)| {
                RenderCamera::new(
                    &device,
                    &camera_bind_group_layout,
                    CameraId(i as u32),
                    camera.clone(),
                    size,
                )
            })
            .collect();

        let mut render_builder = PipelineCacheBuilder::new();
        let mut compute_builder = PipelineCacheBuilder::new();

        let background_pass = BackgroundPass::create(&device, &common, &mut render_builder);
        let ground_pass = GroundPass::create(
            &device,
            &camera_bind_group_layout,
            common.output_format,
            &mut render_builder,
        );

        let material = InstancingMaterial::create(
            &device,
            &camera_bind_group_layout,
            &mut render_builder,
            common.output_format,
            demo_state.config.topology,
        );

        let updater = ComputeProgram::load(
            &device,
            INSTANCE_UPDATE_SHADER,
            UPDATER_SLOTS,
            &common.global_uniform.bind_group_layout,
            &mut compute_builder,
        )?;

        let shader_loader = ShaderLoader::new(device.clone(), render_builder, compute_builder)?;

        let imgui_renderer =
            ImguiRendererState::new(&device, &queue, common.output_format, imgui_context);

        let instanced_mesh = InstancedMesh::new(INSTANCED_MESH_NAME, demo_state.config.clone());

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            common,
            depth_texture,
            cameras,
            shader_loader,
            background_pass,
            ground_pass,
            material,
            updater,
            instanced_mesh,
            imgui_renderer,
        })
    }

    pub fn load_scene(&mut self, demo_state: &DemoState) -> anyhow::Result<()> {
        self.instanced_mesh
            .initialize(&self.device, &mut self.material, &demo_state.mesh)
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        let Ok(mut config) = self.common.output_surface_config.write() else {
            log::error!("Surface configuration lock poisoned");
            return;
        };

        self.size = new_size;
        config.width = new_size.width;
        config.height = new_size.height;
        self.depth_texture.resize(&self.device, new_size);
        self.surface.configure(&self.device, &config);
    }

    pub fn render(
        &mut self,
        demo_state: &DemoState,
        ui: &mut imgui::Ui,
    ) -> anyhow::Result<PendingFrame> {
        self.shader_loader.load_pending_shaders();

        self.common.global_uniform.update(
            &self.queue,
            GlobalUniformState::new(self.size, demo_state.now(), demo_state.delta_time),
        );

        for (render_camera, camera) in self.cameras.iter_mut().zip(&demo_state.cameras) {
            render_camera.update_camera(camera);
            render_camera.update_uniform_buffer(&self.queue, self.size);
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.instanced_mesh.update(
            &self.device,
            &mut encoder,
            &mut self.updater,
            &self.shader_loader.compute_cache,
            &self.common.global_uniform.bind_group,
        )?;

        for (i, camera) in self.cameras.iter_mut().enumerate() {
            self.instanced_mesh.on_render_pass(camera)?;

            let color_load = if i == 0 {
                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
            } else {
                wgpu::LoadOp::Load
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Camera pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.depth_texture.view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let (x, y, width, height) = camera.camera.viewport.to_pixels(self.size);
            render_pass.set_viewport(x, y, width, height, 0.0, 1.0);

            let pipeline_cache = &self.shader_loader.render_cache;

            self.background_pass.draw(
                &mut render_pass,
                pipeline_cache,
                &self.common.global_uniform.bind_group,
            );
            execute_commands(
                &mut render_pass,
                pipeline_cache,
                camera,
                CameraEvent::AfterBackground,
            );
            execute_commands(
                &mut render_pass,
                pipeline_cache,
                camera,
                CameraEvent::BeforeForwardOpaque,
            );
            self.ground_pass
                .draw(&mut render_pass, pipeline_cache, camera.bind_group());
            execute_commands(
                &mut render_pass,
                pipeline_cache,
                camera,
                CameraEvent::AfterForwardOpaque,
            );
            execute_commands(
                &mut render_pass,
                pipeline_cache,
                camera,
                CameraEvent::AfterEverything,
            );
        }

        stats_window(
            ui,
            self.instanced_mesh.name(),
            &self.instanced_mesh.stats(),
            self.cameras.len(),
        );

        Ok(PendingFrame {
            output,
            view,
            encoder,
        })
    }

    pub fn finish_frame(&mut self, frame: PendingFrame, imgui_context: &mut imgui::Context) {
        let PendingFrame {
            output,
            view,
            mut encoder,
        } = frame;

        if let Err(e) = self.imgui_renderer.render(
            &view,
            imgui_context,
            &self.device,
            &self.queue,
            &mut encoder,
        ) {
            log::error!("{:?}", e);
        }

        self.queue.submit([encoder.finish()]);

        output.present();
    }

    /// Releases GPU resources owned by the scene. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.instanced_mesh.release();
        self.material.clear_buffers();
        self.updater.clear_buffers();

        for camera in &mut self.cameras {
            camera.command_buffers.clear();
        }
    }
}

fn execute_commands(
    render_pass: &mut wgpu::RenderPass<'_>,
    pipeline_cache: &RenderPipelineCache,
    camera: &RenderCamera,
    event: CameraEvent,
) {
    for command in camera.command_buffers.at(event) {
        command.execute(render_pass, pipeline_cache, camera.bind_group());
    }
}
