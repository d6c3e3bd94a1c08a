use anyhow::Context;
use imgui_wgpu::RendererConfig;
use wgpu::{CommandEncoder, TextureView};

use crate::rendering::instancing::InstancingStats;

pub struct ImguiRendererState {
    renderer: imgui_wgpu::Renderer,
}

impl ImguiRendererState {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture_format: wgpu::TextureFormat,
        context: &mut imgui::Context,
    ) -> Self {
        let renderer_config = RendererConfig {
            texture_format,
            ..Default::default()
        };

        Self {
            renderer: imgui_wgpu::Renderer::new(context, device, queue, renderer_config),
        }
    }

    /// Draws the overlay on top of everything the cameras rendered.
    pub fn render(
        &mut self,
        view: &TextureView,
        context: &mut imgui::Context,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut CommandEncoder,
    ) -> anyhow::Result<()> {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Imgui render pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let draw_data = context.render();

        // Workaround for memory safety related crash in imgui-rs
        // https://github.com/imgui-rs/imgui-rs/issues/325
        if draw_data.draw_lists_count() == 0 {
            return Ok(());
        }

        self.renderer
            .render(draw_data, queue, device, &mut render_pass)
            .context("Rendering Imgui failed")
    }
}

pub fn stats_window(ui: &imgui::Ui, name: &str, stats: &InstancingStats, camera_count: usize) {
    ui.window("Instanced mesh")
        .position([10.0, 10.0], imgui::Condition::FirstUseEver)
        .size([280.0, 170.0], imgui::Condition::FirstUseEver)
        .build(|| {
            ui.text(name);
            ui.separator();
            ui.text(format!("Instances: {}", stats.instance_count));
            ui.text(format!("Dispatch groups: {}", stats.dispatch_groups));
            ui.text(format!("Draws per camera: {}", stats.draws));
            ui.text(format!(
                "Mesh: {} indices, {} vertices",
                stats.index_count, stats.vertex_count
            ));
            ui.text(format!(
                "Cameras: {} / {} registered",
                stats.registered_cameras, camera_count
            ));
            if !stats.allocated {
                ui.text("Buffers released");
            }
        });
}
