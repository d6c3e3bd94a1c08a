use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;

use crate::rendering::{
    material::MeshTopology,
    shader_loader::{RenderPipelineCache, RenderPipelineId},
};

/// Points in a camera's frame where attached command buffers are executed, in execution order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraEvent {
    AfterBackground,
    BeforeForwardOpaque,
    #[default]
    AfterForwardOpaque,
    AfterEverything,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub u32);

/// One procedural draw: no vertex or index buffers are bound, the shader fetches its
/// geometry from the material's storage buffers.
#[derive(Debug, Clone)]
pub struct ProceduralDraw {
    pub pass_index: usize,
    pub pipeline_id: RenderPipelineId,
    pub bind_group: wgpu::BindGroup,
    pub topology: MeshTopology,
    pub vertex_count: u32,
    pub instance_count: u32,
}

/// A recorded, reusable list of draws. Attached to cameras and replayed every frame.
#[derive(Debug)]
pub struct DrawCommand {
    name: String,
    draws: Vec<ProceduralDraw>,
}

impl DrawCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            draws: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn draw_procedural(&mut self, draw: ProceduralDraw) {
        self.draws.push(draw);
    }

    pub fn draws(&self) -> &[ProceduralDraw] {
        &self.draws
    }

    /// Group 0 is the camera, group 1 the material buffers.
    pub fn execute(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        pipeline_cache: &RenderPipelineCache,
        camera_bind_group: &wgpu::BindGroup,
    ) {
        for draw in &self.draws {
            let Some(pipeline) = pipeline_cache.get(draw.pipeline_id) else {
                continue;
            };

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, camera_bind_group, &[]);
            render_pass.set_bind_group(1, &draw.bind_group, &[]);
            render_pass.draw(0..draw.vertex_count, 0..draw.instance_count);
        }
    }
}

/// Command buffers attached to a single camera, grouped by the event they run at.
#[derive(Debug, Default)]
pub struct CameraCommandBuffers {
    by_event: BTreeMap<CameraEvent, Vec<Arc<DrawCommand>>>,
}

impl CameraCommandBuffers {
    pub fn add(&mut self, event: CameraEvent, command: Arc<DrawCommand>) {
        self.by_event.entry(event).or_default().push(command);
    }

    pub fn at(&self, event: CameraEvent) -> &[Arc<DrawCommand>] {
        self.by_event
            .get(&event)
            .map(|commands| commands.as_slice())
            .unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_event.values().map(|commands| commands.len()).sum()
    }

    pub fn clear(&mut self) {
        self.by_event.clear();
    }
}

/// Anything draw commands can be attached to, identified by a stable camera id.
pub trait CommandBufferTarget {
    fn camera_id(&self) -> CameraId;
    fn add_command_buffer(&mut self, event: CameraEvent, command: Arc<DrawCommand>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_execute_in_frame_order() {
        let mut events = vec![
            CameraEvent::AfterEverything,
            CameraEvent::AfterBackground,
            CameraEvent::AfterForwardOpaque,
            CameraEvent::BeforeForwardOpaque,
        ];
        events.sort();

        assert_eq!(
            events,
            [
                CameraEvent::AfterBackground,
                CameraEvent::BeforeForwardOpaque,
                CameraEvent::AfterForwardOpaque,
                CameraEvent::AfterEverything,
            ]
        );
    }

    #[test]
    fn command_buffers_are_grouped_by_event() {
        let mut buffers = CameraCommandBuffers::default();
        let command = Arc::new(DrawCommand::new("cubes.instancingMesh"));

        buffers.add(CameraEvent::AfterForwardOpaque, command.clone());
        buffers.add(CameraEvent::AfterEverything, command.clone());

        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers.at(CameraEvent::AfterForwardOpaque).len(), 1);
        assert!(buffers.at(CameraEvent::BeforeForwardOpaque).is_empty());
        assert_eq!(
            buffers.at(CameraEvent::AfterEverything)[0].name(),
            "cubes.instancingMesh"
        );

        buffers.clear();
        assert_eq!(buffers.len(), 0);
    }

    #[test]
    fn camera_event_names_deserialize_in_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            at: CameraEvent,
        }

        let parsed: Wrapper = toml::from_str(r#"at = "before_forward_opaque""#).unwrap();
        assert_eq!(parsed.at, CameraEvent::BeforeForwardOpaque);
    }
}
