use std::{collections::HashSet, sync::Arc};

use crate::rendering::command_buffer::{CameraEvent, CameraId, CommandBufferTarget, DrawCommand};

/// Attaches a draw command to each camera the first time the camera is seen.
#[derive(Debug)]
pub struct CameraRegistrar {
    event: CameraEvent,
    registered: HashSet<CameraId>,
}

impl CameraRegistrar {
    pub fn new(event: CameraEvent) -> Self {
        Self {
            event,
            registered: HashSet::new(),
        }
    }

    /// Returns true if the command was attached by this call.
    pub fn register(
        &mut self,
        camera: &mut impl CommandBufferTarget,
        command: &Arc<DrawCommand>,
    ) -> bool {
        if self.registered.contains(&camera.camera_id()) {
            return false;
        }

        camera.add_command_buffer(self.event, command.clone());
        self.registered.insert(camera.camera_id());

        log::info!(
            "Attached {} to camera {:?} at {:?}",
            command.name(),
            camera.camera_id(),
            self.event
        );

        true
    }

    #[cfg(test)]
    pub fn is_registered(&self, camera: CameraId) -> bool {
        self.registered.contains(&camera)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn clear(&mut self) {
        self.registered.clear();
    }
}
