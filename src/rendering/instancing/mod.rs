mod instance_buffers;
mod instance_data;
mod instanced_mesh;
mod registrar;
mod vertex_data;

pub use instance_buffers::InstanceBuffers;
pub use instance_data::{generate_instances, random_rotation, InstanceData};
pub use instanced_mesh::{InstancedMesh, InstancingStats};
pub use registrar::CameraRegistrar;
pub use vertex_data::{pack_vertices, VertexData};

use crate::rendering::{
    bindings::BufferSlot,
    material::INSTANCE_DATA_SLOT,
    shader_loader::ShaderDefinition,
};

/// Entry point of the instance update kernel.
pub const KERNEL_NAME: &str = "CSMain";

/// Must match `@workgroup_size` of the update kernel.
pub const WORKGROUP_SIZE: u32 = 1024;

pub const INSTANCE_UPDATE_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Instance update compute shader",
    path: "instance_update.wgsl",
};

pub const UPDATER_SLOTS: &[BufferSlot] = &[BufferSlot::read_write(INSTANCE_DATA_SLOT, 0)];

/// Always one group more than `count / WORKGROUP_SIZE`, even when the count divides evenly.
/// The kernel discards invocations past the end of the instance buffer.
pub fn dispatch_group_count(instance_count: u32) -> u32 {
    instance_count / WORKGROUP_SIZE + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_groups_cover_every_instance() {
        assert_eq!(dispatch_group_count(0), 1);
        assert_eq!(dispatch_group_count(1), 1);
        assert_eq!(dispatch_group_count(100), 1);
        assert_eq!(dispatch_group_count(1023), 1);
        assert_eq!(dispatch_group_count(1024), 2);
        assert_eq!(dispatch_group_count(1025), 2);
        assert_eq!(dispatch_group_count(4096), 5);

        for count in [0, 1, 1000, 1023, 1024, 2047, 2048, 100_000] {
            assert!(dispatch_group_count(count) * WORKGROUP_SIZE >= count);
        }
    }
}
