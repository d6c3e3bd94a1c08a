use std::collections::HashMap;

use anyhow::Context;

/// A storage buffer slot that shaders address by name.
#[derive(Debug, Clone, Copy)]
pub struct BufferSlot {
    pub name: &'static str,
    pub binding: u32,
    pub read_only: bool,
}

impl BufferSlot {
    pub const fn read_only(name: &'static str, binding: u32) -> Self {
        Self {
            name,
            binding,
            read_only: true,
        }
    }

    pub const fn read_write(name: &'static str, binding: u32) -> Self {
        Self {
            name,
            binding,
            read_only: false,
        }
    }
}

pub fn find_slot<'a>(slots: &'a [BufferSlot], name: &str) -> Option<&'a BufferSlot> {
    slots.iter().find(|slot| slot.name == name)
}

/// Buffers bound to a fixed set of named slots, turned into a bind group on demand.
pub struct NamedBufferBindings {
    label: &'static str,
    slots: &'static [BufferSlot],
    layout: wgpu::BindGroupLayout,
    buffers: HashMap<&'static str, wgpu::Buffer>,
}

impl NamedBufferBindings {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        slots: &'static [BufferSlot],
        visibility: wgpu::ShaderStages,
    ) -> Self {
        let layout = create_layout(device, label, slots, visibility);

        Self {
            label,
            slots,
            layout,
            buffers: HashMap::new(),
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn set_buffer(&mut self, name: &str, buffer: &wgpu::Buffer) -> anyhow::Result<()> {
        let slot = find_slot(self.slots, name)
            .with_context(|| format!("{} has no buffer slot named {}", self.label, name))?;
        self.buffers.insert(slot.name, buffer.clone());
        Ok(())
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    pub fn create_bind_group(&self, device: &wgpu::Device) -> anyhow::Result<wgpu::BindGroup> {
        let entries = self
            .slots
            .iter()
            .map(|slot| {
                let buffer = self.buffers.get(slot.name).with_context(|| {
                    format!("{}: nothing is bound to slot {}", self.label, slot.name)
                })?;

                Ok(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource: buffer.as_entire_binding(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        }))
    }
}

fn create_layout(
    device: &wgpu::Device,
    label: &str,
    slots: &[BufferSlot],
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    let entries = slots
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: slot.read_only,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect::<Vec<_>>();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}
