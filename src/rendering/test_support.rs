use crate::rendering::instancing::WORKGROUP_SIZE;

/// Requests a headless device for tests, with the same compute limits the renderer asks for.
/// Returns `None` on machines without a usable adapter, in which case GPU-backed tests skip
/// themselves. Every skip is reported on stderr so a green run without a GPU is visible.
pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let device = request_test_device();

    if let Err(reason) = &device {
        let test = std::thread::current()
            .name()
            .unwrap_or("unnamed test")
            .to_string();
        eprintln!("skipped GPU test {}: {}", test, reason);
    }

    device.ok()
}

fn request_test_device() -> Result<(wgpu::Device, wgpu::Queue), String> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|e| format!("no adapter ({})", e))?;

    let limits = adapter.limits();
    if limits.max_compute_invocations_per_workgroup < WORKGROUP_SIZE
        || limits.max_compute_workgroup_size_x < WORKGROUP_SIZE
    {
        return Err(format!(
            "adapter {} does not support {} invocations per workgroup",
            adapter.get_info().name,
            WORKGROUP_SIZE
        ));
    }

    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Test device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits {
            max_compute_invocations_per_workgroup: WORKGROUP_SIZE,
            max_compute_workgroup_size_x: WORKGROUP_SIZE,
            ..wgpu::Limits::default()
        },
        memory_hints: Default::default(),
        trace: wgpu::Trace::Off,
    }))
    .map_err(|e| format!("device request failed ({})", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_allows_full_width_workgroups() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        let limits = device.limits();
        assert!(limits.max_compute_invocations_per_workgroup >= WORKGROUP_SIZE);
        assert!(limits.max_compute_workgroup_size_x >= WORKGROUP_SIZE);
    }
}
