use std::sync::RwLock;

use anyhow::Context;
use wgpu::SurfaceConfiguration;
use winit::dpi::PhysicalSize;

use crate::rendering::global_uniform::{GlobalUniform, GlobalUniformState};

pub struct RenderCommon {
    pub output_surface_config: RwLock<SurfaceConfiguration>,
    pub output_format: wgpu::TextureFormat,
    pub global_uniform: GlobalUniform,
}

impl RenderCommon {
    pub fn new(
        device: &wgpu::Device,
        adapter: &wgpu::Adapter,
        surface: &wgpu::Surface,
        size: PhysicalSize<u32>,
    ) -> anyhow::Result<Self> {
        let output_surface_config =
            surface_config_from_caps(&surface.get_capabilities(adapter), size)?;

        surface.configure(device, &output_surface_config);

        let global_uniform = GlobalUniform::new(device, GlobalUniformState::new(size, 0.0, 0.0));

        Ok(Self {
            output_format: output_surface_config.format,
            output_surface_config: RwLock::new(output_surface_config),
            global_uniform,
        })
    }
}

/// Prefers an sRGB format, otherwise takes the first one the surface offers.
fn surface_config_from_caps(
    caps: &wgpu::SurfaceCapabilities,
    size: PhysicalSize<u32>,
) -> anyhow::Result<SurfaceConfiguration> {
    let format = caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
        .context("Surface reports no supported formats")?;
    let present_mode = caps
        .present_modes
        .first()
        .copied()
        .context("Surface reports no present modes")?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .context("Surface reports no alpha modes")?;

    Ok(SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            present_modes: vec![wgpu::PresentMode::Fifo],
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            usages: wgpu::TextureUsages::RENDER_ATTACHMENT,
        }
    }

    #[test]
    fn prefers_srgb_format() {
        let config = surface_config_from_caps(
            &caps(vec![
                wgpu::TextureFormat::Bgra8Unorm,
                wgpu::TextureFormat::Bgra8UnormSrgb,
            ]),
            PhysicalSize::new(640, 480),
        )
        .unwrap();

        assert_eq!(config.format, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!((config.width, config.height), (640, 480));
    }

    #[test]
    fn falls_back_to_first_format_and_clamps_size() {
        let config = surface_config_from_caps(
            &caps(vec![wgpu::TextureFormat::Rgba16Float]),
            PhysicalSize::new(0, 0),
        )
        .unwrap();

        assert_eq!(config.format, wgpu::TextureFormat::Rgba16Float);
        assert_eq!((config.width, config.height), (1, 1));
    }

    #[test]
    fn surface_without_capabilities_is_an_error() {
        let mut empty = caps(vec![]);
        assert!(surface_config_from_caps(&empty, PhysicalSize::new(640, 480)).is_err());

        empty.formats = vec![wgpu::TextureFormat::Bgra8UnormSrgb];
        empty.present_modes.clear();
        assert!(surface_config_from_caps(&empty, PhysicalSize::new(640, 480)).is_err());
    }
}
