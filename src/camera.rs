use glam::{Mat4, Vec2, Vec3};
use winit::dpi::PhysicalSize;

/// Normalized sub-rectangle of the output surface a camera renders into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const FULL: Viewport = Viewport {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Returns (x, y, width, height) in pixels.
    pub fn to_pixels(&self, resolution: PhysicalSize<u32>) -> (f32, f32, f32, f32) {
        let w = resolution.width as f32;
        let h = resolution.height as f32;
        (
            self.x * w,
            self.y * h,
            (self.width * w).max(1.0),
            (self.height * h).max(1.0),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub viewport: Viewport,
}

impl Camera {
    pub fn get_vp_matrix(&self, resolution: Vec2) -> Mat4 {
        let view = Mat4::look_at_lh(self.eye, self.target, self.up);
        let projection = Mat4::perspective_lh(
            self.fov_y_degrees.to_radians(),
            resolution.x / resolution.y,
            0.1,
            500.0,
        );
        projection * view
    }

    pub fn viewport_resolution(&self, surface: PhysicalSize<u32>) -> Vec2 {
        let (_, _, width, height) = self.viewport.to_pixels(surface);
        Vec2::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_maps_to_pixels() {
        let viewport = Viewport {
            x: 0.75,
            y: 0.0,
            width: 0.25,
            height: 0.5,
        };

        let (x, y, w, h) = viewport.to_pixels(PhysicalSize::new(800, 600));
        assert_eq!((x, y, w, h), (600.0, 0.0, 200.0, 300.0));
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera {
            eye: Vec3::new(0.0, 5.0, -20.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 60.0,
            viewport: Viewport::FULL,
        };

        let clip = camera.get_vp_matrix(Vec2::new(16.0, 9.0)) * Vec3::ZERO.extend(1.0);
        let ndc = clip / clip.w;

        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
