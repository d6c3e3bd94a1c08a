use std::time::Instant;

use glam::{Quat, Vec3};

use crate::{
    camera::{Camera, Viewport},
    config::{InstancingConfig, DEFAULT_CONFIG_PATH},
    mesh::Mesh,
};

const ORBIT_RADIUS: f32 = 28.0;
const ORBIT_HEIGHT: f32 = 12.0;

pub struct DemoState {
    pub config: InstancingConfig,
    pub mesh: Mesh,
    /// The first camera covers the whole window, the second is a top-down inset.
    pub cameras: Vec<Camera>,
    pub orbit_speed: f32,
    pub start_time: Instant,
    pub delta_time: f32,
    last_update: Instant,
    orbit_angle: f32,
}

impl DemoState {
    pub fn new() -> anyhow::Result<Self> {
        let config = InstancingConfig::load_or_default(DEFAULT_CONFIG_PATH)?;

        let mesh = match &config.mesh {
            Some(path) => Mesh::from_gltf_file(path)?,
            None => Mesh::cube("Cube")?,
        };

        let main_camera = Camera {
            eye: Vec3::new(0.0, ORBIT_HEIGHT, -ORBIT_RADIUS),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 60.0,
            viewport: Viewport::FULL,
        };

        let overview_camera = Camera {
            eye: Vec3::new(0.0, 45.0, 0.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y_degrees: 50.0,
            viewport: Viewport {
                x: 0.7,
                y: 0.05,
                width: 0.25,
                height: 0.25,
            },
        };

        let now = Instant::now();

        Ok(Self {
            config,
            mesh,
            cameras: vec![main_camera, overview_camera],
            orbit_speed: 0.3,
            start_time: now,
            delta_time: 0.0,
            last_update: now,
            orbit_angle: 0.0,
        })
    }

    /// Seconds since the demo started.
    pub fn now(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }

    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        self.orbit_angle += self.orbit_speed * self.delta_time;

        if let Some(main_camera) = self.cameras.first_mut() {
            let offset =
                Quat::from_rotation_y(self.orbit_angle) * Vec3::new(0.0, 0.0, -ORBIT_RADIUS);
            main_camera.eye = offset + Vec3::Y * ORBIT_HEIGHT;
        }
    }
}
