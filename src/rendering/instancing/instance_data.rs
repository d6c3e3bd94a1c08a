use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use rand::Rng;

/// This should match the same structure defined in WGSL (shaders/shared/common.wgsl)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub position: Vec3,
    _padding0: f32,
    pub rotation: Quat,
    pub scale: f32,
    _padding1: [f32; 3],
}

impl InstanceData {
    pub fn new(position: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            position,
            _padding0: 0.0,
            rotation,
            scale,
            _padding1: [0.0; 3],
        }
    }
}

/// Uniformly distributed unit quaternion (Shoemake's subgroup algorithm).
pub fn random_rotation(rng: &mut impl Rng) -> Quat {
    let u1: f32 = rng.gen();
    let u2: f32 = rng.gen();
    let u3: f32 = rng.gen();

    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();

    Quat::from_xyzw(
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    )
    .normalize()
}

/// Scatters `count` instances in the cube [-range, range]^3 with random rotations and
/// scales in [0, 1).
pub fn generate_instances(rng: &mut impl Rng, count: u32, range: f32) -> Vec<InstanceData> {
    (0..count)
        .map(|_| {
            let position = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * range;

            InstanceData::new(position, random_rotation(rng), rng.gen::<f32>())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<InstanceData>(), 48);
        assert_eq!(std::mem::offset_of!(InstanceData, rotation), 16);
        assert_eq!(std::mem::offset_of!(InstanceData, scale), 32);
    }

    #[test]
    fn instances_stay_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let instances = generate_instances(&mut rng, 100, 10.0);

        assert_eq!(instances.len(), 100);

        for instance in &instances {
            for axis in instance.position.to_array() {
                assert!((-10.0..=10.0).contains(&axis), "axis out of range: {}", axis);
            }
            assert!((0.0..1.0).contains(&instance.scale));
            assert!(instance.rotation.is_normalized());
        }
    }

    #[test]
    fn zero_range_collapses_to_origin() {
        let mut rng = StdRng::seed_from_u64(1);

        for instance in generate_instances(&mut rng, 16, 0.0) {
            assert_eq!(instance.position, Vec3::ZERO);
        }
    }

    #[test]
    fn same_seed_gives_same_population() {
        let a = generate_instances(&mut StdRng::seed_from_u64(42), 32, 5.0);
        let b = generate_instances(&mut StdRng::seed_from_u64(42), 32, 5.0);

        assert_eq!(a, b);
    }

    #[test]
    fn rotations_cover_both_hemispheres() {
        let mut rng = StdRng::seed_from_u64(3);
        let rotations = (0..1000)
            .map(|_| random_rotation(&mut rng))
            .collect::<Vec<_>>();

        assert!(rotations.iter().any(|q| q.x > 0.5));
        assert!(rotations.iter().any(|q| q.x < -0.5));
        assert!(rotations.iter().any(|q| q.w > 0.5));
        assert!(rotations.iter().any(|q| q.w < -0.5));
    }

    #[test]
    fn empty_population() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(generate_instances(&mut rng, 0, 10.0).is_empty());
    }
}
