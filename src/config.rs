use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::rendering::{command_buffer::CameraEvent, material::MeshTopology};

pub const DEFAULT_CONFIG_PATH: &str = "assets/instancing.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstancingConfig {
    pub instance_count: u32,
    pub shader_passes: Vec<usize>,
    pub topology: MeshTopology,
    pub command_at: CameraEvent,
    pub init_pos_range: f32,
    /// Fixed seed for the initial population. Entropy is used when absent.
    pub seed: Option<u64>,
    /// glTF file to instance. A unit cube is used when absent.
    pub mesh: Option<PathBuf>,
}

impl Default for InstancingConfig {
    fn default() -> Self {
        Self {
            instance_count: 100,
            shader_passes: vec![0],
            topology: MeshTopology::Triangles,
            command_at: CameraEvent::AfterForwardOpaque,
            init_pos_range: 10.0,
            seed: None,
            mesh: None,
        }
    }
}

impl InstancingConfig {
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("Failed to parse instancing config")
    }

    /// A missing file gives the defaults; a file that exists but does not parse is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml(&source).with_context(|| format!("In {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(
            InstancingConfig::from_toml("").unwrap(),
            InstancingConfig::default()
        );
    }

    #[test]
    fn parses_every_field() {
        let config = InstancingConfig::from_toml(
            r#"
            instance_count = 5000
            shader_passes = [0, 1]
            topology = "lines"
            command_at = "after_background"
            init_pos_range = 25.0
            seed = 1234
            mesh = "assets/meshes/suzanne.gltf"
            "#,
        )
        .unwrap();

        assert_eq!(config.instance_count, 5000);
        assert_eq!(config.shader_passes, vec![0, 1]);
        assert_eq!(config.topology, MeshTopology::Lines);
        assert_eq!(config.command_at, CameraEvent::AfterBackground);
        assert_eq!(config.init_pos_range, 25.0);
        assert_eq!(config.seed, Some(1234));
        assert_eq!(
            config.mesh.as_deref(),
            Some(Path::new("assets/meshes/suzanne.gltf"))
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = InstancingConfig::from_toml("instance_count = 2048").unwrap();

        assert_eq!(config.instance_count, 2048);
        assert_eq!(config.shader_passes, vec![0]);
        assert_eq!(config.init_pos_range, 10.0);
    }

    #[test]
    fn rejects_unknown_topology() {
        assert!(InstancingConfig::from_toml(r#"topology = "quads""#).is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = InstancingConfig::load_or_default("does/not/exist.toml").unwrap();
        assert_eq!(config, InstancingConfig::default());
    }

    #[test]
    fn bundled_config_parses() {
        InstancingConfig::load_or_default(DEFAULT_CONFIG_PATH).unwrap();
    }
}
