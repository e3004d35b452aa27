//! Runtime configuration loaded from an optional TOML file.
//!
//! Every field has a default so an absent file, or a file that only sets a
//! few keys, still yields a complete [`Config`].
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//!
//! [assets]
//! mesh = "assets/Cat.obj"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Number of textures bound in the fragment shader's sampler array.
pub const TEXTURE_COUNT: usize = 3;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "vkrender.toml";

/// Complete application configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub renderer: RendererConfig,
}

/// Initial window parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "vulkan_render".to_string(),
        }
    }
}

/// Paths of the mesh, textures and compiled shaders.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AssetConfig {
    pub mesh: PathBuf,
    pub textures: Vec<PathBuf>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            mesh: PathBuf::from("assets/Cat.obj"),
            textures: (0..TEXTURE_COUNT)
                .map(|i| PathBuf::from(format!("assets/cat{i}.ktx2")))
                .collect(),
            vertex_shader: PathBuf::from("shaders/spirv/mesh.vert.spv"),
            fragment_shader: PathBuf::from("shaders/spirv/mesh.frag.spv"),
        }
    }
}

/// GPU-side knobs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Enable `VK_LAYER_KHRONOS_validation` and the debug messenger.
    pub validation: bool,
    pub max_anisotropy: f32,
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            max_anisotropy: 8.0,
            clear_color: [0.1, 0.1, 0.15, 1.0],
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// With `Some(path)` the file must exist. With `None` the
    /// [`DEFAULT_CONFIG_FILE`] is used when present, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if an explicit file cannot be read and
    /// [`Error::Config`] if parsing or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&text).map_err(|message| Error::Config {
            path: path.clone(),
            message,
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.assets.textures.len() != TEXTURE_COUNT {
            return Err(format!(
                "expected {} textures, found {}",
                TEXTURE_COUNT,
                self.assets.textures.len()
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err("window size must be non-zero".to_string());
        }
        if !(1.0..=16.0).contains(&self.renderer.max_anisotropy) {
            return Err(format!(
                "max_anisotropy {} outside 1..=16",
                self.renderer.max_anisotropy
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.title, "vulkan_render");
        assert_eq!(config.assets.textures.len(), TEXTURE_COUNT);
        assert_eq!(config.assets.textures[2], PathBuf::from("assets/cat2.ktx2"));
        assert_eq!(config.renderer.max_anisotropy, 8.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("[window]\nwidth = 640\n").unwrap();
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.assets, AssetConfig::default());
    }

    #[test]
    fn test_wrong_texture_count_rejected() {
        let err = Config::from_toml("[assets]\ntextures = [\"a.ktx2\"]\n").unwrap_err();
        assert!(err.contains("expected 3 textures"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_toml("[window]\ndepth = 3\n").is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(Config::from_toml("[window]\nheight = 0\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[renderer]\nvalidation = false\nmax_anisotropy = 4.0\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.renderer.validation);
        assert_eq!(config.renderer.max_anisotropy, 4.0);
    }

    #[test]
    fn test_load_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[window\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let sample = include_str!("../../../vkrender.toml");
        let mut config = Config::from_toml(sample).unwrap();
        config.renderer.validation = Config::default().renderer.validation;
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_explicit_file_is_io_error() {
        let err = Config::load(Some(Path::new("/nonexistent/vkrender.toml"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
