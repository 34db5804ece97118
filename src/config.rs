use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    composition::{Compositor, MaskShapePolicy, UnboundedPolicy},
    effects::{EffectConfig, EffectRegistry, VideoEffect},
    error::{ConfigError, Result},
    video::{BatchRenderer, VideoClip, VideoParams},
};

/// Main configuration for the clip compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rendering settings for video output
    pub video: VideoConfig,

    /// Audio rendering settings
    pub audio: AudioConfig,

    /// Defaults for composites
    pub composition: CompositionConfig,

    /// External programs
    pub tools: ToolsConfig,

    /// Effect chain applied by [`Config::apply_effects`]
    pub effects: Vec<EffectConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.tools.validate()?;

        let registry = EffectRegistry::new();
        for effect in &self.effects {
            if !registry.has_effect(&effect.name) {
                return Err(ConfigError::InvalidValue {
                    key: "effects.name".to_string(),
                    value: effect.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Build the configured effect chain with `registry`
    pub fn build_effects(&self, registry: &EffectRegistry) -> Result<Vec<Box<dyn VideoEffect>>> {
        registry.build_chain(&self.effects)
    }

    /// Apply the configured effect chain to `clip`
    pub fn apply_effects(&self, clip: VideoClip) -> Result<VideoClip> {
        let effects = self.build_effects(&EffectRegistry::new())?;
        let chain: Vec<&dyn VideoEffect> = effects.iter().map(|effect| effect.as_ref()).collect();
        clip.with_effects(&chain)
    }

    /// A [`Compositor`] over `clips` with the configured defaults
    pub fn compositor(&self, clips: Vec<VideoClip>) -> Compositor {
        Compositor::new(clips).with_config(&self.composition)
    }

    /// Parallel frame renderer sized by `video.threads`.
    pub fn batch_renderer(&self) -> Result<BatchRenderer> {
        BatchRenderer::new(Some(self.video.threads))
    }
}

/// Video rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Output frame rate, resolution and encoder settings
    pub params: VideoParams,

    /// Keep the last evaluated frame of each clip
    pub memoize: bool,

    /// Worker threads for batch rendering
    pub threads: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            params: VideoParams::default(),
            memoize: true,
            threads: num_cpus::get(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if !self.params.fps.is_finite() || self.params.fps <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "video.params.fps".to_string(),
                value: self.params.fps.to_string(),
            }
            .into());
        }

        if self.params.resolution.0 == 0 || self.params.resolution.1 == 0 {
            return Err(ConfigError::InvalidValue {
                key: "video.params.resolution".to_string(),
                value: format!("{}x{}", self.params.resolution.0, self.params.resolution.1),
            }
            .into());
        }

        if self.params.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "video.params.quality".to_string(),
                value: self.params.quality.to_string(),
            }
            .into());
        }

        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "video.threads".to_string(),
                value: self.threads.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Audio rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate (Hz)
    pub sample_rate: u32,

    /// Output channel count
    pub channels: u16,

    /// Sample frames per chunk handed to a sink
    pub chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            chunk_size: 2000,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "audio.sample_rate".to_string(),
                value: self.sample_rate.to_string(),
            }
            .into());
        }

        if self.channels == 0 {
            return Err(ConfigError::InvalidValue {
                key: "audio.channels".to_string(),
                value: self.channels.to_string(),
            }
            .into());
        }

        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "audio.chunk_size".to_string(),
                value: self.chunk_size.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Composite defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Canvas colour beneath every layer
    pub bg_color: [u8; 3],

    /// Give composites a mask built from their layers
    pub transparent: bool,

    /// Layers without an end
    pub unbounded: UnboundedPolicy,

    /// Masks that do not match their frames
    pub mask_shape: MaskShapePolicy,
}

/// Locations of external programs, resolved once and passed down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// ffmpeg executable, a bare name is looked up on `PATH` by the OS
    pub ffmpeg_binary: PathBuf,

    /// Scratch directory for intermediate frames; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            temp_dir: None,
        }
    }
}

impl ToolsConfig {
    fn validate(&self) -> Result<()> {
        if self.ffmpeg_binary.as_os_str().is_empty() {
            return Err(ConfigError::MissingKey {
                key: "tools.ffmpeg_binary".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Scratch directory for intermediate files
    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Timeline;
    use crate::effects::EffectParams;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.composition.bg_color = [10, 20, 30];
        original_config.composition.mask_shape = MaskShapePolicy::CropPad;
        original_config.effects.push(EffectConfig::new(
            "resize",
            EffectParams::new().set("width", 640_i64),
        ));

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.audio.sample_rate, loaded_config.audio.sample_rate);
        assert_eq!(original_config.video.params.fps, loaded_config.video.params.fps);
        assert_eq!(original_config.composition, loaded_config.composition);
        assert_eq!(original_config.effects, loaded_config.effects);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(
            &file_path,
            r#"
[composition]
unbounded = "open"

[[effects]]
name = "multiply_speed"
params = { factor = 2.0 }
"#,
        )
        .unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.composition.unbounded, UnboundedPolicy::Open);
        assert_eq!(config.audio.sample_rate, 44100);
        assert!(config.validate().is_ok());

        let clip = config
            .apply_effects(VideoClip::color((2, 2), [0, 0, 0], Some(4.0)))
            .unwrap();
        assert_eq!(clip.duration(), Some(2.0));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.video.threads = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.effects.push(EffectConfig::new("sepia", EffectParams::new()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_renderer_uses_thread_count() {
        let mut config = Config::default();
        config.video.threads = 2;
        let renderer = config.batch_renderer().unwrap();
        assert_eq!(renderer.threads(), 2);

        let frames = renderer
            .render_all(&VideoClip::color((2, 2), [1, 2, 3], Some(1.0)), 4.0)
            .unwrap();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(Config::from_file(dir.path().join("absent.toml")).is_err());
    }
}
