use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effects::{
    AudioFadeIn, AudioFadeOut, Crop, CrossFadeIn, CrossFadeOut, EffectParams, FadeIn, FadeOut, Loop, MirrorX, MirrorY,
    MultiplyColor, MultiplySpeed, MultiplyVolume, Resize, Rotate, TimeMirror, TimeSymmetrize, VideoEffect,
};
use crate::error::{EffectError, Result};

type EffectFactory = Box<dyn Fn(&EffectParams) -> Result<Box<dyn VideoEffect>> + Send + Sync>;

/// One entry of an effect chain in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    pub name: String,

    #[serde(default)]
    pub params: EffectParams,
}

impl EffectConfig {
    pub fn new(name: impl Into<String>, params: EffectParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Registry for building effects by name
///
/// Every built-in effect is registered under its [`VideoEffect::name`].
/// Factories validate their parameters, so a misconfigured chain fails when
/// it is built rather than when the first frame renders.
pub struct EffectRegistry {
    factories: HashMap<String, EffectFactory>,
}

impl EffectRegistry {
    /// Create a new registry with all built-in effects
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register_builtin_effects();
        registry
    }

    fn register_builtin_effects(&mut self) {
        // Timing
        self.register("multiply_speed", |p| Ok(Box::new(MultiplySpeed::from_params(p)?)));
        self.register("time_mirror", |_| Ok(Box::new(TimeMirror)));
        self.register("loop", |p| Ok(Box::new(Loop::from_params(p)?)));
        self.register("time_symmetrize", |_| Ok(Box::new(TimeSymmetrize)));

        // Geometry
        self.register("resize", |p| Ok(Box::new(Resize::from_params(p)?)));
        self.register("rotate", |p| Ok(Box::new(Rotate::from_params(p)?)));
        self.register("crop", |p| Ok(Box::new(Crop::from_params(p)?)));
        self.register("mirror_x", |_| Ok(Box::new(MirrorX)));
        self.register("mirror_y", |_| Ok(Box::new(MirrorY)));

        // Opacity and colour
        self.register("fade_in", |p| Ok(Box::new(FadeIn::from_params(p)?)));
        self.register("fade_out", |p| Ok(Box::new(FadeOut::from_params(p)?)));
        self.register("crossfade_in", |p| {
            Ok(Box::new(CrossFadeIn::new(p.require_f64("crossfade_in", "duration")?)))
        });
        self.register("crossfade_out", |p| {
            Ok(Box::new(CrossFadeOut::new(p.require_f64("crossfade_out", "duration")?)))
        });
        self.register("multiply_color", |p| Ok(Box::new(MultiplyColor::from_params(p)?)));

        // Audio track
        self.register("audio_fade_in", |p| Ok(Box::new(AudioFadeIn::from_params(p)?)));
        self.register("audio_fade_out", |p| Ok(Box::new(AudioFadeOut::from_params(p)?)));
        self.register("multiply_volume", |p| Ok(Box::new(MultiplyVolume::from_params(p)?)));
    }

    /// Register a custom effect, replacing any effect of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&EffectParams) -> Result<Box<dyn VideoEffect>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Build the effect `name` from `params`
    pub fn get_effect(&self, name: &str, params: &EffectParams) -> Result<Box<dyn VideoEffect>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EffectError::NotFound { name: name.to_string() })?;
        factory(params)
    }

    /// Build every entry of `chain`, in order
    pub fn build_chain(&self, chain: &[EffectConfig]) -> Result<Vec<Box<dyn VideoEffect>>> {
        chain
            .iter()
            .map(|entry| {
                debug!("Building effect '{}'", entry.name);
                self.get_effect(&entry.name, &entry.params)
            })
            .collect()
    }

    /// Get all available effect names, sorted
    pub fn available_effects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_effect(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.available_effects())
            .finish()
    }
}
