use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{
    audio::AudioClip,
    clip::ApplyTo,
    error::{EffectError, Result},
    video::VideoClip,
};

/// A parameterized transform from one video clip to another
///
/// Effects are immutable parameter records. Everything an effect derives
/// while applying itself (a resolved target size, the duration a fade
/// counts back from) is captured in the returned clip, never stored on the
/// effect, so one effect value can be applied to any number of clips.
pub trait VideoEffect: Send + Sync + fmt::Debug {
    /// Returns the registry name of this effect
    fn name(&self) -> &str;

    /// Apply the effect
    ///
    /// # Arguments
    ///
    /// * `clip` - The clip to transform; it is consumed
    ///
    /// # Returns
    ///
    /// The transformed clip, or an error naming the effect and the violated
    /// constraint.
    fn apply(&self, clip: VideoClip) -> Result<VideoClip>;

    /// Which side channels this effect transforms along with the frames
    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::default()
    }
}

/// A parameterized transform from one audio clip to another
pub trait AudioEffect: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, clip: AudioClip) -> Result<AudioClip>;
}

/// What an effect touches, for introspection and documentation
///
/// The fields describe the effect; nothing reads them to decide how it is
/// applied. Each `apply` routes its own side channels, and the built-ins
/// are tested to match what they declare here.
#[derive(Debug, Clone)]
pub struct EffectMetadata {
    /// Side channels that receive the same transform (descriptive)
    pub apply_to: ApplyTo,

    /// Whether the effect remaps time (and so may change the duration)
    pub changes_timing: bool,

    /// List of required parameters
    pub required_parameters: Vec<String>,

    /// List of optional parameters with descriptions
    pub optional_parameters: Vec<(String, String)>,
}

impl Default for EffectMetadata {
    fn default() -> Self {
        Self {
            apply_to: ApplyTo::ALL,
            changes_timing: false,
            required_parameters: Vec::new(),
            optional_parameters: Vec::new(),
        }
    }
}

impl EffectMetadata {
    pub(crate) fn with_parameters(apply_to: ApplyTo, required: &[&str], optional: &[(&str, &str)]) -> Self {
        Self {
            apply_to,
            changes_timing: false,
            required_parameters: required.iter().map(|p| p.to_string()).collect(),
            optional_parameters: optional.iter().map(|(p, d)| (p.to_string(), d.to_string())).collect(),
        }
    }

    pub(crate) fn timing(mut self) -> Self {
        self.changes_timing = true;
        self
    }
}

/// Named parameters for building an effect from configuration
///
/// ```toml
/// [[effects]]
/// name = "resize"
/// params = { width = 640 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectParams {
    values: HashMap<String, ParamValue>,
}

impl EffectParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter value
    pub fn set<K: Into<String>, V: Into<ParamValue>>(mut self, key: K, value: V) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// A numeric parameter the effect cannot do without.
    pub fn require_f64(&self, effect: &str, key: &str) -> Result<f64> {
        self.get_f64(key)
            .ok_or_else(|| EffectError::invalid(effect, key, "missing numeric parameter").into())
    }

    /// A non-negative whole number.
    pub fn get_u32(&self, effect: &str, key: &str) -> Result<Option<u32>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ParamValue::Integer(i)) if *i >= 0 && *i <= i64::from(u32::MAX) => Ok(Some(*i as u32)),
            Some(other) => Err(EffectError::invalid(effect, key, format!("expected a whole number, got {:?}", other)).into()),
        }
    }

    /// An `[r, g, b]` list of 0-255 values.
    pub fn get_color(&self, effect: &str, key: &str) -> Result<Option<[u8; 3]>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ParamValue::List(values)) if values.len() == 3 && values.iter().all(|v| (0.0..=255.0).contains(v)) => {
                Ok(Some([values[0] as u8, values[1] as u8, values[2] as u8]))
            }
            Some(other) => Err(EffectError::invalid(effect, key, format!("expected [r, g, b], got {:?}", other)).into()),
        }
    }
}

/// Parameter value as written in a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<f64>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(value: Vec<f64>) -> Self {
        ParamValue::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_from_toml() {
        let params: EffectParams =
            toml::from_str("factor = 2\nduration = 1.5\nexpand = false\nunit = \"rad\"\nbg_color = [255, 0, 0]").unwrap();

        assert_eq!(params.get_f64("factor"), Some(2.0));
        assert_eq!(params.get_u32("loop", "factor").unwrap(), Some(2));
        assert_eq!(params.get_f64("duration"), Some(1.5));
        assert_eq!(params.get_bool_or("expand", true), false);
        assert_eq!(params.get_string("unit"), Some("rad"));
        assert_eq!(params.get_color("rotate", "bg_color").unwrap(), Some([255, 0, 0]));
        assert!(params.get_u32("loop", "duration").is_err());
    }

    #[test]
    fn test_missing_required_parameter_names_effect() {
        let err = EffectParams::new().require_f64("fade_in", "duration").unwrap_err();
        assert!(err.to_string().contains("fade_in"));
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn test_bad_color_rejected() {
        let params = EffectParams::new().set("bg_color", vec![1.0, 2.0]);
        assert!(params.get_color("rotate", "bg_color").is_err());
    }
}
