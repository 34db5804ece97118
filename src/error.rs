use thiserror::Error;

/// Main error type for the clip-compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Clip error: {0}")]
    Clip(#[from] ClipError),

    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Timeline and frame-evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipError {
    #[error("clip '{clip}' has no duration, but {operation} requires one")]
    MissingDuration { clip: String, operation: String },

    #[error("clip '{clip}': invalid time range [{from}, {}): {reason}", display_bound(.to))]
    InvalidTimeRange {
        clip: String,
        from: f64,
        to: Option<f64>,
        reason: String,
    },

    #[error("clip '{clip}': expected a {}x{} grid, got {}x{}", .expected.0, .expected.1, .actual.0, .actual.1)]
    IncompatibleFrameShape {
        clip: String,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("clip '{clip}' was queried at t={requested} after its world clock reached {clock}")]
    NonMonotonicQuery {
        clip: String,
        requested: f64,
        clock: f64,
    },

    #[error("clip '{clip}' has no frame at t={t}: {reason}")]
    FrameUnavailable { clip: String, t: f64, reason: String },

    #[error("clip '{clip}' carries mutable state and cannot be evaluated out of order")]
    StatefulClip { clip: String },

    #[error("composition has no clips to derive its {missing} from")]
    EmptyComposition { missing: String },
}

fn display_bound(bound: &Option<f64>) -> String {
    match bound {
        Some(value) => value.to_string(),
        None => "inf".to_string(),
    }
}

/// Effect construction and application errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("Effect not found: {name}")]
    NotFound { name: String },

    #[error("Invalid parameter for {effect}: {key} - {reason}")]
    InvalidParameter {
        effect: String,
        key: String,
        reason: String,
    },

    #[error("Effect application failed: {effect} - {reason}")]
    ApplicationFailed { effect: String, reason: String },
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to load image: {path}")]
    LoadFailed { path: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Errors raised while handing frames to sinks and encoders
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("External tool not available: {tool}")]
    ToolNotFound { tool: String },

    #[error("Render cancelled after {frames} frames")]
    Cancelled { frames: usize },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl ClipError {
    pub(crate) fn missing_duration(clip: &str, operation: &str) -> Self {
        Self::MissingDuration {
            clip: clip.to_string(),
            operation: operation.to_string(),
        }
    }

    pub(crate) fn invalid_range(clip: &str, from: f64, to: Option<f64>, reason: impl Into<String>) -> Self {
        Self::InvalidTimeRange {
            clip: clip.to_string(),
            from,
            to,
            reason: reason.into(),
        }
    }
}

impl EffectError {
    pub(crate) fn invalid(effect: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            effect: effect.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl CompositorError {
    /// True when the failure came from the environment (a file, the disk)
    /// rather than from the clip graph, so fixing an input may help.
    ///
    /// Timeline, shape and effect errors describe the clip graph itself.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Audio(AudioError::LoadFailed { .. }) => true,
            Self::Video(VideoError::LoadFailed { .. }) => true,
            _ => false,
        }
    }

    /// Message for end users, with a hint where one exists.
    pub fn user_message(&self) -> String {
        match self {
            Self::Clip(ClipError::MissingDuration { clip, operation }) => {
                format!(
                    "Clip '{}' is open-ended. Give it a duration (with_duration or subclip) before {}.",
                    clip, operation
                )
            }
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Video(VideoError::LoadFailed { path }) => {
                format!("Could not load image or video '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Effect(EffectError::NotFound { name }) => {
                format!("Effect '{}' is not registered.", name)
            }
            Self::Export(ExportError::ToolNotFound { tool }) => {
                format!("'{}' could not be executed. Set tools.ffmpeg_binary in the configuration.", tool)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message_names_clip_and_bounds() {
        let err: CompositorError = ClipError::invalid_range("intro", 2.0, Some(1.0), "start must precede end").into();
        let message = err.to_string();
        assert!(message.contains("intro"));
        assert!(message.contains("[2, 1)"));
        assert!(message.contains("start must precede end"));
    }

    #[test]
    fn test_open_range_is_rendered_as_infinite() {
        let err = ClipError::invalid_range("bg", 3.0, None, "negative duration");
        assert!(err.to_string().contains("[3, inf)"));
    }

    #[test]
    fn test_shape_error_message() {
        let err = ClipError::IncompatibleFrameShape {
            clip: "logo".to_string(),
            expected: (4, 2),
            actual: (3, 2),
        };
        assert_eq!(err.to_string(), "clip 'logo': expected a 4x2 grid, got 3x2");
    }

    #[test]
    fn test_clip_errors_are_not_recoverable() {
        let err: CompositorError = ClipError::missing_duration("stream", "rendering").into();
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("stream"));

        let io: CompositorError = std::io::Error::new(std::io::ErrorKind::Interrupted, "busy").into();
        assert!(io.is_recoverable());
    }
}
