use std::fs::create_dir_all;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task;
use tracing::{debug, info, warn};

use crate::clip::Timeline;
use crate::config::ToolsConfig;
use crate::error::{ExportError, Result};
use crate::export::{render_audio, render_video, CancelToken, PngSequenceSink, WavSink};
use crate::video::{VideoClip, VideoParams};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Represents an encoded video output
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub duration: f64,
    pub frame_count: usize,
    pub file_size: u64,
}

/// Encodes clips by rendering PNG frames and a WAV track into a scratch
/// directory and running ffmpeg over them.
///
/// The ffmpeg executable comes from [`ToolsConfig`]; nothing is looked up
/// globally.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    tools: ToolsConfig,
    params: VideoParams,
    sample_rate: u32,
}

impl FfmpegEncoder {
    pub fn new(tools: ToolsConfig, params: VideoParams) -> Self {
        Self {
            tools,
            params,
            sample_rate: 44100,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Whether the configured binary runs at all.
    pub async fn is_available(&self) -> bool {
        let mut cmd = Command::new(&self.tools.ffmpeg_binary);
        cmd.arg("-version").stdout(Stdio::null()).stderr(Stdio::null());
        task::spawn_blocking(move || cmd.status())
            .await
            .map(|status| status.map(|s| s.success()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// A fresh directory per call, so concurrent encodes never share files.
    fn scratch_dir(&self) -> Result<PathBuf> {
        let dir = self.tools.scratch_dir().join(format!(
            "clip_compositor_{}_{}",
            std::process::id(),
            SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Render `clip` at the configured frame rate and encode it to `output`.
    pub async fn encode<P: AsRef<Path>>(&self, clip: &VideoClip, output: P, cancel: &CancelToken) -> Result<EncodedVideo> {
        let output = output.as_ref().to_path_buf();
        let duration = clip.require_duration("encoding")?;

        if !self.is_available().await {
            return Err(ExportError::ToolNotFound {
                tool: self.tools.ffmpeg_binary.display().to_string(),
            }
            .into());
        }

        let scratch = self.scratch_dir()?;
        info!("Encoding '{}' to {:?} via {:?}", clip.name(), output, scratch);
        let result = self.encode_in(clip, &output, &scratch, cancel).await;

        if let Err(e) = std::fs::remove_dir_all(&scratch) {
            warn!("Failed to remove temporary directory: {}", e);
        }

        let frame_count = result?;
        let file_size = std::fs::metadata(&output)?.len();
        info!("Video encoding complete: {}KB", file_size / 1024);
        Ok(EncodedVideo {
            path: output,
            duration,
            frame_count,
            file_size,
        })
    }

    async fn encode_in(&self, clip: &VideoClip, output: &Path, scratch: &Path, cancel: &CancelToken) -> Result<usize> {
        let (pattern, audio_path, frames) = self.render_inputs(clip, scratch, cancel).await?;

        let mut cmd = Command::new(&self.tools.ffmpeg_binary);
        cmd.arg("-y")
            .arg("-framerate")
            .arg(self.params.fps.to_string())
            .arg("-i")
            .arg(pattern);
        if let Some(audio_path) = &audio_path {
            cmd.arg("-i").arg(audio_path).args(["-c:a", "aac", "-shortest"]);
        }
        cmd.args(["-c:v", self.params.codec.as_str(), "-pix_fmt", "yuv420p"])
            .arg("-crf")
            .arg(quality_to_crf(self.params.quality).to_string())
            .arg(output);
        debug!("Running {:?}", cmd);

        let binary = self.tools.ffmpeg_binary.display().to_string();
        let result = task::spawn_blocking(move || cmd.output())
            .await
            .map_err(|e| ExportError::EncodingFailed {
                reason: format!("Failed to spawn FFmpeg process: {}", e),
            })?;
        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ExportError::ToolNotFound { tool: binary }.into()),
            Err(e) => {
                return Err(ExportError::EncodingFailed {
                    reason: format!("FFmpeg execution failed: {}", e),
                }
                .into())
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::EncodingFailed {
                reason: format!("FFmpeg failed: {}", stderr),
            }
            .into());
        }
        Ok(frames)
    }

    /// Render PNG frames and the WAV track on the blocking pool.
    ///
    /// Returns the frame file pattern, the audio path when the clip has
    /// audio, and the number of frames written.
    async fn render_inputs(
        &self,
        clip: &VideoClip,
        scratch: &Path,
        cancel: &CancelToken,
    ) -> Result<(PathBuf, Option<PathBuf>, usize)> {
        let clip = clip.clone();
        let scratch = scratch.to_path_buf();
        let cancel = cancel.clone();
        let fps = self.params.fps;
        let sample_rate = self.sample_rate;

        task::spawn_blocking(move || -> Result<(PathBuf, Option<PathBuf>, usize)> {
            let mut frames = PngSequenceSink::new(scratch.join("frames"))?;
            let stats = render_video(&clip, fps, &mut frames, &cancel)?;

            let audio_path = match clip.audio() {
                Some(audio) => {
                    let path = scratch.join("audio.wav");
                    let channels = u16::try_from(audio.channels()).unwrap_or(2);
                    let mut sink = WavSink::create(&path, sample_rate, channels)?;
                    render_audio(audio, sample_rate, 4096, &mut sink, &cancel)?;
                    Some(path)
                }
                None => None,
            };
            Ok((frames.pattern(), audio_path, stats.frames))
        })
        .await
        .map_err(|e| ExportError::EncodingFailed {
            reason: format!("Render task failed: {}", e),
        })?
    }
}

/// Map 0-100 quality onto x264's 51-0 CRF scale.
fn quality_to_crf(quality: u8) -> u8 {
    (51 - ((f32::from(quality.min(100)) / 100.0) * 51.0) as u8).clamp(0, 51)
}
