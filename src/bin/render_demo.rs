// Renders a small layered composite to PNG frames and a WAV track, and to
// an mp4 when ffmpeg is available.
//
// Usage: render_demo [config.toml]

use std::f64::consts::TAU;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clip_compositor::{
    audio::{AudioClip, AudioFrame},
    effects::{AudioFadeOut, FadeIn, FadeOut},
    export::{render_audio, render_video, CancelToken, FfmpegEncoder, PngSequenceSink, WavSink},
    video::{Position, VideoClip},
    Config, Timeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting render_demo v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    config.validate()?;

    let (width, height) = config.video.params.resolution;
    let tone = AudioClip::from_fn(
        "tone",
        config.audio.sample_rate,
        usize::from(config.audio.channels),
        Some(2.0),
        |t| Ok(AudioFrame::mono((0.2 * (TAU * 440.0 * t).sin()) as f32)),
    )
    .with_effects(&[&AudioFadeOut::new(0.5)])?;

    let red = VideoClip::color((width, height), [200, 30, 30], Some(2.0))
        .with_audio(tone)?
        .with_memoize(config.video.memoize);
    let blue = VideoClip::color((width / 2, height / 2), [30, 30, 200], Some(2.0))
        .with_effects(&[&FadeIn::new(0.5), &FadeOut::new(0.5)])?
        .with_start(1.0, true)?
        .with_position(Position::center());

    let composite = config.apply_effects(config.compositor(vec![red, blue]).build()?)?;
    info!("Composite lasts {:?}s", composite.duration());

    let out_dir = PathBuf::from("render_demo_output");
    let cancel = CancelToken::new();

    let mut frames = PngSequenceSink::new(out_dir.join("frames"))?;
    render_video(&composite, config.video.params.fps, &mut frames, &cancel)?;

    if let Some(audio) = composite.audio() {
        let mut wav = WavSink::create(out_dir.join("audio.wav"), config.audio.sample_rate, config.audio.channels)?;
        render_audio(audio, config.audio.sample_rate, config.audio.chunk_size, &mut wav, &cancel)?;
    }

    let encoder = FfmpegEncoder::new(config.tools.clone(), config.video.params.clone())
        .with_sample_rate(config.audio.sample_rate);
    if encoder.is_available().await {
        let encoded = encoder.encode(&composite, out_dir.join("demo.mp4"), &cancel).await?;
        info!("Encoded {} frames into {:?}", encoded.frame_count, encoded.path);
    } else {
        warn!("{:?} not available, skipping mp4 output", config.tools.ffmpeg_binary);
    }

    info!("Done! Output saved to: {:?}", out_dir);
    Ok(())
}
