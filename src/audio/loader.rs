use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

use crate::audio::types::{AudioData, AudioFormat};
use crate::error::{AudioError, Result};

/// How a file is decoded, chosen from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    /// PCM WAV, read with hound.
    Wav,
    /// Anything symphonia can probe (mp3, flac, ogg, aac).
    Compressed,
}

impl AudioContainer {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "wav" | "wave" => Some(Self::Wav),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Some(Self::Compressed),
            _ => None,
        }
    }
}

/// Decodes audio files into interleaved `f32` samples.
pub struct AudioLoader;

impl AudioLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref();
        let data = match AudioContainer::from_path(path) {
            Some(AudioContainer::Wav) => decode_wav(path)?,
            Some(AudioContainer::Compressed) => decode_compressed(path)?,
            None => {
                return Err(AudioError::UnsupportedFormat {
                    format: path
                        .extension()
                        .map(|ext| ext.to_string_lossy().to_lowercase())
                        .unwrap_or_default(),
                }
                .into())
            }
        };

        debug!(
            "Decoded {} ({} Hz, {} channels, {:.2}s)",
            path.display(),
            data.sample_rate,
            data.channels,
            data.duration
        );
        Ok(data)
    }
}

fn load_failed(path: &Path) -> AudioError {
    AudioError::LoadFailed {
        path: path.display().to_string(),
    }
}

fn decoded(path: &Path, samples: Vec<f32>, sample_rate: u32, channels: u16, format: AudioFormat) -> AudioData {
    AudioData {
        file_path: Some(path.to_path_buf()),
        format,
        ..AudioData::from_interleaved(samples, sample_rate, channels)
    }
}

fn decode_wav(path: &Path) -> Result<AudioData> {
    let reader = hound::WavReader::open(path).map_err(|_| load_failed(path))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| load_failed(path))?,
        hound::SampleFormat::Int => {
            // hound yields signed values for every bit depth, 8-bit included
            let full_scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / full_scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| load_failed(path))?
        }
    };

    Ok(decoded(
        path,
        samples,
        spec.sample_rate,
        spec.channels,
        AudioFormat {
            extension: "wav".to_string(),
            bit_depth: Some(spec.bits_per_sample),
            compression: None,
        },
    ))
}

fn decode_compressed(path: &Path) -> Result<AudioData> {
    let file = File::open(path).map_err(|_| load_failed(path))?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|_| load_failed(path))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| load_failed(path))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params.sample_rate.ok_or_else(|| AudioError::InvalidParameters {
        details: format!("{} declares no sample rate", path.display()),
    })?;
    let channels = params.channels.map(|channels| channels.count() as u16).ok_or_else(|| {
        AudioError::InvalidParameters {
            details: format!("{} declares no channel layout", path.display()),
        }
    })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|_| load_failed(path))?;

    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(_) => return Err(load_failed(path).into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio) => {
                let buffer = buffer.get_or_insert_with(|| SampleBuffer::new(audio.capacity() as u64, *audio.spec()));
                buffer.copy_interleaved_ref(audio);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(reason)) => {
                trace!("Skipping undecodable packet in {}: {}", path.display(), reason);
            }
            Err(_) => return Err(load_failed(path).into()),
        }
    }

    Ok(decoded(
        path,
        samples,
        sample_rate,
        channels,
        AudioFormat {
            extension: hint_extension(path),
            bit_depth: params.bits_per_sample.map(|bits| bits as u16),
            compression: Some(format!("{:?}", params.codec)),
        },
    ))
}

fn hint_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("unknown")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::clip::Timeline;
    use crate::error::CompositorError;
    use tempfile::tempdir;

    fn write_wav(path: &Path, bits_per_sample: u16, samples: &[i32]) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8,
            bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_container_detection() {
        assert_eq!(AudioContainer::from_path("take.WAV"), Some(AudioContainer::Wav));
        assert_eq!(AudioContainer::from_path("song.mp3"), Some(AudioContainer::Compressed));
        assert_eq!(AudioContainer::from_path("notes.txt"), None);
        assert_eq!(AudioContainer::from_path("no_extension"), None);
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test.xyz");
        std::fs::write(&file_path, b"dummy content").unwrap();

        match AudioLoader::load(&file_path) {
            Err(CompositorError::Audio(AudioError::UnsupportedFormat { format })) => assert_eq!(format, "xyz"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_wav_is_load_failure() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("broken.wav");
        std::fs::write(&file_path, b"RIFF....nope").unwrap();

        let err = AudioLoader::load(&file_path).unwrap_err();
        assert!(matches!(err, CompositorError::Audio(AudioError::LoadFailed { .. })));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_integer_depths_scale_to_unit_range() {
        let temp_dir = tempdir().unwrap();

        let path = temp_dir.path().join("eight.wav");
        write_wav(&path, 8, &[-128, 127, 0, 64]);
        let data = AudioLoader::load(&path).unwrap();
        assert_eq!(data.samples, vec![-1.0, 127.0 / 128.0, 0.0, 0.5]);

        let path = temp_dir.path().join("twenty_four.wav");
        write_wav(&path, 24, &[-8_388_608, 4_194_304]);
        let data = AudioLoader::load(&path).unwrap();
        assert_eq!(data.samples, vec![-1.0, 0.5]);
        assert_eq!(data.format.bit_depth, Some(24));
    }

    #[test]
    fn test_wav_into_clip() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("tone.wav");
        let samples: Vec<i32> = (0..8).flat_map(|i| [i * 1024, -i * 1024]).collect();
        write_wav(&file_path, 16, &samples);

        let data = AudioLoader::load(&file_path).unwrap();
        assert_eq!(data.channels, 2);
        assert_eq!(data.sample_rate, 8);
        assert_eq!(data.frame_count(), 8);
        assert_eq!(data.file_path.as_deref(), Some(file_path.as_path()));

        let clip = AudioClip::from_data(data).unwrap();
        assert_eq!(clip.duration(), Some(1.0));
        assert_eq!(clip.name(), "tone.wav");
        let frame = clip.frame_at(0.25).unwrap();
        assert_eq!(frame.samples(), &[2048.0 / 32768.0, -2048.0 / 32768.0]);
    }
}
