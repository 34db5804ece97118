//! # Audio Module
//!
//! Audio clips, the mixer that layers them, and file decoding.
//!
//! ## Core Features
//!
//! - **Audio clips**: sample frames as a function of time, with the same
//!   timeline operations as video clips
//! - **Mixing**: `CompositeAudioClip` sums overlapping clips and widens mono
//!   to the widest channel layout
//! - **Decoding**: WAV through `hound`, MP3/FLAC/OGG/AAC through `symphonia`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use clip_compositor::audio::{concatenate_audioclips, AudioClip};
//! use clip_compositor::Timeline;
//!
//! # fn main() -> clip_compositor::Result<()> {
//! let intro = AudioClip::from_file("intro.wav")?;
//! let song = AudioClip::from_file("song.mp3")?.subclip(10.0, Some(40.0))?;
//! let mix = concatenate_audioclips(vec![intro, song])?;
//!
//! println!("Mix lasts {:?} s, peak {}", mix.duration(), mix.max_volume(44100)?);
//! # Ok(())
//! # }
//! ```

pub mod clip;
pub mod loader;
pub mod mixer;
pub mod types;

pub use clip::{AudioClip, ChunkIter};
pub use loader::AudioLoader;
pub use mixer::{concatenate_audioclips, CompositeAudioClip};
pub use types::{AudioChunk, AudioData, AudioFormat, AudioFrame};
