use tracing::debug;

use crate::clip::Timeline;
use crate::composition::Compositor;
use crate::error::{ClipError, Result};
use crate::video::{Position, VideoClip};

/// Play `clips` one after another.
///
/// Every clip needs a duration. The canvas is as large as the largest clip
/// in each dimension; smaller clips are centered on `bg_color`.
pub fn concatenate_videoclips(clips: Vec<VideoClip>, bg_color: [u8; 3]) -> Result<VideoClip> {
    if clips.is_empty() {
        return Err(ClipError::EmptyComposition {
            missing: "concatenation".to_string(),
        }
        .into());
    }

    let mut canvas = (0, 0);
    let mut offset = 0.0;
    let mut placed = Vec::with_capacity(clips.len());
    for clip in clips {
        let duration = clip.require_duration("concatenation")?;
        let (width, height) = clip.resolved_size()?;
        canvas = (canvas.0.max(width), canvas.1.max(height));
        placed.push(clip.with_start(offset, true)?.with_position(Position::center()));
        offset += duration;
    }

    debug!(
        "Concatenating {} clips on a {}x{} canvas, {:.3}s total",
        placed.len(),
        canvas.0,
        canvas.1,
        offset
    );

    Compositor::new(placed)
        .with_size(canvas.0, canvas.1)
        .with_bg_color(bg_color)
        .with_duration(offset)
        .build()
        .map(|clip| clip.with_name("ConcatenatedVideoClip"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clips_play_in_sequence_centered() {
        let wide = VideoClip::color((4, 2), [255, 0, 0], Some(1.0));
        let small = VideoClip::color((2, 2), [0, 255, 0], Some(2.0));
        let joined = concatenate_videoclips(vec![wide, small], [0, 0, 0]).unwrap();

        assert_eq!(joined.duration(), Some(3.0));
        assert_eq!(joined.size(), Some((4, 2)));
        assert_eq!(joined.frame_at(0.5).unwrap().get_pixel(0, 0), [255, 0, 0]);

        let later = joined.frame_at(1.0).unwrap();
        assert_eq!(later.get_pixel(0, 0), [0, 0, 0]);
        assert_eq!(later.get_pixel(1, 0), [0, 255, 0]);
        assert_eq!(later.get_pixel(3, 1), [0, 0, 0]);
    }

    #[test]
    fn test_open_clip_rejected() {
        let open = VideoClip::color((2, 2), [0, 0, 0], None);
        assert!(concatenate_videoclips(vec![open], [0, 0, 0]).is_err());
        assert!(concatenate_videoclips(Vec::new(), [0, 0, 0]).is_err());
    }
}
