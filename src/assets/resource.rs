use std::sync::Arc;

use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::timeline::ItemId;

/// Decoded still picture, premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed premultiplied RGBA8 bytes.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap premultiplied bytes, checking the buffer length.
    pub fn new(width: u32, height: u32, rgba8_premul: Vec<u8>) -> CutlineResult<Self> {
        if width == 0 || height == 0 {
            return Err(CutlineError::resource_load("image dimensions must be non-zero"));
        }
        if rgba8_premul.len() != width as usize * height as usize * 4 {
            return Err(CutlineError::resource_load(format!(
                "image buffer length {} does not match {width}x{height}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Single-color image, handy for synthetic sources.
    pub fn solid(width: u32, height: u32, premul_rgba: [u8; 4]) -> CutlineResult<Self> {
        let len = width as usize * height as usize;
        Self::new(width, height, premul_rgba.repeat(len))
    }
}

/// Decoded sound, interleaved `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Interleaved samples.
    pub interleaved_f32: Arc<Vec<f32>>,
}

impl AudioPcm {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Stereo sample pair at `source_secs`, linearly interpolated. Silence outside the source.
    pub fn stereo_at(&self, source_secs: f64) -> (f32, f32) {
        let frames = self.frames();
        if frames == 0 || self.sample_rate == 0 {
            return (0.0, 0.0);
        }
        let pos = source_secs * f64::from(self.sample_rate);
        if !pos.is_finite() || pos < 0.0 {
            return (0.0, 0.0);
        }
        let f0 = pos.floor() as usize;
        if f0 >= frames {
            return (0.0, 0.0);
        }
        let f1 = (f0 + 1).min(frames - 1);
        let frac = (pos - f0 as f64) as f32;
        let src = self.interleaved_f32.as_slice();
        let ch = usize::from(self.channels);
        if ch == 1 {
            let v = src[f0] + (src[f1] - src[f0]) * frac;
            (v, v)
        } else {
            let (i0, i1) = (f0 * ch, f1 * ch);
            (
                src[i0] + (src[i1] - src[i0]) * frac,
                src[i0 + 1] + (src[i1 + 1] - src[i0 + 1]) * frac,
            )
        }
    }
}

/// Random-access frame provider behind a video resource.
///
/// Implementations may cache internally; they are shared between the preview thread and export
/// workers.
pub trait VideoFrameSource: Send + Sync {
    /// Native frame dimensions.
    fn dimensions(&self) -> (u32, u32);
    /// Source length in seconds.
    fn duration_secs(&self) -> f64;
    /// Frame displayed at `source_secs`.
    fn frame_at(&self, source_secs: f64) -> CutlineResult<PreparedImage>;
}

/// Pre-decoded frames at a fixed rate. Used for synthetic sources and tests.
#[derive(Clone, Debug)]
pub struct InMemoryFrames {
    fps: f64,
    frames: Vec<PreparedImage>,
}

impl InMemoryFrames {
    /// Frames sampled at `fps`. All frames must share the first frame's size.
    pub fn new(fps: f64, frames: Vec<PreparedImage>) -> CutlineResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CutlineError::resource_load("frame source fps must be > 0"));
        }
        let first = frames
            .first()
            .ok_or_else(|| CutlineError::resource_load("frame source has no frames"))?;
        if frames
            .iter()
            .any(|f| f.width != first.width || f.height != first.height)
        {
            return Err(CutlineError::resource_load(
                "frame source frames differ in size",
            ));
        }
        Ok(Self { fps, frames })
    }
}

impl VideoFrameSource for InMemoryFrames {
    fn dimensions(&self) -> (u32, u32) {
        (self.frames[0].width, self.frames[0].height)
    }

    fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn frame_at(&self, source_secs: f64) -> CutlineResult<PreparedImage> {
        let idx = (source_secs.max(0.0) * self.fps + 1e-9).floor() as usize;
        Ok(self.frames[idx.min(self.frames.len() - 1)].clone())
    }
}

/// A decoded, ready-to-use media handle.
#[derive(Clone)]
pub enum MediaResource {
    /// Still picture.
    Image(PreparedImage),
    /// Moving picture with optional sound.
    Video {
        /// Frame provider.
        frames: Arc<dyn VideoFrameSource>,
        /// Decoded sound track, if the source has one.
        audio: Option<AudioPcm>,
    },
    /// Sound only.
    Audio(AudioPcm),
}

impl MediaResource {
    /// Sound carried by this resource.
    pub fn audio(&self) -> Option<&AudioPcm> {
        match self {
            Self::Video { audio, .. } => audio.as_ref(),
            Self::Audio(pcm) => Some(pcm),
            Self::Image(_) => None,
        }
    }

    /// Picture at `source_secs`; `None` for sound-only resources.
    pub fn picture_at(&self, source_secs: f64) -> Option<CutlineResult<PreparedImage>> {
        match self {
            Self::Image(img) => Some(Ok(img.clone())),
            Self::Video { frames, .. } => Some(frames.frame_at(source_secs)),
            Self::Audio(_) => None,
        }
    }
}

impl std::fmt::Debug for MediaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(img) => write!(f, "Image({}x{})", img.width, img.height),
            Self::Video { frames, audio } => {
                let (w, h) = frames.dimensions();
                write!(f, "Video({w}x{h}, audio: {})", audio.is_some())
            }
            Self::Audio(pcm) => write!(f, "Audio({} frames)", pcm.frames()),
        }
    }
}

/// Non-blocking view of resources that are ready right now.
///
/// Implemented by the shared cache (preview) and by the export lease set.
pub trait ResourceLookup {
    /// Ready resource for `item`, never waiting for a load.
    fn ready(&self, item: ItemId) -> Option<Arc<MediaResource>>;
}

impl ResourceLookup for std::collections::HashMap<ItemId, Arc<MediaResource>> {
    fn ready(&self, item: ItemId) -> Option<Arc<MediaResource>> {
        self.get(&item).cloned()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resource.rs"]
mod tests;
