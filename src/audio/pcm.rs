use std::io::Write;

use crate::foundation::core::{Fps, FrameIndex};

/// Mix output channel count (interleaved stereo).
pub const MIX_CHANNELS: u16 = 2;

/// Interleaved `f32` PCM covering one output frame of the export.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBlock {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved samples, `frames() * channels` long.
    pub interleaved_f32: Vec<f32>,
}

impl AudioBlock {
    /// Silent block of `frames` sample frames.
    pub fn silent(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            interleaved_f32: vec![0.0; frames * usize::from(channels)],
        }
    }

    /// Sample frames in the block.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.interleaved_f32.len() / usize::from(self.channels)
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.interleaved_f32
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

/// Convert a frame index to the nearest sample index at `sample_rate`.
pub fn frame_to_sample(frame: u64, fps: Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frame) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    ((num + (den / 2)) / den) as u64
}

/// Sample frames belonging to video frame `idx`.
///
/// Consecutive frames tile the sample axis without gaps, so rounding never accumulates drift.
pub fn samples_for_frame(idx: FrameIndex, fps: Fps, sample_rate: u32) -> usize {
    let start = frame_to_sample(idx.0, fps, sample_rate);
    let end = frame_to_sample(idx.0 + 1, fps, sample_rate);
    (end - start) as usize
}

/// Append samples as little-endian `f32`.
pub fn write_f32le(out: &mut impl Write, samples: &[f32]) -> std::io::Result<()> {
    let mut bytes = Vec::<u8>::with_capacity(samples.len() * 4);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    out.write_all(&bytes)
}
