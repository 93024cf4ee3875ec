use crate::audio::pcm::AudioBlock;
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::render::backend::FrameRGBA;

/// Stream parameters provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Sample rate of the audio blocks.
    pub sample_rate: u32,
    /// Channel count of the audio blocks.
    pub channels: u16,
    /// Target video bitrate in bits per second.
    pub bitrate: u32,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order, each
/// frame carrying the mixed audio covering exactly that frame's time span. A sink is
/// terminated by exactly one of `end` (keep the output) or `abort` (discard it).
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> CutlineResult<()>;
    /// Push one frame and its audio block.
    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        audio: &AudioBlock,
    ) -> CutlineResult<()>;
    /// Finalize the output after the last frame.
    fn end(&mut self) -> CutlineResult<()>;
    /// Discard any partial output. Must not fail.
    fn abort(&mut self);
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self, cfg: SinkConfig) -> CutlineResult<()> {
        (**self).begin(cfg)
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        audio: &AudioBlock,
    ) -> CutlineResult<()> {
        (**self).push_frame(idx, frame, audio)
    }

    fn end(&mut self) -> CutlineResult<()> {
        (**self).end()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    audio: Vec<f32>,
    finished: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// Concatenated interleaved audio of every pushed block.
    pub fn audio(&self) -> &[f32] {
        &self.audio
    }

    /// `true` once `end` succeeded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `true` once `abort` was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> CutlineResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.audio.clear();
        self.finished = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        audio: &AudioBlock,
    ) -> CutlineResult<()> {
        if self.cfg.is_none() {
            return Err(CutlineError::encode("in-memory sink not started"));
        }
        if let Some((last, _)) = self.frames.last()
            && idx <= *last
        {
            return Err(CutlineError::encode(format!(
                "out-of-order frame {} after {}",
                idx.0, last.0
            )));
        }
        self.frames.push((idx, frame.clone()));
        self.audio.extend_from_slice(&audio.interleaved_f32);
        Ok(())
    }

    fn end(&mut self) -> CutlineResult<()> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.audio.clear();
        self.aborted = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
