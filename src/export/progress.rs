use std::time::{Duration, Instant};

/// Snapshot of export progress.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ExportProgress {
    /// Frames delivered to the sink.
    pub frames_done: u64,
    /// Frames the export will produce.
    pub total_frames: u64,
    /// `frames_done / total_frames`, `1.0` for an empty export.
    pub fraction: f64,
    /// Delivered frames per wall-clock second.
    pub fps_throughput: f64,
    /// Estimated seconds remaining; `None` until throughput is known.
    pub eta_secs: Option<f64>,
}

impl ExportProgress {
    /// Progress after `elapsed` with `frames_done` of `total_frames` delivered.
    pub fn compute(frames_done: u64, total_frames: u64, elapsed: Duration) -> Self {
        let fraction = if total_frames == 0 {
            1.0
        } else {
            frames_done as f64 / total_frames as f64
        };
        let secs = elapsed.as_secs_f64();
        let fps_throughput = if secs > 0.0 {
            frames_done as f64 / secs
        } else {
            0.0
        };
        let eta_secs = (fps_throughput > 0.0)
            .then(|| total_frames.saturating_sub(frames_done) as f64 / fps_throughput);
        Self {
            frames_done,
            total_frames,
            fraction,
            fps_throughput,
            eta_secs,
        }
    }
}

/// Rate limiter for progress reports: at most one per `interval`, plus the final one.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    started: Instant,
    last: Option<Instant>,
}

impl ProgressThrottle {
    /// Throttle whose clock starts at `started`.
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            started,
            last: None,
        }
    }

    /// Report to emit for this update, if any.
    ///
    /// The completing update (`frames_done == total_frames`) is always emitted.
    pub fn observe(&mut self, frames_done: u64, total_frames: u64, now: Instant) -> Option<ExportProgress> {
        let is_final = frames_done >= total_frames;
        let due = match self.last {
            None => true,
            Some(prev) => now.saturating_duration_since(prev) >= self.interval,
        };
        if !(due || is_final) {
            return None;
        }
        self.last = Some(now);
        Some(ExportProgress::compute(
            frames_done,
            total_frames,
            now.saturating_duration_since(self.started),
        ))
    }
}
