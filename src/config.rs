use std::time::Duration;

/// Tolerance below which a media handle's playhead is left alone instead of being repositioned.
///
/// Repositioning a decoder is expensive, and during live playback the handle's own clock is
/// already within a frame or two of the timeline.
pub const SEEK_TOLERANCE_SECS: f64 = 0.08;

/// Default bound on any single resource-readiness wait.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(4);

/// Export progress is never reported more often than this (10 Hz).
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Engine-wide tunables shared by the preview and export drivers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a blocking resource acquisition.
    #[serde(with = "duration_millis")]
    pub load_timeout: Duration,
    /// Playhead repositioning tolerance in seconds.
    pub seek_tolerance_secs: f64,
    /// Preview preload window on each side of the playhead, in seconds.
    pub preview_lookahead_secs: f64,
    /// Maximum number of concurrent background loads started by preview preloading.
    pub preview_parallel_loads: usize,
    /// Minimum interval between two export progress reports.
    #[serde(with = "duration_millis")]
    pub progress_interval: Duration,
    /// Bounded channel capacity between export workers and the encoder thread.
    pub channel_capacity: usize,
    /// Decoded video frames retained per video resource.
    pub video_frame_cache: usize,
    /// Mixing sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            seek_tolerance_secs: SEEK_TOLERANCE_SECS,
            preview_lookahead_secs: 5.0,
            preview_parallel_loads: 3,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            channel_capacity: 4,
            video_frame_cache: 64,
            sample_rate: 48_000,
        }
    }
}

impl EngineConfig {
    /// Defaults with `CUTLINE_*` environment overrides applied.
    ///
    /// Recognized: `CUTLINE_LOAD_TIMEOUT_MS`, `CUTLINE_SEEK_TOLERANCE_SECS`,
    /// `CUTLINE_LOOKAHEAD_SECS`, `CUTLINE_PARALLEL_LOADS`, `CUTLINE_VIDEO_CACHE_CAPACITY`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = parse_env::<u64>(&lookup, "CUTLINE_LOAD_TIMEOUT_MS").filter(|&v| v > 0)
        {
            self.load_timeout = Duration::from_millis(ms);
        }
        if let Some(t) = parse_env::<f64>(&lookup, "CUTLINE_SEEK_TOLERANCE_SECS")
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            self.seek_tolerance_secs = t;
        }
        if let Some(s) = parse_env::<f64>(&lookup, "CUTLINE_LOOKAHEAD_SECS")
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            self.preview_lookahead_secs = s;
        }
        if let Some(n) = parse_env::<usize>(&lookup, "CUTLINE_PARALLEL_LOADS").filter(|&n| n > 0) {
            self.preview_parallel_loads = n;
        }
        if let Some(n) =
            parse_env::<usize>(&lookup, "CUTLINE_VIDEO_CACHE_CAPACITY").filter(|&n| n > 0)
        {
            self.video_frame_cache = n;
        }
        self
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}

mod duration_millis {
    use std::time::Duration;

    pub(super) fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = <u64 as serde::Deserialize>::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
