//! Probing and decoding of time-based media through the system `ffmpeg`/`ffprobe`.
//!
//! Everything that spawns a process is behind the `media-ffmpeg` feature; without it the
//! functions return a [`CutlineError::ResourceLoad`] so the affected items are simply skipped.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::assets::resource::{AudioPcm, PreparedImage, VideoFrameSource};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Stream facts reported by `ffprobe`.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    /// Resolved file path.
    pub source_path: PathBuf,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Native frame rate numerator.
    pub fps_num: u32,
    /// Native frame rate denominator.
    pub fps_den: u32,
    /// Container duration in seconds.
    pub duration_sec: f64,
    /// Whether an audio stream exists.
    pub has_audio: bool,
}

impl VideoSourceInfo {
    /// Native frame rate, `0.0` when unknown.
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }
}

/// Probe dimensions, frame rate, duration and audio presence with `ffprobe`.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> CutlineResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| CutlineError::resource_load(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(CutlineError::resource_load(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| CutlineError::resource_load(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| CutlineError::resource_load("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| CutlineError::resource_load("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| CutlineError::resource_load("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| CutlineError::resource_load("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
        has_audio,
    })
}

/// Video probing needs `ffprobe`; always fails without the `media-ffmpeg` feature.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(source_path: &Path) -> CutlineResult<VideoSourceInfo> {
    Err(CutlineError::resource_load(format!(
        "'{}': video sources require the 'media-ffmpeg' feature",
        source_path.display()
    )))
}

/// Decode up to `frame_count` straight-alpha RGBA8 frames starting at `start_time_sec`.
#[cfg(feature = "media-ffmpeg")]
pub(crate) fn decode_video_frames_rgba8(
    source: &VideoSourceInfo,
    start_time_sec: f64,
    frame_count: u32,
) -> CutlineResult<Vec<Vec<u8>>> {
    if frame_count == 0 {
        return Ok(Vec::new());
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{start_time_sec:.9}")])
        .arg("-i")
        .arg(&source.source_path)
        .args([
            "-frames:v",
            &frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| {
            CutlineError::resource_load(format!("failed to run ffmpeg for video decode: {e}"))
        })?;

    if !out.status.success() {
        return Err(CutlineError::resource_load(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let frame_len = source.width as usize * source.height as usize * 4;
    if frame_len == 0 {
        return Err(CutlineError::resource_load(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if !out.stdout.len().is_multiple_of(frame_len) {
        return Err(CutlineError::resource_load(format!(
            "decoded video batch has invalid size: got {} bytes, expected multiples of {frame_len}",
            out.stdout.len()
        )));
    }

    Ok(out
        .stdout
        .chunks_exact(frame_len)
        .take(frame_count as usize)
        .map(<[u8]>::to_vec)
        .collect())
}

#[cfg(not(feature = "media-ffmpeg"))]
pub(crate) fn decode_video_frames_rgba8(
    _source: &VideoSourceInfo,
    _start_time_sec: f64,
    _frame_count: u32,
) -> CutlineResult<Vec<Vec<u8>>> {
    Err(CutlineError::resource_load(
        "video sources require the 'media-ffmpeg' feature",
    ))
}

/// Decode the whole audio stream of `path` as interleaved stereo `f32`.
///
/// A file without an audio stream yields empty PCM rather than an error.
#[cfg(feature = "media-ffmpeg")]
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> CutlineResult<AudioPcm> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| {
            CutlineError::resource_load(format!("failed to run ffmpeg for audio decode: {e}"))
        })?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        if msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(AudioPcm {
                sample_rate,
                channels: 2,
                interleaved_f32: std::sync::Arc::new(Vec::new()),
            });
        }
        return Err(CutlineError::resource_load(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(CutlineError::resource_load(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let pcm = out
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect::<Vec<_>>();

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: std::sync::Arc::new(pcm),
    })
}

/// Audio decoding needs `ffmpeg`; always fails without the `media-ffmpeg` feature.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_audio_f32_stereo(path: &Path, _sample_rate: u32) -> CutlineResult<AudioPcm> {
    Err(CutlineError::resource_load(format!(
        "'{}': audio sources require the 'media-ffmpeg' feature",
        path.display()
    )))
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

/// Frames batch-decoded with `ffmpeg` and kept in a bounded LRU keyed by source millisecond.
pub struct FfmpegFrameSource {
    info: VideoSourceInfo,
    prefetch_frames: u32,
    cache: Mutex<FrameLru>,
}

struct FrameLru {
    frames: HashMap<u64, PreparedImage>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl FrameLru {
    fn get(&mut self, key: u64) -> Option<PreparedImage> {
        let img = self.frames.get(&key).cloned()?;
        self.touch(key);
        Some(img)
    }

    fn insert(&mut self, key: u64, image: PreparedImage) {
        self.frames.insert(key, image);
        self.touch(key);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.frames.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }
}

impl FfmpegFrameSource {
    /// Frame source for a probed file, retaining at most `capacity` decoded frames.
    pub fn new(info: VideoSourceInfo, capacity: usize) -> Self {
        Self {
            info,
            prefetch_frames: 12,
            cache: Mutex::new(FrameLru {
                frames: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    fn step_ms(&self) -> f64 {
        let fps = self.info.source_fps();
        if fps.is_finite() && fps > 0.0 {
            1000.0 / fps
        } else {
            1.0
        }
    }

    fn key_for_time(&self, source_secs: f64) -> u64 {
        // Snap to the native frame grid so nearby requests share one decode.
        let step = self.step_ms();
        let idx = (source_secs.max(0.0) * 1000.0 / step + 1e-6).floor();
        (idx * step).round() as u64
    }

    fn to_image(&self, mut rgba: Vec<u8>) -> CutlineResult<PreparedImage> {
        crate::foundation::math::premultiply_rgba8_in_place(&mut rgba);
        PreparedImage::new(self.info.width, self.info.height, rgba)
    }
}

impl VideoFrameSource for FfmpegFrameSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn duration_secs(&self) -> f64 {
        self.info.duration_sec
    }

    fn frame_at(&self, source_secs: f64) -> CutlineResult<PreparedImage> {
        let key = self.key_for_time(source_secs);
        {
            let mut lru = self
                .cache
                .lock()
                .map_err(|_| CutlineError::resource_load("video frame cache poisoned"))?;
            if let Some(img) = lru.get(key) {
                return Ok(img);
            }
        }

        // Decode outside the lock; a concurrent miss on the same key just decodes twice.
        let start_secs = key as f64 / 1000.0;
        let batch = decode_video_frames_rgba8(&self.info, start_secs, self.prefetch_frames)?;
        let step = self.step_ms();
        let mut wanted = None;
        let mut lru = self
            .cache
            .lock()
            .map_err(|_| CutlineError::resource_load("video frame cache poisoned"))?;
        for (offset, rgba) in batch.into_iter().enumerate() {
            let k = (key as f64 + offset as f64 * step).round() as u64;
            let img = self.to_image(rgba)?;
            if offset == 0 {
                wanted = Some(img.clone());
            }
            lru.insert(k, img);
        }
        wanted.ok_or_else(|| {
            CutlineError::resource_load(format!(
                "ffmpeg returned no video frames for '{}' at {source_secs:.3}s",
                self.info.source_path.display()
            ))
        })
    }
}
