use std::fs::File;
use std::io::{BufWriter, Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use crate::audio::pcm::{AudioBlock, write_f32le};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::backend::FrameRGBA;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Sink that streams frames into the system `ffmpeg` and muxes the mixed audio on `end`.
///
/// Video goes to a temporary H.264 file next to the destination while audio blocks are
/// buffered as raw `f32le`. Only a successful `end` writes the destination; `abort` kills the
/// encoder and deletes both temporaries.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    audio: Option<BufWriter<File>>,

    video_tmp: PathBuf,
    audio_tmp: PathBuf,
    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a new sink writing to `opts.out_path`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        let video_tmp = temp_sibling(&opts.out_path, "video.mp4");
        let audio_tmp = temp_sibling(&opts.out_path, "audio.f32le");
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            audio: None,
            video_tmp,
            audio_tmp,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    fn remove_temporaries(&self) {
        for path in [&self.video_tmp, &self.audio_tmp] {
            if path.exists()
                && let Err(e) = std::fs::remove_file(path)
            {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary file");
            }
        }
    }

    fn finish_video(&mut self) -> CutlineResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| CutlineError::encode("ffmpeg sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| CutlineError::encode(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = join_drain(self.stderr_drain.take())?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(CutlineError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn mux(&mut self, cfg: &SinkConfig) -> CutlineResult<()> {
        if let Some(mut audio) = self.audio.take() {
            audio
                .flush()
                .map_err(|e| CutlineError::encode(format!("failed to flush audio buffer: {e}")))?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args(["-loglevel", "error", "-i"])
            .arg(&self.video_tmp)
            .args([
                "-f",
                "f32le",
                "-ar",
                &cfg.sample_rate.to_string(),
                "-ac",
                &cfg.channels.to_string(),
                "-i",
            ])
            .arg(&self.audio_tmp)
            .args([
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "-shortest",
                "-movflags",
                "+faststart",
            ])
            .arg(&self.opts.out_path);

        let output = cmd
            .output()
            .map_err(|e| CutlineError::encode(format!("failed to spawn ffmpeg for muxing: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CutlineError::encode(format!(
                "ffmpeg mux exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> CutlineResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(CutlineError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(CutlineError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(CutlineError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if cfg.sample_rate == 0 || cfg.channels == 0 {
            return Err(CutlineError::validation(
                "audio sample_rate and channels must be non-zero",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(CutlineError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(CutlineError::setup(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let audio = File::create(&self.audio_tmp).map_err(|e| {
            CutlineError::setup(format!(
                "failed to create audio buffer '{}': {e}",
                self.audio_tmp.display()
            ))
        })?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames, flattened before they are written (push_frame).
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);
        cmd.args([
            "-an",
            "-c:v",
            "libx264",
            "-b:v",
            &cfg.bitrate.to_string(),
            "-pix_fmt",
            "yuv420p",
        ]);
        cmd.arg(&self.video_tmp);

        let mut child = cmd.spawn().map_err(|e| {
            self.remove_temporaries();
            CutlineError::setup(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CutlineError::setup("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CutlineError::setup("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            bitrate = cfg.bitrate,
            "ffmpeg encoder started"
        );
        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.audio = Some(BufWriter::new(audio));
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        frame: &FrameRGBA,
        audio: &AudioBlock,
    ) -> CutlineResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| CutlineError::encode("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(CutlineError::encode(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(CutlineError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if audio.channels != cfg.channels {
            return Err(CutlineError::encode(format!(
                "audio channel mismatch: got {}, expected {}",
                audio.channels, cfg.channels
            )));
        }

        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CutlineError::encode("ffmpeg sink is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            CutlineError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        let Some(buf) = self.audio.as_mut() else {
            return Err(CutlineError::encode("ffmpeg sink audio buffer is closed"));
        };
        write_f32le(buf, &audio.interleaved_f32)
            .map_err(|e| CutlineError::encode(format!("failed to buffer audio: {e}")))?;
        Ok(())
    }

    fn end(&mut self) -> CutlineResult<()> {
        let cfg = self
            .cfg
            .take()
            .ok_or_else(|| CutlineError::encode("ffmpeg sink not started"))?;
        let result = self.finish_video().and_then(|()| self.mux(&cfg));
        self.remove_temporaries();
        if result.is_ok() {
            tracing::info!(out = %self.opts.out_path.display(), "mp4 written");
        }
        result
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "ffmpeg already exited");
            }
            let _ = child.wait();
        }
        let _ = join_drain(self.stderr_drain.take());
        drop(self.audio.take());
        self.remove_temporaries();
        self.cfg = None;
        tracing::debug!(out = %self.opts.out_path.display(), "ffmpeg encode aborted");
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> CutlineResult<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| CutlineError::encode("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| CutlineError::encode(format!("ffmpeg stderr read failed: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Temporary path beside `out`, unique per process.
fn temp_sibling(out: &Path, suffix: &str) -> PathBuf {
    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_owned());
    out.with_file_name(format!(".{name}.{}.{suffix}", std::process::id()))
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // `-r` before `-i` sets the rawvideo input rate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> CutlineResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(CutlineError::encode(
            "frame data length does not match width*height*4",
        ));
    }

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let inv = 255u16 - u16::from(s[3]);
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> CutlineResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
