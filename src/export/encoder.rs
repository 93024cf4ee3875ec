use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::assets::cache::{MediaResourceCache, ResourceLease};
use crate::assets::playhead::PlayheadSet;
use crate::audio::dynamics::MasterBus;
use crate::audio::graph::AudioMixGraph;
use crate::audio::pcm::{AudioBlock, MIX_CHANNELS, samples_for_frame};
use crate::config::EngineConfig;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::export::cancel::CancelToken;
use crate::export::preset::ExportSettings;
use crate::export::progress::{ExportProgress, ProgressThrottle};
use crate::export::reorder::ReorderBuffer;
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::timeline::{ItemId, TimelineItem, items_duration};
use crate::model::volume::TrackVolumes;
use crate::render::backend::{FrameRGBA, Surface};
use crate::render::compositor::FrameCompositor;

/// Export lifecycle. `Completed`, `Error` and `Cancelled` are terminal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExportStatus {
    /// Not started.
    #[default]
    Idle,
    /// Resolving settings, opening the sink and leasing resources.
    Preparing,
    /// Rendering and streaming frames.
    Rendering,
    /// All frames submitted; the sink is finalizing.
    Encoding,
    /// Output written.
    Completed,
    /// Stopped by a setup or encode failure.
    Error(String),
    /// Stopped on request; partial output discarded.
    Cancelled,
}

impl ExportStatus {
    /// `true` for `Completed`, `Error` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error(_) | Self::Cancelled)
    }
}

/// Result of one [`ExportEncoder::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOutcome {
    /// Terminal status.
    pub status: ExportStatus,
    /// Frames delivered to the sink.
    pub frames_encoded: u64,
    /// Frames the timeline required.
    pub total_frames: u64,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

/// Thread-safe view of a running export: its status and a way to cancel it.
#[derive(Clone, Debug, Default)]
pub struct ExportMonitor {
    status: Arc<Mutex<ExportStatus>>,
    cancel: CancelToken,
}

impl ExportMonitor {
    /// Current status.
    pub fn status(&self) -> ExportStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request cancellation; observed before the next frame or resource acquisition.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The shared cancellation flag.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Frame-stepped offline export driver.
///
/// Frames `0..ceil(duration * fps)` are rendered in parallel batches on a dedicated rayon pool,
/// each at exactly `index / fps` with freshly positioned playheads, then resequenced on an
/// encoder thread that applies the master bus and feeds the sink in strictly ascending order.
pub struct ExportEncoder {
    cache: MediaResourceCache,
    config: EngineConfig,
    settings: ExportSettings,
    monitor: ExportMonitor,
}

enum Halt {
    Cancelled,
    Failed(CutlineError),
}

impl From<CutlineError> for Halt {
    fn from(e: CutlineError) -> Self {
        Self::Failed(e)
    }
}

struct FrameMsg {
    idx: FrameIndex,
    frame: FrameRGBA,
    audio: AudioBlock,
}

struct Worker {
    surface: Surface,
    compositor: FrameCompositor,
    mix: AudioMixGraph,
}

impl Worker {
    fn new(canvas: Canvas, sample_rate: u32) -> CutlineResult<Self> {
        Ok(Self {
            surface: Surface::new(canvas.width, canvas.height)?,
            compositor: FrameCompositor::new(),
            mix: AudioMixGraph::new(sample_rate),
        })
    }
}

#[derive(Clone, Copy)]
struct FrameCtx<'a> {
    items: &'a [TimelineItem],
    volumes: &'a TrackVolumes,
    leases: &'a HashMap<ItemId, ResourceLease>,
    canvas: Canvas,
    fps: Fps,
    sample_rate: u32,
    cancel: &'a CancelToken,
}

impl ExportEncoder {
    /// Export driver sharing `cache` with the preview.
    pub fn new(cache: MediaResourceCache, config: EngineConfig, settings: ExportSettings) -> Self {
        Self {
            cache,
            config,
            settings,
            monitor: ExportMonitor::default(),
        }
    }

    /// Handle for observing and cancelling from other threads.
    pub fn monitor(&self) -> ExportMonitor {
        self.monitor.clone()
    }

    /// Current status.
    pub fn status(&self) -> ExportStatus {
        self.monitor.status()
    }

    /// Settings the export runs with.
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn set_status(&self, status: ExportStatus) {
        tracing::info!(status = ?status, "export status");
        *self
            .monitor
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Export `items` into `sink`, always ending in a terminal status.
    ///
    /// `on_progress` runs on the encoder thread at most once per progress interval, plus once
    /// for the final frame. A cancelled or failed export aborts the sink and releases every
    /// lease it took before returning.
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    pub fn run(
        &mut self,
        items: &[TimelineItem],
        volumes: &TrackVolumes,
        sink: &mut dyn FrameSink,
        on_progress: &mut (dyn FnMut(&ExportProgress) + Send),
    ) -> ExportOutcome {
        let started = Instant::now();
        let fps = self.settings.fps();
        let total_frames = fps.secs_to_frames_ceil(items_duration(items));
        let mut frames_encoded = 0u64;

        let exported = self.export(items, volumes, sink, on_progress, started, &mut frames_encoded);
        let status = match exported {
            Ok(()) => ExportStatus::Completed,
            Err(Halt::Cancelled) => {
                sink.abort();
                ExportStatus::Cancelled
            }
            Err(Halt::Failed(e)) => {
                tracing::warn!(error = %e, "export failed");
                sink.abort();
                ExportStatus::Error(e.to_string())
            }
        };
        self.set_status(status.clone());

        let outcome = ExportOutcome {
            status,
            frames_encoded,
            total_frames,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            frames = outcome.frames_encoded,
            total = outcome.total_frames,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "export finished"
        );
        outcome
    }

    fn export(
        &self,
        items: &[TimelineItem],
        volumes: &TrackVolumes,
        sink: &mut dyn FrameSink,
        on_progress: &mut (dyn FnMut(&ExportProgress) + Send),
        started: Instant,
        frames_encoded: &mut u64,
    ) -> Result<(), Halt> {
        self.set_status(ExportStatus::Preparing);
        let cancel = self.monitor.cancel_token();
        self.settings.validate()?;

        let canvas = self.settings.canvas();
        let fps = self.settings.fps();
        let sample_rate = self.config.sample_rate;
        let duration = items_duration(items);
        let total_frames = fps.secs_to_frames_ceil(duration);
        if total_frames == 0 {
            return Err(CutlineError::validation("timeline is empty, nothing to export").into());
        }

        // A surface that cannot be allocated here will fail on every worker too.
        drop(Surface::new(canvas.width, canvas.height)?);
        let pool = build_thread_pool(self.settings.threads)?;

        // Reserve everything first so the loads overlap, then wait on each.
        let mut leases = HashMap::<ItemId, ResourceLease>::new();
        for item in items {
            if cancel.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            if leases.contains_key(&item.id) {
                continue;
            }
            if let Some(lease) = self.cache.reserve(item) {
                leases.insert(item.id, lease);
            }
        }
        for lease in leases.values_mut() {
            if cancel.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            lease.wait_ready();
        }
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        tracing::debug!(
            leased = leases.len(),
            ready = leases.values().filter(|l| l.resource().is_some()).count(),
            "export resources leased"
        );

        let cfg = SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps,
            sample_rate,
            channels: MIX_CHANNELS,
            bitrate: self.settings.preset.bitrate(),
        };
        sink.begin(cfg)?;

        self.set_status(ExportStatus::Rendering);
        let ctx = FrameCtx {
            items,
            volumes,
            leases: &leases,
            canvas,
            fps,
            sample_rate,
            cancel: &cancel,
        };
        let batch = self.settings.preset.batch_size().max(1) as u64;
        let cap = self.config.channel_capacity.max(1);
        let dynamics = self.settings.dynamics;
        let interval = self.config.progress_interval;

        let drained = std::thread::scope(|scope| -> Result<(), Halt> {
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
            let sink_ref: &mut dyn FrameSink = &mut *sink;
            let encoded: &mut u64 = &mut *frames_encoded;
            let cancel_enc = &cancel;

            let enc = scope.spawn(move || -> Result<(), Halt> {
                let mut order = ReorderBuffer::<FrameMsg>::new(0, total_frames);
                let mut master = MasterBus::new(dynamics, sample_rate);
                let mut throttle = ProgressThrottle::new(interval, started);
                while !order.is_complete() {
                    let Ok(msg) = rx.recv() else {
                        // Producers stopped early; they report why.
                        return Err(Halt::Cancelled);
                    };
                    if !order.insert(msg.idx, msg) {
                        return Err(CutlineError::encode("duplicate or out-of-range frame").into());
                    }
                    while let Some((idx, mut msg)) = order.pop_ready() {
                        if cancel_enc.is_cancelled() {
                            return Err(Halt::Cancelled);
                        }
                        master.process(&mut msg.audio);
                        sink_ref.push_frame(idx, &msg.frame, &msg.audio)?;
                        *encoded += 1;
                        if let Some(p) = throttle.observe(*encoded, total_frames, Instant::now()) {
                            on_progress(&p);
                        }
                    }
                }
                Ok(())
            });

            let mut produced: Result<(), Halt> = Ok(());
            let mut start = 0u64;
            while start < total_frames {
                if cancel.is_cancelled() {
                    produced = Err(Halt::Cancelled);
                    break;
                }
                let end = (start + batch).min(total_frames);
                if let Err(h) = render_batch(&pool, ctx, &tx, start, end) {
                    produced = Err(h);
                    break;
                }
                start = end;
            }
            drop(tx);

            let encoded_res = enc
                .join()
                .map_err(|_| Halt::Failed(CutlineError::encode("encoder thread panicked")))?;
            match (produced, encoded_res) {
                (_, Err(Halt::Failed(e))) => Err(Halt::Failed(e)),
                (Err(Halt::Failed(e)), _) => Err(Halt::Failed(e)),
                (Err(Halt::Cancelled), _) | (_, Err(Halt::Cancelled)) => Err(Halt::Cancelled),
                (Ok(()), Ok(())) => Ok(()),
            }
        });

        // A worker that lost the channel reports "not accepting"; cancellation takes precedence.
        match drained {
            Err(Halt::Failed(_)) if cancel.is_cancelled() => return Err(Halt::Cancelled),
            other => other?,
        }

        self.set_status(ExportStatus::Encoding);
        sink.end()?;
        drop(leases);
        Ok(())
    }
}

fn render_batch(
    pool: &rayon::ThreadPool,
    ctx: FrameCtx<'_>,
    tx: &mpsc::SyncSender<FrameMsg>,
    start: u64,
    end: u64,
) -> Result<(), Halt> {
    let tx = tx.clone();
    pool.install(|| {
        (start..end).into_par_iter().try_for_each_init(
            || Worker::new(ctx.canvas, ctx.sample_rate),
            move |worker, f| -> Result<(), Halt> {
                if ctx.cancel.is_cancelled() {
                    return Err(Halt::Cancelled);
                }
                let worker = worker
                    .as_mut()
                    .map_err(|e| Halt::Failed(CutlineError::setup(e.to_string())))?;
                let msg = render_one(worker, ctx, FrameIndex(f))?;
                tx.send(msg).map_err(|_| {
                    Halt::Failed(CutlineError::encode("encoder thread is not accepting frames"))
                })
            },
        )
    })
}

fn render_one(worker: &mut Worker, ctx: FrameCtx<'_>, idx: FrameIndex) -> CutlineResult<FrameMsg> {
    let t = ctx.fps.frame_to_secs(idx);
    let mut playheads = PlayheadSet::exact();
    let report = worker
        .compositor
        .render(t, ctx.items, ctx.leases, &mut playheads, &mut worker.surface)?;
    if report.skipped > 0 {
        tracing::debug!(frame = idx.0, skipped = report.skipped, "frame rendered with skipped layers");
    }
    let samples = samples_for_frame(idx, ctx.fps, ctx.sample_rate);
    let audio = worker.mix.render_block(
        t,
        samples,
        ctx.items,
        ctx.volumes,
        &mut playheads,
        ctx.leases,
    );
    Ok(FrameMsg {
        idx,
        frame: worker.surface.to_frame(),
        audio,
    })
}

fn build_thread_pool(threads: Option<usize>) -> CutlineResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(CutlineError::validation(
            "export threads must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("cutline-export-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CutlineError::setup(format!("failed to build render thread pool: {e}")))
}

impl std::fmt::Debug for ExportEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportEncoder")
            .field("settings", &self.settings)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/encoder.rs"]
mod tests;
