//! Cutline is a multi-track timeline compositor with two drivers over one shared core.
//!
//! - Build a [`Timeline`] (or load a [`Project`]) of video, audio, image and effect items
//! - Back it with a [`MediaResourceCache`] and a [`MediaLoader`]
//! - Preview it live with a [`PlaybackSynchronizer`], or export it frame-exact with an
//!   [`ExportEncoder`] into a [`FrameSink`]
//!
//! Both drivers evaluate effects with the same evaluator and draw with the same
//! [`FrameCompositor`], so a preview seek and an export frame at the same time render the
//! same pixels.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod assets;
pub(crate) mod audio;
/// Engine-wide tunables.
pub mod config;
pub(crate) mod effects;
/// Encode sinks.
pub mod encode;
/// Offline export driver.
pub mod export;
pub(crate) mod model;
/// Real-time preview driver.
pub mod playback;
/// Frame rendering.
pub mod render;

pub use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, Point, Rect, Size, Vec2};
pub use crate::foundation::error::{CutlineError, CutlineResult};

pub use crate::assets::cache::{CacheStats, MediaResourceCache, ResourceLease};
pub use crate::assets::decode::decode_image;
pub use crate::assets::loader::{FsMediaLoader, MediaLoader};
pub use crate::assets::media::{FfmpegFrameSource, VideoSourceInfo};
pub use crate::assets::playhead::{Playhead, PlayheadSet};
pub use crate::assets::resource::{
    AudioPcm, InMemoryFrames, MediaResource, PreparedImage, ResourceLookup, VideoFrameSource,
};
pub use crate::audio::dynamics::{Dynamics, DynamicsParams, MasterBus};
pub use crate::audio::graph::{AudioMixGraph, AudioMixState, AudioRoute};
pub use crate::audio::pcm::{AudioBlock, MIX_CHANNELS, samples_for_frame};
pub use crate::config::{EngineConfig, SEEK_TOLERANCE_SECS};
pub use crate::effects::evaluator::{EffectParams, evaluate as evaluate_effects};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::export::cancel::CancelToken;
pub use crate::export::encoder::{ExportEncoder, ExportMonitor, ExportOutcome, ExportStatus};
pub use crate::export::preset::{AspectRatio, ExportSettings, FrameRate, QualityPreset};
pub use crate::export::progress::{ExportProgress, ProgressThrottle};
pub use crate::model::media::{EffectType, MediaFile, MediaId, MediaKind};
pub use crate::model::project::{ItemDef, Project};
pub use crate::model::timeline::{
    ItemId, ItemSnapshot, Timeline, TimelineItem, Track, TrackKind, active_effects_at,
    active_media_at, items_duration,
};
pub use crate::model::volume::TrackVolumes;
pub use crate::playback::synchronizer::{PlaybackState, PlaybackSynchronizer};
pub use crate::render::backend::{FrameRGBA, Surface};
pub use crate::render::compositor::{FrameCompositor, FrameReport};
