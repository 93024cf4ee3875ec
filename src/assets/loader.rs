use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::assets::decode::decode_image;
use crate::assets::media::{FfmpegFrameSource, decode_audio_f32_stereo, probe_video};
use crate::assets::resource::MediaResource;
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::media::{MediaFile, MediaKind};

/// Decoding seam used by the resource cache.
///
/// `load` runs on a background thread and may take arbitrarily long; the cache bounds every wait.
pub trait MediaLoader: Send + Sync {
    /// Decode `media` into a ready handle.
    fn load(&self, media: &MediaFile) -> CutlineResult<MediaResource>;
}

impl<F> MediaLoader for F
where
    F: Fn(&MediaFile) -> CutlineResult<MediaResource> + Send + Sync,
{
    fn load(&self, media: &MediaFile) -> CutlineResult<MediaResource> {
        self(media)
    }
}

/// Loader reading sources from disk relative to a project root.
#[derive(Clone, Debug)]
pub struct FsMediaLoader {
    root: PathBuf,
    sample_rate: u32,
    video_frame_cache: usize,
}

impl FsMediaLoader {
    /// Loader resolving relative locators against `root`.
    pub fn new(root: impl Into<PathBuf>, sample_rate: u32, video_frame_cache: usize) -> Self {
        Self {
            root: root.into(),
            sample_rate,
            video_frame_cache,
        }
    }

    /// Absolute path for a source locator.
    pub fn resolve(&self, source: &str) -> PathBuf {
        let p = Path::new(source);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl MediaLoader for FsMediaLoader {
    fn load(&self, media: &MediaFile) -> CutlineResult<MediaResource> {
        let path = self.resolve(&media.source);
        match media.kind {
            MediaKind::Image => {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("read image '{}'", path.display()))
                    .map_err(|e| CutlineError::resource_load(format!("{e:#}")))?;
                Ok(MediaResource::Image(decode_image(&bytes)?))
            }
            MediaKind::Video => {
                let info = probe_video(&path)?;
                let audio = if info.has_audio {
                    Some(decode_audio_f32_stereo(&path, self.sample_rate)?)
                } else {
                    None
                };
                Ok(MediaResource::Video {
                    frames: Arc::new(FfmpegFrameSource::new(info, self.video_frame_cache)),
                    audio,
                })
            }
            MediaKind::Audio => Ok(MediaResource::Audio(decode_audio_f32_stereo(
                &path,
                self.sample_rate,
            )?)),
            MediaKind::Effect => Err(CutlineError::resource_load(format!(
                "media {} is an effect and has no resource",
                media.id.0
            ))),
        }
    }
}
