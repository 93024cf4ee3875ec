use crate::foundation::error::{CutlineError, CutlineResult};

/// Stable identifier of an imported or generated [`MediaFile`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct MediaId(pub u64);

/// What a media file contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Time-based picture, usually with sound.
    Video,
    /// Time-based sound only.
    Audio,
    /// Still picture.
    Image,
    /// Resource-less transform applied to concurrently active media.
    Effect,
}

impl MediaKind {
    /// Kinds that carry a decodable resource.
    pub fn is_decodable(self) -> bool {
        !matches!(self, Self::Effect)
    }

    /// Kinds that produce pixels.
    pub fn is_visual(self) -> bool {
        matches!(self, Self::Video | Self::Image)
    }

    /// Kinds routed through the audio mix graph.
    pub fn is_audio_bearing(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }

    /// Kinds whose handle has a playhead that follows timeline time.
    pub fn is_time_based(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

/// Named transform carried by an effect item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Opacity ramps 0 → 1 over the item.
    FadeIn,
    /// Opacity ramps 1 → 0 over the item.
    FadeOut,
    /// Desaturate everything drawn while active.
    BlackWhite,
    /// Scale ramps up towards `1 + 2 * intensity`.
    ZoomIn,
    /// Scale ramps down towards `1 - 0.8 * intensity`.
    ZoomOut,
    /// Gaussian blur of `10 * intensity` pixels.
    Blur,
}

/// Intensity used when an effect was created without one.
pub const DEFAULT_EFFECT_INTENSITY: f64 = 50.0;

/// An imported media file or a generated effect descriptor. Immutable after creation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaFile {
    /// Stable id.
    pub id: MediaId,
    /// Content kind.
    pub kind: MediaKind,
    /// Resolved source locator (relative to the project root). Empty for effects.
    #[serde(default)]
    pub source: String,
    /// Probed nominal duration in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Effect transform, required when `kind == Effect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<EffectType>,
    /// Effect intensity in `0..=100`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

impl MediaFile {
    /// Describe a decodable media file.
    pub fn media(id: MediaId, kind: MediaKind, source: impl Into<String>, duration: f64) -> Self {
        Self {
            id,
            kind,
            source: source.into(),
            duration,
            effect: None,
            intensity: None,
        }
    }

    /// Describe an effect.
    pub fn effect(id: MediaId, effect: EffectType, intensity: f64) -> Self {
        Self {
            id,
            kind: MediaKind::Effect,
            source: String::new(),
            duration: 0.0,
            effect: Some(effect),
            intensity: Some(intensity),
        }
    }

    /// Intensity as a `0..=1` fraction.
    pub fn intensity_fraction(&self) -> f64 {
        self.intensity.unwrap_or(DEFAULT_EFFECT_INTENSITY).clamp(0.0, 100.0) / 100.0
    }

    /// Validate the record as supplied by the import component.
    pub fn validate(&self) -> CutlineResult<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(CutlineError::validation(format!(
                "media {} has invalid duration {}",
                self.id.0, self.duration
            )));
        }
        match self.kind {
            MediaKind::Effect => {
                if self.effect.is_none() {
                    return Err(CutlineError::validation(format!(
                        "effect media {} has no effect type",
                        self.id.0
                    )));
                }
                if let Some(i) = self.intensity
                    && !(0.0..=100.0).contains(&i)
                {
                    return Err(CutlineError::validation(format!(
                        "effect media {} intensity {i} outside 0..=100",
                        self.id.0
                    )));
                }
            }
            _ => {
                if self.source.trim().is_empty() {
                    return Err(CutlineError::validation(format!(
                        "media {} has an empty source locator",
                        self.id.0
                    )));
                }
            }
        }
        Ok(())
    }
}
