use crate::foundation::math::lerp;
use crate::model::media::EffectType;
use crate::model::timeline::{TimelineItem, active_effects_at};

/// Upper bound of the blur radius in pixels.
pub const MAX_BLUR_PX: f64 = 10.0;
/// Lower bound of the composed zoom factor.
pub const MIN_ZOOM: f64 = 0.1;
/// Upper bound of the composed zoom factor.
pub const MAX_ZOOM: f64 = 5.0;

/// Effect parameters composed from every effect item active at one instant.
///
/// Both the preview and the export driver obtain these exclusively through [`evaluate`], so the
/// two paths cannot disagree about what a frame looks or sounds like.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectParams {
    /// Global opacity in `[0, 1]`. Also scales audio gain.
    pub alpha: f64,
    /// Desaturate drawn layers.
    pub grayscale: bool,
    /// Blur radius in `[0, 10]` pixels.
    pub blur_px: f64,
    /// Uniform scale about the surface center in `[0.1, 5.0]`.
    pub zoom_scale: f64,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl EffectParams {
    /// Parameters when no effect is active.
    pub const IDENTITY: Self = Self {
        alpha: 1.0,
        grayscale: false,
        blur_px: 0.0,
        zoom_scale: 1.0,
    };

    /// Return `true` when drawing with these parameters changes nothing.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Compose the effect parameters at timeline time `t`.
///
/// Pure: only the active effect items of `items` are read, and identical `(t, items)` always
/// yield identical output. Non-effect items are ignored.
pub fn evaluate(items: &[TimelineItem], t: f64) -> EffectParams {
    let mut alpha = 1.0f64;
    let mut grayscale = false;
    let mut blur_px = 0.0f64;
    let mut zoom = 1.0f64;

    for item in active_effects_at(items, t) {
        let Some(effect) = item.media.effect else {
            continue;
        };
        let progress = item.progress_at(t);
        let intensity = item.media.intensity_fraction();

        match effect {
            EffectType::FadeIn => alpha *= progress.clamp(0.0, 1.0),
            EffectType::FadeOut => alpha *= (1.0 - progress).clamp(0.0, 1.0),
            EffectType::BlackWhite => grayscale = true,
            EffectType::Blur => blur_px = blur_px.max(intensity * MAX_BLUR_PX),
            EffectType::ZoomIn => {
                let target = 1.0 + intensity * 2.0;
                zoom *= lerp(1.0, target, progress.clamp(0.0, 1.0));
            }
            EffectType::ZoomOut => {
                let target = 1.0 - intensity * 0.8;
                zoom *= lerp(1.0, target, progress.clamp(0.0, 1.0));
            }
        }
    }

    EffectParams {
        alpha: alpha.clamp(0.0, 1.0),
        grayscale,
        blur_px: blur_px.clamp(0.0, MAX_BLUR_PX),
        zoom_scale: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/evaluator.rs"]
mod tests;
