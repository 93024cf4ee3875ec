use std::sync::Arc;

use crate::assets::playhead::PlayheadSet;
use crate::assets::resource::{PreparedImage, ResourceLookup};
use crate::effects::evaluator::{EffectParams, evaluate};
use crate::effects::filter;
use crate::foundation::core::Affine;
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::timeline::{TimelineItem, active_media_at};
use crate::render::backend::Surface;
use crate::render::composite::over_in_place;
use crate::render::layout::layer_transform;

/// What one `render` call did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    /// Layers drawn.
    pub drawn: usize,
    /// Visual layers skipped (resource absent or draw failure).
    pub skipped: usize,
    /// Effect parameters the frame was drawn with.
    pub params: EffectParams,
}

/// Draws the frame at a timeline instant. Shared by preview and export.
///
/// Layers are drawn bottom-up by track index, each into a transparent scratch layer that gets
/// the frame-wide grayscale/blur filters before being composited over the frame with the global
/// alpha. Output is a pure function of `(t, items, resource readiness, playhead positions)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCompositor;

impl FrameCompositor {
    /// Create a compositor.
    pub fn new() -> Self {
        Self
    }

    /// Render timeline time `t` into `surface`.
    ///
    /// Time-based layers present the position of their playhead in `playheads`, which is synced
    /// to `media_start_offset + (t - start)` first. A layer whose resource is not ready or whose
    /// draw fails is skipped with a diagnostic; only surface-level failures are returned.
    #[tracing::instrument(level = "trace", skip_all, fields(t = t))]
    pub fn render(
        &self,
        t: f64,
        items: &[TimelineItem],
        resources: &dyn ResourceLookup,
        playheads: &mut PlayheadSet,
        surface: &mut Surface,
    ) -> CutlineResult<FrameReport> {
        surface.clear_to_black();
        let params = evaluate(items, t);
        let canvas = surface.canvas();

        let mut report = FrameReport {
            drawn: 0,
            skipped: 0,
            params,
        };

        for item in active_media_at(items, t) {
            if !item.media.kind.is_visual() {
                continue;
            }
            let Some(resource) = resources.ready(item.id) else {
                tracing::debug!(item = item.id.0, t, "resource not ready, layer skipped");
                report.skipped += 1;
                continue;
            };

            let source_secs = if item.media.kind.is_time_based() {
                playheads.sync(item.id, item.source_time_at(t))
            } else {
                0.0
            };

            let picture = match resource.picture_at(source_secs) {
                Some(Ok(img)) => img,
                Some(Err(e)) => {
                    tracing::warn!(item = item.id.0, t, error = %e, "layer decode failed, skipped");
                    report.skipped += 1;
                    continue;
                }
                None => continue,
            };

            let transform =
                layer_transform(picture.width, picture.height, item.track, params.zoom_scale, canvas);
            match draw_layer(surface, &picture, transform, &params) {
                Ok(()) => report.drawn += 1,
                Err(e) if e.is_fatal_for_export() => return Err(e),
                Err(e) => {
                    tracing::warn!(item = item.id.0, t, error = %e, "layer draw failed, skipped");
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }
}

fn draw_layer(
    surface: &mut Surface,
    picture: &PreparedImage,
    transform: Affine,
    params: &EffectParams,
) -> CutlineResult<()> {
    let canvas = surface.canvas();
    let pixmap = image_premul_bytes_to_pixmap(&picture.rgba8_premul, picture.width, picture.height)?;
    let (w, h) = (f64::from(picture.width), f64::from(picture.height));

    clear_pixmap(&mut surface.layer);
    let ctx = &mut surface.ctx;
    ctx.reset();
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    });
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
    ctx.flush();
    ctx.render_to_pixmap(&mut surface.layer);

    let layer = surface.layer.data_as_u8_slice_mut();
    if params.grayscale {
        filter::grayscale_in_place(layer);
    }
    if params.blur_px > 0.0 {
        filter::blur_in_place(
            layer,
            canvas.width,
            canvas.height,
            params.blur_px,
            &mut surface.blur_scratch,
        )?;
    }

    over_in_place(
        &mut surface.frame,
        surface.layer.data_as_u8_slice(),
        params.alpha as f32,
    )
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap) {
    pixmap.data_as_u8_slice_mut().fill(0);
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> CutlineResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CutlineError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CutlineError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(CutlineError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        may_have_opacities |= px[3] != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
