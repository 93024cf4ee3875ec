use crate::foundation::core::{Affine, Canvas, Rect, Vec2};

/// Per-track positional offset in pixels, applied on both axes and multiplied by the track index.
///
/// Layers are stacked with a small offset rather than alpha-blended onto each other, so higher
/// tracks stay visibly distinct.
pub const TRACK_OFFSET_PX: f64 = 20.0;

/// Largest rectangle with the source's aspect ratio that fits inside `canvas`, centered.
pub fn fit_inside(src_width: u32, src_height: u32, canvas: Canvas) -> Rect {
    let (sw, sh) = (f64::from(src_width), f64::from(src_height));
    let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
    if sw <= 0.0 || sh <= 0.0 {
        return Rect::ZERO;
    }
    let scale = (cw / sw).min(ch / sh);
    let (w, h) = (sw * scale, sh * scale);
    let x0 = (cw - w) / 2.0;
    let y0 = (ch - h) / 2.0;
    Rect::new(x0, y0, x0 + w, y0 + h)
}

/// Offset of a layer on `track`.
pub fn track_offset(track: i32) -> Vec2 {
    let d = TRACK_OFFSET_PX * f64::from(track);
    Vec2::new(d, d)
}

/// Uniform scale by `zoom` pinned at the canvas center.
pub fn zoom_about_center(zoom: f64, canvas: Canvas) -> Affine {
    if zoom == 1.0 {
        return Affine::IDENTITY;
    }
    let c = canvas.center().to_vec2();
    Affine::translate(c) * Affine::scale(zoom) * Affine::translate(-c)
}

/// Full transform mapping source pixel space of a `src_width x src_height` picture on `track`
/// into canvas space.
pub fn layer_transform(
    src_width: u32,
    src_height: u32,
    track: i32,
    zoom: f64,
    canvas: Canvas,
) -> Affine {
    let rect = fit_inside(src_width, src_height, canvas) + track_offset(track);
    let sx = rect.width() / f64::from(src_width.max(1));
    let sy = rect.height() / f64::from(src_height.max(1));
    zoom_about_center(zoom, canvas)
        * Affine::translate(rect.origin().to_vec2())
        * Affine::scale_non_uniform(sx, sy)
}
