use anyhow::Context;

use crate::assets::resource::PreparedImage;
use crate::foundation::error::CutlineResult;
use crate::foundation::math::premultiply_rgba8_in_place;

/// Decode an encoded still (PNG, JPEG, ...) into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> CutlineResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    PreparedImage::new(width, height, rgba8_premul)
}
