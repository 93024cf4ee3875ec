use crate::foundation::error::{CutlineError, CutlineResult};

/// Desaturate premultiplied RGBA8 in place using Rec. 709 luma weights.
///
/// Weights are applied to premultiplied channels directly; luma is linear in the channels so
/// the result stays a valid premultiplied pixel.
pub fn grayscale_in_place(rgba_premul: &mut [u8]) {
    for px in rgba_premul.chunks_exact_mut(4) {
        let y = (2126 * u32::from(px[0]) + 7152 * u32::from(px[1]) + 722 * u32::from(px[2])
            + 5000)
            / 10_000;
        let y = y.min(u32::from(px[3])) as u8;
        px[0] = y;
        px[1] = y;
        px[2] = y;
    }
}

/// Gaussian blur of premultiplied RGBA8 with standard deviation `sigma_px`.
///
/// The kernel radius is `ceil(3 * sigma)`; `sigma_px <= 0` is a no-op. Edges clamp.
pub fn blur_in_place(
    rgba_premul: &mut [u8],
    width: u32,
    height: u32,
    sigma_px: f64,
    scratch: &mut Vec<u8>,
) -> CutlineResult<()> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| CutlineError::render("blur buffer size overflow"))?;
    if rgba_premul.len() != expected_len {
        return Err(CutlineError::render(
            "blur expects a buffer matching width*height*4",
        ));
    }
    if !sigma_px.is_finite() || sigma_px <= 0.0 || width == 0 || height == 0 {
        return Ok(());
    }

    let radius = (sigma_px * 3.0).ceil() as u32;
    let kernel = gaussian_kernel_q16(radius, sigma_px)?;
    scratch.clear();
    scratch.resize(expected_len, 0);

    horizontal_pass(rgba_premul, scratch, width, height, &kernel);
    vertical_pass(scratch, rgba_premul, width, height, &kernel);
    Ok(())
}

fn gaussian_kernel_q16(radius: u32, sigma: f64) -> CutlineResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(CutlineError::render("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Fold the rounding residue into the center tap so the kernel sums to exactly 1.0.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/effects/filter.rs"]
mod tests;
