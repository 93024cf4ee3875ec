use crate::foundation::core::Canvas;
use crate::foundation::error::{CutlineError, CutlineResult};

/// A rendered frame as RGBA8 pixels.
///
/// Compositor output is always opaque (drawn over black), so premultiplied and straight alpha
/// coincide; the flag is kept explicit at API boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }
}

/// Render target owned by a driver: the composited frame plus the raster scratch state reused
/// across frames.
pub struct Surface {
    canvas: Canvas,
    pub(crate) frame: Vec<u8>,
    pub(crate) layer: vello_cpu::Pixmap,
    pub(crate) ctx: vello_cpu::RenderContext,
    pub(crate) blur_scratch: Vec<u8>,
}

impl Surface {
    /// Allocate a surface. Zero or oversized dimensions are a setup error.
    pub fn new(width: u32, height: u32) -> CutlineResult<Self> {
        if width == 0 || height == 0 {
            return Err(CutlineError::setup(format!(
                "render surface {width}x{height} has a zero dimension"
            )));
        }
        let w: u16 = width
            .try_into()
            .map_err(|_| CutlineError::setup("render surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| CutlineError::setup("render surface height exceeds u16"))?;
        let canvas = Canvas { width, height };
        Ok(Self {
            canvas,
            frame: opaque_black(canvas.rgba8_len()),
            layer: vello_cpu::Pixmap::new(w, h),
            ctx: vello_cpu::RenderContext::new(w, h),
            blur_scratch: Vec::new(),
        })
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// The last composited frame (opaque black before the first render).
    pub fn pixels(&self) -> &[u8] {
        &self.frame
    }

    /// Copy the current contents out as a frame.
    pub fn to_frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.frame.clone(),
            premultiplied: true,
        }
    }

    pub(crate) fn clear_to_black(&mut self) {
        for px in self.frame.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface").field("canvas", &self.canvas).finish()
    }
}

fn opaque_black(len: usize) -> Vec<u8> {
    [0u8, 0, 0, 255].repeat(len / 4)
}
