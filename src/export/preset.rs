use std::str::FromStr;

use crate::audio::dynamics::DynamicsParams;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Export quality tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// 480p, 2.5 Mbps, small batches.
    Fast,
    /// 720p, 5 Mbps.
    #[default]
    Balanced,
    /// 1080p, 8 Mbps, large batches.
    High,
}

impl QualityPreset {
    /// Length of the output's shorter side in pixels.
    pub fn short_side(self) -> u32 {
        match self {
            Self::Fast => 480,
            Self::Balanced => 720,
            Self::High => 1080,
        }
    }

    /// Target video bitrate in bits per second.
    pub fn bitrate(self) -> u32 {
        match self {
            Self::Fast => 2_500_000,
            Self::Balanced => 5_000_000,
            Self::High => 8_000_000,
        }
    }

    /// Frames rendered in parallel per batch.
    pub fn batch_size(self) -> usize {
        match self {
            Self::Fast => 5,
            Self::Balanced => 15,
            Self::High => 30,
        }
    }
}

impl FromStr for QualityPreset {
    type Err = CutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            other => Err(CutlineError::validation(format!(
                "unknown quality preset '{other}' (expected fast, balanced or high)"
            ))),
        }
    }
}

/// Output aspect ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape.
    #[default]
    #[serde(rename = "16:9")]
    Landscape16x9,
    /// 4:3 landscape.
    #[serde(rename = "4:3")]
    Standard4x3,
    /// 9:16 portrait.
    #[serde(rename = "9:16")]
    Portrait9x16,
}

impl AspectRatio {
    /// `(width, height)` ratio terms.
    pub fn ratio(self) -> (u32, u32) {
        match self {
            Self::Landscape16x9 => (16, 9),
            Self::Standard4x3 => (4, 3),
            Self::Portrait9x16 => (9, 16),
        }
    }

    /// Even pixel dimensions whose shorter side is `short_side`.
    pub fn canvas(self, short_side: u32) -> Canvas {
        let (w, h) = self.ratio();
        let (short, long) = (w.min(h), w.max(h));
        let long_side = even(f64::from(short_side) * f64::from(long) / f64::from(short));
        let short_side = even(f64::from(short_side));
        if w >= h {
            Canvas {
                width: long_side,
                height: short_side,
            }
        } else {
            Canvas {
                width: short_side,
                height: long_side,
            }
        }
    }
}

fn even(px: f64) -> u32 {
    ((px / 2.0).round() as u32).max(1) * 2
}

impl FromStr for AspectRatio {
    type Err = CutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(Self::Landscape16x9),
            "4:3" => Ok(Self::Standard4x3),
            "9:16" => Ok(Self::Portrait9x16),
            other => Err(CutlineError::validation(format!(
                "unknown aspect ratio '{other}' (expected 16:9, 4:3 or 9:16)"
            ))),
        }
    }
}

/// Output frame rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    /// 24 fps.
    Fps24,
    /// 30 fps.
    #[default]
    Fps30,
    /// 60 fps.
    Fps60,
}

impl FrameRate {
    /// Rational frame rate.
    pub fn fps(self) -> Fps {
        Fps {
            num: u32::from(self),
            den: 1,
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> Self {
        match rate {
            FrameRate::Fps24 => 24,
            FrameRate::Fps30 => 30,
            FrameRate::Fps60 => 60,
        }
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = CutlineError;

    fn try_from(fps: u32) -> Result<Self, Self::Error> {
        match fps {
            24 => Ok(Self::Fps24),
            30 => Ok(Self::Fps30),
            60 => Ok(Self::Fps60),
            other => Err(CutlineError::validation(format!(
                "unsupported frame rate {other} (expected 24, 30 or 60)"
            ))),
        }
    }
}

impl FromStr for FrameRate {
    type Err = CutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fps: u32 = s
            .parse()
            .map_err(|_| CutlineError::validation(format!("frame rate '{s}' is not a number")))?;
        Self::try_from(fps)
    }
}

/// Everything the user picks in the export dialog.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Quality tier.
    pub preset: QualityPreset,
    /// Output aspect ratio.
    pub aspect: AspectRatio,
    /// Output frame rate.
    pub frame_rate: FrameRate,
    /// Render worker threads; `None` uses one per core.
    pub threads: Option<usize>,
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Master bus dynamics; `None` only clamps.
    pub dynamics: Option<DynamicsParams>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            preset: QualityPreset::default(),
            aspect: AspectRatio::default(),
            frame_rate: FrameRate::default(),
            threads: None,
            overwrite: true,
            dynamics: Some(DynamicsParams::LIMITER),
        }
    }
}

impl ExportSettings {
    /// Output dimensions.
    pub fn canvas(&self) -> Canvas {
        self.aspect.canvas(self.preset.short_side())
    }

    /// Output frame rate.
    pub fn fps(&self) -> Fps {
        self.frame_rate.fps()
    }

    /// Reject settings no export could run with.
    pub fn validate(&self) -> CutlineResult<()> {
        if self.threads == Some(0) {
            return Err(CutlineError::validation("export threads must be >= 1 when set"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/preset.rs"]
mod tests;
