use crate::audio::pcm::AudioBlock;

/// Feed-forward compressor settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DynamicsParams {
    /// Level above which gain reduction starts, in dBFS.
    pub threshold_db: f32,
    /// Input/output slope above the threshold (`>= 1`).
    pub ratio: f32,
    /// Time to approach a larger reduction, in seconds.
    pub attack_secs: f32,
    /// Time to recover from a reduction, in seconds.
    pub release_secs: f32,
}

impl DynamicsParams {
    /// Gentle bus compressor.
    pub const COMPRESSOR: Self = Self {
        threshold_db: -24.0,
        ratio: 12.0,
        attack_secs: 0.003,
        release_secs: 0.25,
    };

    /// Brick-wall style peak limiter just under full scale.
    pub const LIMITER: Self = Self {
        threshold_db: -1.0,
        ratio: 100.0,
        attack_secs: 0.0005,
        release_secs: 0.05,
    };
}

/// Stateful gain computer; one instance must see the whole output stream in order.
#[derive(Clone, Debug)]
pub struct Dynamics {
    params: DynamicsParams,
    attack_coef: f32,
    release_coef: f32,
    reduction_db: f32,
}

impl Dynamics {
    /// Compressor for a stream at `sample_rate`.
    pub fn new(params: DynamicsParams, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let coef = |secs: f32| {
            if secs <= 0.0 {
                0.0
            } else {
                (-1.0 / (secs * sr)).exp()
            }
        };
        Self {
            params,
            attack_coef: coef(params.attack_secs),
            release_coef: coef(params.release_secs),
            reduction_db: 0.0,
        }
    }

    /// Current gain reduction in dB (`>= 0`).
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    /// Shape interleaved samples in place, linking all channels of a sample frame.
    pub fn process_interleaved(&mut self, samples: &mut [f32], channels: u16) {
        let ch = usize::from(channels.max(1));
        let slope = 1.0 - 1.0 / self.params.ratio.max(1.0);
        for frame in samples.chunks_mut(ch) {
            let level = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let level_db = 20.0 * level.max(1e-9).log10();
            let target = (level_db - self.params.threshold_db).max(0.0) * slope;

            let coef = if target > self.reduction_db {
                self.attack_coef
            } else {
                self.release_coef
            };
            self.reduction_db = coef * self.reduction_db + (1.0 - coef) * target;

            let gain = 10f32.powf(-self.reduction_db / 20.0);
            for s in frame {
                *s *= gain;
            }
        }
    }
}

/// Final stage of the mix: optional dynamics, then a hard clamp to `[-1, 1]`.
#[derive(Clone, Debug, Default)]
pub struct MasterBus {
    dynamics: Option<Dynamics>,
}

impl MasterBus {
    /// Master bus with optional dynamics at `sample_rate`.
    pub fn new(params: Option<DynamicsParams>, sample_rate: u32) -> Self {
        Self {
            dynamics: params.map(|p| Dynamics::new(p, sample_rate)),
        }
    }

    /// Process one block; blocks must arrive in stream order.
    pub fn process(&mut self, block: &mut AudioBlock) {
        if let Some(d) = self.dynamics.as_mut() {
            d.process_interleaved(&mut block.interleaved_f32, block.channels);
        }
        for s in &mut block.interleaved_f32 {
            *s = s.clamp(-1.0, 1.0);
        }
    }
}
