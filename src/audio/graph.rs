use std::collections::BTreeMap;

use crate::assets::playhead::PlayheadSet;
use crate::assets::resource::ResourceLookup;
use crate::audio::pcm::{AudioBlock, MIX_CHANNELS};
use crate::effects::evaluator::evaluate;
use crate::model::timeline::{ItemId, TimelineItem};
use crate::model::volume::TrackVolumes;

/// Routing of one audio-bearing item at the synced instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioRoute {
    /// Routed item.
    pub item: ItemId,
    /// Submix bus (the item's track index).
    pub bus: i32,
    /// Linear gain: `volume / 100 * alpha`, `0` while inactive.
    pub gain: f32,
    /// Whether the item's handle is playing.
    pub playing: bool,
    /// Source position presented by the item's playhead.
    pub source_secs: f64,
}

/// Routing state produced by [`AudioMixGraph::sync`], ordered by item id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioMixState {
    /// Timeline time of the sync.
    pub time: f64,
    /// One route per audio-bearing item on the timeline.
    pub routes: Vec<AudioRoute>,
}

impl AudioMixState {
    /// Route of `item`, if it is audio-bearing.
    pub fn route(&self, item: ItemId) -> Option<&AudioRoute> {
        self.routes.iter().find(|r| r.item == item)
    }
}

/// Item gains, per-track submix buses and PCM rendering for export.
///
/// Dynamics are stateful and applied downstream on the ordered stream, see
/// [`MasterBus`](crate::audio::dynamics::MasterBus).
#[derive(Clone, Debug)]
pub struct AudioMixGraph {
    sample_rate: u32,
    state: AudioMixState,
}

impl AudioMixGraph {
    /// Graph mixing at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: AudioMixState::default(),
        }
    }

    /// Mixing sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Last synced routing state.
    pub fn state(&self) -> &AudioMixState {
        &self.state
    }

    /// Bring every audio-bearing item's route in line with timeline time `t`.
    ///
    /// Active items are repositioned under the playhead tolerance and set playing with gain
    /// `volume × alpha`; inactive items are paused with gain `0`.
    pub fn sync(
        &mut self,
        t: f64,
        items: &[TimelineItem],
        volumes: &TrackVolumes,
        playheads: &mut PlayheadSet,
    ) -> &AudioMixState {
        let alpha = evaluate(items, t).alpha as f32;
        let mut routes = Vec::new();
        for item in items.iter().filter(|it| it.media.kind.is_audio_bearing()) {
            let route = if item.is_active_at(t) {
                let source_secs = playheads.sync(item.id, item.source_time_at(t));
                playheads.entry(item.id).play();
                AudioRoute {
                    item: item.id,
                    bus: item.track,
                    gain: volumes.gain(item.id) * alpha,
                    playing: true,
                    source_secs,
                }
            } else {
                let source_secs = match playheads.get(item.id) {
                    Some(_) => {
                        let head = playheads.entry(item.id);
                        head.pause();
                        head.position()
                    }
                    None => 0.0,
                };
                AudioRoute {
                    item: item.id,
                    bus: item.track,
                    gain: 0.0,
                    playing: false,
                    source_secs,
                }
            };
            routes.push(route);
        }
        routes.sort_by_key(|r| r.item);
        self.state = AudioMixState { time: t, routes };
        &self.state
    }

    /// Sync to `t` and mix `n_frames` stereo sample frames starting there.
    ///
    /// Each playing route reads its source from the synced position onward; routes are summed
    /// per bus and the buses summed to the output. The result is not clamped.
    pub fn render_block(
        &mut self,
        t: f64,
        n_frames: usize,
        items: &[TimelineItem],
        volumes: &TrackVolumes,
        playheads: &mut PlayheadSet,
        resources: &dyn ResourceLookup,
    ) -> AudioBlock {
        self.sync(t, items, volumes, playheads);
        let ch = usize::from(MIX_CHANNELS);
        let sr = f64::from(self.sample_rate.max(1));
        let mut buses = BTreeMap::<i32, Vec<f32>>::new();

        for route in self.state.routes.iter().filter(|r| r.playing && r.gain > 0.0) {
            let Some(resource) = resources.ready(route.item) else {
                continue;
            };
            let Some(pcm) = resource.audio() else {
                continue;
            };
            let bus = buses
                .entry(route.bus)
                .or_insert_with(|| vec![0.0; n_frames * ch]);
            for i in 0..n_frames {
                let (l, r) = pcm.stereo_at(route.source_secs + i as f64 / sr);
                bus[i * ch] += l * route.gain;
                bus[i * ch + 1] += r * route.gain;
            }
        }

        let mut out = AudioBlock::silent(self.sample_rate, MIX_CHANNELS, n_frames);
        for bus in buses.values() {
            for (o, s) in out.interleaved_f32.iter_mut().zip(bus) {
                *o += *s;
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/graph.rs"]
mod tests;
