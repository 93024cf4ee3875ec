use std::collections::HashMap;
use std::sync::Arc;

use super::*;
use crate::assets::resource::{AudioPcm, MediaResource};
use crate::model::media::{EffectType, MediaFile, MediaId, MediaKind};

const SR: u32 = 1_000;

fn clip(id: u64, kind: MediaKind, track: i32, start: f64, duration: f64) -> TimelineItem {
    TimelineItem {
        id: ItemId(id),
        media: Arc::new(MediaFile::media(MediaId(id), kind, "a.wav", duration)),
        start,
        duration,
        track,
        media_start_offset: 0.0,
    }
}

fn constant(level: f32, secs: usize) -> Arc<MediaResource> {
    Arc::new(MediaResource::Audio(AudioPcm {
        sample_rate: SR,
        channels: 2,
        interleaved_f32: Arc::new(vec![level; secs * SR as usize * 2]),
    }))
}

fn ramp(secs: usize) -> Arc<MediaResource> {
    let frames = secs * SR as usize;
    let mut pcm = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let v = i as f32 / frames as f32;
        pcm.extend_from_slice(&[v, v]);
    }
    Arc::new(MediaResource::Audio(AudioPcm {
        sample_rate: SR,
        channels: 2,
        interleaved_f32: Arc::new(pcm),
    }))
}

#[test]
fn gain_is_volume_times_alpha() {
    let items = vec![
        clip(1, MediaKind::Audio, 0, 0.0, 4.0),
        TimelineItem {
            id: ItemId(9),
            media: Arc::new(MediaFile::effect(MediaId(9), EffectType::FadeIn, 50.0)),
            start: 0.0,
            duration: 2.0,
            track: 0,
            media_start_offset: 0.0,
        },
    ];
    let mut volumes = TrackVolumes::new();
    volumes.set(ItemId(1), 150);
    let mut graph = AudioMixGraph::new(SR);
    let mut heads = PlayheadSet::exact();

    let state = graph.sync(1.0, &items, &volumes, &mut heads);
    let route = state.route(ItemId(1)).unwrap();
    assert!((route.gain - 0.75).abs() < 1e-6);
    assert!(route.playing);
    assert_eq!(route.bus, 0);
}

#[test]
fn inactive_items_are_paused_and_silent() {
    let items = vec![clip(1, MediaKind::Audio, 0, 0.0, 1.0)];
    let volumes = TrackVolumes::new();
    let mut graph = AudioMixGraph::new(SR);
    let mut heads = PlayheadSet::new(0.08);

    graph.sync(0.5, &items, &volumes, &mut heads);
    assert!(heads.get(ItemId(1)).unwrap().is_playing());

    let state = graph.sync(1.0, &items, &volumes, &mut heads);
    let route = state.route(ItemId(1)).unwrap();
    assert_eq!(route.gain, 0.0);
    assert!(!route.playing);
    assert!(!heads.get(ItemId(1)).unwrap().is_playing());

    let res = HashMap::from([(ItemId(1), constant(0.5, 2))]);
    let block = graph.render_block(1.5, 100, &items, &volumes, &mut heads, &res);
    assert_eq!(block.peak(), 0.0);
}

#[test]
fn images_and_effects_are_not_routed() {
    let items = vec![
        clip(1, MediaKind::Image, 0, 0.0, 1.0),
        clip(2, MediaKind::Video, 0, 0.0, 1.0),
    ];
    let mut graph = AudioMixGraph::new(SR);
    let state = graph.sync(0.5, &items, &TrackVolumes::new(), &mut PlayheadSet::exact());
    assert_eq!(state.routes.len(), 1);
    assert_eq!(state.routes[0].item, ItemId(2));
}

#[test]
fn buses_sum_and_reads_follow_media_offset() {
    let mut a = clip(1, MediaKind::Audio, 0, 1.0, 4.0);
    a.media_start_offset = 0.5;
    let b = clip(2, MediaKind::Audio, 1, 0.0, 4.0);
    let items = vec![b, a];
    let res = HashMap::from([(ItemId(1), ramp(4)), (ItemId(2), constant(0.25, 4))]);
    let mut graph = AudioMixGraph::new(SR);
    let mut heads = PlayheadSet::exact();

    // Item 1 reads source 0.5 + (2.0 - 1.0) = 1.5s of a 4s ramp => 0.375.
    let block = graph.render_block(2.0, 10, &items, &TrackVolumes::new(), &mut heads, &res);
    assert_eq!(block.frames(), 10);
    assert!((block.interleaved_f32[0] - (0.375 + 0.25)).abs() < 1e-4);
    assert!(block.interleaved_f32[18] > block.interleaved_f32[0]);
}

#[test]
fn missing_audio_resource_is_silent() {
    let items = vec![clip(1, MediaKind::Audio, 0, 0.0, 4.0)];
    let mut graph = AudioMixGraph::new(SR);
    let block = graph.render_block(
        1.0,
        50,
        &items,
        &TrackVolumes::new(),
        &mut PlayheadSet::exact(),
        &HashMap::<ItemId, Arc<MediaResource>>::new(),
    );
    assert_eq!(block.interleaved_f32.len(), 100);
    assert_eq!(block.peak(), 0.0);
}
