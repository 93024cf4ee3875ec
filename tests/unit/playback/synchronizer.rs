use std::time::Duration;

use super::*;
use crate::assets::loader::MediaLoader;
use crate::assets::resource::{InMemoryFrames, MediaResource, PreparedImage};
use crate::model::media::{MediaFile, MediaId};

const CANVAS: Canvas = Canvas {
    width: 32,
    height: 18,
};

fn loader() -> Arc<dyn MediaLoader> {
    Arc::new(|m: &MediaFile| -> CutlineResult<MediaResource> {
        let img = PreparedImage::solid(16, 9, [200, 0, 0, 255])?;
        Ok(match m.kind {
            MediaKind::Video => MediaResource::Video {
                frames: Arc::new(InMemoryFrames::new(30.0, vec![img])?),
                audio: None,
            },
            _ => MediaResource::Image(img),
        })
    })
}

fn item(id: u64, kind: MediaKind, start: f64, duration: f64) -> TimelineItem {
    TimelineItem {
        id: ItemId(id),
        media: Arc::new(MediaFile::media(MediaId(id), kind, format!("{id}"), duration)),
        start,
        duration,
        track: 0,
        media_start_offset: 0.0,
    }
}

fn sync_with(items: Vec<TimelineItem>) -> (PlaybackSynchronizer, MediaResourceCache) {
    let cache = MediaResourceCache::new(loader(), Duration::from_secs(2));
    let mut sync =
        PlaybackSynchronizer::new(cache.clone(), EngineConfig::default(), CANVAS).unwrap();
    sync.set_timeline(Arc::new(items), TrackVolumes::new());
    (sync, cache)
}

#[test]
fn seek_while_stopped_renders_exactly_once() {
    let (mut sync, _) = sync_with(vec![item(1, MediaKind::Image, 0.0, 5.0)]);
    assert_eq!(sync.render_count(), 0);
    sync.seek(1.0);
    assert_eq!(sync.render_count(), 1);
    assert_eq!(sync.state(), PlaybackState::Stopped);
    assert_eq!(sync.current_time(), 1.0);
    let px = sync.frame().pixel(16, 9).unwrap();
    assert!(px[0] >= 198 && px[1] <= 2 && px[3] == 255, "{px:?}");
}

#[test]
fn seek_clamps_to_timeline() {
    let (mut sync, _) = sync_with(vec![item(1, MediaKind::Image, 0.0, 2.0)]);
    sync.seek(-3.0);
    assert_eq!(sync.current_time(), 0.0);
    sync.seek(10.0);
    assert_eq!(sync.current_time(), 2.0);
}

#[test]
fn ticks_while_stopped_do_nothing() {
    let (mut sync, _) = sync_with(vec![item(1, MediaKind::Image, 0.0, 5.0)]);
    sync.tick(Instant::now());
    assert_eq!(sync.render_count(), 0);
    assert_eq!(sync.current_time(), 0.0);
}

#[test]
fn wall_clock_drives_time_without_video() {
    let (mut sync, _) = sync_with(vec![item(1, MediaKind::Image, 0.0, 5.0)]);
    let t0 = Instant::now();
    sync.play(t0);
    sync.tick(t0 + Duration::from_millis(500));
    assert!((sync.current_time() - 0.5).abs() < 1e-9);
    assert_eq!(sync.primary(), None);
    assert_eq!(sync.render_count(), 1);
}

#[test]
fn primary_video_playhead_drives_clock() {
    let mut clip = item(1, MediaKind::Video, 0.0, 5.0);
    clip.media_start_offset = 2.0;
    let (mut sync, _) = sync_with(vec![clip]);
    sync.seek(1.0);
    assert_eq!(sync.primary(), Some(ItemId(1)));

    let t0 = Instant::now();
    sync.play(t0);
    sync.tick(t0 + Duration::from_millis(250));
    assert!((sync.current_time() - 1.25).abs() < 1e-9);
    let route = sync.mix_state().route(ItemId(1)).unwrap();
    assert!(route.playing);
    assert!((route.source_secs - 3.25).abs() < 1e-9);
}

#[test]
fn stop_keeps_last_frame() {
    let (mut sync, _) = sync_with(vec![item(1, MediaKind::Image, 0.0, 5.0)]);
    let t0 = Instant::now();
    sync.play(t0);
    sync.tick(t0 + Duration::from_millis(100));
    let shown = sync.frame();
    sync.stop();
    sync.tick(t0 + Duration::from_millis(200));
    assert_eq!(sync.state(), PlaybackState::Stopped);
    assert_eq!(sync.frame(), shown);
    assert!((sync.current_time() - 0.1).abs() < 1e-9);
}

#[test]
fn reaching_the_end_stops() {
    let (mut sync, _) = sync_with(vec![item(1, MediaKind::Image, 0.0, 1.0)]);
    let t0 = Instant::now();
    sync.play(t0);
    sync.tick(t0 + Duration::from_secs(2));
    assert_eq!(sync.state(), PlaybackState::Stopped);
    assert_eq!(sync.current_time(), 1.0);

    // Playing again restarts from zero.
    sync.play(t0 + Duration::from_secs(3));
    assert_eq!(sync.current_time(), 0.0);
}

#[test]
fn tick_preloads_upcoming_items() {
    let (mut sync, cache) = sync_with(vec![
        item(1, MediaKind::Image, 0.0, 10.0),
        item(2, MediaKind::Video, 3.0, 2.0),
        item(3, MediaKind::Video, 30.0, 2.0),
    ]);
    let t0 = Instant::now();
    sync.play(t0);
    sync.tick(t0 + Duration::from_millis(10));
    let stats = cache.stats();
    assert_eq!(stats.entries, 2);
}

#[test]
fn removed_items_are_evicted() {
    let (mut sync, cache) = sync_with(vec![item(1, MediaKind::Image, 0.0, 5.0)]);
    sync.seek(1.0);
    assert_eq!(cache.stats().entries, 1);
    sync.set_timeline(Arc::new(Vec::new()), TrackVolumes::new());
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn primary_change_swaps_to_next_video_at_its_offset() {
    let a = item(1, MediaKind::Video, 0.0, 1.0);
    let mut b = item(2, MediaKind::Video, 1.0, 1.0);
    b.media_start_offset = 5.0;
    let (mut sync, cache) = sync_with(vec![a, b.clone()]);
    assert!(cache.acquire(&b).is_some());

    sync.seek(0.0);
    assert_eq!(sync.primary(), Some(ItemId(1)));

    let t0 = Instant::now();
    sync.play(t0);
    sync.tick(t0 + Duration::from_millis(600));
    assert_eq!(sync.primary(), Some(ItemId(1)));

    sync.tick(t0 + Duration::from_millis(1200));
    assert_eq!(sync.primary(), Some(ItemId(2)));
    assert!((sync.current_time() - 1.2).abs() < 1e-9);
    let route = sync.mix_state().route(ItemId(2)).unwrap();
    assert!(route.playing);
    assert!((route.source_secs - 5.2).abs() < 1e-9, "{route:?}");
    let old = sync.mix_state().route(ItemId(1)).unwrap();
    assert!(!old.playing);
    assert_eq!(old.gain, 0.0);

    sync.tick(t0 + Duration::from_millis(1500));
    assert_eq!(sync.primary(), Some(ItemId(2)));
    assert!((sync.current_time() - 1.5).abs() < 1e-9);
    let route = sync.mix_state().route(ItemId(2)).unwrap();
    assert!((route.source_secs - 5.5).abs() < 1e-9, "{route:?}");
}
