use std::collections::HashMap;

use super::*;
use crate::assets::resource::{AudioPcm, InMemoryFrames, MediaResource, VideoFrameSource};
use crate::model::media::{EffectType, MediaFile, MediaId, MediaKind};
use crate::model::timeline::ItemId;

const RED: [u8; 4] = [200, 0, 0, 255];
const GREEN: [u8; 4] = [0, 200, 0, 255];

fn item(id: u64, kind: MediaKind, track: i32, start: f64, duration: f64) -> TimelineItem {
    TimelineItem {
        id: ItemId(id),
        media: Arc::new(MediaFile::media(MediaId(id), kind, format!("{id}.bin"), duration)),
        start,
        duration,
        track,
        media_start_offset: 0.0,
    }
}

fn fx(id: u64, effect: EffectType, start: f64, duration: f64) -> TimelineItem {
    TimelineItem {
        id: ItemId(id),
        media: Arc::new(MediaFile::effect(MediaId(id), effect, 50.0)),
        start,
        duration,
        track: 0,
        media_start_offset: 0.0,
    }
}

fn solid(color: [u8; 4]) -> Arc<MediaResource> {
    Arc::new(MediaResource::Image(
        PreparedImage::solid(10, 10, color).unwrap(),
    ))
}

fn assert_close(px: [u8; 4], expected: [u8; 4]) {
    for c in 0..4 {
        assert!(
            (i16::from(px[c]) - i16::from(expected[c])).abs() <= 2,
            "pixel {px:?} != {expected:?}"
        );
    }
}

fn render(
    t: f64,
    items: &[TimelineItem],
    res: &HashMap<ItemId, Arc<MediaResource>>,
) -> (FrameReport, crate::render::backend::FrameRGBA) {
    let mut surface = Surface::new(100, 100).unwrap();
    let mut heads = PlayheadSet::exact();
    let report = FrameCompositor::new()
        .render(t, items, res, &mut heads, &mut surface)
        .unwrap();
    (report, surface.to_frame())
}

#[test]
fn empty_timeline_is_opaque_black() {
    let (report, frame) = render(0.0, &[], &HashMap::new());
    assert_eq!(report.drawn, 0);
    assert!(frame.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
}

#[test]
fn higher_track_is_drawn_after_and_offset() {
    let items = vec![
        item(2, MediaKind::Image, 1, 0.0, 5.0),
        item(1, MediaKind::Image, 0, 0.0, 5.0),
    ];
    let res = HashMap::from([(ItemId(1), solid(RED)), (ItemId(2), solid(GREEN))]);
    let (report, frame) = render(1.0, &items, &res);

    assert_eq!(report.drawn, 2);
    // Only track 0 covers the top-left corner; track 1 starts at (20, 20).
    assert_close(frame.pixel(10, 10).unwrap(), RED);
    assert_close(frame.pixel(50, 50).unwrap(), GREEN);
    assert_close(frame.pixel(95, 95).unwrap(), GREEN);
}

#[test]
fn inactive_items_contribute_nothing() {
    let items = vec![item(1, MediaKind::Image, 0, 2.0, 1.0)];
    let res = HashMap::from([(ItemId(1), solid(RED))]);
    let (_, before) = render(1.999, &items, &res);
    let (_, after) = render(3.0, &items, &res);
    assert_eq!(before.pixel(50, 50), Some([0, 0, 0, 255]));
    assert_eq!(after.pixel(50, 50), Some([0, 0, 0, 255]));
    let (_, during) = render(2.0, &items, &res);
    assert_close(during.pixel(50, 50).unwrap(), RED);
}

#[test]
fn missing_resource_skips_layer_without_failing() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        item(2, MediaKind::Image, 1, 0.0, 5.0),
    ];
    let res = HashMap::from([(ItemId(1), solid(RED))]);
    let (report, frame) = render(1.0, &items, &res);
    assert_eq!(report.drawn, 1);
    assert_eq!(report.skipped, 1);
    assert_close(frame.pixel(50, 50).unwrap(), RED);
}

#[test]
fn audio_items_draw_nothing() {
    let items = vec![item(1, MediaKind::Audio, 0, 0.0, 5.0)];
    let pcm = AudioPcm {
        sample_rate: 48_000,
        channels: 2,
        interleaved_f32: Arc::new(vec![0.5; 96_000]),
    };
    let res = HashMap::from([(ItemId(1), Arc::new(MediaResource::Audio(pcm)))]);
    let (report, frame) = render(1.0, &items, &res);
    assert_eq!((report.drawn, report.skipped), (0, 0));
    assert_eq!(frame.pixel(50, 50), Some([0, 0, 0, 255]));
}

#[test]
fn fade_scales_layers_over_black() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        fx(9, EffectType::FadeIn, 0.0, 2.0),
    ];
    let res = HashMap::from([(ItemId(1), solid(RED))]);
    let (report, frame) = render(1.0, &items, &res);
    assert_eq!(report.params.alpha, 0.5);
    assert_close(frame.pixel(50, 50).unwrap(), [100, 0, 0, 255]);
}

#[test]
fn black_white_desaturates() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        fx(9, EffectType::BlackWhite, 0.0, 5.0),
    ];
    let res = HashMap::from([(ItemId(1), solid([255, 0, 0, 255]))]);
    let (_, frame) = render(1.0, &items, &res);
    assert_close(frame.pixel(50, 50).unwrap(), [54, 54, 54, 255]);
}

#[test]
fn rendering_is_idempotent() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        item(2, MediaKind::Image, 1, 0.0, 5.0),
        fx(8, EffectType::ZoomIn, 0.0, 5.0),
        fx(9, EffectType::Blur, 0.0, 5.0),
    ];
    let res = HashMap::from([(ItemId(1), solid(RED)), (ItemId(2), solid(GREEN))]);

    let mut surface = Surface::new(64, 48).unwrap();
    let mut heads = PlayheadSet::exact();
    let c = FrameCompositor::new();
    c.render(2.5, &items, &res, &mut heads, &mut surface).unwrap();
    let a = surface.to_frame();
    c.render(2.5, &items, &res, &mut heads, &mut surface).unwrap();
    assert_eq!(a, surface.to_frame());
}

#[test]
fn video_layer_follows_item_timing() {
    let frames = InMemoryFrames::new(
        1.0,
        vec![
            PreparedImage::solid(10, 10, RED).unwrap(),
            PreparedImage::solid(10, 10, GREEN).unwrap(),
        ],
    )
    .unwrap();
    let mut clip = item(1, MediaKind::Video, 0, 1.0, 5.0);
    clip.media_start_offset = 0.5;
    let res = HashMap::from([(
        ItemId(1),
        Arc::new(MediaResource::Video {
            frames: Arc::new(frames),
            audio: None,
        }),
    )]);

    // source = 0.5 + (1.2 - 1.0) = 0.7 -> frame 0
    let (_, a) = render(1.2, std::slice::from_ref(&clip), &res);
    assert_close(a.pixel(50, 50).unwrap(), RED);
    // source = 0.5 + (1.6 - 1.0) = 1.1 -> frame 1
    let (_, b) = render(1.6, std::slice::from_ref(&clip), &res);
    assert_close(b.pixel(50, 50).unwrap(), GREEN);
}

struct CorruptFrames;

impl VideoFrameSource for CorruptFrames {
    fn dimensions(&self) -> (u32, u32) {
        (10, 10)
    }

    fn duration_secs(&self) -> f64 {
        5.0
    }

    fn frame_at(&self, _source_secs: f64) -> CutlineResult<PreparedImage> {
        Err(CutlineError::resource_load("corrupt packet"))
    }
}

fn corrupt_video() -> Arc<MediaResource> {
    Arc::new(MediaResource::Video {
        frames: Arc::new(CorruptFrames),
        audio: None,
    })
}

#[test]
fn failing_layer_is_skipped_and_frame_still_drawn() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        item(2, MediaKind::Video, 1, 0.0, 5.0),
    ];
    let res = HashMap::from([(ItemId(1), solid(RED)), (ItemId(2), corrupt_video())]);
    let (report, frame) = render(1.0, &items, &res);

    assert_eq!(report.drawn, 1);
    assert_eq!(report.skipped, 1);
    // Track 1 would cover the center had it drawn.
    assert_close(frame.pixel(10, 10).unwrap(), RED);
    assert_close(frame.pixel(50, 50).unwrap(), RED);
}

#[test]
fn layer_too_large_to_rasterize_is_skipped() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        item(2, MediaKind::Image, 1, 0.0, 5.0),
    ];
    let oversized = Arc::new(MediaResource::Image(
        PreparedImage::solid(70_000, 1, GREEN).unwrap(),
    ));
    let res = HashMap::from([(ItemId(1), solid(RED)), (ItemId(2), oversized)]);
    let (report, frame) = render(1.0, &items, &res);

    assert_eq!((report.drawn, report.skipped), (1, 1));
    assert_close(frame.pixel(50, 50).unwrap(), RED);
}

#[test]
fn zoom_out_shrinks_toward_center() {
    let items = vec![
        item(1, MediaKind::Image, 0, 0.0, 5.0),
        fx(9, EffectType::ZoomOut, 0.0, 2.0),
    ];
    let res = HashMap::from([(ItemId(1), solid(RED))]);
    let (report, frame) = render(1.0, &items, &res);

    // intensity 50: target 0.6, halfway -> 0.8; the layer covers 10..90.
    assert!((report.params.zoom_scale - 0.8).abs() < 1e-9);
    assert_eq!(frame.pixel(3, 3), Some([0, 0, 0, 255]));
    assert_eq!(frame.pixel(96, 96), Some([0, 0, 0, 255]));
    assert_close(frame.pixel(50, 50).unwrap(), RED);
    assert_close(frame.pixel(15, 15).unwrap(), RED);
}

#[test]
fn blur_softens_layer_edges() {
    let items = vec![item(2, MediaKind::Image, 1, 0.0, 5.0)];
    let res = HashMap::from([(ItemId(2), solid(RED))]);
    let (_, sharp) = render(1.0, &items, &res);
    assert_close(sharp.pixel(20, 50).unwrap(), RED);
    assert_eq!(sharp.pixel(18, 50), Some([0, 0, 0, 255]));

    let mut blurred_items = items.clone();
    blurred_items.push(fx(9, EffectType::Blur, 0.0, 5.0));
    let (report, blurred) = render(1.0, &blurred_items, &res);
    assert_eq!(report.params.blur_px, 5.0);

    let edge = blurred.pixel(20, 50).unwrap();
    assert!(edge[0] > 60 && edge[0] < 140, "{edge:?}");
    let outside = blurred.pixel(18, 50).unwrap();
    assert!(outside[0] > 0, "{outside:?}");
    assert_close(blurred.pixel(75, 75).unwrap(), RED);
}
