use super::*;
use crate::model::media::{EffectType, MediaId};

fn tracks() -> Vec<Track> {
    vec![
        Track {
            id: 1,
            kind: TrackKind::Video,
            index: 0,
            label: "V1".to_string(),
        },
        Track {
            id: 2,
            kind: TrackKind::Video,
            index: 1,
            label: "V2".to_string(),
        },
        Track {
            id: 3,
            kind: TrackKind::Audio,
            index: 2,
            label: "A1".to_string(),
        },
    ]
}

fn item(id: u64, kind: MediaKind, start: f64, duration: f64, track: i32) -> TimelineItem {
    TimelineItem {
        id: ItemId(id),
        media: Arc::new(MediaFile::media(MediaId(id), kind, "src.bin", 10.0)),
        start,
        duration,
        track,
        media_start_offset: 0.0,
    }
}

#[test]
fn active_interval_is_half_open() {
    let it = item(1, MediaKind::Video, 1.0, 2.0, 0);
    assert!(!it.is_active_at(0.999));
    assert!(it.is_active_at(1.0));
    assert!(it.is_active_at(2.999));
    assert!(!it.is_active_at(3.0));
}

#[test]
fn add_item_enforces_track_types() {
    let mut tl = Timeline::new(tracks()).unwrap();
    assert!(tl.add_item(item(1, MediaKind::Video, 0.0, 1.0, 0)).is_ok());
    assert!(tl.add_item(item(2, MediaKind::Image, 0.0, 1.0, 1)).is_ok());
    assert!(tl.add_item(item(3, MediaKind::Audio, 0.0, 1.0, 2)).is_ok());

    assert!(tl.add_item(item(4, MediaKind::Audio, 0.0, 1.0, 0)).is_err());
    assert!(tl.add_item(item(5, MediaKind::Video, 0.0, 1.0, 2)).is_err());
    assert!(tl.add_item(item(6, MediaKind::Video, 0.0, 1.0, 9)).is_err());
    assert_eq!(tl.items().len(), 3);
}

#[test]
fn add_item_rejects_bad_geometry_and_duplicates() {
    let mut tl = Timeline::new(tracks()).unwrap();
    assert!(tl.add_item(item(1, MediaKind::Video, -1.0, 1.0, 0)).is_err());
    assert!(tl.add_item(item(1, MediaKind::Video, 0.0, 0.0, 0)).is_err());
    assert!(tl.add_item(item(1, MediaKind::Video, 0.0, 1.0, 0)).is_ok());
    assert!(tl.add_item(item(1, MediaKind::Video, 5.0, 1.0, 0)).is_err());
}

#[test]
fn effects_may_sit_on_any_track() {
    let mut tl = Timeline::new(tracks()).unwrap();
    let fx = TimelineItem {
        id: ItemId(10),
        media: Arc::new(MediaFile::effect(MediaId(10), EffectType::Blur, 40.0)),
        start: 0.0,
        duration: 1.0,
        track: 42,
        media_start_offset: 0.0,
    };
    assert!(tl.add_item(fx).is_ok());
}

#[test]
fn active_media_sorted_by_track_and_excludes_effects() {
    let mut tl = Timeline::new(tracks()).unwrap();
    tl.add_item(item(1, MediaKind::Video, 0.0, 4.0, 1)).unwrap();
    tl.add_item(item(2, MediaKind::Video, 0.0, 4.0, 0)).unwrap();
    tl.add_item(item(3, MediaKind::Video, 5.0, 1.0, 0)).unwrap();
    tl.add_item(TimelineItem {
        id: ItemId(4),
        media: Arc::new(MediaFile::effect(MediaId(4), EffectType::FadeIn, 50.0)),
        start: 0.0,
        duration: 4.0,
        track: 0,
        media_start_offset: 0.0,
    })
    .unwrap();

    let active: Vec<u64> = active_media_at(tl.items(), 1.0)
        .iter()
        .map(|it| it.id.0)
        .collect();
    assert_eq!(active, vec![2, 1]);
    assert_eq!(active_effects_at(tl.items(), 1.0).count(), 1);
    assert_eq!(active_effects_at(tl.items(), 4.0).count(), 0);
}

#[test]
fn duration_is_latest_end() {
    let mut tl = Timeline::new(tracks()).unwrap();
    assert_eq!(tl.duration(), 0.0);
    tl.add_item(item(1, MediaKind::Video, 0.0, 4.0, 0)).unwrap();
    tl.add_item(item(2, MediaKind::Audio, 2.5, 3.0, 2)).unwrap();
    assert_eq!(tl.duration(), 5.5);
}

#[test]
fn snapshots_are_isolated_from_later_edits() {
    let mut tl = Timeline::new(tracks()).unwrap();
    tl.add_item(item(1, MediaKind::Video, 0.0, 4.0, 0)).unwrap();
    let snap = tl.snapshot();
    tl.remove_item(ItemId(1));
    assert_eq!(snap.len(), 1);
    assert!(tl.items().is_empty());
}

#[test]
fn replace_keeps_position_and_rejects_invalid() {
    let mut tl = Timeline::new(tracks()).unwrap();
    tl.add_item(item(1, MediaKind::Video, 0.0, 4.0, 0)).unwrap();
    tl.add_item(item(2, MediaKind::Video, 0.0, 4.0, 1)).unwrap();

    tl.replace_item(item(1, MediaKind::Video, 1.0, 2.0, 1)).unwrap();
    assert_eq!(tl.items()[0].id, ItemId(1));
    assert_eq!(tl.items()[0].start, 1.0);

    assert!(tl.replace_item(item(1, MediaKind::Video, 1.0, 2.0, 2)).is_err());
    assert_eq!(tl.items()[0].track, 1);
}

#[test]
fn source_time_maps_through_offset() {
    let mut it = item(1, MediaKind::Video, 2.0, 3.0, 0);
    it.media_start_offset = 10.0;
    assert_eq!(it.source_time_at(2.5), 10.5);
    assert_eq!(it.timeline_time_for(10.5), 2.5);
}
