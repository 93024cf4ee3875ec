use std::sync::Arc;

use super::*;
use crate::model::media::{MediaFile, MediaId, MediaKind};
use crate::model::timeline::ItemId;

fn fx(id: u64, effect: EffectType, intensity: f64, start: f64, duration: f64) -> TimelineItem {
    TimelineItem {
        id: ItemId(id),
        media: Arc::new(MediaFile::effect(MediaId(id), effect, intensity)),
        start,
        duration,
        track: 0,
        media_start_offset: 0.0,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn no_effects_is_identity() {
    let video = TimelineItem {
        id: ItemId(1),
        media: Arc::new(MediaFile::media(MediaId(1), MediaKind::Video, "v.mp4", 5.0)),
        start: 0.0,
        duration: 5.0,
        track: 0,
        media_start_offset: 0.0,
    };
    assert!(evaluate(&[video], 1.0).is_identity());
    assert!(evaluate(&[], 1.0).is_identity());
}

#[test]
fn concurrent_fade_in_and_out_compose_multiplicatively() {
    let items = vec![
        fx(1, EffectType::FadeIn, 50.0, 0.0, 2.0),
        fx(2, EffectType::FadeOut, 50.0, 0.0, 2.0),
    ];
    let p = evaluate(&items, 1.0);
    assert!(approx(p.alpha, 0.25));
}

#[test]
fn fade_in_ramps_from_zero() {
    let items = vec![fx(1, EffectType::FadeIn, 100.0, 2.0, 4.0)];
    assert!(approx(evaluate(&items, 2.0).alpha, 0.0));
    assert!(approx(evaluate(&items, 3.0).alpha, 0.25));
    assert!(approx(evaluate(&items, 5.0).alpha, 0.75));
    // Inactive again at the exclusive end.
    assert!(approx(evaluate(&items, 6.0).alpha, 1.0));
}

#[test]
fn zoom_in_reaches_target_monotonically() {
    let items = vec![fx(1, EffectType::ZoomIn, 50.0, 0.0, 3.0)];
    assert!(approx(evaluate(&items, 0.0).zoom_scale, 1.0));

    let mut prev = 0.0;
    for i in 0..300 {
        let t = f64::from(i) * 0.01;
        let z = evaluate(&items, t).zoom_scale;
        assert!(z >= prev, "zoom must not decrease: {z} < {prev} at {t}");
        prev = z;
    }
    assert!(prev > 1.99 && prev <= 2.0);

    // At exactly t = 3 the item is no longer active; progress 1.0 maps to the target.
    let at_end = lerp(1.0, 1.0 + 0.5 * 2.0, items[0].progress_at(3.0));
    assert!(approx(at_end, 2.0));
}

#[test]
fn zoom_out_and_in_compose_and_clamp() {
    let items = vec![
        fx(1, EffectType::ZoomOut, 100.0, 0.0, 1.0),
        fx(2, EffectType::ZoomOut, 100.0, 0.0, 1.0),
    ];
    // Each approaches 0.2; the product 0.04 clamps to the floor.
    let z = evaluate(&items, 0.999_999).zoom_scale;
    assert!(approx(z, MIN_ZOOM));

    let items = vec![
        fx(1, EffectType::ZoomIn, 100.0, 0.0, 1.0),
        fx(2, EffectType::ZoomIn, 100.0, 0.0, 1.0),
    ];
    let z = evaluate(&items, 0.999_999).zoom_scale;
    assert!(approx(z, MAX_ZOOM));
}

#[test]
fn blur_uses_max_of_concurrent_items_without_ramp() {
    let items = vec![
        fx(1, EffectType::Blur, 30.0, 0.0, 10.0),
        fx(2, EffectType::Blur, 70.0, 5.0, 10.0),
    ];
    assert!(approx(evaluate(&items, 0.0).blur_px, 3.0));
    assert!(approx(evaluate(&items, 5.0).blur_px, 7.0));
    assert!(approx(evaluate(&items, 14.0).blur_px, 7.0));
}

#[test]
fn black_white_is_logical_or() {
    let items = vec![
        fx(1, EffectType::BlackWhite, 0.0, 0.0, 1.0),
        fx(2, EffectType::BlackWhite, 100.0, 0.5, 1.0),
    ];
    assert!(evaluate(&items, 0.2).grayscale);
    assert!(evaluate(&items, 1.2).grayscale);
    assert!(!evaluate(&items, 1.6).grayscale);
}

#[test]
fn evaluation_is_deterministic() {
    let items = vec![
        fx(1, EffectType::FadeIn, 50.0, 0.0, 2.0),
        fx(2, EffectType::ZoomIn, 25.0, 0.5, 3.0),
        fx(3, EffectType::Blur, 40.0, 1.0, 1.0),
    ];
    for i in 0..40 {
        let t = f64::from(i) * 0.1;
        assert_eq!(evaluate(&items, t), evaluate(&items, t));
    }
}
