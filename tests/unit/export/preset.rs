use super::*;

#[test]
fn preset_tiers() {
    assert_eq!(QualityPreset::Fast.short_side(), 480);
    assert_eq!(QualityPreset::Balanced.bitrate(), 5_000_000);
    assert_eq!(QualityPreset::High.batch_size(), 30);
    assert_eq!("HIGH".parse::<QualityPreset>().unwrap(), QualityPreset::High);
    assert!("ultra".parse::<QualityPreset>().is_err());
}

#[test]
fn aspect_dimensions_are_even() {
    let cases = [
        (AspectRatio::Landscape16x9, QualityPreset::Fast, 854, 480),
        (AspectRatio::Landscape16x9, QualityPreset::Balanced, 1280, 720),
        (AspectRatio::Landscape16x9, QualityPreset::High, 1920, 1080),
        (AspectRatio::Standard4x3, QualityPreset::Fast, 640, 480),
        (AspectRatio::Standard4x3, QualityPreset::High, 1440, 1080),
        (AspectRatio::Portrait9x16, QualityPreset::Balanced, 720, 1280),
    ];
    for (aspect, preset, w, h) in cases {
        let settings = ExportSettings {
            aspect,
            preset,
            ..ExportSettings::default()
        };
        let canvas = settings.canvas();
        assert_eq!((canvas.width, canvas.height), (w, h), "{aspect:?} {preset:?}");
        assert_eq!(canvas.width % 2, 0);
        assert_eq!(canvas.height % 2, 0);
    }
}

#[test]
fn frame_rates_parse_and_serialize_as_numbers() {
    assert_eq!("60".parse::<FrameRate>().unwrap().fps(), Fps { num: 60, den: 1 });
    assert!("25".parse::<FrameRate>().is_err());
    assert!("abc".parse::<FrameRate>().is_err());

    let json = serde_json::to_string(&FrameRate::Fps24).unwrap();
    assert_eq!(json, "24");
    let back: FrameRate = serde_json::from_str("30").unwrap();
    assert_eq!(back, FrameRate::Fps30);
}

#[test]
fn settings_json_uses_defaults() {
    let s: ExportSettings =
        serde_json::from_str(r#"{"preset":"fast","aspect":"9:16","frame_rate":60}"#).unwrap();
    assert_eq!(s.preset, QualityPreset::Fast);
    assert_eq!(s.aspect, AspectRatio::Portrait9x16);
    assert_eq!(s.fps().num, 60);
    assert!(s.overwrite);
    assert_eq!(s.dynamics, Some(DynamicsParams::LIMITER));
}

#[test]
fn zero_threads_is_invalid() {
    let s = ExportSettings {
        threads: Some(0),
        ..ExportSettings::default()
    };
    assert!(s.validate().is_err());
    assert!(ExportSettings::default().validate().is_ok());
}
