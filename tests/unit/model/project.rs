use super::*;

const PROJECT_JSON: &str = r#"{
  "tracks": [
    {"id": 1, "kind": "video", "index": 0, "label": "V1"},
    {"id": 2, "kind": "audio", "index": 1}
  ],
  "media": [
    {"id": 1, "kind": "image", "source": "still.png", "duration": 0},
    {"id": 2, "kind": "audio", "source": "tone.wav", "duration": 4.0},
    {"id": 3, "kind": "effect", "effect": "fade_in", "intensity": 100}
  ],
  "items": [
    {"id": 10, "media": 1, "start": 0, "duration": 3, "track": 0},
    {"id": 11, "media": 2, "start": 1, "duration": 2, "track": 1, "media_start_offset": 0.5},
    {"id": 12, "media": 3, "start": 0, "duration": 1, "track": 0}
  ],
  "volumes": {"11": 80}
}"#;

#[test]
fn parses_and_builds_timeline() {
    let project: Project = serde_json::from_str(PROJECT_JSON).unwrap();
    let tl = project.build_timeline().unwrap();
    assert_eq!(tl.items().len(), 3);
    assert_eq!(tl.duration(), 3.0);
    assert_eq!(project.volumes.get(ItemId(11)), 80);
    assert_eq!(tl.item(ItemId(11)).unwrap().media_start_offset, 0.5);
}

#[test]
fn rejects_missing_media_reference() {
    let mut project: Project = serde_json::from_str(PROJECT_JSON).unwrap();
    project.items[0].media = MediaId(99);
    let err = project.validate().unwrap_err();
    assert!(err.to_string().contains("missing media"));
}

#[test]
fn rejects_effect_without_type() {
    let mut project: Project = serde_json::from_str(PROJECT_JSON).unwrap();
    project.media[2].effect = None;
    assert!(project.validate().is_err());
}

#[test]
fn json_file_roundtrip() {
    let project: Project = serde_json::from_str(PROJECT_JSON).unwrap();
    let path = std::env::temp_dir().join(format!("cutline_project_{}.json", std::process::id()));
    project.to_json_file(&path).unwrap();
    let back = Project::from_json_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(back, project);
}
