use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::media::{MediaFile, MediaId};
use crate::model::timeline::{ItemId, Timeline, TimelineItem, Track};
use crate::model::volume::TrackVolumes;

/// Serialized placement of a media file; resolved into a [`TimelineItem`] on load.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ItemDef {
    /// Item id.
    pub id: ItemId,
    /// Referenced media id.
    pub media: MediaId,
    /// Timeline start in seconds.
    pub start: f64,
    /// Timeline length in seconds.
    pub duration: f64,
    /// Track index.
    pub track: i32,
    /// Seconds into the source.
    #[serde(default)]
    pub media_start_offset: f64,
}

/// On-disk project: tracks, imported media, item placements and the volume table.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Project {
    /// Declared tracks.
    pub tracks: Vec<Track>,
    /// Media records supplied by the import component.
    pub media: Vec<MediaFile>,
    /// Item placements in list order.
    pub items: Vec<ItemDef>,
    /// Per-item volume table.
    #[serde(default)]
    pub volumes: TrackVolumes,
}

impl Project {
    /// Parse a project from a JSON file.
    pub fn from_json_file(path: &Path) -> CutlineResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read project '{}'", path.display()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CutlineError::validation(format!("parse project '{}': {e}", path.display()))
        })
    }

    /// Write the project as pretty JSON.
    pub fn to_json_file(&self, path: &Path) -> CutlineResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| CutlineError::validation(format!("serialize project: {e}")))?;
        std::fs::write(path, json)
            .with_context(|| format!("write project '{}'", path.display()))?;
        Ok(())
    }

    /// Resolve media references and build a validated [`Timeline`].
    pub fn build_timeline(&self) -> CutlineResult<Timeline> {
        let mut media = BTreeMap::<MediaId, Arc<MediaFile>>::new();
        for m in &self.media {
            m.validate()?;
            if media.insert(m.id, Arc::new(m.clone())).is_some() {
                return Err(CutlineError::validation(format!(
                    "duplicate media id {}",
                    m.id.0
                )));
            }
        }

        let mut timeline = Timeline::new(self.tracks.clone())?;
        for def in &self.items {
            let file = media.get(&def.media).ok_or_else(|| {
                CutlineError::validation(format!(
                    "item {} references missing media {}",
                    def.id.0, def.media.0
                ))
            })?;
            timeline.add_item(TimelineItem {
                id: def.id,
                media: Arc::clone(file),
                start: def.start,
                duration: def.duration,
                track: def.track,
                media_start_offset: def.media_start_offset,
            })?;
        }
        Ok(timeline)
    }

    /// Validate without keeping the resolved timeline.
    pub fn validate(&self) -> CutlineResult<()> {
        self.build_timeline().map(|_| ())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/project.rs"]
mod tests;
