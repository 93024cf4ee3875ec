use std::sync::Arc;

use crate::foundation::error::{CutlineError, CutlineResult};
use crate::model::media::{MediaFile, MediaKind};

/// Stable identifier of a [`TimelineItem`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub u64);

/// Lane type. Governs which media kinds a track accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Pictures; `index` is the z-order.
    Video,
    /// Sound; `index` is the submix bus id.
    Audio,
}

impl TrackKind {
    /// Return `true` when media of `kind` may be placed on this track type.
    pub fn accepts(self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Effect => true,
            MediaKind::Video | MediaKind::Image => self == Self::Video,
            MediaKind::Audio => self == Self::Audio,
        }
    }
}

/// A timeline lane.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Track {
    /// Stable id.
    pub id: u64,
    /// Lane type.
    pub kind: TrackKind,
    /// Z-order (video) or bus id (audio).
    pub index: i32,
    /// Display label, owned by the editing UI.
    #[serde(default)]
    pub label: String,
}

/// One placement of a media file on the timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineItem {
    /// Stable id.
    pub id: ItemId,
    /// Shared, immutable media record.
    pub media: Arc<MediaFile>,
    /// Timeline start in seconds.
    pub start: f64,
    /// Length on the timeline in seconds, `> 0`.
    pub duration: f64,
    /// Track index this item sits on.
    pub track: i32,
    /// Seconds into the source at which the item begins.
    pub media_start_offset: f64,
}

impl TimelineItem {
    /// Exclusive end time.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// `t ∈ [start, start + duration)`.
    pub fn is_active_at(&self, t: f64) -> bool {
        t >= self.start && t < self.end()
    }

    /// Return `true` for effect items.
    pub fn is_effect(&self) -> bool {
        self.media.kind == MediaKind::Effect
    }

    /// Fraction of the item elapsed at `t`, unclamped.
    pub fn progress_at(&self, t: f64) -> f64 {
        (t - self.start) / self.duration
    }

    /// Source position the handle should be at for timeline time `t`.
    pub fn source_time_at(&self, t: f64) -> f64 {
        self.media_start_offset + (t - self.start)
    }

    /// Timeline time corresponding to the source position `source_secs`.
    pub fn timeline_time_for(&self, source_secs: f64) -> f64 {
        self.start + (source_secs - self.media_start_offset)
    }

    /// Check the per-item invariants that do not depend on tracks.
    pub fn validate(&self) -> CutlineResult<()> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(CutlineError::validation(format!(
                "item {} start must be >= 0",
                self.id.0
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(CutlineError::validation(format!(
                "item {} duration must be > 0",
                self.id.0
            )));
        }
        if !self.media_start_offset.is_finite() || self.media_start_offset < 0.0 {
            return Err(CutlineError::validation(format!(
                "item {} media_start_offset must be >= 0",
                self.id.0
            )));
        }
        self.media.validate()
    }
}

/// Read-only snapshot of the item list handed to drivers per tick/frame.
pub type ItemSnapshot = Arc<Vec<TimelineItem>>;

/// Active non-effect items at `t`, ascending by track index (ties keep list order).
pub fn active_media_at(items: &[TimelineItem], t: f64) -> Vec<&TimelineItem> {
    let mut out: Vec<&TimelineItem> = items
        .iter()
        .filter(|it| !it.is_effect() && it.is_active_at(t))
        .collect();
    out.sort_by_key(|it| it.track);
    out
}

/// Active effect items at `t`, in list order.
pub fn active_effects_at(items: &[TimelineItem], t: f64) -> impl Iterator<Item = &TimelineItem> {
    items
        .iter()
        .filter(move |it| it.is_effect() && it.is_active_at(t))
}

/// Latest end time over all items, `0.0` for an empty list.
pub fn items_duration(items: &[TimelineItem]) -> f64 {
    items.iter().map(TimelineItem::end).fold(0.0, f64::max)
}

/// Tracks plus the ordered item list. Mutated by the editing UI, read by drivers via snapshots.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    tracks: Vec<Track>,
    items: ItemSnapshot,
}

impl Timeline {
    /// Empty timeline with the given tracks.
    pub fn new(tracks: Vec<Track>) -> CutlineResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for t in &tracks {
            if !seen.insert(t.index) {
                return Err(CutlineError::validation(format!(
                    "duplicate track index {}",
                    t.index
                )));
            }
        }
        Ok(Self {
            tracks,
            items: Arc::new(Vec::new()),
        })
    }

    /// Declared tracks.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track declared with `index`, if any.
    pub fn track(&self, index: i32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.index == index)
    }

    /// Items in list order.
    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    /// Cheap copy-on-write snapshot for drivers.
    pub fn snapshot(&self) -> ItemSnapshot {
        Arc::clone(&self.items)
    }

    /// Item by id.
    pub fn item(&self, id: ItemId) -> Option<&TimelineItem> {
        self.items.iter().find(|it| it.id == id)
    }

    /// Add an item after checking its invariants and track-type compatibility.
    pub fn add_item(&mut self, item: TimelineItem) -> CutlineResult<()> {
        if self.item(item.id).is_some() {
            return Err(CutlineError::validation(format!(
                "item {} already exists",
                item.id.0
            )));
        }
        self.check_placement(&item)?;
        Arc::make_mut(&mut self.items).push(item);
        Ok(())
    }

    /// Remove an item, returning it when present.
    pub fn remove_item(&mut self, id: ItemId) -> Option<TimelineItem> {
        let pos = self.items.iter().position(|it| it.id == id)?;
        Some(Arc::make_mut(&mut self.items).remove(pos))
    }

    /// Replace an existing item in place (move/resize/split results from the editing UI).
    pub fn replace_item(&mut self, item: TimelineItem) -> CutlineResult<()> {
        let pos = self
            .items
            .iter()
            .position(|it| it.id == item.id)
            .ok_or_else(|| CutlineError::validation(format!("item {} does not exist", item.id.0)))?;
        self.check_placement(&item)?;
        Arc::make_mut(&mut self.items)[pos] = item;
        Ok(())
    }

    fn check_placement(&self, item: &TimelineItem) -> CutlineResult<()> {
        item.validate()?;
        if item.is_effect() {
            return Ok(());
        }
        let track = self.track(item.track).ok_or_else(|| {
            CutlineError::validation(format!(
                "item {} references undeclared track {}",
                item.id.0, item.track
            ))
        })?;
        if !track.kind.accepts(item.media.kind) {
            return Err(CutlineError::validation(format!(
                "item {} ({:?}) cannot be placed on a {:?} track",
                item.id.0, item.media.kind, track.kind
            )));
        }
        Ok(())
    }

    /// Latest item end time.
    pub fn duration(&self) -> f64 {
        items_duration(&self.items)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/timeline.rs"]
mod tests;
