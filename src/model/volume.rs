use std::collections::BTreeMap;

use crate::model::timeline::ItemId;

/// Volume applied to items without an explicit entry.
pub const DEFAULT_VOLUME_PERCENT: u16 = 100;
/// Highest accepted volume (2x gain).
pub const MAX_VOLUME_PERCENT: u16 = 200;

/// Per-item volume table (percent, `0..=200`), owned by a separate control surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TrackVolumes {
    percent: BTreeMap<ItemId, u16>,
}

impl TrackVolumes {
    /// Empty table: every item plays at 100%.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an item's volume, clamping to `0..=200`.
    pub fn set(&mut self, id: ItemId, percent: u16) {
        self.percent.insert(id, percent.min(MAX_VOLUME_PERCENT));
    }

    /// Volume percent for `id` (default 100).
    pub fn get(&self, id: ItemId) -> u16 {
        self.percent
            .get(&id)
            .copied()
            .unwrap_or(DEFAULT_VOLUME_PERCENT)
            .min(MAX_VOLUME_PERCENT)
    }

    /// Linear gain for `id`: `percent / 100`.
    pub fn gain(&self, id: ItemId) -> f32 {
        f32::from(self.get(id)) / 100.0
    }
}
