use std::collections::HashMap;

use crate::model::timeline::ItemId;

/// Source position of one time-based media handle.
///
/// A fresh playhead has no position; the first sync always repositions it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Playhead {
    position: Option<f64>,
    playing: bool,
    seeks: u64,
}

impl Playhead {
    /// Current source position in seconds (`0.0` before the first sync).
    pub fn position(&self) -> f64 {
        self.position.unwrap_or(0.0)
    }

    /// Whether the handle advances on its own.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of repositions performed so far.
    pub fn seek_count(&self) -> u64 {
        self.seeks
    }

    /// Reposition to `target` only when it is more than `tolerance` seconds away.
    ///
    /// Returns `true` when a reposition happened.
    pub fn sync_to(&mut self, target: f64, tolerance: f64) -> bool {
        match self.position {
            Some(pos) if (pos - target).abs() <= tolerance => false,
            _ => {
                self.position = Some(target.max(0.0));
                self.seeks += 1;
                true
            }
        }
    }

    /// Start advancing.
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Stop advancing; the position is kept.
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance by `dt` seconds when playing.
    pub fn advance(&mut self, dt: f64) {
        if self.playing
            && let Some(pos) = self.position.as_mut()
        {
            *pos += dt.max(0.0);
        }
    }
}

/// Playheads keyed by timeline item, plus the tolerance used when syncing them.
///
/// Preview keeps one set alive across ticks. Export builds a fresh set per frame with a zero
/// tolerance so every frame lands exactly on `media_start_offset + (t - start)`.
#[derive(Clone, Debug)]
pub struct PlayheadSet {
    heads: HashMap<ItemId, Playhead>,
    tolerance: f64,
}

impl PlayheadSet {
    /// Empty set repositioning only beyond `tolerance` seconds.
    pub fn new(tolerance: f64) -> Self {
        Self {
            heads: HashMap::new(),
            tolerance: tolerance.max(0.0),
        }
    }

    /// Empty set that repositions on any difference.
    pub fn exact() -> Self {
        Self::new(0.0)
    }

    /// Sync `item`'s playhead to `target` and return the position to present.
    pub fn sync(&mut self, item: ItemId, target: f64) -> f64 {
        let head = self.heads.entry(item).or_default();
        head.sync_to(target, self.tolerance);
        head.position()
    }

    /// Force `item`'s playhead exactly onto `target`.
    pub fn seek_exact(&mut self, item: ItemId, target: f64) -> f64 {
        let head = self.heads.entry(item).or_default();
        head.sync_to(target, 0.0);
        head.position()
    }

    /// Playhead for `item`, if one exists.
    pub fn get(&self, item: ItemId) -> Option<&Playhead> {
        self.heads.get(&item)
    }

    /// Mutable playhead for `item`, creating it when absent.
    pub fn entry(&mut self, item: ItemId) -> &mut Playhead {
        self.heads.entry(item).or_default()
    }

    /// Pause every playhead except those in `keep_playing`.
    pub fn pause_except(&mut self, keep_playing: &[ItemId]) {
        for (id, head) in &mut self.heads {
            if !keep_playing.contains(id) {
                head.pause();
            }
        }
    }

    /// Pause every playhead.
    pub fn pause_all(&mut self) {
        self.heads.values_mut().for_each(Playhead::pause);
    }

    /// Advance every playing playhead by `dt` seconds.
    pub fn advance_all(&mut self, dt: f64) {
        for head in self.heads.values_mut() {
            head.advance(dt);
        }
    }

    /// Drop playheads of items no longer on the timeline.
    pub fn retain(&mut self, present: &[ItemId]) {
        self.heads.retain(|id, _| present.contains(id));
    }

    /// Number of tracked playheads.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// Whether no playhead exists.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/playhead.rs"]
mod tests;
