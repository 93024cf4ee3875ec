//! Shared, reference-counted pool of decoded media handles.
//!
//! Entries are keyed by timeline item id. Loads run on background threads; every wait on a load
//! is bounded by the configured timeout, after which the item is treated as absent for that call
//! while the load keeps running.
//!
//! Two kinds of holders exist:
//! - the preview driver, which `acquire`s and `preload_window`s entries and later `evict`s the
//!   ones whose items left the timeline ("retained" entries);
//! - the export driver, which takes RAII [`ResourceLease`]s. An entry is never dropped while
//!   leased, and an entry that only exists because of leases disappears with its last lease, so
//!   an export leaves the cache exactly as it found it.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::assets::loader::MediaLoader;
use crate::assets::resource::{MediaResource, ResourceLookup};
use crate::config::EngineConfig;
use crate::model::media::MediaFile;
use crate::model::timeline::{ItemId, TimelineItem};

/// Occupancy snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries.
    pub entries: usize,
    /// Entries with a ready handle.
    pub ready: usize,
    /// Entries still loading.
    pub loading: usize,
    /// Entries whose load failed.
    pub failed: usize,
    /// Entries with at least one live lease.
    pub leased: usize,
}

enum SlotState {
    Loading,
    Ready(Arc<MediaResource>),
    Failed(String),
}

struct LoadSlot {
    state: Mutex<SlotState>,
    done: Condvar,
}

impl LoadSlot {
    fn loading() -> Self {
        Self {
            state: Mutex::new(SlotState::Loading),
            done: Condvar::new(),
        }
    }

    fn finish(&self, state: SlotState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.done.notify_all();
    }

    fn peek(&self) -> Option<Arc<MediaResource>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SlotState::Ready(res) => Some(Arc::clone(res)),
            _ => None,
        }
    }

    fn wait(&self, timeout: Duration) -> Option<Arc<MediaResource>> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .done
            .wait_timeout_while(guard, timeout, |s| matches!(s, SlotState::Loading))
            .unwrap_or_else(PoisonError::into_inner);
        match &*guard {
            SlotState::Ready(res) => Some(Arc::clone(res)),
            _ => None,
        }
    }

    fn is_loading(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            SlotState::Loading
        )
    }
}

struct Entry {
    media: Arc<MediaFile>,
    slot: Arc<LoadSlot>,
    leases: usize,
    retain: bool,
}

struct CacheInner {
    loader: Arc<dyn MediaLoader>,
    load_timeout: Duration,
    entries: Mutex<HashMap<ItemId, Entry>>,
}

impl CacheInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<ItemId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_load(&self, item: ItemId, media: Arc<MediaFile>) -> Arc<LoadSlot> {
        let slot = Arc::new(LoadSlot::loading());
        let loader = Arc::clone(&self.loader);
        let thread_slot = Arc::clone(&slot);
        tracing::debug!(item = item.0, source = %media.source, "resource load start");

        let spawned = std::thread::Builder::new()
            .name(format!("cutline-load-{}", item.0))
            .spawn(move || {
                let started = Instant::now();
                match loader.load(&media) {
                    Ok(res) => {
                        tracing::debug!(
                            item = item.0,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "resource ready"
                        );
                        thread_slot.finish(SlotState::Ready(Arc::new(res)));
                    }
                    Err(e) => {
                        tracing::warn!(item = item.0, error = %e, "resource load failed");
                        thread_slot.finish(SlotState::Failed(e.to_string()));
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(item = item.0, error = %e, "could not spawn resource loader");
            slot.finish(SlotState::Failed(e.to_string()));
        }
        slot
    }

    /// Find or create the entry for `item`, restarting the load when the item now points at a
    /// different media record.
    fn ensure_entry<'a>(
        &self,
        entries: &'a mut HashMap<ItemId, Entry>,
        item: &TimelineItem,
        retain: bool,
    ) -> &'a mut Entry {
        let entry = entries.entry(item.id).or_insert_with(|| Entry {
            media: Arc::clone(&item.media),
            slot: self.start_load(item.id, Arc::clone(&item.media)),
            leases: 0,
            retain,
        });
        if *entry.media != *item.media {
            entry.media = Arc::clone(&item.media);
            entry.slot = self.start_load(item.id, Arc::clone(&item.media));
        }
        entry.retain |= retain;
        entry
    }
}

/// Decoded media handles shared by the preview and export drivers. Cloning shares the pool.
#[derive(Clone)]
pub struct MediaResourceCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for MediaResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResourceCache")
            .field("load_timeout", &self.inner.load_timeout)
            .field("stats", &self.stats())
            .finish()
    }
}

impl MediaResourceCache {
    /// Empty cache decoding through `loader`, waiting at most `load_timeout` per acquisition.
    pub fn new(loader: Arc<dyn MediaLoader>, load_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                loader,
                load_timeout,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Empty cache using the configured load timeout.
    pub fn from_config(loader: Arc<dyn MediaLoader>, config: &EngineConfig) -> Self {
        Self::new(loader, config.load_timeout)
    }

    /// Upper bound of every blocking wait.
    pub fn load_timeout(&self) -> Duration {
        self.inner.load_timeout
    }

    /// Ready handle for `item`, starting a load when needed and waiting at most the load timeout.
    ///
    /// `None` means absent for this call (effect item, failed load, or timeout). A timed-out load
    /// keeps running and a later call may find it ready.
    pub fn acquire(&self, item: &TimelineItem) -> Option<Arc<MediaResource>> {
        if !item.media.kind.is_decodable() {
            return None;
        }
        let slot = {
            let mut entries = self.inner.entries();
            Arc::clone(&self.inner.ensure_entry(&mut entries, item, true).slot)
        };
        let res = slot.wait(self.inner.load_timeout);
        if res.is_none() && slot.is_loading() {
            tracing::warn!(
                item = item.id.0,
                timeout_ms = self.inner.load_timeout.as_millis() as u64,
                "resource not ready within timeout, skipping"
            );
        }
        res
    }

    /// Ready handle for `item` without waiting or starting a load.
    pub fn peek(&self, item: ItemId) -> Option<Arc<MediaResource>> {
        let slot = self.inner.entries().get(&item).map(|e| Arc::clone(&e.slot))?;
        slot.peek()
    }

    /// Start background loads for decodable items overlapping `[t - lookahead, t + lookahead]`.
    ///
    /// Never blocks. At most `max_in_flight` loads run at once across the cache; the items closest
    /// to `t` go first. Returns the number of loads started.
    pub fn preload_window(
        &self,
        items: &[TimelineItem],
        t: f64,
        lookahead: f64,
        max_in_flight: usize,
    ) -> usize {
        let mut entries = self.inner.entries();
        let mut in_flight = entries.values().filter(|e| e.slot.is_loading()).count();
        if in_flight >= max_in_flight {
            return 0;
        }

        let (lo, hi) = (t - lookahead, t + lookahead);
        let mut candidates: Vec<&TimelineItem> = items
            .iter()
            .filter(|it| it.media.kind.is_decodable())
            .filter(|it| it.start <= hi && it.end() > lo)
            .filter(|it| match entries.get(&it.id) {
                Some(e) => *e.media != *it.media,
                None => true,
            })
            .collect();
        candidates.sort_by(|a, b| distance_to(a, t).total_cmp(&distance_to(b, t)));

        let mut started = 0;
        for item in candidates {
            if in_flight >= max_in_flight {
                break;
            }
            self.inner.ensure_entry(&mut entries, item, true);
            in_flight += 1;
            started += 1;
        }
        if started > 0 {
            tracing::debug!(started, t, "preloading lookahead window");
        }
        started
    }

    /// Take a lease on `item`'s handle, waiting at most the load timeout for it to be ready.
    ///
    /// Returns `None` for items without a decodable resource. The lease's handle is fixed at this
    /// point; a load that finishes later is not picked up by it.
    pub fn lease(&self, item: &TimelineItem) -> Option<ResourceLease> {
        let mut lease = self.reserve(item)?;
        lease.wait_ready();
        Some(lease)
    }

    /// Take a lease on `item` and start its load without waiting.
    ///
    /// The handle stays unset until [`ResourceLease::wait_ready`]. Reserving several items before
    /// waiting lets their loads overlap.
    pub fn reserve(&self, item: &TimelineItem) -> Option<ResourceLease> {
        if !item.media.kind.is_decodable() {
            return None;
        }
        let slot = {
            let mut entries = self.inner.entries();
            let entry = self.inner.ensure_entry(&mut entries, item, false);
            entry.leases += 1;
            Arc::clone(&entry.slot)
        };
        Some(ResourceLease {
            inner: Arc::clone(&self.inner),
            item: item.id,
            slot,
            resource: None,
        })
    }

    /// Release entries whose ids are not in `present`.
    ///
    /// Leased entries are only marked; they go away with their last lease. Returns the number of
    /// entries removed now.
    pub fn evict(&self, present: &[ItemId]) -> usize {
        let mut entries = self.inner.entries();
        let before = entries.len();
        entries.retain(|id, e| {
            if present.contains(id) {
                return true;
            }
            if e.leases > 0 {
                e.retain = false;
                return true;
            }
            false
        });
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "evicted media resources");
        }
        removed
    }

    /// Current occupancy.
    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.entries();
        let mut stats = CacheStats {
            entries: entries.len(),
            ..CacheStats::default()
        };
        for e in entries.values() {
            match &*e.slot.state.lock().unwrap_or_else(PoisonError::into_inner) {
                SlotState::Loading => stats.loading += 1,
                SlotState::Ready(_) => stats.ready += 1,
                SlotState::Failed(_) => stats.failed += 1,
            }
            if e.leases > 0 {
                stats.leased += 1;
            }
        }
        stats
    }

    /// Failure message of `item`'s last load, if it failed.
    pub fn load_error(&self, item: ItemId) -> Option<String> {
        let slot = self.inner.entries().get(&item).map(|e| Arc::clone(&e.slot))?;
        match &*slot.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SlotState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

impl ResourceLookup for MediaResourceCache {
    fn ready(&self, item: ItemId) -> Option<Arc<MediaResource>> {
        self.peek(item)
    }
}

fn distance_to(item: &TimelineItem, t: f64) -> f64 {
    if item.is_active_at(t) {
        0.0
    } else if item.start > t {
        item.start - t
    } else {
        t - item.end()
    }
}

/// Keeps one cache entry alive. Dropping the last lease of an entry that preview never retained
/// removes it.
pub struct ResourceLease {
    inner: Arc<CacheInner>,
    item: ItemId,
    slot: Arc<LoadSlot>,
    resource: Option<Arc<MediaResource>>,
}

impl ResourceLease {
    /// Wait at most the load timeout for the handle and capture it.
    ///
    /// A handle that is already captured is kept. Returns whether one is available.
    pub fn wait_ready(&mut self) -> bool {
        if self.resource.is_none() {
            self.resource = self.slot.wait(self.inner.load_timeout);
            if self.resource.is_none() {
                tracing::warn!(item = self.item.0, "leased resource unavailable, item will be skipped");
            }
        }
        self.resource.is_some()
    }

    /// Leased item.
    pub fn item(&self) -> ItemId {
        self.item
    }

    /// Handle captured by [`Self::wait_ready`]; `None` when it was not ready in time.
    pub fn resource(&self) -> Option<&Arc<MediaResource>> {
        self.resource.as_ref()
    }
}

impl std::fmt::Debug for ResourceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLease")
            .field("item", &self.item)
            .field("ready", &self.resource.is_some())
            .finish()
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        let mut entries = self.inner.entries();
        let remove = match entries.get_mut(&self.item) {
            Some(e) => {
                e.leases = e.leases.saturating_sub(1);
                e.leases == 0 && !e.retain
            }
            None => false,
        };
        if remove {
            entries.remove(&self.item);
        }
    }
}

impl ResourceLookup for HashMap<ItemId, ResourceLease> {
    fn ready(&self, item: ItemId) -> Option<Arc<MediaResource>> {
        self.get(&item).and_then(|l| l.resource.clone())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
