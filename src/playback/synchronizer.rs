use std::sync::Arc;
use std::time::Instant;

use crate::assets::cache::MediaResourceCache;
use crate::assets::playhead::PlayheadSet;
use crate::audio::graph::{AudioMixGraph, AudioMixState};
use crate::config::EngineConfig;
use crate::foundation::core::Canvas;
use crate::foundation::error::CutlineResult;
use crate::model::media::MediaKind;
use crate::model::timeline::{ItemId, ItemSnapshot, TimelineItem, active_media_at, items_duration};
use crate::model::volume::TrackVolumes;
use crate::render::backend::{FrameRGBA, Surface};
use crate::render::compositor::FrameCompositor;

/// Transport state of the preview driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not advancing; the last frame stays visible.
    Stopped,
    /// Advancing on every `tick`.
    Playing,
    /// Repositioning; transient within a `seek` call.
    Seeking,
}

/// Real-time preview driver.
///
/// Cooperative and single-threaded: the host calls [`tick`](Self::tick) from its frame loop.
/// No call blocks longer than the cache's load timeout, and failures are logged and swallowed.
pub struct PlaybackSynchronizer {
    cache: MediaResourceCache,
    config: EngineConfig,
    compositor: FrameCompositor,
    mix: AudioMixGraph,
    playheads: PlayheadSet,
    surface: Surface,
    items: ItemSnapshot,
    volumes: TrackVolumes,
    state: PlaybackState,
    current_time: f64,
    last_tick: Option<Instant>,
    primary: Option<ItemId>,
    renders: u64,
}

impl PlaybackSynchronizer {
    /// Preview driver drawing into a `canvas`-sized surface.
    pub fn new(
        cache: MediaResourceCache,
        config: EngineConfig,
        canvas: Canvas,
    ) -> CutlineResult<Self> {
        let surface = Surface::new(canvas.width, canvas.height)?;
        Ok(Self {
            mix: AudioMixGraph::new(config.sample_rate),
            playheads: PlayheadSet::new(config.seek_tolerance_secs),
            cache,
            config,
            compositor: FrameCompositor::new(),
            surface,
            items: Arc::new(Vec::new()),
            volumes: TrackVolumes::new(),
            state: PlaybackState::Stopped,
            current_time: 0.0,
            last_tick: None,
            primary: None,
            renders: 0,
        })
    }

    /// Install a new item snapshot and volume table from the editing UI.
    ///
    /// Cache entries and playheads of removed items are released.
    pub fn set_timeline(&mut self, items: ItemSnapshot, volumes: TrackVolumes) {
        let present: Vec<ItemId> = items.iter().map(|it| it.id).collect();
        self.cache.evict(&present);
        self.playheads.retain(&present);
        if self.primary.is_some_and(|p| !present.contains(&p)) {
            self.primary = None;
        }
        self.items = items;
        self.volumes = volumes;
    }

    /// Transport state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current timeline time.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Timeline length of the installed snapshot.
    pub fn duration(&self) -> f64 {
        items_duration(&self.items)
    }

    /// Item whose playhead drives the clock.
    pub fn primary(&self) -> Option<ItemId> {
        self.primary
    }

    /// Number of render passes performed so far.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Last rendered frame.
    pub fn frame(&self) -> FrameRGBA {
        self.surface.to_frame()
    }

    /// Audio routing of the last pass.
    pub fn mix_state(&self) -> &AudioMixState {
        self.mix.state()
    }

    /// Start playing from the current time (from `0` when at the end).
    pub fn play(&mut self, now: Instant) {
        if self.state == PlaybackState::Playing {
            return;
        }
        if self.current_time >= self.duration() {
            self.current_time = 0.0;
        }
        self.state = PlaybackState::Playing;
        self.last_tick = Some(now);
        let t = self.current_time;
        let items = Arc::clone(&self.items);
        for item in active_time_based(&items, t) {
            self.playheads.seek_exact(item.id, item.source_time_at(t));
            self.playheads.entry(item.id).play();
        }
        tracing::debug!(t, "playback started");
    }

    /// Pause all handles. The last frame stays visible.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.last_tick = None;
        self.playheads.pause_all();
        tracing::debug!(t = self.current_time, "playback stopped");
    }

    /// Jump to `t` (clamped to the timeline) and render exactly one pass there.
    ///
    /// Active resources are acquired first with the bounded wait, so a seek shows everything
    /// that can load within the timeout.
    pub fn seek(&mut self, t: f64) {
        let resume = self.state == PlaybackState::Playing;
        self.state = PlaybackState::Seeking;
        let t = t.clamp(0.0, self.duration());
        self.current_time = t;

        let items = Arc::clone(&self.items);
        for item in active_media_at(&items, t) {
            self.cache.acquire(item);
            if item.media.kind.is_time_based() {
                self.playheads.seek_exact(item.id, item.source_time_at(t));
            }
        }
        self.primary = self.primary_at(t);
        self.pass(t);

        if resume {
            self.state = PlaybackState::Playing;
            self.last_tick = None;
        } else {
            self.playheads.pause_all();
            self.state = PlaybackState::Stopped;
        }
    }

    /// Advance playback to `now`. Does nothing unless playing.
    pub fn tick(&mut self, now: Instant) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let dt = match self.last_tick {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick = Some(now);
        self.playheads.advance_all(dt);

        let t = self.clock(dt);
        let end = self.duration();
        if t >= end {
            self.current_time = end;
            self.stop();
            tracing::debug!(end, "reached timeline end");
            return;
        }
        self.current_time = t;

        let primary = self.primary_at(t);
        if primary != self.primary {
            tracing::debug!(from = ?self.primary, to = ?primary, t, "primary video changed");
            if let Some(id) = primary
                && let Some(item) = self.items.iter().find(|it| it.id == id)
            {
                self.playheads.seek_exact(id, item.source_time_at(t));
            }
            self.primary = primary;
        }

        let active: Vec<ItemId> = active_time_based(&self.items, t).map(|it| it.id).collect();
        for id in &active {
            self.playheads.entry(*id).play();
        }
        self.playheads.pause_except(&active);

        self.pass(t);
        self.cache.preload_window(
            &self.items,
            t,
            self.config.preview_lookahead_secs,
            self.config.preview_parallel_loads,
        );
    }

    /// Authoritative time: the ready primary video's playhead in timeline space, else wall clock.
    ///
    /// Playheads are advanced by the wall-clock delta in `tick`, so the handle position is
    /// simulated until a decoder reports its own presentation position.
    fn clock(&self, dt: f64) -> f64 {
        let from_primary = self.primary.and_then(|id| {
            let item = self.items.iter().find(|it| it.id == id)?;
            self.cache.peek(id)?;
            let head = self.playheads.get(id)?;
            Some(item.timeline_time_for(head.position()))
        });
        from_primary.unwrap_or(self.current_time + dt)
    }

    fn primary_at(&self, t: f64) -> Option<ItemId> {
        active_media_at(&self.items, t)
            .into_iter()
            .find(|it| it.media.kind == MediaKind::Video)
            .map(|it| it.id)
    }

    fn pass(&mut self, t: f64) {
        let items = Arc::clone(&self.items);
        if let Err(e) =
            self.compositor
                .render(t, &items, &self.cache, &mut self.playheads, &mut self.surface)
        {
            tracing::warn!(t, error = %e, "preview render failed");
        }
        self.mix.sync(t, &items, &self.volumes, &mut self.playheads);
        self.renders += 1;
    }
}

fn active_time_based(items: &[TimelineItem], t: f64) -> impl Iterator<Item = &TimelineItem> {
    items
        .iter()
        .filter(move |it| it.media.kind.is_time_based() && it.is_active_at(t))
}

impl std::fmt::Debug for PlaybackSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSynchronizer")
            .field("state", &self.state)
            .field("current_time", &self.current_time)
            .field("primary", &self.primary)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/synchronizer.rs"]
mod tests;
