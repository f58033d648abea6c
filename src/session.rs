//! Editing facade: one timeline store driving one playback scheduler.

use std::sync::Arc;

use crate::assets::loader::MediaLoader;
use crate::audio::output::AudioOutput;
use crate::export::exporter::{ExportOpts, ExportOutput, Exporter};
use crate::export::sink::{AudioEncodeSink, MuxSink, VideoEncodeSink};
use crate::foundation::error::CutlineResult;
use crate::playback::clock::Clock;
use crate::playback::scheduler::{PlaybackOpts, PlaybackScheduler};
use crate::render::compositor::Compositor;
use crate::render::surface::DrawSurface;
use crate::timeline::edit::ItemPatch;
use crate::timeline::model::{Item, ItemId, Timeline, Track, TrackId};
use crate::timeline::store::{ListenerId, TimelineStore};

/// Host-facing editor state.
///
/// Every edit goes through the [`TimelineStore`]; when it changes the timeline, the new version
/// is handed to playback. Edit methods return whether anything changed.
pub struct EditorSession<S: DrawSurface> {
    store: TimelineStore,
    player: PlaybackScheduler<S>,
    loader: Arc<dyn MediaLoader>,
}

impl<S: DrawSurface> EditorSession<S> {
    pub fn new(
        timeline: Timeline,
        compositor: Compositor<S>,
        output: Box<dyn AudioOutput>,
        loader: Arc<dyn MediaLoader>,
        clock: Box<dyn Clock>,
        opts: PlaybackOpts,
    ) -> Self {
        let store = TimelineStore::new(timeline);
        let player = PlaybackScheduler::new(
            store.current(),
            compositor,
            output,
            Arc::clone(&loader),
            clock,
            opts,
        );
        Self {
            store,
            player,
            loader,
        }
    }

    pub fn timeline(&self) -> Arc<Timeline> {
        self.store.current()
    }

    pub fn player(&self) -> &PlaybackScheduler<S> {
        &self.player
    }

    /// Needed to drive ticks.
    pub fn player_mut(&mut self) -> &mut PlaybackScheduler<S> {
        &mut self.player
    }

    pub fn add_item(&mut self, track_index: usize, item: Item) -> bool {
        self.edit(|t| t.add_item(track_index, item))
    }

    pub fn update_item(&mut self, id: &ItemId, patch: &ItemPatch) -> bool {
        self.edit(|t| t.update_item(id, patch))
    }

    pub fn remove_item(&mut self, id: &ItemId) -> bool {
        self.edit(|t| t.remove_item(id))
    }

    pub fn split_item(&mut self, id: &ItemId, at_frame: u64) -> bool {
        self.edit(|t| t.split_item(id, at_frame))
    }

    pub fn add_track(&mut self, track: Track) -> bool {
        self.edit(|t| t.add_track(track))
    }

    pub fn remove_track(&mut self, id: &TrackId) -> bool {
        self.edit(|t| t.remove_track(id))
    }

    /// Load a different project. Playback keeps its position.
    pub fn replace_timeline(&mut self, timeline: Timeline) {
        self.store.replace(timeline);
        self.player.set_timeline(self.store.current());
    }

    pub fn seek_to(&mut self, time_s: f64) {
        self.player.seek_to(time_s);
    }

    pub fn play(&mut self) {
        self.player.play();
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn current_frame(&self) -> u64 {
        self.player.current_frame()
    }

    /// `listener` runs after every change to the timeline.
    pub fn subscribe(&mut self, listener: impl FnMut(&Arc<Timeline>) + 'static) -> ListenerId {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Export the current timeline on a fresh surface. Playback state is not touched.
    pub fn export<E: DrawSurface>(
        &self,
        surface: E,
        opts: &ExportOpts,
        video_sink: &mut dyn VideoEncodeSink,
        audio_sink: &mut dyn AudioEncodeSink,
        mux_sink: &mut dyn MuxSink,
    ) -> CutlineResult<ExportOutput> {
        let mut exporter = Exporter::new(surface, Arc::clone(&self.loader))?;
        exporter.export(&self.store.current(), opts, video_sink, audio_sink, mux_sink)
    }

    fn edit(&mut self, edit: impl FnOnce(&Timeline) -> Timeline) -> bool {
        let changed = self.store.apply(edit);
        if changed {
            self.player.set_timeline(self.store.current());
        }
        changed
    }
}

impl<S: DrawSurface> std::fmt::Debug for EditorSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("store", &self.store)
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
