use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::assets::decode::RasterImage;
use crate::assets::loader::MediaLoader;
use crate::audio::output::AudioOutput;
use crate::audio::scheduler::AudioScheduler;
use crate::compile::plan::RenderPlan;
use crate::decode::cache::{FrameCache, FrameCacheOpts};
use crate::foundation::error::CutlineResult;
use crate::playback::clock::Clock;
use crate::render::compositor::Compositor;
use crate::render::surface::DrawSurface;
use crate::timeline::model::{ItemId, ItemKind, Timeline};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Permission to run one tick. Only the most recently armed token is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickToken(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackOpts {
    pub frame_cache: FrameCacheOpts,
    pub master_volume: f32,
    /// Audio is rescheduled once its position drifts more than this many frames from video.
    pub drift_tolerance_frames: f64,
}

impl Default for PlaybackOpts {
    fn default() -> Self {
        Self {
            frame_cache: FrameCacheOpts::default(),
            master_volume: 1.0,
            drift_tolerance_frames: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PlaybackStats {
    pub ticks: u64,
    pub stale_ticks: u64,
    pub frames_rendered: u64,
    pub render_errors: u64,
    pub decode_requests: u64,
    pub audio_schedules: u64,
    pub media_errors: u64,
}

/// Real-time playback: keeps the compositor and the audio output in step with a clock.
///
/// The host drives it cooperatively: poll [`PlaybackScheduler::pending_tick`], wait about one
/// frame, then call [`PlaybackScheduler::tick`] with the token.
pub struct PlaybackScheduler<S: DrawSurface> {
    clock: Box<dyn Clock>,
    loader: Arc<dyn MediaLoader>,
    timeline: Arc<Timeline>,
    cache: FrameCache,
    audio: AudioScheduler,
    compositor: Compositor<S>,
    opts: PlaybackOpts,
    state: PlaybackState,
    /// Clock time at which position 0 played.
    origin_s: f64,
    /// Position while not playing.
    position_s: f64,
    current_frame: u64,
    armed: Option<TickToken>,
    next_token: u64,
    last_frames: HashMap<ItemId, Arc<RasterImage>>,
    stats: PlaybackStats,
    cleaned_up: bool,
}

impl<S: DrawSurface> PlaybackScheduler<S> {
    pub fn new(
        timeline: Arc<Timeline>,
        compositor: Compositor<S>,
        output: Box<dyn AudioOutput>,
        loader: Arc<dyn MediaLoader>,
        clock: Box<dyn Clock>,
        opts: PlaybackOpts,
    ) -> Self {
        let mut audio = AudioScheduler::new(output);
        audio.set_master_volume(opts.master_volume);
        audio.suspend();

        let current_frame = timeline.current_frame;
        let position_s = timeline.fps.frames_to_secs(current_frame);
        let mut scheduler = Self {
            cache: FrameCache::new(opts.frame_cache.clone()),
            origin_s: clock.now_s() - position_s,
            clock,
            loader,
            timeline,
            audio,
            compositor,
            opts,
            state: PlaybackState::Stopped,
            position_s,
            current_frame,
            armed: None,
            next_token: 0,
            last_frames: HashMap::new(),
            stats: PlaybackStats::default(),
            cleaned_up: false,
        };
        scheduler.prepare_media();
        scheduler.render_current();
        scheduler
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Playback position in seconds.
    pub fn position_s(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => self.clock.now_s() - self.origin_s,
            PlaybackState::Stopped | PlaybackState::Paused => self.position_s,
        }
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    pub fn compositor(&self) -> &Compositor<S> {
        &self.compositor
    }

    pub fn frame_cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn audio(&self) -> &AudioScheduler {
        &self.audio
    }

    pub fn pending_tick(&self) -> Option<TickToken> {
        self.armed
    }

    pub fn play(&mut self) {
        if self.cleaned_up || self.state == PlaybackState::Playing {
            return;
        }
        if self.position_s >= self.timeline.duration_secs() {
            self.position_s = 0.0;
            self.current_frame = 0;
        }
        self.origin_s = self.clock.now_s() - self.position_s;
        self.audio.resume();
        self.state = PlaybackState::Playing;
        self.arm();
        tracing::debug!(position_s = self.position_s, "play");
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.disarm();
        self.position_s =
            (self.clock.now_s() - self.origin_s).clamp(0.0, self.timeline.duration_secs());
        self.state = PlaybackState::Paused;
        self.audio.suspend();
        tracing::debug!(position_s = self.position_s, "pause");
    }

    /// Jump to `time_s` (clamped to the timeline) and render that frame right away.
    #[tracing::instrument(skip(self))]
    pub fn seek_to(&mut self, time_s: f64) {
        if self.cleaned_up {
            return;
        }
        let duration = self.timeline.duration_secs();
        let t = if time_s.is_finite() {
            time_s.clamp(0.0, duration)
        } else {
            0.0
        };

        let was_playing = self.is_playing();
        if was_playing {
            self.pause();
        }

        self.cache.flush();
        self.audio.stop_all();
        self.last_frames.clear();

        self.position_s = t;
        self.origin_s = self.clock.now_s() - t;
        self.current_frame = self.timeline.fps.secs_to_frames_floor(t);
        self.render_current();

        // A seek to the very end while playing parks there like reaching the end does.
        if was_playing && t < duration {
            self.play();
        }
    }

    /// Stop and rewind to the start.
    pub fn stop(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.disarm();
        self.state = PlaybackState::Stopped;
        self.audio.suspend();
        self.audio.stop_all();
        self.cache.flush();
        self.last_frames.clear();
        self.position_s = 0.0;
        self.current_frame = 0;
        self.render_current();
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.audio.set_master_volume(volume);
    }

    /// Resize the output surface. Scheduled audio is untouched.
    pub fn update_size(&mut self, width: u32, height: u32) -> CutlineResult<()> {
        self.compositor.update_size(width, height)?;
        if !self.is_playing() {
            self.render_current();
        }
        Ok(())
    }

    /// Swap in an edited timeline, keeping the current frame.
    pub fn set_timeline(&mut self, timeline: Arc<Timeline>) {
        if self.cleaned_up {
            return;
        }
        self.timeline = if timeline.current_frame == self.current_frame {
            timeline
        } else {
            Arc::new(timeline.with_current_frame(self.current_frame))
        };
        self.prepare_media();
        if !self.is_playing() {
            self.render_current();
        }
    }

    /// Attach decoders, start audio loads and load stills for the current timeline; release
    /// whatever belonged to removed items.
    #[tracing::instrument(skip(self), fields(items = self.timeline.items().count()))]
    pub fn prepare_media(&mut self) {
        let timeline = Arc::clone(&self.timeline);

        let mut video_ids = HashSet::new();
        let mut media_ids = HashSet::new();
        let mut still_sources = HashSet::new();
        for (_, item) in timeline.items() {
            match &item.kind {
                ItemKind::Video(clip) => {
                    video_ids.insert(item.id.clone());
                    media_ids.insert(item.id.clone());
                    if !self.cache.has_decoder(&item.id) {
                        let attached = self.loader.open_video(&clip.source).and_then(|decoder| {
                            self.cache.attach_decoder(item.id.clone(), decoder)
                        });
                        if let Err(err) = attached {
                            tracing::warn!(
                                item = %item.id,
                                source = %clip.source,
                                %err,
                                "failed to open video decoder"
                            );
                            self.stats.media_errors += 1;
                        }
                    }
                    self.audio.load_buffer(&item.id, &clip.source, &self.loader);
                }
                ItemKind::Audio(clip) => {
                    media_ids.insert(item.id.clone());
                    self.audio.load_buffer(&item.id, &clip.source, &self.loader);
                }
                ItemKind::Image { source } => {
                    still_sources.insert(source.as_str());
                }
                ItemKind::Text { .. } | ItemKind::Solid { .. } => {}
            }
        }

        self.cache.retain_decoders(|id| video_ids.contains(id));
        self.audio.retain_items(|id| media_ids.contains(id));
        self.last_frames.retain(|id, _| video_ids.contains(id));
        self.compositor
            .load_stills(still_sources.iter().copied(), self.loader.as_ref());
        self.compositor
            .retain_stills(|source| still_sources.contains(source));
    }

    /// Run one tick. Stale tokens are counted and ignored.
    pub fn tick(&mut self, token: TickToken) -> bool {
        if self.armed != Some(token) {
            self.stats.stale_ticks += 1;
            tracing::trace!(?token, "stale tick ignored");
            return false;
        }
        self.armed = None;
        self.stats.ticks += 1;

        let fps = self.timeline.fps;
        let elapsed = (self.clock.now_s() - self.origin_s).max(0.0);
        let frame = fps.secs_to_frames_floor(elapsed);

        let total = self.timeline.total_frames();
        if frame >= total {
            self.position_s = self.timeline.duration_secs();
            self.current_frame = total;
            self.state = PlaybackState::Paused;
            self.audio.suspend();
            self.audio.stop_all();
            tracing::debug!(frame, total, "reached end of timeline");
            return true;
        }

        self.current_frame = frame;
        self.timeline = Arc::new(self.timeline.with_current_frame(frame));
        let plan = self.timeline.render_plan(frame);

        self.composite(&plan, elapsed);
        self.sync_audio(&plan, elapsed);

        self.arm();
        true
    }

    /// Force Stopped and release decoders, cached frames and audio. Later calls do nothing.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.disarm();
        self.state = PlaybackState::Stopped;
        self.cache.flush();
        self.cache.cleanup();
        self.audio.close();
        self.last_frames.clear();
        self.cleaned_up = true;
        tracing::debug!("playback cleaned up");
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    fn arm(&mut self) {
        let token = TickToken(self.next_token);
        self.next_token += 1;
        self.armed = Some(token);
    }

    fn disarm(&mut self) {
        self.armed = None;
    }

    fn render_current(&mut self) {
        if self.cleaned_up {
            return;
        }
        let frame = self.current_frame;
        if self.timeline.current_frame != frame {
            self.timeline = Arc::new(self.timeline.with_current_frame(frame));
        }
        let plan = self.timeline.render_plan(frame);
        self.composite(&plan, self.position_s);
    }

    fn composite(&mut self, plan: &RenderPlan, elapsed: f64) {
        let fps = plan.fps;
        let key_ms = (elapsed * 1000.0).round() as u64;

        for layer in plan.video_layers() {
            let Some(clip) = layer.item.media() else {
                continue;
            };
            let source_time_s = clip.trim_start_s + (elapsed - fps.frames_to_secs(layer.item.start));
            if self
                .cache
                .request_frame(&layer.item.id, key_ms, source_time_s.max(0.0))
            {
                self.stats.decode_requests += 1;
            }
        }

        self.cache.pump();

        let mut frames = HashMap::new();
        for layer in plan.video_layers() {
            let id = &layer.item.id;
            // Decoders may finish a tick or more late; show the newest frame that has landed.
            if let Some((shown_ms, frame)) = self.cache.latest_frame(id, key_ms) {
                self.cache.release_before(id, shown_ms);
                self.last_frames.insert(id.clone(), frame);
            }
            if let Some(frame) = self.last_frames.get(id) {
                frames.insert(id.clone(), Arc::clone(frame));
            }
        }

        match self.compositor.render_frame(plan, &frames) {
            Ok(_) => self.stats.frames_rendered += 1,
            Err(err) => {
                self.stats.render_errors += 1;
                tracing::warn!(frame = plan.frame, %err, "composite failed");
            }
        }
    }

    fn sync_audio(&mut self, plan: &RenderPlan, elapsed: f64) {
        self.audio.pump();

        for id in self.audio.active_items() {
            if plan.region(&id).is_none() {
                self.audio.stop_region(&id);
            }
        }

        let fps = plan.fps;
        let tolerance = self.opts.drift_tolerance_frames * fps.frame_duration_secs();
        for region in &plan.regions {
            let item = &region.item;
            if !self.audio.is_loaded(&item.id) {
                continue;
            }
            let Some(clip) = item.media() else {
                continue;
            };
            let into_item = (elapsed - fps.frames_to_secs(item.start)).max(0.0);
            let expected = clip.trim_start_s + into_item;
            let in_sync = self
                .audio
                .region_position(&item.id)
                .is_some_and(|pos| (pos - expected).abs() <= tolerance);
            if in_sync {
                continue;
            }

            let remaining = fps.frames_to_secs(item.duration) - into_item;
            self.audio
                .schedule_region(&item.id, 0.0, remaining, region.gain as f32, expected);
            self.stats.audio_schedules += 1;
        }
    }
}

impl<S: DrawSurface> Drop for PlaybackScheduler<S> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<S: DrawSurface> std::fmt::Debug for PlaybackScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("state", &self.state)
            .field("current_frame", &self.current_frame)
            .field("armed", &self.armed)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/scheduler.rs"]
mod tests;
