use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::mpsc;

use crate::assets::loader::MediaLoader;
use crate::audio::buffer::AudioBuffer;
use crate::audio::output::{AudioOutput, VoiceId, VoiceSpec};
use crate::foundation::error::CutlineResult;
use crate::timeline::model::ItemId;

#[derive(Clone, Copy, Debug, PartialEq)]
struct ActiveRegion {
    voice: VoiceId,
    start_at_s: f64,
    source_trim_s: f64,
    duration_s: f64,
}

struct LoadResult {
    source: String,
    result: CutlineResult<Arc<AudioBuffer>>,
}

/// Maps timeline items to voices on an [`AudioOutput`].
///
/// At most one region is active per item. Buffers load on background threads and land on the
/// next [`AudioScheduler::pump`].
pub struct AudioScheduler {
    output: Box<dyn AudioOutput>,
    buffers: HashMap<ItemId, Arc<AudioBuffer>>,
    by_source: HashMap<String, Arc<AudioBuffer>>,
    loading: HashMap<String, Vec<ItemId>>,
    failed: HashSet<String>,
    load_tx: mpsc::Sender<LoadResult>,
    load_rx: mpsc::Receiver<LoadResult>,
    regions: HashMap<ItemId, ActiveRegion>,
    master_volume: f32,
    closed: bool,
}

impl AudioScheduler {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let (load_tx, load_rx) = mpsc::channel();
        Self {
            output,
            buffers: HashMap::new(),
            by_source: HashMap::new(),
            loading: HashMap::new(),
            failed: HashSet::new(),
            load_tx,
            load_rx,
            regions: HashMap::new(),
            master_volume: 1.0,
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    pub fn current_time(&self) -> f64 {
        self.output.current_time()
    }

    /// Start playing `item` `future_offset_s` from now, reading its buffer from `source_trim_s`.
    ///
    /// Replaces any region already active for the item. Without a loaded buffer this logs and
    /// does nothing.
    pub fn schedule_region(
        &mut self,
        item: &ItemId,
        future_offset_s: f64,
        duration_s: f64,
        gain: f32,
        source_trim_s: f64,
    ) {
        if self.closed {
            return;
        }
        let Some(buffer) = self.buffers.get(item).cloned() else {
            tracing::warn!(item = %item, "schedule_region: audio buffer not loaded");
            return;
        };

        self.stop_region(item);

        let source_trim_s = source_trim_s.max(0.0);
        let duration_s = duration_s.min(buffer.duration_s() - source_trim_s);
        if duration_s.is_nan() || duration_s <= 0.0 {
            tracing::debug!(item = %item, source_trim_s, "schedule_region: nothing left to play");
            return;
        }

        let start_at_s = self.output.current_time() + future_offset_s.max(0.0);
        let spec = VoiceSpec {
            buffer,
            start_at_s,
            offset_s: source_trim_s,
            duration_s,
            gain,
        };
        match self.output.start_voice(spec) {
            Ok(voice) => {
                self.regions.insert(
                    item.clone(),
                    ActiveRegion {
                        voice,
                        start_at_s,
                        source_trim_s,
                        duration_s,
                    },
                );
            }
            Err(err) => tracing::warn!(item = %item, %err, "schedule_region: output refused voice"),
        }
    }

    pub fn stop_region(&mut self, item: &ItemId) {
        if let Some(region) = self.regions.remove(item) {
            self.output.stop_voice(region.voice);
        }
    }

    pub fn stop_all(&mut self) {
        for (_, region) in self.regions.drain() {
            self.output.stop_voice(region.voice);
        }
    }

    /// Clamped to `[0, 1]`.
    pub fn set_master_volume(&mut self, volume: f32) {
        let v = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.master_volume = v;
        self.output.set_master_gain(v);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Freeze the output clock. Scheduled regions are kept.
    pub fn suspend(&mut self) {
        if !self.closed {
            self.output.suspend();
        }
    }

    pub fn resume(&mut self) {
        if !self.closed {
            self.output.resume();
        }
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.stop_all();
        self.output.close();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Land finished loads and release regions whose voice ended.
    pub fn pump(&mut self) {
        while let Ok(LoadResult { source, result }) = self.load_rx.try_recv() {
            let waiting = self.loading.remove(&source).unwrap_or_default();
            match result {
                Ok(buffer) => {
                    tracing::debug!(%source, items = waiting.len(), "audio buffer loaded");
                    for item in waiting {
                        self.buffers.insert(item, Arc::clone(&buffer));
                    }
                    self.by_source.insert(source, buffer);
                }
                Err(err) => {
                    tracing::warn!(%source, %err, "audio load failed");
                    self.failed.insert(source);
                }
            }
        }

        for voice in self.output.drain_ended() {
            self.regions.retain(|_, region| region.voice != voice);
        }
    }

    /// Start loading `source` for `item` in the background.
    ///
    /// Items sharing a source share one buffer. Failed sources are not retried.
    pub fn load_buffer(&mut self, item: &ItemId, source: &str, loader: &Arc<dyn MediaLoader>) {
        if self.buffers.contains_key(item) || self.failed.contains(source) {
            return;
        }
        if let Some(buffer) = self.by_source.get(source) {
            self.buffers.insert(item.clone(), Arc::clone(buffer));
            return;
        }
        if let Some(waiting) = self.loading.get_mut(source) {
            if !waiting.contains(item) {
                waiting.push(item.clone());
            }
            return;
        }

        let tx = self.load_tx.clone();
        let loader = Arc::clone(loader);
        let source_owned = source.to_string();
        let sample_rate = self.output.sample_rate();
        let spawned = std::thread::Builder::new()
            .name("cutline-audio-load".to_string())
            .spawn(move || {
                let result = loader.load_audio(&source_owned, sample_rate);
                let _ = tx.send(LoadResult {
                    source: source_owned,
                    result,
                });
            });
        match spawned {
            Ok(_) => {
                self.loading.insert(source.to_string(), vec![item.clone()]);
            }
            Err(err) => {
                tracing::warn!(%source, %err, "failed to spawn audio load thread");
                self.failed.insert(source.to_string());
            }
        }
    }

    /// Register an already-decoded buffer for `item`.
    pub fn insert_buffer(&mut self, item: &ItemId, buffer: Arc<AudioBuffer>) {
        self.buffers.insert(item.clone(), buffer);
    }

    /// Drop buffers for items `keep` rejects, stopping their regions.
    pub fn retain_items(&mut self, mut keep: impl FnMut(&ItemId) -> bool) {
        let dropped = self
            .buffers
            .keys()
            .filter(|id| !keep(*id))
            .cloned()
            .collect::<Vec<_>>();
        for id in dropped {
            self.stop_region(&id);
            self.buffers.remove(&id);
        }
    }

    pub fn is_loaded(&self, item: &ItemId) -> bool {
        self.buffers.contains_key(item)
    }

    pub fn is_loading(&self, source: &str) -> bool {
        self.loading.contains_key(source)
    }

    pub fn has_failed(&self, source: &str) -> bool {
        self.failed.contains(source)
    }

    pub fn has_region(&self, item: &ItemId) -> bool {
        self.regions.contains_key(item)
    }

    /// Items with an active region, in no particular order.
    pub fn active_items(&self) -> Vec<ItemId> {
        self.regions.keys().cloned().collect()
    }

    pub fn active_region_count(&self) -> usize {
        self.regions.len()
    }

    /// Source position the item's region is playing now, if one is active.
    pub fn region_position(&self, item: &ItemId) -> Option<f64> {
        let region = self.regions.get(item)?;
        let played = (self.output.current_time() - region.start_at_s).clamp(0.0, region.duration_s);
        Some(region.source_trim_s + played)
    }
}

impl std::fmt::Debug for AudioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioScheduler")
            .field("buffers", &self.buffers.len())
            .field("loading", &self.loading.len())
            .field("regions", &self.regions.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for AudioScheduler {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/scheduler.rs"]
mod tests;
