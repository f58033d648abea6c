use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;

use crate::assets::decode::RasterImage;
use crate::decode::service::{DecodeEvent, DecodeRequest, FrameDecoder};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::timeline::model::ItemId;

/// Environment override for [`FrameCacheOpts::capacity`].
pub const FRAME_CACHE_CAPACITY_ENV: &str = "CUTLINE_FRAME_CACHE_CAPACITY";
const DEFAULT_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCacheOpts {
    /// Maximum number of decoded frames held at once.
    pub capacity: usize,
    /// Upper bound for one blocking wait in [`FrameCache::await_frame`].
    pub await_timeout: Duration,
}

impl Default for FrameCacheOpts {
    fn default() -> Self {
        let capacity = std::env::var(FRAME_CACHE_CAPACITY_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_CAPACITY);
        Self {
            capacity,
            await_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for decode traffic; `released` counts every frame leaving the cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCacheStats {
    pub issued: u64,
    pub completed: u64,
    pub failed: u64,
    pub released: u64,
    pub evicted: u64,
    /// Completions that arrived after their request was flushed.
    pub dropped_stale: u64,
    /// Requests the decoder skipped in favour of a newer one.
    pub skipped: u64,
}

type FrameKey = (ItemId, u64);

fn key_ms(timestamp_us: u64) -> u64 {
    timestamp_us.saturating_add(500) / 1000
}

/// Bounded cache of decoded frames keyed by `(item, millisecond timestamp)`.
///
/// Evicts the least recently used frame once `capacity` is exceeded. Owns the per-item decoders, every cached frame and the in-flight request set. All frames
/// leave through one release path (eviction, supersession, flush, cleanup and `Drop`).
pub struct FrameCache {
    opts: FrameCacheOpts,
    decoders: HashMap<ItemId, Box<dyn FrameDecoder>>,
    entries: LruCache<FrameKey, Arc<RasterImage>>,
    pending: HashSet<FrameKey>,
    stats: FrameCacheStats,
    closed: bool,
}

impl FrameCache {
    pub fn new(opts: FrameCacheOpts) -> Self {
        Self {
            opts,
            decoders: HashMap::new(),
            entries: LruCache::unbounded(),
            pending: HashSet::new(),
            stats: FrameCacheStats::default(),
            closed: false,
        }
    }

    /// Attach the decoder serving `item`, replacing (and closing) any previous one.
    ///
    /// Rejects decoders with an invalid configuration.
    pub fn attach_decoder(
        &mut self,
        item: ItemId,
        decoder: Box<dyn FrameDecoder>,
    ) -> CutlineResult<()> {
        decoder.config().validate()?;
        self.detach_decoder(&item);
        self.closed = false;
        self.decoders.insert(item, decoder);
        Ok(())
    }

    pub fn has_decoder(&self, item: &ItemId) -> bool {
        self.decoders.contains_key(item)
    }

    /// Close the item's decoder and release its frames.
    pub fn detach_decoder(&mut self, item: &ItemId) {
        if let Some(mut decoder) = self.decoders.remove(item) {
            decoder.close();
        }
        self.pending.retain(|(id, _)| id != item);
        let keys = self.keys_of(item, |_| true);
        for key in keys {
            self.release_key(&key);
        }
    }

    /// Detach every decoder whose item fails `keep`.
    pub fn retain_decoders(&mut self, mut keep: impl FnMut(&ItemId) -> bool) {
        let gone: Vec<ItemId> = self
            .decoders
            .keys()
            .filter(|id| !keep(*id))
            .cloned()
            .collect();
        for id in gone {
            self.detach_decoder(&id);
        }
    }

    /// Issue a decode unless the key is already cached or in flight.
    ///
    /// Returns whether a new decode was issued.
    pub fn request_frame(&mut self, item: &ItemId, timestamp_ms: u64, source_time_s: f64) -> bool {
        let key = (item.clone(), timestamp_ms);
        if self.entries.contains(&key) || self.pending.contains(&key) {
            return false;
        }
        let Some(decoder) = self.decoders.get_mut(item) else {
            tracing::debug!(item = %item, "request_frame: no decoder attached");
            return false;
        };

        match decoder.decode(DecodeRequest {
            timestamp_ms,
            source_time_s,
        }) {
            Ok(()) => {
                self.pending.insert(key);
                self.stats.issued += 1;
                true
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(item = %item, timestamp_ms, error = %e, "decode request rejected");
                false
            }
        }
    }

    /// Non-blocking lookup. A hit marks the frame as most recently used.
    pub fn get_frame(&mut self, item: &ItemId, timestamp_ms: u64) -> Option<Arc<RasterImage>> {
        self.entries.get(&(item.clone(), timestamp_ms)).cloned()
    }

    /// Newest cached frame of `item` at or before `timestamp_ms`, with its key timestamp.
    ///
    /// Covers decoders that finish a request after the caller has moved on to a later key.
    pub fn latest_frame(
        &mut self,
        item: &ItemId,
        timestamp_ms: u64,
    ) -> Option<(u64, Arc<RasterImage>)> {
        let newest = self
            .entries
            .iter()
            .filter(|((id, ts), _)| id == item && *ts <= timestamp_ms)
            .map(|((_, ts), _)| *ts)
            .max()?;
        self.get_frame(item, newest).map(|frame| (newest, frame))
    }

    /// Release every cached frame of `item` keyed before `timestamp_ms`. Returns how many were released.
    pub fn release_before(&mut self, item: &ItemId, timestamp_ms: u64) -> usize {
        let keys = self.keys_of(item, |ts| ts < timestamp_ms);
        for key in &keys {
            self.release_key(key);
        }
        keys.len()
    }

    pub fn is_pending(&self, item: &ItemId, timestamp_ms: u64) -> bool {
        self.pending.contains(&(item.clone(), timestamp_ms))
    }

    /// Move every finished decode into the cache. Returns the number of frames inserted.
    pub fn pump(&mut self) -> usize {
        let mut events = Vec::new();
        for (id, decoder) in &mut self.decoders {
            events.extend(decoder.poll().into_iter().map(|ev| (id.clone(), ev)));
        }
        let mut inserted = 0;
        for (id, event) in events {
            if self.complete(&id, event) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Block until `(item, timestamp_ms)` is decoded, issuing the request if needed.
    pub fn await_frame(
        &mut self,
        item: &ItemId,
        timestamp_ms: u64,
        source_time_s: f64,
    ) -> CutlineResult<Arc<RasterImage>> {
        if !self.has_decoder(item) {
            return Err(CutlineError::decode(format!(
                "no decoder attached for item \"{item}\""
            )));
        }
        self.request_frame(item, timestamp_ms, source_time_s);
        loop {
            if let Some(frame) = self.get_frame(item, timestamp_ms) {
                return Ok(frame);
            }
            if !self.is_pending(item, timestamp_ms) {
                return Err(CutlineError::decode(format!(
                    "frame {timestamp_ms}ms of item \"{item}\" could not be requested"
                )));
            }

            let timeout = self.opts.await_timeout;
            let event = self
                .decoders
                .get_mut(item)
                .and_then(|decoder| decoder.wait(timeout))
                .ok_or_else(|| {
                    CutlineError::decode(format!(
                        "timed out waiting for frame {timestamp_ms}ms of item \"{item}\""
                    ))
                })?;

            if let DecodeEvent::Failed {
                timestamp_us,
                message,
            } = &event
                && key_ms(*timestamp_us) == timestamp_ms
            {
                let message = message.clone();
                self.complete(item, event);
                return Err(CutlineError::decode(format!(
                    "item \"{item}\" at {timestamp_ms}ms: {message}"
                )));
            }
            self.complete(item, event);
        }
    }

    /// Release every cached frame and forget in-flight requests. Decoders stay attached.
    pub fn flush(&mut self) {
        while let Some((_, frame)) = self.entries.pop_lru() {
            self.release(frame);
        }
        self.pending.clear();
    }

    /// Flush and close every decoder. Idempotent.
    pub fn cleanup(&mut self) {
        if self.closed {
            return;
        }
        self.flush();
        for (_, mut decoder) in self.decoders.drain() {
            decoder.close();
        }
        self.closed = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn capacity(&self) -> usize {
        self.opts.capacity
    }

    pub fn stats(&self) -> FrameCacheStats {
        self.stats
    }

    /// Apply one decoder event. Returns whether a frame was inserted.
    fn complete(&mut self, item: &ItemId, event: DecodeEvent) -> bool {
        match event {
            DecodeEvent::Frame {
                timestamp_us,
                image,
            } => {
                let key = (item.clone(), key_ms(timestamp_us));
                let frame = Arc::new(image);
                if !self.pending.remove(&key) {
                    self.stats.dropped_stale += 1;
                    self.release(frame);
                    return false;
                }
                if let Some(old) = self.entries.put(key, frame) {
                    self.release(old);
                }
                self.stats.completed += 1;
                self.enforce_capacity();
                true
            }
            DecodeEvent::Failed {
                timestamp_us,
                message,
            } => {
                let key = (item.clone(), key_ms(timestamp_us));
                self.pending.remove(&key);
                self.stats.failed += 1;
                tracing::warn!(item = %item, timestamp_ms = key.1, %message, "frame decode failed");
                false
            }
            DecodeEvent::Skipped { timestamp_us } => {
                let key = (item.clone(), key_ms(timestamp_us));
                if self.pending.remove(&key) {
                    self.stats.skipped += 1;
                }
                false
            }
        }
    }

    fn enforce_capacity(&mut self) {
        while self.entries.len() > self.opts.capacity.max(1) {
            let Some((_, frame)) = self.entries.pop_lru() else {
                break;
            };
            self.stats.evicted += 1;
            self.release(frame);
        }
    }

    fn keys_of(&self, item: &ItemId, mut pick: impl FnMut(u64) -> bool) -> Vec<FrameKey> {
        self.entries
            .iter()
            .map(|(key, _)| key)
            .filter(|(id, ts)| id == item && pick(*ts))
            .cloned()
            .collect()
    }

    fn release_key(&mut self, key: &FrameKey) {
        if let Some(frame) = self.entries.pop(key) {
            self.release(frame);
        }
    }

    fn release(&mut self, frame: Arc<RasterImage>) {
        self.stats.released += 1;
        drop(frame);
    }
}

impl Drop for FrameCache {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for FrameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCache")
            .field("capacity", &self.opts.capacity)
            .field("decoders", &self.decoders.len())
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/cache.rs"]
mod tests;
