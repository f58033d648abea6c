use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::assets::decode::RasterImage;
use crate::decode::service::{DecodeEvent, DecodeRequest, DecoderConfig, FrameDecoder};
use crate::foundation::error::{CutlineError, CutlineResult};

#[derive(Debug, Default)]
struct ManualState {
    requests: Vec<DecodeRequest>,
    ready: VecDeque<DecodeEvent>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ManualState>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ManualState> {
        // A poisoned lock only means a feeding thread panicked; the queue itself stays usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Decoder whose completions are fed by the host through a [`ManualDecoderHandle`].
///
/// Used by embedding hosts that decode on their own pipeline, and by tests that need exact
/// control over completion timing.
#[derive(Debug)]
pub struct ManualDecoder {
    config: DecoderConfig,
    shared: Arc<Shared>,
}

/// Host side of a [`ManualDecoder`].
#[derive(Clone, Debug)]
pub struct ManualDecoderHandle {
    shared: Arc<Shared>,
}

impl ManualDecoder {
    pub fn new(config: DecoderConfig) -> (Self, ManualDecoderHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                config,
                shared: Arc::clone(&shared),
            },
            ManualDecoderHandle { shared },
        )
    }
}

impl ManualDecoderHandle {
    /// Every request accepted so far, in issue order.
    pub fn requests(&self) -> Vec<DecodeRequest> {
        self.shared.lock().requests.clone()
    }

    pub fn complete(&self, timestamp_ms: u64, image: RasterImage) {
        self.push(DecodeEvent::Frame {
            timestamp_us: timestamp_ms.saturating_mul(1000),
            image,
        });
    }

    pub fn fail(&self, timestamp_ms: u64, message: impl Into<String>) {
        self.push(DecodeEvent::Failed {
            timestamp_us: timestamp_ms.saturating_mul(1000),
            message: message.into(),
        });
    }

    /// Report that the request at `timestamp_ms` was dropped for a newer one.
    pub fn skip(&self, timestamp_ms: u64) {
        self.push(DecodeEvent::Skipped {
            timestamp_us: timestamp_ms.saturating_mul(1000),
        });
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    fn push(&self, event: DecodeEvent) {
        self.shared.lock().ready.push_back(event);
        self.shared.ready.notify_all();
    }
}

impl FrameDecoder for ManualDecoder {
    fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn decode(&mut self, request: DecodeRequest) -> CutlineResult<()> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(CutlineError::decode("decoder is closed"));
        }
        state.requests.push(request);
        Ok(())
    }

    fn poll(&mut self) -> Vec<DecodeEvent> {
        self.shared.lock().ready.drain(..).collect()
    }

    fn wait(&mut self, timeout: Duration) -> Option<DecodeEvent> {
        let state = self.shared.lock();
        let (mut state, _) = self
            .shared
            .ready
            .wait_timeout_while(state, timeout, |s| s.ready.is_empty() && !s.closed)
            .unwrap_or_else(|e| e.into_inner());
        state.ready.pop_front()
    }

    fn close(&mut self) {
        let mut state = self.shared.lock();
        state.closed = true;
        state.ready.clear();
        drop(state);
        self.shared.ready.notify_all();
    }
}

/// Produces a frame for a source time.
pub type FrameFn = Arc<dyn Fn(f64) -> CutlineResult<RasterImage> + Send + Sync>;

/// Decoder that synthesizes frames with a function; requests complete on the next poll.
pub struct GeneratedDecoder {
    config: DecoderConfig,
    frame_fn: FrameFn,
    queue: VecDeque<DecodeRequest>,
    closed: bool,
}

impl GeneratedDecoder {
    pub fn new(config: DecoderConfig, frame_fn: FrameFn) -> Self {
        Self {
            config,
            frame_fn,
            queue: VecDeque::new(),
            closed: false,
        }
    }

    fn run(&self, request: DecodeRequest) -> DecodeEvent {
        match (self.frame_fn)(request.source_time_s) {
            Ok(image) => DecodeEvent::Frame {
                timestamp_us: request.timestamp_us(),
                image,
            },
            Err(e) => DecodeEvent::Failed {
                timestamp_us: request.timestamp_us(),
                message: e.to_string(),
            },
        }
    }
}

impl std::fmt::Debug for GeneratedDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedDecoder")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl FrameDecoder for GeneratedDecoder {
    fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn decode(&mut self, request: DecodeRequest) -> CutlineResult<()> {
        if self.closed {
            return Err(CutlineError::decode("decoder is closed"));
        }
        self.queue.push_back(request);
        Ok(())
    }

    fn poll(&mut self) -> Vec<DecodeEvent> {
        let queued: Vec<_> = self.queue.drain(..).collect();
        queued.into_iter().map(|req| self.run(req)).collect()
    }

    fn wait(&mut self, _timeout: Duration) -> Option<DecodeEvent> {
        let req = self.queue.pop_front()?;
        Some(self.run(req))
    }

    fn close(&mut self) {
        self.closed = true;
        self.queue.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/manual.rs"]
mod tests;
