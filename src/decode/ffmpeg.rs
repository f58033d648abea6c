use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::assets::decode::RasterImage;
use crate::assets::media::{MediaInfo, decode_video_frame_rgba8};
use crate::decode::service::{DecodeEvent, DecodeRequest, DecoderConfig, FrameDecoder};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Decoder that seeks and decodes single frames with the system `ffmpeg` on a worker thread.
///
/// Only the newest queued request is decoded; older ones queued behind the running decode come
/// back as [`DecodeEvent::Skipped`]. Completions are observed through `poll`/`wait` on the owning
/// thread only.
pub struct FfmpegFrameDecoder {
    config: DecoderConfig,
    requests: Option<mpsc::Sender<DecodeRequest>>,
    events: mpsc::Receiver<DecodeEvent>,
    worker: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    in_flight: usize,
}

impl FfmpegFrameDecoder {
    pub fn spawn(info: MediaInfo) -> CutlineResult<Self> {
        let config = DecoderConfig::new(
            info.video_codec.clone().unwrap_or_default(),
            info.width,
            info.height,
        );
        config.validate()?;

        let (req_tx, req_rx) = mpsc::channel::<DecodeRequest>();
        let (ev_tx, ev_rx) = mpsc::channel::<DecodeEvent>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker_cancelled = Arc::clone(&cancelled);
        let worker = std::thread::Builder::new()
            .name("cutline-ffmpeg-decode".to_string())
            .spawn(move || {
                run_worker(&info, &req_rx, &ev_tx, &worker_cancelled);
            })
            .map_err(|e| CutlineError::decode(format!("failed to spawn decode worker: {e}")))?;

        Ok(Self {
            config,
            requests: Some(req_tx),
            events: ev_rx,
            worker: Some(worker),
            cancelled,
            in_flight: 0,
        })
    }
}

fn run_worker(
    info: &MediaInfo,
    requests: &mpsc::Receiver<DecodeRequest>,
    events: &mpsc::Sender<DecodeEvent>,
    cancelled: &AtomicBool,
) {
    while let Ok(mut newest) = requests.recv() {
        for later in requests.try_iter() {
            let skipped = DecodeEvent::Skipped {
                timestamp_us: newest.timestamp_us(),
            };
            if events.send(skipped).is_err() {
                return;
            }
            newest = later;
        }
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        let event = decode_one(info, newest);
        if cancelled.load(Ordering::Acquire) || events.send(event).is_err() {
            return;
        }
    }
}

fn decode_one(info: &MediaInfo, req: DecodeRequest) -> DecodeEvent {
    let timestamp_us = req.timestamp_us();
    let result = decode_video_frame_rgba8(info, req.source_time_s)
        .and_then(|bytes| RasterImage::from_straight(info.width, info.height, bytes));
    match result {
        Ok(image) => DecodeEvent::Frame {
            timestamp_us,
            image,
        },
        Err(e) => DecodeEvent::Failed {
            timestamp_us,
            message: e.to_string(),
        },
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn decode(&mut self, request: DecodeRequest) -> CutlineResult<()> {
        let tx = self
            .requests
            .as_ref()
            .ok_or_else(|| CutlineError::decode("decoder is closed"))?;
        tx.send(request)
            .map_err(|_| CutlineError::decode("decode worker exited"))?;
        self.in_flight += 1;
        Ok(())
    }

    fn poll(&mut self) -> Vec<DecodeEvent> {
        let out: Vec<DecodeEvent> = self.events.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(out.len());
        out
    }

    fn wait(&mut self, timeout: Duration) -> Option<DecodeEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let ev = self.events.recv_timeout(timeout).ok()?;
        self.in_flight -= 1;
        Some(ev)
    }

    fn close(&mut self) {
        // Queued requests are abandoned; only a decode already running is waited for.
        self.cancelled.store(true, Ordering::Release);
        self.requests = None;
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::warn!(codec = %self.config.codec, "decode worker panicked");
        }
        self.in_flight = 0;
    }
}

impl Drop for FfmpegFrameDecoder {
    fn drop(&mut self) {
        self.close();
    }
}
