use std::time::{Duration, Instant};

use crate::audio::output::SoftwareOutput;
use crate::playback::scheduler::{PlaybackScheduler, PlaybackStats};
use crate::render::surface::DrawSurface;

/// Play in real time on the calling thread until playback stops or `max_duration` passes.
///
/// When `device` is given it is pulled by the wall-clock time between ticks, standing in for an
/// audio device callback.
pub fn run_realtime<S: DrawSurface>(
    scheduler: &mut PlaybackScheduler<S>,
    max_duration: Duration,
    device: Option<&SoftwareOutput>,
) -> PlaybackStats {
    let interval = Duration::from_secs_f64(scheduler.timeline().fps.frame_duration_secs());
    let started = Instant::now();
    let mut last_pull = started;

    scheduler.play();
    while let Some(token) = scheduler.pending_tick() {
        if started.elapsed() >= max_duration {
            scheduler.pause();
            break;
        }
        std::thread::sleep(interval);
        if let Some(device) = device {
            let now = Instant::now();
            device.advance((now - last_pull).as_secs_f64());
            last_pull = now;
        }
        scheduler.tick(token);
    }

    tracing::info!(
        frame = scheduler.current_frame(),
        wall_s = started.elapsed().as_secs_f64(),
        "playback loop finished"
    );
    scheduler.stats()
}
