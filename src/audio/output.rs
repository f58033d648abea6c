use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::buffer::AudioBuffer;
use crate::foundation::error::{CutlineError, CutlineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// One buffer playback scheduled on the output clock.
#[derive(Clone, Debug)]
pub struct VoiceSpec {
    pub buffer: Arc<AudioBuffer>,
    /// Output-clock time at which the voice becomes audible.
    pub start_at_s: f64,
    /// Source position read at `start_at_s`.
    pub offset_s: f64,
    pub duration_s: f64,
    pub gain: f32,
}

/// Audio output device boundary. Its clock is the audio timebase.
pub trait AudioOutput: Send {
    fn sample_rate(&self) -> u32;

    /// Seconds of output rendered so far. Frozen while suspended.
    fn current_time(&self) -> f64;

    fn start_voice(&mut self, spec: VoiceSpec) -> CutlineResult<VoiceId>;

    /// Unknown or finished voices are ignored.
    fn stop_voice(&mut self, id: VoiceId);

    fn set_master_gain(&mut self, gain: f32);

    fn suspend(&mut self);

    fn resume(&mut self);

    /// Stops every voice. Further `start_voice` calls fail.
    fn close(&mut self);

    /// Voices that reached their end since the last call.
    fn drain_ended(&mut self) -> Vec<VoiceId>;
}

#[derive(Debug)]
struct Voice {
    id: VoiceId,
    spec: VoiceSpec,
}

impl Voice {
    fn end_s(&self) -> f64 {
        self.spec.start_at_s + self.spec.duration_s
    }
}

#[derive(Debug)]
struct MixerState {
    sample_rate: u32,
    channels: u16,
    frames_rendered: u64,
    master_gain: f32,
    suspended: bool,
    closed: bool,
    next_voice: u64,
    voices: Vec<Voice>,
    ended: Vec<VoiceId>,
}

impl MixerState {
    fn now_s(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        if self.suspended || self.closed {
            return;
        }

        let channels = usize::from(self.channels);
        let sr = f64::from(self.sample_rate);
        let frames = out.len() / channels;
        for voice in &self.voices {
            let gain = voice.spec.gain * self.master_gain;
            for i in 0..frames {
                let t = (self.frames_rendered + i as u64) as f64 / sr;
                if t < voice.spec.start_at_s || t >= voice.end_s() {
                    continue;
                }
                let src_t = voice.spec.offset_s + (t - voice.spec.start_at_s);
                for ch in 0..self.channels {
                    out[i * channels + usize::from(ch)] +=
                        voice.spec.buffer.sample_at(ch, src_t) * gain;
                }
            }
        }
        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }

        self.frames_rendered += frames as u64;
        let now = self.now_s();
        let ended = &mut self.ended;
        self.voices.retain(|v| {
            let done = v.end_s() <= now;
            if done {
                ended.push(v.id);
            }
            !done
        });
    }
}

/// Software mixer whose clock advances as the host pulls samples.
///
/// Clones share one mixer, so a device callback thread can call [`SoftwareOutput::render`] while
/// the scheduler holds another handle.
#[derive(Clone, Debug)]
pub struct SoftwareOutput {
    state: Arc<Mutex<MixerState>>,
}

impl SoftwareOutput {
    pub fn new(sample_rate: u32, channels: u16) -> CutlineResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(CutlineError::config(
                "software output needs a non-zero sample rate and channel count",
            ));
        }
        Ok(Self {
            state: Arc::new(Mutex::new(MixerState {
                sample_rate,
                channels,
                frames_rendered: 0,
                master_gain: 1.0,
                suspended: false,
                closed: false,
                next_voice: 0,
                voices: Vec::new(),
                ended: Vec::new(),
            })),
        })
    }

    pub fn channels(&self) -> u16 {
        self.lock().channels
    }

    /// Fill `out` with the next interleaved samples and advance the clock.
    ///
    /// While suspended or closed this writes silence and the clock stays put.
    pub fn render(&self, out: &mut [f32]) {
        self.lock().render(out);
    }

    /// Render and discard `secs` of output.
    pub fn advance(&self, secs: f64) {
        let mut state = self.lock();
        let frames = (secs.max(0.0) * f64::from(state.sample_rate)).round() as usize;
        let mut scratch = vec![0.0f32; frames * usize::from(state.channels)];
        state.render(&mut scratch);
    }

    pub fn active_voices(&self) -> usize {
        self.lock().voices.len()
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        // Mixer state stays consistent across a panicking reader.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl AudioOutput for SoftwareOutput {
    fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    fn current_time(&self) -> f64 {
        self.lock().now_s()
    }

    fn start_voice(&mut self, spec: VoiceSpec) -> CutlineResult<VoiceId> {
        let mut state = self.lock();
        if state.closed {
            return Err(CutlineError::internal("audio output is closed"));
        }
        let id = VoiceId(state.next_voice);
        state.next_voice += 1;
        state.voices.push(Voice { id, spec });
        Ok(id)
    }

    fn stop_voice(&mut self, id: VoiceId) {
        self.lock().voices.retain(|v| v.id != id);
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.lock().master_gain = gain;
    }

    fn suspend(&mut self) {
        self.lock().suspended = true;
    }

    fn resume(&mut self) {
        self.lock().suspended = false;
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.closed = true;
        state.voices.clear();
    }

    fn drain_ended(&mut self) -> Vec<VoiceId> {
        std::mem::take(&mut self.lock().ended)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/output.rs"]
mod tests;
