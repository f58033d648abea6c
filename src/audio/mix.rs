use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::foundation::core::Fps;
use crate::foundation::math::round_div_u128;
use crate::timeline::model::{ItemId, Timeline};

/// Sample interval `[start_sample, end_sample)` of an output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSlice {
    pub start_sample: u64,
    pub end_sample: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SampleSlice {
    /// Slice covering output frame `frame` at `fps`.
    pub fn for_frame(frame: u64, fps: Fps, sample_rate: u32, channels: u16) -> Self {
        Self {
            start_sample: frame_to_sample(frame, fps, sample_rate),
            end_sample: frame_to_sample(frame + 1, fps, sample_rate),
            sample_rate,
            channels,
        }
    }

    pub fn len_samples(self) -> u64 {
        self.end_sample.saturating_sub(self.start_sample)
    }
}

/// Mix every audible item of `timeline` overlapping `slice` into interleaved `f32`.
///
/// Items without a buffer in `buffers` are silent. Output is clamped to `[-1, 1]`.
pub fn mix_frame_slice(
    timeline: &Timeline,
    buffers: &HashMap<ItemId, Arc<AudioBuffer>>,
    slice: SampleSlice,
) -> Vec<f32> {
    let channels = usize::from(slice.channels);
    let frames = slice.len_samples() as usize;
    let mut out = vec![0.0f32; frames * channels];
    if frames == 0 || channels == 0 {
        return out;
    }

    let sr = slice.sample_rate;
    for track in &timeline.tracks {
        let gain = track.gain() as f32;
        if gain == 0.0 {
            continue;
        }
        for item in &track.items {
            let Some(clip) = item.media() else {
                continue;
            };
            let Some(buffer) = buffers.get(&item.id) else {
                continue;
            };

            let item_start = frame_to_sample(item.start, timeline.fps, sr);
            let item_end = frame_to_sample(item.end(), timeline.fps, sr);
            let start = item_start.max(slice.start_sample);
            let end = item_end.min(slice.end_sample);
            if start >= end {
                continue;
            }

            for dst_sample in start..end {
                let rel_sec = ((dst_sample - item_start) as f64) / f64::from(sr);
                let src_sec = clip.trim_start_s + rel_sec;
                let dst_idx = (dst_sample - slice.start_sample) as usize * channels;
                for ch in 0..slice.channels {
                    out[dst_idx + usize::from(ch)] += buffer.sample_at(ch, src_sec) * gain;
                }
            }
        }
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

/// Samples elapsed after `frame_delta` frames, rounded to the nearest sample.
pub fn frame_to_sample(frame_delta: u64, fps: Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frame_delta) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    round_div_u128(num, den) as u64
}

/// Little-endian `f32` bytes of interleaved samples.
pub fn samples_to_f32le(samples_interleaved: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
