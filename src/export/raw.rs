use crate::assets::color::Color;
use crate::audio::mix::samples_to_f32le;
use crate::export::sink::{
    AudioEncodeSink, AudioEncoderConfig, AudioSlice, AudioStream, EncodedChunk, MuxSink,
    VideoEncodeSink, VideoEncoderConfig, VideoStream,
};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::foundation::math::{flatten_premul_over_bg_to_opaque_rgba8, premultiply_rgba8_in_place};
use crate::render::surface::FrameRGBA;

/// Stages frames as opaque RGBA8, flattened over a background color.
///
/// Accepts every codec id; the muxer performs the actual compression.
#[derive(Debug)]
pub struct RawVideoEncoder {
    bg_rgba: [u8; 4],
    config: Option<VideoEncoderConfig>,
    chunks: Vec<EncodedChunk>,
    last_timestamp_us: Option<u64>,
}

impl RawVideoEncoder {
    pub fn new() -> Self {
        Self::with_background(Color::rgb(0, 0, 0))
    }

    pub fn with_background(bg: Color) -> Self {
        Self {
            bg_rgba: [bg.r, bg.g, bg.b, 255],
            config: None,
            chunks: Vec::new(),
            last_timestamp_us: None,
        }
    }
}

impl Default for RawVideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncodeSink for RawVideoEncoder {
    fn configure(&mut self, config: &VideoEncoderConfig) -> CutlineResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.chunks.clear();
        self.last_timestamp_us = None;
        Ok(())
    }

    fn encode(
        &mut self,
        frame: &FrameRGBA,
        timestamp_us: u64,
        keyframe: bool,
    ) -> CutlineResult<()> {
        let cfg = self
            .config
            .as_ref()
            .ok_or_else(|| CutlineError::encode("video encoder is not configured"))?;
        if let Some(last) = self.last_timestamp_us
            && timestamp_us <= last
        {
            return Err(CutlineError::encode(
                "video encoder received out-of-order timestamp",
            ));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(CutlineError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        let mut data = vec![0u8; frame.data.len()];
        if frame.premultiplied {
            flatten_premul_over_bg_to_opaque_rgba8(&mut data, &frame.data, self.bg_rgba)?;
        } else {
            let mut premul = frame.data.clone();
            premultiply_rgba8_in_place(&mut premul);
            flatten_premul_over_bg_to_opaque_rgba8(&mut data, &premul, self.bg_rgba)?;
        }

        self.last_timestamp_us = Some(timestamp_us);
        self.chunks.push(EncodedChunk {
            timestamp_us,
            duration_us: cfg.fps.frame_duration_us(),
            keyframe,
            data,
        });
        Ok(())
    }

    fn flush(&mut self) -> CutlineResult<VideoStream> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| CutlineError::encode("video encoder is not configured"))?;
        Ok(VideoStream {
            config,
            chunks: std::mem::take(&mut self.chunks),
        })
    }

    fn close(&mut self) {
        self.config = None;
        self.chunks.clear();
        self.last_timestamp_us = None;
    }
}

/// Stages interleaved `f32le` PCM chunks.
#[derive(Debug, Default)]
pub struct PcmAudioEncoder {
    config: Option<AudioEncoderConfig>,
    chunks: Vec<EncodedChunk>,
}

impl PcmAudioEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioEncodeSink for PcmAudioEncoder {
    fn configure(&mut self, config: &AudioEncoderConfig) -> CutlineResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.chunks.clear();
        Ok(())
    }

    fn encode(&mut self, slice: &AudioSlice<'_>) -> CutlineResult<()> {
        let cfg = self
            .config
            .as_ref()
            .ok_or_else(|| CutlineError::encode("audio encoder is not configured"))?;
        let channels = usize::from(cfg.channels);
        if !slice.samples.len().is_multiple_of(channels) {
            return Err(CutlineError::encode(format!(
                "audio slice of {} samples is not aligned to {channels} channels",
                slice.samples.len()
            )));
        }
        let frames = (slice.samples.len() / channels) as u64;
        self.chunks.push(EncodedChunk {
            timestamp_us: slice.timestamp_us,
            duration_us: frames * 1_000_000 / u64::from(cfg.sample_rate),
            keyframe: true,
            data: samples_to_f32le(slice.samples),
        });
        Ok(())
    }

    fn flush(&mut self) -> CutlineResult<AudioStream> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| CutlineError::encode("audio encoder is not configured"))?;
        Ok(AudioStream {
            config,
            chunks: std::mem::take(&mut self.chunks),
        })
    }

    fn close(&mut self) {
        self.config = None;
        self.chunks.clear();
    }
}

const MAGIC: &[u8; 8] = b"CUTLINE1";

/// Which stream a container record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    fn tag(self) -> u8 {
        match self {
            Self::Video => b'V',
            Self::Audio => b'A',
        }
    }
}

/// One chunk read back from an interleaved container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxRecord {
    pub track: TrackKind,
    pub chunk: EncodedChunk,
}

/// Length-prefixed container interleaving chunks by timestamp (video first on ties).
///
/// Layout: magic `CUTLINE1`, a stream header, then records of
/// `tag u8, keyframe u8, timestamp u64, duration u64, len u32, data`. Integers are little-endian.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterleavedMuxer;

impl InterleavedMuxer {
    pub fn new() -> Self {
        Self
    }

    /// Parse the records of a container produced by [`MuxSink::mux`].
    pub fn read_records(bytes: &[u8]) -> CutlineResult<Vec<MuxRecord>> {
        let mut r = Reader { bytes, pos: 0 };
        if r.take(MAGIC.len())? != MAGIC {
            return Err(CutlineError::decode("not an interleaved cutline container"));
        }
        // Video header.
        r.take(4 * 4)?;
        let codec_len = usize::from(r.u16()?);
        r.take(codec_len)?;
        if r.u8()? == 1 {
            r.take(4 + 2)?;
            let codec_len = usize::from(r.u16()?);
            r.take(codec_len)?;
        }

        let mut records = Vec::new();
        while r.pos < bytes.len() {
            let track = match r.u8()? {
                b'V' => TrackKind::Video,
                b'A' => TrackKind::Audio,
                other => {
                    return Err(CutlineError::decode(format!(
                        "unknown record tag {other:#04x}"
                    )));
                }
            };
            let keyframe = r.u8()? == 1;
            let timestamp_us = r.u64()?;
            let duration_us = r.u64()?;
            let len = r.u32()? as usize;
            let data = r.take(len)?.to_vec();
            records.push(MuxRecord {
                track,
                chunk: EncodedChunk {
                    timestamp_us,
                    duration_us,
                    keyframe,
                    data,
                },
            });
        }
        Ok(records)
    }
}

impl MuxSink for InterleavedMuxer {
    fn mux(&mut self, video: &VideoStream, audio: Option<&AudioStream>) -> CutlineResult<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&video.config.width.to_le_bytes());
        out.extend_from_slice(&video.config.height.to_le_bytes());
        out.extend_from_slice(&video.config.fps.num.to_le_bytes());
        out.extend_from_slice(&video.config.fps.den.to_le_bytes());
        push_str(&mut out, &video.config.codec_id)?;
        match audio {
            Some(a) => {
                out.push(1);
                out.extend_from_slice(&a.config.sample_rate.to_le_bytes());
                out.extend_from_slice(&a.config.channels.to_le_bytes());
                push_str(&mut out, &a.config.codec_id)?;
            }
            None => out.push(0),
        }

        let audio_chunks = audio.map(|a| a.chunks.as_slice()).unwrap_or_default();
        let (mut vi, mut ai) = (0, 0);
        while vi < video.chunks.len() || ai < audio_chunks.len() {
            let take_video = match (video.chunks.get(vi), audio_chunks.get(ai)) {
                (Some(v), Some(a)) => v.timestamp_us <= a.timestamp_us,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if take_video {
                push_record(&mut out, TrackKind::Video, &video.chunks[vi])?;
                vi += 1;
            } else {
                push_record(&mut out, TrackKind::Audio, &audio_chunks[ai])?;
                ai += 1;
            }
        }
        Ok(out)
    }
}

fn push_str(out: &mut Vec<u8>, s: &str) -> CutlineResult<()> {
    let len: u16 = s
        .len()
        .try_into()
        .map_err(|_| CutlineError::encode("codec id too long"))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn push_record(out: &mut Vec<u8>, track: TrackKind, chunk: &EncodedChunk) -> CutlineResult<()> {
    let len: u32 = chunk
        .data
        .len()
        .try_into()
        .map_err(|_| CutlineError::encode("chunk exceeds 4 GiB"))?;
    out.push(track.tag());
    out.push(u8::from(chunk.keyframe));
    out.extend_from_slice(&chunk.timestamp_us.to_le_bytes());
    out.extend_from_slice(&chunk.duration_us.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&chunk.data);
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> CutlineResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CutlineError::decode("truncated container"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CutlineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> CutlineResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> CutlineResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> CutlineResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/raw.rs"]
mod tests;
