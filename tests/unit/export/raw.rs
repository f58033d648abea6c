use super::*;
use crate::export::sink::{AudioCodec, VideoCodec};
use crate::foundation::core::Fps;

fn video_cfg(w: u32, h: u32) -> VideoEncoderConfig {
    VideoEncoderConfig {
        codec: VideoCodec::Raw,
        codec_id: "raw".to_string(),
        width: w,
        height: h,
        fps: Fps::new(30, 1).unwrap(),
        bitrate: 1,
        keyframe_interval: 30,
    }
}

fn audio_cfg() -> AudioEncoderConfig {
    AudioEncoderConfig {
        codec: AudioCodec::Pcm,
        codec_id: "pcm".to_string(),
        sample_rate: 48_000,
        channels: 2,
        bitrate: 0,
    }
}

fn frame(w: u32, h: u32, px: [u8; 4]) -> FrameRGBA {
    FrameRGBA {
        width: w,
        height: h,
        data: px.repeat((w * h) as usize),
        premultiplied: true,
    }
}

#[test]
fn video_frames_are_flattened_over_background() {
    let mut enc = RawVideoEncoder::with_background(Color::rgb(10, 20, 30));
    enc.configure(&video_cfg(2, 1)).unwrap();
    enc.encode(&frame(2, 1, [0, 0, 0, 0]), 0, true).unwrap();
    enc.encode(&frame(2, 1, [200, 0, 0, 255]), 33_333, false).unwrap();

    let stream = enc.flush().unwrap();
    assert_eq!(stream.chunks.len(), 2);
    assert_eq!(stream.chunks[0].data, vec![10, 20, 30, 255, 10, 20, 30, 255]);
    assert_eq!(&stream.chunks[1].data[..4], &[200, 0, 0, 255]);
    assert_eq!(stream.chunks[1].duration_us, 33_333);
    assert!(stream.chunks[0].keyframe);
    assert!(!stream.chunks[1].keyframe);
}

#[test]
fn video_encoder_rejects_size_mismatch_and_reordering() {
    let mut enc = RawVideoEncoder::new();
    assert!(enc.encode(&frame(2, 2, [0; 4]), 0, true).is_err());

    enc.configure(&video_cfg(2, 2)).unwrap();
    assert!(enc.encode(&frame(4, 4, [0; 4]), 0, true).is_err());
    enc.encode(&frame(2, 2, [0; 4]), 10, true).unwrap();
    assert!(enc.encode(&frame(2, 2, [0; 4]), 10, false).is_err());
}

#[test]
fn close_discards_configuration() {
    let mut enc = RawVideoEncoder::new();
    enc.configure(&video_cfg(2, 2)).unwrap();
    enc.close();
    enc.close();
    assert!(enc.flush().is_err());
}

#[test]
fn pcm_chunks_carry_duration_from_frame_count() {
    let mut enc = PcmAudioEncoder::new();
    enc.configure(&audio_cfg()).unwrap();
    let samples = vec![0.25f32; 1600 * 2];
    enc.encode(&AudioSlice {
        timestamp_us: 0,
        samples: &samples,
    })
    .unwrap();
    assert!(
        enc.encode(&AudioSlice {
            timestamp_us: 1,
            samples: &[0.0; 3],
        })
        .is_err()
    );

    let stream = enc.flush().unwrap();
    assert_eq!(stream.chunks.len(), 1);
    assert_eq!(stream.chunks[0].duration_us, 33_333);
    assert_eq!(stream.chunks[0].data.len(), 1600 * 2 * 4);
    assert_eq!(&stream.chunks[0].data[..4], &0.25f32.to_le_bytes());
}

#[test]
fn interleaved_container_orders_by_timestamp_video_first() {
    let chunk = |ts: u64, byte: u8| EncodedChunk {
        timestamp_us: ts,
        duration_us: 10,
        keyframe: ts == 0,
        data: vec![byte; 3],
    };
    let video = VideoStream {
        config: video_cfg(2, 2),
        chunks: vec![chunk(0, 1), chunk(20, 2)],
    };
    let audio = AudioStream {
        config: audio_cfg(),
        chunks: vec![chunk(0, 9), chunk(10, 8), chunk(20, 7)],
    };

    let bytes = InterleavedMuxer::new().mux(&video, Some(&audio)).unwrap();
    assert!(bytes.starts_with(b"CUTLINE1"));
    let records = InterleavedMuxer::read_records(&bytes).unwrap();
    let order: Vec<(TrackKind, u64)> = records
        .iter()
        .map(|r| (r.track, r.chunk.timestamp_us))
        .collect();
    assert_eq!(
        order,
        vec![
            (TrackKind::Video, 0),
            (TrackKind::Audio, 0),
            (TrackKind::Audio, 10),
            (TrackKind::Video, 20),
            (TrackKind::Audio, 20),
        ]
    );
    assert_eq!(records[0].chunk, video.chunks[0]);
    assert_eq!(records[2].chunk, audio.chunks[1]);
}

#[test]
fn video_only_container_round_trips_records() {
    let video = VideoStream {
        config: video_cfg(2, 2),
        chunks: vec![EncodedChunk {
            timestamp_us: 0,
            duration_us: 33_333,
            keyframe: true,
            data: vec![7; 16],
        }],
    };
    let bytes = InterleavedMuxer::new().mux(&video, None).unwrap();
    let records = InterleavedMuxer::read_records(&bytes).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].track, TrackKind::Video);

    assert!(InterleavedMuxer::read_records(&bytes[..bytes.len() - 1]).is_err());
    assert!(InterleavedMuxer::read_records(b"NOTCUTLN").is_err());
}
