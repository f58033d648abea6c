use super::*;

#[test]
fn video_codec_ids_map_to_families() {
    assert_eq!("avc1.42E01E".parse::<VideoCodec>().unwrap(), VideoCodec::H264);
    assert_eq!("avc1.640028".parse::<VideoCodec>().unwrap(), VideoCodec::H264);
    assert_eq!("vp09.00.10.08".parse::<VideoCodec>().unwrap(), VideoCodec::Vp9);
    assert_eq!("vp8".parse::<VideoCodec>().unwrap(), VideoCodec::Vp9);
    assert_eq!("raw".parse::<VideoCodec>().unwrap(), VideoCodec::Raw);
}

#[test]
fn audio_codec_ids_map_to_families() {
    assert_eq!("mp4a.40.2".parse::<AudioCodec>().unwrap(), AudioCodec::Aac);
    assert_eq!("opus".parse::<AudioCodec>().unwrap(), AudioCodec::Opus);
    assert_eq!("pcm".parse::<AudioCodec>().unwrap(), AudioCodec::Pcm);
}

#[test]
fn unknown_codecs_are_config_errors() {
    assert!("hevc".parse::<VideoCodec>().unwrap_err().is_config());
    assert!("mp3".parse::<AudioCodec>().unwrap_err().is_config());
}

#[test]
fn encoder_config_rejects_zero_fields() {
    let mut cfg = VideoEncoderConfig {
        codec: VideoCodec::H264,
        codec_id: "avc1.42E01E".to_string(),
        width: 640,
        height: 360,
        fps: Fps::new(30, 1).unwrap(),
        bitrate: 1_000_000,
        keyframe_interval: 30,
    };
    assert!(cfg.validate().is_ok());
    cfg.keyframe_interval = 0;
    assert!(cfg.validate().unwrap_err().is_config());

    let audio = AudioEncoderConfig {
        codec: AudioCodec::Aac,
        codec_id: "mp4a.40.2".to_string(),
        sample_rate: 0,
        channels: 2,
        bitrate: 128_000,
    };
    assert!(audio.validate().unwrap_err().is_config());
}
