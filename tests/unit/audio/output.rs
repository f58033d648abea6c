use super::*;

fn tone(value: f32) -> Arc<AudioBuffer> {
    Arc::new(AudioBuffer::constant(1_000, 2, 5.0, value).unwrap())
}

fn spec(start_at_s: f64, duration_s: f64) -> VoiceSpec {
    VoiceSpec {
        buffer: tone(0.5),
        start_at_s,
        offset_s: 0.0,
        duration_s,
        gain: 1.0,
    }
}

#[test]
fn clock_advances_only_while_running() {
    let mut out = SoftwareOutput::new(1_000, 2).unwrap();
    out.advance(0.5);
    assert!((out.current_time() - 0.5).abs() < 1e-9);

    out.suspend();
    out.advance(1.0);
    assert!((out.current_time() - 0.5).abs() < 1e-9);

    out.resume();
    out.advance(0.25);
    assert!((out.current_time() - 0.75).abs() < 1e-9);
}

#[test]
fn voices_play_in_their_window_and_report_end() {
    let mut out = SoftwareOutput::new(1_000, 2).unwrap();
    let id = out.start_voice(spec(0.01, 0.02)).unwrap();

    let mut buf = vec![0.0f32; 40 * 2];
    out.render(&mut buf);
    assert_eq!(buf[0], 0.0);
    assert!((buf[15 * 2] - 0.5).abs() < 1e-6);
    assert_eq!(buf[35 * 2 + 1], 0.0);

    assert_eq!(out.drain_ended(), vec![id]);
    assert!(out.drain_ended().is_empty());
    assert_eq!(out.active_voices(), 0);
}

#[test]
fn master_gain_scales_and_stop_silences() {
    let mut out = SoftwareOutput::new(1_000, 2).unwrap();
    out.set_master_gain(0.5);
    let id = out.start_voice(spec(0.0, 1.0)).unwrap();

    let mut buf = vec![0.0f32; 10 * 2];
    out.render(&mut buf);
    assert!(buf.iter().all(|&s| (s - 0.25).abs() < 1e-6));

    out.stop_voice(id);
    out.render(&mut buf);
    assert!(buf.iter().all(|&s| s == 0.0));
    // Stopped voices never show up as ended.
    assert!(out.drain_ended().is_empty());
}

#[test]
fn clones_share_one_mixer() {
    let mut out = SoftwareOutput::new(1_000, 1).unwrap();
    let device = out.clone();
    out.start_voice(spec(0.0, 1.0)).unwrap();
    let mut buf = vec![0.0f32; 4];
    device.render(&mut buf);
    assert!((buf[0] - 0.5).abs() < 1e-6);
    assert!((out.current_time() - 0.004).abs() < 1e-9);
}

#[test]
fn closed_output_rejects_voices() {
    let mut out = SoftwareOutput::new(1_000, 2).unwrap();
    out.start_voice(spec(0.0, 1.0)).unwrap();
    out.close();
    assert_eq!(out.active_voices(), 0);
    assert!(out.start_voice(spec(0.0, 1.0)).is_err());
    assert!(SoftwareOutput::new(0, 2).unwrap_err().is_config());
}
