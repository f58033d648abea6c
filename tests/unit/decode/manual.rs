use super::*;
use crate::foundation::core::Rgba8Premul;

fn config() -> DecoderConfig {
    DecoderConfig::new("test", 2, 2)
}

fn image() -> RasterImage {
    RasterImage::solid(2, 2, Rgba8Premul::from_straight_rgba(1, 2, 3, 255)).unwrap()
}

#[test]
fn manual_decoder_records_requests_and_delivers_completions() {
    let (mut dec, handle) = ManualDecoder::new(config());
    dec.decode(DecodeRequest {
        timestamp_ms: 40,
        source_time_s: 1.0,
    })
    .unwrap();
    assert_eq!(handle.requests().len(), 1);
    assert!(dec.poll().is_empty());

    handle.complete(40, image());
    let events = dec.poll();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].timestamp_us(), 40_000);
}

#[test]
fn manual_decoder_wait_times_out_without_completion() {
    let (mut dec, handle) = ManualDecoder::new(config());
    assert!(dec.wait(Duration::from_millis(5)).is_none());
    handle.fail(7, "corrupt chunk");
    assert!(matches!(
        dec.wait(Duration::from_millis(5)),
        Some(DecodeEvent::Failed { timestamp_us: 7_000, .. })
    ));
}

#[test]
fn manual_decoder_rejects_requests_after_close() {
    let (mut dec, handle) = ManualDecoder::new(config());
    dec.close();
    dec.close();
    assert!(handle.is_closed());
    assert!(
        dec.decode(DecodeRequest {
            timestamp_ms: 0,
            source_time_s: 0.0
        })
        .is_err()
    );
}

#[test]
fn generated_decoder_completes_on_poll() {
    let frame_fn: FrameFn = Arc::new(|t| {
        if t < 0.0 {
            Err(CutlineError::decode("before start"))
        } else {
            Ok(image())
        }
    });
    let mut dec = GeneratedDecoder::new(config(), frame_fn);
    dec.decode(DecodeRequest {
        timestamp_ms: 1,
        source_time_s: 0.5,
    })
    .unwrap();
    dec.decode(DecodeRequest {
        timestamp_ms: 2,
        source_time_s: -1.0,
    })
    .unwrap();
    let events = dec.poll();
    assert!(matches!(events[0], DecodeEvent::Frame { timestamp_us: 1_000, .. }));
    assert!(matches!(events[1], DecodeEvent::Failed { timestamp_us: 2_000, .. }));
    assert!(dec.poll().is_empty());
}
