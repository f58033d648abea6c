use super::*;
use serde_json::json;

fn fps30() -> Fps {
    Fps::whole(30).unwrap()
}

#[test]
fn total_frames_is_max_end_with_one_frame_floor() {
    let empty = Timeline::new(fps30());
    assert_eq!(empty.total_frames(), 1);

    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "Top").with_items([Item::solid("a", 0, 20, Color::rgb(1, 2, 3))]),
        Track::new("t1", "Bottom").with_items([Item::solid("b", 15, 30, Color::rgb(1, 2, 3))]),
    ]);
    assert_eq!(tl.total_frames(), 45);
    assert!((tl.duration_secs() - 1.5).abs() < 1e-9);
}

#[test]
fn track_gain_defaults_and_mute() {
    let mut t = Track::new("t", "T");
    assert_eq!(t.gain(), 1.0);
    t.volume = Some(0.25);
    assert_eq!(t.gain(), 0.25);
    t.volume = Some(-3.0);
    assert_eq!(t.gain(), 0.0);
    t.volume = Some(0.5);
    t.muted = true;
    assert_eq!(t.gain(), 0.0);
}

#[test]
fn media_clip_fit_respects_source_duration() {
    let clip = MediaClip::new("a.mp4", 1.0, 4.0);
    assert!(clip.fits(90, fps30()));
    assert!(!clip.fits(91, fps30()));
    assert!(!MediaClip::new("a.mp4", -0.5, 4.0).fits(1, fps30()));
}

#[test]
fn item_kind_flags() {
    let v = Item::video("v", 0, 10, MediaClip::new("a.mp4", 0.0, 10.0));
    let a = Item::audio("a", 0, 10, MediaClip::new("a.wav", 0.0, 10.0));
    let s = Item::solid("s", 0, 10, Color::rgb(0, 0, 0));
    assert!(v.is_visual() && v.is_audible());
    assert!(!a.is_visual() && a.is_audible());
    assert!(s.is_visual() && !s.is_audible());
    assert_eq!(s.source(), None);
    assert_eq!(v.source(), Some("a.mp4"));
}

#[test]
fn json_layout_flattens_kind_with_type_tag() {
    let value = json!({
        "fps": {"num": 30, "den": 1},
        "tracks": [{
            "id": "t0",
            "name": "Main",
            "items": [
                {"id": "s", "start": 0, "duration": 20, "type": "solid", "color": "purple"},
                {"id": "v", "start": 20, "duration": 30, "type": "video",
                 "source": "clip.mp4", "trim_start_s": 0.5, "source_duration_s": 10.0,
                 "transition_out": {"kind": "crossfade", "duration_frames": 5}}
            ]
        }]
    });
    let tl = Timeline::from_json(&value.to_string()).unwrap();
    assert_eq!(tl.current_frame, 0);
    assert_eq!(
        tl.item(&ItemId::new("s")).unwrap().kind,
        ItemKind::Solid {
            color: Color::rgb(128, 0, 128)
        }
    );
    let v = tl.item(&ItemId::new("v")).unwrap();
    assert_eq!(v.media().unwrap().trim_start_s, 0.5);
    assert_eq!(v.transition_out.unwrap().kind, TransitionKind::Crossfade);

    let back = Timeline::from_json(&tl.to_json_pretty().unwrap()).unwrap();
    assert_eq!(back, tl);
}

#[test]
fn validate_rejects_duplicate_ids_and_broken_trim() {
    let dup = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "A").with_items([Item::solid("x", 0, 1, Color::rgb(0, 0, 0))]),
        Track::new("t1", "B").with_items([Item::solid("x", 0, 1, Color::rgb(0, 0, 0))]),
    ]);
    assert!(matches!(dup.validate(), Err(CutlineError::Validation(_))));

    let trim = Timeline::new(fps30()).with_tracks([Track::new("t0", "A")
        .with_items([Item::video("v", 0, 90, MediaClip::new("a.mp4", 8.0, 10.0))])]);
    assert!(trim.validate().is_err());

    let zero = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "A").with_items([Item::solid("z", 0, 0, Color::rgb(0, 0, 0))]),
    ]);
    assert!(zero.validate().is_err());
}

#[test]
fn locate_reports_track_and_item_index() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "A"),
        Track::new("t1", "B").with_items([
            Item::solid("a", 0, 5, Color::rgb(0, 0, 0)),
            Item::solid("b", 5, 5, Color::rgb(0, 0, 0)),
        ]),
    ]);
    assert_eq!(
        tl.locate(&ItemId::new("b")),
        Some(ItemLocation {
            track_index: 1,
            item_index: 1
        })
    );
    assert_eq!(tl.locate(&ItemId::new("nope")), None);
    assert_eq!(tl.track_index(&TrackId::new("t1")), Some(1));
}
