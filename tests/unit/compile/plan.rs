use super::*;
use crate::assets::color::Color;
use crate::timeline::model::{MediaClip, Track};

fn fps30() -> Fps {
    Fps::whole(30).unwrap()
}

fn purple() -> Color {
    Color::rgb(128, 0, 128)
}

fn ids(plan: &RenderPlan) -> Vec<&str> {
    plan.layers.iter().map(|l| l.item.id.as_str()).collect()
}

#[test]
fn solid_item_scenario() {
    let tl = Timeline::new(fps30())
        .with_tracks([Track::new("t0", "Main").with_items([Item::solid("s", 0, 20, purple())])]);

    let plan = compute_render_plan(&tl, 10);
    assert_eq!(plan.layers.len(), 1);
    assert_eq!(plan.layers[0].item.id.as_str(), "s");
    assert!(plan.regions.is_empty());

    assert!(compute_render_plan(&tl, 20).layers.is_empty());
}

#[test]
fn item_range_bounds_are_exclusive_at_end() {
    let tl = Timeline::new(fps30())
        .with_tracks([Track::new("t0", "Main").with_items([Item::solid("s", 5, 10, purple())])]);
    assert!(compute_render_plan(&tl, 4).layers.is_empty());
    assert_eq!(compute_render_plan(&tl, 5).layers.len(), 1);
    assert_eq!(compute_render_plan(&tl, 14).layers.len(), 1);
    assert!(compute_render_plan(&tl, 15).layers.is_empty());
}

#[test]
fn track_zero_paints_last() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("top", "Top").with_items([Item::solid("a", 0, 10, purple())]),
        Track::new("mid", "Mid").with_items([Item::solid("b", 0, 10, purple())]),
        Track::new("bot", "Bottom").with_items([Item::solid("c", 0, 10, purple())]),
    ]);
    let plan = compute_render_plan(&tl, 3);
    assert_eq!(ids(&plan), vec!["c", "b", "a"]);
    assert_eq!(plan.layers[2].track_index, 0);
}

#[test]
fn overlapping_items_in_one_track_keep_declaration_order() {
    let tl = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items([
        Item::solid("first", 0, 10, purple()),
        Item::solid("second", 5, 10, purple()),
    ])]);
    assert_eq!(ids(&compute_render_plan(&tl, 6)), vec!["first", "second"]);
}

#[test]
fn audio_items_yield_regions_not_layers() {
    let mut track = Track::new("t0", "Main").with_items([
        Item::audio("a", 10, 30, MediaClip::new("a.wav", 2.0, 10.0)),
        Item::video("v", 0, 60, MediaClip::new("v.mp4", 0.5, 10.0)),
    ]);
    track.volume = Some(0.5);
    let tl = Timeline::new(fps30()).with_tracks([track]);

    let plan = compute_render_plan(&tl, 25);
    assert_eq!(ids(&plan), vec!["v"]);
    assert_eq!(plan.regions.len(), 2);

    let a = plan.region(&ItemId::new("a")).unwrap();
    assert_eq!(a.gain, 0.5);
    assert!((a.region_time_s - 0.5).abs() < 1e-12);
    assert!((a.region_duration_s - 1.0 / 30.0).abs() < 1e-12);
    assert!((a.source_offset_s - 2.5).abs() < 1e-12);
    assert!((a.remaining_s(fps30()) - 0.5).abs() < 1e-12);

    let v = plan.region(&ItemId::new("v")).unwrap();
    assert!((v.source_offset_s - (0.5 + 25.0 / 30.0)).abs() < 1e-12);
}

#[test]
fn muted_and_zero_volume_tracks_have_zero_gain() {
    let mut muted = Track::new("m", "Muted")
        .with_items([Item::audio("a", 0, 10, MediaClip::new("a.wav", 0.0, 1.0))]);
    muted.muted = true;
    muted.volume = Some(0.8);
    let mut silent = Track::new("s", "Silent")
        .with_items([Item::audio("b", 0, 10, MediaClip::new("b.wav", 0.0, 1.0))]);
    silent.volume = Some(0.0);

    let plan = compute_render_plan(&Timeline::new(fps30()).with_tracks([muted, silent]), 0);
    assert_eq!(plan.regions.len(), 2);
    assert!(plan.regions.iter().all(|r| r.gain == 0.0));
    assert_eq!(plan.regions[0].item.id.as_str(), "a");
}

#[test]
fn crossfade_window_progress_and_order() {
    let tl = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items([
        Item::solid("out", 0, 20, purple()).with_transition_out(TransitionKind::Crossfade, 5),
        Item::solid("in", 15, 20, purple()),
    ])]);

    let before = compute_render_plan(&tl, 14);
    assert_eq!(ids(&before), vec!["out"]);
    assert!(before.layers[0].transition.is_none());

    let start = compute_render_plan(&tl, 15);
    assert_eq!(ids(&start), vec!["in", "out"]);
    let tr = start.layers[1].transition.as_ref().unwrap();
    assert_eq!(tr.partner.as_str(), "in");
    assert_eq!(tr.progress, 0.0);

    let last = compute_render_plan(&tl, 19);
    assert_eq!(last.layers[1].transition.as_ref().unwrap().progress, 1.0);

    let mid = compute_render_plan(&tl, 17);
    assert!((mid.layers[1].transition.as_ref().unwrap().progress - 0.5).abs() < 1e-12);
}

#[test]
fn transition_without_partner_is_ignored() {
    let tl = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items([
        Item::solid("solo", 0, 20, purple()).with_transition_out(TransitionKind::Wipe, 5),
    ])]);
    assert!(compute_render_plan(&tl, 18).layers[0].transition.is_none());
}

#[test]
fn plan_is_pure() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "A").with_items([
            Item::solid("s", 0, 40, purple()).with_transition_out(TransitionKind::Wipe, 8),
            Item::text("t", 35, 10, "hi", purple()),
        ]),
        Track::new("t1", "B")
            .with_items([Item::video("v", 0, 45, MediaClip::new("v.mp4", 0.0, 5.0))]),
    ]);
    for frame in [0, 20, 36, 44, 45, 100] {
        assert_eq!(
            compute_render_plan(&tl, frame),
            compute_render_plan(&tl, frame)
        );
    }
}

#[test]
fn frame_past_end_is_empty() {
    let tl = Timeline::new(fps30())
        .with_tracks([Track::new("t0", "Main").with_items([Item::solid("s", 0, 20, purple())])]);
    let plan = tl.render_plan(1_000);
    assert!(plan.is_empty());
    assert_eq!(plan.frame, 1_000);
}
