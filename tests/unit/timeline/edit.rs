use super::*;
use crate::foundation::core::Fps;
use crate::timeline::model::{MediaClip, TransitionKind};

fn fps30() -> Fps {
    Fps::whole(30).unwrap()
}

fn purple() -> Color {
    Color::rgb(128, 0, 128)
}

fn single_track(items: impl IntoIterator<Item = Item>) -> Timeline {
    Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items(items)])
}

fn counter_ids(prefix: &'static str) -> impl FnMut() -> ItemId {
    let mut n = 0;
    move || {
        n += 1;
        ItemId::new(format!("{prefix}{n}"))
    }
}

#[test]
fn split_video_advances_second_trim() {
    let tl = single_track([Item::video(
        "v",
        0,
        90,
        MediaClip::new("clip.mp4", 0.0, 10.0),
    )]);
    let out = tl.split_item_with(&ItemId::new("v"), 30, counter_ids("v"));

    let items = &out.tracks[0].items;
    assert_eq!(items.len(), 2);
    assert_eq!((items[0].start, items[0].duration), (0, 30));
    assert_eq!(items[0].media().unwrap().trim_start_s, 0.0);
    assert_eq!((items[1].start, items[1].duration), (30, 60));
    assert!((items[1].media().unwrap().trim_start_s - 1.0).abs() < 1e-12);
    assert!(out.item(&ItemId::new("v")).is_none());
    assert_eq!(items[0].id, ItemId::new("v1"));
    assert_eq!(items[1].id, ItemId::new("v2"));
}

#[test]
fn split_generates_fresh_distinct_ids() {
    let tl = single_track([Item::solid("s", 10, 20, purple())]);
    let out = tl.split_item(&ItemId::new("s"), 15);
    let items = &out.tracks[0].items;
    assert_eq!(items.len(), 2);
    assert_ne!(items[0].id, items[1].id);
    assert_ne!(items[0].id, ItemId::new("s"));
    assert_ne!(items[1].id, ItemId::new("s"));
}

#[test]
fn split_outside_interior_is_noop() {
    let tl = single_track([Item::solid("s", 10, 20, purple())]);
    for at in [0, 10, 30, 31] {
        assert_eq!(tl.split_item(&ItemId::new("s"), at), tl, "at={at}");
    }
    assert_eq!(tl.split_item(&ItemId::new("missing"), 15), tl);
}

#[test]
fn split_keeps_transition_on_second_half_only() {
    let tl = single_track([
        Item::solid("s", 0, 20, purple()).with_transition_out(TransitionKind::Wipe, 4)
    ]);
    let out = tl.split_item_with(&ItemId::new("s"), 8, counter_ids("s"));
    assert_eq!(out.tracks[0].items[0].transition_out, None);
    assert!(out.tracks[0].items[1].transition_out.is_some());
}

#[test]
fn edits_do_not_mutate_the_input() {
    let tl = single_track([Item::solid("s", 0, 20, purple())]);
    let snapshot = tl.clone();
    let _ = tl.add_item(0, Item::solid("t", 20, 5, purple()));
    let _ = tl.remove_item(&ItemId::new("s"));
    let _ = tl.update_item(&ItemId::new("s"), &ItemPatch::move_to(40));
    let _ = tl.split_item(&ItemId::new("s"), 10);
    assert_eq!(tl, snapshot);
}

#[test]
fn add_item_extends_tracks_and_rejects_duplicates() {
    let tl = single_track([Item::solid("s", 0, 20, purple())]);
    let out = tl.add_item(2, Item::solid("t", 0, 5, purple()));
    assert_eq!(out.tracks.len(), 3);
    assert_eq!(out.tracks[2].items[0].id, ItemId::new("t"));
    assert!(out.tracks[1].items.is_empty());
    assert_eq!(out.tracks[1].name, "Track 2");

    assert_eq!(out.add_item(0, Item::solid("t", 50, 5, purple())), out);
    assert_eq!(out.add_item(0, Item::solid("z", 50, 0, purple())), out);
}

#[test]
fn add_item_rejects_overlong_trim() {
    let tl = single_track(Vec::<Item>::new());
    let bad = Item::video("v", 0, 90, MediaClip::new("a.mp4", 9.0, 10.0));
    assert_eq!(tl.add_item(0, bad), tl);
}

#[test]
fn untouched_tracks_are_shared_after_edit() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "A").with_items([Item::solid("a", 0, 5, purple())]),
        Track::new("t1", "B").with_items([Item::solid("b", 0, 5, purple())]),
    ]);
    let out = tl.update_item(&ItemId::new("a"), &ItemPatch::resize(10));
    assert!(std::sync::Arc::ptr_eq(&tl.tracks[1], &out.tracks[1]));
    assert!(!std::sync::Arc::ptr_eq(&tl.tracks[0], &out.tracks[0]));
}

#[test]
fn update_item_applies_and_moves_tracks() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "A").with_items([Item::text("x", 0, 10, "hi", purple())]),
        Track::new("t1", "B"),
    ]);
    let patch = ItemPatch {
        start: Some(5),
        text: Some("hello".into()),
        track_index: Some(1),
        ..ItemPatch::default()
    };
    let out = tl.update_item(&ItemId::new("x"), &patch);
    assert!(out.tracks[0].items.is_empty());
    let moved = &out.tracks[1].items[0];
    assert_eq!(moved.start, 5);
    assert!(matches!(&moved.kind, ItemKind::Text { text, .. } if text == "hello"));
}

#[test]
fn update_item_rejects_invalid_patches() {
    let tl = single_track([
        Item::solid("s", 0, 10, purple()),
        Item::video("v", 10, 30, MediaClip::new("a.mp4", 0.0, 2.0)),
    ]);
    // Wrong kind for the field.
    let text_on_solid = ItemPatch {
        text: Some("nope".into()),
        ..ItemPatch::default()
    };
    assert_eq!(tl.update_item(&ItemId::new("s"), &text_on_solid), tl);
    // Zero duration.
    assert_eq!(tl.update_item(&ItemId::new("s"), &ItemPatch::resize(0)), tl);
    // Trim past the source end.
    let trim = ItemPatch {
        trim_start_s: Some(1.5),
        ..ItemPatch::default()
    };
    assert_eq!(tl.update_item(&ItemId::new("v"), &trim), tl);
    // Unknown id.
    assert_eq!(tl.update_item(&ItemId::new("?"), &ItemPatch::move_to(3)), tl);
}

#[test]
fn add_track_prepends_and_remove_track_drops_items() {
    let tl = single_track([Item::solid("s", 0, 10, purple())]);
    let out = tl.add_track(Track::new("top", "Top"));
    assert_eq!(out.tracks[0].id, TrackId::new("top"));
    assert_eq!(out.tracks[1].id, TrackId::new("t0"));
    assert_eq!(out.add_track(Track::new("top", "Again")), out);

    let removed = out.remove_track(&TrackId::new("t0"));
    assert_eq!(removed.tracks.len(), 1);
    assert!(removed.item(&ItemId::new("s")).is_none());
    assert_eq!(removed.remove_track(&TrackId::new("t0")), removed);
}

#[test]
fn with_current_frame_only_changes_the_frame() {
    let tl = single_track([Item::solid("s", 0, 10, purple())]);
    let out = tl.with_current_frame(7);
    assert_eq!(out.current_frame, 7);
    assert_eq!(out.tracks, tl.tracks);
}
