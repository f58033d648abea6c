use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::assets::color::Color;
use crate::foundation::core::Fps;
use crate::timeline::model::{Item, ItemId, Track};

fn store() -> TimelineStore {
    TimelineStore::new(Timeline::new(Fps::whole(30).unwrap()).with_tracks([Track::new("t0", "A")]))
}

#[test]
fn listeners_run_only_on_change() {
    let mut store = store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    store.subscribe(move |tl| sink.borrow_mut().push(tl.total_frames()));

    assert!(store.apply(|tl| tl.add_item(0, Item::solid("a", 0, 12, Color::rgb(0, 0, 0)))));
    assert!(!store.apply(|tl| tl.remove_item(&ItemId::new("missing"))));
    assert_eq!(*seen.borrow(), vec![12]);
}

#[test]
fn unsubscribe_stops_notifications() {
    let mut store = store();
    let count = Rc::new(RefCell::new(0));
    let c = Rc::clone(&count);
    let id = store.subscribe(move |_| *c.borrow_mut() += 1);
    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));
    store.apply(|tl| tl.add_item(0, Item::solid("a", 0, 1, Color::rgb(0, 0, 0))));
    assert_eq!(*count.borrow(), 0);
}

#[test]
fn earlier_versions_stay_valid() {
    let mut store = store();
    let before = store.current();
    store.apply(|tl| tl.add_item(0, Item::solid("a", 0, 5, Color::rgb(0, 0, 0))));
    assert!(before.item(&ItemId::new("a")).is_none());
    assert!(store.current().item(&ItemId::new("a")).is_some());
}
