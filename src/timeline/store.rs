use std::sync::Arc;

use crate::timeline::model::Timeline;

/// Handle returned by [`TimelineStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Arc<Timeline>)>;

/// Holds the current timeline version and notifies listeners when an edit changes it.
pub struct TimelineStore {
    current: Arc<Timeline>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl TimelineStore {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            current: Arc::new(timeline),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn current(&self) -> Arc<Timeline> {
        Arc::clone(&self.current)
    }

    /// Replace the current version with `edit(current)`.
    ///
    /// Returns whether the state changed; listeners only run on change.
    pub fn apply(&mut self, edit: impl FnOnce(&Timeline) -> Timeline) -> bool {
        let next = edit(&self.current);
        if next == *self.current {
            return false;
        }
        self.current = Arc::new(next);
        self.notify();
        true
    }

    pub fn replace(&mut self, timeline: Timeline) {
        self.current = Arc::new(timeline);
        self.notify();
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Arc<Timeline>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        before != self.listeners.len()
    }

    fn notify(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener(&self.current);
        }
    }
}

impl std::fmt::Debug for TimelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineStore")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/store.rs"]
mod tests;
