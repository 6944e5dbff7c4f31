//! Reader event bus
//!
//! The content provider publishes selection and re-render events here. Each
//! subscription is an owned handle: dropping it unsubscribes, so a component
//! that rebinds (reading-mode change, reopening a document) releases its old
//! handlers simply by replacing the handles it holds.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::location::LocationRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// The reader selected a range of text
    Selected { location: LocationRef, text: String },

    Deselected,

    /// The view was re-rendered in place (layout or font change) and lost its
    /// marks. View replacements that load new content go through
    /// [`crate::reconciler::Reconciler::reconcile`] instead.
    Rerendered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Selected,
    Deselected,
    Rerendered,
}

impl ReaderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ReaderEvent::Selected { .. } => EventKind::Selected,
            ReaderEvent::Deselected => EventKind::Deselected,
            ReaderEvent::Rerendered => EventKind::Rerendered,
        }
    }
}

type Handler = Rc<dyn Fn(&ReaderEvent)>;

struct Entry {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
}

impl BusInner {
    fn is_live(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|e| e.id == id)
    }

    fn remove(&self, id: u64) {
        self.entries.borrow_mut().retain(|e| e.id != id);
    }
}

/// Single-threaded publish/subscribe hub. Clones share the same handlers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`, live until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, kind: EventKind, handler: impl Fn(&ReaderEvent) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.entries.borrow_mut().push(Entry {
            id,
            kind,
            handler: Rc::new(handler),
        });
        tracing::trace!(id, ?kind, "subscribed");

        Subscription {
            id,
            kind,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every handler subscribed to its kind, in
    /// subscription order. Returns how many handlers ran.
    ///
    /// Handlers may subscribe or unsubscribe while the event is delivered;
    /// new handlers see the next event, removed ones are not called.
    pub fn emit(&self, event: &ReaderEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<(u64, Handler)> = self
            .inner
            .entries
            .borrow()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.id, Rc::clone(&e.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in targets {
            if !self.inner.is_live(id) {
                continue;
            }
            handler(event);
            delivered += 1;
        }

        if delivered == 0 {
            tracing::trace!(?kind, "event had no subscribers");
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.inner.entries.borrow().len())
            .finish()
    }
}

/// Live registration on an [`EventBus`]; unsubscribes on drop
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
            tracing::trace!(id = self.id, kind = ?self.kind, "unsubscribed");
        }
    }
}

/// At most one live subscription per event kind
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    active: HashMap<EventKind, Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `subscription` for its kind. Any previous subscription of that
    /// kind is released only after the new one is in place.
    pub fn replace(&mut self, subscription: Subscription) {
        let previous = self.active.insert(subscription.kind(), subscription);
        drop(previous);
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Release every subscription
    pub fn clear(&mut self) {
        self.active.clear();
    }
}
