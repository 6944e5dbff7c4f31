//! Annotation renderer / reconciler
//!
//! The only component that touches the view. Every time the visible content is
//! replaced it wipes all of its marks and repaints the whole store against the
//! new view; a single new annotation on an unchanged view takes the fast path
//! and paints just that one mark.
//!
//! ```text
//!  Unattached ──attach/pass──▶ Reconciling ──view ready──▶ Attached
//!                                  ▲                          │
//!                                  └──── view invalidated ────┘
//!  any state ──close──▶ Closed
//! ```
//!
//! Passes are generation-tracked: each pass captures the generation when it
//! begins and does nothing if a later pass began before its view was ready.
//! A single generation-tracked pass paints every mark kind, including the
//! search focus, so search and annotation marks cannot race each other.

use std::cell::{Cell, RefCell};
use std::future::Future;

use crate::annotations::{Annotation, AnnotationKind, SharedStore};
use crate::config::RenderConfig;
use crate::location::LocationRef;
use crate::view::{ContentView, MarkKind, MarkSpec, MarkTag, ViewError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// No view yet
    Unattached,
    /// Holding a live view whose marks are up to date
    Attached,
    /// Waiting for a replacement view to become ready
    Reconciling,
    /// Session ended; terminal
    Closed,
}

/// Identifies one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Annotation marks painted
    pub painted: usize,
    /// Annotations that did not resolve or failed to paint
    pub skipped: usize,
    pub search_painted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Painted(PassReport),
    /// A later pass began before this one could paint
    Superseded,
    /// The replacement view failed to load; the previous view is kept
    LoadFailed,
    /// A view replacement is pending; that pass will repaint everything
    Deferred,
    NoView,
    Closed,
}

pub struct Reconciler<V: ContentView> {
    store: SharedStore,
    config: RenderConfig,
    view: RefCell<Option<V>>,
    state: Cell<RendererState>,
    generation: Cell<u64>,
    search_focus: RefCell<Option<LocationRef>>,
}

impl<V: ContentView> Reconciler<V> {
    pub fn new(store: SharedStore, config: RenderConfig) -> Self {
        Self {
            store,
            config,
            view: RefCell::new(None),
            state: Cell::new(RendererState::Unattached),
            generation: Cell::new(0),
            search_focus: RefCell::new(None),
        }
    }

    pub fn state(&self) -> RendererState {
        self.state.get()
    }

    /// Install a view that is ready now and paint the store onto it.
    pub fn attach(&self, view: V) -> PassOutcome {
        let ticket = self.begin_pass();
        self.finish_pass(ticket, view)
    }

    /// Start a pass for a view replacement. Any pass begun earlier is
    /// superseded from this point on.
    pub fn begin_pass(&self) -> PassTicket {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        if self.state.get() != RendererState::Closed {
            self.state.set(RendererState::Reconciling);
        }
        tracing::trace!(generation, "reconciliation pass started");
        PassTicket { generation }
    }

    /// Complete a pass with its now-ready view.
    pub fn finish_pass(&self, ticket: PassTicket, view: V) -> PassOutcome {
        if self.state.get() == RendererState::Closed {
            return PassOutcome::Closed;
        }
        if self.is_stale(ticket) {
            tracing::debug!(
                generation = ticket.generation,
                current = self.generation.get(),
                "dropping superseded view"
            );
            return PassOutcome::Superseded;
        }

        *self.view.borrow_mut() = Some(view);
        self.paint_all(ticket)
    }

    /// Record that the view for `ticket` could not be loaded.
    pub fn fail_pass(&self, ticket: PassTicket, error: ViewError) -> PassOutcome {
        if self.state.get() == RendererState::Closed {
            return PassOutcome::Closed;
        }
        if self.is_stale(ticket) {
            return PassOutcome::Superseded;
        }

        tracing::warn!(error = %error, "replacement view failed to load, keeping previous view");
        if self.view.borrow().is_none() {
            self.state.set(RendererState::Unattached);
            return PassOutcome::LoadFailed;
        }

        // store writes and search focus changes made while the load was
        // pending were never painted onto the kept view
        self.paint_all(ticket);
        PassOutcome::LoadFailed
    }

    /// Full pass against a view that becomes ready asynchronously.
    ///
    /// The pass is registered as soon as this is called, not when the returned
    /// future is first polled, so call order decides which pass wins.
    pub fn reconcile<'a, F>(&'a self, ready: F) -> impl Future<Output = PassOutcome> + 'a
    where
        F: Future<Output = Result<V, ViewError>> + 'a,
        V: 'a,
    {
        let ticket = self.begin_pass();
        async move {
            match ready.await {
                Ok(view) => self.finish_pass(ticket, view),
                Err(error) => self.fail_pass(ticket, error),
            }
        }
    }

    /// Full pass against the current view, for content re-rendered in place.
    pub fn refresh(&self) -> PassOutcome {
        match self.state.get() {
            RendererState::Closed => PassOutcome::Closed,
            RendererState::Reconciling => PassOutcome::Deferred,
            RendererState::Unattached => PassOutcome::NoView,
            RendererState::Attached => {
                let ticket = self.begin_pass();
                self.paint_all(ticket)
            }
        }
    }

    /// Fast path: paint one newly added annotation without touching the
    /// annotation marks already on the view. The search focus mark is
    /// repainted above it. Returns whether a mark was painted.
    ///
    /// While a replacement view is pending nothing is painted here; the
    /// pending pass reads the store when its view is ready, or repaints the
    /// kept view if the load fails.
    pub fn paint_added(&self, annotation: &Annotation) -> bool {
        if self.state.get() != RendererState::Attached {
            return false;
        }

        let mut slot = self.view.borrow_mut();
        let Some(view) = slot.as_mut() else {
            return false;
        };

        match paint_annotation(view, annotation, &self.config) {
            Ok(()) => {
                // search focus stays on top, as after a full pass
                if let Some(ref focus) = *self.search_focus.borrow() {
                    view.clear_marks(MarkTag::Search);
                    if let Err(error) = paint_search(view, focus, &self.config) {
                        tracing::debug!(location = %focus, error = %error, "search focus not in view");
                    }
                }
                true
            }
            Err(error) => {
                tracing::debug!(
                    id = %annotation.id,
                    location = %annotation.location,
                    error = %error,
                    "new annotation not paintable in current view"
                );
                false
            }
        }
    }

    /// Location of the current search result, painted by every pass
    pub fn set_search_focus(&self, location: Option<LocationRef>) {
        *self.search_focus.borrow_mut() = location;
    }

    pub fn search_focus(&self) -> Option<LocationRef> {
        self.search_focus.borrow().clone()
    }

    /// End of session. Pending passes are superseded and the view is released.
    pub fn close(&self) {
        self.generation.set(self.generation.get() + 1);
        self.state.set(RendererState::Closed);
        self.view.borrow_mut().take();
        tracing::debug!("reconciler closed");
    }

    /// Inspect the current view
    pub fn with_view<R>(&self, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.view.borrow().as_ref().map(f)
    }

    fn is_stale(&self, ticket: PassTicket) -> bool {
        ticket.generation != self.generation.get()
    }

    fn paint_all(&self, ticket: PassTicket) -> PassOutcome {
        let mut slot = self.view.borrow_mut();
        let Some(view) = slot.as_mut() else {
            self.state.set(RendererState::Unattached);
            return PassOutcome::NoView;
        };

        view.clear_marks(MarkTag::Annotation);
        view.clear_marks(MarkTag::Search);

        let store = self.store.borrow();
        let mut report = PassReport::default();
        for annotation in store.all() {
            if self.is_stale(ticket) {
                return PassOutcome::Superseded;
            }
            match paint_annotation(view, annotation, &self.config) {
                Ok(()) => report.painted += 1,
                Err(error) => {
                    report.skipped += 1;
                    tracing::debug!(
                        id = %annotation.id,
                        location = %annotation.location,
                        error = %error,
                        "skipping annotation"
                    );
                }
            }
        }

        if let Some(ref focus) = *self.search_focus.borrow() {
            report.search_painted = match paint_search(view, focus, &self.config) {
                Ok(()) => true,
                Err(error) => {
                    tracing::debug!(location = %focus, error = %error, "search focus not in view");
                    false
                }
            };
        }

        self.state.set(RendererState::Attached);
        tracing::debug!(
            generation = ticket.generation,
            painted = report.painted,
            skipped = report.skipped,
            "reconciliation pass complete"
        );
        PassOutcome::Painted(report)
    }
}

fn paint_annotation<V: ContentView>(
    view: &mut V,
    annotation: &Annotation,
    config: &RenderConfig,
) -> Result<(), ViewError> {
    let region = view.resolve(&annotation.location)?;
    view.paint(&region, &mark_for(annotation, config))
}

fn paint_search<V: ContentView>(
    view: &mut V,
    location: &LocationRef,
    config: &RenderConfig,
) -> Result<(), ViewError> {
    let region = view.resolve(location)?;
    let mark = MarkSpec {
        tag: MarkTag::Search,
        kind: MarkKind::SearchFocus,
        annotation_id: None,
        comment: None,
        style: config.search.clone(),
    };
    view.paint(&region, &mark)
}

fn mark_for(annotation: &Annotation, config: &RenderConfig) -> MarkSpec {
    let (kind, style) = match annotation.kind {
        AnnotationKind::Highlight => (MarkKind::Highlight, &config.highlight),
        AnnotationKind::Note => (MarkKind::Underline, &config.note),
    };
    MarkSpec {
        tag: MarkTag::Annotation,
        kind,
        annotation_id: Some(annotation.id),
        comment: annotation.comment.clone(),
        style: style.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{AddResult, AnnotationStore};
    use crate::view::text::{PaintedMark, TextView};
    use futures::channel::oneshot;

    const CHAPTER: &str = "It was the best of times, it was the worst of times, \
                           it was the age of wisdom, it was the age of foolishness.";

    fn loc(spine_step: u32, start: u32, end: u32) -> LocationRef {
        LocationRef::new(&format!(
            "epubcfi(/6/{}!/4/2,/1:{},/1:{})",
            spine_step, start, end
        ))
        .unwrap()
    }

    fn add(store: &SharedStore, location: LocationRef, kind: AnnotationKind) -> AddResult {
        store
            .borrow_mut()
            .add(&location, "some text", kind, Some("a comment"))
    }

    fn annotation_marks(reconciler: &Reconciler<TextView>) -> Vec<PaintedMark> {
        reconciler
            .with_view(|v| v.marks_with_tag(MarkTag::Annotation).cloned().collect())
            .unwrap_or_default()
    }

    fn setup() -> (SharedStore, Reconciler<TextView>) {
        let store = AnnotationStore::shared();
        let reconciler = Reconciler::new(store.clone(), RenderConfig::default());
        (store, reconciler)
    }

    #[test]
    fn test_attach_paints_store() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        add(&store, loc(4, 7, 10), AnnotationKind::Note);

        assert_eq!(reconciler.state(), RendererState::Unattached);
        let outcome = reconciler.attach(TextView::chapter(1, CHAPTER));

        assert_eq!(
            outcome,
            PassOutcome::Painted(PassReport {
                painted: 2,
                skipped: 0,
                search_painted: false
            })
        );
        assert_eq!(reconciler.state(), RendererState::Attached);

        let marks = annotation_marks(&reconciler);
        assert_eq!(marks[0].spec.kind, MarkKind::Highlight);
        assert_eq!(marks[1].spec.kind, MarkKind::Underline);
        assert_eq!(marks[1].spec.comment.as_deref(), Some("a comment"));
    }

    #[test]
    fn test_only_resolvable_entries_are_painted() {
        let (store, reconciler) = setup();
        add(&store, loc(2, 0, 5), AnnotationKind::Note);
        let AddResult::Added(second) = add(&store, loc(4, 3, 9), AnnotationKind::Note) else {
            panic!("expected note to be added");
        };
        add(&store, loc(6, 0, 5), AnnotationKind::Note);

        let outcome = reconciler.attach(TextView::chapter(1, CHAPTER));

        let PassOutcome::Painted(report) = outcome else {
            panic!("expected a painted pass, got {:?}", outcome);
        };
        assert_eq!(report.painted, 1);
        assert_eq!(report.skipped, 2);

        let marks = annotation_marks(&reconciler);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].spec.annotation_id, Some(second.id));
    }

    #[test]
    fn test_bad_entry_does_not_abort_pass() {
        let (store, reconciler) = setup();
        add(&store, LocationRef::new("opaque-ref").unwrap(), AnnotationKind::Highlight);
        add(&store, loc(4, 500, 600), AnnotationKind::Highlight);
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);

        let outcome = reconciler.attach(TextView::chapter(1, CHAPTER));
        assert!(matches!(
            outcome,
            PassOutcome::Painted(PassReport { painted: 1, skipped: 2, .. })
        ));
    }

    #[test]
    fn test_full_pass_is_idempotent() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        add(&store, loc(4, 3, 12), AnnotationKind::Note);
        reconciler.set_search_focus(Some(loc(4, 20, 24)));

        reconciler.attach(TextView::chapter(1, CHAPTER));
        let once = reconciler.with_view(|v| v.marks().to_vec()).unwrap();
        reconciler.refresh();
        reconciler.refresh();
        let thrice = reconciler.with_view(|v| v.marks().to_vec()).unwrap();

        assert_eq!(once.len(), 3);
        assert_eq!(once, thrice);
    }

    #[test]
    fn test_fast_path_matches_full_pass() {
        let (store, reconciler) = setup();
        reconciler.set_search_focus(Some(loc(4, 30, 40)));
        reconciler.attach(TextView::page(1, CHAPTER, 0..60));

        let additions = [
            (loc(4, 0, 5), AnnotationKind::Highlight),
            (loc(4, 10, 20), AnnotationKind::Note),
            (loc(4, 0, 5), AnnotationKind::Note), // duplicate
            (loc(4, 70, 80), AnnotationKind::Highlight), // off page
            (loc(6, 0, 5), AnnotationKind::Highlight), // other chapter
            (loc(4, 2, 8), AnnotationKind::Highlight),
        ];
        for (location, kind) in additions {
            if let AddResult::Added(annotation) = add(&store, location, kind) {
                reconciler.paint_added(&annotation);
            }
        }
        let fast = reconciler.with_view(|v| v.marks().to_vec()).unwrap();

        reconciler.refresh();
        let full = reconciler.with_view(|v| v.marks().to_vec()).unwrap();

        assert_eq!(fast.len(), 4);
        assert_eq!(fast, full);
        assert_eq!(fast[3].spec.kind, MarkKind::SearchFocus);
    }

    #[test]
    fn test_fast_path_paints_only_the_new_mark() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        reconciler.attach(TextView::chapter(1, CHAPTER));
        let before = annotation_marks(&reconciler);

        let AddResult::Added(new) = add(&store, loc(4, 6, 9), AnnotationKind::Highlight) else {
            panic!("expected highlight to be added");
        };
        assert!(reconciler.paint_added(&new));

        let after = annotation_marks(&reconciler);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1].spec.annotation_id, Some(new.id));
    }

    #[test]
    fn test_superseded_pass_does_not_paint() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        add(&store, loc(6, 0, 5), AnnotationKind::Highlight);

        let first = reconciler.begin_pass();
        let second = reconciler.begin_pass();

        let outcome = reconciler.finish_pass(second, TextView::chapter(2, CHAPTER));
        assert!(matches!(outcome, PassOutcome::Painted(_)));

        let late = reconciler.finish_pass(first, TextView::chapter(1, CHAPTER));
        assert_eq!(late, PassOutcome::Superseded);
        assert_eq!(reconciler.with_view(|v| v.spine_index()), Some(2));
        assert_eq!(annotation_marks(&reconciler).len(), 1);
    }

    #[tokio::test]
    async fn test_stale_async_pass_is_suppressed() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        add(&store, loc(6, 0, 5), AnnotationKind::Highlight);

        let (tx_a, rx_a) = oneshot::channel::<TextView>();
        let (tx_b, rx_b) = oneshot::channel::<TextView>();

        let pass_a = reconciler.reconcile(async move { rx_a.await.map_err(|_| ViewError::NotLoaded) });
        let pass_b = reconciler.reconcile(async move { rx_b.await.map_err(|_| ViewError::NotLoaded) });
        assert_eq!(reconciler.state(), RendererState::Reconciling);

        // pass A's content finishes loading first
        tx_a.send(TextView::chapter(1, CHAPTER)).unwrap();
        tx_b.send(TextView::chapter(2, CHAPTER)).unwrap();

        let (a, b) = tokio::join!(pass_a, pass_b);
        assert_eq!(a, PassOutcome::Superseded);
        assert!(matches!(b, PassOutcome::Painted(PassReport { painted: 1, .. })));

        let marks = annotation_marks(&reconciler);
        assert_eq!(marks.len(), 1);
        assert_eq!(reconciler.with_view(|v| v.spine_index()), Some(2));
        assert_eq!(reconciler.state(), RendererState::Attached);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_view() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        reconciler.attach(TextView::chapter(1, CHAPTER));

        let outcome = reconciler
            .reconcile(async { Err::<TextView, _>(ViewError::NotLoaded) })
            .await;

        assert_eq!(outcome, PassOutcome::LoadFailed);
        assert_eq!(reconciler.state(), RendererState::Attached);
        assert_eq!(annotation_marks(&reconciler).len(), 1);
    }

    #[test]
    fn test_add_during_failed_pass_is_painted_on_kept_view() {
        let (store, reconciler) = setup();
        reconciler.attach(TextView::chapter(1, CHAPTER));

        let ticket = reconciler.begin_pass();
        let AddResult::Added(new) = add(&store, loc(4, 0, 5), AnnotationKind::Highlight) else {
            panic!("expected highlight to be added");
        };
        assert!(!reconciler.paint_added(&new));

        let outcome = reconciler.fail_pass(ticket, ViewError::NotLoaded);
        assert_eq!(outcome, PassOutcome::LoadFailed);
        assert_eq!(reconciler.state(), RendererState::Attached);

        let marks = annotation_marks(&reconciler);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].spec.annotation_id, Some(new.id));

        // a later full pass changes nothing
        reconciler.refresh();
        assert_eq!(annotation_marks(&reconciler), marks);
    }

    #[test]
    fn test_search_cleared_during_failed_pass() {
        let (_store, reconciler) = setup();
        reconciler.set_search_focus(Some(loc(4, 0, 5)));
        reconciler.attach(TextView::chapter(1, CHAPTER));

        let ticket = reconciler.begin_pass();
        reconciler.set_search_focus(None);
        assert_eq!(reconciler.refresh(), PassOutcome::Deferred);

        reconciler.fail_pass(ticket, ViewError::NotLoaded);
        let search_marks = reconciler
            .with_view(|v| v.marks_with_tag(MarkTag::Search).count())
            .unwrap();
        assert_eq!(search_marks, 0);
    }

    #[test]
    fn test_failed_first_load_stays_unattached() {
        let (_store, reconciler) = setup();
        let ticket = reconciler.begin_pass();

        assert_eq!(
            reconciler.fail_pass(ticket, ViewError::NotLoaded),
            PassOutcome::LoadFailed
        );
        assert_eq!(reconciler.state(), RendererState::Unattached);
    }

    #[test]
    fn test_add_during_pending_pass_is_painted_by_that_pass() {
        let (store, reconciler) = setup();
        reconciler.attach(TextView::chapter(1, CHAPTER));

        let ticket = reconciler.begin_pass();
        let AddResult::Added(new) = add(&store, loc(4, 0, 5), AnnotationKind::Highlight) else {
            panic!("expected highlight to be added");
        };
        assert!(!reconciler.paint_added(&new));
        assert_eq!(reconciler.refresh(), PassOutcome::Deferred);

        reconciler.finish_pass(ticket, TextView::chapter(1, CHAPTER));
        assert_eq!(annotation_marks(&reconciler).len(), 1);
    }

    #[test]
    fn test_search_focus_is_part_of_the_pass() {
        let (store, reconciler) = setup();
        add(&store, loc(4, 0, 5), AnnotationKind::Highlight);
        reconciler.set_search_focus(Some(loc(4, 0, 5)));

        reconciler.attach(TextView::chapter(1, CHAPTER));
        let marks = reconciler.with_view(|v| v.marks().to_vec()).unwrap();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[1].spec.kind, MarkKind::SearchFocus);

        // navigating away then clearing never leaves a stale search mark
        reconciler.attach(TextView::chapter(2, CHAPTER));
        reconciler.set_search_focus(None);
        reconciler.attach(TextView::chapter(1, CHAPTER));
        let marks = reconciler.with_view(|v| v.marks().to_vec()).unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].spec.tag, MarkTag::Annotation);
    }

    #[test]
    fn test_closed_is_terminal() {
        let (store, reconciler) = setup();
        reconciler.attach(TextView::chapter(1, CHAPTER));
        let ticket = reconciler.begin_pass();

        reconciler.close();
        assert_eq!(reconciler.state(), RendererState::Closed);
        assert!(reconciler.with_view(|_| ()).is_none());

        assert_eq!(
            reconciler.finish_pass(ticket, TextView::chapter(1, CHAPTER)),
            PassOutcome::Closed
        );
        assert_eq!(reconciler.attach(TextView::chapter(1, CHAPTER)), PassOutcome::Closed);
        assert_eq!(reconciler.refresh(), PassOutcome::Closed);

        let AddResult::Added(new) = add(&store, loc(4, 0, 5), AnnotationKind::Highlight) else {
            panic!("expected highlight to be added");
        };
        assert!(!reconciler.paint_added(&new));
        assert_eq!(reconciler.state(), RendererState::Closed);
    }
}
