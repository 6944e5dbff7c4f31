//! Reading session
//!
//! One [`ReaderSession`] per opened document. It owns the annotation store,
//! the pending selection and the reconciler, and turns reader actions into
//! store mutations followed by the matching paint.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::annotations::{AddResult, Annotation, AnnotationKind, AnnotationStore, ExportFile, SharedStore};
use crate::config::ReaderConfig;
use crate::events::{EventBus, EventKind, ReaderEvent, SubscriptionSet};
use crate::location::LocationRef;
use crate::reconciler::{PassOutcome, Reconciler};
use crate::selection::{Selection, SelectionContext};
use crate::view::text::TextView;
use crate::view::{ContentView, ViewError};

/// Result of a highlight or annotate action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Added(Annotation),
    /// The selected range already carries an annotation
    Duplicate,
    NoSelection,
    /// The reader dismissed the comment prompt
    Cancelled,
}

pub struct ReaderSession<V: ContentView> {
    config: ReaderConfig,
    store: SharedStore,
    selection: Rc<RefCell<SelectionContext>>,
    reconciler: Rc<Reconciler<V>>,
    subscriptions: SubscriptionSet,
}

impl<V: ContentView + 'static> ReaderSession<V> {
    /// Fresh session with an empty store, created when a document loads.
    pub fn new(config: ReaderConfig) -> Self {
        let store = AnnotationStore::shared();
        let reconciler = Reconciler::new(Rc::clone(&store), config.render.clone());
        Self {
            config,
            store,
            selection: Rc::new(RefCell::new(SelectionContext::new())),
            reconciler: Rc::new(reconciler),
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// Route the bus's selection and re-render events into this session.
    /// Binding again replaces the previous handlers.
    pub fn bind(&mut self, bus: &EventBus) {
        let selection = Rc::clone(&self.selection);
        self.subscriptions
            .replace(bus.subscribe(EventKind::Selected, move |event| {
                if let ReaderEvent::Selected { location, text } = event {
                    selection.borrow_mut().capture(location.key(), text);
                }
            }));

        let selection = Rc::clone(&self.selection);
        self.subscriptions
            .replace(bus.subscribe(EventKind::Deselected, move |_| {
                selection.borrow_mut().clear();
            }));

        let reconciler = Rc::clone(&self.reconciler);
        self.subscriptions
            .replace(bus.subscribe(EventKind::Rerendered, move |_| {
                reconciler.refresh();
            }));

        tracing::debug!("session bound to event bus");
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler<V> {
        &self.reconciler
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn select(&self, location: &str, text: &str) -> bool {
        self.selection.borrow_mut().capture(location, text)
    }

    pub fn deselect(&self) {
        self.selection.borrow_mut().clear();
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.borrow().current().cloned()
    }

    /// Consume the selection for an action handled outside the session
    /// (copy, read aloud, dictionary lookup).
    pub fn take_selection(&self) -> Option<Selection> {
        self.selection.borrow_mut().take()
    }

    pub fn lookup_word(&self) -> Option<String> {
        self.selection.borrow().lookup_word()
    }

    pub fn highlight_selection(&self) -> ActionOutcome {
        let Some(selection) = self.take_selection() else {
            return ActionOutcome::NoSelection;
        };
        self.add(&selection, AnnotationKind::Highlight, None)
    }

    /// Attach a note to the selection. `None` or a blank comment means the
    /// reader cancelled the prompt; the selection is cleared either way.
    pub fn annotate_selection(&self, comment: Option<&str>) -> ActionOutcome {
        let Some(selection) = self.take_selection() else {
            return ActionOutcome::NoSelection;
        };
        match comment {
            Some(comment) if !comment.trim().is_empty() => {
                self.add(&selection, AnnotationKind::Note, Some(comment))
            }
            _ => ActionOutcome::Cancelled,
        }
    }

    fn add(&self, selection: &Selection, kind: AnnotationKind, comment: Option<&str>) -> ActionOutcome {
        let result = self
            .store
            .borrow_mut()
            .add(&selection.location, &selection.text, kind, comment);

        match result {
            AddResult::Added(annotation) => {
                self.reconciler.paint_added(&annotation);
                ActionOutcome::Added(annotation)
            }
            AddResult::Duplicate => {
                tracing::debug!(location = %selection.location, "range already annotated");
                ActionOutcome::Duplicate
            }
            AddResult::Ignored => ActionOutcome::NoSelection,
        }
    }

    /// First view of the document is ready.
    pub fn attach(&self, view: V) -> PassOutcome {
        self.reconciler.attach(view)
    }

    /// The view is being replaced (page turn, chapter change, relayout);
    /// `ready` resolves once the new content can be painted.
    pub fn view_replaced<'a, F>(&'a self, ready: F) -> impl Future<Output = PassOutcome> + 'a
    where
        F: Future<Output = Result<V, ViewError>> + 'a,
    {
        self.reconciler.reconcile(ready)
    }

    /// Navigate to a search result. The focus mark is painted by the pass for
    /// the view `ready` delivers.
    pub fn show_search_result<'a, F>(
        &'a self,
        location: LocationRef,
        ready: F,
    ) -> impl Future<Output = PassOutcome> + 'a
    where
        F: Future<Output = Result<V, ViewError>> + 'a,
    {
        self.reconciler.set_search_focus(Some(location));
        self.reconciler.reconcile(ready)
    }

    pub fn clear_search(&self) -> PassOutcome {
        self.reconciler.set_search_focus(None);
        self.reconciler.refresh()
    }

    /// Notes export for the book titled `title`, if there are notes.
    pub fn export_file(&self, title: &str) -> Option<ExportFile> {
        self.store.borrow().export_file(title, &self.config.export)
    }

    /// Close the document: release handlers, stop painting, drop annotations.
    pub fn end(&mut self) {
        self.subscriptions.clear();
        self.selection.borrow_mut().clear();
        self.reconciler.close();
        let dropped = self.store.borrow().len();
        self.store.borrow_mut().clear();
        tracing::info!(dropped, "reading session ended");
    }
}

impl ReaderSession<TextView> {
    /// Visible text as HTML, marks wrapped in spans carrying the configured
    /// class prefix. `None` before the first view is attached.
    pub fn render_html(&self) -> Option<String> {
        let prefix = &self.config.render.class_prefix;
        self.reconciler.with_view(|view| view.to_html(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::RendererState;
    use crate::view::{MarkKind, MarkTag};

    const CHAPTER: &str = "Uma noite destas, vindo da cidade para o Engenho Novo, \
                           encontrei no trem da Central um rapaz aqui do bairro.";
    const LOC: &str = "epubcfi(/6/4!/4/2,/1:4,/1:9)";

    fn session() -> ReaderSession<TextView> {
        let session = ReaderSession::new(ReaderConfig::default());
        session.attach(TextView::chapter(1, CHAPTER));
        session
    }

    fn mark_count(session: &ReaderSession<TextView>, tag: MarkTag) -> usize {
        session
            .reconciler()
            .with_view(|v| v.marks_with_tag(tag).count())
            .unwrap_or(0)
    }

    #[test]
    fn test_highlight_selection() {
        let session = session();
        session.select(LOC, " noite ");

        let ActionOutcome::Added(annotation) = session.highlight_selection() else {
            panic!("expected highlight to be added");
        };
        assert_eq!(annotation.text, "noite");
        assert_eq!(mark_count(&session, MarkTag::Annotation), 1);
        assert!(session.selection().is_none());
    }

    #[test]
    fn test_no_selection() {
        let session = session();
        assert_eq!(session.highlight_selection(), ActionOutcome::NoSelection);

        session.select(LOC, "   ");
        assert_eq!(session.annotate_selection(Some("x")), ActionOutcome::NoSelection);
        assert_eq!(session.store().borrow().len(), 0);
    }

    #[test]
    fn test_duplicate_clears_selection() {
        let session = session();
        session.select(LOC, "noite");
        session.highlight_selection();

        // same range, provider formatted it differently
        session.select(" epubcfi(/6/4!/4/2,/1:4,/1:9) ", "noite");
        assert_eq!(session.annotate_selection(Some("again")), ActionOutcome::Duplicate);
        assert!(session.selection().is_none());
        assert_eq!(session.store().borrow().len(), 1);
        assert_eq!(mark_count(&session, MarkTag::Annotation), 1);
    }

    #[test]
    fn test_cancelled_note() {
        let session = session();
        session.select(LOC, "noite");
        assert_eq!(session.annotate_selection(None), ActionOutcome::Cancelled);
        assert!(session.selection().is_none());

        session.select(LOC, "noite");
        assert_eq!(session.annotate_selection(Some("  ")), ActionOutcome::Cancelled);
        assert!(session.store().borrow().is_empty());
    }

    #[test]
    fn test_note_painted_as_underline() {
        let session = session();
        session.select(LOC, "noite");
        session.annotate_selection(Some("abertura"));

        let kinds: Vec<MarkKind> = session
            .reconciler()
            .with_view(|v| v.marks().iter().map(|m| m.spec.kind).collect())
            .unwrap();
        assert_eq!(kinds, vec![MarkKind::Underline]);
    }

    #[test]
    fn test_bound_events_drive_session() {
        let mut session = session();
        let bus = EventBus::new();
        session.bind(&bus);

        bus.emit(&ReaderEvent::Selected {
            location: LocationRef::new(LOC).unwrap(),
            text: "noite".to_string(),
        });
        assert!(session.selection().is_some());
        bus.emit(&ReaderEvent::Deselected);
        assert!(session.selection().is_none());

        session.select(LOC, "noite");
        session.highlight_selection();
        assert_eq!(bus.emit(&ReaderEvent::Rerendered), 1);
        assert_eq!(mark_count(&session, MarkTag::Annotation), 1);
    }

    #[test]
    fn test_rebind_does_not_double_handlers() {
        let mut session = session();
        let bus = EventBus::new();
        session.bind(&bus);
        session.bind(&bus);

        assert_eq!(bus.subscriber_count(EventKind::Selected), 1);
        assert_eq!(bus.subscriber_count(EventKind::Rerendered), 1);

        session.end();
        assert_eq!(bus.subscriber_count(EventKind::Rerendered), 0);
    }

    #[tokio::test]
    async fn test_annotation_survives_page_turns() {
        let session = session();
        session.select(LOC, "noite");
        session.highlight_selection();

        let away = session
            .view_replaced(async { Ok::<_, ViewError>(TextView::chapter(2, CHAPTER)) })
            .await;
        assert!(matches!(away, PassOutcome::Painted(_)));
        assert_eq!(mark_count(&session, MarkTag::Annotation), 0);

        session
            .view_replaced(async { Ok::<_, ViewError>(TextView::chapter(1, CHAPTER)) })
            .await;
        assert_eq!(mark_count(&session, MarkTag::Annotation), 1);
    }

    #[tokio::test]
    async fn test_search_result_and_clear() {
        let session = session();
        let target = LocationRef::new("epubcfi(/6/4!/4/2,/1:18,/1:23)").unwrap();

        session
            .show_search_result(target, async { Ok::<_, ViewError>(TextView::chapter(1, CHAPTER)) })
            .await;
        assert_eq!(mark_count(&session, MarkTag::Search), 1);

        session.clear_search();
        assert_eq!(mark_count(&session, MarkTag::Search), 0);
    }

    #[test]
    fn test_render_html_uses_class_prefix() {
        let mut config = ReaderConfig::default();
        config.render.class_prefix = "hl".to_string();
        let session = ReaderSession::new(config);
        assert!(session.render_html().is_none());

        session.attach(TextView::page(1, CHAPTER, 0..17));
        session.select(LOC, "noite");
        session.highlight_selection();

        let html = session.render_html().unwrap();
        assert!(html.starts_with("Uma <span class=\"hl hl-highlight\""));
        assert!(html.ends_with(">noite</span> destas,"));
    }

    #[test]
    fn test_export_and_end() {
        let mut session = session();
        session.select(LOC, "noite");
        session.highlight_selection();
        assert!(session.export_file("Dom Casmurro").is_none());

        session.select("epubcfi(/6/4!/4/2,/1:10,/1:16)", "destas");
        session.annotate_selection(Some("tempo"));
        let file = session.export_file("Dom Casmurro").unwrap();
        assert_eq!(file.filename, "notes-dom-casmurro.txt");
        assert!(file.contents.contains("Note: tempo"));

        session.end();
        assert!(session.store().borrow().is_empty());
        assert_eq!(session.reconciler().state(), RendererState::Closed);
    }
}
