//! In-memory annotation store
//!
//! Holds the session's annotations in insertion order. Entries are only ever
//! appended; the full-session [`AnnotationStore::clear`] is the sole removal.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::types::{AddResult, Annotation, AnnotationKind};
use crate::location::LocationRef;

/// Store handle shared between the reconciler and the UI action handlers.
///
/// The host is single-threaded; a pass only borrows the store for its
/// synchronous read-then-paint section.
pub type SharedStore = Rc<RefCell<AnnotationStore>>;

#[derive(Debug, Default)]
pub struct AnnotationStore {
    entries: Vec<Annotation>,
    /// location -> position in `entries`
    index: HashMap<LocationRef, usize>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Append an annotation unless one already exists at an equal location.
    ///
    /// Blank `text` (and, for notes, a blank `comment`) is ignored silently.
    /// `comment` is dropped for highlights.
    pub fn add(
        &mut self,
        location: &LocationRef,
        text: &str,
        kind: AnnotationKind,
        comment: Option<&str>,
    ) -> AddResult {
        let text = text.trim();
        if text.is_empty() {
            return AddResult::Ignored;
        }

        if self.index.contains_key(location) {
            tracing::debug!(location = %location, "location already annotated, ignoring");
            return AddResult::Duplicate;
        }

        let annotation = match kind {
            AnnotationKind::Highlight => Annotation::new_highlight(location.clone(), text),
            AnnotationKind::Note => match comment.map(str::trim).filter(|c| !c.is_empty()) {
                Some(comment) => Annotation::new_note(location.clone(), text, comment),
                None => return AddResult::Ignored,
            },
        };

        self.index.insert(location.clone(), self.entries.len());
        self.entries.push(annotation.clone());
        tracing::debug!(
            id = %annotation.id,
            kind = ?annotation.kind,
            total = self.entries.len(),
            "annotation added"
        );

        AddResult::Added(annotation)
    }

    /// All annotations in insertion (paint) order
    pub fn all(&self) -> &[Annotation] {
        &self.entries
    }

    /// Notes with a non-empty comment, in insertion order
    pub fn notes_only(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.entries.iter().filter(|a| a.is_exportable_note())
    }

    pub fn has_exportable_notes(&self) -> bool {
        self.notes_only().next().is_some()
    }

    /// All annotations sorted by their position in the book
    pub fn in_reading_order(&self) -> Vec<&Annotation> {
        let mut sorted: Vec<&Annotation> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.location.cmp(&b.location));
        sorted
    }

    pub fn get(&self, location: &LocationRef) -> Option<&Annotation> {
        self.index.get(location).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, location: &LocationRef) -> bool {
        self.index.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every annotation (session reset)
    pub fn clear(&mut self) {
        tracing::debug!(removed = self.entries.len(), "clearing annotation store");
        self.entries.clear();
        self.index.clear();
    }
}
