//! Annotation types

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::location::LocationRef;

/// A single user mark on the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Session-unique identifier, used to tag painted marks
    pub id: Uuid,
    /// Where the mark is anchored
    pub location: LocationRef,
    /// The text captured when the mark was created
    pub text: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// Present only for notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Filled translucent region
    Highlight,
    /// Underline with an attached comment
    Note,
}

/// Result of [`AnnotationStore::add`](super::AnnotationStore::add)
#[derive(Debug, Clone, PartialEq)]
pub enum AddResult {
    Added(Annotation),
    /// An entry with an equal location already exists; nothing changed
    Duplicate,
    /// Blank text, or a note without a comment
    Ignored,
}

impl Annotation {
    pub fn new_highlight(location: LocationRef, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            location,
            text: text.to_string(),
            kind: AnnotationKind::Highlight,
            comment: None,
            created_at: Utc::now(),
        }
    }

    pub fn new_note(location: LocationRef, text: &str, comment: &str) -> Self {
        Self {
            kind: AnnotationKind::Note,
            comment: Some(comment.to_string()),
            ..Self::new_highlight(location, text)
        }
    }

    /// Notes with a non-empty comment are what the notes panel lists and
    /// what gets exported.
    pub fn is_exportable_note(&self) -> bool {
        self.kind == AnnotationKind::Note
            && self.comment.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

impl AddResult {
    pub fn is_added(&self) -> bool {
        matches!(self, AddResult::Added(_))
    }
}
