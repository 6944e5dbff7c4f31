//! Content view seam
//!
//! The paginated rendering surface is owned by an external engine. The
//! reconciler only needs to resolve a location against the currently loaded
//! view, paint a mark over the resolved region and wipe every mark of a tag.
//! [`text::TextView`] is an in-memory implementation over flat chapter text.

pub mod text;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::location::LocationRef;

/// A live, paintable content view
///
/// Views are replaced wholesale on page turns, chapter changes and layout
/// changes; regions and marks from one view mean nothing to the next.
pub trait ContentView {
    /// View-specific paintable region (node range, rectangles, ...)
    type Region;

    /// Resolve a location against the content currently loaded in this view
    fn resolve(&self, location: &LocationRef) -> Result<Self::Region, ViewError>;

    /// Paint a mark over a region. Painting may be additive: painting the
    /// same region twice may stack two marks.
    fn paint(&mut self, region: &Self::Region, mark: &MarkSpec) -> Result<(), ViewError>;

    /// Remove every mark carrying `tag`
    fn clear_marks(&mut self, tag: MarkTag);
}

/// Groups of marks that are cleared together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkTag {
    Annotation,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkKind {
    /// Filled translucent region
    Highlight,
    /// Underline with a comment marker
    Underline,
    /// Current search result
    SearchFocus,
}

impl MarkTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkTag::Annotation => "annotation",
            MarkTag::Search => "search",
        }
    }
}

impl MarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkKind::Highlight => "highlight",
            MarkKind::Underline => "underline",
            MarkKind::SearchFocus => "search-focus",
        }
    }
}

/// Visual style of a mark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkStyle {
    /// CSS color value
    pub color: String,
    /// Fill opacity (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    /// Stroke width for underlines, e.g. "2px"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<String>,
    /// Stroke dash pattern, e.g. "5, 3"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
}

impl MarkStyle {
    pub fn fill(color: &str, opacity: f32) -> Self {
        Self {
            color: color.to_string(),
            opacity: Some(opacity),
            stroke_width: None,
            dash: None,
        }
    }

    pub fn underline(color: &str, width: &str, dash: &str) -> Self {
        Self {
            color: color.to_string(),
            opacity: None,
            stroke_width: Some(width.to_string()),
            dash: Some(dash.to_string()),
        }
    }

    /// Inline CSS for HTML renderings
    pub fn to_css(&self) -> String {
        match (&self.stroke_width, self.opacity) {
            (Some(width), _) => {
                let mut css = format!("text-decoration: underline {} {};", self.color, width);
                if self.dash.is_some() {
                    css.push_str(" text-decoration-style: dashed;");
                }
                css
            }
            (None, opacity) => format!(
                "background-color: {}; opacity: {};",
                self.color,
                opacity.unwrap_or(1.0)
            ),
        }
    }
}

/// Everything a view needs to draw one mark
#[derive(Debug, Clone, PartialEq)]
pub struct MarkSpec {
    pub tag: MarkTag,
    pub kind: MarkKind,
    /// Annotation the mark belongs to (none for search marks)
    pub annotation_id: Option<Uuid>,
    /// Comment shown by the note marker
    pub comment: Option<String>,
    pub style: MarkStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The location belongs to content that is not loaded in this view
    #[error("Location not in the current view: {0}")]
    NotInView(String),

    #[error("Malformed location: {0}")]
    Malformed(String),

    #[error("Range {start}..{end} outside content of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("Location resolves to an empty range: {0}")]
    EmptyRange(String),

    #[error("View content is not loaded")]
    NotLoaded,

    #[error("Paint failed: {0}")]
    Paint(String),
}
