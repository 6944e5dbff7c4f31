//! Flat-text content view
//!
//! Models one spine item as a single run of text, optionally narrowed to the
//! character window visible on the current page. Range CFIs resolve when their
//! spine index matches and their character offsets fall inside the window;
//! offsets are counted in characters over the whole chapter text.

use std::ops::Range;

use super::{ContentView, MarkSpec, MarkTag, ViewError};
use crate::location::LocationRef;

/// Character range inside a [`TextView`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

/// A mark as drawn, in paint order
#[derive(Debug, Clone, PartialEq)]
pub struct PaintedMark {
    pub range: TextRange,
    pub spec: MarkSpec,
}

#[derive(Debug, Clone)]
pub struct TextView {
    spine_index: u32,
    chars: Vec<char>,
    window: Range<usize>,
    marks: Vec<PaintedMark>,
}

impl TextView {
    /// Whole chapter visible
    pub fn chapter(spine_index: u32, text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let window = 0..chars.len();
        Self {
            spine_index,
            chars,
            window,
            marks: Vec::new(),
        }
    }

    /// One page of a chapter: only `window` (character offsets) is visible.
    /// The window is clamped to the chapter length.
    pub fn page(spine_index: u32, text: &str, window: Range<usize>) -> Self {
        let mut view = Self::chapter(spine_index, text);
        let end = window.end.min(view.chars.len());
        view.window = window.start.min(end)..end;
        view
    }

    pub fn spine_index(&self) -> u32 {
        self.spine_index
    }

    pub fn marks(&self) -> &[PaintedMark] {
        &self.marks
    }

    pub fn marks_with_tag(&self, tag: MarkTag) -> impl Iterator<Item = &PaintedMark> + '_ {
        self.marks.iter().filter(move |m| m.spec.tag == tag)
    }

    /// Text under `range`, or `None` when it does not fit the chapter.
    pub fn text_of(&self, range: TextRange) -> Option<String> {
        self.chars
            .get(range.start..range.end)
            .map(|chars| chars.iter().collect())
    }

    /// Render the visible window as HTML, wrapping marked runs in spans.
    ///
    /// Overlapping marks nest in paint order (earliest outermost).
    pub fn to_html(&self, class_prefix: &str) -> String {
        let mut cuts = vec![self.window.start, self.window.end];
        for mark in &self.marks {
            cuts.push(mark.range.start.clamp(self.window.start, self.window.end));
            cuts.push(mark.range.end.clamp(self.window.start, self.window.end));
        }
        cuts.sort_unstable();
        cuts.dedup();

        let mut html = String::new();
        for pair in cuts.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let covering: Vec<&PaintedMark> = self
                .marks
                .iter()
                .filter(|m| m.range.start <= start && m.range.end >= end)
                .collect();

            for mark in &covering {
                html.push_str(&open_span(mark, class_prefix));
            }
            let text: String = self.chars[start..end].iter().collect();
            html.push_str(&html_escape::encode_text(&text));
            for _ in &covering {
                html.push_str("</span>");
            }
        }
        html
    }

    fn check_bounds(&self, start: usize, end: usize) -> Result<(), ViewError> {
        if end > self.chars.len() {
            return Err(ViewError::OutOfBounds {
                start,
                end,
                len: self.chars.len(),
            });
        }
        Ok(())
    }
}

fn open_span(mark: &PaintedMark, class_prefix: &str) -> String {
    let spec = &mark.spec;
    let mut span = format!(
        "<span class=\"{p} {p}-{kind}\" data-mark-tag=\"{tag}\"",
        p = html_escape::encode_double_quoted_attribute(class_prefix),
        kind = spec.kind.as_str(),
        tag = spec.tag.as_str(),
    );
    if let Some(id) = spec.annotation_id {
        span.push_str(&format!(" data-annotation-id=\"{}\"", id));
    }
    if let Some(ref comment) = spec.comment {
        span.push_str(&format!(
            " title=\"{}\"",
            html_escape::encode_double_quoted_attribute(comment)
        ));
    }
    span.push_str(&format!(
        " style=\"{}\">",
        html_escape::encode_double_quoted_attribute(&spec.style.to_css())
    ));
    span
}

impl ContentView for TextView {
    type Region = TextRange;

    fn resolve(&self, location: &LocationRef) -> Result<TextRange, ViewError> {
        let cfi = location
            .cfi()
            .ok_or_else(|| ViewError::Malformed(location.key().to_string()))?;

        let spine_index = cfi
            .spine_index()
            .ok_or_else(|| ViewError::Malformed(location.key().to_string()))?;
        if spine_index != self.spine_index {
            return Err(ViewError::NotInView(location.key().to_string()));
        }

        let (start, end) = match (cfi.start_offset(), cfi.end_offset()) {
            (Some(start), Some(end)) => (start as usize, end as usize),
            _ => return Err(ViewError::Malformed(location.key().to_string())),
        };
        if end <= start {
            return Err(ViewError::EmptyRange(location.key().to_string()));
        }
        self.check_bounds(start, end)?;

        if start < self.window.start || end > self.window.end {
            return Err(ViewError::NotInView(location.key().to_string()));
        }

        Ok(TextRange { start, end })
    }

    fn paint(&mut self, region: &TextRange, mark: &MarkSpec) -> Result<(), ViewError> {
        self.check_bounds(region.start, region.end)?;
        self.marks.push(PaintedMark {
            range: *region,
            spec: mark.clone(),
        });
        Ok(())
    }

    fn clear_marks(&mut self, tag: MarkTag) {
        self.marks.retain(|m| m.spec.tag != tag);
    }
}
