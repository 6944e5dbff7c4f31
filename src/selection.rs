//! Pending selection
//!
//! Holds the most recent non-blank selection until an action consumes it or
//! the reader deselects.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::location::LocationRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub location: LocationRef,
    /// Trimmed, never empty
    pub text: String,
}

#[derive(Debug, Default)]
pub struct SelectionContext {
    current: Option<Selection>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a selection. Blank text or a blank location clears the context
    /// instead. Returns whether a selection is now pending.
    pub fn capture(&mut self, raw_location: &str, raw_text: &str) -> bool {
        let text = raw_text.trim();
        self.current = match LocationRef::new(raw_location) {
            Some(location) if !text.is_empty() => Some(Selection {
                location,
                text: text.to_string(),
            }),
            _ => None,
        };
        self.current.is_some()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Consume the pending selection
    pub fn take(&mut self) -> Option<Selection> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Dictionary lookup term for the pending selection: the first word,
    /// lower-cased, without diacritics.
    pub fn lookup_word(&self) -> Option<String> {
        let first = self.current.as_ref()?.text.split_whitespace().next()?;
        let word: String = first
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
            .collect::<String>()
            .to_lowercase();

        if word.is_empty() {
            None
        } else {
            Some(word)
        }
    }
}
