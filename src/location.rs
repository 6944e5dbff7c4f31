//! Location references
//!
//! A [`LocationRef`] is the opaque, value-comparable handle the content
//! provider hands out for a selected range. When the raw value is an EPUB CFI
//! it is parsed and re-emitted in canonical form, so two references to the same
//! range compare equal even if the provider formatted them differently.
//! Anything else is kept as an opaque trimmed string.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::cfi::{self, Cfi};

#[derive(Debug, Clone)]
pub struct LocationRef {
    key: String,
    cfi: Option<Cfi>,
}

impl LocationRef {
    /// Build a reference from a raw provider value.
    ///
    /// Returns `None` for blank input: "no active selection" is not an error.
    pub fn new(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        Some(match cfi::try_parse(raw) {
            Some(cfi) => Self::from_cfi(cfi),
            None => {
                tracing::trace!(location = raw, "location is not a CFI, keeping it opaque");
                Self {
                    key: raw.to_string(),
                    cfi: None,
                }
            }
        })
    }

    pub fn from_cfi(cfi: Cfi) -> Self {
        Self {
            key: cfi.to_string(),
            cfi: Some(cfi),
        }
    }

    /// Canonical form; equality and hashing use only this.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cfi(&self) -> Option<&Cfi> {
        self.cfi.as_ref()
    }
}

impl PartialEq for LocationRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for LocationRef {}

impl Hash for LocationRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Reading order for CFIs; opaque references sort after them by key.
impl Ord for LocationRef {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.cfi, &other.cfi) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.key.cmp(&other.key),
        }
    }
}

impl PartialOrd for LocationRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LocationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl Serialize for LocationRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key)
    }
}
