//! CFI (Canonical Fragment Identifier) types
//!
//! Only the parts of EPUB CFI that identify text locations are modelled:
//! element/indirection steps, id assertions, character offsets and ranges.
//! Format: epubcfi(/6/4[chap01ref]!/4/2,/1:10,/1:42)
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete EPUB CFI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cfi {
    /// Common path (the parent path for ranges)
    pub path: CfiPath,
    /// Start and end of a selection, relative to `path`
    pub range: Option<CfiRange>,
}

/// A sequence of steps with an optional terminal character offset
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfiPath {
    pub steps: Vec<CfiStep>,
    pub character_offset: Option<CharacterOffset>,
}

/// Range part of a CFI (text selections)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfiRange {
    pub start: CfiPath,
    pub end: CfiPath,
}

/// A single step in a CFI path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfiStep {
    pub step_type: StepType,
    /// Optional `[id]` assertion
    pub id_assertion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// `/N` - N-th child (even = element, odd = text)
    Element(u32),
    /// `!` - step into the referenced content document
    Indirection,
}

/// Character offset within a text node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterOffset {
    pub offset: u32,
    pub assertion: Option<TextAssertion>,
}

/// `[prefix,suffix;key=value]` text location assertion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextAssertion {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub parameters: Vec<(String, String)>,
}

impl Cfi {
    pub fn new(path: CfiPath) -> Self {
        Self { path, range: None }
    }

    pub fn with_range(path: CfiPath, start: CfiPath, end: CfiPath) -> Self {
        Self {
            path,
            range: Some(CfiRange { start, end }),
        }
    }

    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// 0-based spine item index, derived from the leading `/6/N` steps.
    pub fn spine_index(&self) -> Option<u32> {
        match self.path.steps.as_slice() {
            [first, second, ..] => match (first.step_type, second.step_type) {
                (StepType::Element(6), StepType::Element(n)) if n >= 2 => Some(n / 2 - 1),
                _ => None,
            },
            _ => None,
        }
    }

    /// Character offset where the referenced text starts.
    ///
    /// For ranges this is the start path's offset; for collapsed CFIs it is
    /// the offset on the main path.
    pub fn start_offset(&self) -> Option<u32> {
        match &self.range {
            Some(range) => range.start.offset(),
            None => self.path.offset(),
        }
    }

    /// Character offset where the referenced text ends (collapsed CFIs end
    /// where they start).
    pub fn end_offset(&self) -> Option<u32> {
        match &self.range {
            Some(range) => range.end.offset(),
            None => self.path.offset(),
        }
    }
}

impl CfiPath {
    pub fn with_steps(steps: Vec<CfiStep>) -> Self {
        Self {
            steps,
            character_offset: None,
        }
    }

    pub fn set_character_offset(&mut self, offset: u32) {
        self.character_offset = Some(CharacterOffset {
            offset,
            assertion: None,
        });
    }

    pub fn offset(&self) -> Option<u32> {
        self.character_offset.as_ref().map(|c| c.offset)
    }
}

impl CfiStep {
    pub fn element(index: u32) -> Self {
        Self {
            step_type: StepType::Element(index),
            id_assertion: None,
        }
    }

    pub fn element_with_id(index: u32, id: impl Into<String>) -> Self {
        Self {
            step_type: StepType::Element(index),
            id_assertion: Some(id.into()),
        }
    }

    pub fn indirection() -> Self {
        Self {
            step_type: StepType::Indirection,
            id_assertion: None,
        }
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", self.path)?;
        if let Some(ref range) = self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        if let Some(ref offset) = self.character_offset {
            write!(f, ":{}", offset.offset)?;
            if let Some(ref assertion) = offset.assertion {
                write!(f, "{}", assertion)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for CfiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_type {
            StepType::Element(n) => write!(f, "/{}", n)?,
            StepType::Indirection => write!(f, "!")?,
        }
        if let Some(ref id) = self.id_assertion {
            write!(f, "[{}]", escape(id))?;
        }
        Ok(())
    }
}

impl fmt::Display for TextAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if let Some(ref prefix) = self.prefix {
            write!(f, "{}", escape(prefix))?;
        }
        write!(f, ",")?;
        if let Some(ref suffix) = self.suffix {
            write!(f, "{}", escape(suffix))?;
        }
        for (key, value) in &self.parameters {
            write!(f, ";{}={}", escape(key), escape(value))?;
        }
        write!(f, "]")
    }
}

/// Re-apply `^` escapes so displayed CFIs parse back to the same value.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '^' | '[' | ']' | '(' | ')' | ',' | ';' | '=') {
            out.push('^');
        }
        out.push(ch);
    }
    out
}
