//! EPUB CFI (Canonical Fragment Identifier) support
//!
//! CFIs are the location fingerprints annotations are keyed by: they point
//! into the flowing text of a content document and survive re-layout.
//!
//! ```text
//! epubcfi(/6/4[chapter1]!/4/2,/1:10,/1:42)
//!         │  │          │ │ │  └──┴── range start/end (text node, char offset)
//!         │  │          │ │ └──────── element index
//!         │  │          │ └────────── body
//!         │  │          └──────────── indirection into the content document
//!         │  └─────────────────────── spine item with ID assertion
//!         └────────────────────────── spine element
//! ```
//!
//! ```ignore
//! use marginalia::cfi::parse;
//!
//! let a = parse("epubcfi(/6/4!/4/2/1:10)").unwrap();
//! let b = parse("epubcfi(/6/4!/4/2/1:20)").unwrap();
//! assert!(a < b);
//! ```

mod comparator;
mod parser;
mod types;

pub use parser::{parse, try_parse, CfiParseError};
pub use types::{CharacterOffset, Cfi, CfiPath, CfiRange, CfiStep, StepType, TextAssertion};
