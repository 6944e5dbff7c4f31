//! Annotation module
//!
//! Session-scoped highlights and notes:
//!
//! - [`AnnotationStore`]: insertion-ordered, at most one entry per location
//! - [`Annotation`] / [`AnnotationKind`]: highlights and commented notes
//! - plain-text export of notes ([`ExportFile`])
//!
//! Nothing here is persisted; the store lives as long as the reading session.

mod export;
mod store;
mod types;

pub use export::{export_filename, ExportFile, BLOCK_DELIMITER};
pub use store::{AnnotationStore, SharedStore};
pub use types::{AddResult, Annotation, AnnotationKind};
