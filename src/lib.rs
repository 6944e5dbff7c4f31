//! Marginalia
//!
//! In-session highlights and notes for a paginated EPUB reader. Annotations
//! live in an insertion-ordered store keyed by location; a reconciler repaints
//! them every time the rendering engine replaces its view.
//!
//! # Modules
//!
//! - `cfi`: EPUB CFI parsing, canonical formatting and reading order
//! - `location`: value-comparable location references
//! - `annotations`: the store and plain-text notes export
//! - `selection`: the pending reader selection
//! - `view`: the content view seam and an in-memory text view
//! - `reconciler`: generation-tracked repaint of the store onto the view
//! - `events`: selection and re-render events with owned subscriptions
//! - `session`: one reading session tying the pieces together

pub mod annotations;
pub mod cfi;
pub mod config;
pub mod error;
pub mod events;
pub mod location;
pub mod logging;
pub mod reconciler;
pub mod selection;
pub mod session;
pub mod view;

pub use annotations::{AddResult, Annotation, AnnotationKind, AnnotationStore, ExportFile, SharedStore};
pub use config::{ExportConfig, ReaderConfig, RenderConfig};
pub use error::{ReaderError, Result};
pub use events::{EventBus, EventKind, ReaderEvent, Subscription, SubscriptionSet};
pub use location::LocationRef;
pub use reconciler::{PassOutcome, PassReport, PassTicket, Reconciler, RendererState};
pub use selection::{Selection, SelectionContext};
pub use session::{ActionOutcome, ReaderSession};
pub use view::{ContentView, MarkKind, MarkSpec, MarkStyle, MarkTag, ViewError};
