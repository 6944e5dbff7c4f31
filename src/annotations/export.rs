//! Plain-text export of session notes

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::store::AnnotationStore;
use crate::config::ExportConfig;

/// Line written after every exported note block
pub const BLOCK_DELIMITER: &str = "----------------------------------------";

/// A ready-to-download export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub contents: String,
}

impl AnnotationStore {
    /// Serialise the exportable notes, one block per note in insertion order:
    ///
    /// ```text
    /// "alpha"
    /// Note: first
    /// ----------------------------------------
    ///
    /// ```
    ///
    /// Output depends only on note text and comments, so it is byte-stable.
    pub fn export_text(&self) -> String {
        let mut out = String::new();
        for note in self.notes_only() {
            out.push_str(&format!("\"{}\"\n", note.text));
            if let Some(ref comment) = note.comment {
                out.push_str(&format!("Note: {}\n", comment));
            }
            out.push_str(BLOCK_DELIMITER);
            out.push_str("\n\n");
        }
        out
    }

    /// Export file for the notes, or `None` when there is nothing to export.
    pub fn export_file(&self, title: &str, config: &ExportConfig) -> Option<ExportFile> {
        if !self.has_exportable_notes() {
            return None;
        }

        Some(ExportFile {
            filename: export_filename(title, config),
            contents: self.export_text(),
        })
    }
}

/// `"{prefix}-{slug}.txt"`, with prefix and slug both restricted to `[a-z0-9-]`.
pub fn export_filename(title: &str, config: &ExportConfig) -> String {
    let slug = match slugify(title) {
        slug if slug.is_empty() => slugify(&config.fallback_title),
        slug => slug,
    };
    let prefix = slugify(&config.filename_prefix);

    match (prefix.is_empty(), slug.is_empty()) {
        (true, true) => "export.txt".to_string(),
        (true, false) => format!("{}.txt", slug),
        (false, true) => format!("{}.txt", prefix),
        (false, false) => format!("{}-{}.txt", prefix, slug),
    }
}

fn slugify(raw: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for ch in raw.nfkd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_alphanumeric() && ch.is_ascii() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }

    slug
}
