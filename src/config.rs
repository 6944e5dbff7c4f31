//! Configuration for marginalia

use serde::Deserialize;
use std::env;

use crate::error::{ReaderError, Result};
use crate::view::MarkStyle;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub render: RenderConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// CSS class prefix for painted marks
    pub class_prefix: String,
    pub highlight: MarkStyle,
    pub note: MarkStyle,
    pub search: MarkStyle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Prefix of export filenames; empty means no prefix
    pub filename_prefix: String,
    /// Used when the book title has no usable characters
    pub fallback_title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            class_prefix: "marginalia".to_string(),
            highlight: MarkStyle::fill("yellow", 0.3),
            note: MarkStyle::underline("blue", "2px", "5, 3"),
            search: MarkStyle::fill("red", 0.3),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            filename_prefix: "notes".to_string(),
            fallback_title: "Untitled Book".to_string(),
        }
    }
}

impl ReaderConfig {
    /// Load `.env` if present, then read `MARGINALIA_*` variables over the defaults.
    ///
    /// Optional helper for native hosts; nothing else in the crate reads the
    /// environment.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Failed to load .env: {}", e);
            }
        }
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ReaderConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = ReaderConfig::default();
        let render = &mut config.render;

        if let Some(prefix) = var("MARGINALIA_MARK_CLASS_PREFIX") {
            render.class_prefix = prefix;
        }
        if let Some(color) = var("MARGINALIA_HIGHLIGHT_COLOR") {
            render.highlight.color = color;
        }
        if let Some(raw) = var("MARGINALIA_HIGHLIGHT_OPACITY") {
            let opacity: f32 = raw.trim().parse().map_err(|_| {
                ReaderError::InvalidConfig(format!("MARGINALIA_HIGHLIGHT_OPACITY={}", raw))
            })?;
            render.highlight.opacity = Some(opacity);
        }
        if let Some(color) = var("MARGINALIA_NOTE_COLOR") {
            render.note.color = color;
        }
        if let Some(color) = var("MARGINALIA_SEARCH_COLOR") {
            render.search.color = color;
        }
        if let Some(prefix) = var("MARGINALIA_EXPORT_PREFIX") {
            config.export.filename_prefix = prefix;
        }
        if let Some(title) = var("MARGINALIA_EXPORT_FALLBACK_TITLE") {
            config.export.fallback_title = title;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let render = &self.render;
        for (name, style) in [
            ("highlight", &render.highlight),
            ("note", &render.note),
            ("search", &render.search),
        ] {
            if let Some(opacity) = style.opacity {
                if !(0.0..=1.0).contains(&opacity) {
                    return Err(ReaderError::InvalidConfig(format!(
                        "{} opacity {} outside 0.0-1.0",
                        name, opacity
                    )));
                }
            }
            if style.color.trim().is_empty() {
                return Err(ReaderError::InvalidConfig(format!("{} color is empty", name)));
            }
        }
        if self.export.fallback_title.trim().is_empty() {
            return Err(ReaderError::InvalidConfig(
                "export fallback title is empty".to_string(),
            ));
        }
        Ok(())
    }
}
