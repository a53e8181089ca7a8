//! Pure rendering of context snapshots into human-readable reports.
//!
//! Rendering is a total function over well-formed snapshots: a missing
//! key renders a clearly marked placeholder instead of failing the run.

use crate::context::ContextSnapshot;
use serde::{Deserialize, Serialize};

/// Placeholder rendered for a section whose key is absent.
pub const MISSING_PLACEHOLDER: &str = "_(not available)_";

/// One section of a report: a heading bound to a context key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSection {
    /// The section heading.
    pub heading: String,
    /// The context key whose value fills the section.
    pub key: String,
}

/// A named, ordered selection of context keys to render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportTemplate {
    /// The document title.
    pub title: String,
    /// Sections in render order.
    pub sections: Vec<ReportSection>,
}

impl ReportTemplate {
    /// Creates an empty template with a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    /// Appends a section.
    #[must_use]
    pub fn section(mut self, heading: impl Into<String>, key: impl Into<String>) -> Self {
        self.sections.push(ReportSection {
            heading: heading.into(),
            key: key.into(),
        });
        self
    }
}

/// Renders selected snapshot entries as a markdown document.
///
/// Pure and total: no external calls, no failure modes. String values
/// render raw; structured values render as fenced JSON blocks.
#[must_use]
pub fn render(snapshot: &ContextSnapshot, template: &ReportTemplate) -> String {
    let mut doc = format!("# {}\n", template.title);

    for section in &template.sections {
        doc.push_str(&format!("\n## {}\n\n", section.heading));
        match snapshot.get(&section.key) {
            Some(serde_json::Value::String(text)) => {
                doc.push_str(text);
                doc.push('\n');
            }
            Some(value) => {
                doc.push_str("```json\n");
                doc.push_str(&serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
                doc.push_str("\n```\n");
            }
            None => {
                doc.push_str(MISSING_PLACEHOLDER);
                doc.push('\n');
            }
        }
    }

    doc
}
