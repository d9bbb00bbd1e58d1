//! The document collaborator.

use crate::extract::{self, Span};

/// A host source document open for validation.
pub trait Document: Send + Sync {
    /// Workspace-relative path; keys both diagnostics and overrides.
    fn identity(&self) -> &str;

    /// Language tag, e.g. `typescript`.
    fn language(&self) -> &str;

    fn lines(&self) -> Vec<&str>;

    /// Text covered by `span`.
    fn text_in(&self, span: &Span) -> String {
        extract::slice(&self.lines(), span)
    }
}

/// A document held entirely in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    identity: String,
    language: String,
    text: String,
}

impl TextDocument {
    pub fn new(
        identity: impl Into<String>,
        language: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            language: language.into(),
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

impl Document for TextDocument {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }
}

/// Guess a language tag from a file extension.
pub fn language_for_path(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "sql" => "sql",
        "rs" => "rust",
        "py" => "python",
        _ => "plaintext",
    }
}
