//! Span-anchored validation failures and where they are delivered.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::DatabaseError;
use crate::extract::Span;
use crate::hash::FragmentId;
use crate::rewrite::CheckKind;

/// A validation failure anchored at a fragment's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    /// `<identity>: <database message>` with the hint on a second line when present.
    pub fn from_error(span: Span, id: FragmentId, error: &DatabaseError) -> Self {
        let mut message = format!("{id}: {}", error.message);
        if let Some(hint) = error.hint.as_deref().filter(|h| !h.is_empty()) {
            message.push_str("\nHint: ");
            message.push_str(hint);
        }
        Self { span, message }
    }
}

/// Result of checking one fragment.
#[derive(Debug, Clone)]
pub struct FragmentOutcome {
    pub id: FragmentId,
    pub span: Span,
    /// The check that failed and the server's error, if any.
    pub failure: Option<(CheckKind, DatabaseError)>,
}

impl FragmentOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    pub fn diagnostic(&self) -> Option<Diagnostic> {
        self.failure
            .as_ref()
            .map(|(_, error)| Diagnostic::from_error(self.span, self.id, error))
    }
}

/// Receives the complete diagnostic set for a document.
pub trait DiagnosticSink: Send + Sync {
    /// Replace every diagnostic previously published for `document`.
    fn replace(&self, document: &str, diagnostics: Vec<Diagnostic>);

    /// Forget `document` entirely.
    fn delete(&self, document: &str);
}

/// In-memory sink keyed by document identity.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<HashMap<String, Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics currently published for `document`; `None` if never published.
    pub fn get(&self, document: &str) -> Option<Vec<Diagnostic>> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(document).cloned()
    }

    /// Every published document and its diagnostics, sorted by identity.
    pub fn all(&self) -> Vec<(String, Vec<Diagnostic>)> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut out: Vec<_> = entries
            .iter()
            .map(|(doc, diags)| (doc.clone(), diags.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl DiagnosticSink for MemorySink {
    fn replace(&self, document: &str, diagnostics: Vec<Diagnostic>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(document.to_string(), diagnostics);
    }

    fn delete(&self, document: &str) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(document);
    }
}
