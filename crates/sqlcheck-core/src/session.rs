//! Editor-style event handling around a [`Validator`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use futures::future::join_all;

use crate::database::Database;
use crate::document::Document;
use crate::overrides::OverrideSnapshot;
use crate::validator::{PassReport, Validator};

/// Tracks open documents and decides when they are validated.
pub struct Session {
    validator: Arc<Validator>,
    languages: BTreeSet<String>,
    open: Mutex<BTreeMap<String, Arc<dyn Document>>>,
}

impl Session {
    pub fn new(validator: Arc<Validator>, languages: impl IntoIterator<Item = String>) -> Self {
        Self {
            validator,
            languages: languages.into_iter().collect(),
            open: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    pub fn handles_language(&self, language: &str) -> bool {
        self.languages.contains(language)
    }

    /// Track `document`; validate it when its language is configured.
    pub async fn open(&self, document: Arc<dyn Document>) -> Option<PassReport> {
        self.track(Arc::clone(&document));
        if !self.handles_language(document.language()) {
            tracing::debug!(
                document = document.identity(),
                language = document.language(),
                "not validating on open"
            );
            return None;
        }
        Some(self.validator.validate(document.as_ref()).await)
    }

    /// Track the saved contents and validate them.
    pub async fn save(&self, document: Arc<dyn Document>) -> PassReport {
        self.track(Arc::clone(&document));
        self.validator.validate(document.as_ref()).await
    }

    /// Stop tracking `identity` and drop its diagnostics.
    pub fn close(&self, identity: &str) {
        self.lock_open().remove(identity);
        self.validator.forget(identity);
        self.validator.sink().delete(identity);
    }

    /// Install new overrides and revalidate every open document.
    pub async fn overrides_changed(&self, snapshot: OverrideSnapshot) -> Vec<PassReport> {
        self.validator.overrides().replace(snapshot);
        self.revalidate_all().await
    }

    /// Swap in a new database, release the old one, and revalidate.
    pub async fn reconnect(&self, database: Arc<dyn Database>) -> Vec<PassReport> {
        drop(self.validator.connection().swap(database));
        self.revalidate_all().await
    }

    /// Validate every open document whose language is configured.
    pub async fn revalidate_all(&self) -> Vec<PassReport> {
        let documents: Vec<Arc<dyn Document>> = self
            .lock_open()
            .values()
            .filter(|doc| self.handles_language(doc.language()))
            .cloned()
            .collect();
        join_all(
            documents
                .iter()
                .map(|doc| self.validator.validate(doc.as_ref())),
        )
        .await
    }

    pub fn open_documents(&self) -> Vec<String> {
        self.lock_open().keys().cloned().collect()
    }

    fn track(&self, document: Arc<dyn Document>) {
        self.lock_open()
            .insert(document.identity().to_string(), document);
    }

    fn lock_open(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<dyn Document>>> {
        match self.open.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
