//! Validation passes over a document.
//!
//! A pass extracts fragments, derives their identities, resolves overrides, runs
//! each fragment's check statements concurrently against the shared database and
//! replaces the document's diagnostic set with whatever failed.
//!
//! A pass is abandoned, leaving earlier diagnostics in place, when:
//! - the document has an unterminated fragment
//! - no database is installed, or the connection fails mid-pass
//! - a newer pass for the same document started checking in the meantime

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;

use crate::database::{ConnectionHandle, Database};
use crate::diagnostic::{Diagnostic, DiagnosticSink, FragmentOutcome};
use crate::document::Document;
use crate::error::ValidationError;
use crate::extract::{Delimiters, Span, extract};
use crate::hash::FragmentId;
use crate::overrides::{OverrideStore, ParamOverrides};
use crate::rewrite::{CheckStrategy, SyntaxThenExplain};

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    /// Diagnostics were replaced with this pass's results.
    Completed,
    NotWellFormed,
    NoConnection,
    ConnectionFailed(String),
    Superseded,
}

/// Summary of one pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub document: String,
    pub status: PassStatus,
    /// Per-fragment results in document order. Empty unless every check ran.
    pub outcomes: Vec<FragmentOutcome>,
}

impl PassReport {
    fn aborted(document: &str, status: PassStatus) -> Self {
        Self {
            document: document.to_string(),
            status,
            outcomes: Vec::new(),
        }
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.outcomes
            .iter()
            .filter_map(FragmentOutcome::diagnostic)
            .collect()
    }

    pub fn is_completed(&self) -> bool {
        self.status == PassStatus::Completed
    }
}

/// Runs validation passes and publishes their diagnostics.
pub struct Validator {
    connection: Arc<ConnectionHandle>,
    overrides: Arc<OverrideStore>,
    sink: Arc<dyn DiagnosticSink>,
    strategy: Arc<dyn CheckStrategy>,
    delimiters: Delimiters,
    next_ticket: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl Validator {
    pub fn new(
        connection: Arc<ConnectionHandle>,
        overrides: Arc<OverrideStore>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            connection,
            overrides,
            sink,
            strategy: Arc::new(SyntaxThenExplain),
            delimiters: Delimiters::default(),
            next_ticket: AtomicU64::new(0),
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn CheckStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn connection(&self) -> &Arc<ConnectionHandle> {
        &self.connection
    }

    pub fn overrides(&self) -> &Arc<OverrideStore> {
        &self.overrides
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Validate `document`. Never fails: aborted passes are logged and reported.
    pub async fn validate(&self, document: &dyn Document) -> PassReport {
        let identity = document.identity();
        match self.run_pass(document).await {
            Ok(report) => report,
            Err(err) => {
                let status = match &err {
                    ValidationError::NotWellFormed { .. } => {
                        tracing::warn!(document = identity, "skipping validation: {err}");
                        PassStatus::NotWellFormed
                    }
                    ValidationError::NoConnection => {
                        tracing::error!(document = identity, "skipping validation: {err}");
                        PassStatus::NoConnection
                    }
                    ValidationError::Connection(db) => {
                        tracing::error!(document = identity, "validation aborted: {err}");
                        PassStatus::ConnectionFailed(db.message.clone())
                    }
                    ValidationError::Superseded { .. } => {
                        tracing::debug!(document = identity, "discarding results: {err}");
                        PassStatus::Superseded
                    }
                };
                PassReport::aborted(identity, status)
            }
        }
    }

    /// Stop tracking passes for a closed document.
    pub fn forget(&self, document: &str) {
        self.lock_latest().remove(document);
    }

    async fn run_pass(&self, document: &dyn Document) -> Result<PassReport, ValidationError> {
        let identity = document.identity();

        let lines = document.lines();
        let extraction = extract(&lines, &self.delimiters);
        if !extraction.well_formed {
            return Err(ValidationError::NotWellFormed {
                document: identity.to_string(),
            });
        }

        let database = self
            .connection
            .current()
            .ok_or(ValidationError::NoConnection)?;
        // Aborted passes never take a ticket, so they cannot supersede one in flight.
        let ticket = self.begin(identity);
        let snapshot = self.overrides.snapshot();

        tracing::debug!(
            document = identity,
            fragments = extraction.spans.len(),
            ticket,
            "validating"
        );

        let checks = extraction.spans.iter().map(|span| {
            let text = document.text_in(span);
            let id = FragmentId::of(&text);
            let overrides = snapshot.for_fragment(identity, id);
            self.check_fragment(database.as_ref(), *span, id, text, overrides)
        });
        let outcomes = join_all(checks).await;

        if let Some((_, err)) = outcomes
            .iter()
            .filter_map(|o| o.failure.as_ref())
            .find(|(_, err)| err.is_connection())
        {
            return Err(ValidationError::Connection(err.clone()));
        }

        let diagnostics: Vec<Diagnostic> = outcomes
            .iter()
            .filter_map(FragmentOutcome::diagnostic)
            .collect();
        self.publish(identity, ticket, diagnostics)?;

        let report = PassReport {
            document: identity.to_string(),
            status: PassStatus::Completed,
            outcomes,
        };
        tracing::info!(
            document = identity,
            passed = report.passed(),
            total = report.total(),
            "{}/{} fragments passed",
            report.passed(),
            report.total()
        );
        Ok(report)
    }

    async fn check_fragment(
        &self,
        database: &dyn Database,
        span: Span,
        id: FragmentId,
        text: String,
        overrides: ParamOverrides,
    ) -> FragmentOutcome {
        for statement in self.strategy.plan(&text, &overrides) {
            if let Err(error) = database.execute(&statement.sql, &statement.params).await {
                tracing::debug!(
                    fragment = %id,
                    check = %statement.kind,
                    "check failed: {}",
                    error.message
                );
                return FragmentOutcome {
                    id,
                    span,
                    failure: Some((statement.kind, error)),
                };
            }
        }
        FragmentOutcome {
            id,
            span,
            failure: None,
        }
    }

    fn begin(&self, document: &str) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock_latest().insert(document.to_string(), ticket);
        ticket
    }

    /// Replace diagnostics only if `ticket` is still the newest pass.
    fn publish(
        &self,
        document: &str,
        ticket: u64,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<(), ValidationError> {
        let latest = self.lock_latest();
        if latest.get(document) != Some(&ticket) {
            return Err(ValidationError::Superseded {
                document: document.to_string(),
                ticket,
            });
        }
        self.sink.replace(document, diagnostics);
        Ok(())
    }

    fn lock_latest(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("strategy", &self.strategy.name())
            .field("delimiters", &self.delimiters)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
