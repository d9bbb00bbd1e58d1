//! `sqlcheck check` command implementation.
//!
//! Treats each file as a saved document: fragments are extracted, checked
//! against the configured database and any failures printed as
//! `path:line:column: message`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use sqlcheck_adapter_pg::PostgresDatabase;
use sqlcheck_core::document::language_for_path;
use sqlcheck_core::{
    ConnectionHandle, Diagnostic, MemorySink, OverrideStore, PassReport, PassStatus, Session,
    TextDocument, Validator,
};

use super::{document_identity, load_config, workspace_or_cwd};

pub async fn run(
    config: Option<PathBuf>,
    workspace: Option<PathBuf>,
    json: bool,
    files: Vec<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config.as_deref())?;
    let workspace = workspace_or_cwd(workspace)?;
    let overrides = config.load_overrides()?;

    let database = match PostgresDatabase::connect(&config.database).await {
        Ok(database) => Arc::new(database),
        Err(err) => {
            tracing::error!("{err:#}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let sink = Arc::new(MemorySink::new());
    let validator = Validator::new(
        Arc::new(ConnectionHandle::new(database.clone())),
        Arc::new(OverrideStore::new(overrides)),
        sink.clone(),
    )
    .with_delimiters(config.delimiters.clone());
    let session = Session::new(Arc::new(validator), config.languages.clone());

    let mut summary = Summary::default();
    for file in &files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let identity = document_identity(&workspace, file);
        let document = Arc::new(TextDocument::new(
            identity,
            language_for_path(file),
            text,
        ));

        let report = session.save(document).await;
        for diagnostic in report.diagnostics() {
            if json {
                println!("{}", json_line(&report.document, &diagnostic));
            } else {
                println!("{}", render(&report.document, &diagnostic));
            }
        }
        summary.add(&report);
    }

    database.close().await;

    tracing::info!(
        files = files.len(),
        passed = summary.passed,
        total = summary.total,
        aborted = summary.aborted,
        "{}/{} fragments passed",
        summary.passed,
        summary.total
    );

    if summary.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[derive(Debug, Default)]
struct Summary {
    passed: usize,
    total: usize,
    aborted: usize,
}

impl Summary {
    fn add(&mut self, report: &PassReport) {
        self.passed += report.passed();
        self.total += report.total();
        if report.status != PassStatus::Completed {
            self.aborted += 1;
        }
    }

    fn is_clean(&self) -> bool {
        self.aborted == 0 && self.passed == self.total
    }
}

/// `path:line:column: message`, 1-based, with continuation lines indented.
fn render(document: &str, diagnostic: &Diagnostic) -> String {
    let start = diagnostic.span.start;
    let message = diagnostic.message.replace('\n', "\n    ");
    format!(
        "{}:{}:{}: {}",
        document,
        start.line + 1,
        start.column + 1,
        message
    )
}

fn json_line(document: &str, diagnostic: &Diagnostic) -> serde_json::Value {
    json!({
        "document": document,
        "span": diagnostic.span,
        "message": diagnostic.message,
    })
}
