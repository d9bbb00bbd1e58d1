//! `sqlcheck fragments` command implementation.
//!
//! Lists each fragment with its location, identity and parameter count, which is
//! what an override entry needs. No database connection is made.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use sqlcheck_core::extract::{Delimiters, extract, slice};
use sqlcheck_core::rewrite::positional_params;
use sqlcheck_core::FragmentId;

use super::{document_identity, load_config, workspace_or_cwd};

pub fn run(
    config: Option<PathBuf>,
    workspace: Option<PathBuf>,
    show_text: bool,
    files: Vec<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config.as_deref())?;
    let workspace = workspace_or_cwd(workspace)?;
    let mut clean = true;

    for file in &files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let identity = document_identity(&workspace, file);
        let (lines, well_formed) = describe(&identity, &text, &config.delimiters, show_text);
        for line in lines {
            println!("{line}");
        }
        if !well_formed {
            tracing::warn!(document = %identity, "unterminated fragment");
            clean = false;
        }
    }

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn describe(
    identity: &str,
    text: &str,
    delimiters: &Delimiters,
    show_text: bool,
) -> (Vec<String>, bool) {
    let lines: Vec<&str> = text.lines().collect();
    let extraction = extract(&lines, delimiters);

    let mut out = Vec::new();
    for span in &extraction.spans {
        let fragment = slice(&lines, span);
        let id = FragmentId::of(&fragment);
        out.push(format!(
            "{}:{}:{}\t{}\tparams={}",
            identity,
            span.start.line + 1,
            span.start.column + 1,
            id,
            positional_params(&fragment).len()
        ));
        if show_text {
            for line in fragment.trim().lines() {
                out.push(format!("    {line}"));
            }
        }
    }
    (out, extraction.well_formed)
}
