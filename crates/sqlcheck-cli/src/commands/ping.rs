//! `sqlcheck ping` command implementation.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use sqlcheck_adapter_pg::PostgresDatabase;

use super::load_config;

pub async fn run(config: Option<PathBuf>, database_url: Option<String>) -> Result<ExitCode> {
    let mut config = load_config(config.as_deref())?;
    if let Some(url) = database_url {
        config.database.url = Some(url);
        config.database.url_env = None;
    }

    match PostgresDatabase::connect(&config.database).await {
        Ok(database) => {
            println!("ok: {}", config.database.redacted());
            database.close().await;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!("{err:#}");
            println!("unreachable: {}", config.database.redacted());
            Ok(ExitCode::FAILURE)
        }
    }
}
