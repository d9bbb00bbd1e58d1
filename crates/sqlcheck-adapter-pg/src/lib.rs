//! Postgres implementation of the sqlcheck [`Database`] collaborator.
//!
//! Every check statement runs through the extended query protocol inside a
//! transaction that is always rolled back. The extended protocol refuses
//! multi-statement strings, so a fragment like `select 1; delete from t` is
//! rejected rather than partially run.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlcheck_core::config::{DatabaseConfig, SslMode};
use sqlcheck_core::{Database, DatabaseError, Param};
use sqlx::postgres::{
    PgArguments, PgConnectOptions, PgDatabaseError, PgErrorPosition, PgPoolOptions, PgSslMode,
};
use sqlx::Arguments;

mod untyped;

use untyped::Untyped;

fn args_add<T>(args: &mut PgArguments, v: T) -> Result<(), DatabaseError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v)
        .map_err(|e| DatabaseError::statement(format!("failed to bind parameter: {e}")))
}

/// Bind one positional NULL. A referenced parameter is left untyped so the
/// server infers its type from context; an unreferenced one is declared `text`,
/// since the server has nothing to infer from.
fn add_param(args: &mut PgArguments, param: Param) -> Result<(), DatabaseError> {
    match param {
        Param::Untyped => args_add(args, Untyped),
        Param::Unreferenced => args_add(args, None::<String>),
    }
}

/// Driver options for `config`. A URL is parsed; individual fields go through
/// the option setters so credentials are never spliced into a URL.
fn connect_options(config: &DatabaseConfig) -> anyhow::Result<PgConnectOptions> {
    let options = match config.url() {
        Some(url) => {
            PgConnectOptions::from_str(&url).context("invalid database connection URL")?
        }
        None => {
            let options = PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .database(&config.database)
                .username(&config.username);
            match config.password() {
                Some(password) => options.password(&password),
                None => options,
            }
        }
    };
    Ok(options.ssl_mode(pg_ssl_mode(config.ssl_mode)))
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Translate a driver error. Anything that says the pool or socket is unusable
/// is a connection failure; everything else is pinned on the statement.
fn map_error(err: sqlx::Error) -> DatabaseError {
    match err {
        sqlx::Error::Database(db) => {
            let mut out = DatabaseError::statement(db.message());
            if let Some(code) = db.code() {
                out = out.with_code(code);
            }
            if let Some(pg) = db.try_downcast_ref::<PgDatabaseError>() {
                if let Some(hint) = pg.hint() {
                    out = out.with_hint(hint);
                }
                if let Some(PgErrorPosition::Original(position)) = pg.position() {
                    out.position = Some(position);
                }
            }
            out
        }
        err @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed) => DatabaseError::connection(err.to_string()),
        other => DatabaseError::statement(other.to_string()),
    }
}

/// A pooled Postgres connection used to run check statements.
pub struct PostgresDatabase {
    pool: sqlx::PgPool,
}

impl PostgresDatabase {
    /// Connect and health-check. No retry: a failure here is reported to the caller.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let options = connect_options(config)?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(u64::from(
                config.pool.acquire_timeout_seconds,
            )))
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to {}", config.redacted()))?;

        let database = Self { pool };
        database.health_check().await?;
        tracing::info!(database = %config.redacted(), "connected");
        Ok(database)
    }

    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        let (one,): (i32,) = sqlx::query_as("select 1")
            .fetch_one(&self.pool)
            .await
            .context("database health check failed")?;
        anyhow::ensure!(one == 1, "database health check returned {one}");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<(), DatabaseError> {
        let mut args = PgArguments::default();
        for param in params {
            add_param(&mut args, *param)?;
        }

        let mut tx = self.pool.begin().await.map_err(map_error)?;
        let result = sqlx::query_with(sql, args)
            .persistent(false)
            .execute(&mut *tx)
            .await;
        if let Err(e) = tx.rollback().await {
            tracing::debug!("rollback after check failed: {e}");
        }

        result.map(|_| ()).map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_one_argument_per_param() {
        let mut args = PgArguments::default();
        for param in [Param::Untyped, Param::Unreferenced, Param::Untyped] {
            add_param(&mut args, param).unwrap();
        }
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn fields_are_not_spliced_into_a_url() {
        let config = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            database: "app/main".to_string(),
            username: "dev@corp".to_string(),
            password: Some("p@ss/w:rd#1".to_string()),
            ..Default::default()
        };
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("app/main"));
        assert_eq!(options.get_username(), "dev@corp");
    }

    #[test]
    fn url_wins_over_fields() {
        let config = DatabaseConfig {
            url: Some("postgres://u:p@db:7000/x".to_string()),
            host: "ignored".to_string(),
            ..Default::default()
        };
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 7000);
        assert_eq!(options.get_database(), Some("x"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let config = DatabaseConfig {
            url: Some("postgres://u:p@db:notaport/x".to_string()),
            ..Default::default()
        };
        assert!(connect_options(&config).is_err());
    }

    #[test]
    fn pool_failures_are_connection_errors() {
        assert!(map_error(sqlx::Error::PoolTimedOut).is_connection());
        assert!(map_error(sqlx::Error::PoolClosed).is_connection());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(map_error(sqlx::Error::Io(io)).is_connection());
    }

    #[test]
    fn other_failures_are_statement_errors() {
        let err = map_error(sqlx::Error::RowNotFound);
        assert!(!err.is_connection());
        assert!(err.hint.is_none());
    }

    #[test]
    fn ssl_modes_map_one_to_one() {
        assert!(matches!(pg_ssl_mode(SslMode::Disable), PgSslMode::Disable));
        assert!(matches!(pg_ssl_mode(SslMode::VerifyFull), PgSslMode::VerifyFull));
        assert!(matches!(pg_ssl_mode(SslMode::default()), PgSslMode::Prefer));
    }
}
