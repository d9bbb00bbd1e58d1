//! The database collaborator and the swappable handle the validator borrows it from.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::rewrite::Param;

/// Executes check statements. Implementations must never commit side effects of
/// a statement they are asked to check.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run `sql` with one NULL bound per entry of `params`.
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<(), DatabaseError>;
}

/// Owned slot holding the current database. Reconfiguration installs a new
/// database and hands the old one back to the caller to release.
#[derive(Default)]
pub struct ConnectionHandle {
    slot: RwLock<Option<Arc<dyn Database>>>,
}

impl ConnectionHandle {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self {
            slot: RwLock::new(Some(database)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The database in use right now. Callers keep the `Arc` for the duration of
    /// a pass, so a concurrent swap never pulls it out from under them.
    pub fn current(&self) -> Option<Arc<dyn Database>> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Install `next`, returning the previous database.
    pub fn swap(&self, next: Arc<dyn Database>) -> Option<Arc<dyn Database>> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tracing::info!("database connection swapped");
        guard.replace(next)
    }

    /// Remove the current database.
    pub fn take(&self) -> Option<Arc<dyn Database>> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("connected", &self.is_connected())
            .finish()
    }
}
