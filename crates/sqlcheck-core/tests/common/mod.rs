use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{Map, Value};

use sqlcheck_core::{
    ConnectionHandle, Database, DatabaseError, FragmentId, MemorySink, OverrideSnapshot,
    OverrideStore, Param, Validator,
};

/// Records every statement and fails those containing a configured needle.
#[derive(Default)]
pub struct FakeDatabase {
    executed: Mutex<Vec<(String, Vec<Param>)>>,
    failures: Vec<(String, DatabaseError)>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, needle: &str, error: DatabaseError) -> Self {
        self.failures.push((needle.to_string(), error));
        self
    }

    /// Statements containing `slow` wait until the returned sender fires.
    pub fn gated(self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn executed(&self) -> Vec<(String, Vec<Param>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|(sql, _)| sql).collect()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<(), DatabaseError> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if sql.contains("slow") {
            let gate = self.gate.lock().unwrap().take();
            if let Some(rx) = gate {
                let _ = rx.await;
            }
        }

        for (needle, error) in &self.failures {
            if sql.contains(needle.as_str()) {
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

pub struct Harness {
    pub db: Arc<FakeDatabase>,
    pub sink: Arc<MemorySink>,
    pub validator: Arc<Validator>,
}

pub fn harness(db: FakeDatabase, overrides: OverrideSnapshot) -> Harness {
    let db = Arc::new(db);
    let sink = Arc::new(MemorySink::new());
    let validator = Validator::new(
        Arc::new(ConnectionHandle::new(db.clone())),
        Arc::new(OverrideStore::new(overrides)),
        sink.clone(),
    );
    Harness {
        db,
        sink,
        validator: Arc::new(validator),
    }
}

/// `{ file: { id: { index: value, .. } } }`
pub fn override_table(file: &str, id: FragmentId, entries: &[(&str, Value)]) -> Value {
    let params: Map<String, Value> = entries
        .iter()
        .map(|(index, value)| (index.to_string(), value.clone()))
        .collect();
    let mut by_id = Map::new();
    by_id.insert(id.to_string(), Value::Object(params));
    let mut root = Map::new();
    root.insert(file.to_string(), Value::Object(by_id));
    Value::Object(root)
}
