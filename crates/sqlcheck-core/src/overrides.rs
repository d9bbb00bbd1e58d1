//! User-declared parameter overrides.
//!
//! Tables are nested objects keyed by workspace-relative file path, then fragment
//! identity (decimal string), then 1-based parameter index:
//!
//! ```json
//! { "src/db.ts": { "1147568695465191": { "2": "boolean" } } }
//! ```
//!
//! Lookups are permissive: anything that does not fit that shape is skipped.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::FragmentId;

/// Look up the overrides for one fragment. Returns an owned copy; empty when the
/// file or identity is absent or the table is malformed.
pub fn resolve(table: &Value, file: &str, id: FragmentId) -> BTreeMap<u32, Value> {
    let Some(params) = table
        .get(file)
        .and_then(|by_id| by_id.get(id.to_string()))
        .and_then(Value::as_object)
    else {
        return BTreeMap::new();
    };

    params
        .iter()
        .filter_map(|(index, value)| {
            let index = index.trim().parse::<u32>().ok().filter(|i| *i > 0)?;
            Some((index, value.clone()))
        })
        .collect()
}

/// Both override tables at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSnapshot {
    /// Parameter type casts (leaf values are type names).
    #[serde(default)]
    pub types: Value,
    /// Parameter default values (leaf values are arbitrary scalars).
    #[serde(default)]
    pub defaults: Value,
    /// Bumped by [`OverrideStore::replace`].
    #[serde(skip)]
    pub version: u64,
}

impl OverrideSnapshot {
    pub fn new(types: Value, defaults: Value) -> Self {
        Self {
            types,
            defaults,
            version: 0,
        }
    }

    /// Resolve both tables for a fragment.
    pub fn for_fragment(&self, file: &str, id: FragmentId) -> ParamOverrides {
        let types = resolve(&self.types, file, id)
            .into_iter()
            .filter_map(|(index, value)| match value {
                Value::String(ty) if !ty.trim().is_empty() => Some((index, ty.trim().to_string())),
                _ => None,
            })
            .collect();
        let defaults = resolve(&self.defaults, file, id);
        ParamOverrides { types, defaults }
    }

    /// Overlay `other` onto `self`; entries in `other` win.
    pub fn merged_with(mut self, other: &OverrideSnapshot) -> Self {
        merge_value(&mut self.types, &other.types);
        merge_value(&mut self.defaults, &other.defaults);
        self
    }
}

fn merge_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_value(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Overrides that apply to a single fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamOverrides {
    pub types: BTreeMap<u32, String>,
    pub defaults: BTreeMap<u32, Value>,
}

type Subscriber = Box<dyn Fn(&Arc<OverrideSnapshot>) + Send + Sync>;

/// Holder of the current override snapshot with change notification.
#[derive(Default)]
pub struct OverrideStore {
    current: RwLock<Arc<OverrideSnapshot>>,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl OverrideStore {
    pub fn new(initial: OverrideSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<OverrideSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Install a new snapshot, bumping its version past the current one, and
    /// notify subscribers.
    pub fn replace(&self, mut next: OverrideSnapshot) -> Arc<OverrideSnapshot> {
        let installed = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            next.version = guard.version + 1;
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };

        tracing::debug!(version = installed.version, "override table replaced");

        let subscribers = match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for subscriber in subscribers.iter() {
            subscriber(&installed);
        }
        installed
    }

    pub fn subscribe(&self, f: impl Fn(&Arc<OverrideSnapshot>) + Send + Sync + 'static) {
        match self.subscribers.write() {
            Ok(mut guard) => guard.push(Box::new(f)),
            Err(poisoned) => poisoned.into_inner().push(Box::new(f)),
        }
    }
}

impl std::fmt::Debug for OverrideStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideStore")
            .field("version", &self.snapshot().version)
            .finish_non_exhaustive()
    }
}
