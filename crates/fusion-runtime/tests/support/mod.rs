//! Shared test fixtures: a minimal "selection" composite exercising the
//! [`fusion_runtime::CompositeContract`] boundary, grounded in spec.md §8
//! scenario S3's dict/key/value example. Concrete composites are an
//! external collaborator out of the core's scope (spec.md §1); this is a
//! test-only stand-in, not library code.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use fusion_core::{CellId, CompositeBinding, CompositeId, DynValue, Identifier};
use fusion_runtime::{CompositeContract, Coordinator, Hook, UpdateView};

/// `{dict, key, value}` primaries with the completion rule from spec.md §8
/// S3: submitting `key` derives `value` from `dict[key]`; submitting
/// `value` derives a `dict` with `key`'s entry replaced.
pub struct Selection {
    id: CompositeId,
    dict: Hook<BTreeMap<String, i64>>,
    key: Hook<String>,
    value: Hook<i64>,
}

impl Selection {
    pub fn new(
        coordinator: &Arc<Coordinator>,
        dict: BTreeMap<String, i64>,
        key: impl Into<String>,
    ) -> Arc<Self> {
        let id = CompositeId::next();
        let key = key.into();
        let initial_value = *dict.get(&key).expect("initial key present in dict");
        let dict_hook = Hook::new_owned(
            coordinator,
            dict,
            CompositeBinding {
                composite: id,
                identifier: Identifier::name("dict"),
                writable: true,
            },
            None,
        );
        let key_hook = Hook::new_owned(
            coordinator,
            key,
            CompositeBinding {
                composite: id,
                identifier: Identifier::name("key"),
                writable: true,
            },
            None,
        );
        let value_hook = Hook::new_owned(
            coordinator,
            initial_value,
            CompositeBinding {
                composite: id,
                identifier: Identifier::name("value"),
                writable: true,
            },
            None,
        );
        let selection = Arc::new(Self {
            id,
            dict: dict_hook,
            key: key_hook,
            value: value_hook,
        });
        coordinator.register_composite(selection.clone());
        selection
    }

    pub fn dict_hook(&self) -> &Hook<BTreeMap<String, i64>> {
        &self.dict
    }

    pub fn key_hook(&self) -> &Hook<String> {
        &self.key
    }

    pub fn value_hook(&self) -> &Hook<i64> {
        &self.value
    }

    pub fn dict(&self) -> BTreeMap<String, i64> {
        self.dict.value()
    }

    pub fn key(&self) -> String {
        self.key.value()
    }

    pub fn value(&self) -> i64 {
        self.value.value()
    }
}

fn ident(name: &str) -> Identifier {
    Identifier::name(name.to_string())
}

impl CompositeContract for Selection {
    fn id(&self) -> CompositeId {
        self.id
    }

    fn primary_identifiers(&self) -> Vec<Identifier> {
        vec![ident("dict"), ident("key"), ident("value")]
    }

    fn primary_cell(&self, identifier: &Identifier) -> Option<CellId> {
        match identifier {
            Identifier::Name(n) if n.as_ref() == "dict" => Some(self.dict.cell_id()),
            Identifier::Name(n) if n.as_ref() == "key" => Some(self.key.cell_id()),
            Identifier::Name(n) if n.as_ref() == "value" => Some(self.value.cell_id()),
            _ => None,
        }
    }

    fn complete(&self, view: &UpdateView) -> HashMap<Identifier, DynValue> {
        let mut out = HashMap::new();
        if view.is_submitted(&ident("key")) {
            let dict = view
                .get(&ident("dict"))
                .and_then(DynValue::downcast_ref::<BTreeMap<String, i64>>)
                .cloned()
                .unwrap_or_default();
            let key = view
                .get(&ident("key"))
                .and_then(DynValue::downcast_ref::<String>)
                .cloned()
                .unwrap_or_default();
            if let Some(value) = dict.get(&key) {
                out.insert(ident("value"), DynValue::new(*value));
            }
        } else if view.is_submitted(&ident("value")) {
            let mut dict = view
                .get(&ident("dict"))
                .and_then(DynValue::downcast_ref::<BTreeMap<String, i64>>)
                .cloned()
                .unwrap_or_default();
            let key = view
                .get(&ident("key"))
                .and_then(DynValue::downcast_ref::<String>)
                .cloned()
                .unwrap_or_default();
            let value = view
                .get(&ident("value"))
                .and_then(DynValue::downcast_ref::<i64>)
                .copied()
                .unwrap_or_default();
            dict.insert(key, value);
            out.insert(ident("dict"), DynValue::new(dict));
        }
        out
    }

    fn validate_primary(&self, primaries: &HashMap<Identifier, DynValue>) -> Result<(), String> {
        let dict = primaries
            .get(&ident("dict"))
            .and_then(DynValue::downcast_ref::<BTreeMap<String, i64>>)
            .ok_or_else(|| "missing dict".to_string())?;
        let key = primaries
            .get(&ident("key"))
            .and_then(DynValue::downcast_ref::<String>)
            .ok_or_else(|| "missing key".to_string())?;
        if !dict.contains_key(key) {
            return Err(format!("key {key:?} not present in dict"));
        }
        Ok(())
    }
}

/// Records every listener firing, in order, for assertions about fire
/// counts and observed values (spec.md §8 scenarios S1, S2, S6).
#[derive(Clone, Default)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, value: T) {
        self.seen.lock().expect("recorder lock").push(value);
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.lock().expect("recorder lock").clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().expect("recorder lock").len()
    }
}
