use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Full content of the store: cache identifier to cached value.
pub type StoreState = BTreeMap<String, Value>;

/// Mutations understood by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StoreAction {
    #[serde(rename = "store/save")]
    Save { id: String, data: Value },
    /// Shallow-merge into an existing object, otherwise replace.
    #[serde(rename = "store/update")]
    Update { id: String, data: Value },
    #[serde(rename = "store/clear")]
    Clear { id: String },
    #[serde(rename = "store/clearAll")]
    ClearAll,
    /// Applied in order; observers see a single commit.
    #[serde(rename = "store/batch")]
    Batch(Vec<StoreAction>),
}

impl StoreAction {
    pub fn save(id: impl Into<String>, data: Value) -> Self {
        StoreAction::Save {
            id: id.into(),
            data,
        }
    }

    pub fn update(id: impl Into<String>, data: Value) -> Self {
        StoreAction::Update {
            id: id.into(),
            data,
        }
    }

    pub fn clear(id: impl Into<String>) -> Self {
        StoreAction::Clear { id: id.into() }
    }

    pub fn kind(&self) -> StoreEventKind {
        match self {
            StoreAction::Save { .. } => StoreEventKind::Save,
            StoreAction::Update { .. } => StoreEventKind::Update,
            StoreAction::Clear { .. } => StoreEventKind::Clear,
            StoreAction::ClearAll => StoreEventKind::ClearAll,
            StoreAction::Batch(_) => StoreEventKind::Batch,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            StoreAction::Save { id, .. }
            | StoreAction::Update { id, .. }
            | StoreAction::Clear { id } => Some(id),
            StoreAction::ClearAll | StoreAction::Batch(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreEventKind {
    Save,
    Update,
    Clear,
    ClearAll,
    Batch,
    /// Synthetic event delivered at subscribe time.
    Change,
}

/// Immutable record of one committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub kind: StoreEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_data: Option<Value>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl StoreEvent {
    pub(crate) fn change(timestamp: u64) -> Self {
        Self {
            kind: StoreEventKind::Change,
            id: None,
            data: None,
            previous_data: None,
            timestamp,
        }
    }

    pub(crate) fn committed(
        action: &StoreAction,
        before: &StoreState,
        after: &StoreState,
        timestamp: u64,
    ) -> Self {
        let id = action.id().map(str::to_string);
        let (data, previous_data) = match &id {
            Some(id) => (after.get(id).cloned(), before.get(id).cloned()),
            None => (None, None),
        };
        Self {
            kind: action.kind(),
            id,
            data,
            previous_data,
            timestamp,
        }
    }
}

/// Terminal reducer of the store.
pub(crate) fn apply(state: &mut StoreState, action: &StoreAction) {
    match action {
        StoreAction::Save { id, data } => {
            state.insert(id.clone(), data.clone());
        }
        StoreAction::Update { id, data } => {
            let merged = match (state.get(id), data) {
                (Some(Value::Object(old)), Value::Object(new)) => {
                    let mut merged = old.clone();
                    merged.extend(new.clone());
                    Value::Object(merged)
                }
                _ => data.clone(),
            };
            state.insert(id.clone(), merged);
        }
        StoreAction::Clear { id } => {
            state.remove(id);
        }
        StoreAction::ClearAll => state.clear(),
        StoreAction::Batch(actions) => {
            for action in actions {
                apply(state, action);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_merges_objects_shallowly() {
        let mut state = StoreState::new();
        apply(
            &mut state,
            &StoreAction::save("u", json!({"name": "John", "age": 30, "tags": ["a"]})),
        );
        apply(&mut state, &StoreAction::update("u", json!({"age": 31, "tags": ["b"]})));
        assert_eq!(state["u"], json!({"name": "John", "age": 31, "tags": ["b"]}));
    }

    #[test]
    fn test_update_replaces_non_objects() {
        let mut state = StoreState::new();
        apply(&mut state, &StoreAction::save("n", json!([1, 2])));
        apply(&mut state, &StoreAction::update("n", json!({"a": 1})));
        assert_eq!(state["n"], json!({"a": 1}));

        apply(&mut state, &StoreAction::update("absent", json!("x")));
        assert_eq!(state["absent"], json!("x"));
    }

    #[test]
    fn test_clear_twice_is_idempotent() {
        let mut state = StoreState::new();
        apply(&mut state, &StoreAction::save("a", json!(1)));
        apply(&mut state, &StoreAction::clear("a"));
        let once = state.clone();
        apply(&mut state, &StoreAction::clear("a"));
        assert_eq!(state, once);
    }

    #[test]
    fn test_batch_applies_in_order() {
        let mut state = StoreState::new();
        apply(
            &mut state,
            &StoreAction::Batch(vec![
                StoreAction::save("id1", json!("data1")),
                StoreAction::save("id2", json!("data2")),
                StoreAction::update("id1", json!({"updated": true})),
            ]),
        );
        assert_eq!(state["id1"], json!({"updated": true}));
        assert_eq!(state["id2"], json!("data2"));
    }

    #[test]
    fn test_wire_format() {
        let action: StoreAction = serde_json::from_value(
            json!({"type": "store/save", "payload": {"id": "a", "data": 1}}),
        )
        .unwrap();
        assert_eq!(action, StoreAction::save("a", json!(1)));
        assert_eq!(
            serde_json::to_value(StoreAction::ClearAll).unwrap(),
            json!({"type": "store/clearAll"})
        );
    }
}
