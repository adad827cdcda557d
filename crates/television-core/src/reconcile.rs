// ── Mutation reconciliation ──
//
// Pure read-modify-commit step for one server-pushed mutation:
//
//   {"model": "widget", "action": "create"|"update"|"delete",
//    "<key>": <key value>, "data": {...}}
//
// Collections are newest-first: creates are prepended.

use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::CoreError;

/// Default unique key field of bound entities.
pub const DEFAULT_KEY_FIELD: &str = "pk";

/// A mutation action understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    /// Read the `action` field of a mutation payload.
    pub fn from_payload(payload: &Value, channel: &str) -> Result<Self, CoreError> {
        let raw = payload.get("action");
        let action = match raw.and_then(Value::as_str) {
            Some("create") => return Ok(Self::Create),
            Some("update") => return Ok(Self::Update),
            Some("delete") => return Ok(Self::Delete),
            Some(other) => other.to_owned(),
            None => raw.map_or_else(|| "<missing>".to_owned(), Value::to_string),
        };
        Err(CoreError::UnhandledAction {
            channel: channel.to_owned(),
            action,
        })
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// What applying a mutation did to the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated { index: usize },
    Deleted { index: usize },
    /// The mutation referenced a key that is not in the collection.
    UnknownKey,
}

impl Outcome {
    /// Whether the collection changed and should be committed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::UnknownKey)
    }
}

/// Apply one mutation payload to `items` in place.
///
/// An update or delete for an absent key logs a warning and leaves
/// `items` untouched. An unknown action is an error and also leaves
/// `items` untouched.
pub fn apply_mutation(
    items: &mut Vec<Value>,
    payload: &Value,
    key_field: &str,
    channel: &str,
) -> Result<Outcome, CoreError> {
    let action = MutationAction::from_payload(payload, channel)?;
    let data = payload.get("data");

    if action == MutationAction::Create {
        items.insert(0, data.cloned().unwrap_or(Value::Null));
        return Ok(Outcome::Created);
    }

    let key = payload.get(key_field);
    let Some(index) = key.and_then(|key| position(items, key_field, key)) else {
        let key = key.cloned().unwrap_or_default();
        warn!(
            channel,
            %action,
            %key,
            "invalid {key_field} on channel; ignoring mutation"
        );
        return Ok(Outcome::UnknownKey);
    };

    if action == MutationAction::Update {
        items[index] = shallow_merge(&items[index], data);
        Ok(Outcome::Updated { index })
    } else {
        items.remove(index);
        Ok(Outcome::Deleted { index })
    }
}

fn position(items: &[Value], key_field: &str, key: &Value) -> Option<usize> {
    items.iter().position(|item| item.get(key_field) == Some(key))
}

/// Fields of `patch` win; fields it does not mention are kept.
fn shallow_merge(existing: &Value, patch: Option<&Value>) -> Value {
    let mut merged: Map<String, Value> = existing.as_object().cloned().unwrap_or_default();
    if let Some(Value::Object(fields)) = patch {
        for (field, value) in fields {
            merged.insert(field.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn apply(items: &mut Vec<Value>, payload: Value) -> Result<Outcome, CoreError> {
        apply_mutation(items, &payload, DEFAULT_KEY_FIELD, "widget")
    }

    #[test]
    fn create_prepends() {
        let mut items = vec![json!({ "pk": 1, "name": "a" })];

        let outcome = apply(
            &mut items,
            json!({ "model": "widget", "action": "create", "pk": 2, "data": { "pk": 2, "name": "b" } }),
        )
        .unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert_eq!(items, vec![json!({ "pk": 2, "name": "b" }), json!({ "pk": 1, "name": "a" })]);
    }

    #[test]
    fn update_merges_shallowly() {
        let mut items = vec![json!({ "pk": 2, "name": "b" }), json!({ "pk": 1, "name": "a" })];

        let outcome = apply(
            &mut items,
            json!({ "action": "update", "pk": 1, "data": { "name": "A" } }),
        )
        .unwrap();

        assert_eq!(outcome, Outcome::Updated { index: 1 });
        assert_eq!(items, vec![json!({ "pk": 2, "name": "b" }), json!({ "pk": 1, "name": "A" })]);
    }

    #[test]
    fn update_preserves_unmentioned_fields_and_replaces_nested_values() {
        let mut items = vec![json!({ "pk": 1, "name": "a", "meta": { "x": 1, "y": 2 } })];

        apply(
            &mut items,
            json!({ "action": "update", "pk": 1, "data": { "meta": { "x": 9 } } }),
        )
        .unwrap();

        assert_eq!(items, vec![json!({ "pk": 1, "name": "a", "meta": { "x": 9 } })]);
    }

    #[test]
    fn update_is_idempotent() {
        let event = json!({ "action": "update", "pk": 1, "data": { "name": "A" } });
        let mut once = vec![json!({ "pk": 1, "name": "a" })];
        let mut twice = once.clone();

        apply(&mut once, event.clone()).unwrap();
        apply(&mut twice, event.clone()).unwrap();
        apply(&mut twice, event).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_create_yields_two_entities() {
        let event = json!({ "action": "create", "pk": 3, "data": { "pk": 3 } });
        let mut items = Vec::new();

        apply(&mut items, event.clone()).unwrap();
        apply(&mut items, event).unwrap();

        assert_eq!(items, vec![json!({ "pk": 3 }), json!({ "pk": 3 })]);
    }

    #[test]
    fn delete_removes_and_keeps_order() {
        let mut items = vec![json!({ "pk": 3 }), json!({ "pk": 2 }), json!({ "pk": 1 })];

        let outcome = apply(&mut items, json!({ "action": "delete", "pk": 2 })).unwrap();

        assert_eq!(outcome, Outcome::Deleted { index: 1 });
        assert_eq!(items, vec![json!({ "pk": 3 }), json!({ "pk": 1 })]);
    }

    #[test]
    fn unknown_key_is_a_no_op() {
        let original = vec![json!({ "pk": 1, "name": "A" })];
        let mut items = original.clone();

        let outcome = apply(&mut items, json!({ "action": "delete", "pk": 99 })).unwrap();
        assert_eq!(outcome, Outcome::UnknownKey);
        assert!(!outcome.changed());

        let outcome = apply(&mut items, json!({ "action": "update", "pk": 99, "data": { "name": "Z" } })).unwrap();
        assert_eq!(outcome, Outcome::UnknownKey);
        assert_eq!(items, original);
    }

    #[test]
    fn missing_key_is_a_no_op() {
        let mut items = vec![json!({ "pk": 1 })];
        let outcome = apply(&mut items, json!({ "action": "delete" })).unwrap();
        assert_eq!(outcome, Outcome::UnknownKey);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn custom_key_field() {
        let mut items = vec![json!({ "slug": "a", "n": 1 })];

        apply_mutation(
            &mut items,
            &json!({ "action": "update", "slug": "a", "data": { "n": 2 } }),
            "slug",
            "widget",
        )
        .unwrap();

        assert_eq!(items[0]["n"], 2);
    }

    #[test]
    fn unknown_action_is_fatal_and_names_the_channel() {
        let mut items = vec![json!({ "pk": 1 })];

        let err = apply(&mut items, json!({ "action": "archive", "pk": 1 })).unwrap_err();

        assert!(err.is_integration_fault());
        assert!(err.to_string().contains("channel=widget"));
        assert!(err.to_string().contains("archive"));
        assert_eq!(items, vec![json!({ "pk": 1 })]);
    }

    #[test]
    fn missing_action_is_fatal() {
        let err = apply(&mut Vec::new(), json!({ "pk": 1 })).unwrap_err();
        assert!(matches!(err, CoreError::UnhandledAction { ref action, .. } if action == "<missing>"));
    }
}
